//! MiniJava Compiler CLI
//!
//! Usage: mjavac <input.java> [-o output] [-f format]

use std::fs;
use std::path::PathBuf;

use clap::Parser as ClapParser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use minijava::llvm_codegen::generate_llvm;
use minijava::parser::parse;
use minijava::printer::print_program;
use minijava::semantic::analyse;
use minijava::Analysis;

#[derive(ClapParser)]
#[command(name = "mjavac")]
#[command(version = "0.1.0")]
#[command(about = "MiniJava to LLVM IR compiler", long_about = None)]
struct Cli {
    /// Input MiniJava source file
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "llvm")]
    format: OutputFormat,

    /// Skip semantic analysis
    #[arg(long)]
    no_check: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    /// LLVM IR text
    Llvm,
    /// Semantic verdict: OK or ERROR
    Check,
    /// Pretty-printed source
    Source,
    /// AST dump (for debugging)
    Ast,
    /// Class forest with field offsets and vtable slots
    Hierarchy,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    debug!(input = %cli.input.display(), "reading source");
    let source = fs::read_to_string(&cli.input)?;
    let program = parse(&source)?;

    let output = match cli.format {
        OutputFormat::Source => print_program(&program),
        OutputFormat::Ast => format!("{:#?}\n", program),
        OutputFormat::Check => {
            let verdict = Analysis::build(&program).and_then(|analysis| analyse(&program, &analysis));
            match verdict {
                Ok(()) => "OK\n".to_string(),
                Err(e) if e.is_semantic() => {
                    eprintln!("{}", e);
                    "ERROR\n".to_string()
                }
                Err(e) => return Err(e.into()),
            }
        }
        OutputFormat::Hierarchy => Analysis::build(&program)?.describe(),
        OutputFormat::Llvm => {
            let analysis = Analysis::build(&program)?;
            if !cli.no_check {
                analyse(&program, &analysis)?;
            }
            generate_llvm(&program, &analysis)?
        }
    };

    if let Some(path) = cli.output {
        fs::write(&path, &output)?;
        eprintln!("Wrote {}", path.display());
    } else {
        print!("{}", output);
    }

    Ok(())
}
