//! MiniJava Compiler
//!
//! A compiler for the MiniJava teaching language targeting textual LLVM IR.
//!
//! The pipeline is parse, [`Analysis::build`] (class forest, scoped symbol
//! table, object layouts), [`semantic::analyse`], then
//! [`llvm_codegen::generate_llvm`]. Objects are heap blocks with a vtable
//! pointer in the first 8 bytes; methods dispatch through that table.

pub mod ast;
pub mod error;
pub mod hierarchy;
pub mod lexer;
pub mod llvm_codegen;
pub mod llvm_format;
pub mod llvm_types;
pub mod parser;
pub mod printer;
pub mod registers;
pub mod semantic;
pub mod symbol_table;
pub mod vtable;

use tracing::{debug, info};

pub use ast::Program;
pub use error::{CompileError, Result};
pub use hierarchy::ClassHierarchyForest;
pub use symbol_table::SymbolTable;
pub use vtable::ClassInfo;

/// Everything derived from a parsed program before code generation
#[derive(Debug)]
pub struct Analysis<'a> {
    pub forest: ClassHierarchyForest<'a>,
    pub symbols: SymbolTable,
    pub classes: ClassInfo<'a>,
}

impl<'a> Analysis<'a> {
    /// Build the class forest, symbol table and object layouts.
    ///
    /// Fails with a hierarchy error on duplicate, self, undeclared or
    /// forward superclass references.
    pub fn build(program: &'a Program) -> Result<Self> {
        let forest = ClassHierarchyForest::build(program)?;
        let symbols = SymbolTable::build(program)?;
        let classes = ClassInfo::from_symbols(program, &symbols)?;

        debug!(
            classes = classes.len(),
            scopes = symbols.scope_count(),
            "analysis complete"
        );

        Ok(Self {
            forest,
            symbols,
            classes,
        })
    }

    /// Forest dump: one line per class, indented by depth, followed by its
    /// field offsets and vtable slots
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for root in self.forest.roots() {
            for name in self.forest.family(&root.decl.name) {
                let depth = self.forest.depth(name).unwrap_or(0);
                let indent = "  ".repeat(depth);
                let Some(vtable) = self.classes.vtable(name) else {
                    continue;
                };

                let header = match vtable.super_name() {
                    Some(parent) => format!("{} extends {}", name, parent),
                    None => name.to_string(),
                };
                out.push_str(&format!("{}{} (size {})\n", indent, header, vtable.physical_size()));
                for (field, ty) in vtable.fields() {
                    let offset = vtable.field_offset(field).unwrap_or_default();
                    out.push_str(&format!("{}  field {:>3}  {} {}\n", indent, offset, ty, field));
                }
                for (slot, (method, signature)) in vtable.methods().enumerate() {
                    out.push_str(&format!(
                        "{}  slot  {:>3}  {} -> {}\n",
                        indent, slot, method, signature.qualified_name
                    ));
                }
            }
        }
        out
    }
}

/// Parse, analyse, check and lower `source` to LLVM IR
pub fn compile(source: &str) -> Result<String> {
    let program = parser::parse(source)?;
    let analysis = Analysis::build(&program)?;
    semantic::analyse(&program, &analysis)?;
    let ir = llvm_codegen::generate_llvm(&program, &analysis)?;
    info!(bytes = ir.len(), "generated LLVM IR");
    Ok(ir)
}

/// Whether `source` is a valid MiniJava program.
///
/// Hierarchy and semantic errors yield `Ok(false)`; lexer and parse errors
/// are returned as errors.
pub fn check(source: &str) -> Result<bool> {
    let program = parser::parse(source)?;
    let verdict = Analysis::build(&program).and_then(|analysis| semantic::analyse(&program, &analysis));
    match verdict {
        Ok(()) => Ok(true),
        Err(e) if e.is_semantic() => {
            debug!(error = %e, "program rejected");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
