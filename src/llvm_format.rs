//! LLVM IR instruction formatting
//!
//! Pure functions, one per instruction shape. Each returns a complete line
//! including the trailing newline; instructions are indented one tab, labels
//! and top-level items are not.

use std::fmt;

use crate::llvm_types::{ArrayType, IrParam, IrSignature, IrType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
}

impl ArithOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
        }
    }
}

/// Signed integer predicates used by `icmp`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equals,
    Less,
    LessOrEquals,
    GreaterOrEquals,
}

impl Comparison {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Comparison::Equals => "eq",
            Comparison::Less => "slt",
            Comparison::LessOrEquals => "sle",
            Comparison::GreaterOrEquals => "sge",
        }
    }
}

fn instruction(text: String) -> String {
    format!("\t{}\n", text)
}

fn params(params: &[IrParam]) -> String {
    params
        .iter()
        .map(|p| format!("{} %{}", p.ty, p.name))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn binary(result: &str, op: ArithOp, ty: IrType, lhs: &str, rhs: &str) -> String {
    instruction(format!("{} = {} {} {}, {}", result, op.mnemonic(), ty, lhs, rhs))
}

pub fn compare(result: &str, cmp: Comparison, ty: IrType, lhs: &str, rhs: &str) -> String {
    instruction(format!("{} = icmp {} {} {}, {}", result, cmp.mnemonic(), ty, lhs, rhs))
}

pub fn alloca(result: &str, ty: IrType) -> String {
    instruction(format!("{} = alloca {}", result, ty))
}

pub fn load(result: &str, ty: IrType, ptr: &str) -> String {
    instruction(format!("{} = load {}, {}* {}", result, ty, ty, ptr))
}

pub fn store(ty: IrType, value: &str, ptr: &str) -> String {
    instruction(format!("store {} {}, {}* {}", ty, value, ty, ptr))
}

pub fn branch(label: &str) -> String {
    instruction(format!("br label %{}", label))
}

pub fn conditional_branch(cond: &str, if_true: &str, if_false: &str) -> String {
    instruction(format!("br i1 {}, label %{}, label %{}", cond, if_true, if_false))
}

pub fn label(name: &str) -> String {
    format!("{}:\n", name)
}

/// `getelementptr T, T* ptr, i32 i0, i32 i1, ...`
pub fn getelementptr(result: &str, elem: impl fmt::Display, ptr: &str, indices: &[&str]) -> String {
    let indices: Vec<String> = indices.iter().map(|i| format!("i32 {}", i)).collect();
    instruction(format!(
        "{} = getelementptr {}, {}* {}, {}",
        result,
        elem,
        elem,
        ptr,
        indices.join(", ")
    ))
}

pub fn bitcast(result: &str, from: impl fmt::Display, value: &str, to: impl fmt::Display) -> String {
    instruction(format!("{} = bitcast {} {} to {}", result, from, value, to))
}

/// Cast an opaque vtable entry to a callable function pointer
pub fn bitcast_to_signature(result: &str, from: IrType, value: &str, signature: &IrSignature) -> String {
    instruction(format!(
        "{} = bitcast {} {} to {}",
        result,
        from,
        value,
        signature.pointer_type()
    ))
}

/// A call; the result register is dropped for `void` callees
pub fn call(result: Option<&str>, ret: impl fmt::Display, callee: &str, args: &[(IrType, String)]) -> String {
    let ret = ret.to_string();
    let args: Vec<String> = args.iter().map(|(ty, value)| format!("{} {}", ty, value)).collect();
    let call = format!("call {} {}({})", ret, callee, args.join(", "));
    match result {
        Some(result) if ret != "void" => instruction(format!("{} = {}", result, call)),
        _ => instruction(call),
    }
}

/// `phi T [v0, %l0], [v1, %l1], ...`
pub fn phi(result: &str, ty: IrType, incoming: &[(&str, &str)]) -> String {
    let incoming: Vec<String> = incoming
        .iter()
        .map(|(value, label)| format!("[{}, %{}]", value, label))
        .collect();
    instruction(format!("{} = phi {} {}", result, ty, incoming.join(", ")))
}

pub fn global_vtable(name: &str, entries: &[String]) -> String {
    format!(
        "{} = global {} [{}]\n",
        name,
        ArrayType::new(entries.len(), IrType::Address),
        entries.join(", ")
    )
}

/// Null-terminated string constant; non-printable bytes become `\XX`
pub fn constant_string(name: &str, text: &str) -> String {
    let mut escaped = String::new();
    for byte in text.bytes() {
        if byte.is_ascii_graphic() && byte != b'"' && byte != b'\\' || byte == b' ' {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("\\{:02x}", byte));
        }
    }
    escaped.push_str("\\00");
    format!(
        "{} = constant {} c\"{}\"\n",
        name,
        ArrayType::new(text.len() + 1, IrType::Byte),
        escaped
    )
}

pub fn external_declaration(ret: IrType, name: &str, param_types: &str) -> String {
    format!("declare {} {}({})\n", ret, name, param_types)
}

pub fn function_definition(signature: &IrSignature) -> String {
    format!(
        "define {} {}({}) {{\n",
        signature.ret,
        signature.name,
        params(&signature.params)
    )
}

pub fn ret(ty: IrType, value: &str) -> String {
    instruction(format!("ret {} {}", ty, value))
}

pub fn ret_void() -> String {
    instruction("ret void".to_string())
}

pub fn function_end() -> String {
    "}\n".to_string()
}

pub const CALLOC: &str = "@calloc";
pub const PRINTF: &str = "@printf";
pub const EXIT: &str = "@exit";
pub const PRINT_INT: &str = "@print_int";
pub const THROW_OOB: &str = "@throw_oob";

/// Runtime declarations, format strings and the two helper functions
pub fn prologue() -> String {
    let mut out = String::new();
    out.push_str(&external_declaration(IrType::Address, CALLOC, "i32, i32"));
    out.push_str(&external_declaration(IrType::Int, PRINTF, "i8*, ..."));
    out.push_str(&external_declaration(IrType::Void, EXIT, "i32"));
    out.push('\n');
    out.push_str(&constant_string("@_cint", "%d\n"));
    out.push_str(&constant_string("@_cOOB", "Out of bounds\n"));
    out.push('\n');

    let print_int = IrSignature {
        name: PRINT_INT.to_string(),
        ret: IrType::Void,
        params: vec![IrParam::new(IrType::Int, "i")],
    };
    out.push_str(&function_definition(&print_int));
    out.push_str(&instruction(format!(
        "%_str = bitcast {}* @_cint to i8*",
        ArrayType::new(4, IrType::Byte)
    )));
    out.push_str(&call(
        None,
        "i32 (i8*, ...)",
        PRINTF,
        &[(IrType::Address, "%_str".into()), (IrType::Int, "%i".into())],
    ));
    out.push_str(&ret_void());
    out.push_str(&function_end());
    out.push('\n');

    let throw_oob = IrSignature {
        name: THROW_OOB.to_string(),
        ret: IrType::Void,
        params: Vec::new(),
    };
    out.push_str(&function_definition(&throw_oob));
    out.push_str(&instruction(format!(
        "%_str = bitcast {}* @_cOOB to i8*",
        ArrayType::new(15, IrType::Byte)
    )));
    out.push_str(&call(None, "i32 (i8*, ...)", PRINTF, &[(IrType::Address, "%_str".into())]));
    out.push_str(&call(None, IrType::Void, EXIT, &[(IrType::Int, "1".into())]));
    out.push_str(&ret_void());
    out.push_str(&function_end());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_and_compare() {
        assert_eq!(binary("%_0", ArithOp::Add, IrType::Int, "%a", "1"), "\t%_0 = add i32 %a, 1\n");
        assert_eq!(binary("%_1", ArithOp::Sub, IrType::Bool, "1", "%b"), "\t%_1 = sub i1 1, %b\n");
        assert_eq!(
            compare("%_2", Comparison::LessOrEquals, IrType::Int, "%len", "%i"),
            "\t%_2 = icmp sle i32 %len, %i\n"
        );
        assert_eq!(Comparison::GreaterOrEquals.mnemonic(), "sge");
        assert_eq!(Comparison::Equals.mnemonic(), "eq");
    }

    #[test]
    fn test_memory() {
        assert_eq!(alloca("%x", IrType::IntPtr), "\t%x = alloca i32*\n");
        assert_eq!(load("%_0", IrType::Int, "%x"), "\t%_0 = load i32, i32* %x\n");
        assert_eq!(store(IrType::Bool, "1", "%b"), "\tstore i1 1, i1* %b\n");
        assert_eq!(
            getelementptr("%_3", IrType::Byte, "%this", &["8"]),
            "\t%_3 = getelementptr i8, i8* %this, i32 8\n"
        );
        assert_eq!(
            getelementptr("%_4", ArrayType::new(2, IrType::Address), "@.A_vtable", &["0", "0"]),
            "\t%_4 = getelementptr [2 x i8*], [2 x i8*]* @.A_vtable, i32 0, i32 0\n"
        );
        assert_eq!(
            bitcast("%_5", IrType::Address, "%_4", IrType::IntPtr),
            "\t%_5 = bitcast i8* %_4 to i32*\n"
        );
    }

    #[test]
    fn test_control_flow() {
        assert_eq!(branch("loop.0"), "\tbr label %loop.0\n");
        assert_eq!(
            conditional_branch("%_1", "if.0", "if.1"),
            "\tbr i1 %_1, label %if.0, label %if.1\n"
        );
        assert_eq!(label("if.2"), "if.2:\n");
        assert_eq!(
            phi("%_9", IrType::Bool, &[("0", "andcond.0"), ("%_8", "andcond.2")]),
            "\t%_9 = phi i1 [0, %andcond.0], [%_8, %andcond.2]\n"
        );
    }

    #[test]
    fn test_calls() {
        assert_eq!(
            call(Some("%_0"), IrType::Address, CALLOC, &[(IrType::Int, "1".into()), (IrType::Int, "16".into())]),
            "\t%_0 = call i8* @calloc(i32 1, i32 16)\n"
        );
        assert_eq!(
            call(Some("%_1"), IrType::Void, PRINT_INT, &[(IrType::Int, "%_0".into())]),
            "\tcall void @print_int(i32 %_0)\n"
        );
        assert_eq!(call(None, IrType::Void, THROW_OOB, &[]), "\tcall void @throw_oob()\n");
    }

    #[test]
    fn test_constants() {
        assert_eq!(
            constant_string("@_cint", "%d\n"),
            "@_cint = constant [4 x i8] c\"%d\\0a\\00\"\n"
        );
        assert_eq!(
            constant_string("@_cOOB", "Out of bounds\n"),
            "@_cOOB = constant [15 x i8] c\"Out of bounds\\0a\\00\"\n"
        );
        assert_eq!(
            global_vtable("@.A_vtable", &["e1".into(), "e2".into()]),
            "@.A_vtable = global [2 x i8*] [e1, e2]\n"
        );
    }

    #[test]
    fn test_function_shape() {
        let signature = IrSignature {
            name: "@A.foo".into(),
            ret: IrType::Int,
            params: vec![IrParam::new(IrType::Address, "this"), IrParam::new(IrType::Int, ".x")],
        };
        assert_eq!(function_definition(&signature), "define i32 @A.foo(i8* %this, i32 %.x) {\n");
        assert_eq!(ret(IrType::Int, "%_3"), "\tret i32 %_3\n");
        assert_eq!(function_end(), "}\n");
    }

    #[test]
    fn test_prologue() {
        let prologue = prologue();
        assert!(prologue.starts_with("declare i8* @calloc(i32, i32)\n"));
        assert!(prologue.contains("declare i32 @printf(i8*, ...)\n"));
        assert!(prologue.contains("declare void @exit(i32)\n"));
        assert!(prologue.contains("define void @print_int(i32 %i) {\n"));
        assert!(prologue.contains("\t%_str = bitcast [4 x i8]* @_cint to i8*\n"));
        assert!(prologue.contains("\tcall i32 (i8*, ...) @printf(i8* %_str, i32 %i)\n"));
        assert!(prologue.contains("define void @throw_oob() {\n"));
        assert!(prologue.contains("\tcall void @exit(i32 1)\n"));
    }
}
