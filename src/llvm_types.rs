//! LLVM IR type model
//!
//! The handful of first-class types the MiniJava lowering needs, plus the
//! method signature shape used for vtable entries and indirect calls.

use std::fmt;

use crate::ast::Type;
use crate::vtable::MethodSignature;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrType {
    Bool,
    Byte,
    Int,
    IntPtr,
    /// `i8*`: objects and opaque function pointers
    Address,
    /// `i8**`: a vtable
    AddressPtr,
    /// `i8***`: an object viewed as a pointer to its vtable slot
    AddressPtrPtr,
    Void,
}

impl IrType {
    pub fn pointer(self) -> String {
        format!("{}*", self)
    }
}

impl From<&Type> for IrType {
    fn from(ty: &Type) -> Self {
        match ty {
            Type::Int => IrType::Int,
            Type::Boolean => IrType::Bool,
            Type::IntArray => IrType::IntPtr,
            Type::Class(_) => IrType::Address,
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IrType::Bool => "i1",
            IrType::Byte => "i8",
            IrType::Int => "i32",
            IrType::IntPtr => "i32*",
            IrType::Address => "i8*",
            IrType::AddressPtr => "i8**",
            IrType::AddressPtrPtr => "i8***",
            IrType::Void => "void",
        };
        write!(f, "{}", s)
    }
}

/// `[N x T]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayType {
    pub len: usize,
    pub elem: IrType,
}

impl ArrayType {
    pub fn new(len: usize, elem: IrType) -> Self {
        Self { len, elem }
    }
}

impl fmt::Display for ArrayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} x {}]", self.len, self.elem)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrParam {
    pub ty: IrType,
    pub name: String,
}

impl IrParam {
    pub fn new(ty: IrType, name: impl Into<String>) -> Self {
        Self {
            ty,
            name: name.into(),
        }
    }
}

/// A function as seen by the IR: global name, return type, parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrSignature {
    /// Global symbol including the `@`
    pub name: String,
    pub ret: IrType,
    pub params: Vec<IrParam>,
}

impl IrSignature {
    /// Methods take the receiver as a leading `i8* %this`; formals arrive
    /// as `%.name` and are spilled to `%name` by the prologue.
    pub fn from_method(signature: &MethodSignature) -> Self {
        let mut params = vec![IrParam::new(IrType::Address, "this")];
        params.extend(
            signature
                .formals
                .iter()
                .map(|(name, ty)| IrParam::new(IrType::from(ty), format!(".{}", name))),
        );
        Self {
            name: format!("@{}", signature.qualified_name),
            ret: IrType::from(&signature.ret),
            params,
        }
    }

    /// `ret (p1, p2)`
    pub fn short(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|p| p.ty.to_string()).collect();
        format!("{} ({})", self.ret, params.join(", "))
    }

    /// `ret (p1, p2)*`
    pub fn pointer_type(&self) -> String {
        format!("{}*", self.short())
    }

    /// Constant expression stored in a vtable slot
    pub fn vtable_entry(&self) -> String {
        format!("i8* bitcast ({} {} to i8*)", self.pointer_type(), self.name)
    }
}
