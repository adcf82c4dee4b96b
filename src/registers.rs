//! Register allocation for the IR emitter
//!
//! Two lifetimes: [`VTableRegistry`] lives for the whole compilation and
//! hands out vtable globals; [`FunctionRegisters`] is created fresh for each
//! function body and owns the temporary and label counters plus the
//! memoized address registers of that function's variables.

use std::collections::HashMap;

use crate::ast::{NodeId, Type};
use crate::error::{CompileError, Result};
use crate::symbol_table::{Storage, SymbolTable};

/// Global names of the class vtables
#[derive(Debug, Default)]
pub struct VTableRegistry {
    names: HashMap<String, String>,
}

impl VTableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `@.{class}_vtable`, the same string on every call for a class
    pub fn allocate(&mut self, class_name: &str) -> String {
        self.names
            .entry(class_name.to_string())
            .or_insert_with(|| format!("@.{}_vtable", class_name))
            .clone()
    }
}

/// Where a resolved variable lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// A local or spilled parameter behind an `alloca`
    Stack { register: String, ty: Type },
    /// A field of `this`
    Field { name: String, ty: Type },
}

/// Register state of one function body
#[derive(Debug)]
pub struct FunctionRegisters<'t> {
    symbols: &'t SymbolTable,
    next_temp: usize,
    next_label: usize,
    stack: HashMap<NodeId, String>,
}

impl<'t> FunctionRegisters<'t> {
    pub fn new(symbols: &'t SymbolTable) -> Self {
        Self {
            symbols,
            next_temp: 0,
            next_label: 0,
            stack: HashMap::new(),
        }
    }

    /// Fresh `%_N`
    pub fn new_temp(&mut self) -> String {
        let register = format!("%_{}", self.next_temp);
        self.next_temp += 1;
        register
    }

    /// Fresh `{prefix}.N`; all prefixes share one counter
    pub fn new_label(&mut self, prefix: &str) -> String {
        let label = format!("{}.{}", prefix, self.next_label);
        self.next_label += 1;
        label
    }

    /// Address register of the variable declared by `decl`
    pub fn stack_register(&mut self, name: &str, decl: NodeId) -> String {
        self.stack
            .entry(decl)
            .or_insert_with(|| format!("%{}", name))
            .clone()
    }

    /// Resolve `name` as seen from node `at`
    pub fn address(&mut self, name: &str, at: NodeId) -> Result<Address> {
        let info = self.symbols.resolve_variable(at, name).ok_or_else(|| {
            CompileError::codegen(format!("Variable '{}' does not resolve at node {:?}", name, at))
        })?;

        match info.storage {
            Storage::Field => Ok(Address::Field {
                name: name.to_string(),
                ty: info.ty.clone(),
            }),
            Storage::Param | Storage::Local => {
                let ty = info.ty.clone();
                let register = self.stack_register(name, info.decl);
                Ok(Address::Stack { register, ty })
            }
        }
    }
}
