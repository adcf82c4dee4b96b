//! Symbol Table for MiniJava
//!
//! Scopes live in an arena and point at their parent by [`ScopeId`]. The root
//! scope holds the class items; each class scope's parent is its superclass
//! scope (or the root), so inherited fields and methods are found by the
//! ordinary parent walk. Each method scope hangs off its class scope.
//!
//! Every AST node visited during construction is mapped to the scope that
//! encloses it, which is how later passes resolve names at a given node.

use std::collections::HashMap;

use tracing::trace;

use crate::ast::*;
use crate::error::{CompileError, Result};
use crate::vtable::{MethodSignature, ObjectVTable};

/// Index of a scope in the table arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// Namespaces: a variable, a method and a class may share a name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Variable,
    Method,
    Class,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolKey {
    pub name: String,
    pub kind: SymbolKind,
}

impl SymbolKey {
    pub fn new(name: impl Into<String>, kind: SymbolKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Where a variable lives at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Param,
    Local,
    Field,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableInfo {
    pub ty: Type,
    pub storage: Storage,
    /// Declaring node; also the memoization key for its address register
    pub decl: NodeId,
}

#[derive(Debug, Clone)]
pub enum SymbolItem {
    Variable(VariableInfo),
    Method {
        signature: MethodSignature,
        decl: NodeId,
    },
    Class {
        vtable: ObjectVTable,
        decl: NodeId,
    },
}

#[derive(Debug)]
pub struct Scope {
    parent: Option<ScopeId>,
    /// Class whose body (or method) this scope belongs to
    class_name: Option<String>,
    items: HashMap<SymbolKey, SymbolItem>,
}

impl Scope {
    fn new(parent: Option<ScopeId>, class_name: Option<String>) -> Self {
        Self {
            parent,
            class_name,
            items: HashMap::new(),
        }
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn get(&self, name: &str, kind: SymbolKind) -> Option<&SymbolItem> {
        self.items.get(&SymbolKey::new(name, kind))
    }

    /// First declaration wins; duplicates are reported by semantic analysis
    fn insert(&mut self, key: SymbolKey, item: SymbolItem) {
        self.items.entry(key).or_insert(item);
    }
}

#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    node_scopes: HashMap<NodeId, ScopeId>,
    class_scopes: HashMap<String, ScopeId>,
}

impl SymbolTable {
    fn new() -> Self {
        Self {
            scopes: vec![Scope::new(None, None)],
            node_scopes: HashMap::new(),
            class_scopes: HashMap::new(),
        }
    }

    /// Build the table for a program whose hierarchy is already validated
    pub fn build(program: &Program) -> Result<Self> {
        let mut builder = SymbolTableBuilder::new();
        program.accept(&mut builder);
        if let Some(err) = builder.error {
            return Err(err);
        }
        trace!(
            scopes = builder.table.scopes.len(),
            nodes = builder.table.node_scopes.len(),
            "built symbol table"
        );
        Ok(builder.table)
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    /// Scope enclosing an AST node
    pub fn scope_of(&self, node: NodeId) -> Option<ScopeId> {
        self.node_scopes.get(&node).copied()
    }

    pub fn class_scope(&self, class_name: &str) -> Option<ScopeId> {
        self.class_scopes.get(class_name).copied()
    }

    /// Walk outward from `scope` until a binding for `name` is found
    pub fn lookup(&self, scope: ScopeId, name: &str, kind: SymbolKind) -> Option<&SymbolItem> {
        let key = SymbolKey::new(name, kind);
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.scope(id);
            if let Some(item) = scope.items.get(&key) {
                return Some(item);
            }
            current = scope.parent;
        }
        None
    }

    pub fn lookup_variable(&self, scope: ScopeId, name: &str) -> Option<&VariableInfo> {
        match self.lookup(scope, name, SymbolKind::Variable)? {
            SymbolItem::Variable(info) => Some(info),
            _ => None,
        }
    }

    /// Variable visible at `node`
    pub fn resolve_variable(&self, node: NodeId, name: &str) -> Option<&VariableInfo> {
        self.lookup_variable(self.scope_of(node)?, name)
    }

    /// Method visible on instances of `class_name`, inherited ones included
    pub fn lookup_method(&self, class_name: &str, method: &str) -> Option<&MethodSignature> {
        match self.lookup(self.class_scope(class_name)?, method, SymbolKind::Method)? {
            SymbolItem::Method { signature, .. } => Some(signature),
            _ => None,
        }
    }

    pub fn class_vtable(&self, class_name: &str) -> Option<&ObjectVTable> {
        match self.scope(self.root()).get(class_name, SymbolKind::Class)? {
            SymbolItem::Class { vtable, .. } => Some(vtable),
            _ => None,
        }
    }

    fn push_scope(&mut self, parent: ScopeId, class_name: Option<String>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope::new(Some(parent), class_name));
        id
    }
}

/// Visitor populating a [`SymbolTable`]
struct SymbolTableBuilder {
    table: SymbolTable,
    current: ScopeId,
    storage: Storage,
    error: Option<CompileError>,
}

impl SymbolTableBuilder {
    fn new() -> Self {
        let table = SymbolTable::new();
        let current = table.root();
        Self {
            table,
            current,
            storage: Storage::Field,
            error: None,
        }
    }

    fn enter(&mut self, node: NodeId, class_name: &str) -> ScopeId {
        let scope = self.table.push_scope(self.current, Some(class_name.to_string()));
        self.table.node_scopes.insert(node, scope);
        self.current = scope;
        scope
    }

    fn declare(&mut self, name: &str, kind: SymbolKind, item: SymbolItem) {
        self.table.scopes[self.current.0].insert(SymbolKey::new(name, kind), item);
    }

    fn map_node(&mut self, node: NodeId) {
        self.table.node_scopes.insert(node, self.current);
    }
}

impl Visitor for SymbolTableBuilder {
    fn visit_main_class(&mut self, main_class: &MainClass) {
        let root = self.table.root();
        self.declare(
            &main_class.name,
            SymbolKind::Class,
            SymbolItem::Class {
                vtable: ObjectVTable::new(&main_class.name),
                decl: main_class.id,
            },
        );
        self.enter(main_class.id, &main_class.name);
        self.storage = Storage::Local;
        walk_main_class(self, main_class);
        self.current = root;
    }

    fn visit_class(&mut self, class: &ClassDecl) {
        let root = self.table.root();

        let (parent_scope, parent_vtable) = match &class.super_name {
            Some(super_name) => {
                match (self.table.class_scope(super_name), self.table.class_vtable(super_name)) {
                    (Some(scope), Some(vtable)) => (scope, Some(vtable.clone())),
                    _ => {
                        if self.error.is_none() {
                            self.error = Some(CompileError::hierarchy(
                                class.span,
                                format!(
                                    "Superclass '{}' of '{}' is not available",
                                    super_name, class.name
                                ),
                            ));
                        }
                        (root, None)
                    }
                }
            }
            None => (root, None),
        };

        let vtable = ObjectVTable::for_class(class, parent_vtable.as_ref());
        trace!(
            class = %class.name,
            fields = vtable.fields().count(),
            methods = vtable.method_count(),
            "class layout"
        );

        self.current = root;
        self.declare(
            &class.name,
            SymbolKind::Class,
            SymbolItem::Class {
                vtable,
                decl: class.id,
            },
        );

        self.current = parent_scope;
        let scope = self.enter(class.id, &class.name);
        self.table.class_scopes.insert(class.name.clone(), scope);

        self.storage = Storage::Field;
        walk_class(self, class);
        self.current = root;
    }

    fn visit_var_decl(&mut self, var: &VarDecl) {
        self.map_node(var.id);
        self.declare(
            &var.name,
            SymbolKind::Variable,
            SymbolItem::Variable(VariableInfo {
                ty: var.ty.clone(),
                storage: self.storage,
                decl: var.id,
            }),
        );
    }

    fn visit_method(&mut self, method: &MethodDecl) {
        let class_scope = self.current;
        let class_name = self
            .table
            .scope(class_scope)
            .class_name()
            .unwrap_or_default()
            .to_string();

        self.declare(
            &method.name,
            SymbolKind::Method,
            SymbolItem::Method {
                signature: MethodSignature::from_decl(&class_name, method),
                decl: method.id,
            },
        );

        self.enter(method.id, &class_name);
        self.storage = Storage::Local;
        walk_method(self, method);
        self.storage = Storage::Field;
        self.current = class_scope;
    }

    fn visit_formal(&mut self, formal: &FormalArg) {
        self.map_node(formal.id);
        self.declare(
            &formal.name,
            SymbolKind::Variable,
            SymbolItem::Variable(VariableInfo {
                ty: formal.ty.clone(),
                storage: Storage::Param,
                decl: formal.id,
            }),
        );
    }

    fn visit_statement(&mut self, stmt: &Statement) {
        self.map_node(stmt.id);
        walk_statement(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        self.map_node(expr.id);
        walk_expr(self, expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::vtable::ClassInfo;

    const SOURCE: &str = "
        class Main { public static void main(String[] a) { System.out.println(new B().run()); } }
        class A {
            int x;
            boolean flag;
            public int get() { return x; }
            public int run() { int y; y = 1; return y; }
        }
        class B extends A {
            int[] data;
            public int run() { int x; x = 2; return x; }
            public int extra(int n) { return n; }
        }
    ";

    fn build() -> (Program, SymbolTable) {
        let program = parse(SOURCE).unwrap();
        let table = SymbolTable::build(&program).unwrap();
        (program, table)
    }

    fn method<'p>(program: &'p Program, class: &str, name: &str) -> &'p MethodDecl {
        program.class(class).unwrap().method(name).unwrap()
    }

    #[test]
    fn test_class_scope_parents_follow_extends() {
        let (_, table) = build();
        let a = table.class_scope("A").unwrap();
        let b = table.class_scope("B").unwrap();
        assert_eq!(table.scope(b).parent(), Some(a));
        assert_eq!(table.scope(a).parent(), Some(table.root()));
    }

    #[test]
    fn test_fields_are_inherited_through_scopes() {
        let (_, table) = build();
        let b = table.class_scope("B").unwrap();
        let x = table.lookup_variable(b, "x").unwrap();
        assert_eq!(x.ty, Type::Int);
        assert_eq!(x.storage, Storage::Field);
        assert!(table.lookup_variable(b, "data").is_some());
    }

    #[test]
    fn test_local_shadows_field() {
        let (program, table) = build();
        let run = method(&program, "B", "run");
        let x = table.resolve_variable(run.ret.id, "x").unwrap();
        assert_eq!(x.storage, Storage::Local);
        assert_eq!(x.decl, run.locals[0].id);

        let get = method(&program, "A", "get");
        let field = table.resolve_variable(get.ret.id, "x").unwrap();
        assert_eq!(field.storage, Storage::Field);
    }

    #[test]
    fn test_children_are_invisible_to_parents() {
        let (program, table) = build();
        let a = table.class_scope("A").unwrap();
        assert!(table.lookup_variable(a, "y").is_none());
        assert!(table.lookup_variable(a, "data").is_none());
        assert!(table.lookup_variable(table.root(), "x").is_none());

        let get = method(&program, "A", "get");
        assert!(table.resolve_variable(get.ret.id, "y").is_none());
    }

    #[test]
    fn test_formals_are_params() {
        let (program, table) = build();
        let extra = method(&program, "B", "extra");
        let n = table.resolve_variable(extra.ret.id, "n").unwrap();
        assert_eq!(n.storage, Storage::Param);
        assert_eq!(n.decl, extra.formals[0].id);
    }

    #[test]
    fn test_every_node_is_mapped() {
        let (program, table) = build();
        let run = method(&program, "A", "run");
        let scope = table.scope_of(run.id).unwrap();
        for stmt in &run.body {
            assert_eq!(table.scope_of(stmt.id), Some(scope));
        }
        assert_eq!(table.scope_of(run.ret.id), Some(scope));
        assert_eq!(table.scope(scope).class_name(), Some("A"));
        assert!(table.scope_of(program.main_class.body.id).is_some());
    }

    #[test]
    fn test_methods_resolve_through_superclass() {
        let (_, table) = build();
        assert_eq!(table.lookup_method("B", "get").unwrap().qualified_name, "A.get");
        assert_eq!(table.lookup_method("B", "run").unwrap().qualified_name, "B.run");
        assert_eq!(table.lookup_method("A", "run").unwrap().qualified_name, "A.run");
        assert!(table.lookup_method("A", "extra").is_none());
    }

    #[test]
    fn test_class_items_carry_vtables() {
        let (program, table) = build();
        let b = table.class_vtable("B").unwrap();
        assert_eq!(b.method_slot("get"), Some(0));
        assert_eq!(b.method_slot("run"), Some(1));
        assert_eq!(b.method_slot("extra"), Some(2));
        assert_eq!(b.method("run").unwrap().qualified_name, "B.run");
        assert_eq!(b.field_offset("data"), Some(13));

        let info = ClassInfo::from_symbols(&program, &table).unwrap();
        assert_eq!(info.len(), 2);
        assert_eq!(info.physical_size("A"), Some(13));
        assert_eq!(info.physical_size("B"), Some(21));
        assert!(info.get("Main").is_none());
    }
}
