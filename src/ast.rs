//! MiniJava Abstract Syntax Tree
//!
//! Defines the AST nodes for MiniJava programs and the [`Visitor`]
//! traversal protocol shared by the analysis passes.

use std::fmt;

use crate::error::Span;

/// Identity of a physical AST node.
///
/// Assigned by the parser from a counter, so two textually identical nodes
/// still have distinct ids. Used as the key for scope and register lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// A complete MiniJava program
#[derive(Debug, Clone)]
pub struct Program {
    pub main_class: MainClass,
    pub classes: Vec<ClassDecl>,
    pub span: Span,
}

impl Program {
    pub fn class(&self, name: &str) -> Option<&ClassDecl> {
        self.classes.iter().find(|c| c.name == name)
    }
}

// =============================================================================
// Types
// =============================================================================

/// Declared MiniJava types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Boolean,
    IntArray,
    /// Reference to a class instance
    Class(String),
}

impl Type {
    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Class(_))
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            Type::Class(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Boolean => write!(f, "boolean"),
            Type::IntArray => write!(f, "int[]"),
            Type::Class(name) => write!(f, "{}", name),
        }
    }
}

// =============================================================================
// Declarations
// =============================================================================

/// `class Main { public static void main(String[] args) { ... } }`
#[derive(Debug, Clone)]
pub struct MainClass {
    pub id: NodeId,
    pub name: String,
    pub args_name: String,
    pub body: Statement,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub id: NodeId,
    pub name: String,
    pub super_name: Option<String>,
    pub fields: Vec<VarDecl>,
    pub methods: Vec<MethodDecl>,
    pub span: Span,
}

impl ClassDecl {
    pub fn method(&self, name: &str) -> Option<&MethodDecl> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.method(name).is_some()
    }
}

/// Field or local variable declaration
#[derive(Debug, Clone)]
pub struct VarDecl {
    pub id: NodeId,
    pub ty: Type,
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FormalArg {
    pub id: NodeId,
    pub ty: Type,
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub id: NodeId,
    pub return_type: Type,
    pub name: String,
    pub formals: Vec<FormalArg>,
    pub locals: Vec<VarDecl>,
    pub body: Vec<Statement>,
    /// Expression of the trailing `return`
    pub ret: Expr,
    pub span: Span,
}

// =============================================================================
// Statements
// =============================================================================

#[derive(Debug, Clone)]
pub struct Statement {
    pub id: NodeId,
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    /// `{ s1 s2 ... }`
    Block(Vec<Statement>),

    If {
        cond: Expr,
        then_branch: Box<Statement>,
        else_branch: Box<Statement>,
    },

    While {
        cond: Expr,
        body: Box<Statement>,
    },

    /// `System.out.println(e);`
    Print(Expr),

    /// `x = e;`
    Assign { target: String, value: Expr },

    /// `x[i] = e;`
    ArrayAssign {
        target: String,
        index: Expr,
        value: Expr,
    },
}

// =============================================================================
// Expressions
// =============================================================================

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Lt,
    Add,
    Sub,
    Mul,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::And => "&&",
            BinaryOp::Lt => "<",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// `a[i]`
    ArrayAccess { array: Box<Expr>, index: Box<Expr> },

    /// `a.length`
    ArrayLength(Box<Expr>),

    /// `owner.method(args)`
    MethodCall {
        owner: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },

    IntLiteral(i32),
    True,
    False,
    Identifier(String),
    This,

    /// `new int[len]`
    NewIntArray(Box<Expr>),

    /// `new C()`
    NewObject(String),

    /// `!e`
    Not(Box<Expr>),
}

// =============================================================================
// Visitor protocol
// =============================================================================

/// Traversal contract over the closed set of node kinds.
///
/// Every method defaults to the matching `walk_*` function, which visits the
/// children in source order. Implementors override the kinds they care about
/// and call `walk_*` themselves to keep descending.
pub trait Visitor {
    fn visit_program(&mut self, program: &Program) {
        walk_program(self, program);
    }

    fn visit_main_class(&mut self, main_class: &MainClass) {
        walk_main_class(self, main_class);
    }

    fn visit_class(&mut self, class: &ClassDecl) {
        walk_class(self, class);
    }

    fn visit_var_decl(&mut self, var: &VarDecl) {
        self.visit_type(&var.ty);
    }

    fn visit_method(&mut self, method: &MethodDecl) {
        walk_method(self, method);
    }

    fn visit_formal(&mut self, formal: &FormalArg) {
        self.visit_type(&formal.ty);
    }

    fn visit_statement(&mut self, stmt: &Statement) {
        walk_statement(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    fn visit_type(&mut self, _ty: &Type) {}
}

pub fn walk_program<V: Visitor + ?Sized>(v: &mut V, program: &Program) {
    v.visit_main_class(&program.main_class);
    for class in &program.classes {
        v.visit_class(class);
    }
}

pub fn walk_main_class<V: Visitor + ?Sized>(v: &mut V, main_class: &MainClass) {
    v.visit_statement(&main_class.body);
}

/// Fields before methods
pub fn walk_class<V: Visitor + ?Sized>(v: &mut V, class: &ClassDecl) {
    for field in &class.fields {
        v.visit_var_decl(field);
    }
    for method in &class.methods {
        v.visit_method(method);
    }
}

/// Return type, formals, locals, body, return expression
pub fn walk_method<V: Visitor + ?Sized>(v: &mut V, method: &MethodDecl) {
    v.visit_type(&method.return_type);
    for formal in &method.formals {
        v.visit_formal(formal);
    }
    for local in &method.locals {
        v.visit_var_decl(local);
    }
    for stmt in &method.body {
        v.visit_statement(stmt);
    }
    v.visit_expr(&method.ret);
}

pub fn walk_statement<V: Visitor + ?Sized>(v: &mut V, stmt: &Statement) {
    match &stmt.kind {
        StatementKind::Block(statements) => {
            for s in statements {
                v.visit_statement(s);
            }
        }
        StatementKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            v.visit_expr(cond);
            v.visit_statement(then_branch);
            v.visit_statement(else_branch);
        }
        StatementKind::While { cond, body } => {
            v.visit_expr(cond);
            v.visit_statement(body);
        }
        StatementKind::Print(arg) => v.visit_expr(arg),
        StatementKind::Assign { value, .. } => v.visit_expr(value),
        StatementKind::ArrayAssign { index, value, .. } => {
            v.visit_expr(index);
            v.visit_expr(value);
        }
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(v: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Binary { left, right, .. } => {
            v.visit_expr(left);
            v.visit_expr(right);
        }
        ExprKind::ArrayAccess { array, index } => {
            v.visit_expr(array);
            v.visit_expr(index);
        }
        ExprKind::ArrayLength(array) => v.visit_expr(array),
        ExprKind::MethodCall { owner, args, .. } => {
            v.visit_expr(owner);
            for arg in args {
                v.visit_expr(arg);
            }
        }
        ExprKind::NewIntArray(len) => v.visit_expr(len),
        ExprKind::Not(operand) => v.visit_expr(operand),
        ExprKind::IntLiteral(_)
        | ExprKind::True
        | ExprKind::False
        | ExprKind::Identifier(_)
        | ExprKind::This
        | ExprKind::NewObject(_) => {}
    }
}

impl Program {
    pub fn accept<V: Visitor + ?Sized>(&self, v: &mut V) {
        v.visit_program(self);
    }
}

impl ClassDecl {
    pub fn accept<V: Visitor + ?Sized>(&self, v: &mut V) {
        v.visit_class(self);
    }
}

impl MethodDecl {
    pub fn accept<V: Visitor + ?Sized>(&self, v: &mut V) {
        v.visit_method(self);
    }
}

impl Statement {
    pub fn accept<V: Visitor + ?Sized>(&self, v: &mut V) {
        v.visit_statement(self);
    }
}

impl Expr {
    pub fn accept<V: Visitor + ?Sized>(&self, v: &mut V) {
        v.visit_expr(self);
    }
}
