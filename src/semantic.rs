//! Semantic Analysis for MiniJava
//!
//! Declaration checks, type checking, name resolution and definite
//! initialization of locals. Runs on a program whose hierarchy and symbol
//! table are already built, and stops at the first violation.

use std::collections::HashSet;

use tracing::debug;

use crate::ast::*;
use crate::error::{CompileError, Result, Span};
use crate::symbol_table::Storage;
use crate::Analysis;

/// Semantic analyser
pub struct Analyser<'a> {
    analysis: &'a Analysis<'a>,
    /// Class of the method being checked; `None` inside `main`
    current_class: Option<String>,
    /// Locals assigned on every path reaching the current point
    initialized: HashSet<String>,
}

impl<'a> Analyser<'a> {
    pub fn new(analysis: &'a Analysis<'a>) -> Self {
        Self {
            analysis,
            current_class: None,
            initialized: HashSet::new(),
        }
    }

    /// Analyse a program
    pub fn analyse(&mut self, program: &Program) -> Result<()> {
        // First pass: declarations and overrides
        for class in &program.classes {
            self.check_class(class)?;
        }

        // Second pass: method bodies
        self.current_class = None;
        self.initialized.clear();
        self.check_statement(&program.main_class.body)?;

        for class in &program.classes {
            for method in &class.methods {
                self.check_method_body(class, method)?;
            }
        }

        Ok(())
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    fn check_class(&self, class: &ClassDecl) -> Result<()> {
        let inherited: HashSet<&str> = self
            .analysis
            .forest
            .ancestors(&class.name)
            .into_iter()
            .flat_map(|ancestor| ancestor.fields.iter().map(|f| f.name.as_str()))
            .collect();

        let mut fields = HashSet::new();
        for field in &class.fields {
            self.check_type_exists(&field.ty, field.span)?;
            if !fields.insert(field.name.as_str()) {
                return Err(CompileError::semantic(
                    field.span,
                    format!("Field '{}' is declared twice in class '{}'", field.name, class.name),
                ));
            }
            if inherited.contains(field.name.as_str()) {
                return Err(CompileError::semantic(
                    field.span,
                    format!(
                        "Field '{}' of class '{}' redeclares an inherited field",
                        field.name, class.name
                    ),
                ));
            }
        }

        let mut methods = HashSet::new();
        for method in &class.methods {
            if !methods.insert(method.name.as_str()) {
                return Err(CompileError::semantic(
                    method.span,
                    format!("Method '{}' is declared twice in class '{}'", method.name, class.name),
                ));
            }
            self.check_method_declaration(class, method)?;
        }

        Ok(())
    }

    fn check_method_declaration(&self, class: &ClassDecl, method: &MethodDecl) -> Result<()> {
        self.check_type_exists(&method.return_type, method.span)?;

        let mut names = HashSet::new();
        for formal in &method.formals {
            self.check_type_exists(&formal.ty, formal.span)?;
            if !names.insert(formal.name.as_str()) {
                return Err(CompileError::semantic(
                    formal.span,
                    format!("Parameter '{}' of '{}' is declared twice", formal.name, method.name),
                ));
            }
        }
        for local in &method.locals {
            self.check_type_exists(&local.ty, local.span)?;
            if !names.insert(local.name.as_str()) {
                return Err(CompileError::semantic(
                    local.span,
                    format!("Variable '{}' in '{}' is already declared", local.name, method.name),
                ));
            }
        }

        let Some(super_name) = &class.super_name else {
            return Ok(());
        };
        let Some(overridden) = self.analysis.symbols.lookup_method(super_name, &method.name) else {
            return Ok(());
        };

        let same_formals = overridden.formals.len() == method.formals.len()
            && overridden
                .formal_types()
                .zip(method.formals.iter())
                .all(|(ty, formal)| *ty == formal.ty);
        if !same_formals {
            return Err(CompileError::semantic(
                method.span,
                format!(
                    "Method '{}.{}' overrides '{}' with different parameters",
                    class.name, method.name, overridden.qualified_name
                ),
            ));
        }
        if !self.is_assignable(&method.return_type, &overridden.ret) {
            return Err(CompileError::semantic(
                method.span,
                format!(
                    "Method '{}.{}' returns {}, which is not a subtype of {} returned by '{}'",
                    class.name, method.name, method.return_type, overridden.ret, overridden.qualified_name
                ),
            ));
        }

        Ok(())
    }

    fn check_type_exists(&self, ty: &Type, span: Span) -> Result<()> {
        match ty {
            Type::Class(name) if !self.analysis.forest.contains(name) => Err(CompileError::semantic(
                span,
                format!("Unknown class '{}'", name),
            )),
            _ => Ok(()),
        }
    }

    // =========================================================================
    // Bodies
    // =========================================================================

    fn check_method_body(&mut self, class: &ClassDecl, method: &MethodDecl) -> Result<()> {
        self.current_class = Some(class.name.clone());
        self.initialized.clear();

        for stmt in &method.body {
            self.check_statement(stmt)?;
        }

        let ret = self.type_of(&method.ret)?;
        self.expect_assignable(&ret, &method.return_type, method.ret.span, "return value")
    }

    fn check_statement(&mut self, stmt: &Statement) -> Result<()> {
        match &stmt.kind {
            StatementKind::Block(statements) => {
                for s in statements {
                    self.check_statement(s)?;
                }
            }
            StatementKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expect_type(cond, &Type::Boolean, "if condition")?;
                let before = self.initialized.clone();
                self.check_statement(then_branch)?;
                let after_then = std::mem::replace(&mut self.initialized, before);
                self.check_statement(else_branch)?;
                self.initialized.retain(|name| after_then.contains(name));
            }
            StatementKind::While { cond, body } => {
                self.expect_type(cond, &Type::Boolean, "while condition")?;
                let before = self.initialized.clone();
                self.check_statement(body)?;
                self.initialized = before;
            }
            StatementKind::Print(arg) => {
                self.expect_type(arg, &Type::Int, "println argument")?;
            }
            StatementKind::Assign { target, value } => {
                let value_ty = self.type_of(value)?;
                let (target_ty, storage) = self.resolve(stmt.id, target, stmt.span)?;
                self.expect_assignable(&value_ty, &target_ty, value.span, "assigned value")?;
                if storage == Storage::Local {
                    self.initialized.insert(target.clone());
                }
            }
            StatementKind::ArrayAssign {
                target,
                index,
                value,
            } => {
                let target_ty = self.use_variable(stmt.id, target, stmt.span)?;
                if target_ty != Type::IntArray {
                    return Err(CompileError::semantic(
                        stmt.span,
                        format!("'{}' is {}, not an int array", target, target_ty),
                    ));
                }
                self.expect_type(index, &Type::Int, "array index")?;
                self.expect_type(value, &Type::Int, "array element")?;
            }
        }
        Ok(())
    }

    fn type_of(&mut self, expr: &Expr) -> Result<Type> {
        match &expr.kind {
            ExprKind::Binary { op, left, right } => {
                let operand = match op {
                    BinaryOp::And => Type::Boolean,
                    BinaryOp::Lt | BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => Type::Int,
                };
                let what = format!("operand of '{}'", op.symbol());
                self.expect_type(left, &operand, &what)?;
                self.expect_type(right, &operand, &what)?;
                Ok(match op {
                    BinaryOp::And | BinaryOp::Lt => Type::Boolean,
                    _ => Type::Int,
                })
            }
            ExprKind::ArrayAccess { array, index } => {
                self.expect_type(array, &Type::IntArray, "indexed value")?;
                self.expect_type(index, &Type::Int, "array index")?;
                Ok(Type::Int)
            }
            ExprKind::ArrayLength(array) => {
                self.expect_type(array, &Type::IntArray, "operand of '.length'")?;
                Ok(Type::Int)
            }
            ExprKind::MethodCall {
                owner,
                method,
                args,
            } => {
                let owner_ty = self.type_of(owner)?;
                let Some(class_name) = owner_ty.class_name() else {
                    return Err(CompileError::semantic(
                        owner.span,
                        format!("Cannot call '{}' on a value of type {}", method, owner_ty),
                    ));
                };
                let Some(signature) = self.analysis.symbols.lookup_method(class_name, method) else {
                    return Err(CompileError::semantic(
                        expr.span,
                        format!("Class '{}' has no method '{}'", class_name, method),
                    ));
                };
                if signature.formals.len() != args.len() {
                    return Err(CompileError::semantic(
                        expr.span,
                        format!(
                            "'{}' expects {} arguments, got {}",
                            signature.qualified_name,
                            signature.formals.len(),
                            args.len()
                        ),
                    ));
                }
                let ret = signature.ret.clone();
                let formals: Vec<Type> = signature.formal_types().cloned().collect();
                for (arg, formal) in args.iter().zip(&formals) {
                    let arg_ty = self.type_of(arg)?;
                    self.expect_assignable(&arg_ty, formal, arg.span, "argument")?;
                }
                Ok(ret)
            }
            ExprKind::IntLiteral(_) => Ok(Type::Int),
            ExprKind::True | ExprKind::False => Ok(Type::Boolean),
            ExprKind::Identifier(name) => self.use_variable(expr.id, name, expr.span),
            ExprKind::This => match &self.current_class {
                Some(class_name) => Ok(Type::Class(class_name.clone())),
                None => Err(CompileError::semantic(
                    expr.span,
                    "'this' cannot be used in the main method",
                )),
            },
            ExprKind::NewIntArray(len) => {
                self.expect_type(len, &Type::Int, "array size")?;
                Ok(Type::IntArray)
            }
            ExprKind::NewObject(class_name) => {
                let ty = Type::Class(class_name.clone());
                self.check_type_exists(&ty, expr.span)?;
                Ok(ty)
            }
            ExprKind::Not(operand) => {
                self.expect_type(operand, &Type::Boolean, "operand of '!'")?;
                Ok(Type::Boolean)
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn resolve(&self, node: NodeId, name: &str, span: Span) -> Result<(Type, Storage)> {
        match self.analysis.symbols.resolve_variable(node, name) {
            Some(info) => Ok((info.ty.clone(), info.storage)),
            None => Err(CompileError::semantic(
                span,
                format!("Undeclared identifier '{}'", name),
            )),
        }
    }

    /// Resolve a read of `name`, requiring locals to be initialized
    fn use_variable(&self, node: NodeId, name: &str, span: Span) -> Result<Type> {
        let (ty, storage) = self.resolve(node, name, span)?;
        if storage == Storage::Local && !self.initialized.contains(name) {
            return Err(CompileError::semantic(
                span,
                format!("Variable '{}' may be used before it is initialized", name),
            ));
        }
        Ok(ty)
    }

    fn expect_type(&mut self, expr: &Expr, expected: &Type, what: &str) -> Result<()> {
        let actual = self.type_of(expr)?;
        self.expect_assignable(&actual, expected, expr.span, what)
    }

    fn expect_assignable(&self, actual: &Type, expected: &Type, span: Span, what: &str) -> Result<()> {
        if self.is_assignable(actual, expected) {
            Ok(())
        } else {
            Err(CompileError::semantic(
                span,
                format!("Expected {} of type {}, found {}", what, expected, actual),
            ))
        }
    }

    /// Equal types, or a class assigned to one of its ancestors
    fn is_assignable(&self, from: &Type, to: &Type) -> bool {
        match (from, to) {
            (Type::Class(from), Type::Class(to)) => self.analysis.forest.is_subclass_of(from, to),
            _ => from == to,
        }
    }
}

/// Analyse a program
pub fn analyse(program: &Program, analysis: &Analysis<'_>) -> Result<()> {
    Analyser::new(analysis).analyse(program)?;
    debug!(classes = program.classes.len(), "semantic analysis passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn check(classes: &str) -> Result<()> {
        check_with_main("System.out.println(0);", classes)
    }

    fn check_with_main(main_body: &str, classes: &str) -> Result<()> {
        let source = format!(
            "class Main {{ public static void main(String[] a) {{ {} }} }}\n{}",
            main_body, classes
        );
        let program = parse(&source)?;
        let analysis = Analysis::build(&program)?;
        analyse(&program, &analysis)
    }

    fn error(classes: &str) -> String {
        match check(classes) {
            Err(CompileError::Semantic { message, .. }) => message,
            other => panic!("Expected semantic error, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_program() {
        let result = check_with_main(
            "System.out.println(new Dog().speak(new Dog()));",
            "
            class Animal {
                int legs;
                public int speak(Animal other) { return legs; }
                public Animal self() { return this; }
            }
            class Dog extends Animal {
                int[] tricks;
                public int speak(Animal other) {
                    int n;
                    boolean ok;
                    n = 3;
                    tricks = new int[n];
                    tricks[0] = n;
                    ok = !(n < 2) && true;
                    if (ok) n = n + tricks[0]; else n = tricks.length;
                    while (0 < n) n = n - 1;
                    return n * legs;
                }
                public Dog self() { return this; }
            }
            ",
        );
        assert!(result.is_ok(), "{:?}", result);
    }

    #[test]
    fn test_type_mismatch() {
        let message = error("class A { public int f() { int x; x = true; return x; } }");
        assert!(message.contains("assigned value"));
    }

    #[test]
    fn test_condition_must_be_boolean() {
        let message = error("class A { public int f() { if (1) {} else {} return 0; } }");
        assert!(message.contains("if condition"));
    }

    #[test]
    fn test_println_takes_int() {
        let result = check_with_main("System.out.println(true);", "");
        assert!(matches!(result, Err(CompileError::Semantic { .. })));
    }

    #[test]
    fn test_undeclared_identifier() {
        let message = error("class A { public int f() { return y; } }");
        assert!(message.contains("Undeclared identifier 'y'"));
    }

    #[test]
    fn test_uninitialized_local() {
        let message = error("class A { public int f() { int x; return x; } }");
        assert!(message.contains("before it is initialized"));
    }

    #[test]
    fn test_if_initializes_when_both_arms_assign() {
        assert!(check(
            "class A { public int f(boolean b) { int x; if (b) x = 1; else x = 2; return x; } }"
        )
        .is_ok());

        let message =
            error("class A { public int f(boolean b) { int x; if (b) x = 1; else {} return x; } }");
        assert!(message.contains("'x'"));
    }

    #[test]
    fn test_while_does_not_initialize() {
        let message =
            error("class A { public int f(boolean b) { int x; while (b) x = 1; return x; } }");
        assert!(message.contains("before it is initialized"));
    }

    #[test]
    fn test_fields_and_formals_count_as_initialized() {
        assert!(check("class A { int f; public int g(int p) { return f + p; } }").is_ok());
    }

    #[test]
    fn test_duplicate_field() {
        let message = error("class A { int x; boolean x; }");
        assert!(message.contains("declared twice"));
    }

    #[test]
    fn test_inherited_field_redeclared() {
        let message = error("class A { int x; } class B extends A { int x; }");
        assert!(message.contains("inherited field"));
    }

    #[test]
    fn test_duplicate_method() {
        let message =
            error("class A { public int f() { return 0; } public int f() { return 1; } }");
        assert!(message.contains("Method 'f'"));
    }

    #[test]
    fn test_local_clashing_with_formal() {
        let message = error("class A { public int f(int x) { int x; return 0; } }");
        assert!(message.contains("already declared"));
    }

    #[test]
    fn test_override_with_different_parameters() {
        let message = error(
            "class A { public int f(int x) { return x; } }\n\
             class B extends A { public int f(boolean x) { return 0; } }",
        );
        assert!(message.contains("different parameters"));
    }

    #[test]
    fn test_override_return_must_be_subtype() {
        let message = error(
            "class A { public int f() { return 0; } }\n\
             class B extends A { public boolean f() { return true; } }",
        );
        assert!(message.contains("not a subtype"));
    }

    #[test]
    fn test_unknown_class_type() {
        let message = error("class A { Missing m; }");
        assert!(message.contains("Unknown class 'Missing'"));
    }

    #[test]
    fn test_new_unknown_class() {
        let result = check_with_main("System.out.println(new Missing().f());", "");
        assert!(matches!(result, Err(CompileError::Semantic { .. })));
    }

    #[test]
    fn test_this_in_main() {
        let result = check_with_main("System.out.println(this.f());", "");
        assert!(matches!(result, Err(CompileError::Semantic { message, .. }) if message.contains("'this'")));
    }

    #[test]
    fn test_subtype_assignment() {
        assert!(check(
            "class A { } class B extends A { public A f() { A a; a = new B(); return a; } }"
        )
        .is_ok());

        let message = error(
            "class A { } class B extends A { public B f() { B b; b = new A(); return b; } }",
        );
        assert!(message.contains("assigned value"));
    }

    #[test]
    fn test_method_arity() {
        let message = error(
            "class A { public int f(int x) { return x; } public int g() { return this.f(); } }",
        );
        assert!(message.contains("expects 1 arguments, got 0"));
    }

    #[test]
    fn test_unknown_method() {
        let message = error("class A { public int g() { return this.h(); } }");
        assert!(message.contains("no method 'h'"));
    }

    #[test]
    fn test_call_on_non_object() {
        let message = error("class A { public int g() { return (1).h(); } }");
        assert!(message.contains("Cannot call 'h'"));
    }

    #[test]
    fn test_array_assign_requires_array() {
        let message = error("class A { int n; public int g() { n[0] = 1; return 0; } }");
        assert!(message.contains("not an int array"));
    }
}
