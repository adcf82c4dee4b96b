//! MiniJava Pretty Printer
//!
//! Writes an AST back out as MiniJava source. Binary operands, method call
//! owners and array operands are always parenthesised, so the output never
//! depends on operator precedence and reparses to the same tree.

use crate::ast::*;

/// Source printer
pub struct SourcePrinter {
    output: String,
    indent: usize,
}

impl SourcePrinter {
    pub fn new() -> Self {
        Self {
            output: String::new(),
            indent: 0,
        }
    }

    pub fn finish(self) -> String {
        self.output
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.output.push('\t');
        }
        self.output.push_str(text);
        self.output.push('\n');
    }

    /// Start an indented line; the caller completes it with `end_line`
    fn begin_line(&mut self) {
        for _ in 0..self.indent {
            self.output.push('\t');
        }
    }

    fn end_line(&mut self, text: &str) {
        self.output.push_str(text);
        self.output.push('\n');
    }

    fn push(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn parenthesised(&mut self, expr: &Expr) {
        self.push("(");
        self.visit_expr(expr);
        self.push(")");
    }

    fn nested(&mut self, stmt: &Statement) {
        if matches!(stmt.kind, StatementKind::Block(_)) {
            self.visit_statement(stmt);
        } else {
            self.indent += 1;
            self.visit_statement(stmt);
            self.indent -= 1;
        }
    }
}

impl Default for SourcePrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl Visitor for SourcePrinter {
    fn visit_program(&mut self, program: &Program) {
        self.visit_main_class(&program.main_class);
        for class in &program.classes {
            self.push("\n");
            self.visit_class(class);
        }
    }

    fn visit_main_class(&mut self, main_class: &MainClass) {
        self.line(&format!("class {} {{", main_class.name));
        self.indent += 1;
        self.line(&format!(
            "public static void main(String[] {}) {{",
            main_class.args_name
        ));
        self.indent += 1;
        self.visit_statement(&main_class.body);
        self.indent -= 1;
        self.line("}");
        self.indent -= 1;
        self.line("}");
    }

    fn visit_class(&mut self, class: &ClassDecl) {
        match &class.super_name {
            Some(super_name) => self.line(&format!("class {} extends {} {{", class.name, super_name)),
            None => self.line(&format!("class {} {{", class.name)),
        }
        self.indent += 1;
        walk_class(self, class);
        self.indent -= 1;
        self.line("}");
    }

    fn visit_var_decl(&mut self, var: &VarDecl) {
        self.begin_line();
        self.visit_type(&var.ty);
        self.end_line(&format!(" {};", var.name));
    }

    fn visit_method(&mut self, method: &MethodDecl) {
        self.begin_line();
        self.push("public ");
        self.visit_type(&method.return_type);
        self.push(&format!(" {}(", method.name));
        for (i, formal) in method.formals.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.visit_formal(formal);
        }
        self.end_line(") {");

        self.indent += 1;
        for local in &method.locals {
            self.visit_var_decl(local);
        }
        for stmt in &method.body {
            self.visit_statement(stmt);
        }
        self.begin_line();
        self.push("return ");
        self.visit_expr(&method.ret);
        self.end_line(";");
        self.indent -= 1;
        self.line("}");
    }

    fn visit_formal(&mut self, formal: &FormalArg) {
        self.visit_type(&formal.ty);
        self.push(&format!(" {}", formal.name));
    }

    fn visit_statement(&mut self, stmt: &Statement) {
        match &stmt.kind {
            StatementKind::Block(statements) => {
                self.line("{");
                self.indent += 1;
                for s in statements {
                    self.visit_statement(s);
                }
                self.indent -= 1;
                self.line("}");
            }
            StatementKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.begin_line();
                self.push("if (");
                self.visit_expr(cond);
                self.end_line(")");
                self.nested(then_branch);
                self.line("else");
                self.nested(else_branch);
            }
            StatementKind::While { cond, body } => {
                self.begin_line();
                self.push("while (");
                self.visit_expr(cond);
                self.end_line(")");
                self.nested(body);
            }
            StatementKind::Print(arg) => {
                self.begin_line();
                self.push("System.out.println(");
                self.visit_expr(arg);
                self.end_line(");");
            }
            StatementKind::Assign { target, value } => {
                self.begin_line();
                self.push(&format!("{} = ", target));
                self.visit_expr(value);
                self.end_line(";");
            }
            StatementKind::ArrayAssign {
                target,
                index,
                value,
            } => {
                self.begin_line();
                self.push(&format!("{}[", target));
                self.visit_expr(index);
                self.push("] = ");
                self.visit_expr(value);
                self.end_line(";");
            }
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Binary { op, left, right } => {
                self.parenthesised(left);
                self.push(&format!(" {} ", op.symbol()));
                self.parenthesised(right);
            }
            ExprKind::ArrayAccess { array, index } => {
                self.parenthesised(array);
                self.push("[");
                self.visit_expr(index);
                self.push("]");
            }
            ExprKind::ArrayLength(array) => {
                self.parenthesised(array);
                self.push(".length");
            }
            ExprKind::MethodCall {
                owner,
                method,
                args,
            } => {
                self.parenthesised(owner);
                self.push(&format!(".{}(", method));
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.visit_expr(arg);
                }
                self.push(")");
            }
            ExprKind::IntLiteral(value) => self.push(&value.to_string()),
            ExprKind::True => self.push("true"),
            ExprKind::False => self.push("false"),
            ExprKind::Identifier(name) => self.push(name),
            ExprKind::This => self.push("this"),
            ExprKind::NewIntArray(len) => {
                self.push("new int[");
                self.visit_expr(len);
                self.push("]");
            }
            ExprKind::NewObject(class_name) => self.push(&format!("new {}()", class_name)),
            ExprKind::Not(operand) => {
                self.push("!");
                self.parenthesised(operand);
            }
        }
    }

    fn visit_type(&mut self, ty: &Type) {
        self.push(&ty.to_string());
    }
}

/// Render a program as MiniJava source
pub fn print_program(program: &Program) -> String {
    let mut printer = SourcePrinter::new();
    program.accept(&mut printer);
    printer.finish()
}
