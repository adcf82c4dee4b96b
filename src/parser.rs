//! MiniJava Parser
//!
//! Recursive descent parser producing the [`Program`] AST. Every node gets a
//! fresh [`NodeId`] in parse order.

use tracing::debug;

use crate::ast::*;
use crate::error::{CompileError, Result, Span};
use crate::lexer::{tokenize, Keyword, SpannedToken, Token};

/// Parser state
pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    next_id: u32,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        Ok(Self {
            tokens,
            pos: 0,
            next_id: 0,
        })
    }

    /// Parse a complete program
    pub fn parse_program(&mut self) -> Result<Program> {
        let main_class = self.parse_main_class()?;

        let mut classes = Vec::new();
        while !self.at_end() {
            classes.push(self.parse_class_decl()?);
        }

        let span = classes
            .last()
            .map(|c| main_class.span.merge(c.span))
            .unwrap_or(main_class.span);

        Ok(Program {
            main_class,
            classes,
            span,
        })
    }

    // =========================================================================
    // Token Management
    // =========================================================================

    fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn current(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn current_token(&self) -> Option<&Token> {
        self.current().map(|t| &t.token)
    }

    fn token_at(&self, pos: usize) -> Option<&Token> {
        self.tokens.get(pos).map(|t| &t.token)
    }

    fn current_span(&self) -> Span {
        self.current()
            .map(|t| t.span)
            .or_else(|| self.tokens.last().map(|t| Span::new(t.span.end, t.span.end)))
            .unwrap_or_default()
    }

    fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            Span::new(0, 0)
        }
    }

    fn advance(&mut self) -> Option<&SpannedToken> {
        if self.pos < self.tokens.len() {
            let token = &self.tokens[self.pos];
            self.pos += 1;
            Some(token)
        } else {
            None
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check(&self, expected: &Token) -> bool {
        self.current_token() == Some(expected)
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.current_token().and_then(|t| t.as_keyword()) == Some(keyword)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        if self.check(&expected) {
            self.advance();
            Ok(())
        } else {
            Err(CompileError::parse(
                self.current_span(),
                format!("Expected {:?}", expected),
            ))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<()> {
        if self.check_keyword(keyword) {
            self.advance();
            Ok(())
        } else {
            Err(CompileError::parse(
                self.current_span(),
                format!("Expected keyword {:?}", keyword),
            ))
        }
    }

    /// `main`, `String` and `length` are ordinary identifiers that only
    /// carry meaning in fixed positions
    fn expect_word(&mut self, word: &str) -> Result<()> {
        match self.current_token() {
            Some(Token::Identifier(name)) if name == word => {
                self.advance();
                Ok(())
            }
            _ => Err(CompileError::parse(
                self.current_span(),
                format!("Expected '{}'", word),
            )),
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.current_token().cloned() {
            Some(token @ Token::Identifier(_)) if token.is_keyword() => Err(CompileError::parse(
                self.current_span(),
                format!("Reserved word {:?} used as identifier", token),
            )),
            Some(Token::Identifier(name)) => {
                self.advance();
                Ok(name)
            }
            _ => Err(CompileError::parse(
                self.current_span(),
                "Expected identifier",
            )),
        }
    }

    fn is_identifier_at(&self, pos: usize) -> bool {
        matches!(self.token_at(pos), Some(t @ Token::Identifier(_)) if !t.is_keyword())
    }

    /// Number of tokens making up a type starting at `pos`, or 0 if none
    fn type_len_at(&self, pos: usize) -> usize {
        match self.token_at(pos) {
            Some(t) if t.as_keyword() == Some(Keyword::Int) => {
                if self.token_at(pos + 1) == Some(&Token::LBracket) {
                    3
                } else {
                    1
                }
            }
            Some(t) if t.as_keyword() == Some(Keyword::Boolean) => 1,
            Some(_) if self.is_identifier_at(pos) => 1,
            _ => 0,
        }
    }

    /// `Type Id` ahead
    fn is_var_decl_start(&self) -> bool {
        let len = self.type_len_at(self.pos);
        len > 0 && self.is_identifier_at(self.pos + len)
    }

    /// `Type Id ;` ahead
    fn is_field_decl_start(&self) -> bool {
        let len = self.type_len_at(self.pos);
        self.is_var_decl_start() && self.token_at(self.pos + len + 1) == Some(&Token::Semicolon)
    }

    // =========================================================================
    // Declaration Parsing
    // =========================================================================

    fn parse_main_class(&mut self) -> Result<MainClass> {
        let start_span = self.current_span();
        self.expect_keyword(Keyword::Class)?;
        let name = self.expect_identifier()?;
        self.expect(Token::LBrace)?;

        self.expect_keyword(Keyword::Public)?;
        self.expect_keyword(Keyword::Static)?;
        self.expect_keyword(Keyword::Void)?;
        self.expect_word("main")?;
        self.expect(Token::LParen)?;
        self.expect_word("String")?;
        self.expect(Token::LBracket)?;
        self.expect(Token::RBracket)?;
        let args_name = self.expect_identifier()?;
        self.expect(Token::RParen)?;

        self.expect(Token::LBrace)?;
        let body = self.parse_statement()?;
        self.expect(Token::RBrace)?;
        self.expect(Token::RBrace)?;

        Ok(MainClass {
            id: self.fresh_id(),
            name,
            args_name,
            body,
            span: start_span.merge(self.prev_span()),
        })
    }

    fn parse_class_decl(&mut self) -> Result<ClassDecl> {
        let start_span = self.current_span();
        self.expect_keyword(Keyword::Class)?;
        let name = self.expect_identifier()?;

        let super_name = if self.check_keyword(Keyword::Extends) {
            self.advance();
            Some(self.expect_identifier()?)
        } else {
            None
        };

        self.expect(Token::LBrace)?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.at_end() {
                return Err(CompileError::parse(
                    self.current_span(),
                    format!("Unterminated class '{}'", name),
                ));
            }
            if !self.check_keyword(Keyword::Public) && self.is_field_decl_start() {
                if !methods.is_empty() {
                    return Err(CompileError::parse(
                        self.current_span(),
                        "Field declarations must precede method declarations",
                    ));
                }
                fields.push(self.parse_var_decl()?);
            } else {
                methods.push(self.parse_method_decl()?);
            }
        }
        self.expect(Token::RBrace)?;

        Ok(ClassDecl {
            id: self.fresh_id(),
            name,
            super_name,
            fields,
            methods,
            span: start_span.merge(self.prev_span()),
        })
    }

    fn parse_var_decl(&mut self) -> Result<VarDecl> {
        let start_span = self.current_span();
        let ty = self.parse_type()?;
        let name = self.expect_identifier()?;
        self.expect(Token::Semicolon)?;

        Ok(VarDecl {
            id: self.fresh_id(),
            ty,
            name,
            span: start_span.merge(self.prev_span()),
        })
    }

    fn parse_method_decl(&mut self) -> Result<MethodDecl> {
        let start_span = self.current_span();
        if self.check_keyword(Keyword::Public) {
            self.advance();
        }

        let return_type = self.parse_type()?;
        let name = self.expect_identifier()?;

        // Formal parameters
        self.expect(Token::LParen)?;
        let mut formals = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let formal_span = self.current_span();
                let ty = self.parse_type()?;
                let formal_name = self.expect_identifier()?;
                formals.push(FormalArg {
                    id: self.fresh_id(),
                    ty,
                    name: formal_name,
                    span: formal_span.merge(self.prev_span()),
                });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;

        self.expect(Token::LBrace)?;

        let mut locals = Vec::new();
        while self.is_var_decl_start() {
            locals.push(self.parse_var_decl()?);
        }

        let mut body = Vec::new();
        while !self.check_keyword(Keyword::Return) {
            if self.at_end() {
                return Err(CompileError::parse(
                    self.current_span(),
                    format!("Method '{}' has no return statement", name),
                ));
            }
            body.push(self.parse_statement()?);
        }

        self.expect_keyword(Keyword::Return)?;
        let ret = self.parse_expression()?;
        self.expect(Token::Semicolon)?;
        self.expect(Token::RBrace)?;

        Ok(MethodDecl {
            id: self.fresh_id(),
            return_type,
            name,
            formals,
            locals,
            body,
            ret,
            span: start_span.merge(self.prev_span()),
        })
    }

    fn parse_type(&mut self) -> Result<Type> {
        if self.check_keyword(Keyword::Int) {
            self.advance();
            if self.eat(&Token::LBracket) {
                self.expect(Token::RBracket)?;
                return Ok(Type::IntArray);
            }
            return Ok(Type::Int);
        }
        if self.check_keyword(Keyword::Boolean) {
            self.advance();
            return Ok(Type::Boolean);
        }
        if self.is_identifier_at(self.pos) {
            let name = self.expect_identifier()?;
            return Ok(Type::Class(name));
        }
        Err(CompileError::parse(self.current_span(), "Expected type"))
    }

    // =========================================================================
    // Statement Parsing
    // =========================================================================

    fn statement(&mut self, kind: StatementKind, start: Span) -> Statement {
        Statement {
            id: self.fresh_id(),
            kind,
            span: start.merge(self.prev_span()),
        }
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        let start = self.current_span();

        if self.eat(&Token::LBrace) {
            let mut statements = Vec::new();
            while !self.check(&Token::RBrace) {
                if self.at_end() {
                    return Err(CompileError::parse(self.current_span(), "Unterminated block"));
                }
                statements.push(self.parse_statement()?);
            }
            self.expect(Token::RBrace)?;
            return Ok(self.statement(StatementKind::Block(statements), start));
        }

        if self.check_keyword(Keyword::If) {
            self.advance();
            self.expect(Token::LParen)?;
            let cond = self.parse_expression()?;
            self.expect(Token::RParen)?;
            let then_branch = Box::new(self.parse_statement()?);
            self.expect_keyword(Keyword::Else)?;
            let else_branch = Box::new(self.parse_statement()?);
            return Ok(self.statement(
                StatementKind::If {
                    cond,
                    then_branch,
                    else_branch,
                },
                start,
            ));
        }

        if self.check_keyword(Keyword::While) {
            self.advance();
            self.expect(Token::LParen)?;
            let cond = self.parse_expression()?;
            self.expect(Token::RParen)?;
            let body = Box::new(self.parse_statement()?);
            return Ok(self.statement(StatementKind::While { cond, body }, start));
        }

        if self.eat(&Token::Println) {
            self.expect(Token::LParen)?;
            let arg = self.parse_expression()?;
            self.expect(Token::RParen)?;
            self.expect(Token::Semicolon)?;
            return Ok(self.statement(StatementKind::Print(arg), start));
        }

        if self.is_identifier_at(self.pos) {
            let target = self.expect_identifier()?;
            if self.eat(&Token::LBracket) {
                let index = self.parse_expression()?;
                self.expect(Token::RBracket)?;
                self.expect(Token::Assign)?;
                let value = self.parse_expression()?;
                self.expect(Token::Semicolon)?;
                return Ok(self.statement(
                    StatementKind::ArrayAssign {
                        target,
                        index,
                        value,
                    },
                    start,
                ));
            }
            self.expect(Token::Assign)?;
            let value = self.parse_expression()?;
            self.expect(Token::Semicolon)?;
            return Ok(self.statement(StatementKind::Assign { target, value }, start));
        }

        Err(CompileError::parse(start, "Expected statement"))
    }

    // =========================================================================
    // Expression Parsing (precedence climbing)
    // =========================================================================

    fn expr(&mut self, kind: ExprKind, start: Span) -> Expr {
        Expr {
            id: self.fresh_id(),
            kind,
            span: start.merge(self.prev_span()),
        }
    }

    fn binary(&mut self, op: BinaryOp, left: Expr, right: Expr) -> Expr {
        let start = left.span;
        self.expr(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            start,
        )
    }

    pub fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_and()
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_less()?;
        while self.eat(&Token::AndAnd) {
            let right = self.parse_less()?;
            left = self.binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_less(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;
        while self.eat(&Token::Lt) {
            let right = self.parse_additive()?;
            left = self.binary(BinaryOp::Lt, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current_token() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        while self.eat(&Token::Star) {
            let right = self.parse_unary()?;
            left = self.binary(BinaryOp::Mul, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let start = self.current_span();
        if self.eat(&Token::Bang) {
            let operand = self.parse_unary()?;
            return Ok(self.expr(ExprKind::Not(Box::new(operand)), start));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let start = self.current_span();
        let mut expr = self.parse_primary()?;

        loop {
            if self.eat(&Token::LBracket) {
                let index = self.parse_expression()?;
                self.expect(Token::RBracket)?;
                expr = self.expr(
                    ExprKind::ArrayAccess {
                        array: Box::new(expr),
                        index: Box::new(index),
                    },
                    start,
                );
            } else if self.eat(&Token::Dot) {
                let is_length = matches!(self.current_token(), Some(Token::Identifier(n)) if n == "length")
                    && self.token_at(self.pos + 1) != Some(&Token::LParen);
                if is_length {
                    self.advance();
                    expr = self.expr(ExprKind::ArrayLength(Box::new(expr)), start);
                    continue;
                }

                let method = self.expect_identifier()?;
                self.expect(Token::LParen)?;
                let mut args = Vec::new();
                if !self.check(&Token::RParen) {
                    loop {
                        args.push(self.parse_expression()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.expect(Token::RParen)?;
                expr = self.expr(
                    ExprKind::MethodCall {
                        owner: Box::new(expr),
                        method,
                        args,
                    },
                    start,
                );
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let start = self.current_span();

        match self.current_token().cloned() {
            Some(Token::Integer(value)) => {
                self.advance();
                let value = i32::try_from(value).map_err(|_| {
                    CompileError::parse(start, format!("Integer literal {} out of range", value))
                })?;
                Ok(self.expr(ExprKind::IntLiteral(value), start))
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(token @ Token::Identifier(_)) => match token.as_keyword() {
                Some(Keyword::True) => {
                    self.advance();
                    Ok(self.expr(ExprKind::True, start))
                }
                Some(Keyword::False) => {
                    self.advance();
                    Ok(self.expr(ExprKind::False, start))
                }
                Some(Keyword::This) => {
                    self.advance();
                    Ok(self.expr(ExprKind::This, start))
                }
                Some(Keyword::New) => {
                    self.advance();
                    if self.check_keyword(Keyword::Int) {
                        self.advance();
                        self.expect(Token::LBracket)?;
                        let len = self.parse_expression()?;
                        self.expect(Token::RBracket)?;
                        return Ok(self.expr(ExprKind::NewIntArray(Box::new(len)), start));
                    }
                    let class_name = self.expect_identifier()?;
                    self.expect(Token::LParen)?;
                    self.expect(Token::RParen)?;
                    Ok(self.expr(ExprKind::NewObject(class_name), start))
                }
                Some(keyword) => Err(CompileError::parse(
                    start,
                    format!("Unexpected keyword {:?} in expression", keyword),
                )),
                None => {
                    let name = self.expect_identifier()?;
                    Ok(self.expr(ExprKind::Identifier(name), start))
                }
            },
            _ => Err(CompileError::parse(start, "Expected expression")),
        }
    }
}

/// Parse source code into a program
pub fn parse(source: &str) -> Result<Program> {
    let program = Parser::new(source)?.parse_program()?;
    debug!(classes = program.classes.len(), "parsed program");
    Ok(program)
}
