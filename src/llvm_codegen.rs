//! LLVM IR Code Generation for MiniJava
//!
//! Walks the analysed AST and writes textual LLVM IR. Objects are `i8*`
//! blocks whose first 8 bytes point at the class vtable; int arrays are
//! `i32*` blocks whose first slot holds the length.

use tracing::{debug, trace};

use crate::ast::*;
use crate::error::{CompileError, Result};
use crate::llvm_format::{self as fmt, ArithOp, Comparison};
use crate::llvm_types::{ArrayType, IrSignature, IrType};
use crate::registers::{Address, FunctionRegisters, VTableRegistry};
use crate::vtable::MethodSignature;
use crate::Analysis;

/// Result of evaluating an expression: an SSA operand and its MiniJava type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    pub operand: String,
    pub ty: Type,
}

impl Value {
    fn new(operand: impl Into<String>, ty: Type) -> Self {
        Self {
            operand: operand.into(),
            ty,
        }
    }
}

/// LLVM IR text generator
pub struct LLVMCodeGenerator<'a> {
    analysis: &'a Analysis<'a>,
    vtables: VTableRegistry,

    /// Registers of the function being emitted; replaced per function
    registers: FunctionRegisters<'a>,

    /// Class of the method being emitted; `None` inside `main`
    current_class: Option<String>,

    output: String,
}

impl<'a> LLVMCodeGenerator<'a> {
    pub fn new(analysis: &'a Analysis<'a>) -> Self {
        Self {
            analysis,
            vtables: VTableRegistry::new(),
            registers: FunctionRegisters::new(&analysis.symbols),
            current_class: None,
            output: String::new(),
        }
    }

    /// Generate LLVM IR for a program
    pub fn generate(&mut self, program: &Program) -> Result<()> {
        self.output.push_str(&fmt::prologue());
        self.output.push('\n');

        self.generate_vtables();

        self.generate_main(&program.main_class)?;

        for class in &program.classes {
            for method in &class.methods {
                self.generate_method(class, method)?;
            }
        }

        Ok(())
    }

    /// Get the LLVM IR as a string
    pub fn finish(self) -> String {
        self.output
    }

    fn emit(&mut self, line: String) {
        self.output.push_str(&line);
    }

    fn begin_function(&mut self, class_name: Option<&str>) {
        let analysis = self.analysis;
        self.registers = FunctionRegisters::new(&analysis.symbols);
        self.current_class = class_name.map(str::to_string);
    }

    // =========================================================================
    // Globals
    // =========================================================================

    fn generate_vtables(&mut self) {
        let analysis = self.analysis;
        for (class_name, entry) in analysis.classes.iter() {
            let entries: Vec<String> = entry
                .vtable
                .methods()
                .map(|(_, signature)| IrSignature::from_method(signature).vtable_entry())
                .collect();
            let name = self.vtables.allocate(class_name);
            trace!(class = class_name, slots = entries.len(), "vtable");
            self.emit(fmt::global_vtable(&name, &entries));
        }
        self.output.push('\n');
    }

    // =========================================================================
    // Functions
    // =========================================================================

    fn generate_main(&mut self, main_class: &MainClass) -> Result<()> {
        debug!(function = "main", "emitting function");
        self.begin_function(None);

        let signature = IrSignature {
            name: "@main".to_string(),
            ret: IrType::Int,
            params: Vec::new(),
        };
        self.emit(fmt::function_definition(&signature));
        self.generate_statement(&main_class.body)?;
        self.emit(fmt::ret(IrType::Int, "0"));
        self.emit(fmt::function_end());
        self.output.push('\n');

        Ok(())
    }

    fn generate_method(&mut self, class: &ClassDecl, method: &MethodDecl) -> Result<()> {
        let signature = IrSignature::from_method(&MethodSignature::from_decl(&class.name, method));
        debug!(function = %signature.name, "emitting function");
        self.begin_function(Some(&class.name));

        self.emit(fmt::function_definition(&signature));

        // Spill formals so that they are addressable like locals
        for formal in &method.formals {
            let ty = IrType::from(&formal.ty);
            let register = self.registers.stack_register(&formal.name, formal.id);
            self.emit(fmt::alloca(&register, ty));
            self.emit(fmt::store(ty, &format!("%.{}", formal.name), &register));
        }
        for local in &method.locals {
            let register = self.registers.stack_register(&local.name, local.id);
            self.emit(fmt::alloca(&register, IrType::from(&local.ty)));
        }

        for stmt in &method.body {
            self.generate_statement(stmt)?;
        }

        let value = self.generate_expression(&method.ret)?;
        self.emit(fmt::ret(signature.ret, &value.operand));
        self.emit(fmt::function_end());
        self.output.push('\n');

        Ok(())
    }

    // =========================================================================
    // Statement Generation
    // =========================================================================

    fn generate_statement(&mut self, stmt: &Statement) -> Result<()> {
        match &stmt.kind {
            StatementKind::Block(statements) => {
                for s in statements {
                    self.generate_statement(s)?;
                }
            }

            StatementKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.generate_expression(cond)?;
                let then_label = self.registers.new_label("if");
                let else_label = self.registers.new_label("if");
                let end_label = self.registers.new_label("if");

                self.emit(fmt::conditional_branch(&cond.operand, &then_label, &else_label));

                self.emit(fmt::label(&then_label));
                self.generate_statement(then_branch)?;
                self.emit(fmt::branch(&end_label));

                self.emit(fmt::label(&else_label));
                self.generate_statement(else_branch)?;
                self.emit(fmt::branch(&end_label));

                self.emit(fmt::label(&end_label));
            }

            StatementKind::While { cond, body } => {
                let cond_label = self.registers.new_label("loop");
                let body_label = self.registers.new_label("loop");
                let end_label = self.registers.new_label("loop");

                self.emit(fmt::branch(&cond_label));

                self.emit(fmt::label(&cond_label));
                let cond = self.generate_expression(cond)?;
                self.emit(fmt::conditional_branch(&cond.operand, &body_label, &end_label));

                self.emit(fmt::label(&body_label));
                self.generate_statement(body)?;
                self.emit(fmt::branch(&cond_label));

                self.emit(fmt::label(&end_label));
            }

            StatementKind::Print(arg) => {
                let value = self.generate_expression(arg)?;
                self.emit(fmt::call(
                    None,
                    IrType::Void,
                    fmt::PRINT_INT,
                    &[(IrType::Int, value.operand)],
                ));
            }

            StatementKind::Assign { target, value } => {
                let value = self.generate_expression(value)?;
                let (pointer, ty) = self.variable_pointer(target, stmt.id)?;
                self.emit(fmt::store(IrType::from(&ty), &value.operand, &pointer));
            }

            StatementKind::ArrayAssign {
                target,
                index,
                value,
            } => {
                let (pointer, _) = self.variable_pointer(target, stmt.id)?;
                let array = self.registers.new_temp();
                self.emit(fmt::load(&array, IrType::IntPtr, &pointer));

                let index = self.generate_expression(index)?;
                let value = self.generate_expression(value)?;

                let element = self.element_pointer(&array, &index.operand);
                self.emit(fmt::store(IrType::Int, &value.operand, &element));
            }
        }

        Ok(())
    }

    // =========================================================================
    // Expression Generation
    // =========================================================================

    fn generate_expression(&mut self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::Binary { op, left, right } => self.generate_binary(*op, left, right),

            ExprKind::ArrayAccess { array, index } => {
                let array = self.generate_expression(array)?;
                let index = self.generate_expression(index)?;
                let element = self.element_pointer(&array.operand, &index.operand);

                let result = self.registers.new_temp();
                self.emit(fmt::load(&result, IrType::Int, &element));
                Ok(Value::new(result, Type::Int))
            }

            ExprKind::ArrayLength(array) => {
                let array = self.generate_expression(array)?;
                let result = self.registers.new_temp();
                self.emit(fmt::load(&result, IrType::Int, &array.operand));
                Ok(Value::new(result, Type::Int))
            }

            ExprKind::MethodCall {
                owner,
                method,
                args,
            } => self.generate_call(owner, method, args),

            ExprKind::IntLiteral(value) => Ok(Value::new(value.to_string(), Type::Int)),
            ExprKind::True => Ok(Value::new("1", Type::Boolean)),
            ExprKind::False => Ok(Value::new("0", Type::Boolean)),

            ExprKind::Identifier(name) => {
                let (pointer, ty) = self.variable_pointer(name, expr.id)?;
                let result = self.registers.new_temp();
                self.emit(fmt::load(&result, IrType::from(&ty), &pointer));
                Ok(Value::new(result, ty))
            }

            ExprKind::This => match &self.current_class {
                Some(class_name) => Ok(Value::new("%this", Type::Class(class_name.clone()))),
                None => Err(CompileError::codegen("'this' used in the main method")),
            },

            ExprKind::NewIntArray(len) => {
                let len = self.generate_expression(len)?;
                self.bounds_guard("arr_alloc", Comparison::Less, &len.operand, "0");

                // One extra slot in front holds the length
                let size = self.registers.new_temp();
                self.emit(fmt::binary(&size, ArithOp::Add, IrType::Int, &len.operand, "1"));
                let memory = self.registers.new_temp();
                self.emit(fmt::call(
                    Some(&memory),
                    IrType::Address,
                    fmt::CALLOC,
                    &[(IrType::Int, "4".to_string()), (IrType::Int, size)],
                ));
                let array = self.registers.new_temp();
                self.emit(fmt::bitcast(&array, IrType::Address, &memory, IrType::IntPtr));
                self.emit(fmt::store(IrType::Int, &len.operand, &array));

                Ok(Value::new(array, Type::IntArray))
            }

            ExprKind::NewObject(class_name) => self.generate_new_object(class_name),

            ExprKind::Not(operand) => {
                let operand = self.generate_expression(operand)?;
                let result = self.registers.new_temp();
                self.emit(fmt::binary(&result, ArithOp::Sub, IrType::Bool, "1", &operand.operand));
                Ok(Value::new(result, Type::Boolean))
            }
        }
    }

    fn generate_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value> {
        let arith = match op {
            BinaryOp::And => return self.generate_and(left, right),
            BinaryOp::Lt => None,
            BinaryOp::Add => Some(ArithOp::Add),
            BinaryOp::Sub => Some(ArithOp::Sub),
            BinaryOp::Mul => Some(ArithOp::Mul),
        };

        let left = self.generate_expression(left)?;
        let right = self.generate_expression(right)?;
        let result = self.registers.new_temp();

        match arith {
            Some(arith) => {
                self.emit(fmt::binary(&result, arith, IrType::Int, &left.operand, &right.operand));
                Ok(Value::new(result, Type::Int))
            }
            None => {
                self.emit(fmt::compare(&result, Comparison::Less, IrType::Int, &left.operand, &right.operand));
                Ok(Value::new(result, Type::Boolean))
            }
        }
    }

    /// `left && right`, skipping `right` when `left` is false
    fn generate_and(&mut self, left: &Expr, right: &Expr) -> Result<Value> {
        let left = self.generate_expression(left)?;

        let check_left = self.registers.new_label("andcond");
        let eval_right = self.registers.new_label("andcond");
        let right_done = self.registers.new_label("andcond");
        let join = self.registers.new_label("andcond");

        self.emit(fmt::branch(&check_left));

        self.emit(fmt::label(&check_left));
        self.emit(fmt::conditional_branch(&left.operand, &eval_right, &join));

        // `right` may open blocks of its own; `right_done` is the phi predecessor
        self.emit(fmt::label(&eval_right));
        let right = self.generate_expression(right)?;
        self.emit(fmt::branch(&right_done));

        self.emit(fmt::label(&right_done));
        self.emit(fmt::branch(&join));

        self.emit(fmt::label(&join));
        let result = self.registers.new_temp();
        self.emit(fmt::phi(
            &result,
            IrType::Bool,
            &[("0", &check_left), (&right.operand, &right_done)],
        ));

        Ok(Value::new(result, Type::Boolean))
    }

    fn generate_call(&mut self, owner: &Expr, method: &str, args: &[Expr]) -> Result<Value> {
        let owner = self.generate_expression(owner)?;
        let class_name = owner.ty.class_name().ok_or_else(|| {
            CompileError::codegen(format!("Call to '{}' on a non-object of type {}", method, owner.ty))
        })?;

        let analysis = self.analysis;
        let vtable = analysis
            .classes
            .vtable(class_name)
            .ok_or_else(|| CompileError::codegen(format!("No vtable for class '{}'", class_name)))?;
        let (slot, method_sig) = vtable
            .method_slot(method)
            .zip(vtable.method(method))
            .ok_or_else(|| {
                CompileError::codegen(format!("Class '{}' has no method '{}'", class_name, method))
            })?;
        let signature = IrSignature::from_method(method_sig);

        // Object -> vtable -> slot -> typed function pointer
        let header = self.registers.new_temp();
        self.emit(fmt::bitcast(&header, IrType::Address, &owner.operand, IrType::AddressPtrPtr));
        let table = self.registers.new_temp();
        self.emit(fmt::load(&table, IrType::AddressPtr, &header));
        let slot_ptr = self.registers.new_temp();
        self.emit(fmt::getelementptr(&slot_ptr, IrType::Address, &table, &[&slot.to_string()]));
        let entry = self.registers.new_temp();
        self.emit(fmt::load(&entry, IrType::Address, &slot_ptr));
        let function = self.registers.new_temp();
        self.emit(fmt::bitcast_to_signature(&function, IrType::Address, &entry, &signature));

        let mut actuals = vec![(IrType::Address, owner.operand.clone())];
        for (arg, param) in args.iter().zip(signature.params.iter().skip(1)) {
            let value = self.generate_expression(arg)?;
            actuals.push((param.ty, value.operand));
        }

        let result = self.registers.new_temp();
        self.emit(fmt::call(Some(&result), signature.ret, &function, &actuals));
        Ok(Value::new(result, method_sig.ret.clone()))
    }

    fn generate_new_object(&mut self, class_name: &str) -> Result<Value> {
        let analysis = self.analysis;
        let vtable = analysis
            .classes
            .vtable(class_name)
            .ok_or_else(|| CompileError::codegen(format!("Unknown class '{}'", class_name)))?;

        let object = self.registers.new_temp();
        self.emit(fmt::call(
            Some(&object),
            IrType::Address,
            fmt::CALLOC,
            &[
                (IrType::Int, "1".to_string()),
                (IrType::Int, vtable.physical_size().to_string()),
            ],
        ));

        let header = self.registers.new_temp();
        self.emit(fmt::bitcast(&header, IrType::Address, &object, IrType::AddressPtrPtr));

        let global = self.vtables.allocate(class_name);
        let table = self.registers.new_temp();
        self.emit(fmt::getelementptr(
            &table,
            ArrayType::new(vtable.method_count(), IrType::Address),
            &global,
            &["0", "0"],
        ));
        self.emit(fmt::store(IrType::AddressPtr, &table, &header));

        Ok(Value::new(object, Type::Class(class_name.to_string())))
    }

    // =========================================================================
    // Variables and Arrays
    // =========================================================================

    /// Pointer to the storage of `name` as seen from node `at`
    fn variable_pointer(&mut self, name: &str, at: NodeId) -> Result<(String, Type)> {
        match self.registers.address(name, at)? {
            Address::Stack { register, ty } => Ok((register, ty)),
            Address::Field { name, ty } => {
                let pointer = self.field_pointer(&name, &ty)?;
                Ok((pointer, ty))
            }
        }
    }

    /// `%this + offset`, cast to a pointer to the field type
    fn field_pointer(&mut self, name: &str, ty: &Type) -> Result<String> {
        let class_name = self
            .current_class
            .as_deref()
            .ok_or_else(|| CompileError::codegen(format!("Field '{}' accessed outside a class", name)))?;
        let offset = self
            .analysis
            .classes
            .vtable(class_name)
            .and_then(|vtable| vtable.field_offset(name))
            .ok_or_else(|| {
                CompileError::codegen(format!("Class '{}' has no field '{}'", class_name, name))
            })?;

        let byte = self.registers.new_temp();
        self.emit(fmt::getelementptr(&byte, IrType::Byte, "%this", &[&offset.to_string()]));
        let typed = self.registers.new_temp();
        self.emit(fmt::bitcast(&typed, IrType::Address, &byte, IrType::from(ty).pointer()));
        Ok(typed)
    }

    /// Abort through `@throw_oob` when `lhs <cmp> rhs` holds
    fn bounds_guard(&mut self, prefix: &str, cmp: Comparison, lhs: &str, rhs: &str) {
        let violated = self.registers.new_temp();
        self.emit(fmt::compare(&violated, cmp, IrType::Int, lhs, rhs));

        let fail_label = self.registers.new_label(prefix);
        let ok_label = self.registers.new_label(prefix);
        self.emit(fmt::conditional_branch(&violated, &fail_label, &ok_label));

        self.emit(fmt::label(&fail_label));
        self.emit(fmt::call(None, IrType::Void, fmt::THROW_OOB, &[]));
        self.emit(fmt::branch(&ok_label));

        self.emit(fmt::label(&ok_label));
    }

    /// Checked pointer to element `index` of `array`
    fn element_pointer(&mut self, array: &str, index: &str) -> String {
        self.bounds_guard("oob", Comparison::Less, index, "0");

        let len_ptr = self.registers.new_temp();
        self.emit(fmt::getelementptr(&len_ptr, IrType::Int, array, &["0"]));
        let len = self.registers.new_temp();
        self.emit(fmt::load(&len, IrType::Int, &len_ptr));
        self.bounds_guard("oob", Comparison::LessOrEquals, &len, index);

        let slot = self.registers.new_temp();
        self.emit(fmt::binary(&slot, ArithOp::Add, IrType::Int, index, "1"));
        let element = self.registers.new_temp();
        self.emit(fmt::getelementptr(&element, IrType::Int, array, &[&slot]));
        element
    }
}

/// Generate LLVM IR for an analysed program
pub fn generate_llvm(program: &Program, analysis: &Analysis<'_>) -> Result<String> {
    let mut codegen = LLVMCodeGenerator::new(analysis);
    codegen.generate(program)?;
    Ok(codegen.finish())
}
