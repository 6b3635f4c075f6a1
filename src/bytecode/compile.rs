use log::debug;

use crate::bytecode::compile_error::CompileError;
use crate::bytecode::{Bytecode, Opcode, REGISTER_COUNT};
use crate::lang::node::{BinaryOp, Block, Expr, InterpPart, Literal, Stmt, UnaryOp};
use crate::sema::scope::{Scope, SymbolKind};

/// Maximum number of `(name, entry address)` pairs in the function table.
pub const MAX_FUNCTIONS: usize = 64;

#[derive(Debug, Clone)]
struct FunctionEntry {
    name: String,
    address: i32,
}

/// Register-allocating tree-walk compiler.
///
/// Walks the AST once, lowering every expression into a freshly allocated
/// destination register and every statement into flat instructions with
/// back-patched jumps. Function declarations are compiled inline and
/// recorded in the function table; names resolve through the scope chain
/// first and the function table second.
///
/// The register counter is monotonically increasing and resets to the
/// parameter count at each function body. Allocating past the VM's
/// 16-register file is a compile error.
pub struct Compiler {
    bytecode: Bytecode,
    next_register: i32,
    functions: Vec<FunctionEntry>,
    scope: Option<Box<Scope>>,
    /// Non-fatal findings, surfaced after the walk completes.
    errors: Vec<CompileError>,
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Compiler {
            bytecode: Bytecode::new(),
            next_register: 0,
            functions: Vec::new(),
            scope: Some(Box::new(Scope::new())),
            errors: Vec::new(),
        }
    }

    /// Compile a program block into bytecode. A trailing `HALT` is always
    /// appended. Fatal conditions (register pressure, function-table
    /// overflow, bad callees) abort immediately; collected findings fail
    /// the compilation once the walk has finished.
    pub fn compile(mut self, program: &Block) -> Result<Bytecode, CompileError> {
        self.compile_statements(&program.statements)?;
        self.bytecode.push(Opcode::Halt, 0, 0, 0);

        if let Some(first) = self.errors.first() {
            for later in &self.errors[1..] {
                debug!("additional compile error: {}", later);
            }
            return Err(first.clone());
        }
        Ok(self.bytecode)
    }

    // ------------------------------------------------------------------
    // State helpers
    // ------------------------------------------------------------------

    fn alloc_register(
        &mut self,
        location: &crate::frontend::token::SourceLocation,
    ) -> Result<i32, CompileError> {
        if self.next_register as usize >= REGISTER_COUNT {
            return Err(CompileError::RegisterOverflow {
                location: location.clone(),
            });
        }
        let register = self.next_register;
        self.next_register += 1;
        Ok(register)
    }

    fn add_function(
        &mut self,
        name: &str,
        address: i32,
        location: &crate::frontend::token::SourceLocation,
    ) -> Result<(), CompileError> {
        if self.functions.len() >= MAX_FUNCTIONS {
            return Err(CompileError::FunctionTableOverflow {
                name: name.to_string(),
                location: location.clone(),
            });
        }
        self.functions.push(FunctionEntry {
            name: name.to_string(),
            address,
        });
        Ok(())
    }

    fn lookup_function(&self, name: &str) -> Option<i32> {
        self.functions
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.address)
    }

    fn enter_scope(&mut self) {
        let parent = self.scope.take();
        self.scope = Some(Box::new(Scope::with_parent(parent)));
    }

    fn exit_scope(&mut self) {
        let current = self.scope.take().expect("scope underflow");
        self.scope = current.into_parent();
    }

    fn scope_mut(&mut self) -> &mut Scope {
        self.scope.as_deref_mut().expect("no active scope")
    }

    fn scope(&self) -> &Scope {
        self.scope.as_deref().expect("no active scope")
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn compile_statements(&mut self, statements: &[Stmt]) -> Result<(), CompileError> {
        for stmt in statements {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &Block) -> Result<(), CompileError> {
        self.enter_scope();
        let result = self.compile_statements(&block.statements);
        self.exit_scope();
        result
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Frame { name, body, .. } => {
                self.compile_block(body)?;
                if name == "Main" {
                    match self.lookup_function("main") {
                        Some(address) => {
                            self.bytecode.push(Opcode::Call, address, 0, 0);
                            self.bytecode.push(Opcode::Halt, 0, 0, 0);
                        }
                        None => self.errors.push(CompileError::MissingMain),
                    }
                }
                Ok(())
            }
            Stmt::VarDecl {
                name,
                is_const,
                init,
                loc,
            } => {
                // The variable's binding is the initializer's destination
                // register; an uninitialized variable gets a zeroed one.
                let register = match init {
                    Some(init) => self.compile_expr(init)?,
                    None => {
                        let register = self.alloc_register(loc)?;
                        self.bytecode.push(Opcode::LoadConst, register, 0, 0);
                        register
                    }
                };
                let kind = if *is_const {
                    SymbolKind::Const
                } else {
                    SymbolKind::Var
                };
                self.scope_mut().add(name.clone(), kind, register);
                Ok(())
            }
            Stmt::FuncDecl {
                name,
                params,
                body,
                loc,
            } => {
                let address = self.bytecode.len() as i32;
                self.add_function(name, address, loc)?;

                let saved_register = self.next_register;
                self.enter_scope();
                for (index, param) in params.iter().enumerate() {
                    self.scope_mut()
                        .add(param.clone(), SymbolKind::Var, index as i32);
                }
                self.next_register = params.len() as i32;

                // Body statements share the parameter scope.
                self.compile_statements(&body.statements)?;
                self.bytecode.push(Opcode::Ret, 0, 0, 0);

                self.exit_scope();
                self.next_register = saved_register;
                Ok(())
            }
            Stmt::ClassDecl { members, .. } => {
                // Member declarations compile in sequence; no dispatch is
                // emitted in the core.
                self.compile_block(members)
            }
            Stmt::Import { path, .. } => {
                debug!("import '{}' ignored: module loading is host-side", path);
                Ok(())
            }
            Stmt::Block(block) => self.compile_block(block),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                let cond_register = self.compile_expr(cond)?;
                let jz = self.bytecode.push(Opcode::JumpIfZero, 0, cond_register, 0);
                self.compile_block(then_branch)?;
                match else_branch {
                    Some(else_branch) => {
                        let jump = self.bytecode.push(Opcode::Jump, 0, 0, 0);
                        self.bytecode.patch_op1(jz, self.bytecode.len() as i32);
                        self.compile_stmt(else_branch)?;
                        self.bytecode.patch_op1(jump, self.bytecode.len() as i32);
                    }
                    None => {
                        self.bytecode.patch_op1(jz, self.bytecode.len() as i32);
                    }
                }
                Ok(())
            }
            Stmt::While { cond, body, .. } => {
                let loop_start = self.bytecode.len() as i32;
                let cond_register = self.compile_expr(cond)?;
                let jz = self.bytecode.push(Opcode::JumpIfZero, 0, cond_register, 0);
                self.compile_block(body)?;
                self.bytecode.push(Opcode::Jump, loop_start, 0, 0);
                self.bytecode.patch_op1(jz, self.bytecode.len() as i32);
                Ok(())
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
                ..
            } => {
                self.enter_scope();
                self.compile_stmt(init)?;
                let loop_start = self.bytecode.len() as i32;
                let cond_register = self.compile_expr(cond)?;
                let jz = self.bytecode.push(Opcode::JumpIfZero, 0, cond_register, 0);
                self.compile_statements(&body.statements)?;
                // The increment runs between the body and the back jump.
                self.compile_expr(step)?;
                self.bytecode.push(Opcode::Jump, loop_start, 0, 0);
                self.bytecode.patch_op1(jz, self.bytecode.len() as i32);
                self.exit_scope();
                Ok(())
            }
            Stmt::Switch {
                subject,
                arms,
                default,
                ..
            } => {
                // Desugars to an EQ / JUMP_IF_ZERO chain over the arms.
                let subject_register = self.compile_expr(subject)?;
                let mut end_jumps = Vec::new();
                for arm in arms {
                    let value_register = self.compile_expr(&arm.value)?;
                    let cmp = self.alloc_register(arm.value.location())?;
                    self.bytecode
                        .push(Opcode::Eq, cmp, subject_register, value_register);
                    let skip = self.bytecode.push(Opcode::JumpIfZero, 0, cmp, 0);
                    self.compile_block(&arm.body)?;
                    end_jumps.push(self.bytecode.push(Opcode::Jump, 0, 0, 0));
                    self.bytecode.patch_op1(skip, self.bytecode.len() as i32);
                }
                if let Some(default) = default {
                    self.compile_block(default)?;
                }
                let end = self.bytecode.len() as i32;
                for jump in end_jumps {
                    self.bytecode.patch_op1(jump, end);
                }
                Ok(())
            }
            Stmt::TryCatch {
                try_block,
                catch_block,
                ..
            } => {
                // No unwinding path exists in the instruction set; the try
                // body runs inline and the handler compiles behind a jump.
                self.compile_block(try_block)?;
                let skip = self.bytecode.push(Opcode::Jump, 0, 0, 0);
                self.compile_block(catch_block)?;
                self.bytecode.patch_op1(skip, self.bytecode.len() as i32);
                Ok(())
            }
            Stmt::OnError { body, .. } => {
                let skip = self.bytecode.push(Opcode::Jump, 0, 0, 0);
                self.compile_block(body)?;
                self.bytecode.patch_op1(skip, self.bytecode.len() as i32);
                Ok(())
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.compile_expr(value)?;
                }
                self.bytecode.push(Opcode::Ret, 0, 0, 0);
                Ok(())
            }
            Stmt::Expr(expr) => {
                self.compile_expr(expr)?;
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Compile an expression; the result lands in the returned register.
    fn compile_expr(&mut self, expr: &Expr) -> Result<i32, CompileError> {
        match expr {
            Expr::Literal { value, loc } => match value {
                Literal::Int(n) => {
                    let register = self.alloc_register(loc)?;
                    let operand = match i32::try_from(*n) {
                        Ok(operand) => operand,
                        Err(_) => {
                            self.errors.push(CompileError::OperandOverflow {
                                value: *n,
                                location: loc.clone(),
                            });
                            0
                        }
                    };
                    self.bytecode.push(Opcode::LoadConst, register, operand, 0);
                    Ok(register)
                }
                Literal::Float(f) => {
                    let register = self.alloc_register(loc)?;
                    let index = self.bytecode.intern(&f.to_string());
                    self.bytecode.push(Opcode::LoadConstFloat, register, index, 0);
                    Ok(register)
                }
                Literal::Str(s) | Literal::Docstring(s) | Literal::Regex(s) => {
                    let register = self.alloc_register(loc)?;
                    let index = self.bytecode.intern(s);
                    self.bytecode.push(Opcode::LoadConstStr, register, index, 0);
                    Ok(register)
                }
                Literal::Bool(b) => {
                    let register = self.alloc_register(loc)?;
                    self.bytecode
                        .push(Opcode::LoadConst, register, i32::from(*b), 0);
                    Ok(register)
                }
                Literal::Null => {
                    let register = self.alloc_register(loc)?;
                    self.bytecode.push(Opcode::LoadConst, register, 0, 0);
                    Ok(register)
                }
            },
            Expr::Identifier { name, loc } => self.resolve_identifier(name, loc),
            Expr::Unary { op, operand, loc } => match op {
                UnaryOp::Neg => {
                    let operand_register = self.compile_expr(operand)?;
                    let register = self.alloc_register(loc)?;
                    self.bytecode.push(Opcode::LoadConst, register, 0, 0);
                    self.bytecode
                        .push(Opcode::Sub, register, register, operand_register);
                    Ok(register)
                }
                UnaryOp::Plus => self.compile_expr(operand),
                UnaryOp::Not | UnaryOp::BitNot => {
                    self.errors
                        .push(CompileError::unsupported(format!("operator '{}'", op), loc));
                    self.compile_expr(operand)
                }
            },
            Expr::Binary {
                op, left, right, loc,
            } if op.is_assignment() => self.compile_assignment(*op, left, right, loc),
            Expr::Binary {
                op, left, right, loc,
            } => {
                let left_register = self.compile_expr(left)?;
                let right_register = self.compile_expr(right)?;
                let register = self.alloc_register(loc)?;
                let opcode = match op {
                    BinaryOp::Add => Some(Opcode::Add),
                    BinaryOp::Sub => Some(Opcode::Sub),
                    BinaryOp::Mul => Some(Opcode::Mul),
                    BinaryOp::Div => Some(Opcode::Div),
                    BinaryOp::Eq => Some(Opcode::Eq),
                    BinaryOp::NotEq => Some(Opcode::Neq),
                    _ => None,
                };
                match opcode {
                    Some(opcode) => {
                        self.bytecode
                            .push(opcode, register, left_register, right_register);
                    }
                    None => {
                        self.errors
                            .push(CompileError::unsupported(format!("operator '{}'", op), loc));
                    }
                }
                Ok(register)
            }
            Expr::Call { callee, args, loc } => self.compile_call(callee, args, loc),
            Expr::Index { object, index, loc } => {
                let object_register = self.compile_expr(object)?;
                let index_register = self.compile_expr(index)?;
                let register = self.alloc_register(loc)?;
                self.bytecode
                    .push(Opcode::GetProp, register, object_register, index_register);
                Ok(register)
            }
            Expr::Member { loc, .. } => {
                self.errors.push(CompileError::unsupported(
                    "member access (properties are integer-keyed)",
                    loc,
                ));
                self.alloc_register(loc)
            }
            Expr::Interpolation { parts, loc } => {
                // Every part is coerced and concatenated by the host's
                // `str` native in a single call over a contiguous block.
                let mut part_registers = Vec::with_capacity(parts.len());
                for part in parts {
                    let register = match part {
                        InterpPart::Text(text) => {
                            let register = self.alloc_register(loc)?;
                            let index = self.bytecode.intern(text);
                            self.bytecode.push(Opcode::LoadConstStr, register, index, 0);
                            register
                        }
                        InterpPart::Expr(expr) => self.compile_expr(expr)?,
                    };
                    part_registers.push(register);
                }
                self.emit_native_call("str", &part_registers, loc)
            }
        }
    }

    /// Scope first, function table second; otherwise a dummy register and
    /// a debug diagnostic, with no code emitted.
    fn resolve_identifier(
        &mut self,
        name: &str,
        loc: &crate::frontend::token::SourceLocation,
    ) -> Result<i32, CompileError> {
        if let Some(register) = self.scope().lookup(name).map(|s| s.register) {
            if register >= 0 {
                return Ok(register);
            }
        }
        if let Some(address) = self.lookup_function(name) {
            return Ok(address);
        }
        debug!("{}: unresolved identifier '{}', using dummy register", loc, name);
        self.alloc_register(loc)
    }

    fn compile_assignment(
        &mut self,
        op: BinaryOp,
        target: &Expr,
        value: &Expr,
        loc: &crate::frontend::token::SourceLocation,
    ) -> Result<i32, CompileError> {
        match target {
            Expr::Identifier { name, loc: name_loc } => {
                let target_register = match self.scope().lookup(name).map(|s| s.register) {
                    Some(register) if register >= 0 => register,
                    _ => {
                        debug!("{}: assignment to unresolved '{}'", name_loc, name);
                        return self.compile_expr(value);
                    }
                };
                let value_register = self.compile_expr(value)?;
                match op {
                    BinaryOp::Assign => {
                        self.bytecode
                            .push(Opcode::Move, target_register, value_register, 0);
                    }
                    BinaryOp::AddAssign
                    | BinaryOp::SubAssign
                    | BinaryOp::MulAssign
                    | BinaryOp::DivAssign => {
                        let opcode = match op {
                            BinaryOp::AddAssign => Opcode::Add,
                            BinaryOp::SubAssign => Opcode::Sub,
                            BinaryOp::MulAssign => Opcode::Mul,
                            _ => Opcode::Div,
                        };
                        let scratch = self.alloc_register(loc)?;
                        self.bytecode
                            .push(opcode, scratch, target_register, value_register);
                        self.bytecode.push(Opcode::Move, target_register, scratch, 0);
                    }
                    _ => {
                        self.errors
                            .push(CompileError::unsupported(format!("operator '{}'", op), loc));
                    }
                }
                Ok(target_register)
            }
            Expr::Index { object, index, .. } if op == BinaryOp::Assign => {
                let object_register = self.compile_expr(object)?;
                let index_register = self.compile_expr(index)?;
                let value_register = self.compile_expr(value)?;
                self.bytecode.push(
                    Opcode::SetProp,
                    object_register,
                    index_register,
                    value_register,
                );
                Ok(value_register)
            }
            _ => {
                self.errors
                    .push(CompileError::unsupported("assignment target", loc));
                self.compile_expr(value)
            }
        }
    }

    fn compile_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        loc: &crate::frontend::token::SourceLocation,
    ) -> Result<i32, CompileError> {
        let name = match callee {
            Expr::Identifier { name, .. } => name,
            _ => {
                return Err(CompileError::UnsupportedCallee {
                    location: loc.clone(),
                })
            }
        };

        let mut arg_registers = Vec::with_capacity(args.len());
        for arg in args {
            arg_registers.push(self.compile_expr(arg)?);
        }

        match self.lookup_function(name) {
            Some(address) => {
                // Shuffle arguments into the callee's parameter registers.
                for (index, &register) in arg_registers.iter().enumerate() {
                    self.bytecode.push(Opcode::Move, index as i32, register, 0);
                }
                self.bytecode.push(Opcode::Call, address, 0, 0);
                // The return value conventionally lands in a fresh register
                // allocated for the continuation.
                self.alloc_register(loc)
            }
            None => {
                debug!("callee '{}' not in function table, treating as native", name);
                self.emit_native_call(name, &arg_registers, loc)
            }
        }
    }

    /// Move argument results into a freshly allocated contiguous block and
    /// emit `CALL_NATIVE`. The block keeps the `base..base+argc` contract
    /// even when an argument resolved to a parameter register.
    fn emit_native_call(
        &mut self,
        name: &str,
        arg_registers: &[i32],
        loc: &crate::frontend::token::SourceLocation,
    ) -> Result<i32, CompileError> {
        let base = if arg_registers.is_empty() {
            0
        } else {
            let base = self.alloc_register(loc)?;
            for _ in 1..arg_registers.len() {
                self.alloc_register(loc)?;
            }
            for (index, &register) in arg_registers.iter().enumerate() {
                self.bytecode
                    .push(Opcode::Move, base + index as i32, register, 0);
            }
            base
        };
        let dest = self.alloc_register(loc)?;
        let name_index = self.bytecode.intern(name);
        self.bytecode.push_ex(
            Opcode::CallNative,
            dest,
            name_index,
            arg_registers.len() as i32,
            base,
        );
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;
    use crate::frontend::parser::Parser;

    fn compile(source: &str) -> Bytecode {
        try_compile(source).expect("compilation failed")
    }

    fn try_compile(source: &str) -> Result<Bytecode, CompileError> {
        let mut lexer = Lexer::with_defaults(source);
        let mut parser = Parser::new(lexer.tokenize());
        let program = parser.parse();
        assert!(parser.errors().is_empty(), "parse errors: {:?}", parser.errors());
        Compiler::new().compile(&program)
    }

    fn opcodes(bc: &Bytecode) -> Vec<Opcode> {
        bc.instructions.iter().map(|i| i.opcode).collect()
    }

    // --------------------
    // Literals and variables
    // --------------------

    #[test]
    fn test_trailing_halt_always_appended() {
        let bc = compile("");
        assert_eq!(opcodes(&bc), vec![Opcode::Halt]);
    }

    #[test]
    fn test_int_literal() {
        let bc = compile("42;");
        assert_eq!(bc.instructions[0].opcode, Opcode::LoadConst);
        assert_eq!(bc.instructions[0].op1, 0);
        assert_eq!(bc.instructions[0].op2, 42);
    }

    #[test]
    fn test_bool_literals() {
        let bc = compile("true; false;");
        assert_eq!(bc.instructions[0].op2, 1);
        assert_eq!(bc.instructions[1].op2, 0);
    }

    #[test]
    fn test_float_literal_uses_pool() {
        let bc = compile("3.25;");
        assert_eq!(bc.instructions[0].opcode, Opcode::LoadConstFloat);
        let index = bc.instructions[0].op2;
        assert_eq!(bc.constant_pool.get(index), Some("3.25"));
    }

    #[test]
    fn test_string_literal_interned() {
        let bc = compile("\"hi\"; \"hi\";");
        assert_eq!(bc.instructions[0].opcode, Opcode::LoadConstStr);
        // Same string, same pool index.
        assert_eq!(bc.instructions[0].op2, bc.instructions[1].op2);
        assert_eq!(bc.constant_pool.len(), 1);
    }

    #[test]
    fn test_var_binding_resolves_to_initializer_register() {
        // x binds to the register its initializer wrote, so the reference
        // in the addition reads that register directly.
        let bc = compile("var x = 5; x + 1;");
        // r0 = 5; r1 = 1; r2 = r0 + r1
        let add = bc
            .instructions
            .iter()
            .find(|i| i.opcode == Opcode::Add)
            .unwrap();
        assert_eq!(add.op2, 0);
    }

    #[test]
    fn test_binary_expression_shape() {
        let bc = compile("1 + 2;");
        assert_eq!(
            opcodes(&bc),
            vec![
                Opcode::LoadConst,
                Opcode::LoadConst,
                Opcode::Add,
                Opcode::Halt
            ]
        );
        let add = &bc.instructions[2];
        assert_eq!((add.op1, add.op2, add.op3), (2, 0, 1));
    }

    #[test]
    fn test_unary_minus_shape() {
        // -x lowers to r_d = 0; r_d = r_d - r_x
        let bc = compile("var x = 3; -x;");
        let ops = opcodes(&bc);
        assert_eq!(
            ops,
            vec![
                Opcode::LoadConst, // x = 3
                Opcode::LoadConst, // r_d = 0
                Opcode::Sub,       // r_d - x
                Opcode::Halt
            ]
        );
        let sub = &bc.instructions[2];
        assert_eq!(sub.op1, sub.op2);
        assert_eq!(sub.op3, 0);
    }

    // --------------------
    // Control flow
    // --------------------

    #[test]
    fn test_if_without_else_single_forward_jump() {
        let bc = compile("func f(x) { if (x == 1) { f(x); } }");
        let jumps: Vec<(usize, &crate::bytecode::Instruction)> = bc
            .instructions
            .iter()
            .enumerate()
            .filter(|(_, i)| i.opcode == Opcode::JumpIfZero)
            .collect();
        assert_eq!(jumps.len(), 1, "expected exactly one JUMP_IF_ZERO");
        let (index, jump) = jumps[0];
        // The target is the instruction immediately after the then branch,
        // and it lies forward of the jump.
        let target = jump.op1 as usize;
        assert!(target > index);
        assert_eq!(bc.instructions[target].opcode, Opcode::Ret);
    }

    #[test]
    fn test_if_else_patches_both_jumps() {
        let bc = compile("func f(x) { if (x == 0) { f(1); } else { f(2); } }");
        let jz_pos = bc
            .instructions
            .iter()
            .position(|i| i.opcode == Opcode::JumpIfZero)
            .unwrap();
        let jump_pos = bc
            .instructions
            .iter()
            .position(|i| i.opcode == Opcode::Jump)
            .unwrap();
        let jz = &bc.instructions[jz_pos];
        let jump = &bc.instructions[jump_pos];
        // JUMP_IF_ZERO lands on the else branch (right after the JUMP),
        // the JUMP lands at the join point.
        assert_eq!(jz.op1 as usize, jump_pos + 1);
        assert!(jump.op1 as usize > jump_pos);
        assert_eq!(bc.instructions[jump.op1 as usize].opcode, Opcode::Ret);
    }

    #[test]
    fn test_while_loop_shape() {
        let bc = compile("func f(n) { while (n == 0) { f(n); } }");
        let jz_pos = bc
            .instructions
            .iter()
            .position(|i| i.opcode == Opcode::JumpIfZero)
            .unwrap();
        let back_jump = bc
            .instructions
            .iter()
            .find(|i| i.opcode == Opcode::Jump)
            .unwrap();
        // The back jump returns to the condition, which starts at the
        // function entry (address 0 here).
        assert_eq!(back_jump.op1, 0);
        // The forward jump exits just past the back jump.
        let jz = &bc.instructions[jz_pos];
        assert_eq!(bc.instructions[jz.op1 as usize - 1].opcode, Opcode::Jump);
    }

    #[test]
    fn test_for_loop_increment_before_back_jump() {
        let bc = compile("func f() { for (var i = 0; i == 0; i = i + 1) { f(); } }");
        let back_jump_pos = bc
            .instructions
            .iter()
            .rposition(|i| i.opcode == Opcode::Jump)
            .unwrap();
        // The instruction before the back jump is the increment's MOVE
        // into the loop variable.
        assert_eq!(bc.instructions[back_jump_pos - 1].opcode, Opcode::Move);
    }

    // --------------------
    // Functions and calls
    // --------------------

    #[test]
    fn test_function_entry_recorded_and_called() {
        let bc = compile("frame Main { func main() { } }");
        // Body: RET at address 0; then CALL 0, HALT, final HALT.
        assert_eq!(
            opcodes(&bc),
            vec![Opcode::Ret, Opcode::Call, Opcode::Halt, Opcode::Halt]
        );
        assert_eq!(bc.instructions[1].op1, 0);
    }

    #[test]
    fn test_missing_main_is_error() {
        let err = try_compile("frame Main { var x = 1; }").unwrap_err();
        assert!(matches!(err, CompileError::MissingMain));
    }

    #[test]
    fn test_non_main_frame_needs_no_main() {
        let bc = try_compile("frame Util { func helper() { } }");
        assert!(bc.is_ok());
    }

    #[test]
    fn test_known_call_moves_args_into_param_registers() {
        let bc = compile(
            "frame Main { func add(x, y) { return x + y; } \
             func main() { add(10, 20); } }",
        );
        // Inside main: r0 = 10, r1 = 20, MOVE 0<-r0, MOVE 1<-r1, CALL addr.
        let call = bc
            .instructions
            .iter()
            .position(|i| i.opcode == Opcode::Call && i.op1 == 0)
            .expect("call to add at address 0");
        assert_eq!(bc.instructions[call - 1].opcode, Opcode::Move);
        assert_eq!(bc.instructions[call - 1].op1, 1);
        assert_eq!(bc.instructions[call - 2].opcode, Opcode::Move);
        assert_eq!(bc.instructions[call - 2].op1, 0);
    }

    #[test]
    fn test_unknown_callee_becomes_native_call() {
        let bc = compile("print(7);");
        let native = bc
            .instructions
            .iter()
            .find(|i| i.opcode == Opcode::CallNative)
            .expect("native call emitted");
        assert_eq!(bc.constant_pool.get(native.op2), Some("print"));
        assert_eq!(native.op3, 1);
        // The argument was moved into the contiguous base block.
        let base = native.op4;
        let mv = bc
            .instructions
            .iter()
            .find(|i| i.opcode == Opcode::Move && i.op1 == base)
            .expect("argument moved to base");
        assert_eq!(mv.op2, 0);
    }

    #[test]
    fn test_native_call_args_are_contiguous() {
        let bc = compile("var x = 1; pow(x, 2);");
        let native = bc
            .instructions
            .iter()
            .find(|i| i.opcode == Opcode::CallNative)
            .unwrap();
        assert_eq!(native.op3, 2);
        // Two MOVEs into base and base+1.
        let base = native.op4;
        assert!(bc
            .instructions
            .iter()
            .any(|i| i.opcode == Opcode::Move && i.op1 == base && i.op2 == 0));
        assert!(bc
            .instructions
            .iter()
            .any(|i| i.opcode == Opcode::Move && i.op1 == base + 1));
    }

    #[test]
    fn test_interpolation_coerces_through_str() {
        let bc = compile("var x = 1; \"v=${x}\";");
        let native = bc
            .instructions
            .iter()
            .find(|i| i.opcode == Opcode::CallNative)
            .expect("str call emitted");
        assert_eq!(bc.constant_pool.get(native.op2), Some("str"));
        // Three parts: "v=", the expression, "".
        assert_eq!(native.op3, 3);
    }

    // --------------------
    // Errors
    // --------------------

    #[test]
    fn test_register_overflow_is_error() {
        // A long chain of additions allocates a register per literal and
        // per intermediate result, blowing the 16-register file.
        let source = "1 + 2 + 3 + 4 + 5 + 6 + 7 + 8 + 9 + 10;";
        let err = try_compile(source).unwrap_err();
        assert!(matches!(err, CompileError::RegisterOverflow { .. }));
    }

    #[test]
    fn test_unsupported_operator_is_error() {
        let err = try_compile("var x = 1; x < 2;").unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedOperation { .. }));
    }

    #[test]
    fn test_operand_overflow_is_error() {
        let err = try_compile("5000000000;").unwrap_err();
        assert!(matches!(err, CompileError::OperandOverflow { .. }));
    }

    #[test]
    fn test_assignment_moves_into_binding() {
        let bc = compile("var x = 1; x = 2;");
        // x binds r0; the assignment loads 2 into r1 and moves r1 -> r0.
        let mv = bc
            .instructions
            .iter()
            .find(|i| i.opcode == Opcode::Move)
            .unwrap();
        assert_eq!(mv.op1, 0);
        assert_eq!(mv.op2, 1);
    }

    #[test]
    fn test_compound_assignment_shape() {
        let bc = compile("var x = 1; x += 2;");
        let ops = opcodes(&bc);
        // LOAD 1; LOAD 2; ADD scratch; MOVE back; HALT
        assert_eq!(
            ops,
            vec![
                Opcode::LoadConst,
                Opcode::LoadConst,
                Opcode::Add,
                Opcode::Move,
                Opcode::Halt
            ]
        );
    }

    #[test]
    fn test_index_assignment_uses_setprop() {
        let bc = compile("var o = 1; var k = 2; o[k] = 3;");
        assert!(bc.instructions.iter().any(|i| i.opcode == Opcode::SetProp));
    }

    #[test]
    fn test_index_read_uses_getprop() {
        let bc = compile("var o = 1; var k = 2; o[k];");
        assert!(bc.instructions.iter().any(|i| i.opcode == Opcode::GetProp));
    }
}
