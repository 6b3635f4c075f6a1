//! Scope-based semantic analysis.
//!
//! Runs between the parser and the compiler: checks duplicate
//! declarations, undefined identifiers, and (best-effort) that
//! `if`/`while`/`for` conditions are boolean. Unknown types are
//! tolerated. A nonzero error count aborts the pipeline before
//! compilation.

pub mod scope;

use thiserror::Error;

use crate::frontend::token::SourceLocation;
use crate::lang::node::{BinaryOp, Block, Expr, InterpPart, Literal, Stmt, UnaryOp};
use crate::runtime::natives::NATIVE_NAMES;
use scope::{Scope, SymbolKind};

#[derive(Debug, Clone, Error)]
#[error("{location}: {message}")]
pub struct SemanticError {
    pub message: String,
    pub location: SourceLocation,
}

/// Best-effort inferred type of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeInfo {
    Int,
    Float,
    Bool,
    Str,
    Unknown,
}

pub struct SemanticAnalyzer {
    scope: Option<Box<Scope>>,
    errors: Vec<SemanticError>,
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        SemanticAnalyzer::new()
    }
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        // The global scope is pre-seeded with the host natives so that
        // calls like `print(…)` do not read as undefined identifiers.
        let mut global = Scope::new();
        for name in NATIVE_NAMES {
            global.add(*name, SymbolKind::Func, -1);
        }
        SemanticAnalyzer {
            scope: Some(Box::new(global)),
            errors: Vec::new(),
        }
    }

    /// Analyze a whole program and return the number of errors found.
    pub fn analyze(&mut self, program: &Block) -> usize {
        self.analyze_statements(&program.statements);
        self.errors.len()
    }

    pub fn errors(&self) -> &[SemanticError] {
        &self.errors
    }

    fn report(&mut self, message: String, location: &SourceLocation) {
        self.errors.push(SemanticError {
            message,
            location: location.clone(),
        });
    }

    // ------------------------------------------------------------------
    // Scope plumbing
    // ------------------------------------------------------------------

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

    /// Analyze a statement list in the current scope, hoisting function
    /// and class declarations first so that forward calls resolve.
    fn analyze_statements(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            match stmt {
                Stmt::FuncDecl { name, loc, .. } => {
                    if !self.scope_mut().add(name.clone(), SymbolKind::Func, -1) {
                        self.report(format!("duplicate function '{}' in scope", name), loc);
                    }
                }
                Stmt::ClassDecl { name, loc, .. } => {
                    if !self.scope_mut().add(name.clone(), SymbolKind::Class, -1) {
                        self.report(format!("duplicate class '{}' in scope", name), loc);
                    }
                }
                _ => {}
            }
        }
        for stmt in statements {
            self.analyze_stmt(stmt);
        }
    }

    fn analyze_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Frame { body, .. } => {
                self.enter_scope();
                self.analyze_statements(&body.statements);
                self.exit_scope();
            }
            Stmt::VarDecl {
                name,
                is_const,
                init,
                loc,
            } => {
                let kind = if *is_const {
                    SymbolKind::Const
                } else {
                    SymbolKind::Var
                };
                if !self.scope_mut().add(name.clone(), kind, -1) {
                    self.report(format!("duplicate declaration '{}' in scope", name), loc);
                }
                if let Some(init) = init {
                    self.check_expr(init);
                }
            }
            Stmt::FuncDecl { params, body, loc, .. } => {
                // The function name itself was hoisted by the caller.
                self.enter_scope();
                for param in params {
                    if !self.scope_mut().add(param.clone(), SymbolKind::Var, -1) {
                        self.report(format!("duplicate parameter '{}'", param), loc);
                    }
                }
                // Body statements share the parameter scope.
                self.analyze_statements(&body.statements);
                self.exit_scope();
            }
            Stmt::ClassDecl { members, .. } => {
                self.enter_scope();
                self.analyze_statements(&members.statements);
                self.exit_scope();
            }
            Stmt::Import { .. } => {}
            Stmt::Block(block) => {
                self.enter_scope();
                self.analyze_statements(&block.statements);
                self.exit_scope();
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.check_condition(cond, "if");
                self.enter_scope();
                self.analyze_statements(&then_branch.statements);
                self.exit_scope();
                if let Some(else_branch) = else_branch {
                    self.analyze_stmt(else_branch);
                }
            }
            Stmt::While { cond, body, .. } => {
                self.check_condition(cond, "while");
                self.enter_scope();
                self.analyze_statements(&body.statements);
                self.exit_scope();
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
                ..
            } => {
                // The initializer's binding is visible to the condition,
                // step, and body, but not outside the loop.
                self.enter_scope();
                self.analyze_stmt(init);
                self.check_condition(cond, "for");
                self.check_expr(step);
                self.analyze_statements(&body.statements);
                self.exit_scope();
            }
            Stmt::Switch {
                subject,
                arms,
                default,
                ..
            } => {
                self.check_expr(subject);
                for arm in arms {
                    self.check_expr(&arm.value);
                    self.enter_scope();
                    self.analyze_statements(&arm.body.statements);
                    self.exit_scope();
                }
                if let Some(default) = default {
                    self.enter_scope();
                    self.analyze_statements(&default.statements);
                    self.exit_scope();
                }
            }
            Stmt::TryCatch {
                try_block,
                catch_name,
                catch_block,
                ..
            } => {
                self.enter_scope();
                self.analyze_statements(&try_block.statements);
                self.exit_scope();
                self.enter_scope();
                if let Some(name) = catch_name {
                    self.scope_mut().add(name.clone(), SymbolKind::Var, -1);
                }
                self.analyze_statements(&catch_block.statements);
                self.exit_scope();
            }
            Stmt::OnError { body, .. } => {
                self.enter_scope();
                self.analyze_statements(&body.statements);
                self.exit_scope();
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.check_expr(value);
                }
            }
            Stmt::Expr(expr) => {
                self.check_expr(expr);
            }
        }
    }

    fn check_condition(&mut self, cond: &Expr, construct: &str) {
        let ty = self.check_expr(cond);
        if ty != TypeInfo::Bool && ty != TypeInfo::Unknown {
            self.report(
                format!("{} condition must be bool", construct),
                cond.location(),
            );
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn check_expr(&mut self, expr: &Expr) -> TypeInfo {
        match expr {
            Expr::Literal { value, .. } => match value {
                Literal::Int(_) => TypeInfo::Int,
                Literal::Float(_) => TypeInfo::Float,
                Literal::Bool(_) => TypeInfo::Bool,
                Literal::Str(_) | Literal::Docstring(_) | Literal::Regex(_) => TypeInfo::Str,
                Literal::Null => TypeInfo::Unknown,
            },
            Expr::Identifier { name, loc } => {
                if self.scope().lookup(name).is_none() {
                    self.report(format!("undefined identifier '{}'", name), loc);
                }
                TypeInfo::Unknown
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                let lt = self.check_expr(left);
                let rt = self.check_expr(right);
                match op {
                    BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                        if lt == TypeInfo::Float || rt == TypeInfo::Float {
                            TypeInfo::Float
                        } else {
                            TypeInfo::Int
                        }
                    }
                    BinaryOp::And | BinaryOp::Or => TypeInfo::Bool,
                    BinaryOp::Eq
                    | BinaryOp::NotEq
                    | BinaryOp::Lt
                    | BinaryOp::Gt
                    | BinaryOp::LtEq
                    | BinaryOp::GtEq => TypeInfo::Bool,
                    _ => TypeInfo::Unknown,
                }
            }
            Expr::Unary { op, operand, .. } => {
                let ty = self.check_expr(operand);
                match op {
                    UnaryOp::Neg | UnaryOp::Plus => {
                        if ty == TypeInfo::Int || ty == TypeInfo::Float {
                            ty
                        } else {
                            TypeInfo::Unknown
                        }
                    }
                    UnaryOp::Not => TypeInfo::Bool,
                    UnaryOp::BitNot => TypeInfo::Int,
                }
            }
            Expr::Call { callee, args, .. } => {
                self.check_expr(callee);
                for arg in args {
                    self.check_expr(arg);
                }
                TypeInfo::Unknown
            }
            Expr::Index { object, index, .. } => {
                self.check_expr(object);
                self.check_expr(index);
                TypeInfo::Unknown
            }
            Expr::Member { object, .. } => {
                self.check_expr(object);
                TypeInfo::Unknown
            }
            Expr::Interpolation { parts, .. } => {
                for part in parts {
                    if let InterpPart::Expr(expr) = part {
                        self.check_expr(expr);
                    }
                }
                TypeInfo::Str
            }
        }
    }
}
