use crate::frontend::token::SourceLocation;

/// Decoded literal payload of a `Literal` expression, tagged by the token
/// kind it was lexed from.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Docstring(String),
    Regex(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
}

impl BinaryOp {
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            BinaryOp::Assign
                | BinaryOp::AddAssign
                | BinaryOp::SubAssign
                | BinaryOp::MulAssign
                | BinaryOp::DivAssign
                | BinaryOp::ModAssign
        )
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::LtEq => "<=",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Assign => "=",
            BinaryOp::AddAssign => "+=",
            BinaryOp::SubAssign => "-=",
            BinaryOp::MulAssign => "*=",
            BinaryOp::DivAssign => "/=",
            BinaryOp::ModAssign => "%=",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        };
        f.write_str(s)
    }
}

/// One part of an interpolated string: literal text or an embedded
/// expression lexed between `${` and `}`.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpPart {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        value: Literal,
        loc: SourceLocation,
    },
    Identifier {
        name: String,
        loc: SourceLocation,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        loc: SourceLocation,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        loc: SourceLocation,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        loc: SourceLocation,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        loc: SourceLocation,
    },
    Member {
        object: Box<Expr>,
        field: String,
        loc: SourceLocation,
    },
    Interpolation {
        parts: Vec<InterpPart>,
        loc: SourceLocation,
    },
}

impl Expr {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Expr::Literal { loc, .. }
            | Expr::Identifier { loc, .. }
            | Expr::Binary { loc, .. }
            | Expr::Unary { loc, .. }
            | Expr::Call { loc, .. }
            | Expr::Index { loc, .. }
            | Expr::Member { loc, .. }
            | Expr::Interpolation { loc, .. } => loc,
        }
    }
}

/// A brace-delimited statement sequence. The program itself is one Block.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub loc: SourceLocation,
}

impl Block {
    pub fn new(loc: SourceLocation) -> Self {
        Block {
            statements: Vec::new(),
            loc,
        }
    }
}

/// One arm of a `switch` statement: `value => block`.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchArm {
    pub value: Expr,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `frame Name { … }` — a named top-level namespace. `Main` is the
    /// program entry point.
    Frame {
        name: String,
        body: Block,
        loc: SourceLocation,
    },
    /// `var name = expr;` / `const name = expr;`
    VarDecl {
        name: String,
        is_const: bool,
        init: Option<Expr>,
        loc: SourceLocation,
    },
    /// `func name(a, b) { … }` (`function` is accepted as a synonym).
    FuncDecl {
        name: String,
        params: Vec<String>,
        body: Block,
        loc: SourceLocation,
    },
    /// `class Name { members }`
    ClassDecl {
        name: String,
        members: Block,
        loc: SourceLocation,
    },
    /// `import "path"`
    Import {
        path: String,
        loc: SourceLocation,
    },
    Block(Block),
    /// `if (cond) block (elif …)* (else block)?` — `elif` chains become a
    /// nested `If` in the else branch.
    If {
        cond: Expr,
        then_branch: Block,
        else_branch: Option<Box<Stmt>>,
        loc: SourceLocation,
    },
    While {
        cond: Expr,
        body: Block,
        loc: SourceLocation,
    },
    For {
        init: Box<Stmt>,
        cond: Expr,
        step: Expr,
        body: Block,
        loc: SourceLocation,
    },
    Switch {
        subject: Expr,
        arms: Vec<SwitchArm>,
        default: Option<Block>,
        loc: SourceLocation,
    },
    TryCatch {
        try_block: Block,
        catch_name: Option<String>,
        catch_block: Block,
        loc: SourceLocation,
    },
    OnError {
        body: Block,
        loc: SourceLocation,
    },
    Return {
        value: Option<Expr>,
        loc: SourceLocation,
    },
    Expr(Expr),
}

impl Stmt {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Stmt::Frame { loc, .. }
            | Stmt::VarDecl { loc, .. }
            | Stmt::FuncDecl { loc, .. }
            | Stmt::ClassDecl { loc, .. }
            | Stmt::Import { loc, .. }
            | Stmt::If { loc, .. }
            | Stmt::While { loc, .. }
            | Stmt::For { loc, .. }
            | Stmt::Switch { loc, .. }
            | Stmt::TryCatch { loc, .. }
            | Stmt::OnError { loc, .. }
            | Stmt::Return { loc, .. } => loc,
            Stmt::Block(block) => &block.loc,
            Stmt::Expr(expr) => expr.location(),
        }
    }

    /// Human-readable node name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Stmt::Frame { .. } => "frame",
            Stmt::VarDecl { is_const: false, .. } => "var declaration",
            Stmt::VarDecl { is_const: true, .. } => "const declaration",
            Stmt::FuncDecl { .. } => "function declaration",
            Stmt::ClassDecl { .. } => "class declaration",
            Stmt::Import { .. } => "import",
            Stmt::Block(_) => "block",
            Stmt::If { .. } => "if",
            Stmt::While { .. } => "while",
            Stmt::For { .. } => "for",
            Stmt::Switch { .. } => "switch",
            Stmt::TryCatch { .. } => "try/catch",
            Stmt::OnError { .. } => "on_error",
            Stmt::Return { .. } => "return",
            Stmt::Expr(_) => "expression",
        }
    }
}
