use crate::frontend::parser_error::ParserError;
use crate::frontend::token::{SourceLocation, Token, TokenKind, TokenValue};
use crate::lang::node::{
    BinaryOp, Block, Expr, InterpPart, Literal, Stmt, SwitchArm, UnaryOp,
};

/// Recursive-descent parser.
///
/// The parser consumes the full token vector produced by the lexer and
/// builds a [`Block`] of statements. Whitespace, newline, and comment
/// tokens are skipped by `peek` internally rather than filtered up front,
/// so token positions stay valid for diagnostics.
///
/// On an unexpected token at any expectation point the parser records a
/// diagnostic, skips one token and continues; the nodes it returns stay
/// well-formed (placeholder names, empty blocks, `null` literals). The
/// caller decides whether a nonzero diagnostic count fails the pipeline.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParserError>,
    /// Location of the most recently consumed token, for errors at
    /// end-of-input.
    last_location: Option<SourceLocation>,
    eof: Token,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let eof_location = tokens
            .last()
            .map(|t| t.location.clone())
            .unwrap_or_else(SourceLocation::unknown);
        Parser {
            tokens,
            pos: 0,
            errors: Vec::new(),
            last_location: None,
            eof: Token::eof(eof_location),
        }
    }

    /// Parse the whole token stream into a program block.
    pub fn parse(&mut self) -> Block {
        let loc = self.peek().location.clone();
        let mut program = Block::new(loc);
        while self.peek_kind() != TokenKind::Eof {
            program.statements.push(self.parse_statement());
        }
        program
    }

    /// Diagnostics accumulated while parsing.
    pub fn errors(&self) -> &[ParserError] {
        &self.errors
    }

    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    fn skip_trivia(&mut self) {
        while let Some(token) = self.tokens.get(self.pos) {
            match token.kind {
                TokenKind::Whitespace | TokenKind::Newline | TokenKind::Comment => self.pos += 1,
                _ => break,
            }
        }
    }

    fn peek(&mut self) -> &Token {
        self.skip_trivia();
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    fn peek_kind(&mut self) -> TokenKind {
        self.peek().kind
    }

    fn advance(&mut self) -> Token {
        self.skip_trivia();
        match self.tokens.get(self.pos) {
            Some(token) => {
                let token = token.clone();
                self.last_location = Some(token.location.clone());
                self.pos += 1;
                token
            }
            None => self.eof.clone(),
        }
    }

    /// Consume the current token if it has the given kind.
    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Require a token of `kind`. On mismatch, record a diagnostic, skip
    /// one token and return `None`.
    fn expect(&mut self, kind: TokenKind, context: &str) -> Option<Token> {
        if self.peek_kind() == kind {
            return Some(self.advance());
        }
        let found = self.peek().clone();
        self.error_at(
            format!("expected {} {}, found {}", kind, context, found.kind),
            found.location,
        );
        if found.kind != TokenKind::Eof {
            self.advance();
        }
        None
    }

    fn error_at(&mut self, message: String, location: SourceLocation) {
        self.errors.push(ParserError::new(message, location));
    }

    fn error_here(&mut self, message: impl Into<String>) {
        let location = if self.peek_kind() == TokenKind::Eof {
            self.last_location
                .clone()
                .unwrap_or_else(|| self.eof.location.clone())
        } else {
            self.peek().location.clone()
        };
        self.error_at(message.into(), location);
    }

    // ------------------------------------------------------------------
    // Statements and declarations
    // ------------------------------------------------------------------

    fn parse_statement(&mut self) -> Stmt {
        match self.peek_kind() {
            TokenKind::Frame => self.parse_frame(),
            TokenKind::Var | TokenKind::Const => self.parse_var_decl(),
            TokenKind::Func | TokenKind::Function => self.parse_func_decl(),
            TokenKind::Class => self.parse_class_decl(),
            TokenKind::Import => self.parse_import(),
            TokenKind::If => self.parse_if(TokenKind::If),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Try => self.parse_try(),
            TokenKind::OnError => self.parse_on_error(),
            TokenKind::Return => self.parse_return(),
            TokenKind::LBrace => Stmt::Block(self.parse_block()),
            _ => {
                let expr = self.parse_expression();
                self.matches(TokenKind::Semicolon);
                Stmt::Expr(expr)
            }
        }
    }

    /// `frame Name { body }`
    fn parse_frame(&mut self) -> Stmt {
        self.advance(); // frame
        let (name, loc) = self.expect_name("after 'frame'");
        let body = self.parse_block();
        Stmt::Frame { name, body, loc }
    }

    /// `var|const name (= expr)? ;?`
    fn parse_var_decl(&mut self) -> Stmt {
        let keyword = self.advance();
        let is_const = keyword.kind == TokenKind::Const;
        let (name, loc) = self.expect_name("after declaration keyword");
        let init = if self.matches(TokenKind::Assign) {
            Some(self.parse_expression())
        } else {
            None
        };
        self.matches(TokenKind::Semicolon);
        Stmt::VarDecl {
            name,
            is_const,
            init,
            loc,
        }
    }

    /// `func name(a, b) { body }`
    fn parse_func_decl(&mut self) -> Stmt {
        self.advance(); // func | function
        let (name, loc) = self.expect_name("after 'func'");
        let mut params = Vec::new();
        self.expect(TokenKind::LParen, "after function name");
        while !matches!(self.peek_kind(), TokenKind::RParen | TokenKind::Eof) {
            match self.expect(TokenKind::Identifier, "as parameter name") {
                Some(param) => params.push(param.lexeme),
                None => break,
            }
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "after parameter list");
        let body = self.parse_block();
        Stmt::FuncDecl {
            name,
            params,
            body,
            loc,
        }
    }

    /// `class Name { members }`
    fn parse_class_decl(&mut self) -> Stmt {
        self.advance(); // class
        let (name, loc) = self.expect_name("after 'class'");
        let members = self.parse_block();
        Stmt::ClassDecl { name, members, loc }
    }

    /// `import "path" ;?`
    fn parse_import(&mut self) -> Stmt {
        let keyword = self.advance();
        let loc = keyword.location;
        let path = match self.peek_kind() {
            TokenKind::Str => {
                let token = self.advance();
                token.str_value().unwrap_or_default().to_string()
            }
            _ => {
                self.error_here("expected string path after 'import'");
                if self.peek_kind() != TokenKind::Eof {
                    self.advance();
                }
                String::new()
            }
        };
        self.matches(TokenKind::Semicolon);
        Stmt::Import { path, loc }
    }

    /// `if (cond) block (elif (cond) block)* (else block)?`
    ///
    /// An `elif` link parses as an `If` statement hanging off the previous
    /// branch's `else`.
    fn parse_if(&mut self, keyword: TokenKind) -> Stmt {
        debug_assert!(matches!(keyword, TokenKind::If | TokenKind::Elif));
        let kw = self.advance();
        let loc = kw.location;
        self.expect(TokenKind::LParen, "after 'if'");
        let cond = self.parse_expression();
        self.expect(TokenKind::RParen, "after if condition");
        let then_branch = self.parse_block();
        let else_branch = match self.peek_kind() {
            TokenKind::Elif => Some(Box::new(self.parse_if(TokenKind::Elif))),
            TokenKind::Else => {
                self.advance();
                Some(Box::new(Stmt::Block(self.parse_block())))
            }
            _ => None,
        };
        Stmt::If {
            cond,
            then_branch,
            else_branch,
            loc,
        }
    }

    /// `while (cond) block`
    fn parse_while(&mut self) -> Stmt {
        let kw = self.advance();
        let loc = kw.location;
        self.expect(TokenKind::LParen, "after 'while'");
        let cond = self.parse_expression();
        self.expect(TokenKind::RParen, "after while condition");
        let body = self.parse_block();
        Stmt::While { cond, body, loc }
    }

    /// `for (init; cond; step) block` — the initializer may be a
    /// declaration (which consumes its own `;`) or an expression.
    fn parse_for(&mut self) -> Stmt {
        let kw = self.advance();
        let loc = kw.location;
        self.expect(TokenKind::LParen, "after 'for'");
        let init = if matches!(self.peek_kind(), TokenKind::Var | TokenKind::Const) {
            Box::new(self.parse_var_decl())
        } else {
            let expr = self.parse_expression();
            self.expect(TokenKind::Semicolon, "after for initializer");
            Box::new(Stmt::Expr(expr))
        };
        let cond = self.parse_expression();
        self.expect(TokenKind::Semicolon, "after for condition");
        let step = self.parse_expression();
        self.expect(TokenKind::RParen, "after for step");
        let body = self.parse_block();
        Stmt::For {
            init,
            cond,
            step,
            body,
            loc,
        }
    }

    /// `switch (expr) { value => block … else => block }`
    fn parse_switch(&mut self) -> Stmt {
        let kw = self.advance();
        let loc = kw.location;
        self.expect(TokenKind::LParen, "after 'switch'");
        let subject = self.parse_expression();
        self.expect(TokenKind::RParen, "after switch subject");
        self.expect(TokenKind::LBrace, "to open switch body");
        let mut arms = Vec::new();
        let mut default = None;
        while !matches!(self.peek_kind(), TokenKind::RBrace | TokenKind::Eof) {
            if self.matches(TokenKind::Else) {
                self.expect(TokenKind::DoubleArrow, "after 'else' arm");
                default = Some(self.parse_block());
                continue;
            }
            let value = self.parse_expression();
            self.expect(TokenKind::DoubleArrow, "after switch arm value");
            let body = self.parse_block();
            arms.push(SwitchArm { value, body });
        }
        self.expect(TokenKind::RBrace, "to close switch body");
        Stmt::Switch {
            subject,
            arms,
            default,
            loc,
        }
    }

    /// `try block catch (name)? block`
    fn parse_try(&mut self) -> Stmt {
        let kw = self.advance();
        let loc = kw.location;
        let try_block = self.parse_block();
        self.expect(TokenKind::Catch, "after try block");
        let catch_name = if self.matches(TokenKind::LParen) {
            let name = self
                .expect(TokenKind::Identifier, "as catch binding")
                .map(|t| t.lexeme);
            self.expect(TokenKind::RParen, "after catch binding");
            name
        } else {
            None
        };
        let catch_block = self.parse_block();
        Stmt::TryCatch {
            try_block,
            catch_name,
            catch_block,
            loc,
        }
    }

    /// `on_error block`
    fn parse_on_error(&mut self) -> Stmt {
        let kw = self.advance();
        let loc = kw.location;
        let body = self.parse_block();
        Stmt::OnError { body, loc }
    }

    /// `return expr? ;?`
    fn parse_return(&mut self) -> Stmt {
        let kw = self.advance();
        let loc = kw.location;
        let value = match self.peek_kind() {
            TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof => None,
            _ => Some(self.parse_expression()),
        };
        self.matches(TokenKind::Semicolon);
        Stmt::Return { value, loc }
    }

    /// `{ statements }`
    fn parse_block(&mut self) -> Block {
        let loc = self.peek().location.clone();
        let mut block = Block::new(loc);
        if self.expect(TokenKind::LBrace, "to open block").is_none() {
            return block;
        }
        while !matches!(self.peek_kind(), TokenKind::RBrace | TokenKind::Eof) {
            block.statements.push(self.parse_statement());
        }
        self.expect(TokenKind::RBrace, "to close block");
        block
    }

    /// Consume an identifier, falling back to a placeholder name on error.
    fn expect_name(&mut self, context: &str) -> (String, SourceLocation) {
        match self.expect(TokenKind::Identifier, context) {
            Some(token) => {
                let loc = token.location.clone();
                (token.lexeme, loc)
            }
            None => {
                let loc = self
                    .last_location
                    .clone()
                    .unwrap_or_else(SourceLocation::unknown);
                ("<error>".to_string(), loc)
            }
        }
    }

    // ------------------------------------------------------------------
    // Expressions (precedence climbing)
    // ------------------------------------------------------------------

    pub fn parse_expression(&mut self) -> Expr {
        self.parse_assignment()
    }

    /// Assignment is the lowest layer and right-associative.
    fn parse_assignment(&mut self) -> Expr {
        let left = self.parse_logical_or();
        let op = match self.peek_kind() {
            TokenKind::Assign => BinaryOp::Assign,
            TokenKind::PlusAssign => BinaryOp::AddAssign,
            TokenKind::MinusAssign => BinaryOp::SubAssign,
            TokenKind::StarAssign => BinaryOp::MulAssign,
            TokenKind::SlashAssign => BinaryOp::DivAssign,
            TokenKind::PercentAssign => BinaryOp::ModAssign,
            _ => return left,
        };
        self.advance();
        let right = self.parse_assignment();
        let loc = left.location().clone();
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            loc,
        }
    }

    fn parse_logical_or(&mut self) -> Expr {
        let mut left = self.parse_logical_and();
        while self.peek_kind() == TokenKind::Or {
            self.advance();
            let right = self.parse_logical_and();
            left = binary(BinaryOp::Or, left, right);
        }
        left
    }

    fn parse_logical_and(&mut self) -> Expr {
        let mut left = self.parse_bit_or();
        while self.peek_kind() == TokenKind::And {
            self.advance();
            let right = self.parse_bit_or();
            left = binary(BinaryOp::And, left, right);
        }
        left
    }

    fn parse_bit_or(&mut self) -> Expr {
        let mut left = self.parse_bit_xor();
        while self.peek_kind() == TokenKind::BitOr {
            self.advance();
            let right = self.parse_bit_xor();
            left = binary(BinaryOp::BitOr, left, right);
        }
        left
    }

    fn parse_bit_xor(&mut self) -> Expr {
        let mut left = self.parse_bit_and();
        while self.peek_kind() == TokenKind::BitXor {
            self.advance();
            let right = self.parse_bit_and();
            left = binary(BinaryOp::BitXor, left, right);
        }
        left
    }

    fn parse_bit_and(&mut self) -> Expr {
        let mut left = self.parse_equality();
        while self.peek_kind() == TokenKind::BitAnd {
            self.advance();
            let right = self.parse_equality();
            left = binary(BinaryOp::BitAnd, left, right);
        }
        left
    }

    fn parse_equality(&mut self) -> Expr {
        let mut left = self.parse_comparison();
        loop {
            let op = match self.peek_kind() {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison();
            left = binary(op, left, right);
        }
        left
    }

    fn parse_comparison(&mut self) -> Expr {
        let mut left = self.parse_additive();
        loop {
            let op = match self.peek_kind() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::LtEq => BinaryOp::LtEq,
                TokenKind::GtEq => BinaryOp::GtEq,
                TokenKind::Shl => BinaryOp::Shl,
                TokenKind::Shr => BinaryOp::Shr,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive();
            left = binary(op, left, right);
        }
        left
    }

    fn parse_additive(&mut self) -> Expr {
        let mut left = self.parse_multiplicative();
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative();
            left = binary(op, left, right);
        }
        left
    }

    fn parse_multiplicative(&mut self) -> Expr {
        let mut left = self.parse_power();
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_power();
            left = binary(op, left, right);
        }
        left
    }

    /// `**` binds tighter than `*` and is right-associative.
    fn parse_power(&mut self) -> Expr {
        let left = self.parse_unary();
        if self.peek_kind() == TokenKind::Power {
            self.advance();
            let right = self.parse_power();
            return binary(BinaryOp::Pow, left, right);
        }
        left
    }

    fn parse_unary(&mut self) -> Expr {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Not => UnaryOp::Not,
            TokenKind::BitNot => UnaryOp::BitNot,
            _ => return self.parse_postfix(),
        };
        let token = self.advance();
        let operand = self.parse_unary();
        Expr::Unary {
            op,
            operand: Box::new(operand),
            loc: token.location,
        }
    }

    /// Postfix suffixes: call `(…)`, index `[…]`, member `.name`. Calls
    /// collapse left-to-right, so `f(1)(2)` nests the first call as the
    /// second's callee.
    fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    let open = self.advance();
                    let mut args = Vec::new();
                    while !matches!(self.peek_kind(), TokenKind::RParen | TokenKind::Eof) {
                        args.push(self.parse_expression());
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen, "after call arguments");
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        loc: open.location,
                    };
                }
                TokenKind::LBracket => {
                    let open = self.advance();
                    let index = self.parse_expression();
                    self.expect(TokenKind::RBracket, "after index expression");
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        loc: open.location,
                    };
                }
                TokenKind::Dot => {
                    let dot = self.advance();
                    let field = match self.expect(TokenKind::Identifier, "after '.'") {
                        Some(token) => token.lexeme,
                        None => "<error>".to_string(),
                    };
                    expr = Expr::Member {
                        object: Box::new(expr),
                        field,
                        loc: dot.location,
                    };
                }
                _ => break,
            }
        }
        expr
    }

    fn parse_primary(&mut self) -> Expr {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Integer => {
                self.advance();
                let value = match token.value {
                    Some(TokenValue::Int(n)) => n,
                    _ => 0,
                };
                Expr::Literal {
                    value: Literal::Int(value),
                    loc: token.location,
                }
            }
            TokenKind::Float => {
                self.advance();
                let value = match token.value {
                    Some(TokenValue::Float(n)) => n,
                    _ => 0.0,
                };
                Expr::Literal {
                    value: Literal::Float(value),
                    loc: token.location,
                }
            }
            TokenKind::Bool => {
                self.advance();
                let value = matches!(token.value, Some(TokenValue::Bool(true)));
                Expr::Literal {
                    value: Literal::Bool(value),
                    loc: token.location,
                }
            }
            TokenKind::Null => {
                self.advance();
                Expr::Literal {
                    value: Literal::Null,
                    loc: token.location,
                }
            }
            TokenKind::Docstring => {
                self.advance();
                Expr::Literal {
                    value: Literal::Docstring(token.str_value().unwrap_or_default().to_string()),
                    loc: token.location,
                }
            }
            TokenKind::Regex => {
                self.advance();
                Expr::Literal {
                    value: Literal::Regex(token.str_value().unwrap_or_default().to_string()),
                    loc: token.location,
                }
            }
            TokenKind::Str => self.parse_string(),
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression();
                self.expect(TokenKind::RParen, "after parenthesized expression");
                expr
            }
            TokenKind::Identifier => {
                self.advance();
                Expr::Identifier {
                    name: token.lexeme,
                    loc: token.location,
                }
            }
            _ => {
                self.error_here(format!("unexpected token {} in expression", token.kind));
                if token.kind != TokenKind::Eof {
                    self.advance();
                }
                Expr::Literal {
                    value: Literal::Null,
                    loc: token.location,
                }
            }
        }
    }

    /// A string literal, or an interpolation sequence if the lexer split
    /// it: `Str (InterpStart expr InterpEnd Str)+`.
    fn parse_string(&mut self) -> Expr {
        let first = self.advance();
        let loc = first.location.clone();
        let first_text = first.str_value().unwrap_or_default().to_string();
        if self.peek_kind() != TokenKind::InterpStart {
            return Expr::Literal {
                value: Literal::Str(first_text),
                loc,
            };
        }

        let mut parts = vec![InterpPart::Text(first_text)];
        while self.matches(TokenKind::InterpStart) {
            parts.push(InterpPart::Expr(self.parse_expression()));
            self.expect(TokenKind::InterpEnd, "to close interpolation");
            match self.expect(TokenKind::Str, "after interpolation") {
                Some(segment) => {
                    parts.push(InterpPart::Text(
                        segment.str_value().unwrap_or_default().to_string(),
                    ));
                }
                None => break,
            }
        }
        Expr::Interpolation { parts, loc }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let loc = left.location().clone();
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        loc,
    }
}
