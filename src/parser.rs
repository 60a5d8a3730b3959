//! # Parser
//!
//! This module parses tokens from the lexer into an Abstract Syntax Tree.
//!
//! ## Grammar Sketch
//! ```text
//! Program    = Import* TopDecl*
//! Import     = 'import' (Named | '*' 'as' Ident) 'from' String ';'
//! TopDecl    = ['export'] (FnDecl | ConstDecl | LetDecl)
//! FnDecl     = 'fn' Ident '(' Params ')' ['->' Type] Block
//! Statement  = ConstDecl | LetDecl | Assign | If | For | Return | ExprStmt
//! ```
//!
//! Expressions use explicit recursive-descent precedence layers, loosest
//! first: `??` < `||` < `&&` < equality < comparison < range < additive <
//! multiplicative < unary < call/index/member < primary. All binary
//! operators are left-associative except the range operators, which are
//! non-associative.
//!
//! Score and clip literals have their own statement grammars. Clip statement
//! heads (`at`, `rest`, `note`, `chord`, `hit`, `breath`, `cc`,
//! `automation`, `marker`) are contextual identifiers, not keywords, so user
//! code can still use those names for bindings.
//!
//! Single-token lookahead is sufficient everywhere; named call arguments
//! (`name: expr`) need one extra token of peek to distinguish a name from an
//! expression.
//!
//! ## Entry Point
//! `parse(source, file) -> Result<Program, TakoError>`
//!
//! ## Related Modules
//! - `lexer` - Provides the token stream
//! - `ast` - Defines all node types
//! - `error` - `TakoError::Syntax` with file/line/column

use crate::ast::*;
use crate::error::{SourcePos, TakoError};
use crate::lexer::{tokenize, Token, TokenKind};

/// Parser for Tako source code.
pub struct Parser<'a> {
    file: &'a str,
    tokens: Vec<Token>,
    position: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, file: &'a str) -> Self {
        Self {
            file,
            tokens,
            position: 0,
        }
    }

    fn current(&self) -> &Token {
        // the token vector always ends with Eof
        self.tokens
            .get(self.position)
            .unwrap_or_else(|| &self.tokens[self.tokens.len() - 1])
    }

    fn kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_kind(&self, ahead: usize) -> Option<&TokenKind> {
        self.tokens.get(self.position + ahead).map(|t| &t.kind)
    }

    fn pos(&self) -> SourcePos {
        self.current().pos
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.kind() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> Result<Token, TakoError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!(
                "expected {} {}, found {}",
                kind.describe(),
                context,
                self.kind().describe()
            )))
        }
    }

    fn error(&self, message: impl Into<String>) -> TakoError {
        let pos = self.pos();
        TakoError::Syntax {
            file: self.file.to_string(),
            line: pos.line,
            column: pos.column,
            message: message.into(),
        }
    }

    fn expect_ident(&mut self, context: &str) -> Result<String, TakoError> {
        match self.kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!(
                "expected identifier {}, found {}",
                context,
                other.describe()
            ))),
        }
    }

    fn expect_string(&mut self, context: &str) -> Result<String, TakoError> {
        match self.kind().clone() {
            TokenKind::Str(value) => {
                self.advance();
                Ok(value)
            }
            other => Err(self.error(format!(
                "expected string {}, found {}",
                context,
                other.describe()
            ))),
        }
    }

    // -----------------------------------------------------------------------
    // Top level

    pub fn parse_program(&mut self) -> Result<Program, TakoError> {
        let pos = self.pos();
        let mut imports = Vec::new();
        while self.check(&TokenKind::Import) {
            imports.push(self.parse_import()?);
        }
        let mut body = Vec::new();
        while !self.check(&TokenKind::Eof) {
            body.push(self.parse_top_decl()?);
        }
        Ok(Program { imports, body, pos })
    }

    fn parse_import(&mut self) -> Result<ImportDecl, TakoError> {
        let pos = self.pos();
        self.expect(TokenKind::Import, "to begin import")?;
        let names = if self.eat(&TokenKind::Star) {
            self.expect(TokenKind::As, "after '*' in import")?;
            let alias = self.expect_ident("as import namespace alias")?;
            ImportNames::Star { alias }
        } else {
            self.expect(TokenKind::LBrace, "to open import list")?;
            let mut names = Vec::new();
            loop {
                let name = self.expect_ident("in import list")?;
                let alias = if self.eat(&TokenKind::As) {
                    Some(self.expect_ident("after 'as'")?)
                } else {
                    None
                };
                names.push(ImportName { name, alias });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
                if self.check(&TokenKind::RBrace) {
                    break; // trailing comma
                }
            }
            self.expect(TokenKind::RBrace, "to close import list")?;
            ImportNames::Named(names)
        };
        self.expect(TokenKind::From, "after import names")?;
        let from = self.expect_string("as module path")?;
        self.expect(TokenKind::Semi, "after import")?;
        Ok(ImportDecl { names, from, pos })
    }

    fn parse_top_decl(&mut self) -> Result<Decl, TakoError> {
        let exported = self.eat(&TokenKind::Export);
        match self.kind() {
            TokenKind::Fn => Ok(Decl::Fn(self.parse_fn_decl(exported)?)),
            TokenKind::Const => Ok(Decl::Const(self.parse_bind_decl(false, exported)?)),
            TokenKind::Let => Ok(Decl::Let(self.parse_bind_decl(true, exported)?)),
            other => Err(self.error(format!(
                "expected 'fn', 'const' or 'let' at top level, found {}",
                other.describe()
            ))),
        }
    }

    fn parse_fn_decl(&mut self, exported: bool) -> Result<FnDecl, TakoError> {
        let pos = self.pos();
        self.expect(TokenKind::Fn, "to begin function")?;
        let name = self.expect_ident("as function name")?;
        self.expect(TokenKind::LParen, "to open parameter list")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.expect_ident("as parameter name")?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "to close parameter list")?;
        let ret = if self.eat(&TokenKind::Arrow) {
            Some(self.parse_type_name()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        Ok(FnDecl {
            name,
            params,
            ret,
            body,
            exported,
            pos,
        })
    }

    fn parse_type_name(&mut self) -> Result<String, TakoError> {
        match self.kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            TokenKind::Score => {
                self.advance();
                Ok("Score".to_string())
            }
            TokenKind::Clip => {
                self.advance();
                Ok("Clip".to_string())
            }
            other => Err(self.error(format!(
                "expected type name after '->', found {}",
                other.describe()
            ))),
        }
    }

    fn parse_bind_decl(&mut self, mutable: bool, exported: bool) -> Result<BindDecl, TakoError> {
        let pos = self.pos();
        self.advance(); // const / let
        let name = self.expect_ident("as binding name")?;
        self.expect(TokenKind::Assign, "after binding name")?;
        let value = self.parse_expr()?;
        self.expect(TokenKind::Semi, "after binding")?;
        Ok(BindDecl {
            name,
            value,
            mutable,
            exported,
            pos,
        })
    }

    // -----------------------------------------------------------------------
    // Statements

    fn parse_block(&mut self) -> Result<Block, TakoError> {
        let pos = self.pos();
        self.expect(TokenKind::LBrace, "to open block")?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::RBrace, "to close block")?;
        Ok(Block { stmts, pos })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, TakoError> {
        match self.kind() {
            TokenKind::Const => Ok(Stmt::Const(self.parse_bind_decl(false, false)?)),
            TokenKind::Let => Ok(Stmt::Let(self.parse_bind_decl(true, false)?)),
            TokenKind::If => Ok(Stmt::If(self.parse_if()?)),
            TokenKind::For => Ok(Stmt::For(self.parse_for()?)),
            TokenKind::Return => {
                let pos = self.pos();
                self.advance();
                let value = if self.check(&TokenKind::Semi) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(TokenKind::Semi, "after return")?;
                Ok(Stmt::Return { value, pos })
            }
            _ => {
                let pos = self.pos();
                let expr = self.parse_expr()?;
                if self.eat(&TokenKind::Assign) {
                    let target = self.to_assign_target(expr)?;
                    let value = self.parse_expr()?;
                    self.expect(TokenKind::Semi, "after assignment")?;
                    Ok(Stmt::Assign { target, value, pos })
                } else {
                    self.expect(TokenKind::Semi, "after expression statement")?;
                    Ok(Stmt::Expr(expr))
                }
            }
        }
    }

    fn to_assign_target(&self, expr: Expr) -> Result<AssignTarget, TakoError> {
        match expr {
            Expr::Ident(name, _) => Ok(AssignTarget::Name(name)),
            Expr::Member { object, field, .. } => Ok(AssignTarget::Member {
                object: *object,
                field,
            }),
            Expr::Index { object, index, .. } => Ok(AssignTarget::Index {
                object: *object,
                index: *index,
            }),
            _ => Err(self.error("invalid assignment target")),
        }
    }

    fn parse_if(&mut self) -> Result<IfStmt, TakoError> {
        let pos = self.pos();
        self.expect(TokenKind::If, "to begin if")?;
        let cond = self.parse_expr()?;
        let then_block = self.parse_block()?;
        let else_branch = if self.eat(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                Some(ElseBranch::If(Box::new(self.parse_if()?)))
            } else {
                Some(ElseBranch::Block(self.parse_block()?))
            }
        } else {
            None
        };
        Ok(IfStmt {
            cond,
            then_block,
            else_branch,
            pos,
        })
    }

    fn parse_for(&mut self) -> Result<ForStmt, TakoError> {
        let pos = self.pos();
        self.expect(TokenKind::For, "to begin for loop")?;
        let var = self.expect_ident("as loop variable")?;
        self.expect(TokenKind::In, "after loop variable")?;
        let iter = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(ForStmt {
            var,
            iter,
            body,
            pos,
        })
    }

    // -----------------------------------------------------------------------
    // Expressions, loosest precedence first

    pub fn parse_expr(&mut self) -> Result<Expr, TakoError> {
        self.parse_coalesce()
    }

    fn parse_coalesce(&mut self) -> Result<Expr, TakoError> {
        let mut lhs = self.parse_or()?;
        while self.check(&TokenKind::Coalesce) {
            let pos = self.pos();
            self.advance();
            let rhs = self.parse_or()?;
            lhs = Expr::Binary {
                op: BinOp::Coalesce,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Expr, TakoError> {
        let mut lhs = self.parse_and()?;
        while self.check(&TokenKind::OrOr) {
            let pos = self.pos();
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, TakoError> {
        let mut lhs = self.parse_equality()?;
        while self.check(&TokenKind::AndAnd) {
            let pos = self.pos();
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary {
                op: BinOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, TakoError> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.kind() {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::NotEq,
                _ => break,
            };
            let pos = self.pos();
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, TakoError> {
        let mut lhs = self.parse_range()?;
        loop {
            let op = match self.kind() {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Ge => BinOp::Ge,
                _ => break,
            };
            let pos = self.pos();
            self.advance();
            let rhs = self.parse_range()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        Ok(lhs)
    }

    /// Range operators are non-associative: `a..b..c` is a syntax error.
    fn parse_range(&mut self) -> Result<Expr, TakoError> {
        let lhs = self.parse_additive()?;
        let inclusive = match self.kind() {
            TokenKind::DotDot => false,
            TokenKind::DotDotEq => true,
            _ => return Ok(lhs),
        };
        let pos = self.pos();
        self.advance();
        let rhs = self.parse_additive()?;
        if self.check(&TokenKind::DotDot) || self.check(&TokenKind::DotDotEq) {
            return Err(self.error("range operators cannot be chained"));
        }
        Ok(Expr::Range {
            lo: Box::new(lhs),
            hi: Box::new(rhs),
            inclusive,
            pos,
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, TakoError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let pos = self.pos();
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, TakoError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Rem,
                _ => break,
            };
            let pos = self.pos();
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos,
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, TakoError> {
        let pos = self.pos();
        if self.eat(&TokenKind::Bang) {
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnOp::Not,
                expr: Box::new(expr),
                pos,
            });
        }
        if self.eat(&TokenKind::Minus) {
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnOp::Neg,
                expr: Box::new(expr),
                pos,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, TakoError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.kind() {
                TokenKind::LParen => {
                    let pos = self.pos();
                    self.advance();
                    let args = self.parse_args()?;
                    self.expect(TokenKind::RParen, "to close call arguments")?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        pos,
                    };
                }
                TokenKind::Dot => {
                    let pos = self.pos();
                    self.advance();
                    let field = self.expect_ident("after '.'")?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        field,
                        pos,
                    };
                }
                TokenKind::LBracket => {
                    let pos = self.pos();
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket, "to close index")?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        pos,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Call arguments: positional first, then `name: expr` named arguments
    /// in any order (mixing is allowed; the evaluator binds positional
    /// before named).
    fn parse_args(&mut self) -> Result<Vec<Arg>, TakoError> {
        let mut args = Vec::new();
        if self.check(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            let pos = self.pos();
            let named = matches!(self.kind(), TokenKind::Ident(_))
                && matches!(self.peek_kind(1), Some(TokenKind::Colon));
            if named {
                let name = self.expect_ident("as argument name")?;
                self.expect(TokenKind::Colon, "after argument name")?;
                let value = self.parse_expr()?;
                args.push(Arg {
                    name: Some(name),
                    value,
                    pos,
                });
            } else {
                let value = self.parse_expr()?;
                args.push(Arg {
                    name: None,
                    value,
                    pos,
                });
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, TakoError> {
        let pos = self.pos();
        let kind = self.kind().clone();
        match kind {
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Null(pos))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool(true, pos))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool(false, pos))
            }
            TokenKind::Int(n) => {
                self.advance();
                Ok(Expr::Int(n, pos))
            }
            TokenKind::Float(x) => {
                self.advance();
                Ok(Expr::Float(x, pos))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Str(s, pos))
            }
            TokenKind::PitchLit(p) => {
                self.advance();
                Ok(Expr::PitchLit(p, pos))
            }
            TokenKind::DurationLit { num, den, dots } => {
                self.advance();
                Ok(Expr::DurationLit {
                    num,
                    den,
                    dots,
                    pos,
                })
            }
            TokenKind::PosRefLit { bar, beat, sub } => {
                self.advance();
                Ok(Expr::PosLit {
                    bar,
                    beat,
                    sub,
                    pos,
                })
            }
            TokenKind::TempoLit(bpm) => {
                self.advance();
                Ok(Expr::TempoLit(bpm, pos))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Ident(name, pos))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen, "to close parenthesized expression")?;
                Ok(expr)
            }
            TokenKind::LBracket => self.parse_array(pos),
            TokenKind::LBrace => self.parse_object(pos),
            TokenKind::Score => self.parse_score(pos),
            TokenKind::Clip => self.parse_clip(pos),
            TokenKind::Match => self.parse_match(pos),
            other => Err(self.error(format!(
                "expected an expression, found {}",
                other.describe()
            ))),
        }
    }

    fn parse_array(&mut self, pos: SourcePos) -> Result<Expr, TakoError> {
        self.expect(TokenKind::LBracket, "to open array literal")?;
        let mut items = Vec::new();
        if !self.check(&TokenKind::RBracket) {
            loop {
                items.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
                if self.check(&TokenKind::RBracket) {
                    break; // trailing comma
                }
            }
        }
        self.expect(TokenKind::RBracket, "to close array literal")?;
        Ok(Expr::Array(items, pos))
    }

    fn parse_object(&mut self, pos: SourcePos) -> Result<Expr, TakoError> {
        self.expect(TokenKind::LBrace, "to open object literal")?;
        let mut entries = Vec::new();
        if !self.check(&TokenKind::RBrace) {
            loop {
                let key = match self.kind().clone() {
                    TokenKind::Ident(name) => {
                        self.advance();
                        name
                    }
                    TokenKind::Str(s) => {
                        self.advance();
                        s
                    }
                    other => {
                        return Err(self.error(format!(
                            "expected object key, found {}",
                            other.describe()
                        )))
                    }
                };
                self.expect(TokenKind::Colon, "after object key")?;
                let value = self.parse_expr()?;
                entries.push((key, value));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
                if self.check(&TokenKind::RBrace) {
                    break; // trailing comma
                }
            }
        }
        self.expect(TokenKind::RBrace, "to close object literal")?;
        Ok(Expr::Object(entries, pos))
    }

    fn parse_match(&mut self, pos: SourcePos) -> Result<Expr, TakoError> {
        self.expect(TokenKind::Match, "to begin match")?;
        let subject = self.parse_expr()?;
        self.expect(TokenKind::LBrace, "to open match arms")?;
        let mut arms = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            let arm_pos = self.pos();
            let pattern = match self.kind() {
                TokenKind::Ident(name) if name == "_" => {
                    self.advance();
                    None
                }
                _ => Some(self.parse_expr()?),
            };
            self.expect(TokenKind::FatArrow, "after match pattern")?;
            let value = self.parse_expr()?;
            arms.push(MatchArm {
                pattern,
                value,
                pos: arm_pos,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "to close match arms")?;
        Ok(Expr::Match(Box::new(MatchExpr { subject, arms, pos })))
    }

    // -----------------------------------------------------------------------
    // Score literals

    fn parse_score(&mut self, pos: SourcePos) -> Result<Expr, TakoError> {
        self.expect(TokenKind::Score, "to begin score")?;
        self.expect(TokenKind::LBrace, "to open score body")?;
        let mut items = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            items.push(self.parse_score_item()?);
        }
        self.expect(TokenKind::RBrace, "to close score body")?;
        Ok(Expr::Score(Box::new(ScoreExpr { items, pos })))
    }

    fn parse_score_item(&mut self) -> Result<ScoreItem, TakoError> {
        let pos = self.pos();
        match self.kind().clone() {
            TokenKind::Meta => {
                self.advance();
                let entries = self.parse_keyed_block()?;
                self.eat(&TokenKind::Semi);
                Ok(ScoreItem::Meta { entries, pos })
            }
            TokenKind::Tempo => {
                self.advance();
                self.expect(TokenKind::LBrace, "to open tempo block")?;
                let mut entries = Vec::new();
                while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
                    let entry_pos = self.pos();
                    let at = self.parse_expr()?;
                    self.expect(TokenKind::Arrow, "after tempo position")?;
                    let bpm = self.parse_expr()?;
                    let unit = if self.check(&TokenKind::Semi) {
                        None
                    } else {
                        Some(self.parse_expr()?)
                    };
                    self.expect(TokenKind::Semi, "after tempo entry")?;
                    entries.push(TempoEntry {
                        at,
                        bpm,
                        unit,
                        pos: entry_pos,
                    });
                }
                self.expect(TokenKind::RBrace, "to close tempo block")?;
                self.eat(&TokenKind::Semi);
                Ok(ScoreItem::Tempo { entries, pos })
            }
            TokenKind::Meter => {
                self.advance();
                self.expect(TokenKind::LBrace, "to open meter block")?;
                let mut entries = Vec::new();
                while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
                    let entry_pos = self.pos();
                    let at = self.parse_expr()?;
                    self.expect(TokenKind::Arrow, "after meter position")?;
                    let (numerator, denominator) = match self.kind().clone() {
                        TokenKind::DurationLit { num, den, dots: 0 } => {
                            self.advance();
                            (num, den)
                        }
                        other => {
                            return Err(self.error(format!(
                                "expected meter signature like '4/4', found {}",
                                other.describe()
                            )))
                        }
                    };
                    self.expect(TokenKind::Semi, "after meter entry")?;
                    entries.push(MeterEntry {
                        at,
                        numerator,
                        denominator,
                        pos: entry_pos,
                    });
                }
                self.expect(TokenKind::RBrace, "to close meter block")?;
                self.eat(&TokenKind::Semi);
                Ok(ScoreItem::Meter { entries, pos })
            }
            TokenKind::Sound => {
                self.advance();
                let id = self.expect_string("as sound id")?;
                self.expect(TokenKind::Kind, "after sound id")?;
                let kind = self.expect_ident("as sound kind")?;
                let opts = if self.check(&TokenKind::LBrace) {
                    self.parse_keyed_block()?
                } else {
                    Vec::new()
                };
                self.eat(&TokenKind::Semi);
                Ok(ScoreItem::Sound {
                    id,
                    kind,
                    opts,
                    pos,
                })
            }
            TokenKind::Track => {
                self.advance();
                let name = self.expect_string("as track name")?;
                self.expect(TokenKind::Role, "after track name")?;
                let role = self.expect_ident("as track role")?;
                self.expect(TokenKind::Sound, "after track role")?;
                let sound = self.expect_string("as track sound id")?;
                self.expect(TokenKind::LBrace, "to open track body")?;
                let mut body = Vec::new();
                while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
                    body.push(self.parse_track_stmt()?);
                }
                self.expect(TokenKind::RBrace, "to close track body")?;
                self.eat(&TokenKind::Semi);
                Ok(ScoreItem::Track {
                    name,
                    role,
                    sound,
                    body,
                    pos,
                })
            }
            TokenKind::Ident(word) if word == "marker" => {
                self.advance();
                let at = self.parse_expr()?;
                let kind = self.parse_expr()?;
                let label = self.parse_expr()?;
                self.expect(TokenKind::Semi, "after marker")?;
                Ok(ScoreItem::Marker {
                    at,
                    kind,
                    label,
                    pos,
                })
            }
            other => Err(self.error(format!(
                "expected 'meta', 'tempo', 'meter', 'sound', 'track' or 'marker' in score body, found {}",
                other.describe()
            ))),
        }
    }

    /// `{ key: expr; ... }` blocks used by meta, sound options and mix.
    fn parse_keyed_block(&mut self) -> Result<Vec<(String, Expr)>, TakoError> {
        self.expect(TokenKind::LBrace, "to open block")?;
        let mut entries = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            let key = self.expect_ident("as entry key")?;
            self.expect(TokenKind::Colon, "after entry key")?;
            let value = self.parse_expr()?;
            self.expect(TokenKind::Semi, "after entry")?;
            entries.push((key, value));
        }
        self.expect(TokenKind::RBrace, "to close block")?;
        Ok(entries)
    }

    fn parse_track_stmt(&mut self) -> Result<TrackStmt, TakoError> {
        let pos = self.pos();
        match self.kind().clone() {
            TokenKind::Place => {
                self.advance();
                let at = self.parse_expr()?;
                let clip = self.parse_expr()?;
                self.expect(TokenKind::Semi, "after place")?;
                Ok(TrackStmt::Place { at, clip, pos })
            }
            TokenKind::Ident(word) if word == "mix" => {
                self.advance();
                let entries = self.parse_keyed_block()?;
                self.eat(&TokenKind::Semi);
                Ok(TrackStmt::Mix { entries, pos })
            }
            other => Err(self.error(format!(
                "expected 'place' or 'mix' in track body, found {}",
                other.describe()
            ))),
        }
    }

    // -----------------------------------------------------------------------
    // Clip literals

    fn parse_clip(&mut self, pos: SourcePos) -> Result<Expr, TakoError> {
        self.expect(TokenKind::Clip, "to begin clip")?;
        self.expect(TokenKind::LBrace, "to open clip body")?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            stmts.push(self.parse_clip_stmt()?);
        }
        self.expect(TokenKind::RBrace, "to close clip body")?;
        Ok(Expr::Clip(Box::new(ClipExpr { stmts, pos })))
    }

    fn parse_clip_stmt(&mut self) -> Result<ClipStmt, TakoError> {
        let pos = self.pos();
        let head = match self.kind().clone() {
            TokenKind::Ident(word) => word,
            other => {
                return Err(self.error(format!(
                    "expected a clip statement ('at', 'rest', 'note', 'chord', 'hit', 'breath', 'cc', 'automation' or 'marker'), found {}",
                    other.describe()
                )))
            }
        };
        self.advance();
        let stmt = match head.as_str() {
            "at" => {
                let target = self.parse_expr()?;
                ClipStmt::At { target, pos }
            }
            "rest" => {
                let dur = self.parse_expr()?;
                ClipStmt::Rest { dur, pos }
            }
            "note" => {
                let pitch = self.parse_expr()?;
                let dur = self.parse_expr()?;
                let opts = self.parse_opts()?;
                ClipStmt::Note {
                    pitch,
                    dur,
                    opts,
                    pos,
                }
            }
            "chord" => {
                let pitches = self.parse_expr()?;
                let dur = self.parse_expr()?;
                let opts = self.parse_opts()?;
                ClipStmt::Chord {
                    pitches,
                    dur,
                    opts,
                    pos,
                }
            }
            "hit" => {
                let key = self.parse_expr()?;
                let dur = self.parse_expr()?;
                let opts = self.parse_opts()?;
                ClipStmt::Hit {
                    key,
                    dur,
                    opts,
                    pos,
                }
            }
            "breath" => {
                let dur = self.parse_expr()?;
                let opts = self.parse_opts()?;
                ClipStmt::Breath { dur, opts, pos }
            }
            "cc" => {
                let kind = self.parse_expr()?;
                let value = self.parse_expr()?;
                let opts = self.parse_opts()?;
                ClipStmt::Control {
                    kind,
                    value,
                    opts,
                    pos,
                }
            }
            "automation" => {
                let param = self.parse_expr()?;
                let dur = self.parse_expr()?;
                let curve = self.parse_expr()?;
                let opts = self.parse_opts()?;
                ClipStmt::Automation {
                    param,
                    dur,
                    curve,
                    opts,
                    pos,
                }
            }
            "marker" => {
                let kind = self.parse_expr()?;
                let label = self.parse_expr()?;
                ClipStmt::Marker { kind, label, pos }
            }
            other => {
                return Err(self.error(format!(
                    "unknown clip statement '{}'; expected 'at', 'rest', 'note', 'chord', 'hit', 'breath', 'cc', 'automation' or 'marker'",
                    other
                )))
            }
        };
        self.expect(TokenKind::Semi, "after clip statement")?;
        Ok(stmt)
    }

    /// Trailing `name: expr` option pairs, comma separated.
    fn parse_opts(&mut self) -> Result<Vec<(String, Expr)>, TakoError> {
        let mut opts = Vec::new();
        while matches!(self.kind(), TokenKind::Ident(_))
            && matches!(self.peek_kind(1), Some(TokenKind::Colon))
        {
            let name = self.expect_ident("as option name")?;
            self.expect(TokenKind::Colon, "after option name")?;
            let value = self.parse_expr()?;
            opts.push((name, value));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(opts)
    }
}

/// Parse Tako source into a [`Program`].
pub fn parse(source: &str, file: &str) -> Result<Program, TakoError> {
    let tokens = tokenize(source, file)?;
    Parser::new(tokens, file).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Program {
        parse(src, "test.mf").unwrap()
    }

    #[test]
    fn test_minimal_main() {
        let program = parse_ok("export fn main() -> Score { return score {}; }");
        assert_eq!(program.body.len(), 1);
        match &program.body[0] {
            Decl::Fn(f) => {
                assert_eq!(f.name, "main");
                assert!(f.exported);
                assert_eq!(f.ret.as_deref(), Some("Score"));
            }
            other => panic!("expected fn decl, got {:?}", other),
        }
    }

    #[test]
    fn test_imports() {
        let program = parse_ok(
            r#"import { triad, scale as sc } from "std:theory";
               import * as drums from "std:drums";
               export fn main() -> Score { return score {}; }"#,
        );
        assert_eq!(program.imports.len(), 2);
        match &program.imports[0].names {
            ImportNames::Named(names) => {
                assert_eq!(names[0].local(), "triad");
                assert_eq!(names[1].local(), "sc");
                assert_eq!(names[1].name, "scale");
            }
            _ => panic!("expected named import"),
        }
        match &program.imports[1].names {
            ImportNames::Star { alias } => assert_eq!(alias, "drums"),
            _ => panic!("expected star import"),
        }
    }

    #[test]
    fn test_precedence() {
        let program = parse_ok("const x = 1 + 2 * 3 == 7 && true;");
        match &program.body[0] {
            Decl::Const(b) => match &b.value {
                Expr::Binary { op: BinOp::And, lhs, .. } => match lhs.as_ref() {
                    Expr::Binary { op: BinOp::Eq, .. } => {}
                    other => panic!("expected == under &&, got {:?}", other),
                },
                other => panic!("expected && at top, got {:?}", other),
            },
            _ => panic!("expected const"),
        }
    }

    #[test]
    fn test_range_non_associative() {
        assert!(parse("const x = 1..2..3;", "test.mf").is_err());
        let program = parse_ok("const x = 1..=5;");
        match &program.body[0] {
            Decl::Const(b) => match &b.value {
                Expr::Range { inclusive: true, .. } => {}
                other => panic!("expected inclusive range, got {:?}", other),
            },
            _ => panic!("expected const"),
        }
    }

    #[test]
    fn test_named_call_arguments() {
        let program = parse_ok("const c = repeat(x, times: 4);");
        match &program.body[0] {
            Decl::Const(b) => match &b.value {
                Expr::Call { args, .. } => {
                    assert_eq!(args.len(), 2);
                    assert!(args[0].name.is_none());
                    assert_eq!(args[1].name.as_deref(), Some("times"));
                }
                other => panic!("expected call, got {:?}", other),
            },
            _ => panic!("expected const"),
        }
    }

    #[test]
    fn test_score_literal() {
        let program = parse_ok(
            r#"export fn main() -> Score {
                 return score {
                   meter { 1:1 -> 4/4; } tempo { 1:1 -> 120bpm; }
                   sound "s" kind instrument {}
                   track "T" role Instrument sound "s" {
                     place 1:1 clip { note C4 1/4; };
                   }
                 };
               }"#,
        );
        let Decl::Fn(f) = &program.body[0] else {
            panic!("expected fn")
        };
        let Stmt::Return { value: Some(expr), .. } = &f.body.stmts[0] else {
            panic!("expected return")
        };
        let Expr::Score(score) = expr else {
            panic!("expected score literal")
        };
        assert_eq!(score.items.len(), 4);
        match &score.items[3] {
            ScoreItem::Track { name, role, sound, body, .. } => {
                assert_eq!(name, "T");
                assert_eq!(role, "Instrument");
                assert_eq!(sound, "s");
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected track, got {:?}", other),
        }
    }

    #[test]
    fn test_clip_statements() {
        let program = parse_ok(
            r#"const c = clip {
                 at 2:1;
                 rest 1/8;
                 note C4 1/4 vel: 100, lyric: "la";
                 chord [C3, E3, G3] 1/2;
                 hit "kick" 1/4;
                 breath 1/8;
                 cc "sustain" 127;
                 marker "section" "A";
               };"#,
        );
        let Decl::Const(b) = &program.body[0] else {
            panic!("expected const")
        };
        let Expr::Clip(clip) = &b.value else {
            panic!("expected clip literal")
        };
        assert_eq!(clip.stmts.len(), 8);
        match &clip.stmts[2] {
            ClipStmt::Note { opts, .. } => {
                assert_eq!(opts.len(), 2);
                assert_eq!(opts[0].0, "vel");
                assert_eq!(opts[1].0, "lyric");
            }
            other => panic!("expected note, got {:?}", other),
        }
    }

    #[test]
    fn test_match_expression() {
        let program = parse_ok(
            r#"fn pick(x) {
                 return match x { 1 => "one", 2 => "two", _ => "many" };
               }"#,
        );
        let Decl::Fn(f) = &program.body[0] else {
            panic!("expected fn")
        };
        let Stmt::Return { value: Some(Expr::Match(m)), .. } = &f.body.stmts[0] else {
            panic!("expected match return")
        };
        assert_eq!(m.arms.len(), 3);
        assert!(m.arms[2].pattern.is_none());
    }

    #[test]
    fn test_if_else_chain() {
        let program = parse_ok(
            r#"fn f(x) {
                 if x > 2 { return 1; } else if x > 1 { return 2; } else { return 3; }
               }"#,
        );
        let Decl::Fn(f) = &program.body[0] else {
            panic!("expected fn")
        };
        let Stmt::If(i) = &f.body.stmts[0] else {
            panic!("expected if")
        };
        assert!(matches!(i.else_branch, Some(ElseBranch::If(_))));
    }

    #[test]
    fn test_assignment_targets() {
        parse_ok("fn f() { let x = 0; x = 1; }");
        parse_ok("fn f(o) { o.field = 1; o[0] = 2; }");
        assert!(parse("fn f() { 1 = 2; }", "test.mf").is_err());
    }

    #[test]
    fn test_error_messages_name_expected_class() {
        let err = parse("fn main( { }", "test.mf").unwrap_err();
        assert!(err.to_string().contains("expected"));
        let err = parse("const = 1;", "test.mf").unwrap_err();
        assert!(err.to_string().contains("identifier"));
    }

    #[test]
    fn test_for_loop() {
        let program = parse_ok("fn f(xs) { for x in xs { print(x); } for i in 0..4 { print(i); } }");
        let Decl::Fn(f) = &program.body[0] else {
            panic!("expected fn")
        };
        assert_eq!(f.body.stmts.len(), 2);
    }
}
