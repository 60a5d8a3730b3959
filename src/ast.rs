//! # Abstract Syntax Tree (AST) Types
//!
//! This module defines all type structures for the Tako language AST.
//!
//! ## Type Hierarchy
//! ```text
//! Program
//!   ├── Vec<ImportDecl> (named or star imports)
//!   └── Vec<Decl>
//!         ├── Fn   (name, params, body block, export flag)
//!         ├── Const / Let (name, initializer, export flag)
//!
//! Stmt (enum)
//!   ├── Const | Let | Assign | If | For | Return | Expr
//!
//! Expr (enum)
//!   ├── literals (null, bool, int, float, string, pitch, duration,
//!   │             position reference, tempo)
//!   ├── Ident | Array | Object | Range
//!   ├── Unary | Binary | Call | Member | Index | Match
//!   └── Score | Clip (structured literals with their own statement forms)
//! ```
//!
//! Score and clip literals carry dedicated statement types rather than
//! generic expressions: clip statements drive an implicit cursor during
//! evaluation, and score items populate the tempo/meter/sound/track tables.
//!
//! ## Related Modules
//! - `parser` - Creates these types from Tako source
//! - `eval` - Walks these types to produce runtime values
//! - `error` - `SourcePos` carried by every node

use crate::error::SourcePos;
use crate::pitch::Pitch;

/// A parsed module: imports first, then top-level declarations.
#[derive(Debug, Clone)]
pub struct Program {
    pub imports: Vec<ImportDecl>,
    pub body: Vec<Decl>,
    pub pos: SourcePos,
}

/// `import { a, b as c } from "path";` or `import * as ns from "path";`
#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub names: ImportNames,
    pub from: String,
    pub pos: SourcePos,
}

#[derive(Debug, Clone)]
pub enum ImportNames {
    Named(Vec<ImportName>),
    Star { alias: String },
}

#[derive(Debug, Clone)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportName {
    /// The name the binding takes in the importing module.
    pub fn local(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A top-level declaration.
#[derive(Debug, Clone)]
pub enum Decl {
    Fn(FnDecl),
    Const(BindDecl),
    Let(BindDecl),
}

impl Decl {
    pub fn name(&self) -> &str {
        match self {
            Decl::Fn(f) => &f.name,
            Decl::Const(b) | Decl::Let(b) => &b.name,
        }
    }

    pub fn exported(&self) -> bool {
        match self {
            Decl::Fn(f) => f.exported,
            Decl::Const(b) | Decl::Let(b) => b.exported,
        }
    }
}

/// `fn name(params) [-> Type] { ... }`
#[derive(Debug, Clone)]
pub struct FnDecl {
    pub name: String,
    pub params: Vec<String>,
    /// Optional return type annotation; structural only, not checked.
    pub ret: Option<String>,
    pub body: Block,
    pub exported: bool,
    pub pos: SourcePos,
}

/// `const name = expr;` or `let name = expr;`
#[derive(Debug, Clone)]
pub struct BindDecl {
    pub name: String,
    pub value: Expr,
    pub mutable: bool,
    pub exported: bool,
    pub pos: SourcePos,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub pos: SourcePos,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Const(BindDecl),
    Let(BindDecl),
    Assign {
        target: AssignTarget,
        value: Expr,
        pos: SourcePos,
    },
    If(IfStmt),
    For(ForStmt),
    Return {
        value: Option<Expr>,
        pos: SourcePos,
    },
    Expr(Expr),
}

/// Assignment targets: plain names, object members, and array/object indexes.
#[derive(Debug, Clone)]
pub enum AssignTarget {
    Name(String),
    Member { object: Expr, field: String },
    Index { object: Expr, index: Expr },
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_block: Block,
    pub else_branch: Option<ElseBranch>,
    pub pos: SourcePos,
}

#[derive(Debug, Clone)]
pub enum ElseBranch {
    If(Box<IfStmt>),
    Block(Block),
}

/// `for x in iterable { ... }` - arrays and integer ranges iterate.
#[derive(Debug, Clone)]
pub struct ForStmt {
    pub var: String,
    pub iter: Expr,
    pub body: Block,
    pub pos: SourcePos,
}

/// Binary operators in precedence order (loosest first): `??`, `||`, `&&`,
/// equality, comparison, range, additive, multiplicative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Coalesce,
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Coalesce => "??",
            BinOp::Or => "||",
            BinOp::And => "&&",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
}

/// A call argument: positional, or named via `name: expr`.
#[derive(Debug, Clone)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Expr,
    pub pos: SourcePos,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Null(SourcePos),
    Bool(bool, SourcePos),
    Int(i64, SourcePos),
    Float(f64, SourcePos),
    Str(String, SourcePos),
    PitchLit(Pitch, SourcePos),
    /// Raw duration literal parts; dots applied during evaluation.
    DurationLit {
        num: u32,
        den: u32,
        dots: u8,
        pos: SourcePos,
    },
    PosLit {
        bar: u32,
        beat: u32,
        sub: Option<u32>,
        pos: SourcePos,
    },
    TempoLit(f64, SourcePos),
    Ident(String, SourcePos),
    Array(Vec<Expr>, SourcePos),
    /// Object literal; entries keep insertion order.
    Object(Vec<(String, Expr)>, SourcePos),
    Unary {
        op: UnOp,
        expr: Box<Expr>,
        pos: SourcePos,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: SourcePos,
    },
    Range {
        lo: Box<Expr>,
        hi: Box<Expr>,
        inclusive: bool,
        pos: SourcePos,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Arg>,
        pos: SourcePos,
    },
    Member {
        object: Box<Expr>,
        field: String,
        pos: SourcePos,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        pos: SourcePos,
    },
    Match(Box<MatchExpr>),
    Score(Box<ScoreExpr>),
    Clip(Box<ClipExpr>),
}

impl Expr {
    pub fn pos(&self) -> SourcePos {
        match self {
            Expr::Null(p)
            | Expr::Bool(_, p)
            | Expr::Int(_, p)
            | Expr::Float(_, p)
            | Expr::Str(_, p)
            | Expr::PitchLit(_, p)
            | Expr::TempoLit(_, p)
            | Expr::Ident(_, p)
            | Expr::Array(_, p)
            | Expr::Object(_, p) => *p,
            Expr::DurationLit { pos, .. }
            | Expr::PosLit { pos, .. }
            | Expr::Unary { pos, .. }
            | Expr::Binary { pos, .. }
            | Expr::Range { pos, .. }
            | Expr::Call { pos, .. }
            | Expr::Member { pos, .. }
            | Expr::Index { pos, .. } => *pos,
            Expr::Match(m) => m.pos,
            Expr::Score(s) => s.pos,
            Expr::Clip(c) => c.pos,
        }
    }
}

/// `match subject { pat => expr, ..., _ => expr }`
#[derive(Debug, Clone)]
pub struct MatchExpr {
    pub subject: Expr,
    pub arms: Vec<MatchArm>,
    pub pos: SourcePos,
}

#[derive(Debug, Clone)]
pub struct MatchArm {
    /// `None` is the `_` default arm.
    pub pattern: Option<Expr>,
    pub value: Expr,
    pub pos: SourcePos,
}

// ---------------------------------------------------------------------------
// Score literals

#[derive(Debug, Clone)]
pub struct ScoreExpr {
    pub items: Vec<ScoreItem>,
    pub pos: SourcePos,
}

#[derive(Debug, Clone)]
pub enum ScoreItem {
    /// `meta { title: "..."; ... }`
    Meta {
        entries: Vec<(String, Expr)>,
        pos: SourcePos,
    },
    /// `tempo { <pos> -> <bpm> [unit]; ... }`
    Tempo {
        entries: Vec<TempoEntry>,
        pos: SourcePos,
    },
    /// `meter { <pos> -> N/D; ... }`
    Meter {
        entries: Vec<MeterEntry>,
        pos: SourcePos,
    },
    /// `sound "id" kind instrument { key: expr; ... }`
    Sound {
        id: String,
        kind: String,
        opts: Vec<(String, Expr)>,
        pos: SourcePos,
    },
    /// `track "name" role Instrument sound "id" { ... }`
    Track {
        name: String,
        role: String,
        sound: String,
        body: Vec<TrackStmt>,
        pos: SourcePos,
    },
    /// `marker <pos> <kind> <label>;`
    Marker {
        at: Expr,
        kind: Expr,
        label: Expr,
        pos: SourcePos,
    },
}

#[derive(Debug, Clone)]
pub struct TempoEntry {
    pub at: Expr,
    pub bpm: Expr,
    /// Note value that carries the beat; defaults to a quarter note.
    pub unit: Option<Expr>,
    pub pos: SourcePos,
}

#[derive(Debug, Clone)]
pub struct MeterEntry {
    pub at: Expr,
    pub numerator: u32,
    pub denominator: u32,
    pub pos: SourcePos,
}

#[derive(Debug, Clone)]
pub enum TrackStmt {
    /// `place <pos> <clip-expr>;`
    Place {
        at: Expr,
        clip: Expr,
        pos: SourcePos,
    },
    /// `mix { gain: expr; pan: expr; }`
    Mix {
        entries: Vec<(String, Expr)>,
        pos: SourcePos,
    },
}

// ---------------------------------------------------------------------------
// Clip literals

#[derive(Debug, Clone)]
pub struct ClipExpr {
    pub stmts: Vec<ClipStmt>,
    pub pos: SourcePos,
}

/// Clip body statements. `At` repositions the cursor; `Rest`, `Note`,
/// `Chord`, `Hit` and `Breath` advance it; the rest emit without advancing.
#[derive(Debug, Clone)]
pub enum ClipStmt {
    At {
        target: Expr,
        pos: SourcePos,
    },
    Rest {
        dur: Expr,
        pos: SourcePos,
    },
    Note {
        pitch: Expr,
        dur: Expr,
        opts: Vec<(String, Expr)>,
        pos: SourcePos,
    },
    Chord {
        pitches: Expr,
        dur: Expr,
        opts: Vec<(String, Expr)>,
        pos: SourcePos,
    },
    Hit {
        key: Expr,
        dur: Expr,
        opts: Vec<(String, Expr)>,
        pos: SourcePos,
    },
    Breath {
        dur: Expr,
        opts: Vec<(String, Expr)>,
        pos: SourcePos,
    },
    Control {
        kind: Expr,
        value: Expr,
        opts: Vec<(String, Expr)>,
        pos: SourcePos,
    },
    Automation {
        param: Expr,
        dur: Expr,
        curve: Expr,
        opts: Vec<(String, Expr)>,
        pos: SourcePos,
    },
    Marker {
        kind: Expr,
        label: Expr,
        pos: SourcePos,
    },
}
