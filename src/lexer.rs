//! # Lexer
//!
//! Turns Tako source text into a token stream with position tracking. The
//! lexer recognizes the musically-aware literals of the language alongside
//! conventional syntax:
//!
//! - **Pitch literals** (`C4`, `F#3`, `Bb-1`) are lexed speculatively: on an
//!   uppercase `A`-`G` the lexer consumes a pitch shape, and backtracks to an
//!   identifier when the result is immediately followed by an identifier
//!   character (`C4foo` is an identifier, not a pitch).
//! - **Numeric runs** disambiguate in order: `bar:beat[:sub]` position
//!   references, `n/d` duration literals (with trailing dots for dotted
//!   notes), floats, then integers. A `bpm` suffix yields a tempo literal.
//!
//! Every token carries `{line, column, offset}`. The lexer fails with
//! [`TakoError::Syntax`] at the first unrecoverable character.

use crate::error::{SourcePos, TakoError};
use crate::pitch::Pitch;

/// Token kinds for the Tako language.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Int(i64),
    Float(f64),
    Str(String),
    PitchLit(Pitch),
    /// Raw duration literal; `num`/`den` are kept unreduced so the meter
    /// grammar can read `4/4` as written. Each dot extends by half again.
    DurationLit {
        num: u32,
        den: u32,
        dots: u8,
    },
    /// `bar:beat` or `bar:beat:sub` position reference.
    PosRefLit {
        bar: u32,
        beat: u32,
        sub: Option<u32>,
    },
    /// A number with the `bpm` suffix.
    TempoLit(f64),
    Ident(String),

    // Keywords
    Fn,
    Const,
    Let,
    If,
    Else,
    For,
    In,
    Return,
    Match,
    Import,
    Export,
    From,
    As,
    True,
    False,
    Null,
    Score,
    Clip,
    Track,
    Sound,
    Meta,
    Tempo,
    Meter,
    Place,
    Role,
    Kind,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
    Coalesce,
    DotDot,
    DotDotEq,
    Arrow,
    FatArrow,
    Assign,
    Dot,
    Comma,
    Semi,
    Colon,
    At,

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    Eof,
}

impl TokenKind {
    /// Human-readable description for error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Int(n) => format!("integer '{}'", n),
            TokenKind::Float(x) => format!("float '{}'", x),
            TokenKind::Str(s) => format!("string \"{}\"", s),
            TokenKind::PitchLit(p) => format!("pitch '{}'", p),
            TokenKind::DurationLit { num, den, .. } => format!("duration '{}/{}'", num, den),
            TokenKind::PosRefLit { bar, beat, .. } => format!("position '{}:{}'", bar, beat),
            TokenKind::TempoLit(bpm) => format!("tempo '{}bpm'", bpm),
            TokenKind::Ident(name) => format!("identifier '{}'", name),
            TokenKind::Eof => "end of file".to_string(),
            other => format!("'{}'", other.lexeme()),
        }
    }

    fn lexeme(&self) -> &'static str {
        match self {
            TokenKind::Fn => "fn",
            TokenKind::Const => "const",
            TokenKind::Let => "let",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::For => "for",
            TokenKind::In => "in",
            TokenKind::Return => "return",
            TokenKind::Match => "match",
            TokenKind::Import => "import",
            TokenKind::Export => "export",
            TokenKind::From => "from",
            TokenKind::As => "as",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::Score => "score",
            TokenKind::Clip => "clip",
            TokenKind::Track => "track",
            TokenKind::Sound => "sound",
            TokenKind::Meta => "meta",
            TokenKind::Tempo => "tempo",
            TokenKind::Meter => "meter",
            TokenKind::Place => "place",
            TokenKind::Role => "role",
            TokenKind::Kind => "kind",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Bang => "!",
            TokenKind::Coalesce => "??",
            TokenKind::DotDot => "..",
            TokenKind::DotDotEq => "..=",
            TokenKind::Arrow => "->",
            TokenKind::FatArrow => "=>",
            TokenKind::Assign => "=",
            TokenKind::Dot => ".",
            TokenKind::Comma => ",",
            TokenKind::Semi => ";",
            TokenKind::Colon => ":",
            TokenKind::At => "@",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            _ => "",
        }
    }
}

/// A token with its position in the source.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: SourcePos,
}

/// Lexer for tokenizing Tako source code.
pub struct Lexer<'a> {
    file: &'a str,
    chars: Vec<char>,
    idx: usize,
    line: u32,
    column: u32,
    offset: u32,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn keyword(name: &str) -> Option<TokenKind> {
    let kind = match name {
        "fn" => TokenKind::Fn,
        "const" => TokenKind::Const,
        "let" => TokenKind::Let,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "for" => TokenKind::For,
        "in" => TokenKind::In,
        "return" => TokenKind::Return,
        "match" => TokenKind::Match,
        "import" => TokenKind::Import,
        "export" => TokenKind::Export,
        "from" => TokenKind::From,
        "as" => TokenKind::As,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        "score" => TokenKind::Score,
        "clip" => TokenKind::Clip,
        "track" => TokenKind::Track,
        "sound" => TokenKind::Sound,
        "meta" => TokenKind::Meta,
        "tempo" => TokenKind::Tempo,
        "meter" => TokenKind::Meter,
        "place" => TokenKind::Place,
        "role" => TokenKind::Role,
        "kind" => TokenKind::Kind,
        _ => return None,
    };
    Some(kind)
}

impl<'a> Lexer<'a> {
    pub fn new(input: &str, file: &'a str) -> Self {
        Self {
            file,
            chars: input.chars().collect(),
            idx: 0,
            line: 1,
            column: 1,
            offset: 0,
        }
    }

    fn pos(&self) -> SourcePos {
        SourcePos::new(self.line, self.column, self.offset)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.idx + ahead).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.idx).copied()?;
        self.idx += 1;
        self.offset += c.len_utf8() as u32;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Snapshot for speculative lexing (pitch literals backtrack).
    fn save(&self) -> (usize, u32, u32, u32) {
        (self.idx, self.line, self.column, self.offset)
    }

    fn restore(&mut self, state: (usize, u32, u32, u32)) {
        self.idx = state.0;
        self.line = state.1;
        self.column = state.2;
        self.offset = state.3;
    }

    fn error(&self, pos: SourcePos, message: impl Into<String>) -> TakoError {
        TakoError::Syntax {
            file: self.file.to_string(),
            line: pos.line,
            column: pos.column,
            message: message.into(),
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, TakoError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let pos = self.pos();
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    pos,
                });
                return Ok(tokens);
            };

            let kind = if c.is_ascii_digit() {
                self.lex_number(pos)?
            } else if ('A'..='G').contains(&c) {
                self.lex_pitch_or_ident()
            } else if is_ident_start(c) {
                self.lex_ident()
            } else if c == '"' {
                self.lex_string(pos)?
            } else {
                self.lex_operator(pos)?
            };

            tokens.push(Token { kind, pos });
        }
    }

    /// Skip whitespace and comments. Block comments do not nest; an
    /// unterminated block comment is a fatal error.
    fn skip_trivia(&mut self) -> Result<(), TakoError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let start = self.pos();
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(_) => {
                                self.advance();
                            }
                            None => {
                                return Err(self.error(start, "unterminated block comment"));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn lex_digits(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        s
    }

    fn parse_u32(&self, digits: &str, pos: SourcePos, what: &str) -> Result<u32, TakoError> {
        digits
            .parse::<u32>()
            .map_err(|_| self.error(pos, format!("{} '{}' is out of range", what, digits)))
    }

    /// Numeric run disambiguation, in order: position reference, duration
    /// literal, float, integer; a `bpm` suffix turns the number into a
    /// tempo literal.
    fn lex_number(&mut self, pos: SourcePos) -> Result<TokenKind, TakoError> {
        let digits = self.lex_digits();

        // bar:beat or bar:beat:sub
        if self.peek() == Some(':') && self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
            let beat_digits = self.lex_digits();
            let bar = self.parse_u32(&digits, pos, "bar number")?;
            let beat = self.parse_u32(&beat_digits, pos, "beat number")?;
            if bar == 0 || beat == 0 {
                return Err(self.error(pos, "bar and beat numbers start at 1"));
            }
            let mut sub = None;
            if self.peek() == Some(':') && self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
                let sub_digits = self.lex_digits();
                sub = Some(self.parse_u32(&sub_digits, pos, "subdivision")?);
            }
            return Ok(TokenKind::PosRefLit { bar, beat, sub });
        }

        // n/d duration, optionally dotted
        if self.peek() == Some('/') && self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
            let den_digits = self.lex_digits();
            let num = self.parse_u32(&digits, pos, "duration numerator")?;
            let den = self.parse_u32(&den_digits, pos, "duration denominator")?;
            if den == 0 {
                return Err(self.error(pos, "duration denominator must be positive"));
            }
            let mut dots = 0u8;
            // a dot is part of the duration only when it cannot start a
            // float or range that follows
            while self.peek() == Some('.')
                && !self
                    .peek_at(1)
                    .map_or(false, |c| c.is_ascii_digit() || c == '.')
            {
                self.advance();
                dots += 1;
            }
            return Ok(TokenKind::DurationLit { num, den, dots });
        }

        // float
        let mut is_float = false;
        let mut text = digits;
        if self.peek() == Some('.') && self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            text.push('.');
            text.push_str(&self.lex_digits());
        }

        // bpm suffix
        if self.peek() == Some('b')
            && self.peek_at(1) == Some('p')
            && self.peek_at(2) == Some('m')
            && !self.peek_at(3).map_or(false, is_ident_continue)
        {
            self.advance();
            self.advance();
            self.advance();
            let bpm = text
                .parse::<f64>()
                .map_err(|_| self.error(pos, format!("invalid tempo literal '{}bpm'", text)))?;
            return Ok(TokenKind::TempoLit(bpm));
        }

        if is_float {
            let value = text
                .parse::<f64>()
                .map_err(|_| self.error(pos, format!("invalid float literal '{}'", text)))?;
            Ok(TokenKind::Float(value))
        } else {
            let value = text
                .parse::<i64>()
                .map_err(|_| self.error(pos, format!("integer literal '{}' is out of range", text)))?;
            Ok(TokenKind::Int(value))
        }
    }

    /// Speculative pitch lexing. Consumes note letter, accidentals, and an
    /// optional (possibly negative) octave; backtracks to identifier lexing
    /// when the candidate is immediately followed by an identifier character.
    fn lex_pitch_or_ident(&mut self) -> TokenKind {
        let state = self.save();
        let mut text = String::new();

        if let Some(letter) = self.advance() {
            text.push(letter);
        }
        match self.peek() {
            Some('#') => {
                text.push('#');
                self.advance();
                if self.peek() == Some('#') {
                    text.push('#');
                    self.advance();
                }
            }
            Some('b') => {
                text.push('b');
                self.advance();
                if self.peek() == Some('b') {
                    text.push('b');
                    self.advance();
                }
            }
            Some('x') => {
                text.push('x');
                self.advance();
            }
            _ => {}
        }
        if self.peek() == Some('-') && self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) {
            text.push('-');
            self.advance();
            text.push_str(&self.lex_digits());
        } else if self.peek().map_or(false, |c| c.is_ascii_digit()) {
            text.push_str(&self.lex_digits());
        }

        // a trailing identifier character means this was never a pitch
        if self.peek().map_or(false, is_ident_continue) {
            self.restore(state);
            return self.lex_ident();
        }

        match Pitch::parse(&text) {
            Some(pitch) => TokenKind::PitchLit(pitch),
            None => {
                self.restore(state);
                self.lex_ident()
            }
        }
    }

    fn lex_ident(&mut self) -> TokenKind {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match keyword(&name) {
            Some(kind) => kind,
            None => TokenKind::Ident(name),
        }
    }

    fn lex_string(&mut self, pos: SourcePos) -> Result<TokenKind, TakoError> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('"') => return Ok(TokenKind::Str(value)),
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some(c) => {
                        return Err(self.error(pos, format!("invalid escape sequence '\\{}'", c)))
                    }
                    None => return Err(self.error(pos, "unterminated string literal")),
                },
                Some(c) => value.push(c),
                None => return Err(self.error(pos, "unterminated string literal")),
            }
        }
    }

    fn lex_operator(&mut self, pos: SourcePos) -> Result<TokenKind, TakoError> {
        let c = match self.advance() {
            Some(c) => c,
            None => return Ok(TokenKind::Eof),
        };
        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => {
                if self.peek() == Some('>') {
                    self.advance();
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' => match self.peek() {
                Some('=') => {
                    self.advance();
                    TokenKind::EqEq
                }
                Some('>') => {
                    self.advance();
                    TokenKind::FatArrow
                }
                _ => TokenKind::Assign,
            },
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if self.peek() == Some('&') {
                    self.advance();
                    TokenKind::AndAnd
                } else {
                    return Err(self.error(pos, "unexpected '&'; did you mean '&&'?"));
                }
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.advance();
                    TokenKind::OrOr
                } else {
                    return Err(self.error(pos, "unexpected '|'; did you mean '||'?"));
                }
            }
            '?' => {
                if self.peek() == Some('?') {
                    self.advance();
                    TokenKind::Coalesce
                } else {
                    return Err(self.error(pos, "unexpected '?'; did you mean '??'?"));
                }
            }
            '.' => {
                if self.peek() == Some('.') {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        TokenKind::DotDotEq
                    } else {
                        TokenKind::DotDot
                    }
                } else {
                    TokenKind::Dot
                }
            }
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semi,
            ':' => TokenKind::Colon,
            '@' => TokenKind::At,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            other => {
                return Err(self.error(pos, format!("unexpected character: '{}'", other)));
            }
        };
        Ok(kind)
    }
}

/// Tokenize a source string. Convenience wrapper used by the parser and
/// tests.
pub fn tokenize(input: &str, file: &str) -> Result<Vec<Token>, TakoError> {
    Lexer::new(input, file).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input, "test.mf")
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_keywords_and_idents() {
        assert_eq!(
            kinds("fn melody score"),
            vec![
                TokenKind::Fn,
                TokenKind::Ident("melody".to_string()),
                TokenKind::Score,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_pitch_literals() {
        let ks = kinds("C4 F#3 Bb-1 Gx5");
        assert_eq!(ks[0], TokenKind::PitchLit(Pitch::parse("C4").unwrap()));
        assert_eq!(ks[1], TokenKind::PitchLit(Pitch::parse("F#3").unwrap()));
        assert_eq!(ks[2], TokenKind::PitchLit(Pitch::parse("Bb-1").unwrap()));
        assert_eq!(ks[3], TokenKind::PitchLit(Pitch::parse("Gx5").unwrap()));
    }

    #[test]
    fn test_bare_letter_is_pitch() {
        assert_eq!(
            kinds("C"),
            vec![
                TokenKind::PitchLit(Pitch::parse("C4").unwrap()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_pitch_backtracks_to_ident() {
        assert_eq!(
            kinds("C4foo"),
            vec![TokenKind::Ident("C4foo".to_string()), TokenKind::Eof]
        );
        assert_eq!(
            kinds("Cmaj"),
            vec![TokenKind::Ident("Cmaj".to_string()), TokenKind::Eof]
        );
        assert_eq!(
            kinds("Bbq"),
            vec![TokenKind::Ident("Bbq".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_position_references() {
        assert_eq!(
            kinds("1:1 3:2 2:1:3"),
            vec![
                TokenKind::PosRefLit {
                    bar: 1,
                    beat: 1,
                    sub: None
                },
                TokenKind::PosRefLit {
                    bar: 3,
                    beat: 2,
                    sub: None
                },
                TokenKind::PosRefLit {
                    bar: 2,
                    beat: 1,
                    sub: Some(3)
                },
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_zero_bar_rejected() {
        assert!(tokenize("0:1", "test.mf").is_err());
        assert!(tokenize("1:0", "test.mf").is_err());
    }

    #[test]
    fn test_duration_literals() {
        assert_eq!(
            kinds("1/4 3/8 1/4."),
            vec![
                TokenKind::DurationLit {
                    num: 1,
                    den: 4,
                    dots: 0
                },
                TokenKind::DurationLit {
                    num: 3,
                    den: 8,
                    dots: 0
                },
                TokenKind::DurationLit {
                    num: 1,
                    den: 4,
                    dots: 1
                },
            ]
            .into_iter()
            .chain([TokenKind::Eof])
            .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_numeric_fallthrough() {
        assert_eq!(
            kinds("42 3.25 1"),
            vec![
                TokenKind::Int(42),
                TokenKind::Float(3.25),
                TokenKind::Int(1),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_tempo_literal() {
        assert_eq!(
            kinds("120bpm 92.5bpm"),
            vec![
                TokenKind::TempoLit(120.0),
                TokenKind::TempoLit(92.5),
                TokenKind::Eof
            ]
        );
        // `bpmx` is not a tempo suffix
        assert_eq!(
            kinds("120bpmx"),
            vec![
                TokenKind::Int(120),
                TokenKind::Ident("bpmx".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_division_vs_duration() {
        // spaces break the duration literal shape
        assert_eq!(
            kinds("1 / 4"),
            vec![
                TokenKind::Int(1),
                TokenKind::Slash,
                TokenKind::Int(4),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_ranges() {
        assert_eq!(
            kinds("1..5 1..=5"),
            vec![
                TokenKind::Int(1),
                TokenKind::DotDot,
                TokenKind::Int(5),
                TokenKind::Int(1),
                TokenKind::DotDotEq,
                TokenKind::Int(5),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""hello\nworld""#),
            vec![TokenKind::Str("hello\nworld".to_string()), TokenKind::Eof]
        );
        assert!(tokenize("\"open", "test.mf").is_err());
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            kinds("1 // line comment\n2 /* block\ncomment */ 3"),
            vec![
                TokenKind::Int(1),
                TokenKind::Int(2),
                TokenKind::Int(3),
                TokenKind::Eof
            ]
        );
        assert!(tokenize("/* open", "test.mf").is_err());
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("== != <= >= && || ?? -> => ="),
            vec![
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Coalesce,
                TokenKind::Arrow,
                TokenKind::FatArrow,
                TokenKind::Assign,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_position_tracking() {
        let tokens = tokenize("fn\n  main", "test.mf").unwrap();
        assert_eq!(tokens[0].pos.line, 1);
        assert_eq!(tokens[0].pos.column, 1);
        assert_eq!(tokens[1].pos.line, 2);
        assert_eq!(tokens[1].pos.column, 3);
        assert_eq!(tokens[1].pos.offset, 5);
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("~", "test.mf").unwrap_err();
        assert!(err.to_string().contains("unexpected character"));
    }
}
