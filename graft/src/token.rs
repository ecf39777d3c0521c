/// Token types produced by the script lexer.
use crate::ast::BinaryOp;
use crate::span::{Pos, Span};

/// A raw piece of an interpolated string, before its holes are parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSegment {
    Text(String),
    /// Source of a `{...}` hole, where it starts, and the format
    /// specifier after a top-level `:`.
    Code {
        code: String,
        at: Pos,
        format: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Unsuffixed integer literal. Typed `int` when it fits, else `long`.
    Int(i64),
    /// `L`-suffixed integer literal.
    Long(i64),
    /// `f`-suffixed literal.
    Float(f32),
    /// Unsuffixed real literal, or `d`/`m` suffixed.
    Double(f64),
    Char(char),
    Str(String),
    Interpolated(Vec<RawSegment>),

    Ident(String),
    Keyword(Keyword),

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Dot,
    Colon,
    Question,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    AmpAmp,
    PipePipe,
    PlusPlus,
    MinusMinus,

    Lt,
    Gt,
    Le,
    Ge,
    EqEq,
    NotEq,

    Assign,
    /// `+=`, `-=`, `*=`, `/=`, `%=`, `&=`, `|=`, `^=`.
    CompoundAssign(BinaryOp),

    Eof,
    /// An unrecognized character or malformed literal.
    Error(String),
}

impl TokenKind {
    /// Human-readable name for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Int(_) | Self::Long(_) => "integer literal",
            Self::Float(_) | Self::Double(_) => "real literal",
            Self::Char(_) => "character literal",
            Self::Str(_) | Self::Interpolated(_) => "string literal",
            Self::Ident(_) => "identifier",
            Self::Keyword(kw) => kw.as_str(),
            Self::LParen => "`(`",
            Self::RParen => "`)`",
            Self::LBrace => "`{`",
            Self::RBrace => "`}`",
            Self::LBracket => "`[`",
            Self::RBracket => "`]`",
            Self::Semicolon => "`;`",
            Self::Comma => "`,`",
            Self::Dot => "`.`",
            Self::Colon => "`:`",
            Self::Question => "`?`",
            Self::Plus => "`+`",
            Self::Minus => "`-`",
            Self::Star => "`*`",
            Self::Slash => "`/`",
            Self::Percent => "`%`",
            Self::Amp => "`&`",
            Self::Pipe => "`|`",
            Self::Caret => "`^`",
            Self::Tilde => "`~`",
            Self::Bang => "`!`",
            Self::AmpAmp => "`&&`",
            Self::PipePipe => "`||`",
            Self::PlusPlus => "`++`",
            Self::MinusMinus => "`--`",
            Self::Lt => "`<`",
            Self::Gt => "`>`",
            Self::Le => "`<=`",
            Self::Ge => "`>=`",
            Self::EqEq => "`==`",
            Self::NotEq => "`!=`",
            Self::Assign => "`=`",
            Self::CompoundAssign(_) => "compound assignment",
            Self::Eof => "end of input",
            Self::Error(_) => "invalid token",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Using,
    Namespace,
    Class,
    Public,
    Private,
    Protected,
    Internal,
    Static,
    Readonly,
    Const,
    Override,
    Void,
    Var,
    New,
    If,
    Else,
    While,
    Do,
    For,
    Break,
    Continue,
    Return,
    True,
    False,
    Null,
}

impl Keyword {
    pub fn from_ident(ident: &str) -> Option<Self> {
        let kw = match ident {
            "using" => Self::Using,
            "namespace" => Self::Namespace,
            "class" => Self::Class,
            "public" => Self::Public,
            "private" => Self::Private,
            "protected" => Self::Protected,
            "internal" => Self::Internal,
            "static" => Self::Static,
            "readonly" => Self::Readonly,
            "const" => Self::Const,
            "override" => Self::Override,
            "void" => Self::Void,
            "var" => Self::Var,
            "new" => Self::New,
            "if" => Self::If,
            "else" => Self::Else,
            "while" => Self::While,
            "do" => Self::Do,
            "for" => Self::For,
            "break" => Self::Break,
            "continue" => Self::Continue,
            "return" => Self::Return,
            "true" => Self::True,
            "false" => Self::False,
            "null" => Self::Null,
            _ => return None,
        };
        Some(kw)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Using => "`using`",
            Self::Namespace => "`namespace`",
            Self::Class => "`class`",
            Self::Public => "`public`",
            Self::Private => "`private`",
            Self::Protected => "`protected`",
            Self::Internal => "`internal`",
            Self::Static => "`static`",
            Self::Readonly => "`readonly`",
            Self::Const => "`const`",
            Self::Override => "`override`",
            Self::Void => "`void`",
            Self::Var => "`var`",
            Self::New => "`new`",
            Self::If => "`if`",
            Self::Else => "`else`",
            Self::While => "`while`",
            Self::Do => "`do`",
            Self::For => "`for`",
            Self::Break => "`break`",
            Self::Continue => "`continue`",
            Self::Return => "`return`",
            Self::True => "`true`",
            Self::False => "`false`",
            Self::Null => "`null`",
        }
    }

    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            Self::Public
                | Self::Private
                | Self::Protected
                | Self::Internal
                | Self::Static
                | Self::Readonly
                | Self::Const
                | Self::Override
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}
