/// Syntax tree for the script subset accepted by the compiler.
///
/// A unit is a list of `using` directives followed by exactly one class
/// holding fields and `void` methods. Every node carries a [`Span`] so
/// diagnostics and runtime faults can point back into the unit text.
use std::cmp::Ordering;

use crate::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub usings: Vec<Using>,
    pub class: Option<ClassDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Using {
    /// Dotted namespace path, e.g. `System.Collections`.
    pub path: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub span: Span,
}

/// A type as written in source. `var` is represented by [`TypeRef::Var`].
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Var(Span),
    Named { name: String, span: Span },
}

impl TypeRef {
    pub fn span(&self) -> Span {
        match self {
            Self::Var(span) | Self::Named { span, .. } => *span,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Var(_) => "var",
            Self::Named { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub ty: TypeRef,
    pub name: String,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: TypeRef,
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub name: String,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `T a = 1, b;` or `var a = 1;`
    Local {
        ty: TypeRef,
        declarators: Vec<Declarator>,
    },
    Expr(Expr),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Vec<Stmt>,
        cond: Option<Expr>,
        step: Vec<Expr>,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    Block(Block),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    /// Height of the tree rooted here; literals and names are 1.
    pub depth: usize,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        let depth = 1 + kind.child_depth();
        Self { kind, span, depth }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    Str(String),
}

/// A piece of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    /// A `{expr}` hole, with the format specifier after `:` if any.
    Expr { expr: Expr, format: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Name(String),
    Member {
        object: Box<Expr>,
        name: String,
    },
    /// `callee(args)` where the callee is a name or a member access,
    /// optionally with one generic argument: `GetComponent<T>()`.
    Call {
        callee: Box<Expr>,
        type_arg: Option<TypeRef>,
        args: Vec<Expr>,
    },
    New {
        ty: TypeRef,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// `target = value`, or `target op= value` when `op` is set.
    Assign {
        target: Box<Expr>,
        op: Option<BinaryOp>,
        value: Box<Expr>,
    },
    /// `++x`, `x++`, `--x`, `x--`.
    Step {
        target: Box<Expr>,
        increment: bool,
        prefix: bool,
    },
    Cast {
        ty: TypeRef,
        expr: Box<Expr>,
    },
    Interpolated(Vec<Segment>),
}

impl ExprKind {
    /// Height of the tallest direct subexpression, interpolation holes
    /// included.
    fn child_depth(&self) -> usize {
        match self {
            Self::Literal(_) | Self::Name(_) => 0,
            Self::Member { object: e, .. }
            | Self::Unary { operand: e, .. }
            | Self::Step { target: e, .. }
            | Self::Cast { expr: e, .. } => e.depth,
            Self::Call { callee, args, .. } => {
                callee.depth.max(args.iter().map(|a| a.depth).max().unwrap_or(0))
            }
            Self::New { args, .. } => args.iter().map(|a| a.depth).max().unwrap_or(0),
            Self::Binary { lhs, rhs, .. } | Self::Logical { lhs, rhs, .. } => {
                lhs.depth.max(rhs.depth)
            }
            Self::Assign { target, value, .. } => target.depth.max(value.depth),
            Self::Conditional {
                cond,
                then,
                otherwise,
            } => cond.depth.max(then.depth).max(otherwise.depth),
            Self::Interpolated(segments) => segments
                .iter()
                .filter_map(|s| match s {
                    Segment::Expr { expr, .. } => Some(expr.depth),
                    Segment::Text(_) => None,
                })
                .max()
                .unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BitAnd,
    BitOr,
    BitXor,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
        }
    }

    /// Orderings that make a relational operator true.
    pub fn comparison(self) -> Option<&'static [Ordering]> {
        match self {
            Self::Lt => Some(&[Ordering::Less]),
            Self::Le => Some(&[Ordering::Less, Ordering::Equal]),
            Self::Gt => Some(&[Ordering::Greater]),
            Self::Ge => Some(&[Ordering::Greater, Ordering::Equal]),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Plus => "+",
            Self::Not => "!",
            Self::BitNot => "~",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}
