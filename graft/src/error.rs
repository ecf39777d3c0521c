use std::fmt;

use thiserror::Error;

use crate::host::ObjectId;
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

/// One message produced while compiling a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            span: Some(span),
        }
    }

    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            span: Some(span),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some(span) => {
                write!(f, "{span}: {}: {}", self.severity, self.message)
            }
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// A unit that did not compile. Carries every diagnostic, warnings
/// included, in source order.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "compilation failed with {} error(s)",
    .diagnostics.iter().filter(|d| d.is_error()).count()
)]
pub struct CompileError {
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileError {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }
}

/// Runtime failure raised by compiled code.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Fault {
    #[error(
        "operator `{op}` cannot be applied to operands of type `{lhs}` and `{rhs}`"
    )]
    InvalidOperands {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("operator `{op}` cannot be applied to operand of type `{operand}`")]
    InvalidOperand {
        op: &'static str,
        operand: &'static str,
    },
    #[error("cannot convert type `{from}` to `{to}`")]
    InvalidConversion {
        from: &'static str,
        to: &'static str,
    },
    #[error("expected a value of type `{expected}`, found `{found}`")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("attempted to divide by zero")]
    DivideByZero,
    #[error("object reference not set to an instance of an object (`{member}`)")]
    NullReference { member: String },
    #[error("`{type_name}` does not contain a definition for `{member}`")]
    UnknownMember {
        type_name: &'static str,
        member: String,
    },
    #[error("no overload for method `{method}` takes {argc} arguments")]
    BadArity { method: String, argc: usize },
    #[error("the object {0} has been destroyed")]
    DestroyedObject(ObjectId),
    #[error("execution exceeded the limit of {limit} instructions")]
    FuelExhausted { limit: u64 },
    #[error("call depth exceeded the limit of {limit}")]
    StackOverflow { limit: usize },
    #[error("format specifier `{spec}` is invalid")]
    InvalidFormat { spec: String },
}

/// A fault that escaped an invoked handle.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationFault {
    pub method: String,
    pub line: Option<usize>,
    pub fault: Fault,
}

impl fmt::Display for InvocationFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(
                f,
                "method `{}` faulted at line {line}: {}",
                self.method, self.fault
            ),
            None => {
                write!(f, "method `{}` faulted: {}", self.method, self.fault)
            }
        }
    }
}

impl std::error::Error for InvocationFault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.fault)
    }
}

/// Recoverable problems found while resolving extracted variables.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveIssue {
    #[error("variable `{name}` has unknown type `{ty}` and was dropped")]
    TypeUnresolved { name: String, ty: String },
    #[error(
        "failed to parse `{raw}` as `{ty}` for variable `{name}` ({reason}), using the default"
    )]
    ValueParseFailed {
        name: String,
        ty: &'static str,
        raw: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Pos;

    #[test]
    fn diagnostic_display_includes_position() {
        let span = Span::point(Pos::new(12, 3, 9));
        let diag = Diagnostic::error("`)` expected", span);
        assert_eq!(diag.to_string(), "(3,9): error: `)` expected");
    }

    #[test]
    fn compile_error_counts_only_errors() {
        let span = Span::point(Pos::origin());
        let err = CompileError {
            diagnostics: vec![
                Diagnostic::warning("duplicate using", span),
                Diagnostic::error("unknown name", span),
            ],
        };
        assert_eq!(err.error_count(), 1);
        assert_eq!(err.to_string(), "compilation failed with 1 error(s)");
    }

    #[test]
    fn invocation_fault_mentions_line() {
        let fault = InvocationFault {
            method: "onTick".into(),
            line: Some(7),
            fault: Fault::DivideByZero,
        };
        assert_eq!(
            fault.to_string(),
            "method `onTick` faulted at line 7: attempted to divide by zero"
        );
    }
}
