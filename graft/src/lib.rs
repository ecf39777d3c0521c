//! # Graft
//!
//! Grafts generated gameplay snippets onto a running host: pull
//! declarations out of free-form text, rebuild them into one well-formed
//! class, compile that class, and drive its methods every tick.
//!
//! ## Architecture
//!
//! ```text
//!  generated text
//!      │
//!      ▼
//!  ┌─────────┐  imports, variables,  ┌──────────┐  resolved   ┌───────┐
//!  │ extract │ ────────────────────▶ │ resolver │ ──────────▶ │ synth │
//!  └─────────┘  methods              └──────────┘  variables  └───────┘
//!                                                                │ unit text
//!                                                                ▼
//!  ┌──────────┐  handles   ┌────────┐  instance   ┌──────────────────────┐
//!  │ registry │ ◀───────── │ loader │ ◀────────── │ lexer/parser/compiler│
//!  └──────────┘            └────────┘             └──────────────────────┘
//!      │ Init / Frame / Fixed
//!      ▼
//!  interpreter ──▶ host world
//! ```
//!
//! [`Runtime`] wires the stages together and owns the batch lifecycle.
//!
//! ```rust
//! use graft::{Runtime, RuntimeCreateInfo};
//!
//! let mut runtime = Runtime::new(RuntimeCreateInfo::default());
//! let report = runtime.apply_source(r#"
//!     public float speed = 3f;
//!     void onTick() { transform.Translate(speed, 0, 0); }
//! "#);
//! assert!(report.compiled());
//!
//! runtime.frame().unwrap();
//! let host = runtime.host().unwrap();
//! assert_eq!(runtime.world().get(host).unwrap().transform.position.x, 3.0);
//! ```

pub mod ast;
pub mod builtins;
pub mod bytecode;
pub mod compiler;
pub mod error;
pub mod extract;
pub mod host;
pub mod interpreter;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod registry;
pub mod runtime;
pub mod span;
pub mod synth;
pub mod token;
pub mod types;
pub mod value;

pub use bytecode::{Code, Instruction, Program};
pub use compiler::{Compilation, compile};
pub use error::{CompileError, Diagnostic, Fault, InvocationFault, ResolveIssue, Severity};
pub use extract::{
    BraceMode, ExtractOptions, Extraction, MethodDescriptor, VariableDescriptor, extract,
    extract_with,
};
pub use host::{GameObject, HostCreateInfo, ObjectId, World};
pub use interpreter::ExecutionLimits;
pub use loader::{InvocableHandle, LoadError, LoadedUnit, UnitInstance, compile_and_bind};
pub use registry::{MethodRegistry, Tick};
pub use runtime::{BatchInbox, BatchReport, RequestGate, RequestGuard, Runtime, RuntimeCreateInfo};
pub use span::Span;
pub use synth::{CompilationUnit, synthesize};
pub use types::{
    HostKind, HostTypeRegistry, Resolution, ResolvedVariable, RuntimeType, TypeResolver,
};
pub use value::{Value, Vec2, Vec3};
