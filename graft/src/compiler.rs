/// Semantic checks and code generation for a parsed unit.
///
/// The compiler walks the syntax tree once per method, resolving names in
/// the order locals, fields, unit methods, host static classes. It reports
/// every problem it finds instead of stopping at the first, and produces a
/// [`Program`] only when no error was reported.
use indexmap::{IndexMap, IndexSet};

use crate::ast::{
    BinaryOp, Block, ClassDecl, Declarator, Expr, ExprKind, Literal,
    LogicalOp, MethodDecl, Segment, Stmt, StmtKind, TypeRef, Unit,
};
use crate::builtins::StaticClass;
use crate::bytecode::{Code, CodeBuilder, FieldInfo, Instruction, Label, POOL_LIMIT, Program};
use crate::error::{CompileError, Diagnostic};
use crate::parser;
use crate::span::{Pos, Span};
use crate::types::{HostKind, RuntimeType};
use crate::value::Value;

/// Namespaces a unit may import. Everything the host API offers lives in
/// these; nothing outside them can be referenced.
pub const REFERENCE_NAMESPACES: &[&str] = &[
    "System",
    "System.Collections",
    "System.Collections.Generic",
    "System.Linq",
    "System.Text",
    "UnityEngine",
];

/// Prefixes accepted in front of host type and class names.
const NAMESPACE_PREFIXES: &[&str] = &["UnityEngine.", "System."];

/// A successfully compiled unit plus any warnings.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub program: Program,
    pub warnings: Vec<Diagnostic>,
}

/// Parse and compile unit text.
pub fn compile(src: &str) -> Result<Compilation, CompileError> {
    let (unit, diagnostics) = parser::parse(src);
    if diagnostics.iter().any(Diagnostic::is_error) {
        log::debug!("unit failed to parse with {} diagnostic(s)", diagnostics.len());
        return Err(CompileError { diagnostics });
    }
    compile_unit(&unit)
}

pub fn compile_unit(unit: &Unit) -> Result<Compilation, CompileError> {
    let mut diagnostics = Vec::new();
    check_usings(unit, &mut diagnostics);

    let program = match &unit.class {
        Some(class) => Some(UnitCompiler::new(class, &mut diagnostics).compile()),
        None => {
            diagnostics.push(Diagnostic::error(
                "no class declaration found in unit",
                Span::point(Pos::origin()),
            ));
            None
        }
    };

    diagnostics.sort_by_key(|d| d.span.map(|s| s.start.offset));
    match program {
        Some(program) if !diagnostics.iter().any(Diagnostic::is_error) => {
            log::debug!(
                "compiled class {} with {} method(s)",
                program.class_name,
                program.methods.len()
            );
            Ok(Compilation {
                program,
                warnings: diagnostics,
            })
        }
        _ => Err(CompileError { diagnostics }),
    }
}

fn check_usings(unit: &Unit, diagnostics: &mut Vec<Diagnostic>) {
    let mut seen = IndexSet::new();
    for using in &unit.usings {
        if !REFERENCE_NAMESPACES.contains(&using.path.as_str()) {
            diagnostics.push(Diagnostic::error(
                format!(
                    "the type or namespace name `{}` does not exist (are you missing an assembly reference?)",
                    using.path
                ),
                using.span,
            ));
        } else if !seen.insert(using.path.as_str()) {
            diagnostics.push(Diagnostic::warning(
                format!(
                    "the using directive for `{}` appeared previously in this namespace",
                    using.path
                ),
                using.span,
            ));
        }
    }
}

fn strip_namespace(name: &str) -> &str {
    NAMESPACE_PREFIXES
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name)
}

/// Runtime type of a written type name.
fn runtime_type(name: &str) -> Option<RuntimeType> {
    let name = strip_namespace(name);
    let ty = match name {
        "String" => RuntimeType::String,
        "Boolean" => RuntimeType::Bool,
        "Single" => RuntimeType::Float,
        "Double" => RuntimeType::Double,
        "Int32" => RuntimeType::Int,
        "Int64" => RuntimeType::Long,
        _ => return RuntimeType::from_name(name),
    };
    Some(ty)
}

struct MethodSig {
    index: u16,
    arity: usize,
}

/// Declarations visible to every method body.
struct UnitScope {
    class_name: String,
    fields: IndexMap<String, RuntimeType>,
    methods: IndexMap<String, MethodSig>,
}

struct UnitCompiler<'a> {
    class: &'a ClassDecl,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> UnitCompiler<'a> {
    fn new(class: &'a ClassDecl, diagnostics: &'a mut Vec<Diagnostic>) -> Self {
        Self { class, diagnostics }
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics.push(Diagnostic::error(message, span));
    }

    fn compile(mut self) -> Program {
        let class = self.class;
        let scope = self.declare_members();

        let init = {
            let mut fc = FnCompiler::new(&scope, "<fields>", self.diagnostics);
            for field in &class.fields {
                let (Some(init), Some(slot)) = (&field.init, scope.fields.get_index_of(&field.name))
                else {
                    continue;
                };
                fc.b.set_line(field.span.start.line);
                fc.expr(init);
                // `declare_members` keeps field slots inside `u16`.
                fc.b.emit(Instruction::StoreField { slot: slot as u16 });
            }
            fc.finish(class.span)
        };

        let mut methods = Vec::new();
        for method in &class.methods {
            if scope.methods.get(&method.name).map(|sig| sig.index as usize)
                != Some(methods.len())
            {
                continue;
            }
            methods.push(self.method(&scope, method));
        }

        let fields = scope
            .fields
            .iter()
            .map(|(name, ty)| FieldInfo {
                name: name.clone(),
                ty: *ty,
            })
            .collect();
        Program::new(scope.class_name.clone(), fields, init, methods)
    }

    fn declare_members(&mut self) -> UnitScope {
        let mut scope = UnitScope {
            class_name: self.class.name.clone(),
            fields: IndexMap::new(),
            methods: IndexMap::new(),
        };
        let class = self.class;
        let mut members: IndexSet<&str> = IndexSet::new();
        let class_name = class.name.clone();
        let duplicate = |name: &str| {
            format!("the type `{class_name}` already contains a definition for `{name}`")
        };

        for field in &class.fields {
            let ty = match &field.ty {
                TypeRef::Var(span) => {
                    self.error(
                        "the contextual keyword `var` may only appear within a local variable declaration",
                        *span,
                    );
                    continue;
                }
                TypeRef::Named { name, span } => match runtime_type(name) {
                    Some(ty) => ty,
                    None => {
                        self.error(unknown_type(name), *span);
                        continue;
                    }
                },
            };
            if !members.insert(&field.name) {
                self.error(duplicate(&field.name), field.span);
                continue;
            }
            if scope.fields.len() == POOL_LIMIT {
                self.error(format!("a unit may declare at most {POOL_LIMIT} fields"), field.span);
                continue;
            }
            scope.fields.insert(field.name.clone(), ty);
        }

        for method in &class.methods {
            if !members.insert(&method.name) {
                self.error(duplicate(&method.name), method.span);
                continue;
            }
            let Ok(index) = u16::try_from(scope.methods.len()) else {
                self.error(format!("a unit may declare at most {POOL_LIMIT} methods"), method.span);
                continue;
            };
            scope.methods.insert(
                method.name.clone(),
                MethodSig {
                    index,
                    arity: method.params.len(),
                },
            );
        }
        scope
    }

    fn method(&mut self, scope: &UnitScope, method: &MethodDecl) -> Code {
        let mut fc = FnCompiler::new(scope, &method.name, self.diagnostics);
        fc.b.set_line(method.span.start.line);
        for param in &method.params {
            let ty = match &param.ty {
                TypeRef::Var(span) => {
                    fc.error("`var` is not valid as a parameter type", *span);
                    None
                }
                TypeRef::Named { name, span } => {
                    let ty = runtime_type(name);
                    if ty.is_none() {
                        fc.error(unknown_type(name), *span);
                    }
                    ty
                }
            };
            let slot = fc.b.add_param(ty);
            fc.declare(&param.name, slot, param.span);
        }
        fc.block_inline(&method.body);
        fc.finish(method.span)
    }
}

fn unknown_type(name: &str) -> String {
    format!(
        "the type or namespace name `{name}` could not be found (are you missing a using directive or an assembly reference?)"
    )
}

#[derive(Default)]
struct LoopLabels {
    breaks: Vec<Label>,
    continues: Vec<Label>,
}

/// Where a plain name resolves to.
enum Binding {
    Local(u16),
    Field(u16),
}

struct FnCompiler<'a> {
    unit: &'a UnitScope,
    method: String,
    b: CodeBuilder,
    scopes: Vec<IndexMap<String, u16>>,
    loops: Vec<LoopLabels>,
    nesting: usize,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> FnCompiler<'a> {
    fn new(unit: &'a UnitScope, method: &str, diagnostics: &'a mut Vec<Diagnostic>) -> Self {
        Self {
            unit,
            method: method.to_string(),
            b: CodeBuilder::new(method),
            scopes: vec![IndexMap::new()],
            loops: Vec::new(),
            nesting: 0,
            diagnostics,
        }
    }

    fn finish(mut self, span: Span) -> Code {
        if let Some(pool) = self.b.overflow() {
            self.diagnostics.push(Diagnostic::error(
                format!("`{}` needs more than {POOL_LIMIT} {pool}", self.method),
                span,
            ));
        }
        self.b.finish()
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics.push(Diagnostic::error(message, span));
    }

    // ── Scopes ──────────────────────────────────────────────────────

    fn declare(&mut self, name: &str, slot: u16, span: Span) {
        let innermost = self.scopes.len() - 1;
        match self.scopes.iter().position(|scope| scope.contains_key(name)) {
            Some(depth) if depth == innermost => self.error(
                format!("a local variable or parameter named `{name}` is already defined in this scope"),
                span,
            ),
            Some(_) => self.error(
                format!(
                    "a local or parameter named `{name}` cannot be declared in this scope because that name is used in an enclosing local scope"
                ),
                span,
            ),
            None => {
                self.scopes[innermost].insert(name.to_string(), slot);
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<Binding> {
        if let Some(slot) = self.scopes.iter().rev().find_map(|s| s.get(name)) {
            return Some(Binding::Local(*slot));
        }
        self.unit
            .fields
            .get_index_of(name)
            .map(|slot| Binding::Field(slot as u16))
    }

    fn declared_type(&self, binding: &Binding) -> Option<RuntimeType> {
        match binding {
            Binding::Local(slot) => self.b.local_type(*slot),
            Binding::Field(slot) => {
                self.unit.fields.get_index(*slot as usize).map(|(_, ty)| *ty)
            }
        }
    }

    /// A host static class named by `expr`, unless a variable hides it.
    fn static_class(&self, expr: &Expr) -> Option<StaticClass> {
        match &expr.kind {
            ExprKind::Name(name) if self.lookup(name).is_none() => {
                StaticClass::from_name(name)
            }
            ExprKind::Member { object, name } => match &object.kind {
                ExprKind::Name(ns)
                    if matches!(ns.as_str(), "UnityEngine" | "System")
                        && self.lookup(ns).is_none() =>
                {
                    StaticClass::from_name(name)
                }
                _ => None,
            },
            _ => None,
        }
    }

    // ── Statements ──────────────────────────────────────────────────

    fn block_inline(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.stmt(stmt);
        }
    }

    fn scoped(&mut self, f: impl FnOnce(&mut Self)) {
        self.scopes.push(IndexMap::new());
        f(self);
        self.scopes.pop();
    }

    fn stmt(&mut self, stmt: &Stmt) {
        // Trees from the parser never trip this; hand-built ones might.
        if self.nesting > parser::MAX_NESTING {
            self.error("statement nested too deeply", stmt.span);
            return;
        }
        self.nesting += 1;
        self.stmt_kind(stmt);
        self.nesting -= 1;
    }

    fn stmt_kind(&mut self, stmt: &Stmt) {
        self.b.set_line(stmt.span.start.line);
        match &stmt.kind {
            StmtKind::Local { ty, declarators } => self.local(ty, declarators, stmt.span),
            StmtKind::Expr(expr) => {
                if !matches!(
                    expr.kind,
                    ExprKind::Assign { .. }
                        | ExprKind::Step { .. }
                        | ExprKind::Call { .. }
                        | ExprKind::New { .. }
                ) {
                    self.error(
                        "only assignment, call, increment, decrement and new object expressions can be used as a statement",
                        expr.span,
                    );
                }
                self.expr(expr);
                self.b.emit(Instruction::Pop);
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond);
                let skip = self.b.jump_if_false();
                self.scoped(|c| c.stmt(then));
                match otherwise {
                    Some(otherwise) => {
                        let end = self.b.jump();
                        self.b.bind(skip);
                        self.scoped(|c| c.stmt(otherwise));
                        self.b.bind(end);
                    }
                    None => self.b.bind(skip),
                }
            }
            StmtKind::While { cond, body } => {
                let start = self.b.current_offset();
                self.expr(cond);
                let exit = self.b.jump_if_false();
                let labels = self.loop_body(body);
                self.b.jump_back(start);
                self.b.bind(exit);
                self.close_loop(labels, start);
            }
            StmtKind::DoWhile { body, cond } => {
                let start = self.b.current_offset();
                let labels = self.loop_body(body);
                let check = self.b.current_offset();
                self.b.set_line(cond.span.start.line);
                self.expr(cond);
                self.b.emit(Instruction::JumpIfTrue { target: start });
                self.close_loop(labels, check);
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => self.scoped(|c| {
                for stmt in init {
                    c.stmt(stmt);
                }
                let start = c.b.current_offset();
                let exit = cond.as_ref().map(|cond| {
                    c.expr(cond);
                    c.b.jump_if_false()
                });
                let labels = c.loop_body(body);
                let next = c.b.current_offset();
                for expr in step {
                    c.b.set_line(expr.span.start.line);
                    c.expr(expr);
                    c.b.emit(Instruction::Pop);
                }
                c.b.jump_back(start);
                if let Some(exit) = exit {
                    c.b.bind(exit);
                }
                c.close_loop(labels, next);
            }),
            StmtKind::Break | StmtKind::Continue => {
                if self.loops.is_empty() {
                    self.error(
                        "no enclosing loop out of which to break or continue",
                        stmt.span,
                    );
                    return;
                }
                let label = self.b.jump();
                if let Some(labels) = self.loops.last_mut() {
                    match stmt.kind {
                        StmtKind::Break => labels.breaks.push(label),
                        _ => labels.continues.push(label),
                    }
                }
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.error(
                        format!(
                            "since `{}` returns void, a return keyword must not be followed by an object expression",
                            self.method
                        ),
                        value.span,
                    );
                }
                self.b.emit(Instruction::Return);
            }
            StmtKind::Block(block) => self.scoped(|c| c.block_inline(block)),
            StmtKind::Empty => {}
        }
    }

    fn loop_body(&mut self, body: &Stmt) -> LoopLabels {
        self.loops.push(LoopLabels::default());
        self.scoped(|c| c.stmt(body));
        self.loops.pop().unwrap_or_default()
    }

    /// Bind pending breaks to the current offset and continues to `next`.
    fn close_loop(&mut self, labels: LoopLabels, next: u32) {
        for label in labels.breaks {
            self.b.bind(label);
        }
        for label in labels.continues {
            self.b.bind_to(label, next);
        }
    }

    fn local(&mut self, ty: &TypeRef, declarators: &[Declarator], span: Span) {
        let declared = match ty {
            TypeRef::Var(_) => {
                if declarators.len() > 1 {
                    self.error(
                        "implicitly-typed variables cannot have multiple declarators",
                        span,
                    );
                }
                None
            }
            TypeRef::Named { name, span } => match runtime_type(name) {
                Some(ty) => Some(ty),
                None => {
                    self.error(unknown_type(name), *span);
                    None
                }
            },
        };

        for decl in declarators {
            match &decl.init {
                Some(init) => self.expr(init),
                None => match declared {
                    Some(ty) => self.push_value(ty.zero_value()),
                    None => {
                        if matches!(ty, TypeRef::Var(_)) {
                            self.error("implicitly-typed variables must be initialized", decl.span);
                        }
                        self.b.emit(Instruction::PushNull);
                    }
                },
            }
            let slot = self.b.add_local(declared);
            self.declare(&decl.name, slot, decl.span);
            self.b.emit(Instruction::StoreLocal { slot });
        }
    }

    fn push_value(&mut self, value: Value) {
        match value {
            Value::Null => self.b.emit(Instruction::PushNull),
            value => self.b.push_const(value),
        }
    }

    // ── Expressions ─────────────────────────────────────────────────

    /// Emit code leaving exactly one value on the stack.
    fn expr(&mut self, expr: &Expr) {
        if expr.depth > parser::MAX_EXPR_DEPTH {
            self.error("expression nested too deeply", expr.span);
            return;
        }
        let line = expr.span.start.line;
        self.b.set_line(line);
        match &expr.kind {
            ExprKind::Literal(lit) => {
                let value = match lit {
                    Literal::Null => Value::Null,
                    Literal::Bool(v) => Value::Bool(*v),
                    Literal::Int(v) => Value::Int(*v),
                    Literal::Long(v) => Value::Long(*v),
                    Literal::Float(v) => Value::Float(*v),
                    Literal::Double(v) => Value::Double(*v),
                    Literal::Char(v) => Value::Char(*v),
                    Literal::Str(v) => Value::str(v),
                };
                self.push_value(value);
            }
            ExprKind::Name(name) => match self.lookup(name) {
                Some(Binding::Local(slot)) => self.b.emit(Instruction::LoadLocal { slot }),
                Some(Binding::Field(slot)) => self.b.emit(Instruction::LoadField { slot }),
                None => {
                    self.name_error(name, expr.span);
                    self.b.emit(Instruction::PushNull);
                }
            },
            ExprKind::Member { object, name } => {
                if let Some(class) = self.static_class(object) {
                    if !class.has_property(name) {
                        self.no_definition(class.name(), name, expr.span);
                    }
                    let name = self.b.name(name);
                    self.b.emit(Instruction::GetStatic { class, name });
                } else {
                    self.expr(object);
                    self.b.set_line(line);
                    let name = self.b.name(name);
                    self.b.emit(Instruction::GetMember { name });
                }
            }
            ExprKind::Call {
                callee,
                type_arg,
                args,
            } => self.call(callee, type_arg.as_ref(), args, expr.span),
            ExprKind::New { ty, args } => {
                let kind = match ty {
                    TypeRef::Named { name, span } => {
                        match runtime_type(name) {
                            Some(RuntimeType::Host(
                                kind @ (HostKind::Vector2 | HostKind::Vector3 | HostKind::GameObject),
                            )) => Some(kind),
                            Some(_) => {
                                self.error(format!("cannot create an instance of `{name}`"), *span);
                                None
                            }
                            None => {
                                self.error(unknown_type(name), *span);
                                None
                            }
                        }
                    }
                    TypeRef::Var(span) => {
                        self.error(unknown_type("var"), *span);
                        None
                    }
                };
                let argc = self.args(args, expr.span);
                self.b.set_line(line);
                match kind {
                    Some(kind) => self.b.emit(Instruction::New { kind, argc }),
                    None => self.b.emit(Instruction::PushNull),
                }
            }
            ExprKind::Unary { op, operand } => {
                self.expr(operand);
                self.b.set_line(line);
                self.b.emit(Instruction::Unary { op: *op });
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.expr(lhs);
                self.expr(rhs);
                self.b.set_line(line);
                self.b.emit(Instruction::Binary { op: *op });
            }
            ExprKind::Logical { op, lhs, rhs } => {
                self.expr(lhs);
                self.b.set_line(line);
                self.b.emit(Instruction::Dup);
                let done = match op {
                    LogicalOp::And => self.b.jump_if_false(),
                    LogicalOp::Or => self.b.jump_if_true(),
                };
                self.b.emit(Instruction::Pop);
                self.expr(rhs);
                // `a && b` with a non-bool `b` must still fault.
                self.b.set_line(line);
                self.b.push_const(Value::Bool(true));
                self.b.emit(Instruction::Binary { op: BinaryOp::BitAnd });
                self.b.bind(done);
            }
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond);
                let other = self.b.jump_if_false();
                self.expr(then);
                let end = self.b.jump();
                self.b.bind(other);
                self.expr(otherwise);
                self.b.bind(end);
            }
            ExprKind::Assign { target, op, value } => {
                let convert = match op {
                    Some(op) => {
                        self.expr(target);
                        self.expr(value);
                        self.b.set_line(line);
                        self.b.emit(Instruction::Binary { op: *op });
                        true
                    }
                    None => {
                        self.expr(value);
                        false
                    }
                };
                self.b.set_line(line);
                if convert {
                    self.compound_convert(target);
                }
                self.b.emit(Instruction::Dup);
                self.store(target);
            }
            ExprKind::Step {
                target,
                increment,
                prefix,
            } => {
                self.expr(target);
                self.b.set_line(line);
                if !prefix {
                    self.b.emit(Instruction::Dup);
                }
                self.b.push_const(Value::Int(1));
                let op = if *increment { BinaryOp::Add } else { BinaryOp::Sub };
                self.b.emit(Instruction::Binary { op });
                self.compound_convert(target);
                if *prefix {
                    self.b.emit(Instruction::Dup);
                }
                self.store(target);
            }
            ExprKind::Cast { ty, expr: inner } => {
                let ty = match ty {
                    TypeRef::Named { name, span } => {
                        let ty = runtime_type(name);
                        if ty.is_none() {
                            self.error(unknown_type(name), *span);
                        }
                        ty
                    }
                    TypeRef::Var(span) => {
                        self.error(unknown_type("var"), *span);
                        None
                    }
                };
                self.expr(inner);
                self.b.set_line(line);
                if let Some(ty) = ty {
                    self.b.emit(Instruction::Convert { ty });
                }
            }
            ExprKind::Interpolated(segments) => {
                for segment in segments {
                    match segment {
                        Segment::Text(text) => self.b.push_const(Value::str(text)),
                        Segment::Expr { expr, format } => {
                            self.expr(expr);
                            if let Some(format) = format {
                                let spec = self.b.name(format);
                                self.b.emit(Instruction::Format { spec });
                            }
                        }
                    }
                }
                self.b.set_line(line);
                match u16::try_from(segments.len()) {
                    Ok(parts) => self.b.emit(Instruction::Concat { parts }),
                    Err(_) => self.error("interpolated string has too many parts", expr.span),
                }
            }
        }
    }

    /// Compound assignment and `++`/`--` narrow back to the target's
    /// declared numeric type, the way `b += 1` works for a `byte b`.
    fn compound_convert(&mut self, target: &Expr) {
        if let ExprKind::Name(name) = &target.kind {
            let ty = self.lookup(name).and_then(|b| self.declared_type(&b));
            if let Some(ty) = ty.filter(|ty| ty.is_numeric() || *ty == RuntimeType::Char) {
                self.b.emit(Instruction::Convert { ty });
            }
        }
    }

    fn args(&mut self, args: &[Expr], span: Span) -> u8 {
        for arg in args {
            self.expr(arg);
        }
        match u8::try_from(args.len()) {
            Ok(argc) => argc,
            Err(_) => {
                self.error("too many arguments", span);
                u8::MAX
            }
        }
    }

    fn call(&mut self, callee: &Expr, type_arg: Option<&TypeRef>, args: &[Expr], span: Span) {
        let line = span.start.line;
        match &callee.kind {
            ExprKind::Name(name) => {
                let sig = self.unit.methods.get(name).map(|sig| (sig.index, sig.arity));
                if self.lookup(name).is_some() {
                    self.error(format!("`{name}` is a variable but is used like a method"), callee.span);
                } else if let Some((_, arity)) = sig.filter(|(_, arity)| *arity != args.len()) {
                    self.error(
                        format!(
                            "no overload for method `{name}` takes {} arguments (expected {arity})",
                            args.len()
                        ),
                        span,
                    );
                } else if sig.is_none() {
                    self.name_error(name, callee.span);
                }
                let argc = self.args(args, span);
                self.b.set_line(line);
                match sig {
                    Some((method, _)) => self.b.emit(Instruction::CallUnit { method, argc }),
                    None => {
                        for _ in 0..argc {
                            self.b.emit(Instruction::Pop);
                        }
                        self.b.emit(Instruction::PushNull);
                    }
                }
            }
            ExprKind::Member { object, name } => {
                if let Some(class) = self.static_class(object) {
                    if !class.has_method(name) {
                        self.no_definition(class.name(), name, callee.span);
                    }
                    let argc = self.args(args, span);
                    self.b.set_line(line);
                    let name = self.b.name(name);
                    self.b.emit(Instruction::CallStatic { class, name, argc });
                    return;
                }
                self.expr(object);
                let argc = self.args(args, span);
                self.b.set_line(line);
                let name = self.b.name(name);
                let type_arg = type_arg.map(|ty| self.b.name(strip_namespace(ty.name())));
                self.b.emit(Instruction::CallMethod {
                    name,
                    argc,
                    type_arg,
                });
            }
            _ => {
                self.error("method name expected", callee.span);
                self.b.emit(Instruction::PushNull);
            }
        }
    }

    /// Consume the value on top of the stack into `target`.
    fn store(&mut self, target: &Expr) {
        match &target.kind {
            ExprKind::Name(name) => match self.lookup(name) {
                Some(Binding::Local(slot)) => self.b.emit(Instruction::StoreLocal { slot }),
                Some(Binding::Field(slot)) => self.b.emit(Instruction::StoreField { slot }),
                None => {
                    if StaticClass::from_name(name).is_some() || self.unit.methods.contains_key(name) {
                        self.not_assignable(target.span);
                    } else {
                        self.name_error(name, target.span);
                    }
                    self.b.emit(Instruction::Pop);
                }
            },
            ExprKind::Member { object, name } => {
                if let Some(class) = self.static_class(object) {
                    self.error(
                        format!(
                            "property or indexer `{}.{name}` cannot be assigned to -- it is read only",
                            class.name()
                        ),
                        target.span,
                    );
                    self.b.emit(Instruction::Pop);
                    return;
                }
                let value = self.b.add_local(None);
                self.b.emit(Instruction::StoreLocal { slot: value });
                self.expr(object);
                self.b.emit(Instruction::LoadLocal { slot: value });
                let name = self.b.name(name);
                self.b.emit(Instruction::SetMember { name });
                if self.is_variable(object) {
                    // Value-type containers are written back; handles
                    // were mutated in place.
                    let done = self.b.pop_if_handle();
                    self.store(object);
                    self.b.bind(done);
                } else {
                    self.b.emit(Instruction::Pop);
                }
            }
            _ => {
                self.not_assignable(target.span);
                self.b.emit(Instruction::Pop);
            }
        }
    }

    fn is_variable(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Name(name) => self.lookup(name).is_some(),
            ExprKind::Member { object, .. } => {
                self.static_class(object).is_none() && self.is_variable(object)
            }
            _ => false,
        }
    }

    fn not_assignable(&mut self, span: Span) {
        self.error(
            "the left-hand side of an assignment must be a variable, property or indexer",
            span,
        );
    }

    fn name_error(&mut self, name: &str, span: Span) {
        let message = if StaticClass::from_name(name).is_some() {
            format!("`{name}` is a type, which is not valid in the given context")
        } else if self.unit.methods.contains_key(name) {
            format!("cannot convert method group `{name}` to a value")
        } else {
            format!("the name `{name}` does not exist in the current context")
        };
        self.error(message, span);
    }

    fn no_definition(&mut self, type_name: &str, member: &str, span: Span) {
        self.error(
            format!("`{type_name}` does not contain a definition for `{member}`"),
            span,
        );
    }
}
