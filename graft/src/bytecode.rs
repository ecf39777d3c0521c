use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::ast::{BinaryOp, UnaryOp};
use crate::builtins::StaticClass;
use crate::host::ObjectId;
use crate::types::{HostKind, RuntimeType};
use crate::value::Value;

/// One stack-machine instruction.
///
/// `idx`/`name` operands index the owning [`Code`]'s constant and name
/// pools, `slot` operands index frame locals or unit fields, and jump
/// targets are absolute instruction indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction {
    PushConst {
        idx: u16,
    },
    PushNull,
    Pop,
    Dup,
    LoadLocal {
        slot: u16,
    },
    /// Pops and stores, converting to the slot's declared type.
    StoreLocal {
        slot: u16,
    },
    LoadField {
        slot: u16,
    },
    StoreField {
        slot: u16,
    },
    GetMember {
        name: u16,
    },
    /// Pops value and target; pushes the updated target.
    SetMember {
        name: u16,
    },
    GetStatic {
        class: StaticClass,
        name: u16,
    },
    CallMethod {
        name: u16,
        argc: u8,
        type_arg: Option<u16>,
    },
    CallStatic {
        class: StaticClass,
        name: u16,
        argc: u8,
    },
    CallUnit {
        method: u16,
        argc: u8,
    },
    New {
        kind: HostKind,
        argc: u8,
    },
    Unary {
        op: UnaryOp,
    },
    Binary {
        op: BinaryOp,
    },
    Convert {
        ty: RuntimeType,
    },
    /// Joins the top `parts` values into one string.
    Concat {
        parts: u16,
    },
    /// Formats the top value with the format string at `spec`.
    Format {
        spec: u16,
    },
    Jump {
        target: u32,
    },
    JumpIfFalse {
        target: u32,
    },
    JumpIfTrue {
        target: u32,
    },
    /// Pops and jumps when the top value is an object handle; value types
    /// fall through to be written back into their container.
    PopIfHandle {
        target: u32,
    },
    Return,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PushConst { idx } => write!(f, "PushConst #{idx}"),
            Self::PushNull => write!(f, "PushNull"),
            Self::Pop => write!(f, "Pop"),
            Self::Dup => write!(f, "Dup"),
            Self::LoadLocal { slot } => write!(f, "LoadLocal l{slot}"),
            Self::StoreLocal { slot } => write!(f, "StoreLocal l{slot}"),
            Self::LoadField { slot } => write!(f, "LoadField f{slot}"),
            Self::StoreField { slot } => write!(f, "StoreField f{slot}"),
            Self::GetMember { name } => write!(f, "GetMember ${name}"),
            Self::SetMember { name } => write!(f, "SetMember ${name}"),
            Self::GetStatic { class, name } => {
                write!(f, "GetStatic {}.${name}", class.name())
            }
            Self::CallMethod {
                name,
                argc,
                type_arg,
            } => match type_arg {
                Some(ty) => write!(f, "CallMethod ${name}<${ty}> {argc}"),
                None => write!(f, "CallMethod ${name} {argc}"),
            },
            Self::CallStatic { class, name, argc } => {
                write!(f, "CallStatic {}.${name} {argc}", class.name())
            }
            Self::CallUnit { method, argc } => {
                write!(f, "CallUnit m{method} {argc}")
            }
            Self::New { kind, argc } => write!(f, "New {} {argc}", kind.name()),
            Self::Unary { op } => write!(f, "Unary {}", op.symbol()),
            Self::Binary { op } => write!(f, "Binary {}", op.symbol()),
            Self::Convert { ty } => write!(f, "Convert {ty}"),
            Self::Concat { parts } => write!(f, "Concat {parts}"),
            Self::Format { spec } => write!(f, "Format ${spec}"),
            Self::Jump { target } => write!(f, "Jump ->{target}"),
            Self::JumpIfFalse { target } => write!(f, "JumpIfFalse ->{target}"),
            Self::JumpIfTrue { target } => write!(f, "JumpIfTrue ->{target}"),
            Self::PopIfHandle { target } => write!(f, "PopIfHandle ->{target}"),
            Self::Return => write!(f, "Return"),
        }
    }
}

/// A forward jump whose target has not yet been resolved.
///
/// Created by [`CodeBuilder::jump`] and friends; resolve it with
/// [`CodeBuilder::bind`].
#[derive(Debug)]
#[must_use]
pub struct Label {
    at: usize,
}

/// Compiled body of one method, or of the field initializers.
#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    pub name: String,
    pub instructions: Vec<Instruction>,
    /// Source line of each instruction.
    pub lines: Vec<u32>,
    pub constants: Vec<Value>,
    pub names: Vec<Arc<str>>,
    /// Declared type of each local slot; `None` for `var` and parameters
    /// of host handle type, which are stored as given.
    pub local_types: Vec<Option<RuntimeType>>,
    pub param_count: usize,
}

impl Code {
    pub fn name_at(&self, idx: u16) -> &str {
        &self.names[idx as usize]
    }

    pub fn line_at(&self, pc: usize) -> Option<usize> {
        self.lines.get(pc).map(|&line| line as usize)
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "== {} (params {}, locals {}) ==",
            self.name,
            self.param_count,
            self.local_types.len()
        )?;
        if !self.constants.is_empty() {
            writeln!(f, "-- constants --")?;
            for (idx, value) in self.constants.iter().enumerate() {
                writeln!(f, "[{idx}] {value:?}")?;
            }
        }
        if !self.names.is_empty() {
            writeln!(f, "-- names --")?;
            for (idx, name) in self.names.iter().enumerate() {
                writeln!(f, "${idx} {name}")?;
            }
        }
        writeln!(f, "-- code --")?;
        for (pc, (instr, line)) in self.instructions.iter().zip(&self.lines).enumerate() {
            writeln!(f, "{pc:04} {line:>4}  {instr}")?;
        }
        Ok(())
    }
}

/// Entries a constant, name or local pool can address.
pub const POOL_LIMIT: usize = u16::MAX as usize + 1;

/// Incrementally builds a [`Code`].
///
/// Pools past [`POOL_LIMIT`] entries cannot be addressed. The builder
/// keeps going and remembers which pool overflowed, see
/// [`CodeBuilder::overflow`].
pub struct CodeBuilder {
    name: String,
    instructions: Vec<Instruction>,
    lines: Vec<u32>,
    constants: IndexMap<ConstKey, Value>,
    names: IndexSet<Arc<str>>,
    local_types: Vec<Option<RuntimeType>>,
    param_count: usize,
    line: u32,
    overflow: Option<&'static str>,
}

impl CodeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: Vec::new(),
            lines: Vec::new(),
            constants: IndexMap::new(),
            names: IndexSet::new(),
            local_types: Vec::new(),
            param_count: 0,
            line: 0,
            overflow: None,
        }
    }

    /// The first pool that outgrew [`POOL_LIMIT`], if any. Code from a
    /// builder that overflowed must not run.
    pub fn overflow(&self) -> Option<&'static str> {
        self.overflow
    }

    fn index(&mut self, idx: usize, pool: &'static str) -> u16 {
        u16::try_from(idx).unwrap_or_else(|_| {
            self.overflow.get_or_insert(pool);
            u16::MAX
        })
    }

    /// Line attached to instructions emitted from now on.
    pub fn set_line(&mut self, line: usize) {
        self.line = line as u32;
    }

    pub fn current_offset(&self) -> u32 {
        self.instructions.len() as u32
    }

    pub fn emit(&mut self, instr: Instruction) {
        self.instructions.push(instr);
        self.lines.push(self.line);
    }

    pub fn constant(&mut self, value: Value) -> u16 {
        let (idx, _) = self.constants.insert_full(ConstKey::of(&value), value);
        self.index(idx, "constants")
    }

    pub fn push_const(&mut self, value: Value) {
        let idx = self.constant(value);
        self.emit(Instruction::PushConst { idx });
    }

    pub fn name(&mut self, name: &str) -> u16 {
        let idx = match self.names.get_index_of(name) {
            Some(idx) => idx,
            None => self.names.insert_full(Arc::from(name)).0,
        };
        self.index(idx, "names")
    }

    pub fn add_param(&mut self, ty: Option<RuntimeType>) -> u16 {
        self.param_count += 1;
        self.add_local(ty)
    }

    pub fn add_local(&mut self, ty: Option<RuntimeType>) -> u16 {
        self.local_types.push(ty);
        self.index(self.local_types.len() - 1, "locals")
    }

    pub fn local_type(&self, slot: u16) -> Option<RuntimeType> {
        self.local_types.get(slot as usize).copied().flatten()
    }

    pub fn jump(&mut self) -> Label {
        self.emit_label(Instruction::Jump { target: u32::MAX })
    }

    pub fn jump_if_false(&mut self) -> Label {
        self.emit_label(Instruction::JumpIfFalse { target: u32::MAX })
    }

    pub fn jump_if_true(&mut self) -> Label {
        self.emit_label(Instruction::JumpIfTrue { target: u32::MAX })
    }

    pub fn pop_if_handle(&mut self) -> Label {
        self.emit_label(Instruction::PopIfHandle { target: u32::MAX })
    }

    fn emit_label(&mut self, instr: Instruction) -> Label {
        self.emit(instr);
        Label {
            at: self.instructions.len() - 1,
        }
    }

    /// Point `label` at the next instruction to be emitted.
    pub fn bind(&mut self, label: Label) {
        let here = self.current_offset();
        self.bind_to(label, here);
    }

    pub fn bind_to(&mut self, label: Label, here: u32) {
        match &mut self.instructions[label.at] {
            Instruction::Jump { target }
            | Instruction::JumpIfFalse { target }
            | Instruction::JumpIfTrue { target }
            | Instruction::PopIfHandle { target } => *target = here,
            other => unreachable!("label bound to non-jump {other}"),
        }
    }

    /// Backward jump to a known offset.
    pub fn jump_back(&mut self, target: u32) {
        self.emit(Instruction::Jump { target });
    }

    pub fn finish(mut self) -> Code {
        if self.instructions.last() != Some(&Instruction::Return) {
            self.emit(Instruction::Return);
        }
        Code {
            name: self.name,
            instructions: self.instructions,
            lines: self.lines,
            constants: self.constants.into_values().collect(),
            names: self.names.into_iter().collect(),
            local_types: self.local_types,
            param_count: self.param_count,
        }
    }
}

/// Pool identity of a constant. Floats compare by bits, so `0` and `0.0`
/// (equal under [`Value::equals`]) and `0.0` and `-0.0` stay apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstKey {
    Null,
    Bool(bool),
    Char(char),
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(u32),
    Double(u64),
    Str(Arc<str>),
    Vector2([u32; 2]),
    Vector3([u32; 3]),
    Object(ObjectId),
    Transform(ObjectId),
    Body(ObjectId),
}

impl ConstKey {
    fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(v) => Self::Bool(*v),
            Value::Char(v) => Self::Char(*v),
            Value::Byte(v) => Self::Byte(*v),
            Value::Short(v) => Self::Short(*v),
            Value::Int(v) => Self::Int(*v),
            Value::Long(v) => Self::Long(*v),
            Value::Float(v) => Self::Float(v.to_bits()),
            Value::Double(v) => Self::Double(v.to_bits()),
            Value::Str(s) => Self::Str(s.clone()),
            Value::Vector2(v) => Self::Vector2([v.x.to_bits(), v.y.to_bits()]),
            Value::Vector3(v) => Self::Vector3([v.x.to_bits(), v.y.to_bits(), v.z.to_bits()]),
            Value::Object(id) => Self::Object(*id),
            Value::Transform(id) => Self::Transform(*id),
            Value::Body(id) => Self::Body(*id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    pub ty: RuntimeType,
}

/// A compiled unit: one class worth of fields and methods.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub class_name: String,
    pub fields: Vec<FieldInfo>,
    /// Runs the field initializers in declaration order.
    pub init: Code,
    pub methods: Vec<Code>,
    method_index: IndexMap<String, u16>,
}

impl Program {
    pub fn new(
        class_name: String,
        fields: Vec<FieldInfo>,
        init: Code,
        methods: Vec<Code>,
    ) -> Self {
        let method_index = methods
            .iter()
            .enumerate()
            .map(|(idx, code)| (code.name.clone(), idx as u16))
            .collect();
        Self {
            class_name,
            fields,
            init,
            methods,
            method_index,
        }
    }

    pub fn method(&self, name: &str) -> Option<(u16, &Code)> {
        let idx = *self.method_index.get(name)?;
        Some((idx, &self.methods[idx as usize]))
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.method_index.keys().map(String::as_str)
    }

    pub fn field_slot(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "class {}", self.class_name)?;
        for (slot, field) in self.fields.iter().enumerate() {
            writeln!(f, "  f{slot} {} {}", field.ty, field.name)?;
        }
        write!(f, "{}", self.init)?;
        for code in &self.methods {
            write!(f, "{code}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_patch_forward_jumps() {
        let mut b = CodeBuilder::new("test");
        b.push_const(Value::Bool(true));
        let skip = b.jump_if_false();
        b.push_const(Value::Int(1));
        b.emit(Instruction::Pop);
        b.bind(skip);
        let code = b.finish();

        assert_eq!(code.instructions, vec![
            Instruction::PushConst { idx: 0 },
            Instruction::JumpIfFalse { target: 4 },
            Instruction::PushConst { idx: 1 },
            Instruction::Pop,
            Instruction::Return,
        ]);
    }

    #[test]
    fn pools_are_deduplicated() {
        let mut b = CodeBuilder::new("test");
        assert_eq!(b.constant(Value::Int(2)), 0);
        assert_eq!(b.constant(Value::Float(2.0)), 1);
        assert_eq!(b.constant(Value::Int(2)), 0);
        assert_eq!(b.name("x"), 0);
        assert_eq!(b.name("y"), 1);
        assert_eq!(b.name("x"), 0);
    }

    #[test]
    fn constants_keep_float_bit_patterns_apart() {
        let mut b = CodeBuilder::new("test");
        assert_eq!(b.constant(Value::Double(0.0)), 0);
        assert_eq!(b.constant(Value::Double(-0.0)), 1);
        assert_eq!(b.constant(Value::Int(0)), 2);
        assert_eq!(b.constant(Value::str("a")), 3);
        assert_eq!(b.constant(Value::str("a")), 3);
        assert_eq!(b.constant(Value::Double(-0.0)), 1);
        let code = b.finish();
        assert_eq!(code.constants.len(), 4);
        assert_eq!(code.constants[2], Value::Int(0));
    }

    #[test]
    fn pool_overflow_is_remembered() {
        let mut b = CodeBuilder::new("test");
        for n in 0..POOL_LIMIT {
            assert_eq!(b.constant(Value::Int(n as i32)) as usize, n);
        }
        assert_eq!(b.overflow(), None);
        assert_eq!(b.constant(Value::Int(-1)), u16::MAX);
        assert_eq!(b.overflow(), Some("constants"));

        let mut b = CodeBuilder::new("test");
        for _ in 0..=POOL_LIMIT {
            b.add_local(None);
        }
        assert_eq!(b.overflow(), Some("locals"));
    }

    #[test]
    fn lines_follow_instructions() {
        let mut b = CodeBuilder::new("test");
        b.set_line(3);
        b.emit(Instruction::PushNull);
        b.set_line(5);
        b.emit(Instruction::Pop);
        let code = b.finish();
        assert_eq!(code.line_at(0), Some(3));
        assert_eq!(code.line_at(1), Some(5));
        assert_eq!(code.line_at(9), None);
    }

    #[test]
    fn disassembly() {
        let instr = Instruction::CallStatic {
            class: StaticClass::Debug,
            name: 2,
            argc: 1,
        };
        assert_eq!(instr.to_string(), "CallStatic Debug.$2 1");
        assert_eq!(Instruction::Jump { target: 7 }.to_string(), "Jump ->7");
    }
}
