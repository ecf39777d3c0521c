use std::sync::Arc;

use crate::builtins;
use crate::bytecode::{Code, Instruction, Program};
use crate::error::{Fault, InvocationFault};
use crate::host::World;
use crate::value::Value;

/// Bounds applied to every invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Instructions one invocation may execute, nested calls included.
    pub fuel: u64,
    /// Maximum number of live frames.
    pub max_depth: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            fuel: 1_000_000,
            max_depth: 64,
        }
    }
}

struct Frame<'p> {
    code: &'p Code,
    pc: usize,
    locals: Vec<Value>,
    /// Stack height when the frame was entered.
    base: usize,
}

impl<'p> Frame<'p> {
    fn new(code: &'p Code, args: Vec<Value>, base: usize) -> Result<Self, Fault> {
        let mut locals = vec![Value::Null; code.local_types.len()];
        let params = locals.iter_mut().zip(&code.local_types);
        for ((local, ty), arg) in params.zip(args) {
            *local = match ty {
                Some(ty) => arg.coerce(*ty)?,
                None => arg,
            };
        }
        Ok(Self {
            code,
            pc: 0,
            locals,
            base,
        })
    }
}

/// Execution state of one invocation.
pub struct Interpreter<'p, 'w> {
    program: &'p Program,
    fields: &'w mut [Value],
    world: &'w mut World,
    limits: ExecutionLimits,
    fuel: u64,
    stack: Vec<Value>,
    frames: Vec<Frame<'p>>,
}

impl<'p, 'w> Interpreter<'p, 'w> {
    pub fn new(
        program: &'p Program,
        fields: &'w mut [Value],
        world: &'w mut World,
        limits: ExecutionLimits,
    ) -> Self {
        Self {
            program,
            fields,
            world,
            limits,
            fuel: limits.fuel,
            stack: Vec::new(),
            frames: Vec::new(),
        }
    }

    /// Run the field initializers.
    pub fn run_init(mut self) -> Result<(), InvocationFault> {
        let program = self.program;
        self.enter(&program.init, Vec::new())
            .map_err(|fault| invocation_fault(&program.init, 0, fault))?;
        self.run()
    }

    /// Run method `index` with `args`.
    pub fn invoke(mut self, index: u16, args: Vec<Value>) -> Result<(), InvocationFault> {
        let program = self.program;
        let code = &program.methods[index as usize];
        self.enter(code, args)
            .map_err(|fault| invocation_fault(code, 0, fault))?;
        self.run()
    }

    fn enter(&mut self, code: &'p Code, args: Vec<Value>) -> Result<(), Fault> {
        if self.frames.len() >= self.limits.max_depth {
            return Err(Fault::StackOverflow {
                limit: self.limits.max_depth,
            });
        }
        log::trace!("enter {} with {} arg(s)", code.name, args.len());
        let frame = Frame::new(code, args, self.stack.len())?;
        self.frames.push(frame);
        Ok(())
    }

    fn run(&mut self) -> Result<(), InvocationFault> {
        while let Some(frame) = self.frames.last() {
            let code = frame.code;
            let pc = frame.pc;
            match self.step(code, pc) {
                Ok(()) => {}
                Err(fault) => return Err(invocation_fault(code, pc, fault)),
            }
        }
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or(Value::Null)
    }

    fn pop_args(&mut self, argc: u8) -> Vec<Value> {
        let at = self.stack.len().saturating_sub(argc as usize);
        self.stack.split_off(at)
    }

    fn frame(&mut self) -> &mut Frame<'p> {
        let top = self.frames.len() - 1;
        &mut self.frames[top]
    }

    fn jump(&mut self, target: u32) {
        self.frame().pc = target as usize;
    }

    fn step(&mut self, code: &'p Code, pc: usize) -> Result<(), Fault> {
        if self.fuel == 0 {
            return Err(Fault::FuelExhausted {
                limit: self.limits.fuel,
            });
        }
        self.fuel -= 1;

        let Some(&instr) = code.instructions.get(pc) else {
            return self.leave();
        };
        self.frame().pc = pc + 1;

        match instr {
            Instruction::PushConst { idx } => {
                self.stack.push(code.constants[idx as usize].clone());
            }
            Instruction::PushNull => self.stack.push(Value::Null),
            Instruction::Pop => {
                self.pop();
            }
            Instruction::Dup => {
                let top = self.stack.last().cloned().unwrap_or(Value::Null);
                self.stack.push(top);
            }
            Instruction::LoadLocal { slot } => {
                let value = self.frame().locals[slot as usize].clone();
                self.stack.push(value);
            }
            Instruction::StoreLocal { slot } => {
                let value = self.pop();
                let value = match code.local_types[slot as usize] {
                    Some(ty) => value.coerce(ty)?,
                    None => value,
                };
                self.frame().locals[slot as usize] = value;
            }
            Instruction::LoadField { slot } => {
                self.stack.push(self.fields[slot as usize].clone());
            }
            Instruction::StoreField { slot } => {
                let ty = self.program.fields[slot as usize].ty;
                let value = self.pop().coerce(ty)?;
                self.fields[slot as usize] = value;
            }
            Instruction::GetMember { name } => {
                let target = self.pop();
                let value = builtins::get_member(self.world, &target, code.name_at(name))?;
                self.stack.push(value);
            }
            Instruction::SetMember { name } => {
                let value = self.pop();
                let target = self.pop();
                let updated =
                    builtins::set_member(self.world, target, code.name_at(name), value)?;
                self.stack.push(updated);
            }
            Instruction::GetStatic { class, name } => {
                let value = builtins::get_static_mut(self.world, class, code.name_at(name))?;
                self.stack.push(value);
            }
            Instruction::CallMethod {
                name,
                argc,
                type_arg,
            } => {
                let args = self.pop_args(argc);
                let target = self.pop();
                let type_arg = type_arg.map(|idx| code.name_at(idx));
                let value = builtins::call_member(
                    self.world,
                    &target,
                    code.name_at(name),
                    type_arg,
                    &args,
                )?;
                self.stack.push(value);
            }
            Instruction::CallStatic { class, name, argc } => {
                let args = self.pop_args(argc);
                let value =
                    builtins::call_static(self.world, class, code.name_at(name), &args)?;
                self.stack.push(value);
            }
            Instruction::CallUnit { method, argc } => {
                let args = self.pop_args(argc);
                let program = self.program;
                self.enter(&program.methods[method as usize], args)?;
            }
            Instruction::New { kind, argc } => {
                let args = self.pop_args(argc);
                let value = builtins::construct(self.world, kind, &args)?;
                self.stack.push(value);
            }
            Instruction::Unary { op } => {
                let operand = self.pop();
                self.stack.push(Value::unary(op, &operand)?);
            }
            Instruction::Binary { op } => {
                let rhs = self.pop();
                let lhs = self.pop();
                self.stack.push(Value::binary(op, &lhs, &rhs)?);
            }
            Instruction::Convert { ty } => {
                let value = self.pop();
                self.stack.push(value.cast(ty)?);
            }
            Instruction::Concat { parts } => {
                let at = self.stack.len().saturating_sub(parts as usize);
                let joined: String = self.stack.drain(at..).map(|v| v.to_string()).collect();
                self.stack.push(Value::Str(Arc::from(joined)));
            }
            Instruction::Format { spec } => {
                let value = self.pop();
                self.stack.push(Value::str(&format_value(&value, code.name_at(spec))?));
            }
            Instruction::Jump { target } => self.jump(target),
            Instruction::JumpIfFalse { target } => {
                if !self.pop().as_bool()? {
                    self.jump(target);
                }
            }
            Instruction::JumpIfTrue { target } => {
                if self.pop().as_bool()? {
                    self.jump(target);
                }
            }
            Instruction::PopIfHandle { target } => {
                if matches!(
                    self.stack.last(),
                    Some(Value::Object(_) | Value::Transform(_) | Value::Body(_))
                ) {
                    self.pop();
                    self.jump(target);
                }
            }
            Instruction::Return => return self.leave(),
        }
        Ok(())
    }

    fn leave(&mut self) -> Result<(), Fault> {
        if let Some(frame) = self.frames.pop() {
            self.stack.truncate(frame.base);
            if !self.frames.is_empty() {
                // Unit methods return void; the call expression still
                // yields a value for the statement to discard.
                self.stack.push(Value::Null);
            }
        }
        Ok(())
    }
}

fn invocation_fault(code: &Code, pc: usize, fault: Fault) -> InvocationFault {
    InvocationFault {
        method: code.name.clone(),
        line: code.line_at(pc).filter(|&line| line > 0),
        fault,
    }
}

/// Largest precision or width a format specifier may ask for.
pub const MAX_FORMAT_PRECISION: usize = 99;

/// Numeric format strings of interpolation holes: `F2`, `N0`, `D3`, and
/// custom patterns such as `0.00`. Anything else formats as `ToString`.
/// A precision past [`MAX_FORMAT_PRECISION`] is a fault.
pub fn format_value(value: &Value, spec: &str) -> Result<String, Fault> {
    let invalid = || Fault::InvalidFormat {
        spec: spec.to_string(),
    };
    let precision = |digits: &str, default: usize| {
        if digits.is_empty() {
            return Ok(Some(default));
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(None);
        }
        match digits.parse::<usize>() {
            Ok(n) if n <= MAX_FORMAT_PRECISION => Ok(Some(n)),
            _ => Err(invalid()),
        }
    };
    let number = value.as_f32().ok().map(|_| match value {
        Value::Double(v) => *v,
        Value::Long(v) => *v as f64,
        other => other.as_f32().map(f64::from).unwrap_or_default(),
    });

    let (Some(number), Some(kind)) = (number, spec.chars().next()) else {
        return Ok(value.to_string());
    };
    let rest = &spec[kind.len_utf8()..];
    let text = match kind.to_ascii_uppercase() {
        'F' => match precision(rest, 2)? {
            Some(n) => format!("{number:.n$}"),
            None => value.to_string(),
        },
        'N' => match precision(rest, 2)? {
            Some(n) => group_thousands(&format!("{number:.n$}")),
            None => value.to_string(),
        },
        'D' => match (value.as_i64(), precision(rest, 0)?) {
            (Ok(v), Some(width)) if v < 0 => format!("-{:0width$}", v.unsigned_abs()),
            (Ok(v), Some(width)) => format!("{v:0width$}"),
            _ => value.to_string(),
        },
        '0' | '#' => {
            let frac = spec.split_once('.').map_or("", |(_, frac)| frac);
            let places = frac.chars().filter(|c| matches!(c, '0' | '#')).count();
            if places > MAX_FORMAT_PRECISION {
                return Err(invalid());
            }
            format!("{number:.places$}")
        }
        _ => value.to_string(),
    };
    Ok(text)
}

/// Insert `,` between groups of three integer digits.
fn group_thousands(fixed: &str) -> String {
    let (sign, digits) = match fixed.strip_prefix('-') {
        Some(digits) => ("-", digits),
        None => ("", fixed),
    };
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };
    let mut out = String::with_capacity(fixed.len() + int.len() / 3);
    out.push_str(sign);
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if let Some(frac) = frac {
        out.push('.');
        out.push_str(frac);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::host::{HostCreateInfo, ObjectId};
    use crate::value::Vec3;

    struct Run {
        world: World,
        fields: Vec<Value>,
        host: ObjectId,
    }

    fn run(fields: &str, body: &str) -> Result<Run, InvocationFault> {
        run_with(fields, body, ExecutionLimits::default())
    }

    fn run_with(
        fields: &str,
        body: &str,
        limits: ExecutionLimits,
    ) -> Result<Run, InvocationFault> {
        let src = format!(
            "using UnityEngine;\npublic class DynamicCode {{\n{fields}\npublic void onTick(GameObject currentObject) {{\nvar transform = currentObject.transform;\n{body}\n}}\n}}"
        );
        let program = match compile(&src) {
            Ok(compilation) => compilation.program,
            Err(err) => panic!("unexpected diagnostics: {:#?}", err.diagnostics),
        };
        let mut world = World::new(&HostCreateInfo::default());
        let host = world.spawn("Host");
        let mut fields: Vec<Value> = program.fields.iter().map(|f| f.ty.zero_value()).collect();
        Interpreter::new(&program, &mut fields, &mut world, limits).run_init()?;
        let (index, _) = program.method("onTick").expect("onTick");
        Interpreter::new(&program, &mut fields, &mut world, limits)
            .invoke(index, vec![Value::Object(host)])?;
        Ok(Run {
            world,
            fields,
            host,
        })
    }

    fn logs(run: &Run) -> Vec<&str> {
        run.world.logs.iter().map(|e| e.message.as_str()).collect()
    }

    // ── Expressions ─────────────────────────────────────────────────

    #[test]
    fn arithmetic_and_concatenation() {
        let run = run(
            "",
            "int a = 7 / 2;\nfloat b = a * 0.5f;\nDebug.Log(\"a=\" + a + \" b=\" + b);",
        )
        .expect("runs");
        assert_eq!(logs(&run), vec!["a=3 b=1.5"]);
    }

    #[test]
    fn interpolation_with_formats() {
        let run = run("", "float hp = 2.5f;\nDebug.Log($\"hp {hp:F2} lvl {3:D2} x{hp}\");")
            .expect("runs");
        assert_eq!(logs(&run), vec!["hp 2.50 lvl 03 x2.5"]);
    }

    #[test]
    fn short_circuit_skips_rhs() {
        let run = run(
            "public int calls;",
            "bool ok = false && Check(currentObject);\nbool also = true || Check(currentObject);\nif (!ok && also) { Debug.Log(\"ok\"); }\n}\npublic void Check(GameObject g) {\ncalls++;",
        );
        // `Check` returns void, so using it as an operand faults only if it runs.
        let run = run.expect("short circuit avoids the call");
        assert_eq!(logs(&run), vec!["ok"]);
        assert_eq!(run.fields[0], Value::Int(0));
    }

    #[test]
    fn conditional_and_casts() {
        let run = run("", "int x = 5;\nstring s = x > 3 ? \"big\" : \"small\";\nDebug.Log(s + (int)2.9f + (char)65);")
            .expect("runs");
        assert_eq!(logs(&run), vec!["big2A"]);
    }

    // ── Statements ──────────────────────────────────────────────────

    #[test]
    fn loops_with_break_and_continue() {
        let run = run(
            "public int total;",
            "for (int i = 0; i < 10; i++) {\nif (i % 2 == 0) continue;\nif (i > 7) break;\ntotal += i;\n}\nint n = 0;\nwhile (n < 3) n++;\ndo { n--; } while (n > 0);\ntotal += n;",
        )
        .expect("runs");
        assert_eq!(run.fields[0], Value::Int(1 + 3 + 5 + 7));
    }

    #[test]
    fn early_return() {
        let run = run("public int x;", "x = 1;\nif (x == 1) return;\nx = 2;").expect("runs");
        assert_eq!(run.fields[0], Value::Int(1));
    }

    #[test]
    fn fields_persist_typed_values() {
        let run = run("public byte b = 250;\npublic float f = 1;", "b += 10;\nf += 1;")
            .expect("runs");
        assert_eq!(run.fields, vec![Value::Byte(4), Value::Float(2.0)]);
    }

    #[test]
    fn unit_methods_call_each_other() {
        let run = run(
            "public int hits;",
            "Hit(currentObject);\nHit(currentObject);\n}\npublic void Hit(GameObject g) {\nhits++;",
        )
        .expect("runs");
        assert_eq!(run.fields[0], Value::Int(2));
    }

    // ── Host access ─────────────────────────────────────────────────

    #[test]
    fn transform_writes_through_value_types() {
        let run = run(
            "",
            "transform.position = new Vector3(1, 2, 3);\ntransform.position.x = 5;\nVector3 p = transform.position;\np.y = 9;",
        )
        .expect("runs");
        let pos = run.world.get(run.host).expect("host").transform.position;
        assert_eq!(pos, Vec3::new(5.0, 2.0, 3.0));
    }

    #[test]
    fn components_and_physics() {
        let run = run(
            "",
            "Rigidbody2D rb = currentObject.AddComponent<Rigidbody2D>();\nrb.velocity = new Vector2(1, 0);\nrb.velocity.y = 2;",
        )
        .expect("runs");
        let body = run.world.body(run.host).expect("body");
        assert_eq!(body.velocity.y, 2.0);
    }

    // ── Faults ──────────────────────────────────────────────────────

    #[test]
    fn faults_carry_method_and_line() {
        let err = match run("", "int zero = 0;\nint x = 1 / zero;") {
            Ok(_) => panic!("expected a fault"),
            Err(err) => err,
        };
        assert_eq!(err.method, "onTick");
        assert_eq!(err.line, Some(7));
        assert_eq!(err.fault, Fault::DivideByZero);
    }

    #[test]
    fn fuel_exhaustion() {
        let limits = ExecutionLimits {
            fuel: 500,
            max_depth: 8,
        };
        let err = match run_with("", "while (true) { }", limits) {
            Ok(_) => panic!("expected a fault"),
            Err(err) => err,
        };
        assert_eq!(err.fault, Fault::FuelExhausted { limit: 500 });
    }

    #[test]
    fn recursion_depth() {
        let limits = ExecutionLimits {
            fuel: 100_000,
            max_depth: 8,
        };
        let err = match run_with("", "onTick(currentObject);", limits) {
            Ok(_) => panic!("expected a fault"),
            Err(err) => err,
        };
        assert_eq!(err.fault, Fault::StackOverflow { limit: 8 });
    }

    #[test]
    fn null_member_access() {
        let err = match run("", "GameObject g = null;\ng.SetActive(false);") {
            Ok(_) => panic!("expected a fault"),
            Err(err) => err,
        };
        assert!(matches!(err.fault, Fault::NullReference { .. }));
    }

    #[test]
    fn format_specs() {
        let fmt = |value: Value, spec: &str| format_value(&value, spec).expect("formats");
        assert_eq!(fmt(Value::Float(1.0 / 3.0), "F3"), "0.333");
        assert_eq!(fmt(Value::Double(2.0), "0.0"), "2.0");
        assert_eq!(fmt(Value::Int(-7), "D3"), "-007");
        assert_eq!(fmt(Value::str("x"), "F2"), "x");
        assert_eq!(fmt(Value::Int(5), "X"), "5");
        assert_eq!(fmt(Value::Int(5), "Fx"), "5");
        assert_eq!(fmt(Value::Double(0.5), "F99").len(), 101);
    }

    #[test]
    fn number_format_groups_thousands() {
        let fmt = |value: Value, spec: &str| format_value(&value, spec).expect("formats");
        assert_eq!(fmt(Value::Double(1234567.891), "N2"), "1,234,567.89");
        assert_eq!(fmt(Value::Int(-1234), "N0"), "-1,234");
        assert_eq!(fmt(Value::Int(999), "N"), "999.00");
        assert_eq!(fmt(Value::Long(1_000_000), "N1"), "1,000,000.0");
        assert_eq!(fmt(Value::Int(100_000), "n0"), "100,000");
    }

    #[test]
    fn oversized_format_precision_faults() {
        let custom = format!("0.{}", "0".repeat(100));
        for spec in ["F70000", "N100", "D100", "F99999999999999999999999", custom.as_str()] {
            assert_eq!(
                format_value(&Value::Int(1), spec),
                Err(Fault::InvalidFormat {
                    spec: spec.to_string()
                }),
            );
        }

        let err = match run("", "float x = 1.5f;\nDebug.Log($\"{x:F70000}\");") {
            Ok(_) => panic!("expected a fault"),
            Err(err) => err,
        };
        assert_eq!(
            err.fault,
            Fault::InvalidFormat {
                spec: "F70000".into()
            }
        );
        assert_eq!(err.method, "onTick");
    }
}
