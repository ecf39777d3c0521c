/// The host API surface visible to compiled code.
///
/// Everything a script can reach lives here: the static classes
/// (`Debug`, `Time`, `Mathf`, `Input`, `Random`, `Vector2`, `Vector3`,
/// `KeyCode`) and the members of host values. The compiler consults the
/// `has_*` tables to reject unknown static members up front; instance
/// members are checked when they run, since locals are dynamically typed
/// at that point.
use std::sync::Arc;

use crate::error::Fault;
use crate::host::{LogLevel, ObjectId, World};
use crate::types::HostKind;
use crate::value::{Value, Vec2, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticClass {
    Debug,
    Time,
    Mathf,
    Input,
    Random,
    Vector2,
    Vector3,
    KeyCode,
}

const KEY_NAMES: &[&str] = &[
    "Space",
    "Return",
    "Escape",
    "Tab",
    "Backspace",
    "LeftArrow",
    "RightArrow",
    "UpArrow",
    "DownArrow",
    "LeftShift",
    "RightShift",
    "LeftControl",
    "RightControl",
    "Mouse0",
    "Mouse1",
];

impl StaticClass {
    pub fn from_name(name: &str) -> Option<Self> {
        let class = match name {
            "Debug" => Self::Debug,
            "Time" => Self::Time,
            "Mathf" => Self::Mathf,
            "Input" => Self::Input,
            "Random" => Self::Random,
            "Vector2" => Self::Vector2,
            "Vector3" => Self::Vector3,
            "KeyCode" => Self::KeyCode,
            _ => return None,
        };
        Some(class)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Debug => "Debug",
            Self::Time => "Time",
            Self::Mathf => "Mathf",
            Self::Input => "Input",
            Self::Random => "Random",
            Self::Vector2 => "Vector2",
            Self::Vector3 => "Vector3",
            Self::KeyCode => "KeyCode",
        }
    }

    pub fn has_property(self, name: &str) -> bool {
        match self {
            Self::Debug | Self::Input => false,
            Self::Time => matches!(
                name,
                "deltaTime" | "fixedDeltaTime" | "time" | "frameCount"
            ),
            Self::Mathf => {
                matches!(name, "PI" | "Infinity" | "Deg2Rad" | "Rad2Deg")
            }
            Self::Random => name == "value",
            Self::Vector2 => matches!(
                name,
                "zero" | "one" | "up" | "down" | "left" | "right"
            ),
            Self::Vector3 => {
                Self::Vector2.has_property(name)
                    || matches!(name, "forward" | "back")
            }
            Self::KeyCode => is_key_name(name),
        }
    }

    pub fn has_method(self, name: &str) -> bool {
        match self {
            Self::Debug => matches!(name, "Log" | "LogWarning" | "LogError"),
            Self::Time | Self::KeyCode => false,
            Self::Mathf => matches!(
                name,
                "Abs"
                    | "Sin"
                    | "Cos"
                    | "Tan"
                    | "Atan2"
                    | "Sqrt"
                    | "Pow"
                    | "Min"
                    | "Max"
                    | "Clamp"
                    | "Clamp01"
                    | "Lerp"
                    | "MoveTowards"
                    | "Round"
                    | "Floor"
                    | "Ceil"
                    | "RoundToInt"
                    | "FloorToInt"
                    | "CeilToInt"
                    | "Sign"
            ),
            Self::Input => matches!(
                name,
                "GetKey" | "GetKeyDown" | "GetKeyUp" | "GetAxis" | "GetAxisRaw"
            ),
            Self::Random => name == "Range",
            Self::Vector2 | Self::Vector3 => {
                matches!(name, "Distance" | "Lerp" | "Dot")
            }
        }
    }
}

/// Letters, `Alpha0`..`Alpha9` and the named keys.
fn is_key_name(name: &str) -> bool {
    let single_letter = name.len() == 1
        && name.chars().all(|c| c.is_ascii_uppercase());
    let alpha_digit = name
        .strip_prefix("Alpha")
        .is_some_and(|d| d.len() == 1 && d.chars().all(|c| c.is_ascii_digit()));
    single_letter || alpha_digit || KEY_NAMES.contains(&name)
}

fn bad_arity(method: &str, args: &[Value]) -> Fault {
    Fault::BadArity {
        method: method.to_string(),
        argc: args.len(),
    }
}

fn unknown(target: &Value, member: &str) -> Fault {
    match target {
        Value::Null => Fault::NullReference {
            member: member.to_string(),
        },
        other => Fault::UnknownMember {
            type_name: other.type_name(),
            member: member.to_string(),
        },
    }
}

fn floats<const N: usize>(method: &str, args: &[Value]) -> Result<[f32; N], Fault> {
    if args.len() != N {
        return Err(bad_arity(method, args));
    }
    let mut out = [0.0; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg.as_f32()?;
    }
    Ok(out)
}

/// A `Vector3` from either one vector argument or two or three numbers.
fn vec3_args(method: &str, args: &[Value]) -> Result<Vec3, Fault> {
    match args {
        [v] => v.as_vec3(),
        [x, y] => Ok(Vec3::new(x.as_f32()?, y.as_f32()?, 0.0)),
        [x, y, z] => Ok(Vec3::new(x.as_f32()?, y.as_f32()?, z.as_f32()?)),
        _ => Err(bad_arity(method, args)),
    }
}

fn key_arg(method: &str, args: &[Value]) -> Result<Arc<str>, Fault> {
    match args {
        [Value::Str(key)] => Ok(key.clone()),
        [other] => Err(Fault::TypeMismatch {
            expected: "KeyCode",
            found: other.type_name(),
        }),
        _ => Err(bad_arity(method, args)),
    }
}

fn all_integral(args: &[Value]) -> bool {
    args.iter().all(|a| {
        matches!(a, Value::Byte(_) | Value::Short(_) | Value::Int(_))
    })
}

pub fn get_static(world: &World, class: StaticClass, name: &str) -> Result<Value, Fault> {
    let value = match (class, name) {
        (StaticClass::Time, "deltaTime") => Value::Float(world.time.delta()),
        (StaticClass::Time, "fixedDeltaTime") => {
            Value::Float(world.time.fixed_delta_time)
        }
        (StaticClass::Time, "time") => Value::Float(world.time.time),
        (StaticClass::Time, "frameCount") => {
            Value::Int(world.time.frame_count as i32)
        }
        (StaticClass::Mathf, "PI") => Value::Float(std::f32::consts::PI),
        (StaticClass::Mathf, "Infinity") => Value::Float(f32::INFINITY),
        (StaticClass::Mathf, "Deg2Rad") => {
            Value::Float(std::f32::consts::PI / 180.0)
        }
        (StaticClass::Mathf, "Rad2Deg") => {
            Value::Float(180.0 / std::f32::consts::PI)
        }
        (StaticClass::Vector2, _) => {
            let v = match name {
                "zero" => Vec2::ZERO,
                "one" => Vec2::ONE,
                "up" => Vec2::UP,
                "down" => Vec2::DOWN,
                "left" => Vec2::LEFT,
                "right" => Vec2::RIGHT,
                _ => return Err(unknown_static(class, name)),
            };
            Value::Vector2(v)
        }
        (StaticClass::Vector3, _) => {
            let v = match name {
                "zero" => Vec3::ZERO,
                "one" => Vec3::ONE,
                "up" => Vec3::UP,
                "down" => Vec3::DOWN,
                "left" => Vec3::LEFT,
                "right" => Vec3::RIGHT,
                "forward" => Vec3::FORWARD,
                "back" => Vec3::BACK,
                _ => return Err(unknown_static(class, name)),
            };
            Value::Vector3(v)
        }
        (StaticClass::KeyCode, key) if is_key_name(key) => Value::str(key),
        _ => return Err(unknown_static(class, name)),
    };
    Ok(value)
}

/// `Random.value` needs the generator, so it is a mutable read.
pub fn get_static_mut(
    world: &mut World,
    class: StaticClass,
    name: &str,
) -> Result<Value, Fault> {
    match (class, name) {
        (StaticClass::Random, "value") => Ok(Value::Float(world.next_random())),
        _ => get_static(world, class, name),
    }
}

fn unknown_static(class: StaticClass, name: &str) -> Fault {
    Fault::UnknownMember {
        type_name: class.name(),
        member: name.to_string(),
    }
}

pub fn call_static(
    world: &mut World,
    class: StaticClass,
    name: &str,
    args: &[Value],
) -> Result<Value, Fault> {
    match class {
        StaticClass::Debug => {
            let level = match name {
                "Log" => LogLevel::Info,
                "LogWarning" => LogLevel::Warning,
                "LogError" => LogLevel::Error,
                _ => return Err(unknown_static(class, name)),
            };
            let [message] = args else {
                return Err(bad_arity(name, args));
            };
            world.log(level, message.to_string());
            Ok(Value::Null)
        }
        StaticClass::Mathf => mathf(name, args),
        StaticClass::Input => match name {
            "GetKey" => Ok(Value::Bool(world.input.is_held(&key_arg(name, args)?))),
            "GetKeyDown" => {
                Ok(Value::Bool(world.input.was_pressed(&key_arg(name, args)?)))
            }
            "GetKeyUp" => {
                Ok(Value::Bool(world.input.was_released(&key_arg(name, args)?)))
            }
            "GetAxis" | "GetAxisRaw" => {
                let axis = key_arg(name, args)?;
                match world.input.axis(&axis) {
                    Some(value) => Ok(Value::Float(value)),
                    None => Err(Fault::UnknownMember {
                        type_name: "Input",
                        member: format!("axis \"{axis}\""),
                    }),
                }
            }
            _ => Err(unknown_static(class, name)),
        },
        StaticClass::Random => match (name, args) {
            ("Range", [lo, hi]) if all_integral(args) => {
                let (lo, hi) = (lo.as_i64()?, hi.as_i64()?);
                if hi <= lo {
                    return Ok(Value::Int(lo as i32));
                }
                let span = (hi - lo) as f32;
                let pick = lo + (world.next_random() * span) as i64;
                Ok(Value::Int(pick.min(hi - 1) as i32))
            }
            ("Range", _) => {
                let [lo, hi] = floats::<2>(name, args)?;
                Ok(Value::Float(lo + world.next_random() * (hi - lo)))
            }
            _ => Err(unknown_static(class, name)),
        },
        StaticClass::Vector2 | StaticClass::Vector3 => {
            vector_static(class, name, args)
        }
        StaticClass::Time | StaticClass::KeyCode => {
            Err(unknown_static(class, name))
        }
    }
}

fn mathf(name: &str, args: &[Value]) -> Result<Value, Fault> {
    if matches!(name, "Abs" | "Min" | "Max" | "Clamp") && all_integral(args) {
        let ints = args
            .iter()
            .map(|a| a.as_i64().map(|v| v as i32))
            .collect::<Result<Vec<_>, _>>()?;
        let value = match (name, ints.as_slice()) {
            ("Abs", [v]) => v.wrapping_abs(),
            ("Min", [a, b]) => *a.min(b),
            ("Max", [a, b]) => *a.max(b),
            ("Clamp", [v, lo, hi]) => (*v).max(*lo).min(*hi),
            _ => return Err(bad_arity(name, args)),
        };
        return Ok(Value::Int(value));
    }

    let float = |v: f32| -> Result<Value, Fault> { Ok(Value::Float(v)) };
    match name {
        "Abs" => float(floats::<1>(name, args)?[0].abs()),
        "Sin" => float(floats::<1>(name, args)?[0].sin()),
        "Cos" => float(floats::<1>(name, args)?[0].cos()),
        "Tan" => float(floats::<1>(name, args)?[0].tan()),
        "Sqrt" => float(floats::<1>(name, args)?[0].sqrt()),
        "Round" => float(floats::<1>(name, args)?[0].round_ties_even()),
        "Floor" => float(floats::<1>(name, args)?[0].floor()),
        "Ceil" => float(floats::<1>(name, args)?[0].ceil()),
        "RoundToInt" => {
            Ok(Value::Int(floats::<1>(name, args)?[0].round_ties_even() as i32))
        }
        "FloorToInt" => Ok(Value::Int(floats::<1>(name, args)?[0].floor() as i32)),
        "CeilToInt" => Ok(Value::Int(floats::<1>(name, args)?[0].ceil() as i32)),
        "Sign" => {
            let [v] = floats::<1>(name, args)?;
            float(if v >= 0.0 { 1.0 } else { -1.0 })
        }
        "Clamp01" => float(floats::<1>(name, args)?[0].clamp(0.0, 1.0)),
        "Atan2" => {
            let [y, x] = floats::<2>(name, args)?;
            float(y.atan2(x))
        }
        "Pow" => {
            let [b, e] = floats::<2>(name, args)?;
            float(b.powf(e))
        }
        "Min" => {
            let [a, b] = floats::<2>(name, args)?;
            float(a.min(b))
        }
        "Max" => {
            let [a, b] = floats::<2>(name, args)?;
            float(a.max(b))
        }
        "Clamp" => {
            let [v, lo, hi] = floats::<3>(name, args)?;
            float(v.max(lo).min(hi))
        }
        "Lerp" => {
            let [a, b, t] = floats::<3>(name, args)?;
            float(a + (b - a) * t.clamp(0.0, 1.0))
        }
        "MoveTowards" => {
            let [current, target, max_delta] = floats::<3>(name, args)?;
            let diff = target - current;
            if diff.abs() <= max_delta {
                float(target)
            } else {
                float(current + max_delta.copysign(diff))
            }
        }
        _ => Err(unknown_static(StaticClass::Mathf, name)),
    }
}

fn vector_static(class: StaticClass, name: &str, args: &[Value]) -> Result<Value, Fault> {
    let wrap = |v: Vec3| match class {
        StaticClass::Vector2 => Value::Vector2(v.truncate()),
        _ => Value::Vector3(v),
    };
    match (name, args) {
        ("Distance", [a, b]) => Ok(Value::Float(a.as_vec3()?.distance(b.as_vec3()?))),
        ("Dot", [a, b]) => {
            let (a, b) = (a.as_vec3()?, b.as_vec3()?);
            Ok(Value::Float(a.x * b.x + a.y * b.y + a.z * b.z))
        }
        ("Lerp", [a, b, t]) => {
            Ok(wrap(a.as_vec3()?.lerp(b.as_vec3()?, t.as_f32()?)))
        }
        ("Distance" | "Dot" | "Lerp", _) => Err(bad_arity(name, args)),
        _ => Err(unknown_static(class, name)),
    }
}

pub fn construct(world: &mut World, kind: HostKind, args: &[Value]) -> Result<Value, Fault> {
    match kind {
        HostKind::Vector2 => match args {
            [] => Ok(Value::Vector2(Vec2::ZERO)),
            [x, y] => Ok(Value::Vector2(Vec2::new(x.as_f32()?, y.as_f32()?))),
            _ => Err(bad_arity("Vector2", args)),
        },
        HostKind::Vector3 => match args {
            [] => Ok(Value::Vector3(Vec3::ZERO)),
            _ => vec3_args("Vector3", args).map(Value::Vector3),
        },
        HostKind::GameObject => {
            let name = match args {
                [] => "New Game Object".to_string(),
                [name] => name.to_string(),
                _ => return Err(bad_arity("GameObject", args)),
            };
            Ok(Value::Object(world.spawn(name)))
        }
        HostKind::Transform | HostKind::Rigidbody2D => {
            Err(Fault::InvalidConversion {
                from: "constructor arguments",
                to: kind.name(),
            })
        }
    }
}

/// Object that owns a handle.
fn owner(target: &Value) -> Option<ObjectId> {
    match target {
        Value::Object(id) | Value::Transform(id) | Value::Body(id) => Some(*id),
        _ => None,
    }
}

pub fn get_member(world: &World, target: &Value, name: &str) -> Result<Value, Fault> {
    if let Some(id) = owner(target) {
        match name {
            "gameObject" => {
                world.get(id)?;
                return Ok(Value::Object(id));
            }
            "transform" => {
                world.get(id)?;
                return Ok(Value::Transform(id));
            }
            "name" => return Ok(Value::str(&world.get(id)?.name)),
            _ => {}
        }
    }

    let value = match target {
        Value::Vector2(v) => match name {
            "x" => Value::Float(v.x),
            "y" => Value::Float(v.y),
            "magnitude" => Value::Float(v.magnitude()),
            "sqrMagnitude" => Value::Float(v.x * v.x + v.y * v.y),
            "normalized" => Value::Vector2(v.normalized()),
            _ => return Err(unknown(target, name)),
        },
        Value::Vector3(v) => match name {
            "x" => Value::Float(v.x),
            "y" => Value::Float(v.y),
            "z" => Value::Float(v.z),
            "magnitude" => Value::Float(v.magnitude()),
            "sqrMagnitude" => Value::Float(v.x * v.x + v.y * v.y + v.z * v.z),
            "normalized" => Value::Vector3(v.normalized()),
            _ => return Err(unknown(target, name)),
        },
        Value::Str(s) if name == "Length" => Value::Int(s.chars().count() as i32),
        Value::Object(id) => match name {
            "activeSelf" => Value::Bool(world.get(*id)?.active),
            _ => return Err(unknown(target, name)),
        },
        Value::Transform(id) => {
            let t = world.get(*id)?.transform;
            match name {
                "position" | "localPosition" => Value::Vector3(t.position),
                "eulerAngles" | "localEulerAngles" => {
                    Value::Vector3(t.euler_angles)
                }
                "localScale" => Value::Vector3(t.local_scale),
                "up" => Value::Vector3(t.up()),
                "right" => Value::Vector3(t.right()),
                _ => return Err(unknown(target, name)),
            }
        }
        Value::Body(id) => {
            let body = world.body(*id)?;
            match name {
                "velocity" => Value::Vector2(body.velocity),
                "angularVelocity" => Value::Float(body.angular_velocity),
                "gravityScale" => Value::Float(body.gravity_scale),
                "mass" => Value::Float(body.mass),
                "position" => Value::Vector2(
                    world.get(*id)?.transform.position.truncate(),
                ),
                _ => return Err(unknown(target, name)),
            }
        }
        _ => return Err(unknown(target, name)),
    };
    Ok(value)
}

/// Assign `value` to `target.name`. Returns the updated target: a new
/// vector for value types, the same handle for world objects.
pub fn set_member(
    world: &mut World,
    target: Value,
    name: &str,
    value: Value,
) -> Result<Value, Fault> {
    match target {
        Value::Vector2(mut v) => {
            match name {
                "x" => v.x = value.as_f32()?,
                "y" => v.y = value.as_f32()?,
                _ => return Err(unknown(&target, name)),
            }
            Ok(Value::Vector2(v))
        }
        Value::Vector3(mut v) => {
            match name {
                "x" => v.x = value.as_f32()?,
                "y" => v.y = value.as_f32()?,
                "z" => v.z = value.as_f32()?,
                _ => return Err(unknown(&target, name)),
            }
            Ok(Value::Vector3(v))
        }
        Value::Object(id) | Value::Transform(id) | Value::Body(id)
            if name == "name" =>
        {
            world.get_mut(id)?.name = value.to_string();
            Ok(target)
        }
        Value::Transform(id) => {
            let t = &mut world.get_mut(id)?.transform;
            match name {
                "position" | "localPosition" => t.position = value.as_vec3()?,
                "eulerAngles" | "localEulerAngles" => {
                    t.euler_angles = value.as_vec3()?;
                }
                "localScale" => t.local_scale = value.as_vec3()?,
                _ => return Err(unknown(&target, name)),
            }
            Ok(target)
        }
        Value::Body(id) => {
            if name == "position" {
                let p = value.as_vec2()?;
                world.body(id)?;
                let t = &mut world.get_mut(id)?.transform;
                t.position = p.extend(t.position.z);
                return Ok(target);
            }
            let body = world.body_mut(id)?;
            match name {
                "velocity" => body.velocity = value.as_vec2()?,
                "angularVelocity" => body.angular_velocity = value.as_f32()?,
                "gravityScale" => body.gravity_scale = value.as_f32()?,
                "mass" => body.mass = value.as_f32()?,
                _ => return Err(unknown(&target, name)),
            }
            Ok(target)
        }
        _ => Err(unknown(&target, name)),
    }
}

pub fn call_member(
    world: &mut World,
    target: &Value,
    name: &str,
    type_arg: Option<&str>,
    args: &[Value],
) -> Result<Value, Fault> {
    if name == "ToString" && args.is_empty() {
        if let Value::Null = target {
            return Err(unknown(target, name));
        }
        return Ok(Value::str(&target.to_string()));
    }

    if let (Some(id), Some(component)) = (owner(target), type_arg) {
        match name {
            "GetComponent" => {
                let object = world.get(id)?;
                return Ok(match component {
                    "Transform" => Value::Transform(id),
                    "Rigidbody2D" if object.body.is_some() => Value::Body(id),
                    _ => Value::Null,
                });
            }
            "AddComponent" if component == "Rigidbody2D" => {
                world.get(id)?;
                world.add_body(id);
                return Ok(Value::Body(id));
            }
            _ => {}
        }
    }

    match target {
        Value::Object(id) if name == "SetActive" => {
            let [active] = args else {
                return Err(bad_arity(name, args));
            };
            world.get_mut(*id)?.active = active.as_bool()?;
            Ok(Value::Null)
        }
        Value::Transform(id) => {
            let t = &mut world.get_mut(*id)?.transform;
            match name {
                "Translate" => t.translate(vec3_args(name, args)?),
                "Rotate" => t.rotate(vec3_args(name, args)?),
                _ => return Err(unknown(target, name)),
            }
            Ok(Value::Null)
        }
        Value::Body(id) if name == "MovePosition" => {
            let [p] = args else {
                return Err(bad_arity(name, args));
            };
            let p = p.as_vec2()?;
            world.body(*id)?;
            let t = &mut world.get_mut(*id)?.transform;
            t.position = p.extend(t.position.z);
            Ok(Value::Null)
        }
        Value::Body(id) => {
            let body = world.body_mut(*id)?;
            match (name, args) {
                ("AddForce", [force] | [force, _]) => {
                    body.pending_force = body.pending_force + force.as_vec2()?;
                }
                ("AddTorque", [torque] | [torque, _]) => {
                    let torque = torque.as_f32()?;
                    body.angular_velocity += torque / body.mass.max(1e-3);
                }
                ("AddForce" | "AddTorque", _) => {
                    return Err(bad_arity(name, args));
                }
                _ => return Err(unknown(target, name)),
            }
            Ok(Value::Null)
        }
        Value::Vector2(v) if name == "Normalize" => Ok(Value::Vector2(v.normalized())),
        Value::Vector3(v) if name == "Normalize" => Ok(Value::Vector3(v.normalized())),
        Value::Str(s) => match (name, args) {
            ("ToUpper", []) => Ok(Value::str(&s.to_uppercase())),
            ("ToLower", []) => Ok(Value::str(&s.to_lowercase())),
            ("Contains", [Value::Str(needle)]) => {
                Ok(Value::Bool(s.contains(needle.as_ref())))
            }
            _ => Err(unknown(target, name)),
        },
        _ => Err(unknown(target, name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostCreateInfo;

    fn world() -> World {
        World::new(&HostCreateInfo::default())
    }

    #[test]
    fn static_tables() {
        assert!(StaticClass::Time.has_property("deltaTime"));
        assert!(!StaticClass::Time.has_method("deltaTime"));
        assert!(StaticClass::Vector3.has_property("forward"));
        assert!(!StaticClass::Vector2.has_property("forward"));
        assert!(StaticClass::KeyCode.has_property("W"));
        assert!(StaticClass::KeyCode.has_property("Alpha1"));
        assert!(!StaticClass::KeyCode.has_property("Banana"));
        assert!(StaticClass::Debug.has_method("Log"));
    }

    #[test]
    fn debug_log_is_captured() {
        let mut world = world();
        call_static(&mut world, StaticClass::Debug, "Log", &[Value::Int(3)])
            .expect("log");
        call_static(
            &mut world,
            StaticClass::Debug,
            "LogWarning",
            &[Value::str("careful")],
        )
        .expect("log");
        assert_eq!(world.logs.len(), 2);
        assert_eq!(world.logs[0].message, "3");
        assert_eq!(world.logs[1].level, LogLevel::Warning);
    }

    #[test]
    fn mathf_keeps_integer_overloads() {
        let call = |name, args: &[Value]| mathf(name, args);
        assert_eq!(call("Abs", &[Value::Int(-3)]), Ok(Value::Int(3)));
        assert_eq!(call("Abs", &[Value::Float(-3.5)]), Ok(Value::Float(3.5)));
        assert_eq!(
            call("Clamp", &[Value::Float(5.0), Value::Int(0), Value::Int(2)]),
            Ok(Value::Float(2.0))
        );
        assert_eq!(call("RoundToInt", &[Value::Float(2.5)]), Ok(Value::Int(2)));
        assert_eq!(
            call("MoveTowards", &[Value::Int(0), Value::Int(10), Value::Int(3)]),
            Ok(Value::Float(3.0))
        );
        assert!(matches!(call("Sqrt", &[]), Err(Fault::BadArity { .. })));
    }

    #[test]
    fn transform_members_and_translate() {
        let mut world = world();
        let id = world.spawn("Hero");
        let t = Value::Transform(id);
        call_member(&mut world, &t, "Translate", None, &[
            Value::Int(1),
            Value::Float(2.0),
            Value::Int(0),
        ])
        .expect("translate");
        assert_eq!(
            get_member(&world, &t, "position"),
            Ok(Value::Vector3(Vec3::new(1.0, 2.0, 0.0)))
        );

        let updated = set_member(
            &mut world,
            t.clone(),
            "position",
            Value::Vector2(Vec2::new(5.0, 6.0)),
        );
        assert_eq!(updated, Ok(t.clone()));
        assert_eq!(world.get(id).map(|o| o.transform.position.x), Ok(5.0));
    }

    #[test]
    fn vector_members_have_value_semantics() {
        let mut world = world();
        let v = Value::Vector3(Vec3::new(1.0, 2.0, 3.0));
        let updated = set_member(&mut world, v.clone(), "y", Value::Int(9));
        assert_eq!(updated, Ok(Value::Vector3(Vec3::new(1.0, 9.0, 3.0))));
        assert_eq!(get_member(&world, &v, "y"), Ok(Value::Float(2.0)));
    }

    #[test]
    fn components_are_looked_up_by_type_argument() {
        let mut world = world();
        let id = world.spawn("Ball");
        let obj = Value::Object(id);
        assert_eq!(
            call_member(&mut world, &obj, "GetComponent", Some("Rigidbody2D"), &[]),
            Ok(Value::Null)
        );
        let body = call_member(&mut world, &obj, "AddComponent", Some("Rigidbody2D"), &[])
            .expect("add");
        set_member(&mut world, body.clone(), "velocity", Value::Vector2(Vec2::UP))
            .expect("velocity");
        assert_eq!(world.body(id).map(|b| b.velocity), Ok(Vec2::UP));
        assert_eq!(
            call_member(&mut world, &obj, "GetComponent", Some("Rigidbody2D"), &[]),
            Ok(body)
        );
    }

    #[test]
    fn null_and_destroyed_targets_fault() {
        let mut world = world();
        assert!(matches!(
            get_member(&world, &Value::Null, "position"),
            Err(Fault::NullReference { .. })
        ));
        let id = world.spawn("Gone");
        world.despawn(id);
        assert_eq!(
            get_member(&world, &Value::Transform(id), "position"),
            Err(Fault::DestroyedObject(id))
        );
    }

    #[test]
    fn input_reads_key_codes() {
        let mut world = world();
        world.input.press("Space");
        let key = get_static(&world, StaticClass::KeyCode, "Space").expect("key");
        assert_eq!(
            call_static(&mut world, StaticClass::Input, "GetKeyDown", &[key]),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            call_static(
                &mut world,
                StaticClass::Input,
                "GetAxis",
                &[Value::str("Horizontal")]
            ),
            Ok(Value::Float(0.0))
        );
    }

    #[test]
    fn random_range_respects_bounds() {
        let mut world = world();
        for _ in 0..100 {
            let Ok(Value::Int(v)) = call_static(
                &mut world,
                StaticClass::Random,
                "Range",
                &[Value::Int(0), Value::Int(3)],
            ) else {
                panic!("expected an int");
            };
            assert!((0..3).contains(&v));
        }
    }
}
