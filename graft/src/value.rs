use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

use crate::ast::{BinaryOp, UnaryOp};
use crate::error::Fault;
use crate::host::ObjectId;
use crate::types::{HostKind, RuntimeType};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self::new(0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0);
    pub const UP: Self = Self::new(0.0, 1.0);
    pub const DOWN: Self = Self::new(0.0, -1.0);
    pub const LEFT: Self = Self::new(-1.0, 0.0);
    pub const RIGHT: Self = Self::new(1.0, 0.0);

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn magnitude(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn normalized(self) -> Self {
        let len = self.magnitude();
        if len > 1e-5 { self / len } else { Self::ZERO }
    }

    pub fn extend(self, z: f32) -> Vec3 {
        Vec3::new(self.x, self.y, z)
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for Vec2 {
    type Output = Self;
    fn div(self, rhs: f32) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);
    pub const UP: Self = Self::new(0.0, 1.0, 0.0);
    pub const DOWN: Self = Self::new(0.0, -1.0, 0.0);
    pub const LEFT: Self = Self::new(-1.0, 0.0, 0.0);
    pub const RIGHT: Self = Self::new(1.0, 0.0, 0.0);
    pub const FORWARD: Self = Self::new(0.0, 0.0, 1.0);
    pub const BACK: Self = Self::new(0.0, 0.0, -1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn normalized(self) -> Self {
        let len = self.magnitude();
        if len > 1e-5 { self / len } else { Self::ZERO }
    }

    pub fn truncate(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn distance(self, other: Self) -> f32 {
        (self - other).magnitude()
    }

    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        self + (other - self) * t
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f32> for Vec3 {
    type Output = Self;
    fn div(self, rhs: f32) -> Self {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// A value as seen by compiled code.
///
/// Numbers keep their declared width so that field stores and literal
/// rendering stay faithful to the source types. Handles (`Object`,
/// `Transform`, `Body`) refer to world objects and have reference
/// semantics; vectors are copied.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(Arc<str>),
    Vector2(Vec2),
    Vector3(Vec3),
    Object(ObjectId),
    Transform(ObjectId),
    Body(ObjectId),
}

/// Operand after C# numeric promotion.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Numeric {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl Numeric {
    fn rank(self) -> u8 {
        match self {
            Self::Int(_) => 0,
            Self::Long(_) => 1,
            Self::Float(_) => 2,
            Self::Double(_) => 3,
        }
    }

    fn widen(self, rank: u8) -> Self {
        match (self, rank) {
            (Self::Int(v), 1) => Self::Long(v as i64),
            (Self::Int(v), 2) => Self::Float(v as f32),
            (Self::Int(v), 3) => Self::Double(v as f64),
            (Self::Long(v), 2) => Self::Float(v as f32),
            (Self::Long(v), 3) => Self::Double(v as f64),
            (Self::Float(v), 3) => Self::Double(v as f64),
            (other, _) => other,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Self::Int(v) => Value::Int(v),
            Self::Long(v) => Value::Long(v),
            Self::Float(v) => Value::Float(v),
            Self::Double(v) => Value::Double(v),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Long(v) => v as f64,
            Self::Float(v) => v as f64,
            Self::Double(v) => v,
        }
    }
}

impl Value {
    pub fn str(s: &str) -> Self {
        Self::Str(Arc::from(s))
    }

    /// Type name as compiled code would spell it.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Char(_) => "char",
            Self::Byte(_) => "byte",
            Self::Short(_) => "short",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Str(_) => "string",
            Self::Vector2(_) => "Vector2",
            Self::Vector3(_) => "Vector3",
            Self::Object(_) => "GameObject",
            Self::Transform(_) => "Transform",
            Self::Body(_) => "Rigidbody2D",
        }
    }

    pub fn runtime_type(&self) -> Option<RuntimeType> {
        let ty = match self {
            Self::Null => return None,
            Self::Bool(_) => RuntimeType::Bool,
            Self::Char(_) => RuntimeType::Char,
            Self::Byte(_) => RuntimeType::Byte,
            Self::Short(_) => RuntimeType::Short,
            Self::Int(_) => RuntimeType::Int,
            Self::Long(_) => RuntimeType::Long,
            Self::Float(_) => RuntimeType::Float,
            Self::Double(_) => RuntimeType::Double,
            Self::Str(_) => RuntimeType::String,
            Self::Vector2(_) => RuntimeType::Host(HostKind::Vector2),
            Self::Vector3(_) => RuntimeType::Host(HostKind::Vector3),
            Self::Object(_) => RuntimeType::Host(HostKind::GameObject),
            Self::Transform(_) => RuntimeType::Host(HostKind::Transform),
            Self::Body(_) => RuntimeType::Host(HostKind::Rigidbody2D),
        };
        Some(ty)
    }

    fn numeric(&self) -> Option<Numeric> {
        let n = match *self {
            Self::Byte(v) => Numeric::Int(v as i32),
            Self::Short(v) => Numeric::Int(v as i32),
            Self::Char(v) => Numeric::Int(v as i32),
            Self::Int(v) => Numeric::Int(v),
            Self::Long(v) => Numeric::Long(v),
            Self::Float(v) => Numeric::Float(v),
            Self::Double(v) => Numeric::Double(v),
            _ => return None,
        };
        Some(n)
    }

    pub fn as_bool(&self) -> Result<bool, Fault> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(Fault::TypeMismatch {
                expected: "bool",
                found: other.type_name(),
            }),
        }
    }

    /// Any numeric value as a `float`, the host API's working precision.
    pub fn as_f32(&self) -> Result<f32, Fault> {
        self.numeric()
            .map(|n| n.as_f64() as f32)
            .ok_or_else(|| Fault::TypeMismatch {
                expected: "float",
                found: self.type_name(),
            })
    }

    pub fn as_i64(&self) -> Result<i64, Fault> {
        match self.numeric() {
            Some(Numeric::Int(v)) => Ok(v as i64),
            Some(Numeric::Long(v)) => Ok(v),
            _ => Err(Fault::TypeMismatch {
                expected: "int",
                found: self.type_name(),
            }),
        }
    }

    pub fn as_vec3(&self) -> Result<Vec3, Fault> {
        match self {
            Self::Vector3(v) => Ok(*v),
            Self::Vector2(v) => Ok(v.extend(0.0)),
            other => Err(Fault::TypeMismatch {
                expected: "Vector3",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_vec2(&self) -> Result<Vec2, Fault> {
        match self {
            Self::Vector2(v) => Ok(*v),
            Self::Vector3(v) => Ok(v.truncate()),
            other => Err(Fault::TypeMismatch {
                expected: "Vector2",
                found: other.type_name(),
            }),
        }
    }

    /// Implicit conversion applied when storing into a typed slot.
    pub fn coerce(self, ty: RuntimeType) -> Result<Value, Fault> {
        if self.runtime_type() == Some(ty) {
            return Ok(self);
        }
        let invalid = |from: &Value| Fault::InvalidConversion {
            from: from.type_name(),
            to: ty.name(),
        };
        let converted = match (ty, &self) {
            (RuntimeType::String, Self::Null) => Self::Null,
            (RuntimeType::Host(kind), Self::Null) if kind.is_handle() => {
                Self::Null
            }
            (RuntimeType::Host(HostKind::Vector2), Self::Vector3(v)) => {
                Self::Vector2(v.truncate())
            }
            (RuntimeType::Host(HostKind::Vector3), Self::Vector2(v)) => {
                Self::Vector3(v.extend(0.0))
            }
            // Integral values narrow implicitly only when they fit, the
            // way C# treats constant expressions.
            (RuntimeType::Byte, Self::Int(v)) => {
                Self::Byte(u8::try_from(*v).map_err(|_| invalid(&self))?)
            }
            (RuntimeType::Short, Self::Int(v)) => {
                Self::Short(i16::try_from(*v).map_err(|_| invalid(&self))?)
            }
            (RuntimeType::Short, Self::Byte(v)) => Self::Short(*v as i16),
            (RuntimeType::Int, Self::Byte(_) | Self::Short(_) | Self::Char(_))
            | (
                RuntimeType::Long,
                Self::Byte(_) | Self::Short(_) | Self::Char(_) | Self::Int(_),
            )
            | (
                RuntimeType::Float,
                Self::Byte(_)
                | Self::Short(_)
                | Self::Char(_)
                | Self::Int(_)
                | Self::Long(_),
            )
            | (
                RuntimeType::Double,
                Self::Byte(_)
                | Self::Short(_)
                | Self::Char(_)
                | Self::Int(_)
                | Self::Long(_)
                | Self::Float(_),
            ) => return self.cast(ty),
            _ => return Err(invalid(&self)),
        };
        Ok(converted)
    }

    /// Explicit `(type)value` conversion.
    pub fn cast(&self, ty: RuntimeType) -> Result<Value, Fault> {
        let Some(n) = self.numeric() else {
            return self.clone().coerce(ty);
        };
        let as_i64 = match n {
            Numeric::Int(v) => v as i64,
            Numeric::Long(v) => v,
            Numeric::Float(v) => v as i64,
            Numeric::Double(v) => v as i64,
        };
        let converted = match ty {
            RuntimeType::Byte => Self::Byte(as_i64 as u8),
            RuntimeType::Short => Self::Short(as_i64 as i16),
            RuntimeType::Int => Self::Int(as_i64 as i32),
            RuntimeType::Long => Self::Long(as_i64),
            RuntimeType::Float => Self::Float(n.as_f64() as f32),
            RuntimeType::Double => Self::Double(n.as_f64()),
            RuntimeType::Char => Self::Char(
                char::from_u32(as_i64 as u32)
                    .unwrap_or(char::REPLACEMENT_CHARACTER),
            ),
            _ => {
                return Err(Fault::InvalidConversion {
                    from: self.type_name(),
                    to: ty.name(),
                });
            }
        };
        Ok(converted)
    }

    pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, Fault> {
        let invalid = || Fault::InvalidOperand {
            op: op.symbol(),
            operand: operand.type_name(),
        };
        match op {
            UnaryOp::Not => Ok(Self::Bool(!operand.as_bool().map_err(|_| invalid())?)),
            UnaryOp::Plus => operand
                .numeric()
                .map(Numeric::into_value)
                .ok_or_else(invalid),
            UnaryOp::Neg => match operand {
                Self::Vector2(v) => Ok(Self::Vector2(-*v)),
                Self::Vector3(v) => Ok(Self::Vector3(-*v)),
                _ => match operand.numeric().ok_or_else(invalid)? {
                    Numeric::Int(v) => Ok(Self::Int(v.wrapping_neg())),
                    Numeric::Long(v) => Ok(Self::Long(v.wrapping_neg())),
                    Numeric::Float(v) => Ok(Self::Float(-v)),
                    Numeric::Double(v) => Ok(Self::Double(-v)),
                },
            },
            UnaryOp::BitNot => match operand.numeric().ok_or_else(invalid)? {
                Numeric::Int(v) => Ok(Self::Int(!v)),
                Numeric::Long(v) => Ok(Self::Long(!v)),
                _ => Err(invalid()),
            },
        }
    }

    pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, Fault> {
        let invalid = || Fault::InvalidOperands {
            op: op.symbol(),
            lhs: lhs.type_name(),
            rhs: rhs.type_name(),
        };

        match op {
            BinaryOp::Eq => return Ok(Self::Bool(lhs.equals(rhs))),
            BinaryOp::Ne => return Ok(Self::Bool(!lhs.equals(rhs))),
            BinaryOp::Add
                if matches!(lhs, Self::Str(_)) || matches!(rhs, Self::Str(_)) =>
            {
                return Ok(Self::Str(Arc::from(format!("{lhs}{rhs}"))));
            }
            _ => {}
        }

        if let Some(result) = vector_binary(op, lhs, rhs) {
            return result.ok_or_else(invalid);
        }

        if matches!(op, BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor) {
            if let (Self::Bool(a), Self::Bool(b)) = (lhs, rhs) {
                let value = match op {
                    BinaryOp::BitAnd => a & b,
                    BinaryOp::BitOr => a | b,
                    _ => a ^ b,
                };
                return Ok(Self::Bool(value));
            }
        }

        let (Some(a), Some(b)) = (lhs.numeric(), rhs.numeric()) else {
            return Err(invalid());
        };
        let rank = a.rank().max(b.rank());
        let (a, b) = (a.widen(rank), b.widen(rank));

        if let Some(ordering) = op.comparison() {
            let holds = match a.as_f64().partial_cmp(&b.as_f64()) {
                Some(actual) => ordering.contains(&actual),
                None => false,
            };
            return Ok(Self::Bool(holds));
        }

        let value = match (a, b) {
            (Numeric::Int(a), Numeric::Int(b)) => {
                Numeric::Int(int_op(op, a as i64, b as i64)? as i32)
            }
            (Numeric::Long(a), Numeric::Long(b)) => {
                Numeric::Long(int_op(op, a, b)?)
            }
            (Numeric::Float(a), Numeric::Float(b)) => {
                Numeric::Float(float_op(op, a as f64, b as f64).ok_or_else(invalid)? as f32)
            }
            (Numeric::Double(a), Numeric::Double(b)) => {
                Numeric::Double(float_op(op, a, b).ok_or_else(invalid)?)
            }
            _ => return Err(invalid()),
        };
        Ok(value.into_value())
    }

    /// `==` semantics: numbers compare after promotion, everything else
    /// structurally. Mismatched kinds are never equal.
    pub fn equals(&self, other: &Value) -> bool {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => {
                let rank = a.rank().max(b.rank());
                a.widen(rank) == b.widen(rank)
            }
            _ => self == other,
        }
    }
}

fn int_op(op: BinaryOp, a: i64, b: i64) -> Result<i64, Fault> {
    let value = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return Err(Fault::DivideByZero);
            }
            a.wrapping_div(b)
        }
        BinaryOp::Rem => {
            if b == 0 {
                return Err(Fault::DivideByZero);
            }
            a.wrapping_rem(b)
        }
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        _ => unreachable!("comparisons are handled before arithmetic"),
    };
    Ok(value)
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> Option<f64> {
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => return None,
    };
    Some(value)
}

/// `None` when neither operand is a vector; `Some(None)` when the
/// combination is not defined.
fn vector_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Option<Option<Value>> {
    use Value::{Vector2 as V2, Vector3 as V3};

    if !matches!(lhs, V2(_) | V3(_)) && !matches!(rhs, V2(_) | V3(_)) {
        return None;
    }
    let scalar = |v: &Value| v.numeric().map(|n| n.as_f64() as f32);
    let result = match (op, lhs, rhs) {
        (BinaryOp::Add, V2(a), V2(b)) => Some(V2(*a + *b)),
        (BinaryOp::Sub, V2(a), V2(b)) => Some(V2(*a - *b)),
        (BinaryOp::Add, V3(a), V3(b)) => Some(V3(*a + *b)),
        (BinaryOp::Sub, V3(a), V3(b)) => Some(V3(*a - *b)),
        (BinaryOp::Mul, V2(a), s) => scalar(s).map(|s| V2(*a * s)),
        (BinaryOp::Mul, s, V2(a)) => scalar(s).map(|s| V2(*a * s)),
        (BinaryOp::Mul, V3(a), s) => scalar(s).map(|s| V3(*a * s)),
        (BinaryOp::Mul, s, V3(a)) => scalar(s).map(|s| V3(*a * s)),
        (BinaryOp::Div, V2(a), s) => scalar(s).map(|s| V2(*a / s)),
        (BinaryOp::Div, V3(a), s) => scalar(s).map(|s| V3(*a / s)),
        _ => None,
    };
    Some(result)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Char(c) => write!(f, "{c}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Short(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Str(s) => f.write_str(s),
            Self::Vector2(v) => write!(f, "{v}"),
            Self::Vector3(v) => write!(f, "{v}"),
            Self::Object(id) => write!(f, "GameObject{id}"),
            Self::Transform(id) => write!(f, "Transform{id}"),
            Self::Body(id) => write!(f, "Rigidbody2D{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_promotes_like_csharp() {
        assert_eq!(
            Value::binary(BinaryOp::Add, &Value::Byte(200), &Value::Byte(100)),
            Ok(Value::Int(300))
        );
        assert_eq!(
            Value::binary(BinaryOp::Mul, &Value::Int(3), &Value::Float(0.5)),
            Ok(Value::Float(1.5))
        );
        assert_eq!(
            Value::binary(BinaryOp::Div, &Value::Int(7), &Value::Int(2)),
            Ok(Value::Int(3))
        );
        assert_eq!(
            Value::binary(BinaryOp::Sub, &Value::Long(1), &Value::Double(0.5)),
            Ok(Value::Double(0.5))
        );
    }

    #[test]
    fn integer_division_by_zero_faults() {
        assert_eq!(
            Value::binary(BinaryOp::Div, &Value::Int(1), &Value::Int(0)),
            Err(Fault::DivideByZero)
        );
        assert!(matches!(
            Value::binary(BinaryOp::Div, &Value::Float(1.0), &Value::Int(0)),
            Ok(Value::Float(f)) if f.is_infinite()
        ));
    }

    #[test]
    fn string_concatenation_formats_operands() {
        let joined =
            Value::binary(BinaryOp::Add, &Value::str("hp: "), &Value::Int(3));
        assert_eq!(joined, Ok(Value::str("hp: 3")));
        let flag =
            Value::binary(BinaryOp::Add, &Value::Bool(true), &Value::str("!"));
        assert_eq!(flag, Ok(Value::str("True!")));
    }

    #[test]
    fn vectors_scale_and_add() {
        let v = Value::Vector3(Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(
            Value::binary(BinaryOp::Mul, &v, &Value::Int(2)),
            Ok(Value::Vector3(Vec3::new(2.0, 4.0, 0.0)))
        );
        assert_eq!(
            Value::binary(BinaryOp::Mul, &Value::Float(0.5), &v),
            Ok(Value::Vector3(Vec3::new(0.5, 1.0, 0.0)))
        );
        assert!(Value::binary(BinaryOp::Add, &v, &Value::Int(1)).is_err());
    }

    #[test]
    fn comparisons_and_equality() {
        assert_eq!(
            Value::binary(BinaryOp::Lt, &Value::Int(2), &Value::Float(2.5)),
            Ok(Value::Bool(true))
        );
        assert!(Value::Int(2).equals(&Value::Double(2.0)));
        assert!(!Value::Int(2).equals(&Value::str("2")));
        assert!(Value::Null.equals(&Value::Null));
    }

    #[test]
    fn implicit_conversions_follow_widening() {
        assert_eq!(Value::Int(5).coerce(RuntimeType::Float), Ok(Value::Float(5.0)));
        assert_eq!(Value::Int(5).coerce(RuntimeType::Byte), Ok(Value::Byte(5)));
        assert!(Value::Int(500).coerce(RuntimeType::Byte).is_err());
        assert!(Value::Double(0.5).coerce(RuntimeType::Float).is_err());
        assert!(Value::Float(0.5).coerce(RuntimeType::Int).is_err());
        assert_eq!(
            Value::Vector2(Vec2::new(1.0, 2.0))
                .coerce(RuntimeType::Host(HostKind::Vector3)),
            Ok(Value::Vector3(Vec3::new(1.0, 2.0, 0.0)))
        );
    }

    #[test]
    fn explicit_casts_truncate() {
        assert_eq!(Value::Float(3.9).cast(RuntimeType::Int), Ok(Value::Int(3)));
        assert_eq!(Value::Char('A').cast(RuntimeType::Int), Ok(Value::Int(65)));
        assert_eq!(Value::Int(66).cast(RuntimeType::Char), Ok(Value::Char('B')));
    }

    #[test]
    fn display_matches_host_formatting() {
        assert_eq!(Value::Float(1.0).to_string(), "1");
        assert_eq!(Value::Bool(false).to_string(), "False");
        assert_eq!(
            Value::Vector3(Vec3::new(1.0, 0.5, 0.0)).to_string(),
            "(1.00, 0.50, 0.00)"
        );
    }
}
