/// Runtime types and the resolver that turns extracted declarations into
/// typed values.
///
/// Only a closed set of primitives plus an allow-list of host types may be
/// declared as unit fields. Anything else is dropped from the batch, and
/// any initializer that fails to parse degrades to the type's zero value.
use std::fmt;
use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use regex::Regex;

use crate::error::ResolveIssue;
use crate::extract::VariableDescriptor;
use crate::host::World;
use crate::value::{Value, Vec2, Vec3};

/// Host API types that compiled code can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostKind {
    Vector2,
    Vector3,
    GameObject,
    Transform,
    Rigidbody2D,
}

impl HostKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "Vector2" => Self::Vector2,
            "Vector3" => Self::Vector3,
            "GameObject" => Self::GameObject,
            "Transform" => Self::Transform,
            "Rigidbody2D" => Self::Rigidbody2D,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Vector2 => "Vector2",
            Self::Vector3 => "Vector3",
            Self::GameObject => "GameObject",
            Self::Transform => "Transform",
            Self::Rigidbody2D => "Rigidbody2D",
        }
    }

    /// Handles refer to live world objects; everything else is a value.
    pub fn is_handle(self) -> bool {
        matches!(self, Self::GameObject | Self::Transform | Self::Rigidbody2D)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeType {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Bool,
    Char,
    String,
    Host(HostKind),
}

impl RuntimeType {
    pub fn from_primitive(token: &str) -> Option<Self> {
        let ty = match token {
            "byte" => Self::Byte,
            "short" => Self::Short,
            "int" => Self::Int,
            "long" => Self::Long,
            "float" => Self::Float,
            "double" => Self::Double,
            "bool" => Self::Bool,
            "char" => Self::Char,
            "string" => Self::String,
            _ => return None,
        };
        Some(ty)
    }

    /// Primitive keyword or host type name, as written in source.
    pub fn from_name(token: &str) -> Option<Self> {
        Self::from_primitive(token)
            .or_else(|| HostKind::from_name(token).map(Self::Host))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::Char => "char",
            Self::String => "string",
            Self::Host(kind) => kind.name(),
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Byte
                | Self::Short
                | Self::Int
                | Self::Long
                | Self::Float
                | Self::Double
        )
    }

    pub fn zero_value(self) -> Value {
        match self {
            Self::Byte => Value::Byte(0),
            Self::Short => Value::Short(0),
            Self::Int => Value::Int(0),
            Self::Long => Value::Long(0),
            Self::Float => Value::Float(0.0),
            Self::Double => Value::Double(0.0),
            Self::Bool => Value::Bool(false),
            Self::Char => Value::Char('\0'),
            Self::String => Value::str(""),
            Self::Host(HostKind::Vector2) => Value::Vector2(Vec2::ZERO),
            Self::Host(HostKind::Vector3) => Value::Vector3(Vec3::ZERO),
            Self::Host(_) => Value::Null,
        }
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds the default value of a host type, possibly spawning objects.
pub type HostFactory = Arc<dyn Fn(&mut World) -> Value + Send + Sync>;

#[derive(Clone)]
pub struct HostTypeEntry {
    pub kind: HostKind,
    pub factory: HostFactory,
}

impl fmt::Debug for HostTypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostTypeEntry")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Allow-list of non-primitive type names a batch may declare as fields.
#[derive(Debug, Clone)]
pub struct HostTypeRegistry {
    entries: IndexMap<String, HostTypeEntry>,
}

impl HostTypeRegistry {
    pub fn empty() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        kind: HostKind,
        factory: impl Fn(&mut World) -> Value + Send + Sync + 'static,
    ) {
        self.entries.insert(
            name.into(),
            HostTypeEntry {
                kind,
                factory: Arc::new(factory),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&HostTypeEntry> {
        self.entries.get(name)
    }

    /// The entry registered under the kind's own name, else the first
    /// entry producing that kind.
    pub fn entry_for(&self, kind: HostKind) -> Option<&HostTypeEntry> {
        self.get(kind.name()).or_else(|| {
            self.entries.values().find(|entry| entry.kind == kind)
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Default for HostTypeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("Rigidbody2D", HostKind::Rigidbody2D, |world| {
            let id = world.spawn("Rigidbody2D Holder");
            world.add_body(id);
            Value::Body(id)
        });
        registry.register("GameObject", HostKind::GameObject, |world| {
            Value::Object(world.spawn("GameObject"))
        });
        registry.register("Vector2", HostKind::Vector2, |_| {
            Value::Vector2(Vec2::ZERO)
        });
        registry.register("Vector3", HostKind::Vector3, |_| {
            Value::Vector3(Vec3::ZERO)
        });
        registry
    }
}

/// A variable after its type token and initializer have been resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVariable {
    pub name: String,
    pub ty: RuntimeType,
    pub value: Value,
}

/// Resolved variables of one batch, in first-declaration order.
#[derive(Debug, Default)]
pub struct Resolution {
    pub variables: IndexMap<String, ResolvedVariable>,
    pub issues: Vec<ResolveIssue>,
}

#[derive(Debug, Clone, Default)]
pub struct TypeResolver {
    pub host_types: HostTypeRegistry,
}

impl TypeResolver {
    pub fn new(host_types: HostTypeRegistry) -> Self {
        Self { host_types }
    }

    /// `None` means the token is neither a primitive nor allow-listed.
    pub fn resolve_type(&self, token: &str) -> Option<RuntimeType> {
        RuntimeType::from_primitive(token).or_else(|| {
            self.host_types.get(token).map(|entry| RuntimeType::Host(entry.kind))
        })
    }

    /// Coerce an initializer into a value of `ty`, falling back to the
    /// zero value when it does not parse.
    pub fn resolve_value(
        &self,
        ty: RuntimeType,
        raw: Option<&str>,
        world: &mut World,
    ) -> Value {
        let entry = match ty {
            RuntimeType::Host(kind) => self.host_types.entry_for(kind),
            _ => None,
        };
        match self.try_resolve_value(ty, entry, raw, world) {
            Ok(value) => value,
            Err((value, reason)) => {
                log::error!(
                    "failed to parse value '{}' for type '{ty}': {reason}",
                    raw.unwrap_or_default()
                );
                value
            }
        }
    }

    fn try_resolve_value(
        &self,
        ty: RuntimeType,
        entry: Option<&HostTypeEntry>,
        raw: Option<&str>,
        world: &mut World,
    ) -> Result<Value, (Value, String)> {
        let raw = raw.map(str::trim).filter(|raw| !raw.is_empty());
        match ty {
            RuntimeType::Host(kind) => {
                let default = entry
                    .map(|entry| (entry.factory)(world))
                    .unwrap_or_else(|| ty.zero_value());
                match (kind, raw) {
                    (_, None) => Ok(default),
                    (HostKind::Vector2 | HostKind::Vector3, Some(raw)) => {
                        parse_vector(kind, raw).ok_or_else(|| {
                            (default, "not a vector constructor".to_string())
                        })
                    }
                    (_, Some(raw)) => {
                        log::debug!(
                            "ignoring initializer '{raw}' for host type {kind:?}"
                        );
                        Ok(default)
                    }
                }
            }
            _ => match raw {
                None => Ok(ty.zero_value()),
                Some(raw) => {
                    parse_primitive(ty, raw).map_err(|e| (ty.zero_value(), e))
                }
            },
        }
    }

    /// Resolve every descriptor of a batch. Later declarations of the same
    /// name replace earlier ones.
    pub fn resolve(
        &self,
        descriptors: &[VariableDescriptor],
        world: &mut World,
    ) -> Resolution {
        let mut resolution = Resolution::default();
        for desc in descriptors {
            let Some(ty) = self.resolve_type(&desc.declared_type) else {
                log::warn!(
                    "dropping variable {} of unknown type {}",
                    desc.name,
                    desc.declared_type
                );
                resolution.issues.push(ResolveIssue::TypeUnresolved {
                    name: desc.name.clone(),
                    ty: desc.declared_type.clone(),
                });
                continue;
            };

            let raw = desc.raw_initializer.as_deref();
            let entry = self.host_types.get(&desc.declared_type);
            let value = match self.try_resolve_value(ty, entry, raw, world) {
                Ok(value) => value,
                Err((value, reason)) => {
                    let raw = raw.unwrap_or_default().trim().to_string();
                    log::error!(
                        "failed to parse value '{raw}' for type '{ty}': {reason}"
                    );
                    resolution.issues.push(ResolveIssue::ValueParseFailed {
                        name: desc.name.clone(),
                        ty: ty.name(),
                        raw,
                        reason,
                    });
                    value
                }
            };

            log::debug!("resolved variable {}: {ty} = {value:?}", desc.name);
            resolution.variables.insert(
                desc.name.clone(),
                ResolvedVariable {
                    name: desc.name.clone(),
                    ty,
                    value,
                },
            );
        }
        resolution
    }
}

/// Parse a primitive initializer the way the generated snippets write
/// literals: numeric suffixes are tolerated, strings and chars may keep
/// their quotes.
pub fn parse_primitive(ty: RuntimeType, raw: &str) -> Result<Value, String> {
    let raw = raw.trim();
    let value = match ty {
        RuntimeType::Byte => Value::Byte(raw.parse().map_err(err)?),
        RuntimeType::Short => Value::Short(raw.parse().map_err(err)?),
        RuntimeType::Int => Value::Int(raw.parse().map_err(err)?),
        RuntimeType::Long => {
            let digits = raw.trim_end_matches(['l', 'L']);
            Value::Long(digits.parse().map_err(err)?)
        }
        RuntimeType::Float => {
            let digits = raw.trim_end_matches(['f', 'F']);
            let value: f32 = digits.parse().map_err(err)?;
            if !value.is_finite() {
                return Err("value is not finite".into());
            }
            Value::Float(value)
        }
        RuntimeType::Double => {
            let digits = raw.trim_end_matches(['d', 'D']);
            let value: f64 = digits.parse().map_err(err)?;
            if !value.is_finite() {
                return Err("value is not finite".into());
            }
            Value::Double(value)
        }
        RuntimeType::Bool => match raw.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err("expected `true` or `false`".into()),
        },
        RuntimeType::Char => Value::Char(parse_char(raw)?),
        RuntimeType::String => Value::str(&parse_string(raw)?),
        RuntimeType::Host(_) => {
            return Err(format!("`{}` is not a primitive type", ty.name()));
        }
    };
    Ok(value)
}

fn err(e: impl fmt::Display) -> String {
    e.to_string()
}

fn parse_char(raw: &str) -> Result<char, String> {
    let inner = match raw.strip_prefix('\'') {
        Some(rest) => rest
            .strip_suffix('\'')
            .ok_or_else(|| "unterminated character literal".to_string())?,
        None => raw,
    };
    let unescaped = unescape(inner)?;
    let mut chars = unescaped.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err("string must be exactly one character long".into()),
    }
}

fn parse_string(raw: &str) -> Result<String, String> {
    if let Some(verbatim) = raw.strip_prefix("@\"") {
        let inner = verbatim
            .strip_suffix('"')
            .ok_or_else(|| "unterminated string literal".to_string())?;
        return Ok(inner.replace("\"\"", "\""));
    }
    match raw.strip_prefix('"') {
        Some(rest) => {
            let inner = rest
                .strip_suffix('"')
                .ok_or_else(|| "unterminated string literal".to_string())?;
            unescape(inner)
        }
        None => Ok(raw.to_string()),
    }
}

/// Resolve C# simple escape sequences.
pub fn unescape(text: &str) -> Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = match chars.next() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('0') => '\0',
            Some('\\') => '\\',
            Some('\'') => '\'',
            Some('"') => '"',
            Some(other) => {
                return Err(format!("unrecognized escape sequence `\\{other}`"));
            }
            None => return Err("dangling escape".into()),
        };
        out.push(escaped);
    }
    Ok(out)
}

static VECTOR_CTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^new\s+(Vector2|Vector3)\s*\(([^)]*)\)$")
        .expect("vector constructor regex is valid")
});

fn parse_vector(kind: HostKind, raw: &str) -> Option<Value> {
    let caps = VECTOR_CTOR.captures(raw)?;
    let components = caps[2]
        .split(',')
        .map(|part| {
            part.trim().trim_end_matches(['f', 'F']).parse::<f32>().ok()
        })
        .collect::<Option<Vec<f32>>>()?;
    let value = match (kind, components.as_slice()) {
        (HostKind::Vector2, [x, y]) => Value::Vector2(Vec2::new(*x, *y)),
        (HostKind::Vector3, [x, y]) => Value::Vector3(Vec3::new(*x, *y, 0.0)),
        (HostKind::Vector3, [x, y, z]) => Value::Vector3(Vec3::new(*x, *y, *z)),
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostCreateInfo;

    fn descriptor(ty: &str, name: &str, raw: Option<&str>) -> VariableDescriptor {
        VariableDescriptor {
            name: name.into(),
            declared_type: ty.into(),
            raw_initializer: raw.map(Into::into),
        }
    }

    #[test]
    fn resolves_primitive_tokens() {
        let resolver = TypeResolver::default();
        assert_eq!(resolver.resolve_type("int"), Some(RuntimeType::Int));
        assert_eq!(resolver.resolve_type("byte"), Some(RuntimeType::Byte));
        assert_eq!(resolver.resolve_type("string"), Some(RuntimeType::String));
        assert_eq!(
            resolver.resolve_type("Rigidbody2D"),
            Some(RuntimeType::Host(HostKind::Rigidbody2D))
        );
    }

    #[test]
    fn unknown_and_unlisted_types_are_not_found() {
        let resolver = TypeResolver::default();
        assert_eq!(resolver.resolve_type("Dictionary"), None);
        assert_eq!(resolver.resolve_type("return"), None);
        // Known to the compiler, but not allow-listed as a field type.
        assert_eq!(resolver.resolve_type("Transform"), None);
    }

    #[test]
    fn malformed_literals_fall_back_to_zero() {
        let resolver = TypeResolver::default();
        let mut world = World::new(&HostCreateInfo::default());
        let cases = [
            (RuntimeType::Int, "abc", Value::Int(0)),
            (RuntimeType::Int, "5.5f", Value::Int(0)),
            (RuntimeType::Float, "fast", Value::Float(0.0)),
            (RuntimeType::Bool, "yes", Value::Bool(false)),
            (RuntimeType::Byte, "300", Value::Byte(0)),
            (RuntimeType::Char, "'ab'", Value::Char('\0')),
            (RuntimeType::Double, "1e999", Value::Double(0.0)),
        ];
        for (ty, raw, expected) in cases {
            assert_eq!(resolver.resolve_value(ty, Some(raw), &mut world), expected);
        }
    }

    #[test]
    fn parses_suffixed_and_quoted_literals() {
        assert_eq!(
            parse_primitive(RuntimeType::Float, "5.5f"),
            Ok(Value::Float(5.5))
        );
        assert_eq!(
            parse_primitive(RuntimeType::Double, "2.25D"),
            Ok(Value::Double(2.25))
        );
        assert_eq!(parse_primitive(RuntimeType::Long, "40L"), Ok(Value::Long(40)));
        assert_eq!(
            parse_primitive(RuntimeType::Bool, "True"),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            parse_primitive(RuntimeType::Char, r"'\n'"),
            Ok(Value::Char('\n'))
        );
        assert_eq!(
            parse_primitive(RuntimeType::String, r#""say \"hi\"""#),
            Ok(Value::str("say \"hi\""))
        );
        assert_eq!(
            parse_primitive(RuntimeType::String, "bare words"),
            Ok(Value::str("bare words"))
        );
    }

    #[test]
    fn absent_initializer_yields_default() {
        let resolver = TypeResolver::default();
        let mut world = World::new(&HostCreateInfo::default());
        assert_eq!(
            resolver.resolve_value(RuntimeType::Int, None, &mut world),
            Value::Int(0)
        );
        assert_eq!(
            resolver.resolve_value(RuntimeType::String, Some("  "), &mut world),
            Value::str("")
        );
    }

    #[test]
    fn rigidbody_default_is_a_live_body() {
        let resolver = TypeResolver::default();
        let mut world = World::new(&HostCreateInfo::default());
        let ty = RuntimeType::Host(HostKind::Rigidbody2D);
        let value = resolver.resolve_value(ty, None, &mut world);
        let Value::Body(id) = value else {
            panic!("expected a body handle, got {value:?}");
        };
        assert!(world.body(id).is_ok());
    }

    #[test]
    fn vector_initializers_parse() {
        let resolver = TypeResolver::default();
        let mut world = World::new(&HostCreateInfo::default());
        let ty = RuntimeType::Host(HostKind::Vector3);
        assert_eq!(
            resolver.resolve_value(ty, Some("new Vector3(1f, 2, 3.5f)"), &mut world),
            Value::Vector3(Vec3::new(1.0, 2.0, 3.5))
        );
        assert_eq!(
            resolver.resolve_value(ty, Some("Vector3.up * 2"), &mut world),
            Value::Vector3(Vec3::ZERO)
        );
    }

    #[test]
    fn resolve_reports_issues_and_keeps_last_declaration() {
        let resolver = TypeResolver::default();
        let mut world = World::new(&HostCreateInfo::default());
        let descriptors = [
            descriptor("int", "speed", Some("3")),
            descriptor("Dictionary", "lookup", None),
            descriptor("int", "lives", Some("many")),
            descriptor("float", "speed", Some("7.5f")),
        ];
        let resolution = resolver.resolve(&descriptors, &mut world);

        let names: Vec<_> = resolution.variables.keys().cloned().collect();
        assert_eq!(names, ["speed", "lives"]);
        assert_eq!(resolution.variables["speed"].value, Value::Float(7.5));
        assert_eq!(resolution.variables["lives"].value, Value::Int(0));
        assert_eq!(resolution.issues.len(), 2);
        assert!(matches!(
            resolution.issues[0],
            ResolveIssue::TypeUnresolved { .. }
        ));
        assert!(matches!(
            resolution.issues[1],
            ResolveIssue::ValueParseFailed { .. }
        ));
    }

    #[test]
    fn registry_accepts_custom_entries() {
        let mut host_types = HostTypeRegistry::default();
        host_types.register("Velocity", HostKind::Vector2, |_| {
            Value::Vector2(Vec2::new(0.0, 1.0))
        });
        let resolver = TypeResolver::new(host_types);
        let mut world = World::new(&HostCreateInfo::default());
        let ty = resolver.resolve_type("Velocity").expect("registered");
        assert_eq!(ty, RuntimeType::Host(HostKind::Vector2));

        let resolution = resolver
            .resolve(&[descriptor("Velocity", "drift", None)], &mut world);
        assert_eq!(
            resolution.variables["drift"].value,
            Value::Vector2(Vec2::new(0.0, 1.0))
        );
    }
}
