/// Renders one compilable unit from the pieces of a batch.
use std::fmt;
use std::fmt::Write as _;

use indexmap::IndexMap;

use crate::extract::MethodDescriptor;
use crate::types::ResolvedVariable;
use crate::value::Value;

/// Import appended after the batch's own imports.
pub const CORE_IMPORT: &str = "using System;";
pub const UNIT_CLASS: &str = "DynamicCode";
/// Name of the single parameter every bound method receives.
pub const HOST_PARAM: &str = "currentObject";
/// First statement of every synthesized method body.
pub const TRANSFORM_ALIAS: &str = "var transform = currentObject.transform;";

/// Source text of a synthesized unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationUnit(String);

impl CompilationUnit {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CompilationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn synthesize<'a>(
    imports: &[String],
    variables: impl IntoIterator<Item = &'a ResolvedVariable>,
    methods: &[MethodDescriptor],
) -> CompilationUnit {
    let mut out = String::new();
    for import in imports {
        out.push_str(import);
        out.push('\n');
    }
    out.push_str(CORE_IMPORT);
    out.push_str("\n\n");

    let _ = writeln!(out, "public class {UNIT_CLASS} {{");

    let mut fields = 0;
    for var in variables {
        fields += 1;
        match literal(&var.value) {
            Some(init) => {
                let _ = writeln!(out, "    public {} {} = {init};", var.ty, var.name);
            }
            None => {
                let _ = writeln!(out, "    public {} {};", var.ty, var.name);
            }
        }
    }

    // Later definitions replace earlier ones but keep the first slot.
    let mut unique: IndexMap<&str, &str> = IndexMap::new();
    for method in methods {
        unique.insert(&method.name, &method.body);
    }
    for (name, body) in &unique {
        out.push('\n');
        let _ = writeln!(
            out,
            "    public void {name}(GameObject {HOST_PARAM}) {{\n        {TRANSFORM_ALIAS}\n{body}\n    }}"
        );
    }
    out.push_str("}\n");

    log::debug!(
        "synthesized unit with {} field(s) and {} method(s)",
        fields,
        unique.len()
    );
    CompilationUnit(out)
}

/// Source literal for a field initializer. Handles have none; the loader
/// seeds them after instantiation.
fn literal(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Char(c) => format!("'{}'", escape(&c.to_string(), '\'')),
        Value::Byte(v) => v.to_string(),
        Value::Short(v) => v.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Long(v) => format!("{v}L"),
        Value::Float(v) => float(*v),
        Value::Double(v) if v.is_finite() => format!("{v:?}"),
        Value::Double(_) => "0.0".to_string(),
        Value::Str(s) => format!("\"{}\"", escape(s, '"')),
        Value::Vector2(v) => format!("new Vector2({}, {})", float(v.x), float(v.y)),
        Value::Vector3(v) => format!(
            "new Vector3({}, {}, {})",
            float(v.x),
            float(v.y),
            float(v.z)
        ),
        Value::Object(_) | Value::Transform(_) | Value::Body(_) => return None,
    };
    Some(text)
}

fn float(v: f32) -> String {
    if v.is_finite() {
        format!("{v:?}f")
    } else {
        "0f".to_string()
    }
}

fn escape(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ObjectId;
    use crate::types::{HostKind, RuntimeType};
    use crate::value::Vec3;
    use pretty_assertions::assert_eq;

    fn var(name: &str, ty: RuntimeType, value: Value) -> ResolvedVariable {
        ResolvedVariable {
            name: name.into(),
            ty,
            value,
        }
    }

    fn method(name: &str, body: &str) -> MethodDescriptor {
        MethodDescriptor {
            name: name.into(),
            body: body.into(),
        }
    }

    #[test]
    fn renders_unit_layout() {
        let unit = synthesize(
            &["using UnityEngine;".to_string()],
            &[var("speed", RuntimeType::Float, Value::Float(2.0))],
            &[method("onTick", "    transform.Translate(speed, 0, 0);")],
        );
        let expected = "\
using UnityEngine;
using System;

public class DynamicCode {
    public float speed = 2.0f;

    public void onTick(GameObject currentObject) {
        var transform = currentObject.transform;
    transform.Translate(speed, 0, 0);
    }
}
";
        assert_eq!(unit.as_str(), expected);
    }

    #[test]
    fn literals_per_type() {
        let vars = [
            var("a", RuntimeType::String, Value::str("say \"hi\"\n")),
            var("b", RuntimeType::Char, Value::Char('\'')),
            var("c", RuntimeType::Double, Value::Double(3.0)),
            var("d", RuntimeType::Long, Value::Long(7)),
            var("e", RuntimeType::Bool, Value::Bool(true)),
            var(
                "f",
                RuntimeType::Host(HostKind::Vector3),
                Value::Vector3(Vec3::new(1.0, 0.5, 0.0)),
            ),
            var(
                "g",
                RuntimeType::Host(HostKind::Rigidbody2D),
                Value::Body(ObjectId(3)),
            ),
        ];
        let unit = synthesize(&[], &vars, &[]);
        let text = unit.as_str();
        assert!(text.contains(r#"public string a = "say \"hi\"\n";"#));
        assert!(text.contains(r"public char b = '\'';"));
        assert!(text.contains("public double c = 3.0;"));
        assert!(text.contains("public long d = 7L;"));
        assert!(text.contains("public bool e = true;"));
        assert!(text.contains("public Vector3 f = new Vector3(1.0f, 0.5f, 0.0f);"));
        assert!(text.contains("public Rigidbody2D g;"));
    }

    #[test]
    fn min_values_render_as_compilable_literals() {
        let vars = [
            var("lo", RuntimeType::Int, Value::Int(i32::MIN)),
            var("wide", RuntimeType::Long, Value::Long(i64::MIN)),
        ];
        let unit = synthesize(&[], &vars, &[]);
        assert!(unit.as_str().contains("public int lo = -2147483648;"));
        assert!(unit.as_str().contains("public long wide = -9223372036854775808L;"));
        crate::compiler::compile(unit.as_str()).expect("unit compiles");
    }

    #[test]
    fn duplicate_methods_keep_the_last_body() {
        let unit = synthesize(
            &[],
            &[],
            &[method("onTick", "a();"), method("Other", ""), method("onTick", "b();")],
        );
        let text = unit.as_str();
        assert_eq!(text.matches("void onTick").count(), 1);
        assert!(text.contains("b();"));
        assert!(!text.contains("a();"));
        assert!(text.find("onTick") < text.find("Other"));
    }

    #[test]
    fn imports_are_not_deduplicated() {
        let imports = vec!["using System;".to_string(); 2];
        let unit = synthesize(&imports, &[], &[]);
        assert_eq!(unit.as_str().matches("using System;").count(), 3);
    }
}
