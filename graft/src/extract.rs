/// Heuristic extraction of structure from generated source text.
///
/// Generated snippets only approximate valid source, so nothing here
/// parses. Three regex scans pull out imports, field-looking declarations
/// and `void` methods; whatever does not match is ignored. The extractor
/// never fails: garbage in yields an empty [`Extraction`].
///
/// # Brace handling
///
/// [`BraceMode::Naive`] keeps the historical pattern, which stops a method
/// body at the first `}`. A body containing an `if { .. }` block is
/// therefore truncated, and locals declared after that block surface as
/// fields. [`BraceMode::Balanced`] locates the method header with a regex
/// and then scans forward counting braces, skipping string literals,
/// character literals and comments.
use std::sync::LazyLock;

use regex::Regex;

use crate::synth::TRANSFORM_ALIAS;

static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"using\s+([\w.]+)\s*;").expect("import regex is valid")
});

static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:(?:public|private|protected|internal)\s+)?\b(\w+)\s+(\w+)\s*(?:=\s*([^;]+))?;",
    )
    .expect("variable regex is valid")
});

static METHOD_NAIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bvoid\s+(\w+)\s*\(([^)]*)\)\s*\{([^}]*)\}")
        .expect("method regex is valid")
});

static METHOD_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bvoid\s+(\w+)\s*\(([^)]*)\)\s*\{")
        .expect("method header regex is valid")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BraceMode {
    /// Body ends at the first closing brace.
    Naive,
    /// Body ends at the matching closing brace.
    #[default]
    Balanced,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    pub braces: BraceMode,
}

/// A field-looking declaration found outside every method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDescriptor {
    pub name: String,
    pub declared_type: String,
    pub raw_initializer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Matched import statements, keyword included, in source order.
    pub imports: Vec<String>,
    pub variables: Vec<VariableDescriptor>,
    pub methods: Vec<MethodDescriptor>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
            && self.variables.is_empty()
            && self.methods.is_empty()
    }
}

pub fn extract(text: &str) -> Extraction {
    extract_with(text, &ExtractOptions::default())
}

pub fn extract_with(text: &str, options: &ExtractOptions) -> Extraction {
    let imports: Vec<String> = IMPORT
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();

    // Imports would otherwise read as `using System;` declarations.
    let code = IMPORT.replace_all(text, "");

    let methods = match options.braces {
        BraceMode::Naive => scan_methods_naive(&code),
        BraceMode::Balanced => scan_methods_balanced(&code),
    };

    let variables = VARIABLE
        .captures_iter(&code)
        .filter(|caps| {
            let start = caps.get(0).map_or(0, |m| m.start());
            !methods.iter().any(|m| start > m.start && start < m.end)
        })
        .map(|caps| VariableDescriptor {
            declared_type: caps[1].to_string(),
            name: caps[2].to_string(),
            raw_initializer: caps.get(3).map(|m| m.as_str().trim().to_string()),
        })
        .collect::<Vec<_>>();

    let extraction = Extraction {
        imports,
        variables,
        methods: methods.into_iter().map(|m| m.descriptor).collect(),
    };

    if extraction.is_empty() {
        log::warn!("no imports, variables or methods found in generated code");
    } else {
        log::debug!(
            "extracted {} import(s), {} variable(s), {} method(s)",
            extraction.imports.len(),
            extraction.variables.len(),
            extraction.methods.len()
        );
    }
    extraction
}

struct MethodMatch {
    start: usize,
    end: usize,
    descriptor: MethodDescriptor,
}

fn method(name: &str, body: &str, start: usize, end: usize) -> MethodMatch {
    MethodMatch {
        start,
        end,
        descriptor: MethodDescriptor {
            name: name.to_string(),
            body: strip_alias(body).to_string(),
        },
    }
}

/// Bodies of synthesized units start with the injected transform alias;
/// dropping it keeps extraction stable over its own output.
fn strip_alias(body: &str) -> &str {
    match body.trim_start().strip_prefix(TRANSFORM_ALIAS) {
        Some(rest) => rest,
        None => body,
    }
}

fn scan_methods_naive(code: &str) -> Vec<MethodMatch> {
    METHOD_NAIVE
        .captures_iter(code)
        .map(|caps| {
            let whole = caps.get(0).expect("group 0 always participates");
            method(&caps[1], &caps[3], whole.start(), whole.end())
        })
        .collect()
}

fn scan_methods_balanced(code: &str) -> Vec<MethodMatch> {
    let mut methods = Vec::new();
    let mut from = 0;
    while let Some(caps) = METHOD_HEADER.captures_at(code, from) {
        let header = caps.get(0).expect("group 0 always participates");
        match matching_brace(code, header.end()) {
            Some(close) => {
                let body = &code[header.end()..close];
                methods.push(method(&caps[1], body, header.start(), close + 1));
                from = close + 1;
            }
            None => {
                log::debug!("method {} has no closing brace, skipped", &caps[1]);
                from = header.end();
            }
        }
    }
    methods
}

/// Offset of the `}` closing a block whose body starts at `from`.
fn matching_brace(code: &str, from: usize) -> Option<usize> {
    let bytes = code.as_bytes();
    let mut depth = 1usize;
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len()
                    && !(bytes[i] == b'*' && bytes[i + 1] == b'/')
                {
                    i += 1;
                }
                i += 2;
                continue;
            }
            b'@' if bytes.get(i + 1) == Some(&b'"') => {
                i += 2;
                while i < bytes.len() {
                    if bytes[i] == b'"' {
                        if bytes.get(i + 1) == Some(&b'"') {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
            }
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote && bytes[i] != b'\n'
                {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PLAYER: &str = r#"
using UnityEngine;
using System.Collections;

public class Player : MonoBehaviour
{
    public float speed = 5f;
    private int lives;
    public string title = "Hero";

    void Start()
    {
        lives = 3;
    }

    void Update()
    {
        float step = speed * Time.deltaTime;
        transform.Translate(step, 0, 0);
    }
}
"#;

    fn var(ty: &str, name: &str, raw: Option<&str>) -> VariableDescriptor {
        VariableDescriptor {
            name: name.into(),
            declared_type: ty.into(),
            raw_initializer: raw.map(Into::into),
        }
    }

    fn naive() -> ExtractOptions {
        ExtractOptions {
            braces: BraceMode::Naive,
        }
    }

    #[test]
    fn imports_keep_keyword_and_order() {
        let out = extract("using B.C;\nusing A;\nusing A;\n");
        assert_eq!(out.imports, ["using B.C;", "using A;", "using A;"]);
        assert!(out.variables.is_empty());
    }

    #[test]
    fn fields_are_extracted_and_locals_skipped() {
        let out = extract(PLAYER);
        assert_eq!(
            out.variables,
            vec![
                var("float", "speed", Some("5f")),
                var("int", "lives", None),
                var("string", "title", Some("\"Hero\"")),
            ]
        );
        let names: Vec<_> = out.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["Start", "Update"]);
        assert!(out.methods[1].body.contains("transform.Translate(step, 0, 0);"));
    }

    #[test]
    fn both_modes_agree_on_flat_bodies() {
        assert_eq!(extract(PLAYER), extract_with(PLAYER, &naive()));
    }

    const NESTED: &str = r#"
void Update()
{
    if (Input.GetKey(KeyCode.Space))
    {
        jump();
    }
    float drift = 0.5f;
}
"#;

    #[test]
    fn naive_mode_truncates_at_first_closing_brace() {
        let out = extract_with(NESTED, &naive());
        assert_eq!(out.methods.len(), 1);
        let body = &out.methods[0].body;
        assert!(body.contains("jump();"));
        assert!(!body.contains("drift"));
        // The local after the truncation point now reads as a field.
        assert_eq!(out.variables, vec![var("float", "drift", Some("0.5f"))]);
    }

    #[test]
    fn balanced_mode_keeps_nested_blocks() {
        let out = extract(NESTED);
        assert_eq!(out.methods.len(), 1);
        let body = out.methods[0].body.trim();
        assert!(body.starts_with("if (Input.GetKey(KeyCode.Space))"));
        assert!(body.ends_with("float drift = 0.5f;"));
        assert!(out.variables.is_empty());
    }

    #[test]
    fn balanced_mode_ignores_braces_in_literals_and_comments() {
        let text = r#"
void Update() {
    Debug.Log("}");   // closing } in a comment
    char c = '}';
    /* { */
    Debug.Log(@"say ""}""");
}
int after = 1;
"#;
        let out = extract(text);
        assert_eq!(out.methods.len(), 1);
        assert!(out.methods[0].body.contains("say"));
        assert_eq!(out.variables, vec![var("int", "after", Some("1"))]);
    }

    #[test]
    fn unterminated_body_is_skipped() {
        let out = extract("void Update() { transform.Translate(1, 0, 0);");
        assert!(out.methods.is_empty());
    }

    #[test]
    fn garbage_yields_nothing() {
        let out = extract("Sure! Here is some code that does what you asked.");
        assert!(out.is_empty());
        assert!(extract("").is_empty());
    }

    #[test]
    fn parameters_are_ignored() {
        let out = extract("void Move(float dx, float dy) { x += dx; }");
        assert_eq!(out.methods[0].name, "Move");
        assert_eq!(out.methods[0].body.trim(), "x += dx;");
    }

    #[test]
    fn injected_alias_is_stripped() {
        let text = format!(
            "public void onTick(GameObject currentObject) {{\n    {TRANSFORM_ALIAS}\n    x++;\n}}"
        );
        let out = extract(&text);
        assert_eq!(out.methods[0].body.trim(), "x++;");
    }
}
