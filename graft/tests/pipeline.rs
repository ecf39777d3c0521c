use graft::{
    BraceMode, Diagnostic, ExecutionLimits, ExtractOptions, Fault, ResolveIssue, Runtime,
    RuntimeCreateInfo, TypeResolver, Value, World, extract, extract_with, synthesize,
};
use pretty_assertions::assert_eq;

fn runtime() -> Runtime {
    Runtime::new(RuntimeCreateInfo::default())
}

fn script_logs(runtime: &mut Runtime) -> Vec<String> {
    runtime
        .world_mut()
        .take_logs()
        .into_iter()
        .map(|entry| entry.message)
        .collect()
}

// ── One batch, end to end ───────────────────────────────────────────

#[test]
fn minimal_batch_binds_one_handle() {
    let mut rt = runtime();
    let report = rt.apply_source(
        "Here you go:\n```csharp\nusing UnityEngine;\npublic int score = 5;\nvoid Jump() { score += 1; }\n```",
    );
    assert!(report.compiled(), "{:#?}", report.diagnostics);
    assert_eq!(report.bound, vec!["Jump".to_string()]);
    assert_eq!(rt.registry().len(), 1);

    assert_eq!(rt.invoke("Jump"), Ok(true));
    let score = rt.instance().and_then(|i| i.field("score"));
    assert_eq!(score, Some(Value::Int(6)));
}

#[test]
fn host_object_is_fresh_per_batch() {
    let mut rt = Runtime::new(RuntimeCreateInfo {
        host: graft::HostCreateInfo {
            sprite: Some("ship".into()),
            ..Default::default()
        },
        ..Default::default()
    });
    rt.apply_source("void onTick() { transform.position = new Vector3(1, 2, 3); }");
    rt.frame().expect("frame");
    let first = rt.host().expect("host");

    rt.apply_source("void onTick() { }");
    let second = rt.host().expect("host");
    assert_ne!(first, second);
    let object = rt.world().get(second).expect("host object");
    assert_eq!(object.name, "TargetGameObject");
    assert_eq!(object.sprite.as_deref(), Some("ship"));
    assert_eq!(object.transform.position, graft::Vec3::ZERO);
}

// ── Resolution ──────────────────────────────────────────────────────

#[test]
fn unparsable_initializer_falls_back_to_zero() {
    let mut rt = runtime();
    let report = rt.apply_source("public int lives = abc;\nvoid onTick() { }");
    assert!(report.compiled());
    assert!(matches!(
        report.issues.as_slice(),
        [ResolveIssue::ValueParseFailed { name, .. }] if name == "lives"
    ));
    assert_eq!(rt.instance().and_then(|i| i.field("lives")), Some(Value::Int(0)));
}

#[test]
fn min_value_fields_initialize() {
    let mut rt = runtime();
    let report = rt.apply_source(
        "public int lo = -2147483648;\npublic long wide = -9223372036854775808;\nvoid onTick() { lo++; }",
    );
    assert!(report.compiled(), "{:#?}", report.diagnostics);
    assert!(report.init_fault.is_none(), "{:?}", report.init_fault);
    assert_eq!(report.bound, vec!["onTick".to_string()]);
    let field = |rt: &Runtime, name: &str| rt.instance().and_then(|i| i.field(name));
    assert_eq!(field(&rt, "lo"), Some(Value::Int(i32::MIN)));
    assert_eq!(field(&rt, "wide"), Some(Value::Long(i64::MIN)));

    rt.frame().expect("frame");
    assert_eq!(field(&rt, "lo"), Some(Value::Int(i32::MIN + 1)));
}

#[test]
fn unknown_types_are_left_out_of_the_unit() {
    let mut rt = runtime();
    let report = rt.apply_source(
        "public Transform2D pivot;\npublic int n = 1;\nvoid onTick() { n++; }",
    );
    assert!(report.compiled(), "{:#?}", report.diagnostics);
    assert!(
        report
            .issues
            .iter()
            .any(|issue| matches!(issue, ResolveIssue::TypeUnresolved { name, .. } if name == "pivot"))
    );
    assert!(!report.unit.as_str().contains("pivot"));
    assert!(report.unit.as_str().contains("public int n = 1;"));
}

// ── Extraction ──────────────────────────────────────────────────────

#[test]
fn extraction_is_stable_over_synthesized_units() {
    let text = r#"
using UnityEngine;
public int lives = 3;
public float speed = 2.5f;
public string title = "hero";
void onTick() {
    transform.Translate(speed, 0, 0);
}
"#;
    let first = extract(text);
    let mut world = World::new(&Default::default());
    let resolution = TypeResolver::default().resolve(&first.variables, &mut world);
    let unit = synthesize(&first.imports, resolution.variables.values(), &first.methods);

    let second = extract(unit.as_str());
    assert_eq!(second.variables, first.variables);
    let bodies = |methods: &[graft::MethodDescriptor]| {
        methods
            .iter()
            .map(|m| (m.name.clone(), m.body.trim().to_string()))
            .collect::<Vec<_>>()
    };
    assert_eq!(bodies(&second.methods[..]), bodies(&first.methods[..]));
}

const NESTED: &str = "\
public int x = 5;
void onTick() {
    if (x > 0) { x = 0; }
    int y = 2;
    x = y;
}
";

#[test]
fn naive_braces_truncate_at_first_inner_block() {
    let naive = extract_with(
        NESTED,
        &ExtractOptions {
            braces: BraceMode::Naive,
        },
    );
    let body = &naive.methods[0].body;
    assert!(body.trim_end().ends_with("x = 0;"), "{body:?}");
    let names: Vec<_> = naive.variables.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["x", "y"]);
}

#[test]
fn balanced_braces_keep_the_whole_body() {
    let balanced = extract(NESTED);
    let body = &balanced.methods[0].body;
    assert!(body.contains("int y = 2;"));
    assert!(body.trim_end().ends_with("x = y;"));
    let names: Vec<_> = balanced.variables.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["x"]);
}

// ── Registry lifecycle ──────────────────────────────────────────────

#[test]
fn later_batch_replaces_ontick() {
    let bodies = [
        ("Debug.Log(\"first\");", "Debug.Log(\"second\");"),
        ("hits++; Debug.Log(hits);", "Debug.Log(\"other\" + hits);"),
    ];
    for (a, b) in bodies {
        let mut rt = runtime();
        rt.apply_source(&format!("public int hits;\nvoid onTick() {{ {a} }}"));
        let report = rt.apply_source(&format!("public int hits;\nvoid onTick() {{ {b} }}"));
        assert!(report.compiled(), "{:#?}", report.diagnostics);
        script_logs(&mut rt);

        rt.frame().expect("frame");
        let logs = script_logs(&mut rt);
        let expected = if b.contains("second") { "second" } else { "other0" };
        assert_eq!(logs, vec![expected.to_string()]);
    }
}

#[test]
fn malformed_bodies_bind_nothing() {
    for body in [
        "Debug.Log((1);",
        "int x = (2 + 3;",
        "if ((true) { }",
        "transform.Translate(1, 0, 0;",
    ] {
        let mut rt = runtime();
        rt.apply_source("void onTick() { }");
        let report = rt.apply_source(&format!("void onTick() {{ {body} }}"));
        assert!(!report.compiled(), "{body}");
        assert!(report.diagnostics.iter().any(Diagnostic::is_error), "{body}");
        assert!(report.bound.is_empty());
        assert!(rt.registry().is_empty());
    }
}

#[test]
fn runaway_nesting_binds_nothing() {
    let n = 10_000;
    for body in [
        format!("Debug.Log({}1{});", "(".repeat(n), ")".repeat(n)),
        format!("{}Debug.Log(1);{}", "if (true) { ".repeat(n), " }".repeat(n)),
        format!("Debug.Log(1{});", " + 1".repeat(n)),
    ] {
        let mut rt = runtime();
        rt.apply_source("void onTick() { }");
        let report = rt.apply_source(&format!("void onTick() {{ {body} }}"));
        assert!(!report.compiled());
        assert!(
            report
                .diagnostics
                .iter()
                .any(|d| d.message.contains("nested too deeply")),
            "{:#?}",
            report.diagnostics
        );
        assert!(rt.registry().is_empty());
    }
}

#[test]
fn init_runs_once_before_first_frame() {
    let mut rt = runtime();
    rt.apply_source(
        "public int frames;\nvoid Start() { Debug.Log(\"start \" + frames); }\nvoid Update() { frames++; }",
    );
    for _ in 0..3 {
        rt.frame().expect("frame");
    }
    assert_eq!(script_logs(&mut rt), vec!["start 0".to_string()]);
    assert_eq!(rt.instance().and_then(|i| i.field("frames")), Some(Value::Int(3)));
}

// ── Host behavior ───────────────────────────────────────────────────

#[test]
fn fixed_steps_integrate_bodies() {
    let mut rt = runtime();
    let report = rt.apply_source(
        "void onInit() { currentObject.AddComponent<Rigidbody2D>(); }\nvoid onFixedTick() { }",
    );
    assert!(report.compiled(), "{:#?}", report.diagnostics);
    rt.fixed_step().expect("step");
    rt.fixed_step().expect("step");
    let host = rt.host().expect("host");
    let y = rt.world().get(host).expect("host").transform.position.y;
    assert!(y < 0.0, "gravity should pull the host down, y = {y}");
}

#[test]
fn held_keys_drive_input() {
    let mut rt = runtime();
    rt.apply_source(
        "void onTick() { if (Input.GetKey(KeyCode.RightArrow)) { transform.Translate(1, 0, 0); } }",
    );
    rt.world_mut().input.press("RightArrow");
    rt.frame().expect("frame");
    rt.frame().expect("frame");
    let host = rt.host().expect("host");
    assert_eq!(rt.world().get(host).expect("host").transform.position.x, 2.0);
}

#[test]
fn runaway_loops_run_out_of_fuel() {
    let mut rt = Runtime::new(RuntimeCreateInfo {
        limits: ExecutionLimits {
            fuel: 1_000,
            ..Default::default()
        },
        ..Default::default()
    });
    rt.apply_source("void onTick() { while (true) { } }");
    let fault = rt.frame().expect_err("fuel");
    assert_eq!(fault.method, "onTick");
    assert_eq!(fault.fault, Fault::FuelExhausted { limit: 1_000 });

    // The handle stays bound and faults again on the next frame.
    assert!(rt.frame().is_err());
}

// ── Hand-off ────────────────────────────────────────────────────────

#[test]
fn inbox_batches_apply_between_ticks() {
    let mut rt = runtime();
    let inbox = rt.inbox();
    let gate = graft::RequestGate::default();

    let guard = gate.try_begin().expect("gate open");
    assert!(gate.try_begin().is_none());
    let worker = std::thread::spawn(move || {
        let _guard = guard;
        inbox.push("public int n = 7;\nvoid onTick() { Debug.Log(n); }");
    });
    worker.join().expect("worker");
    assert!(!gate.is_busy());

    let reports = rt.pump();
    assert_eq!(reports.len(), 1);
    rt.frame().expect("frame");
    assert_eq!(script_logs(&mut rt), vec!["7".to_string()]);
}
