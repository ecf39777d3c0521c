/// The batch driver.
///
/// A [`Runtime`] owns the world and the registry of the active batch. Each
/// batch of generated text replaces the previous one wholesale: its host
/// object and every object its variables spawned are despawned, a fresh
/// host object is created, and the registry is swapped for the handles of
/// the newly compiled unit. Ticks then drive those handles against the
/// host object.
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexSet;
use parking_lot::Mutex;

use crate::error::{Diagnostic, InvocationFault, ResolveIssue};
use crate::extract::{self, ExtractOptions, Extraction};
use crate::host::{HostCreateInfo, ObjectId, World};
use crate::interpreter::ExecutionLimits;
use crate::loader::{self, UnitInstance};
use crate::registry::{MethodRegistry, Tick};
use crate::synth::{self, CompilationUnit};
use crate::types::{HostTypeRegistry, TypeResolver};
use crate::value::Vec3;

/// Name given to the object every batch runs against.
pub const HOST_OBJECT_NAME: &str = "TargetGameObject";

#[derive(Debug, Clone, Default)]
pub struct RuntimeCreateInfo {
    pub extract: ExtractOptions,
    pub host: HostCreateInfo,
    pub limits: ExecutionLimits,
    pub host_types: HostTypeRegistry,
}

/// Outcome of installing one batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub generation: u64,
    pub unit: CompilationUnit,
    /// Variables dropped or defaulted during resolution.
    pub issues: Vec<ResolveIssue>,
    /// Compiler output, warnings included.
    pub diagnostics: Vec<Diagnostic>,
    /// Field initializers that faulted.
    pub init_fault: Option<InvocationFault>,
    /// Names now in the registry.
    pub bound: Vec<String>,
}

impl BatchReport {
    pub fn compiled(&self) -> bool {
        self.init_fault.is_none() && !self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Generated text waiting to be applied, handed over by whatever produces
/// it on another thread.
#[derive(Debug, Clone, Default)]
pub struct BatchInbox {
    queue: Arc<Mutex<VecDeque<String>>>,
}

impl BatchInbox {
    pub fn push(&self, text: impl Into<String>) {
        self.queue.lock().push_back(text.into());
    }

    pub fn drain(&self) -> Vec<String> {
        self.queue.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

/// Allows at most one outstanding generation request.
#[derive(Debug, Clone, Default)]
pub struct RequestGate {
    busy: Arc<AtomicBool>,
}

impl RequestGate {
    /// `None` while another request is outstanding.
    pub fn try_begin(&self) -> Option<RequestGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RequestGuard {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Reopens its gate when dropped.
#[derive(Debug)]
pub struct RequestGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

pub struct Runtime {
    world: World,
    resolver: TypeResolver,
    registry: MethodRegistry,
    extract: ExtractOptions,
    limits: ExecutionLimits,
    sprite: Option<String>,
    host: Option<ObjectId>,
    /// Objects spawned on behalf of the active batch.
    owned: Vec<ObjectId>,
    instance: Option<Arc<UnitInstance>>,
    pending_init: bool,
    generation: u64,
    inbox: BatchInbox,
}

impl Runtime {
    pub fn new(info: RuntimeCreateInfo) -> Self {
        Self {
            world: World::new(&info.host),
            resolver: TypeResolver::new(info.host_types),
            registry: MethodRegistry::new(),
            extract: info.extract,
            limits: info.limits,
            sprite: info.host.sprite,
            host: None,
            owned: Vec::new(),
            instance: None,
            pending_init: false,
            generation: 0,
            inbox: BatchInbox::default(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    pub fn host(&self) -> Option<ObjectId> {
        self.host
    }

    pub fn instance(&self) -> Option<&Arc<UnitInstance>> {
        self.instance.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// A handle producers can push generated text into.
    pub fn inbox(&self) -> BatchInbox {
        self.inbox.clone()
    }

    /// Extract a batch from raw generated text and install it.
    pub fn apply_source(&mut self, text: &str) -> BatchReport {
        let extraction = extract::extract_with(text, &self.extract);
        self.update_batch(&extraction)
    }

    /// Apply every batch waiting in the inbox, oldest first.
    pub fn pump(&mut self) -> Vec<BatchReport> {
        self.inbox
            .drain()
            .iter()
            .map(|text| self.apply_source(text))
            .collect()
    }

    pub fn update_batch(&mut self, batch: &Extraction) -> BatchReport {
        self.generation += 1;
        log::info!(
            "installing batch {} ({} variable(s), {} method(s))",
            self.generation,
            batch.variables.len(),
            batch.methods.len()
        );

        self.teardown();
        let host = self.create_host_object();

        let before: IndexSet<ObjectId> = self.world.objects().map(|(id, _)| id).collect();
        let resolution = self.resolver.resolve(&batch.variables, &mut self.world);
        let unit = synth::synthesize(
            &batch.imports,
            resolution.variables.values(),
            &batch.methods,
        );

        let mut report = BatchReport {
            generation: self.generation,
            unit: unit.clone(),
            issues: resolution.issues,
            diagnostics: Vec::new(),
            init_fault: None,
            bound: Vec::new(),
        };

        let loaded = match loader::compile(unit.as_str()) {
            Ok(loaded) => loaded,
            Err(err) => {
                log::error!("batch {} failed to compile: {err}", self.generation);
                for diagnostic in &err.diagnostics {
                    log::error!("{diagnostic}");
                }
                report.diagnostics = err.diagnostics;
                self.claim_spawned(&before);
                return report;
            }
        };
        report.diagnostics = loaded.warnings().to_vec();

        let instance = loaded.instantiate(&mut self.world, &resolution.variables, self.limits);
        self.claim_spawned(&before);
        let instance = match instance {
            Ok(instance) => instance,
            Err(fault) => {
                log::error!("batch {} failed to initialize: {fault}", self.generation);
                report.init_fault = Some(fault);
                return report;
            }
        };

        let handles: Vec<_> = loaded
            .program()
            .method_names()
            .filter_map(|name| instance.bind(name))
            .collect();
        self.registry.replace_all(handles);
        report.bound = self.registry.names().map(str::to_string).collect();
        self.instance = Some(instance);
        self.pending_init = true;

        log::info!(
            "batch {} bound {} method(s) on {host}",
            self.generation,
            report.bound.len()
        );
        report
    }

    /// Despawn what the previous batch owned and unbind its methods.
    fn teardown(&mut self) {
        self.registry.clear();
        self.instance = None;
        self.pending_init = false;
        for id in self.host.take().into_iter().chain(self.owned.drain(..)) {
            self.world.despawn(id);
        }
    }

    fn create_host_object(&mut self) -> ObjectId {
        let id = self.world.spawn(HOST_OBJECT_NAME);
        if let Ok(object) = self.world.get_mut(id) {
            object.transform.position = Vec3::ZERO;
            object.sprite = self.sprite.clone();
        }
        if self.sprite.is_none() {
            log::warn!("no sprite configured for the host object");
        }
        self.host = Some(id);
        id
    }

    fn claim_spawned(&mut self, before: &IndexSet<ObjectId>) {
        self.owned.extend(
            self.world
                .objects()
                .map(|(id, _)| id)
                .filter(|id| !before.contains(id)),
        );
    }

    /// Dispatch `tick` against the host object.
    pub fn tick(&mut self, tick: Tick) -> Result<bool, InvocationFault> {
        let Some(host) = self.host else {
            return Ok(false);
        };
        if tick == Tick::Init {
            self.pending_init = false;
        }
        self.registry.dispatch(tick, &mut self.world, host)
    }

    fn ensure_init(&mut self) -> Result<(), InvocationFault> {
        if self.pending_init {
            self.tick(Tick::Init)?;
        }
        Ok(())
    }

    /// One rendered frame: the pending init tick, the frame tick, then
    /// the clock advances.
    pub fn frame(&mut self) -> Result<(), InvocationFault> {
        let result = self.ensure_init().and_then(|()| self.tick(Tick::Frame));
        self.world.advance_frame();
        result.map(|_| ())
    }

    /// One physics step: the fixed tick, then integration.
    pub fn fixed_step(&mut self) -> Result<(), InvocationFault> {
        self.ensure_init()?;
        self.world.time.in_fixed_step = true;
        let result = self.tick(Tick::Fixed);
        self.world.time.in_fixed_step = false;
        let dt = self.world.time.fixed_delta_time;
        self.world.step_physics(dt);
        result.map(|_| ())
    }

    /// Invoke any bound method by name. `false` when nothing is bound
    /// under that name.
    pub fn invoke(&mut self, name: &str) -> Result<bool, InvocationFault> {
        let (Some(host), Some(handle)) = (self.host, self.registry.get(name)) else {
            return Ok(false);
        };
        handle.invoke(&mut self.world, host)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn runtime() -> Runtime {
        Runtime::new(RuntimeCreateInfo::default())
    }

    const MOVER: &str = r#"
using UnityEngine;

public float speed = 2f;
public Rigidbody2D rb;

void onInit() {
    Debug.Log("init");
}

void onTick() {
    transform.Translate(speed, 0, 0);
}
"#;

    #[test]
    fn batch_binds_and_ticks() {
        let mut rt = runtime();
        let report = rt.apply_source(MOVER);
        assert!(report.compiled(), "{:#?}", report.diagnostics);
        assert_eq!(report.bound, vec!["onInit", "onTick"]);

        rt.frame().expect("frame");
        rt.frame().expect("frame");
        let host = rt.host().expect("host");
        let pos = rt.world().get(host).expect("host").transform.position;
        assert_eq!(pos.x, 4.0);
        let logs: Vec<_> = rt.world().logs.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(logs, vec!["init"]);
    }

    #[test]
    fn new_batch_replaces_host_and_owned_objects() {
        let mut rt = runtime();
        rt.apply_source(MOVER);
        let first_host = rt.host().expect("host");
        let body = match rt.instance().and_then(|i| i.field("rb")) {
            Some(Value::Body(id)) => id,
            other => panic!("expected a seeded body, got {other:?}"),
        };
        assert_eq!(rt.world().objects().count(), 2);

        rt.apply_source("void onTick() { }");
        assert!(!rt.world().contains(first_host));
        assert!(!rt.world().contains(body));
        assert_eq!(rt.world().objects().count(), 1);
        assert_eq!(rt.generation(), 2);
    }

    #[test]
    fn compile_failure_clears_registry() {
        let mut rt = runtime();
        rt.apply_source(MOVER);
        let report = rt.apply_source("void onTick() { Debug.Log((1); }");
        assert!(!report.compiled());
        assert!(report.diagnostics.iter().any(Diagnostic::is_error));
        assert!(rt.registry().is_empty());
        rt.frame().expect("no handles, no faults");
    }

    #[test]
    fn fixed_step_sees_fixed_delta() {
        let mut rt = runtime();
        rt.apply_source("public float seen;\nvoid onFixedTick() { seen = Time.deltaTime; }");
        rt.fixed_step().expect("fixed");
        let seen = rt.instance().and_then(|i| i.field("seen"));
        assert_eq!(seen, Some(Value::Float(0.02)));
        assert!(!rt.world().time.in_fixed_step);
    }

    #[test]
    fn other_methods_are_invoked_by_name() {
        let mut rt = runtime();
        rt.apply_source("public int n;\nvoid Jump() { n += 5; }");
        assert_eq!(rt.invoke("Jump"), Ok(true));
        assert_eq!(rt.invoke("Fly"), Ok(false));
        assert_eq!(rt.instance().and_then(|i| i.field("n")), Some(Value::Int(5)));
    }

    #[test]
    fn inbox_is_pumped_in_order() {
        let mut rt = runtime();
        let inbox = rt.inbox();
        let producer = std::thread::spawn(move || {
            inbox.push("void onTick() { Debug.Log(\"first\"); }");
            inbox.push("void onTick() { Debug.Log(\"second\"); }");
        });
        producer.join().expect("producer");

        let reports = rt.pump();
        assert_eq!(reports.len(), 2);
        assert!(rt.inbox().is_empty());
        rt.frame().expect("frame");
        let logs: Vec<_> = rt.world().logs.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(logs, vec!["second"]);
    }

    #[test]
    fn request_gate_admits_one() {
        let gate = RequestGate::default();
        let guard = gate.try_begin().expect("open");
        assert!(gate.is_busy());
        assert!(gate.clone().try_begin().is_none());
        drop(guard);
        assert!(!gate.is_busy());
        assert!(gate.try_begin().is_some());
    }
}
