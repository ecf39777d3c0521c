/// Turns unit text into live, invocable methods.
///
/// [`compile`] produces a [`LoadedUnit`]; instantiating it gives a
/// [`UnitInstance`] that owns one set of field storage shared by every
/// method bound from it. Handles keep their instance alive, so a batch
/// stays usable for as long as any of its handles is held.
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use thiserror::Error;

use crate::bytecode::Program;
use crate::compiler::{self, Compilation};
use crate::error::{CompileError, Diagnostic, InvocationFault};
use crate::host::{ObjectId, World};
use crate::interpreter::{ExecutionLimits, Interpreter};
use crate::types::{HostKind, ResolvedVariable, RuntimeType};
use crate::value::Value;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Init(#[from] InvocationFault),
}

/// A compiled unit, not yet bound to any storage.
#[derive(Debug, Clone)]
pub struct LoadedUnit {
    program: Arc<Program>,
    warnings: Vec<Diagnostic>,
}

pub fn compile(text: &str) -> Result<LoadedUnit, CompileError> {
    let Compilation { program, warnings } = compiler::compile(text)?;
    for warning in &warnings {
        log::warn!("{warning}");
    }
    Ok(LoadedUnit {
        program: Arc::new(program),
        warnings,
    })
}

impl LoadedUnit {
    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Create field storage, run the field initializers, then seed
    /// host-handle fields from `variables`.
    pub fn instantiate(
        &self,
        world: &mut World,
        variables: &IndexMap<String, ResolvedVariable>,
        limits: ExecutionLimits,
    ) -> Result<Arc<UnitInstance>, InvocationFault> {
        let program = &*self.program;
        let mut fields: Vec<Value> = program.fields.iter().map(|f| f.ty.zero_value()).collect();
        Interpreter::new(program, &mut fields, world, limits).run_init()?;

        for var in variables.values() {
            let is_handle = matches!(var.ty, RuntimeType::Host(kind) if kind.is_handle());
            if !is_handle {
                continue;
            }
            let Some(slot) = program.field_slot(&var.name) else {
                continue;
            };
            match var.value.clone().coerce(program.fields[slot].ty) {
                Ok(value) => fields[slot] = value,
                Err(fault) => log::warn!("cannot seed field {}: {fault}", var.name),
            }
        }

        Ok(Arc::new(UnitInstance {
            program: self.program.clone(),
            fields: Mutex::new(fields),
            limits,
        }))
    }
}

/// Live storage of one batch.
#[derive(Debug)]
pub struct UnitInstance {
    program: Arc<Program>,
    fields: Mutex<Vec<Value>>,
    limits: ExecutionLimits,
}

impl UnitInstance {
    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        let slot = self.program.field_slot(name)?;
        Some(self.fields.lock()[slot].clone())
    }

    /// Bind a method taking exactly one `GameObject`. Anything else
    /// cannot be driven by the dispatcher and yields `None`.
    pub fn bind(self: &Arc<Self>, name: &str) -> Option<InvocableHandle> {
        let (method, code) = self.program.method(name)?;
        let takes_object = code.param_count == 1
            && code.local_types[0] == Some(RuntimeType::Host(HostKind::GameObject));
        if !takes_object {
            log::warn!(
                "method {name} does not take a single GameObject parameter, not bound"
            );
            return None;
        }
        Some(InvocableHandle {
            instance: self.clone(),
            method,
            name: Arc::from(name),
        })
    }
}

/// One bound method of one unit instance.
#[derive(Debug, Clone)]
pub struct InvocableHandle {
    instance: Arc<UnitInstance>,
    method: u16,
    name: Arc<str>,
}

impl InvocableHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance(&self) -> &Arc<UnitInstance> {
        &self.instance
    }

    pub fn invoke(&self, world: &mut World, target: ObjectId) -> Result<(), InvocationFault> {
        let instance = &*self.instance;
        let mut fields = instance.fields.lock();
        Interpreter::new(&instance.program, &mut fields, world, instance.limits)
            .invoke(self.method, vec![Value::Object(target)])
    }
}

/// Compile, instantiate and bind `method` in one go.
pub fn compile_and_bind(
    text: &str,
    method: &str,
    variables: &IndexMap<String, ResolvedVariable>,
    world: &mut World,
    limits: ExecutionLimits,
) -> Result<Option<InvocableHandle>, LoadError> {
    let unit = compile(text)?;
    let instance = unit.instantiate(world, variables, limits)?;
    Ok(instance.bind(method))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostCreateInfo;

    const COUNTER: &str = "\
using UnityEngine;
using System;

public class DynamicCode {
    public int count = 10;
    public Rigidbody2D body;

    public void onTick(GameObject currentObject) {
        var transform = currentObject.transform;
        count++;
        body.velocity = new Vector2(count, 0);
    }

    public void Helper(int x) {
    }
}
";

    fn world() -> World {
        World::new(&HostCreateInfo::default())
    }

    fn body_variable(world: &mut World) -> (ObjectId, IndexMap<String, ResolvedVariable>) {
        let holder = world.spawn("Holder");
        world.add_body(holder);
        let mut variables = IndexMap::new();
        variables.insert(
            "body".to_string(),
            ResolvedVariable {
                name: "body".into(),
                ty: RuntimeType::Host(HostKind::Rigidbody2D),
                value: Value::Body(holder),
            },
        );
        (holder, variables)
    }

    #[test]
    fn fields_are_shared_and_persist() {
        let mut world = world();
        let (holder, variables) = body_variable(&mut world);
        let host = world.spawn("Host");

        let unit = compile(COUNTER).expect("compiles");
        let instance = unit
            .instantiate(&mut world, &variables, ExecutionLimits::default())
            .expect("instantiates");
        let tick = instance.bind("onTick").expect("bound");
        let again = instance.bind("onTick").expect("bound");

        tick.invoke(&mut world, host).expect("runs");
        again.invoke(&mut world, host).expect("runs");
        assert_eq!(instance.field("count"), Some(Value::Int(12)));
        assert_eq!(world.body(holder).map(|b| b.velocity.x), Ok(12.0));
    }

    #[test]
    fn instances_do_not_share_storage() {
        let mut world = world();
        let (_, variables) = body_variable(&mut world);
        let host = world.spawn("Host");
        let unit = compile(COUNTER).expect("compiles");
        let limits = ExecutionLimits::default();
        let a = unit.instantiate(&mut world, &variables, limits).expect("a");
        let b = unit.instantiate(&mut world, &variables, limits).expect("b");

        a.bind("onTick").expect("bound").invoke(&mut world, host).expect("runs");
        assert_eq!(a.field("count"), Some(Value::Int(11)));
        assert_eq!(b.field("count"), Some(Value::Int(10)));
    }

    #[test]
    fn only_gameobject_methods_bind() {
        let mut world = world();
        let unit = compile(COUNTER).expect("compiles");
        let instance = unit
            .instantiate(&mut world, &IndexMap::new(), ExecutionLimits::default())
            .expect("instantiates");
        assert!(instance.bind("Helper").is_none());
        assert!(instance.bind("Missing").is_none());
    }

    #[test]
    fn unseeded_handle_faults_on_use() {
        let mut world = world();
        let host = world.spawn("Host");
        let handle = compile_and_bind(
            COUNTER,
            "onTick",
            &IndexMap::new(),
            &mut world,
            ExecutionLimits::default(),
        )
        .expect("loads")
        .expect("bound");
        let err = handle.invoke(&mut world, host).expect_err("body is null");
        assert_eq!(err.method, "onTick");
        assert_eq!(err.line, Some(11));
    }

    #[test]
    fn compile_errors_surface() {
        let err = compile_and_bind(
            "class C { void M(GameObject g) { x = ; } }",
            "M",
            &IndexMap::new(),
            &mut world(),
            ExecutionLimits::default(),
        )
        .expect_err("does not compile");
        assert!(matches!(err, LoadError::Compile(_)));
    }
}
