/// Named handles of the active batch and the lifecycle ticks that drive
/// them.
use indexmap::IndexMap;

use crate::error::InvocationFault;
use crate::host::{ObjectId, World};
use crate::loader::InvocableHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tick {
    /// Once per installed batch, before its first frame.
    Init,
    Frame,
    /// Physics step.
    Fixed,
}

impl Tick {
    pub const ALL: [Tick; 3] = [Tick::Init, Tick::Frame, Tick::Fixed];

    /// Reserved method name, looked up first.
    pub fn method_name(self) -> &'static str {
        match self {
            Self::Init => "onInit",
            Self::Frame => "onTick",
            Self::Fixed => "onFixedTick",
        }
    }

    /// Engine-style alias, used when the reserved name is absent.
    pub fn alias(self) -> &'static str {
        match self {
            Self::Init => "Start",
            Self::Frame => "Update",
            Self::Fixed => "FixedUpdate",
        }
    }
}

#[derive(Debug, Default)]
pub struct MethodRegistry {
    handles: IndexMap<String, InvocableHandle>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&InvocableHandle> {
        self.handles.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handles.keys().map(String::as_str)
    }

    /// Install `handles` in place of everything registered so far.
    pub fn replace_all(&mut self, handles: impl IntoIterator<Item = InvocableHandle>) {
        self.handles = handles
            .into_iter()
            .map(|handle| (handle.name().to_string(), handle))
            .collect();
        log::debug!("registry now holds {} handle(s)", self.handles.len());
    }

    pub fn clear(&mut self) {
        self.handles.clear();
    }

    /// Handle that `tick` dispatches to, if any.
    pub fn for_tick(&self, tick: Tick) -> Option<&InvocableHandle> {
        self.get(tick.method_name())
            .or_else(|| self.get(tick.alias()))
    }

    /// Invoke the handle for `tick` on `target`. A missing handle is a
    /// no-op; faults propagate to the caller.
    pub fn dispatch(
        &self,
        tick: Tick,
        world: &mut World,
        target: ObjectId,
    ) -> Result<bool, InvocationFault> {
        match self.for_tick(tick) {
            Some(handle) => {
                handle.invoke(world, target)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
