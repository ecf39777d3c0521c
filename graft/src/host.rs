/// The host environment compiled code runs against.
///
/// A [`World`] owns every scene object, the clock, the input state and
/// the captured script log. Compiled methods only ever see it through
/// the closed API in [`crate::builtins`].
use std::fmt;

use indexmap::{IndexMap, IndexSet};

use crate::error::Fault;
use crate::value::{Vec2, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Rotation in degrees around each axis.
    pub euler_angles: Vec3,
    pub local_scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            euler_angles: Vec3::ZERO,
            local_scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn translate(&mut self, delta: Vec3) {
        self.position = self.position + delta;
    }

    pub fn rotate(&mut self, euler: Vec3) {
        let wrap = |deg: f32| deg.rem_euclid(360.0);
        let e = self.euler_angles + euler;
        self.euler_angles = Vec3::new(wrap(e.x), wrap(e.y), wrap(e.z));
    }

    /// Local right axis, considering rotation around z only.
    pub fn right(&self) -> Vec3 {
        let (sin, cos) = self.euler_angles.z.to_radians().sin_cos();
        Vec3::new(cos, sin, 0.0)
    }

    /// Local up axis, considering rotation around z only.
    pub fn up(&self) -> Vec3 {
        let (sin, cos) = self.euler_angles.z.to_radians().sin_cos();
        Vec3::new(-sin, cos, 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rigidbody2D {
    pub velocity: Vec2,
    /// Degrees per second around z.
    pub angular_velocity: f32,
    pub gravity_scale: f32,
    pub mass: f32,
    /// Force accumulated through `AddForce` since the last physics step.
    pub pending_force: Vec2,
}

impl Default for Rigidbody2D {
    fn default() -> Self {
        Self {
            velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            gravity_scale: 1.0,
            mass: 1.0,
            pending_force: Vec2::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameObject {
    pub name: String,
    pub transform: Transform,
    pub sprite: Option<String>,
    pub body: Option<Rigidbody2D>,
    pub active: bool,
}

impl GameObject {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            sprite: None,
            body: None,
            active: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Time {
    pub delta_time: f32,
    pub fixed_delta_time: f32,
    /// Seconds since the world was created.
    pub time: f32,
    pub frame_count: u64,
    /// Set while a fixed tick is being dispatched.
    pub in_fixed_step: bool,
}

impl Time {
    /// `Time.deltaTime` as scripts see it.
    pub fn delta(&self) -> f32 {
        if self.in_fixed_step {
            self.fixed_delta_time
        } else {
            self.delta_time
        }
    }
}

/// Keyboard state, keyed by `KeyCode` member names compared without
/// regard to case, so `KeyCode.Space` and `"space"` name the same key.
#[derive(Debug, Clone, Default)]
pub struct Input {
    held: IndexSet<String>,
    pressed: IndexSet<String>,
    released: IndexSet<String>,
}

impl Input {
    pub fn press(&mut self, key: &str) {
        let key = key.to_ascii_lowercase();
        if self.held.insert(key.clone()) {
            self.pressed.insert(key);
        }
    }

    pub fn release(&mut self, key: &str) {
        let key = key.to_ascii_lowercase();
        if self.held.shift_remove(&key) {
            self.released.insert(key);
        }
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held.contains(&key.to_ascii_lowercase())
    }

    pub fn was_pressed(&self, key: &str) -> bool {
        self.pressed.contains(&key.to_ascii_lowercase())
    }

    pub fn was_released(&self, key: &str) -> bool {
        self.released.contains(&key.to_ascii_lowercase())
    }

    /// `Horizontal` and `Vertical` axes derived from held keys.
    pub fn axis(&self, name: &str) -> Option<f32> {
        let (neg, pos): (&[&str], &[&str]) = match name {
            "Horizontal" => (&["A", "LeftArrow"], &["D", "RightArrow"]),
            "Vertical" => (&["S", "DownArrow"], &["W", "UpArrow"]),
            _ => return None,
        };
        let any = |keys: &[&str]| keys.iter().any(|k| self.is_held(k));
        let value = match (any(neg), any(pos)) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        };
        Some(value)
    }

    fn begin_frame(&mut self) {
        self.pressed.clear();
        self.released.clear();
    }
}

#[derive(Debug, Clone)]
pub struct HostCreateInfo {
    pub delta_time: f32,
    pub fixed_delta_time: f32,
    pub gravity: Vec2,
    /// Sprite assigned to each freshly created host object.
    pub sprite: Option<String>,
    /// Seed for `Random`.
    pub seed: u64,
}

impl Default for HostCreateInfo {
    fn default() -> Self {
        Self {
            delta_time: 1.0 / 60.0,
            fixed_delta_time: 0.02,
            gravity: Vec2::new(0.0, -9.81),
            sprite: None,
            seed: 0x5eed,
        }
    }
}

#[derive(Debug)]
pub struct World {
    objects: IndexMap<ObjectId, GameObject>,
    next_id: u32,
    pub time: Time,
    pub input: Input,
    pub gravity: Vec2,
    pub logs: Vec<LogEntry>,
    rng: u64,
}

impl World {
    pub fn new(info: &HostCreateInfo) -> Self {
        Self {
            objects: IndexMap::new(),
            next_id: 1,
            time: Time {
                delta_time: info.delta_time,
                fixed_delta_time: info.fixed_delta_time,
                time: 0.0,
                frame_count: 0,
                in_fixed_step: false,
            },
            input: Input::default(),
            gravity: info.gravity,
            logs: Vec::new(),
            rng: info.seed.max(1),
        }
    }

    pub fn spawn(&mut self, name: impl Into<String>) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        let object = GameObject::new(name);
        log::debug!("spawned {} {id}", object.name);
        self.objects.insert(id, object);
        id
    }

    pub fn despawn(&mut self, id: ObjectId) -> bool {
        match self.objects.shift_remove(&id) {
            Some(object) => {
                log::debug!("despawned {} {id}", object.name);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &GameObject)> {
        self.objects.iter().map(|(id, object)| (*id, object))
    }

    pub fn get(&self, id: ObjectId) -> Result<&GameObject, Fault> {
        self.objects.get(&id).ok_or(Fault::DestroyedObject(id))
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Result<&mut GameObject, Fault> {
        self.objects.get_mut(&id).ok_or(Fault::DestroyedObject(id))
    }

    /// Attach a default body unless one exists. `false` if the object
    /// is gone.
    pub fn add_body(&mut self, id: ObjectId) -> bool {
        match self.objects.get_mut(&id) {
            Some(object) => {
                object.body.get_or_insert_with(Rigidbody2D::default);
                true
            }
            None => false,
        }
    }

    pub fn body(&self, id: ObjectId) -> Result<&Rigidbody2D, Fault> {
        self.get(id)?.body.as_ref().ok_or_else(missing_body)
    }

    pub fn body_mut(&mut self, id: ObjectId) -> Result<&mut Rigidbody2D, Fault> {
        self.get_mut(id)?.body.as_mut().ok_or_else(missing_body)
    }

    pub fn log(&mut self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => log::info!(target: "graft::script", "{message}"),
            LogLevel::Warning => log::warn!(target: "graft::script", "{message}"),
            LogLevel::Error => log::error!(target: "graft::script", "{message}"),
        }
        self.logs.push(LogEntry { level, message });
    }

    pub fn take_logs(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.logs)
    }

    /// Uniform sample in `[0, 1)` from a xorshift generator.
    pub fn next_random(&mut self) -> f32 {
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng = x;
        (x >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Integrate every active body over `dt` seconds.
    pub fn step_physics(&mut self, dt: f32) {
        let gravity = self.gravity;
        for object in self.objects.values_mut() {
            if !object.active {
                continue;
            }
            let Some(body) = object.body.as_mut() else {
                continue;
            };
            let mass = if body.mass > 0.0 { body.mass } else { 1.0 };
            let accel = gravity * body.gravity_scale + body.pending_force / mass;
            body.velocity = body.velocity + accel * dt;
            body.pending_force = Vec2::ZERO;
            object.transform.translate(body.velocity.extend(0.0) * dt);
            object
                .transform
                .rotate(Vec3::new(0.0, 0.0, body.angular_velocity * dt));
        }
    }

    /// Advance the clock by one frame and reset per-frame input edges.
    pub fn advance_frame(&mut self) {
        self.time.time += self.time.delta_time;
        self.time.frame_count += 1;
        self.input.begin_frame();
    }
}

fn missing_body() -> Fault {
    Fault::NullReference {
        member: "Rigidbody2D".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> World {
        World::new(&HostCreateInfo::default())
    }

    #[test]
    fn spawn_and_despawn() {
        let mut world = world();
        let a = world.spawn("A");
        let b = world.spawn("B");
        assert_ne!(a, b);
        assert!(world.despawn(a));
        assert!(!world.despawn(a));
        assert_eq!(world.get(a), Err(Fault::DestroyedObject(a)));
        assert_eq!(world.get(b).map(|o| o.name.as_str()), Ok("B"));
    }

    #[test]
    fn ids_are_never_reused() {
        let mut world = world();
        let a = world.spawn("A");
        world.despawn(a);
        assert!(world.spawn("B") > a);
    }

    #[test]
    fn body_requires_component() {
        let mut world = world();
        let id = world.spawn("Ball");
        assert!(world.body(id).is_err());
        assert!(world.add_body(id));
        assert_eq!(world.body(id).map(|b| b.mass), Ok(1.0));
    }

    #[test]
    fn physics_applies_gravity_and_forces() {
        let mut world = world();
        let id = world.spawn("Ball");
        world.add_body(id);
        world.body_mut(id).expect("body").pending_force = Vec2::new(2.0, 0.0);

        world.step_physics(0.5);
        let body = *world.body(id).expect("body");
        assert_eq!(body.velocity, Vec2::new(1.0, -4.905));
        assert_eq!(body.pending_force, Vec2::ZERO);
        let pos = world.get(id).expect("object").transform.position;
        assert!((pos.x - 0.5).abs() < 1e-6);
        assert!((pos.y + 2.4525).abs() < 1e-6);
    }

    #[test]
    fn input_edges_reset_each_frame() {
        let mut world = world();
        world.input.press("Space");
        assert!(world.input.was_pressed("space"));
        world.advance_frame();
        assert!(world.input.is_held("Space"));
        assert!(!world.input.was_pressed("Space"));
        world.input.release("Space");
        assert!(world.input.was_released("Space"));
        assert_eq!(world.time.frame_count, 1);
    }

    #[test]
    fn axes_follow_held_keys() {
        let mut world = world();
        world.input.press("LeftArrow");
        assert_eq!(world.input.axis("Horizontal"), Some(-1.0));
        world.input.press("D");
        assert_eq!(world.input.axis("Horizontal"), Some(0.0));
        assert_eq!(world.input.axis("Jump"), None);
    }

    #[test]
    fn rotation_wraps_and_drives_axes() {
        let mut t = Transform::default();
        t.rotate(Vec3::new(0.0, 0.0, 450.0));
        assert_eq!(t.euler_angles.z, 90.0);
        let up = t.up();
        assert!((up.x + 1.0).abs() < 1e-6 && up.y.abs() < 1e-6);
    }

    #[test]
    fn random_is_deterministic_per_seed() {
        let mut a = world();
        let mut b = world();
        let xs: Vec<f32> = (0..4).map(|_| a.next_random()).collect();
        let ys: Vec<f32> = (0..4).map(|_| b.next_random()).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|x| (0.0..1.0).contains(x)));
    }
}
