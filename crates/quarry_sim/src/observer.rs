use glam::{Vec2, Vec3};
use quarry_persist::observer_save::SavedObserver;
use quarry_shared::coords::CHUNK_HEIGHT;
use quarry_shared::physics::{bounding_points, AABB, NUMBER_OF_BOUNDING_POINTS};

pub const OBSERVER_HALF_EXTENTS: Vec3 = Vec3::new(0.3, 0.3, 0.93);
pub const EYE_HEIGHT_OFFSET: f32 = 0.69;
/// How far an observer can dig or place.
pub const OBSERVER_REACH: f32 = 8.0;

pub const GRAVITY: f32 = -9.8;
pub const JUMP_IMPULSE: f32 = 5.0;
pub const FRICTION: f32 = 0.99;
pub const MOVEMENT_SPEED: f32 = 8.0;
pub const SPRINT_MULTIPLIER: f32 = 2.0;

pub const OBSERVER_MAX_HEALTH: i32 = 10;
/// Seconds between two shots while the trigger is held.
pub const OBSERVER_RATE_OF_FIRE: f32 = 0.125;

const MIN_CAMERA_HEIGHT: f32 = 1.5;
const MAX_CAMERA_HEIGHT: f32 = CHUNK_HEIGHT as f32 - 0.5;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PhysicsMode {
    #[default]
    Walking,
    Flying,
    NoClip,
}

impl PhysicsMode {
    /// Walking, then flying, then no-clip, then back to walking.
    pub fn next(self) -> Self {
        match self {
            PhysicsMode::Walking => PhysicsMode::Flying,
            PhysicsMode::Flying => PhysicsMode::NoClip,
            PhysicsMode::NoClip => PhysicsMode::Walking,
        }
    }

    pub fn collides(self) -> bool {
        self != PhysicsMode::NoClip
    }

    pub fn to_u8(self) -> u8 {
        match self {
            PhysicsMode::Walking => 0,
            PhysicsMode::Flying => 1,
            PhysicsMode::NoClip => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(PhysicsMode::Walking),
            1 => Some(PhysicsMode::Flying),
            2 => Some(PhysicsMode::NoClip),
            _ => None,
        }
    }
}

/// One tick of movement input. `direction` is already in world space; its
/// length is clamped to 1.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct MoveIntent {
    pub direction: Vec2,
    pub sprint: bool,
    pub jump: bool,
    pub ascend: bool,
    pub descend: bool,
    pub fire: bool,
}

/// A camera-carrying viewpoint that drives chunk streaming and collides with
/// the world.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Observer {
    pub position: Vec3,
    pub velocity: Vec3,
    pub look: Vec3,
    pub physics_mode: PhysicsMode,
    health: i32,
    fire_cooldown: f32,
}

impl Observer {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            look: Vec3::X,
            physics_mode: PhysicsMode::Walking,
            health: OBSERVER_MAX_HEALTH,
            fire_cooldown: 0.0,
        }
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn take_damage(&mut self) {
        self.health = (self.health - 1).max(0);
    }

    /// Advances the shot timer. Returns the muzzle and direction of a new
    /// shot when `trigger` is held and the timer allows one.
    pub fn try_fire(&mut self, trigger: bool, dt: f32) -> Option<(Vec3, Vec3)> {
        self.fire_cooldown += dt;
        if !trigger || !self.is_alive() || self.fire_cooldown < OBSERVER_RATE_OF_FIRE {
            return None;
        }
        self.fire_cooldown = 0.0;
        Some((self.eye_position(), self.look.normalize_or_zero()))
    }

    pub fn bounding_box(&self) -> AABB {
        AABB::from_centre(self.position, OBSERVER_HALF_EXTENTS)
    }

    pub fn bounding_points(&self) -> [Vec3; NUMBER_OF_BOUNDING_POINTS] {
        bounding_points(self.position, OBSERVER_HALF_EXTENTS)
    }

    pub fn eye_position(&self) -> Vec3 {
        self.position + Vec3::new(0.0, 0.0, EYE_HEIGHT_OFFSET)
    }

    /// End of the observer's dig/place reach along its look direction.
    pub fn reach_end(&self) -> Vec3 {
        self.eye_position() + self.look.normalize_or_zero() * OBSERVER_REACH
    }

    pub fn cycle_physics_mode(&mut self) {
        self.physics_mode = self.physics_mode.next();
        self.velocity = Vec3::ZERO;
    }

    /// Integrates input into velocity (or position, without collision) for
    /// one tick. Collision runs separately.
    pub fn apply_intent(&mut self, intent: &MoveIntent, dt: f32, on_ground: bool) {
        let speed = if intent.sprint {
            MOVEMENT_SPEED * SPRINT_MULTIPLIER
        } else {
            MOVEMENT_SPEED
        };
        let horizontal = intent.direction.clamp_length_max(1.0) * speed;
        let vertical = match (intent.ascend, intent.descend) {
            (true, false) => speed,
            (false, true) => -speed,
            _ => 0.0,
        };

        match self.physics_mode {
            PhysicsMode::Walking => {
                if intent.jump && on_ground {
                    self.velocity.z += JUMP_IMPULSE;
                }
                self.velocity += horizontal.extend(GRAVITY) * dt;
                self.velocity.x *= FRICTION;
                self.velocity.y *= FRICTION;
            }
            PhysicsMode::Flying => {
                self.velocity += horizontal.extend(vertical) * dt;
                self.velocity *= FRICTION;
            }
            PhysicsMode::NoClip => {
                self.position += horizontal.extend(vertical) * dt;
            }
        }
    }

    /// Keeps flying and no-clip cameras inside the world's vertical range.
    pub fn clamp_height(&mut self) {
        if self.physics_mode != PhysicsMode::Walking {
            self.position.z = self.position.z.clamp(MIN_CAMERA_HEIGHT, MAX_CAMERA_HEIGHT);
        }
    }

    pub fn to_saved(&self) -> SavedObserver {
        SavedObserver {
            position: self.position,
            velocity: self.velocity,
            physics_mode: self.physics_mode.to_u8(),
        }
    }

    pub fn from_saved(saved: &SavedObserver) -> Self {
        Self {
            velocity: saved.velocity,
            physics_mode: PhysicsMode::from_u8(saved.physics_mode).unwrap_or_default(),
            ..Self::new(saved.position)
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};

    use super::{
        MoveIntent, Observer, PhysicsMode, FRICTION, GRAVITY, JUMP_IMPULSE, OBSERVER_MAX_HEALTH,
        OBSERVER_RATE_OF_FIRE,
    };

    #[test]
    fn physics_modes_cycle_and_round_trip() {
        let mut mode = PhysicsMode::Walking;
        for expected in [PhysicsMode::Flying, PhysicsMode::NoClip, PhysicsMode::Walking] {
            mode = mode.next();
            assert_eq!(mode, expected);
            assert_eq!(PhysicsMode::from_u8(mode.to_u8()), Some(mode));
        }
        assert_eq!(PhysicsMode::from_u8(9), None);
    }

    #[test]
    fn walking_applies_gravity_and_jumps_only_from_ground() {
        let dt = 1.0 / 60.0;
        let jump = MoveIntent {
            jump: true,
            ..MoveIntent::default()
        };

        let mut airborne = Observer::new(Vec3::new(0.0, 0.0, 80.0));
        airborne.apply_intent(&jump, dt, false);
        assert!((airborne.velocity.z - GRAVITY * dt).abs() < 1e-6);

        let mut grounded = Observer::new(Vec3::new(0.0, 0.0, 80.0));
        grounded.apply_intent(&jump, dt, true);
        assert!((grounded.velocity.z - (JUMP_IMPULSE + GRAVITY * dt)).abs() < 1e-6);
    }

    #[test]
    fn sprint_doubles_acceleration() {
        let dt = 0.1;
        let walk = MoveIntent {
            direction: Vec2::X,
            ..MoveIntent::default()
        };
        let sprint = MoveIntent {
            sprint: true,
            ..walk
        };
        let mut a = Observer::new(Vec3::ZERO);
        let mut b = Observer::new(Vec3::ZERO);
        a.apply_intent(&walk, dt, true);
        b.apply_intent(&sprint, dt, true);
        assert!((a.velocity.x - 8.0 * dt * FRICTION).abs() < 1e-5);
        assert!((b.velocity.x - 2.0 * a.velocity.x).abs() < 1e-5);
    }

    #[test]
    fn no_clip_moves_position_directly_and_clamps_height() {
        let mut observer = Observer::new(Vec3::new(0.0, 0.0, 127.0));
        observer.physics_mode = PhysicsMode::NoClip;
        let up = MoveIntent {
            ascend: true,
            ..MoveIntent::default()
        };
        observer.apply_intent(&up, 1.0, false);
        assert_eq!(observer.velocity, Vec3::ZERO);
        assert_eq!(observer.position.z, 135.0);
        observer.clamp_height();
        assert_eq!(observer.position.z, 127.5);
    }

    #[test]
    fn saved_form_preserves_state() {
        let mut observer = Observer::new(Vec3::new(1.0, 2.0, 3.0));
        observer.velocity = Vec3::new(0.5, 0.0, -1.0);
        observer.physics_mode = PhysicsMode::Flying;
        let restored = Observer::from_saved(&observer.to_saved());
        assert_eq!(restored.position, observer.position);
        assert_eq!(restored.velocity, observer.velocity);
        assert_eq!(restored.physics_mode, PhysicsMode::Flying);
    }

    #[test]
    fn trigger_fires_at_the_rate_of_fire() {
        let mut observer = Observer::new(Vec3::new(0.0, 0.0, 70.0));
        observer.look = Vec3::new(0.0, 2.0, 0.0);
        let dt = OBSERVER_RATE_OF_FIRE / 2.0;

        assert!(observer.try_fire(true, dt).is_none());
        let (muzzle, direction) = observer.try_fire(true, dt).expect("second half-step fires");
        assert_eq!(muzzle, observer.eye_position());
        assert_eq!(direction, Vec3::Y);
        assert!(observer.try_fire(true, dt).is_none());
        assert!(observer.try_fire(false, dt).is_none());
    }

    #[test]
    fn damage_stops_at_zero_and_disarms() {
        let mut observer = Observer::new(Vec3::ZERO);
        for _ in 0..OBSERVER_MAX_HEALTH + 3 {
            observer.take_damage();
        }
        assert_eq!(observer.health(), 0);
        assert!(!observer.is_alive());
        assert!(observer.try_fire(true, 1.0).is_none());
    }
}
