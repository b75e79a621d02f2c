use std::f32::consts::TAU;

use glam::{Vec2, Vec3};
use quarry_shared::block::BlockRegistry;
use quarry_shared::coords::world_to_chunk;
use quarry_shared::physics::AABB;

use crate::arena::ChunkArena;
use crate::bullet::{BulletOwner, BulletPool};
use crate::observer::Observer;
use crate::pool::{PoolHandle, SlotPool};
use crate::raycast::raycast;

pub type EnemyHandle = PoolHandle;

pub const ENEMY_HALF_EXTENT: f32 = 0.375;
pub const ENEMY_MAX_HEALTH: i32 = 5;
pub const ENEMY_RANGE_OF_VIEW: f32 = 10.0;
/// Seconds between two shots at a visible observer.
pub const ENEMY_RATE_OF_FIRE: f32 = 0.25;
pub const ENEMY_SPAWN_INTERVAL: f32 = 3.0;

const SPAWN_ATTEMPTS: usize = 10;
const SPAWN_MIN_DISTANCE: u32 = 64;
const SPAWN_MAX_DISTANCE: u32 = 96;
const SPAWN_HEIGHT_ABOVE_GROUND: f32 = 4.0;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Enemy {
    pub position: Vec3,
    pub forward: Vec3,
    health: i32,
    fire_cooldown: f32,
}

impl Enemy {
    fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::ZERO,
            health: ENEMY_MAX_HEALTH,
            fire_cooldown: 0.0,
        }
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0
    }

    pub fn take_damage(&mut self) {
        self.health = (self.health - 1).max(0);
    }

    pub fn focus_on(&mut self, target: Vec3) {
        self.forward = (target - self.position).normalize_or_zero();
    }

    pub fn bounding_box(&self) -> AABB {
        AABB::from_centre(self.position, Vec3::splat(ENEMY_HALF_EXTENT))
    }
}

/// Fixed pool of enemies. Spawning past capacity is refused.
pub struct EnemyPool {
    pool: SlotPool<Enemy>,
}

impl EnemyPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            pool: SlotPool::new(capacity, Enemy::new),
        }
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    pub fn is_full(&self) -> bool {
        self.pool.is_full()
    }

    pub fn spawn(&mut self, position: Vec3) -> Option<EnemyHandle> {
        let (handle, enemy) = self.pool.allocate()?;
        *enemy = Enemy::new();
        enemy.position = position;
        Some(handle)
    }

    pub fn despawn(&mut self, handle: EnemyHandle) -> bool {
        self.pool.release(handle)
    }

    pub fn get(&self, handle: EnemyHandle) -> Option<&Enemy> {
        self.pool.get(handle)
    }

    pub fn get_mut(&mut self, handle: EnemyHandle) -> Option<&mut Enemy> {
        self.pool.get_mut(handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EnemyHandle, &Enemy)> {
        self.pool.iter()
    }

    /// Removes the dead and those whose chunk is no longer active, then turns
    /// every other enemy toward the nearest observer it can see and fires at
    /// it once its cooldown allows. Returns how many were removed.
    pub fn update(
        &mut self,
        arena: &ChunkArena,
        registry: &BlockRegistry,
        observers: &[Observer],
        bullets: &mut BulletPool,
        dt: f32,
    ) -> usize {
        let mut removed = 0;
        for handle in self.pool.handles() {
            let Some(enemy) = self.pool.get_mut(handle) else {
                continue;
            };

            if enemy.is_dead() || arena.find_active(world_to_chunk(enemy.position)).is_none() {
                self.pool.release(handle);
                removed += 1;
                continue;
            }

            let Some(target) = nearest_visible(arena, registry, enemy.position, observers) else {
                continue;
            };
            enemy.focus_on(target);
            enemy.fire_cooldown += dt;
            if enemy.fire_cooldown >= ENEMY_RATE_OF_FIRE {
                enemy.fire_cooldown = 0.0;
                bullets.fire(enemy.position, enemy.forward, BulletOwner::Enemy);
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        for handle in self.pool.handles() {
            self.pool.release(handle);
        }
    }
}

fn nearest_visible(
    arena: &ChunkArena,
    registry: &BlockRegistry,
    from: Vec3,
    observers: &[Observer],
) -> Option<Vec3> {
    let range_squared = ENEMY_RANGE_OF_VIEW * ENEMY_RANGE_OF_VIEW;
    observers
        .iter()
        .filter(|observer| observer.is_alive())
        .map(|observer| observer.eye_position())
        .filter(|eye| eye.distance_squared(from) <= range_squared)
        .filter(|eye| raycast(arena, registry, from, *eye).is_none())
        .min_by(|a, b| a.distance_squared(from).total_cmp(&b.distance_squared(from)))
}

/// Picks a spot 64 to 96 blocks from a random observer, four blocks above
/// the ground. Early attempts only accept spots hidden from every observer;
/// later ones also settle for spots behind all of them.
pub fn find_spawn_position(
    arena: &ChunkArena,
    registry: &BlockRegistry,
    observers: &[Observer],
    rng: &mut fastrand::Rng,
) -> Option<Vec3> {
    if observers.is_empty() {
        return None;
    }
    let anchor = observers[rng.usize(..observers.len())].position.truncate();

    for attempt in 0..SPAWN_ATTEMPTS {
        let distance = rng.u32(SPAWN_MIN_DISTANCE..=SPAWN_MAX_DISTANCE) as f32;
        let spot = anchor + Vec2::from_angle(rng.f32() * TAU) * distance;
        let column = spot.floor().as_ivec2();
        let ground = match arena.column_height(registry, column.x, column.y) {
            Some(height) if height > 0 => height,
            _ => continue,
        };
        let candidate = spot.extend(ground as f32 + SPAWN_HEIGHT_ABOVE_GROUND);

        let behind_everyone = attempt > SPAWN_ATTEMPTS / 2
            && observers
                .iter()
                .all(|observer| (candidate - observer.position).dot(observer.look) < 0.0);
        let hidden_from_everyone = observers
            .iter()
            .all(|observer| raycast(arena, registry, candidate, observer.position).is_some());
        if behind_everyone || hidden_from_everyone {
            return Some(candidate);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use quarry_shared::block::{BlockRegistry, BlockType};
    use quarry_shared::chunk::ChunkProxy;
    use quarry_shared::coords::{local_to_index, ChunkPos, LocalPos};

    use super::{find_spawn_position, EnemyPool, ENEMY_RATE_OF_FIRE};
    use crate::arena::ChunkArena;
    use crate::bullet::{BulletOwner, BulletPool};
    use crate::chunk::{ChunkState, Direction};
    use crate::observer::Observer;

    const DT: f32 = 1.0 / 60.0;

    fn open_world() -> ChunkArena {
        let mut proxy = ChunkProxy::new(ChunkPos::new(0, 0));
        for z in 60..70u8 {
            proxy.set(LocalPos::new(8, 8, z), BlockType::STONE);
        }
        let mut arena = ChunkArena::new(1);
        let handle = arena.allocate(proxy.coords).expect("allocate");
        let chunk = arena.get_mut(handle).expect("live");
        chunk.populate_from(&proxy);
        chunk.set_state(ChunkState::Active);
        arena
    }

    #[test]
    fn spawning_stops_at_capacity() {
        let mut pool = EnemyPool::new(100);
        for i in 0..100 {
            assert!(pool.spawn(Vec3::new(i as f32, 0.0, 70.0)).is_some());
        }
        assert!(pool.spawn(Vec3::ZERO).is_none());
        assert_eq!(pool.len(), 100);
        pool.clear();
        assert!(pool.is_empty());
    }

    #[test]
    fn enemies_face_the_nearest_visible_observer() {
        let arena = open_world();
        let registry = BlockRegistry::default();
        let mut pool = EnemyPool::new(4);
        let enemy = pool.spawn(Vec3::new(4.5, 8.5, 64.5)).expect("spawn");

        // One observer hidden behind the pillar, one in the open but farther.
        let hidden = Observer::new(Vec3::new(11.5, 8.5, 64.5 - 0.69));
        let visible = Observer::new(Vec3::new(4.5, 1.0, 64.5 - 0.69));
        let mut bullets = BulletPool::new(4);
        pool.update(&arena, &registry, &[hidden, visible], &mut bullets, DT);

        let forward = pool.get(enemy).expect("alive").forward;
        assert!((forward - Vec3::NEG_Y).length() < 1e-4, "forward {forward}");
    }

    #[test]
    fn dead_and_stranded_enemies_are_removed() {
        let arena = open_world();
        let registry = BlockRegistry::default();
        let mut pool = EnemyPool::new(4);
        let dying = pool.spawn(Vec3::new(2.0, 2.0, 80.0)).expect("spawn");
        let stranded = pool.spawn(Vec3::new(-20.0, 2.0, 80.0)).expect("spawn");
        let healthy = pool.spawn(Vec3::new(3.0, 3.0, 80.0)).expect("spawn");

        for _ in 0..5 {
            pool.get_mut(dying).expect("alive").take_damage();
        }
        let mut bullets = BulletPool::new(4);
        assert_eq!(pool.update(&arena, &registry, &[], &mut bullets, DT), 2);
        assert!(pool.get(dying).is_none());
        assert!(pool.get(stranded).is_none());
        assert!(pool.get(healthy).is_some());
    }

    #[test]
    fn damage_stops_at_zero() {
        let mut pool = EnemyPool::new(1);
        let handle = pool.spawn(Vec3::new(2.0, 2.0, 80.0)).expect("spawn");
        let enemy = pool.get_mut(handle).expect("alive");
        for _ in 0..8 {
            enemy.take_damage();
        }
        assert_eq!(enemy.health(), 0);
        assert!(enemy.is_dead());
    }

    #[test]
    fn enemies_fire_only_at_visible_observers() {
        let arena = open_world();
        let registry = BlockRegistry::default();
        let mut pool = EnemyPool::new(4);
        pool.spawn(Vec3::new(4.5, 8.5, 64.5)).expect("spawn");
        let mut bullets = BulletPool::new(8);

        let hidden = Observer::new(Vec3::new(11.5, 8.5, 64.5 - 0.69));
        for _ in 0..60 {
            pool.update(&arena, &registry, &[hidden], &mut bullets, DT);
        }
        assert!(bullets.is_empty());

        let visible = Observer::new(Vec3::new(4.5, 1.0, 64.5 - 0.69));
        let ticks = (ENEMY_RATE_OF_FIRE / DT).ceil() as usize + 1;
        for _ in 0..ticks {
            pool.update(&arena, &registry, &[visible], &mut bullets, DT);
        }
        assert_eq!(bullets.len(), 1);
        let (_, bullet) = bullets.iter().next().expect("bullet");
        assert_eq!(bullet.owner(), BulletOwner::Enemy);
        assert!(bullet.velocity.y < 0.0);
    }

    /// A 13 by 13 square of linked chunks, stone up to z = 63.
    fn flat_plain() -> ChunkArena {
        let mut proxy = ChunkProxy::new(ChunkPos::new(0, 0));
        let surface = local_to_index(LocalPos::new(0, 0, 64));
        proxy.as_mut_slice()[..surface].fill(BlockType::STONE);

        let mut arena = ChunkArena::new(13 * 13);
        for y in -6..=6 {
            for x in -6..=6 {
                proxy.coords = ChunkPos::new(x, y);
                let handle = arena.allocate(proxy.coords).expect("allocate");
                let chunk = arena.get_mut(handle).expect("live");
                chunk.populate_from(&proxy);
                chunk.set_state(ChunkState::Active);
            }
        }
        for handle in arena.active_handles() {
            let coords = arena.get(handle).expect("live").coords();
            for direction in Direction::ALL {
                let neighbor = arena.find(coords + direction.offset());
                arena.get_mut(handle).expect("live").set_neighbor(direction, neighbor);
            }
        }
        arena
    }

    #[test]
    fn spawn_lands_above_ground_out_of_sight() {
        let arena = flat_plain();
        let registry = BlockRegistry::default();
        // Buried observers cannot see anything on the surface.
        let observer = Observer::new(Vec3::new(8.5, 8.5, 40.0));
        let mut rng = fastrand::Rng::with_seed(7);

        for _ in 0..8 {
            let spot = find_spawn_position(&arena, &registry, &[observer], &mut rng)
                .expect("spawn spot");
            let distance = (spot.truncate() - observer.position.truncate()).length();
            assert!((63.0..=97.0).contains(&distance), "distance {distance}");
            assert_eq!(spot.z, 67.0);
        }
    }

    #[test]
    fn spawn_needs_ground_and_observers() {
        let arena = open_world();
        let registry = BlockRegistry::default();
        let mut rng = fastrand::Rng::with_seed(7);
        assert!(find_spawn_position(&arena, &registry, &[], &mut rng).is_none());

        // Every candidate is at least 64 blocks away, outside the only chunk.
        let observer = Observer::new(Vec3::new(8.5, 8.5, 80.0));
        assert!(find_spawn_position(&arena, &registry, &[observer], &mut rng).is_none());
    }
}
