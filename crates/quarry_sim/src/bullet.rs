use glam::{IVec3, Vec3};
use quarry_shared::block::BlockRegistry;
use quarry_shared::physics::AABB;

use crate::arena::ChunkArena;
use crate::enemy::{EnemyHandle, EnemyPool};
use crate::observer::Observer;
use crate::pool::{PoolHandle, SlotPool};
use crate::raycast::raycast;

pub type BulletHandle = PoolHandle;

pub const BULLET_SPEED: f32 = 32.0;
/// Seconds a bullet flies before it is discarded.
pub const BULLET_LIFETIME: f32 = 1.0;
pub const BULLET_HALF_EXTENT: f32 = 0.05;
pub const MAX_BULLETS: usize = 512;

/// Who fired a bullet. Observer shots only hurt enemies and enemy shots only
/// hurt observers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BulletOwner {
    Observer,
    Enemy,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bullet {
    pub position: Vec3,
    pub velocity: Vec3,
    owner: BulletOwner,
    age: f32,
}

impl Bullet {
    fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            owner: BulletOwner::Enemy,
            age: 0.0,
        }
    }

    pub fn owner(&self) -> BulletOwner {
        self.owner
    }

    pub fn age(&self) -> f32 {
        self.age
    }

    pub fn bounding_box(&self) -> AABB {
        AABB::from_centre(self.position, Vec3::splat(BULLET_HALF_EXTENT))
    }
}

/// What a bullet struck on its last step.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BulletImpact {
    Observer(usize),
    Enemy(EnemyHandle),
    Block(IVec3),
}

pub struct BulletPool {
    pool: SlotPool<Bullet>,
}

impl BulletPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            pool: SlotPool::new(capacity, Bullet::new),
        }
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn get(&self, handle: BulletHandle) -> Option<&Bullet> {
        self.pool.get(handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BulletHandle, &Bullet)> {
        self.pool.iter()
    }

    /// Launches a bullet from `origin`. Refused when the pool is full or the
    /// direction is degenerate.
    pub fn fire(&mut self, origin: Vec3, direction: Vec3, owner: BulletOwner) -> Option<BulletHandle> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return None;
        }
        let (handle, bullet) = self.pool.allocate()?;
        *bullet = Bullet {
            position: origin,
            velocity: direction * BULLET_SPEED,
            owner,
            age: 0.0,
        };
        Some(handle)
    }

    /// Moves every bullet one step and resolves what it hit. Struck observers
    /// and enemies take one point of damage. Bullets that hit something, grow
    /// too old or leave the active world are removed.
    pub fn update(
        &mut self,
        arena: &ChunkArena,
        registry: &BlockRegistry,
        observers: &mut [Observer],
        enemies: &mut EnemyPool,
        dt: f32,
    ) -> Vec<BulletImpact> {
        let mut impacts = Vec::new();

        for handle in self.pool.handles() {
            let Some(bullet) = self.pool.get_mut(handle) else {
                continue;
            };
            let from = bullet.position;
            bullet.position += bullet.velocity * dt;
            bullet.age += dt;
            let bullet = *bullet;

            if bullet.age >= BULLET_LIFETIME {
                self.pool.release(handle);
                continue;
            }

            let bounds = bullet.bounding_box();
            let impact = match bullet.owner {
                BulletOwner::Enemy => strike_observer(observers, &bounds),
                BulletOwner::Observer => strike_enemy(enemies, &bounds),
            }
            .or_else(|| strike_block(arena, registry, from, bullet.position));

            match impact {
                Some(impact) => {
                    impacts.push(impact);
                    self.pool.release(handle);
                }
                None if arena.locate(bullet.position).is_none() => {
                    self.pool.release(handle);
                }
                None => {}
            }
        }

        impacts
    }

    pub fn clear(&mut self) {
        for handle in self.pool.handles() {
            self.pool.release(handle);
        }
    }
}

fn strike_observer(observers: &mut [Observer], bounds: &AABB) -> Option<BulletImpact> {
    let (index, observer) = observers
        .iter_mut()
        .enumerate()
        .find(|(_, observer)| observer.bounding_box().intersects(bounds))?;
    observer.take_damage();
    Some(BulletImpact::Observer(index))
}

fn strike_enemy(enemies: &mut EnemyPool, bounds: &AABB) -> Option<BulletImpact> {
    let handle = enemies
        .iter()
        .find(|(_, enemy)| enemy.bounding_box().intersects(bounds))
        .map(|(handle, _)| handle)?;
    enemies.get_mut(handle)?.take_damage();
    Some(BulletImpact::Enemy(handle))
}

fn strike_block(arena: &ChunkArena, registry: &BlockRegistry, from: Vec3, to: Vec3) -> Option<BulletImpact> {
    let hit = raycast(arena, registry, from, to)?;
    hit.block.world_position(arena).map(BulletImpact::Block)
}
