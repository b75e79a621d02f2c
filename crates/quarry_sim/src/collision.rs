use glam::Vec3;
use quarry_shared::block::BlockRegistry;
use quarry_shared::physics::{Axis, AABB};

use crate::arena::ChunkArena;
use crate::observer::{MoveIntent, Observer};
use crate::raycast::raycast;

/// Longest slice of time a single preventative pass integrates over.
pub const MAX_PHYSICS_STEP: f32 = 1.0 / 60.0;
const MAX_SWEEP_ITERATIONS: usize = 16;
const GROUND_CHECK_DEPTH: f32 = 0.01;

/// True when any of the four bottom corners rests on a solid block.
pub fn is_on_ground(arena: &ChunkArena, registry: &BlockRegistry, observer: &Observer) -> bool {
    observer.bounding_points()[..4].iter().any(|point| {
        let below = *point - Vec3::new(0.0, 0.0, GROUND_CHECK_DEPTH);
        arena
            .locate(below)
            .and_then(|locator| arena.block(locator))
            .is_some_and(|block| registry.is_solid(block.block_type))
    })
}

/// Pushes the observer out of whichever overlapping solid block needs the
/// smallest correction. Returns the applied offset.
pub fn apply_corrective(arena: &ChunkArena, registry: &BlockRegistry, observer: &mut Observer) -> Vec3 {
    let bounds = observer.bounding_box();
    let mut best: Option<(f32, Vec3)> = None;

    for cell in bounds.overlapped_blocks() {
        let solid = arena
            .locate_block(cell)
            .and_then(|locator| arena.block(locator))
            .is_some_and(|block| registry.is_solid(block.block_type));
        if !solid {
            continue;
        }

        let correction = bounds.shortest_correction(&AABB::block(cell));
        let distance = correction.abs().max_element();
        if distance > 0.0 && best.map_or(true, |(shortest, _)| distance < shortest) {
            best = Some((distance, correction));
        }
    }

    let correction = best.map_or(Vec3::ZERO, |(_, correction)| correction);
    observer.position += correction;
    correction
}

/// Sweeps the observer's bounding points along its velocity for `dt`,
/// stopping at the first solid face and sliding along the remaining axes.
pub fn apply_preventative(
    arena: &ChunkArena,
    registry: &BlockRegistry,
    observer: &mut Observer,
    dt: f32,
) {
    let mut left = dt;
    while left > 0.0 {
        let step = left.min(MAX_PHYSICS_STEP);
        left -= step;
        if !sweep(arena, registry, observer, step) {
            break;
        }
    }
}

/// One sub-step. Returns false once the observer has come to rest.
fn sweep(arena: &ChunkArena, registry: &BlockRegistry, observer: &mut Observer, step: f32) -> bool {
    let mut remaining = step;

    for _ in 0..MAX_SWEEP_ITERATIONS {
        if remaining <= 0.0 || observer.velocity == Vec3::ZERO {
            break;
        }

        let displacement = observer.velocity * remaining;
        let points = observer.bounding_points();
        let nearest = points
            .iter()
            .enumerate()
            .filter_map(|(index, point)| {
                raycast(arena, registry, *point, *point + displacement).map(|hit| (index, hit))
            })
            .min_by(|(_, a), (_, b)| a.fraction.total_cmp(&b.fraction));

        let Some((index, hit)) = nearest else {
            observer.position += displacement;
            return true;
        };

        let Some(face) = hit.face else {
            // A corner already sits inside a block; let the corrective pass
            // resolve it next tick.
            observer.velocity = Vec3::ZERO;
            return false;
        };

        observer.position += hit.position - points[index];
        match face.axis() {
            Axis::X => observer.velocity.x = 0.0,
            Axis::Y => observer.velocity.y = 0.0,
            Axis::Z => observer.velocity.z = 0.0,
        }
        remaining -= remaining * hit.fraction;
    }

    observer.velocity != Vec3::ZERO
}

/// Full per-tick movement for one observer: input, then corrective and
/// preventative collision unless it is in no-clip.
pub fn step_observer(
    arena: &ChunkArena,
    registry: &BlockRegistry,
    observer: &mut Observer,
    intent: &MoveIntent,
    dt: f32,
) {
    let on_ground = is_on_ground(arena, registry, observer);
    observer.apply_intent(intent, dt, on_ground);

    if observer.physics_mode.collides() {
        apply_corrective(arena, registry, observer);
        apply_preventative(arena, registry, observer, dt);
    }
    observer.clamp_height();
}
