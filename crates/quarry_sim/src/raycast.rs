use glam::Vec3;
use quarry_shared::block::BlockRegistry;
use quarry_shared::coords::world_to_chunk;
use quarry_shared::physics::{Face, SegmentTraversal};

use crate::arena::ChunkArena;
use crate::locator::BlockLocator;

/// Hit positions are nudged this far off the struck face so they land in the
/// open cell rather than on the boundary.
pub const RAYCAST_SURFACE_OFFSET: f32 = 0.005;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RaycastHit {
    pub position: Vec3,
    /// Face of the struck block the ray entered through. `None` when the ray
    /// started inside a solid block.
    pub face: Option<Face>,
    /// How far along `start..end` the hit happened, in `[0, 1]`.
    pub fraction: f32,
    pub block: BlockLocator,
    /// The open cell the ray was in just before the hit.
    pub previous: BlockLocator,
}

/// First solid block along the segment `start..end`. Stops with no hit at the
/// edge of the active world.
pub fn raycast(
    arena: &ChunkArena,
    registry: &BlockRegistry,
    start: Vec3,
    end: Vec3,
) -> Option<RaycastHit> {
    let start_locator = arena.locate(start)?;
    arena.find_active(world_to_chunk(end))?;

    let start_block = arena.block(start_locator)?;
    if registry.is_solid(start_block.block_type) {
        return Some(RaycastHit {
            position: start,
            face: None,
            fraction: 0.0,
            block: start_locator,
            previous: start_locator,
        });
    }

    if start == end {
        return None;
    }

    let displacement = end - start;
    let mut current = start_locator;
    for crossing in SegmentTraversal::new(start, displacement) {
        let previous = current;
        current = current.neighbor(arena, Face::from_axis(crossing.axis, crossing.step))?;

        let block = arena.block(current)?;
        if registry.is_solid(block.block_type) {
            let face = crossing.entry_face();
            return Some(RaycastHit {
                position: start
                    + displacement * crossing.fraction
                    + face.normal() * RAYCAST_SURFACE_OFFSET,
                face: Some(face),
                fraction: crossing.fraction,
                block: current,
                previous,
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use glam::{IVec3, Vec3};
    use quarry_shared::block::{BlockRegistry, BlockType};
    use quarry_shared::chunk::ChunkProxy;
    use quarry_shared::coords::{ChunkPos, LocalPos};
    use quarry_shared::physics::Face;

    use super::{raycast, RAYCAST_SURFACE_OFFSET};
    use crate::arena::ChunkArena;
    use crate::chunk::ChunkState;

    /// One active chunk at the origin: stone floor up to z=63, air above.
    fn floor_world() -> ChunkArena {
        let mut proxy = ChunkProxy::new(ChunkPos::new(0, 0));
        for y in 0..16u8 {
            for x in 0..16u8 {
                for z in 0..64u8 {
                    proxy.set(LocalPos::new(x, y, z), BlockType::STONE);
                }
            }
        }
        proxy.set(LocalPos::new(10, 4, 66), BlockType::WATER);
        proxy.set(LocalPos::new(12, 4, 66), BlockType::DIRT);

        let mut arena = ChunkArena::new(2);
        let handle = arena.allocate(proxy.coords).expect("allocate");
        let chunk = arena.get_mut(handle).expect("live");
        chunk.populate_from(&proxy);
        chunk.set_state(ChunkState::Active);
        arena
    }

    #[test]
    fn downward_ray_hits_top_face_of_floor() {
        let arena = floor_world();
        let registry = BlockRegistry::default();
        let start = Vec3::new(4.5, 4.5, 70.5);
        let end = Vec3::new(4.5, 4.5, 60.5);

        let hit = raycast(&arena, &registry, start, end).expect("hit floor");
        assert_eq!(hit.face, Some(Face::PosZ));
        assert!((hit.fraction - 0.65).abs() < 1e-5);
        assert!((hit.position.z - (64.0 + RAYCAST_SURFACE_OFFSET)).abs() < 1e-4);
        assert_eq!(hit.block.world_position(&arena), Some(IVec3::new(4, 4, 63)));
        assert_eq!(hit.previous.world_position(&arena), Some(IVec3::new(4, 4, 64)));
    }

    #[test]
    fn ray_passes_through_water_and_stops_at_dirt() {
        let arena = floor_world();
        let registry = BlockRegistry::default();
        let hit = raycast(
            &arena,
            &registry,
            Vec3::new(8.5, 4.5, 66.5),
            Vec3::new(14.5, 4.5, 66.5),
        )
        .expect("hit dirt");
        assert_eq!(hit.face, Some(Face::NegX));
        assert_eq!(hit.block.world_position(&arena), Some(IVec3::new(12, 4, 66)));
        assert_eq!(hit.previous.world_position(&arena), Some(IVec3::new(11, 4, 66)));
        assert!(hit.position.x < 12.0);
    }

    #[test]
    fn ray_starting_inside_solid_hits_immediately() {
        let arena = floor_world();
        let registry = BlockRegistry::default();
        let start = Vec3::new(3.2, 3.2, 30.0);
        let hit = raycast(&arena, &registry, start, Vec3::new(3.2, 3.2, 90.0)).expect("hit");
        assert_eq!(hit.fraction, 0.0);
        assert_eq!(hit.face, None);
        assert_eq!(hit.block, hit.previous);
        assert_eq!(hit.position, start);
    }

    #[test]
    fn degenerate_and_open_rays_miss() {
        let arena = floor_world();
        let registry = BlockRegistry::default();
        let point = Vec3::new(5.5, 5.5, 80.0);
        assert!(raycast(&arena, &registry, point, point).is_none());
        assert!(raycast(&arena, &registry, point, Vec3::new(9.5, 2.5, 100.0)).is_none());
    }

    #[test]
    fn ray_leaving_the_loaded_world_misses() {
        let arena = floor_world();
        let registry = BlockRegistry::default();
        let start = Vec3::new(8.0, 8.0, 80.0);
        assert!(raycast(&arena, &registry, start, Vec3::new(40.0, 8.0, 80.0)).is_none());
        assert!(raycast(&arena, &registry, Vec3::new(-3.0, 8.0, 80.0), start).is_none());
        // End inside the world but the path climbs out of it.
        assert!(raycast(&arena, &registry, start, Vec3::new(8.0, 8.0, 200.0)).is_none());
    }
}
