use std::collections::VecDeque;

use quarry_shared::block::{BlockRegistry, MAX_LIGHT_LEVEL, SKY_LIGHT_LEVEL};
use quarry_shared::coords::{
    is_east_edge, is_horizontal_edge, is_north_edge, is_south_edge, is_top_layer, is_west_edge,
    BLOCKS_PER_LAYER, CHUNK_HEIGHT, CHUNK_VOLUME,
};
use quarry_shared::physics::Face;

use crate::arena::{ChunkArena, ChunkHandle};
use crate::chunk::Direction;
use crate::locator::BlockLocator;

const HORIZONTAL_FACES: [Face; 4] = [Face::PosX, Face::NegX, Face::PosY, Face::NegY];

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LightingStats {
    pub processed: usize,
    pub changed: usize,
}

/// Flood-fill light propagation over the active chunks. A block is queued at
/// most once at a time; its dirty flag doubles as the "already queued" mark.
#[derive(Default)]
pub struct LightingSolver {
    queue: VecDeque<BlockLocator>,
}

impl LightingSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queues `locator` unless it is already waiting. Returns whether it was
    /// newly queued.
    pub fn mark_dirty(&mut self, arena: &mut ChunkArena, locator: BlockLocator) -> bool {
        let Some(block) = arena.block_mut(locator) else {
            return false;
        };
        if block.is_lighting_dirty() {
            return false;
        }
        block.set_lighting_dirty(true);
        self.queue.push_back(locator);
        true
    }

    /// Initial lighting for a freshly populated chunk: sky columns, the
    /// boundary between sky and shade, light sources, and both sides of every
    /// chunk edge.
    pub fn seed_chunk(&mut self, arena: &mut ChunkArena, registry: &BlockRegistry, handle: ChunkHandle) {
        let Some(chunk) = arena.get_mut(handle) else {
            return;
        };

        let mut sky_cells = Vec::new();
        for column in 0..BLOCKS_PER_LAYER {
            for z in (0..CHUNK_HEIGHT).rev() {
                let index = column | (z * BLOCKS_PER_LAYER);
                if registry.is_opaque(chunk.block_type(index)) {
                    break;
                }
                let block = chunk.block_mut(index);
                block.set_sky(true);
                block.set_light(SKY_LIGHT_LEVEL);
                sky_cells.push(index);
            }
        }
        chunk.mark_modified();

        for &index in &sky_cells {
            let sky = BlockLocator::new(handle, index);
            for face in HORIZONTAL_FACES {
                let Some(beside) = sky.neighbor(arena, face) else {
                    continue;
                };
                let Some(block) = arena.block(beside) else {
                    continue;
                };
                if !block.is_sky() && !registry.is_opaque(block.block_type) {
                    self.mark_dirty(arena, beside);
                }
            }
        }

        for index in 0..CHUNK_VOLUME {
            let locator = BlockLocator::new(handle, index);
            let Some(block) = arena.block(locator) else {
                return;
            };
            let block_type = block.block_type;
            let edge_and_clear = is_horizontal_edge(index) && !registry.is_opaque(block_type);
            if registry.illumination(block_type) > 0 || edge_and_clear {
                self.mark_dirty(arena, locator);
            }
            if !is_horizontal_edge(index) {
                continue;
            }
            for face in HORIZONTAL_FACES {
                let Some(across) = locator.neighbor(arena, face) else {
                    continue;
                };
                if across.chunk == handle {
                    continue;
                }
                let clear = arena
                    .block(across)
                    .is_some_and(|b| !registry.is_opaque(b.block_type));
                if clear {
                    self.mark_dirty(arena, across);
                }
            }
        }
    }

    /// Drains the queue until every queued block holds its ideal light.
    pub fn update(&mut self, arena: &mut ChunkArena, registry: &BlockRegistry) -> LightingStats {
        let mut stats = LightingStats::default();

        while let Some(locator) = self.queue.pop_front() {
            let Some(block) = arena.block_mut(locator) else {
                continue;
            };
            block.set_lighting_dirty(false);
            let current = block.light();
            stats.processed += 1;

            let ideal = ideal_light(arena, registry, locator);
            if ideal != current {
                if let Some(chunk) = arena.get_mut(locator.chunk) {
                    chunk.block_mut(locator.index()).set_light(ideal);
                    chunk.mark_modified();
                }
                stats.changed += 1;

                for face in Face::ALL {
                    let Some(next) = locator.neighbor(arena, face) else {
                        continue;
                    };
                    let clear = arena
                        .block(next)
                        .is_some_and(|b| !registry.is_opaque(b.block_type));
                    if clear {
                        self.mark_dirty(arena, next);
                    }
                }
            }

            mark_edge_neighbors_modified(arena, locator);
        }

        stats
    }

    /// Call before an opaque type is written into `locator`. Cuts the sky
    /// column below the cell.
    pub fn prepare_place(&mut self, arena: &mut ChunkArena, registry: &BlockRegistry, locator: BlockLocator) {
        let Some(block) = arena.block(locator) else {
            return;
        };
        if block.is_sky() {
            self.walk_column_down(arena, registry, locator, false);
        } else {
            self.mark_dirty(arena, locator);
        }
        mark_edge_neighbors_modified(arena, locator);
    }

    /// Call after a cell has been cleared. Reopens the sky column below it
    /// when the block above sees the sky.
    pub fn after_dig(&mut self, arena: &mut ChunkArena, registry: &BlockRegistry, locator: BlockLocator) {
        let above_is_sky = match locator.neighbor(arena, Face::PosZ) {
            Some(above) => arena.block(above).is_some_and(|b| b.is_sky()),
            None => is_top_layer(locator.index()),
        };
        if above_is_sky {
            self.walk_column_down(arena, registry, locator, true);
        } else {
            self.mark_dirty(arena, locator);
        }
        mark_edge_neighbors_modified(arena, locator);
    }

    /// Requeues the clear blocks along the `direction` edge of `handle` after
    /// the chunk on that side went away.
    pub fn neighbor_unlinked(
        &mut self,
        arena: &mut ChunkArena,
        registry: &BlockRegistry,
        handle: ChunkHandle,
        direction: Direction,
    ) {
        for index in (0..CHUNK_VOLUME).filter(|&index| on_edge(index, direction)) {
            let locator = BlockLocator::new(handle, index);
            let clear = arena
                .block(locator)
                .is_some_and(|b| !registry.is_opaque(b.block_type));
            if clear {
                self.mark_dirty(arena, locator);
            }
        }
    }

    fn walk_column_down(
        &mut self,
        arena: &mut ChunkArena,
        registry: &BlockRegistry,
        start: BlockLocator,
        sky: bool,
    ) {
        let mut cursor = Some(start);
        while let Some(locator) = cursor {
            let Some(block) = arena.block_mut(locator) else {
                break;
            };
            if registry.is_opaque(block.block_type) {
                break;
            }
            block.set_sky(sky);
            self.mark_dirty(arena, locator);
            cursor = locator.neighbor(arena, Face::NegZ);
        }
    }
}

/// Light a block should hold given its type, sky exposure and current
/// neighbours.
pub fn ideal_light(arena: &ChunkArena, registry: &BlockRegistry, locator: BlockLocator) -> u8 {
    let Some(block) = arena.block(locator) else {
        return 0;
    };
    let illumination = registry.illumination(block.block_type).min(MAX_LIGHT_LEVEL);
    if registry.is_opaque(block.block_type) {
        return illumination;
    }

    let mut ideal = illumination;
    if block.is_sky() {
        ideal = ideal.max(SKY_LIGHT_LEVEL);
    }
    for face in Face::ALL {
        let neighbor_light = locator
            .neighbor(arena, face)
            .and_then(|next| arena.block(next))
            .map_or(0, |b| b.light());
        ideal = ideal.max(neighbor_light.saturating_sub(1));
    }
    ideal
}

fn on_edge(index: usize, direction: Direction) -> bool {
    match direction {
        Direction::East => is_east_edge(index),
        Direction::West => is_west_edge(index),
        Direction::North => is_north_edge(index),
        Direction::South => is_south_edge(index),
    }
}

/// Meshes on both sides of a chunk edge sample each other's light.
fn mark_edge_neighbors_modified(arena: &mut ChunkArena, locator: BlockLocator) {
    let index = locator.index();
    if !is_horizontal_edge(index) {
        return;
    }
    let Some(chunk) = arena.get(locator.chunk) else {
        return;
    };
    let neighbors: Vec<ChunkHandle> = Direction::ALL
        .into_iter()
        .filter(|&direction| on_edge(index, direction))
        .filter_map(|direction| chunk.neighbor(direction))
        .collect();
    for neighbor in neighbors {
        if let Some(chunk) = arena.get_mut(neighbor) {
            chunk.mark_modified();
        }
    }
}

#[cfg(test)]
mod tests {
    use quarry_shared::block::{BlockRegistry, BlockType};
    use quarry_shared::chunk::ChunkProxy;
    use quarry_shared::coords::{local_to_index, ChunkPos, LocalPos, CHUNK_VOLUME};

    use super::{ideal_light, LightingSolver};
    use crate::arena::{ChunkArena, ChunkHandle};
    use crate::chunk::{ChunkState, Direction};
    use crate::locator::BlockLocator;

    fn install(arena: &mut ChunkArena, proxy: &ChunkProxy) -> ChunkHandle {
        let handle = arena.allocate(proxy.coords).expect("allocate");
        let chunk = arena.get_mut(handle).expect("live");
        chunk.populate_from(proxy);
        chunk.set_state(ChunkState::Active);
        handle
    }

    fn at(handle: ChunkHandle, x: u8, y: u8, z: u8) -> BlockLocator {
        BlockLocator::new(handle, local_to_index(LocalPos::new(x, y, z)))
    }

    fn light_up(
        solver: &mut LightingSolver,
        arena: &mut ChunkArena,
        registry: &BlockRegistry,
        handle: ChunkHandle,
    ) {
        solver.seed_chunk(arena, registry, handle);
        solver.update(arena, registry);
        assert!(solver.is_idle());
    }

    fn assert_converged(arena: &ChunkArena, registry: &BlockRegistry, handle: ChunkHandle) {
        for index in 0..CHUNK_VOLUME {
            let locator = BlockLocator::new(handle, index);
            let block = arena.block(locator).expect("block");
            assert_eq!(
                block.light(),
                ideal_light(arena, registry, locator),
                "block {index} not at fixed point"
            );
            assert!(!block.is_lighting_dirty());
        }
    }

    #[test]
    fn empty_chunk_is_fully_sky_lit() {
        let registry = BlockRegistry::default();
        let mut arena = ChunkArena::new(1);
        let mut solver = LightingSolver::new();
        let handle = install(&mut arena, &ChunkProxy::new(ChunkPos::new(0, 0)));
        light_up(&mut solver, &mut arena, &registry, handle);

        let chunk = arena.get(handle).expect("chunk");
        assert!(chunk.is_modified());
        for block in chunk.blocks() {
            assert!(block.is_sky());
            assert_eq!(block.light(), 15);
        }
    }

    #[test]
    fn light_leaks_under_an_overhang_and_falls_off() {
        let registry = BlockRegistry::default();
        let mut arena = ChunkArena::new(1);
        let mut solver = LightingSolver::new();

        // Stone ground up to z=9, with a stone roof over x < 8 at z=20.
        let mut proxy = ChunkProxy::new(ChunkPos::new(0, 0));
        for y in 0..16u8 {
            for x in 0..16u8 {
                for z in 0..10u8 {
                    proxy.set(LocalPos::new(x, y, z), BlockType::STONE);
                }
                if x < 8 {
                    proxy.set(LocalPos::new(x, y, 20), BlockType::STONE);
                }
            }
        }
        let handle = install(&mut arena, &proxy);
        light_up(&mut solver, &mut arena, &registry, handle);

        let open = arena.block(at(handle, 8, 4, 15)).expect("block");
        assert!(open.is_sky());
        assert_eq!(open.light(), 15);

        let shaded = arena.block(at(handle, 7, 4, 15)).expect("block");
        assert!(!shaded.is_sky());
        assert_eq!(shaded.light(), 14);
        assert_eq!(arena.block(at(handle, 3, 4, 15)).expect("block").light(), 10);
        assert_eq!(arena.block(at(handle, 3, 4, 5)).expect("block").light(), 0);

        assert_converged(&arena, &registry, handle);
    }

    #[test]
    fn glowstone_lights_a_sealed_cave() {
        let registry = BlockRegistry::default();
        let mut arena = ChunkArena::new(1);
        let mut solver = LightingSolver::new();

        let mut proxy = ChunkProxy::new_filled(ChunkPos::new(0, 0), BlockType::STONE);
        for x in 4..12u8 {
            proxy.set(LocalPos::new(x, 8, 40), BlockType::AIR);
        }
        proxy.set(LocalPos::new(4, 8, 40), BlockType::GLOWSTONE);
        let handle = install(&mut arena, &proxy);
        light_up(&mut solver, &mut arena, &registry, handle);

        assert_eq!(arena.block(at(handle, 4, 8, 40)).expect("block").light(), 12);
        assert_eq!(arena.block(at(handle, 5, 8, 40)).expect("block").light(), 11);
        assert_eq!(arena.block(at(handle, 11, 8, 40)).expect("block").light(), 5);
        assert!(!arena.block(at(handle, 11, 8, 40)).expect("block").is_sky());
        assert_converged(&arena, &registry, handle);
    }

    #[test]
    fn digging_the_cap_of_a_column_opens_it_to_the_sky() {
        let registry = BlockRegistry::default();
        let mut arena = ChunkArena::new(1);
        let mut solver = LightingSolver::new();

        let mut proxy = ChunkProxy::new(ChunkPos::new(0, 0));
        proxy.set(LocalPos::new(6, 6, 100), BlockType::STONE);
        let handle = install(&mut arena, &proxy);
        light_up(&mut solver, &mut arena, &registry, handle);

        let below = at(handle, 6, 6, 50);
        assert!(!arena.block(below).expect("block").is_sky());
        assert_eq!(arena.block(below).expect("block").light(), 14);

        let cap = at(handle, 6, 6, 100);
        arena.block_mut(cap).expect("cap").block_type = BlockType::AIR;
        solver.after_dig(&mut arena, &registry, cap);
        solver.update(&mut arena, &registry);

        for z in 0..=100u8 {
            let block = arena.block(at(handle, 6, 6, z)).expect("block");
            assert!(block.is_sky(), "z={z} should see the sky");
            assert_eq!(block.light(), 15);
        }
        assert_converged(&arena, &registry, handle);
    }

    #[test]
    fn placing_into_a_lit_shaft_cuts_the_sky_below() {
        let registry = BlockRegistry::default();
        let mut arena = ChunkArena::new(1);
        let mut solver = LightingSolver::new();

        // Solid stone to z=64, two open shafts joined by a tunnel at z=60.
        let mut proxy = ChunkProxy::new(ChunkPos::new(0, 0));
        for y in 0..16u8 {
            for x in 0..16u8 {
                for z in 0..=64u8 {
                    proxy.set(LocalPos::new(x, y, z), BlockType::STONE);
                }
            }
        }
        for z in 50..=64u8 {
            proxy.set(LocalPos::new(8, 8, z), BlockType::AIR);
            proxy.set(LocalPos::new(14, 8, z), BlockType::AIR);
        }
        for x in 9..14u8 {
            proxy.set(LocalPos::new(x, 8, 60), BlockType::AIR);
        }
        let handle = install(&mut arena, &proxy);
        light_up(&mut solver, &mut arena, &registry, handle);
        assert_eq!(arena.block(at(handle, 8, 8, 55)).expect("block").light(), 15);

        let target = at(handle, 8, 8, 64);
        solver.prepare_place(&mut arena, &registry, target);
        arena.block_mut(target).expect("target").block_type = BlockType::STONE;
        solver.update(&mut arena, &registry);

        assert_eq!(arena.block(target).expect("block").light(), 0);
        for z in 50..64u8 {
            assert!(!arena.block(at(handle, 8, 8, z)).expect("block").is_sky());
        }
        // Fed sideways through the tunnel from the other shaft.
        assert_eq!(arena.block(at(handle, 9, 8, 60)).expect("block").light(), 10);
        assert_eq!(arena.block(at(handle, 8, 8, 60)).expect("block").light(), 9);
        assert_eq!(arena.block(at(handle, 8, 8, 63)).expect("block").light(), 6);
        assert_eq!(arena.block(at(handle, 8, 8, 50)).expect("block").light(), 0);
        assert_converged(&arena, &registry, handle);
    }

    #[test]
    fn light_crosses_linked_chunk_edges() {
        let registry = BlockRegistry::default();
        let mut arena = ChunkArena::new(2);
        let mut solver = LightingSolver::new();

        // West chunk: sealed except an open tunnel running to its east edge.
        let mut west_proxy = ChunkProxy::new_filled(ChunkPos::new(0, 0), BlockType::STONE);
        for x in 0..16u8 {
            west_proxy.set(LocalPos::new(x, 3, 30), BlockType::AIR);
        }
        let west = install(&mut arena, &west_proxy);
        light_up(&mut solver, &mut arena, &registry, west);
        assert_eq!(arena.block(at(west, 15, 3, 30)).expect("block").light(), 0);

        // East chunk is open sky. Link, then seed it as the world does.
        let east = install(&mut arena, &ChunkProxy::new(ChunkPos::new(1, 0)));
        arena
            .get_mut(west)
            .expect("west")
            .set_neighbor(Direction::East, Some(east));
        arena
            .get_mut(east)
            .expect("east")
            .set_neighbor(Direction::West, Some(west));
        arena.get_mut(west).expect("west").clear_modified();
        light_up(&mut solver, &mut arena, &registry, east);

        assert_eq!(arena.block(at(west, 15, 3, 30)).expect("block").light(), 14);
        assert_eq!(arena.block(at(west, 0, 3, 30)).expect("block").light(), 0);
        assert!(arena.get(west).expect("west").is_modified());

        // Unlink and let the tunnel go dark again.
        arena
            .get_mut(west)
            .expect("west")
            .set_neighbor(Direction::East, None);
        solver.neighbor_unlinked(&mut arena, &registry, west, Direction::East);
        solver.update(&mut arena, &registry);
        assert_eq!(arena.block(at(west, 15, 3, 30)).expect("block").light(), 0);
        assert_converged(&arena, &registry, west);
    }

    #[test]
    fn settled_world_does_not_change_on_rerun() {
        let registry = BlockRegistry::default();
        let mut arena = ChunkArena::new(1);
        let mut solver = LightingSolver::new();

        let mut proxy = ChunkProxy::new(ChunkPos::new(2, 2));
        quarry_shared::worldgen::WorldGenerator::new(5).populate(&mut proxy);
        let handle = install(&mut arena, &proxy);
        light_up(&mut solver, &mut arena, &registry, handle);

        for index in (0..CHUNK_VOLUME).step_by(7) {
            solver.mark_dirty(&mut arena, BlockLocator::new(handle, index));
        }
        let stats = solver.update(&mut arena, &registry);
        assert!(stats.processed > 0);
        assert_eq!(stats.changed, 0);
    }
}
