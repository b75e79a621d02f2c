use std::io;
use std::mem;
use std::sync::Arc;

use glam::{IVec3, Vec2, Vec3};
use quarry_core::events::{self, EventReceiver, EventSender};
use quarry_persist::chunk_store::ChunkStore;
use quarry_persist::observer_save::{load_observers, save_observers, OBSERVER_SAVE_FILE};
use quarry_shared::block::{Block, BlockRegistry, BlockType, SoundId};
use quarry_shared::chunk::ChunkProxy;
use quarry_shared::coords::{chunk_centre, world_to_chunk, ChunkPos};
use quarry_shared::physics::{Face, AABB};
use quarry_shared::worldgen::WorldGenerator;
use tracing::{debug, info, warn};

use crate::arena::{ChunkArena, ChunkHandle};
use crate::bullet::{BulletImpact, BulletOwner, BulletPool, MAX_BULLETS};
use crate::chunk::{ChunkState, Direction};
use crate::collision;
use crate::config::WorldConfig;
use crate::enemy::{find_spawn_position, EnemyPool, ENEMY_SPAWN_INTERVAL};
use crate::error::{EditError, StreamError};
use crate::lighting::{LightingSolver, LightingStats};
use crate::locator::BlockLocator;
use crate::observer::{MoveIntent, Observer, PhysicsMode, OBSERVER_HALF_EXTENTS};
use crate::raycast::{raycast, RaycastHit};
use crate::streaming::StreamingPipeline;

/// Notifications for whatever sits on top of the simulation: mesh builders,
/// audio, UI.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    ChunkActivated(ChunkPos),
    ChunkDeactivated(ChunkPos),
    BlockPlaced {
        position: IVec3,
        block_type: BlockType,
        sound: Option<SoundId>,
    },
    BlockDug {
        position: IVec3,
        block_type: BlockType,
        sound: Option<SoundId>,
    },
    EnemySpawned(Vec3),
    EnemyKilled(Vec3),
    ObserverKilled(usize),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickStats {
    pub requested: Option<ChunkPos>,
    pub installed: usize,
    pub deactivated: Option<ChunkPos>,
    pub lighting: LightingStats,
    pub enemy_spawned: bool,
    pub enemies_removed: usize,
    pub bullet_impacts: usize,
}

pub struct World {
    config: WorldConfig,
    registry: Arc<BlockRegistry>,
    arena: ChunkArena,
    lighting: LightingSolver,
    streaming: StreamingPipeline,
    observers: Vec<Observer>,
    enemies: EnemyPool,
    bullets: BulletPool,
    enemy_spawn_timer: f32,
    rng: fastrand::Rng,
    events: EventSender<WorldEvent>,
    event_receiver: Option<EventReceiver<WorldEvent>>,
    populated: Vec<ChunkProxy>,
    stream_backpressure: bool,
    tick_count: u64,
}

impl World {
    /// Opens (or creates) the save directory, starts the streaming worker and
    /// restores any saved observers.
    pub fn new(config: WorldConfig, registry: Arc<BlockRegistry>) -> io::Result<Self> {
        let config = config.sanitize();
        let store = ChunkStore::open(&config.save_dir)?;

        let observers = match load_observers(&config.save_dir.join(OBSERVER_SAVE_FILE)) {
            Ok(Some(saved)) => saved.iter().map(Observer::from_saved).collect(),
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!("Ignoring unreadable observer save: {err}");
                Vec::new()
            }
        };

        let streaming = StreamingPipeline::start(
            store,
            WorldGenerator::new(config.seed),
            config.handoff_capacity,
            config.generation_threads,
        )?;
        let (events, event_receiver) = events::channel();

        info!(
            "World opened at {} (seed {}, {} chunk slots, {} observer(s) restored)",
            config.save_dir.display(),
            config.seed,
            config.max_chunks,
            observers.len()
        );

        Ok(Self {
            arena: ChunkArena::new(config.max_chunks),
            enemies: EnemyPool::new(config.max_enemies),
            bullets: BulletPool::new(MAX_BULLETS),
            enemy_spawn_timer: 0.0,
            rng: fastrand::Rng::with_seed(config.seed),
            config,
            registry,
            lighting: LightingSolver::new(),
            streaming,
            observers,
            events,
            event_receiver: Some(event_receiver),
            populated: Vec::new(),
            stream_backpressure: false,
            tick_count: 0,
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn arena(&self) -> &ChunkArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut ChunkArena {
        &mut self.arena
    }

    pub fn enemies(&self) -> &EnemyPool {
        &self.enemies
    }

    pub fn bullets(&self) -> &BulletPool {
        &self.bullets
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn pending_lighting(&self) -> usize {
        self.lighting.pending()
    }

    /// Hands out the receiving end of the event channel. Only the first
    /// caller gets it.
    pub fn take_event_receiver(&mut self) -> Option<EventReceiver<WorldEvent>> {
        self.event_receiver.take()
    }

    pub fn observers(&self) -> &[Observer] {
        &self.observers
    }

    pub fn observer_mut(&mut self, index: usize) -> Option<&mut Observer> {
        self.observers.get_mut(index)
    }

    pub fn add_observer(&mut self, observer: Observer) -> usize {
        self.observers.push(observer);
        self.observers.len() - 1
    }

    pub fn is_chunk_active(&self, coords: ChunkPos) -> bool {
        self.arena.find_active(coords).is_some()
    }

    /// One simulation step of `dt` seconds for the world itself. Observer
    /// movement is driven separately through [`World::step_observer`].
    pub fn tick(&mut self, dt: f32) -> TickStats {
        let mut stats = TickStats::default();

        match self.activate_nearest_missing_chunk() {
            Ok(requested) => {
                stats.requested = requested;
                self.stream_backpressure = false;
            }
            Err(err) => self.report_stream_error(&err),
        }

        stats.installed = self.install_populated_chunks();

        match self.deactivate_farthest_chunk() {
            Ok(deactivated) => stats.deactivated = deactivated,
            Err(err) => self.report_stream_error(&err),
        }

        stats.lighting = self.lighting.update(&mut self.arena, &self.registry);

        stats.enemy_spawned = self.spawn_enemy(dt);
        stats.enemies_removed = self.enemies.update(
            &self.arena,
            &self.registry,
            &self.observers,
            &mut self.bullets,
            dt,
        );
        stats.bullet_impacts = self.update_bullets(dt);

        self.tick_count += 1;
        stats
    }

    /// Spawns one enemy out of sight every few seconds while the pool has room.
    fn spawn_enemy(&mut self, dt: f32) -> bool {
        self.enemy_spawn_timer += dt;
        if self.enemy_spawn_timer < ENEMY_SPAWN_INTERVAL || self.enemies.is_full() {
            return false;
        }
        self.enemy_spawn_timer = 0.0;

        let Some(position) =
            find_spawn_position(&self.arena, &self.registry, &self.observers, &mut self.rng)
        else {
            return false;
        };
        if self.enemies.spawn(position).is_none() {
            return false;
        }
        debug!("Enemy spawned at {position}");
        self.events.emit(WorldEvent::EnemySpawned(position));
        true
    }

    fn update_bullets(&mut self, dt: f32) -> usize {
        let impacts = self.bullets.update(
            &self.arena,
            &self.registry,
            &mut self.observers,
            &mut self.enemies,
            dt,
        );

        for impact in &impacts {
            match *impact {
                BulletImpact::Observer(index) => {
                    if self.observers.get(index).is_some_and(|observer| !observer.is_alive()) {
                        info!("Observer {index} was killed");
                        self.events.emit(WorldEvent::ObserverKilled(index));
                    }
                }
                BulletImpact::Enemy(handle) => {
                    if let Some(enemy) = self.enemies.get(handle).filter(|enemy| enemy.is_dead()) {
                        self.events.emit(WorldEvent::EnemyKilled(enemy.position));
                    }
                }
                BulletImpact::Block(_) => {}
            }
        }
        impacts.len()
    }

    fn report_stream_error(&mut self, err: &StreamError) {
        if self.stream_backpressure {
            debug!("Chunk request refused: {err}");
        } else {
            warn!("Chunk request refused: {err}");
            self.stream_backpressure = true;
        }
    }

    /// Smallest squared horizontal distance from `point` to any observer.
    fn nearest_observer_distance_squared(&self, point: Vec2) -> f32 {
        self.observers
            .iter()
            .map(|observer| observer.position.truncate().distance_squared(point))
            .fold(f32::INFINITY, f32::min)
    }

    /// The missing chunk closest to any observer, if one lies inside the
    /// activation radius.
    pub fn nearest_missing_chunk(&self) -> Option<ChunkPos> {
        let radius = self.config.active_chunk_radius;
        let limit = self.config.activation_radius_squared();
        let mut best: Option<(f32, ChunkPos)> = None;

        for observer in &self.observers {
            let centre = world_to_chunk(observer.position);
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let coords = centre + ChunkPos::new(dx, dy);
                    if self.arena.find(coords).is_some() {
                        continue;
                    }
                    let distance = self.nearest_observer_distance_squared(chunk_centre(coords));
                    if distance >= limit {
                        continue;
                    }
                    if best.map_or(true, |(shortest, _)| distance < shortest) {
                        best = Some((distance, coords));
                    }
                }
            }
        }

        best.map(|(_, coords)| coords)
    }

    /// Claims a chunk for the nearest missing coordinate and queues it for
    /// loading. On failure the coordinate stays missing and is retried.
    pub fn activate_nearest_missing_chunk(&mut self) -> Result<Option<ChunkPos>, StreamError> {
        let Some(coords) = self.nearest_missing_chunk() else {
            return Ok(None);
        };

        let handle = self
            .arena
            .allocate(coords)
            .ok_or(StreamError::PoolExhausted(coords))?;
        let proxy = match self.arena.get(handle) {
            Some(chunk) => chunk.snapshot(),
            None => ChunkProxy::new(coords),
        };

        if let Err(err) = self.streaming.request_populate(proxy) {
            self.arena.release(handle);
            return Err(err);
        }

        debug!("Requested chunk ({}, {})", coords.x, coords.y);
        Ok(Some(coords))
    }

    /// Installs everything the worker has finished since the last call.
    pub fn install_populated_chunks(&mut self) -> usize {
        let mut populated = mem::take(&mut self.populated);
        self.streaming.drain_populated(&mut populated);

        let mut installed = 0;
        for proxy in populated.drain(..) {
            let Some(handle) = self.arena.find(proxy.coords) else {
                debug!(
                    "Dropping populated chunk ({}, {}) that is no longer requested",
                    proxy.coords.x, proxy.coords.y
                );
                continue;
            };
            if !proxy.is_valid() {
                self.arena.release(handle);
                continue;
            }
            if self.activate_chunk(handle, &proxy) {
                installed += 1;
            }
        }

        self.populated = populated;
        installed
    }

    /// Populates, links and lights a chunk immediately, bypassing the worker.
    pub fn install_chunk_now(&mut self, proxy: &ChunkProxy) -> Result<ChunkHandle, StreamError> {
        let handle = self
            .arena
            .allocate(proxy.coords)
            .ok_or(StreamError::PoolExhausted(proxy.coords))?;
        self.activate_chunk(handle, proxy);
        Ok(handle)
    }

    fn activate_chunk(&mut self, handle: ChunkHandle, proxy: &ChunkProxy) -> bool {
        let Some(chunk) = self.arena.get_mut(handle) else {
            return false;
        };
        if chunk.state() != ChunkState::Requested {
            return false;
        }
        chunk.populate_from(proxy);
        chunk.set_state(ChunkState::Active);

        self.connect_chunk(handle);
        self.lighting.seed_chunk(&mut self.arena, &self.registry, handle);
        self.events.emit(WorldEvent::ChunkActivated(proxy.coords));
        debug!("Activated chunk ({}, {})", proxy.coords.x, proxy.coords.y);
        true
    }

    fn connect_chunk(&mut self, handle: ChunkHandle) {
        let Some(coords) = self.arena.get(handle).map(|chunk| chunk.coords()) else {
            return;
        };

        for direction in Direction::ALL {
            let Some(neighbor) = self.arena.find_active(coords + direction.offset()) else {
                continue;
            };
            if let Some(chunk) = self.arena.get_mut(neighbor) {
                debug_assert!(
                    chunk.neighbor(direction.opposite()).is_none(),
                    "neighbour already linked on that side"
                );
                chunk.set_neighbor(direction.opposite(), Some(handle));
            }
            if let Some(chunk) = self.arena.get_mut(handle) {
                chunk.set_neighbor(direction, Some(neighbor));
            }
        }
    }

    fn disconnect_chunk(&mut self, handle: ChunkHandle) {
        for direction in Direction::ALL {
            let Some(neighbor) = self.arena.get(handle).and_then(|chunk| chunk.neighbor(direction))
            else {
                continue;
            };
            if let Some(chunk) = self.arena.get_mut(neighbor) {
                debug_assert_eq!(chunk.neighbor(direction.opposite()), Some(handle));
                chunk.set_neighbor(direction.opposite(), None);
            }
            if let Some(chunk) = self.arena.get_mut(handle) {
                chunk.set_neighbor(direction, None);
            }
            self.lighting.neighbor_unlinked(
                &mut self.arena,
                &self.registry,
                neighbor,
                direction.opposite(),
            );
        }
    }

    /// The active chunk farthest beyond the flush radius of every observer.
    pub fn farthest_flushable_chunk(&self) -> Option<ChunkHandle> {
        if self.observers.is_empty() {
            return None;
        }
        let limit = self.config.flush_radius_squared();
        let mut best: Option<(f32, ChunkHandle)> = None;

        for (handle, chunk) in self.arena.iter() {
            if !chunk.is_active() {
                continue;
            }
            let distance = self.nearest_observer_distance_squared(chunk_centre(chunk.coords()));
            if distance <= limit {
                continue;
            }
            if best.map_or(true, |(farthest, _)| distance > farthest) {
                best = Some((distance, handle));
            }
        }

        best.map(|(_, handle)| handle)
    }

    /// Queues the farthest out-of-range chunk for saving and releases it. When
    /// the save queue is full the chunk stays active.
    pub fn deactivate_farthest_chunk(&mut self) -> Result<Option<ChunkPos>, StreamError> {
        let Some(handle) = self.farthest_flushable_chunk() else {
            return Ok(None);
        };
        let Some(chunk) = self.arena.get(handle) else {
            return Ok(None);
        };
        let coords = chunk.coords();

        self.streaming.request_save(chunk.snapshot())?;
        self.disconnect_chunk(handle);
        self.arena.release(handle);
        self.events.emit(WorldEvent::ChunkDeactivated(coords));
        debug!("Deactivated chunk ({}, {})", coords.x, coords.y);
        Ok(Some(coords))
    }

    pub fn raycast(&self, start: Vec3, end: Vec3) -> Option<RaycastHit> {
        raycast(&self.arena, &self.registry, start, end)
    }

    /// What the observer at `index` is looking at, within reach.
    pub fn observer_target(&self, index: usize) -> Option<RaycastHit> {
        let observer = self.observers.get(index)?;
        self.raycast(observer.eye_position(), observer.reach_end())
    }

    pub fn get_block(&self, position: Vec3) -> Option<Block> {
        self.arena
            .locate(position)
            .and_then(|locator| self.arena.block(locator))
    }

    pub fn block_at(&self, block: IVec3) -> Option<Block> {
        self.arena
            .locate_block(block)
            .and_then(|locator| self.arena.block(locator))
    }

    /// Height of the highest solid block in a world column, if its chunk is
    /// active.
    pub fn column_height(&self, world_x: i32, world_y: i32) -> Option<i32> {
        self.arena.column_height(&self.registry, world_x, world_y)
    }

    /// Drops an observer onto the surface of its column and switches it to
    /// walking. Returns false while the column's chunk is not active.
    pub fn settle_observer_on_surface(&mut self, index: usize) -> bool {
        let Some(observer) = self.observers.get(index) else {
            return false;
        };
        let column = observer.position.truncate().floor().as_ivec2();
        let Some(height) = self.column_height(column.x, column.y) else {
            return false;
        };
        if let Some(observer) = self.observers.get_mut(index) {
            observer.position.z = (height + 1) as f32 + OBSERVER_HALF_EXTENTS.z + 0.01;
            observer.velocity = Vec3::ZERO;
            observer.physics_mode = PhysicsMode::Walking;
        }
        true
    }

    /// Moves the observer at `index` and fires its weapon while the intent
    /// holds the trigger.
    pub fn step_observer(&mut self, index: usize, intent: &MoveIntent, dt: f32) {
        let Some(observer) = self.observers.get_mut(index) else {
            return;
        };
        collision::step_observer(&self.arena, &self.registry, observer, intent, dt);
        if let Some((origin, direction)) = observer.try_fire(intent.fire, dt) {
            self.bullets.fire(origin, direction, BulletOwner::Observer);
        }
    }

    /// Digs the block at `target`. Water and bedrock resist; a dug cell next
    /// to water floods instead of becoming air.
    pub fn dig_block(&mut self, target: BlockLocator) -> Result<BlockType, EditError> {
        let block = self.arena.block(target).ok_or(EditError::StaleLocator)?;
        let dug = block.block_type;
        if dug == BlockType::BEDROCK || !self.registry.is_solid(dug) {
            return Err(EditError::Indestructible(dug));
        }

        let floods = [Face::PosX, Face::NegX, Face::PosY, Face::NegY, Face::PosZ]
            .into_iter()
            .filter_map(|face| target.neighbor(&self.arena, face))
            .filter_map(|next| self.arena.block(next))
            .any(|next| next.block_type == BlockType::WATER);
        let replacement = if floods {
            BlockType::WATER
        } else {
            BlockType::AIR
        };

        let position = target
            .world_position(&self.arena)
            .ok_or(EditError::StaleLocator)?;
        if let Some(chunk) = self.arena.get_mut(target.chunk) {
            chunk.block_mut(target.index()).block_type = replacement;
            chunk.mark_modified();
        }
        self.lighting.after_dig(&mut self.arena, &self.registry, target);

        let sound = self.registry.get(dug).and_then(|d| d.sounds.breaking);
        self.events.emit(WorldEvent::BlockDug {
            position,
            block_type: dug,
            sound,
        });
        Ok(dug)
    }

    /// Cell a block would go into when placed against `hit`: the struck cell
    /// itself if it is water, otherwise the open cell in front of it.
    pub fn placement_target(&self, hit: &RaycastHit) -> BlockLocator {
        let struck_water = self
            .arena
            .block(hit.block)
            .is_some_and(|block| block.block_type == BlockType::WATER);
        if struck_water {
            hit.block
        } else {
            hit.previous
        }
    }

    pub fn place_block(&mut self, target: BlockLocator, block_type: BlockType) -> Result<(), EditError> {
        if block_type == BlockType::AIR || !self.registry.contains(block_type) {
            return Err(EditError::InvalidBlockType(block_type));
        }
        let block = self.arena.block(target).ok_or(EditError::StaleLocator)?;
        if self.registry.is_solid(block.block_type) {
            return Err(EditError::Obstructed);
        }
        let position = target
            .world_position(&self.arena)
            .ok_or(EditError::StaleLocator)?;
        let cell = AABB::block(position);
        if self
            .observers
            .iter()
            .any(|observer| observer.bounding_box().intersects(&cell))
        {
            return Err(EditError::Obstructed);
        }

        if self.registry.is_opaque(block_type) {
            self.lighting.prepare_place(&mut self.arena, &self.registry, target);
        } else {
            self.lighting.mark_dirty(&mut self.arena, target);
        }
        if let Some(chunk) = self.arena.get_mut(target.chunk) {
            chunk.block_mut(target.index()).block_type = block_type;
            chunk.mark_modified();
        }

        let sound = self.registry.get(block_type).and_then(|d| d.sounds.placing);
        self.events.emit(WorldEvent::BlockPlaced {
            position,
            block_type,
            sound,
        });
        Ok(())
    }

    /// Digs whatever the observer at `index` is looking at.
    pub fn dig_targeted(&mut self, index: usize) -> Option<Result<BlockType, EditError>> {
        let hit = self.observer_target(index)?;
        Some(self.dig_block(hit.block))
    }

    /// Places `block_type` against whatever the observer at `index` is looking
    /// at.
    pub fn place_targeted(&mut self, index: usize, block_type: BlockType) -> Option<Result<(), EditError>> {
        let hit = self.observer_target(index)?;
        let target = self.placement_target(&hit);
        Some(self.place_block(target, block_type))
    }

    /// Stops the worker once it has written its queue, then writes every
    /// remaining active chunk and the observers. The world must not be
    /// ticked afterwards.
    pub fn shutdown(&mut self) -> io::Result<usize> {
        self.streaming.shutdown();

        let store = self.streaming.store().clone();
        let mut saved = 0;
        for (_, chunk) in self.arena.iter() {
            if !chunk.is_active() {
                continue;
            }
            store.save(&chunk.snapshot())?;
            saved += 1;
        }

        let observers: Vec<_> = self.observers.iter().map(Observer::to_saved).collect();
        save_observers(&self.config.save_dir.join(OBSERVER_SAVE_FILE), &observers)?;
        self.enemies.clear();
        self.bullets.clear();

        info!(
            "World saved: {saved} chunk(s), {} observer(s)",
            observers.len()
        );
        Ok(saved)
    }
}
