use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use quarry_core::handoff::{HandoffBuffer, WakeSignal};
use quarry_core::jobs::JobSystem;
use quarry_persist::chunk_store::ChunkStore;
use quarry_shared::chunk::ChunkProxy;
use quarry_shared::worldgen::WorldGenerator;
use tracing::{debug, info, warn};

use crate::error::StreamError;

/// Upper bound on how long the worker sleeps when nothing wakes it.
const WORKER_IDLE_TIMEOUT: Duration = Duration::from_millis(50);

struct Shared {
    to_populate: HandoffBuffer<ChunkProxy>,
    populated: HandoffBuffer<ChunkProxy>,
    to_save: HandoffBuffer<ChunkProxy>,
    wake: WakeSignal,
    running: AtomicBool,
}

/// Background loading, generation and saving of chunks. The simulation side
/// only ever pushes to or swaps with the hand-off buffers; all disk access and
/// terrain generation happen on the worker thread.
pub struct StreamingPipeline {
    shared: Arc<Shared>,
    store: ChunkStore,
    worker: Option<JoinHandle<()>>,
}

impl StreamingPipeline {
    pub fn start(
        store: ChunkStore,
        generator: WorldGenerator,
        capacity: usize,
        generation_threads: usize,
    ) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            to_populate: HandoffBuffer::new("to-populate", capacity),
            populated: HandoffBuffer::new("populated", capacity),
            to_save: HandoffBuffer::new("to-save", capacity),
            wake: WakeSignal::new(),
            running: AtomicBool::new(true),
        });

        let jobs = JobSystem::new(Some(generation_threads), "quarry-gen")
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;

        let worker_shared = Arc::clone(&shared);
        let worker_store = store.clone();
        let worker = thread::Builder::new()
            .name("quarry-stream".to_string())
            .spawn(move || run_worker(&worker_shared, &worker_store, &generator, &jobs))?;

        Ok(Self {
            shared,
            store,
            worker: Some(worker),
        })
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn request_populate(&self, proxy: ChunkProxy) -> Result<(), StreamError> {
        push(&self.shared.to_populate, proxy)?;
        self.shared.wake.notify();
        Ok(())
    }

    pub fn request_save(&self, proxy: ChunkProxy) -> Result<(), StreamError> {
        push(&self.shared.to_save, proxy)?;
        self.shared.wake.notify();
        Ok(())
    }

    /// Moves every proxy the worker has finished into `out`.
    pub fn drain_populated(&self, out: &mut Vec<ChunkProxy>) {
        debug_assert!(out.is_empty(), "drain target must start empty");
        self.shared.populated.swap(out);
    }

    pub fn pending_populate(&self) -> usize {
        self.shared.to_populate.len()
    }

    pub fn pending_save(&self) -> usize {
        self.shared.to_save.len()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Stops the worker after it writes every queued save. Pending populate
    /// requests are dropped.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.shared.running.store(false, Ordering::Release);
        self.shared.wake.notify();
        if worker.join().is_err() {
            warn!("Chunk worker panicked during shutdown");
        }
    }
}

impl Drop for StreamingPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn push(buffer: &HandoffBuffer<ChunkProxy>, proxy: ChunkProxy) -> Result<(), StreamError> {
    buffer.try_push(proxy).map_err(|rejected| StreamError::BufferFull {
        buffer: buffer.name(),
        coords: rejected.coords,
    })
}

fn run_worker(shared: &Shared, store: &ChunkStore, generator: &WorldGenerator, jobs: &JobSystem) {
    info!(
        "Chunk worker started ({} generation thread(s), saving to {})",
        jobs.thread_count(),
        store.root().display()
    );

    let mut populate_batch = Vec::new();
    let mut save_batch = Vec::new();
    // Finished proxies that did not fit into the populated buffer yet.
    let mut unpublished = Vec::new();
    let mut saved_total = 0usize;

    loop {
        let running = shared.running.load(Ordering::Acquire);

        if !unpublished.is_empty() {
            shared.populated.publish(&mut unpublished);
        }

        // Populate requests are taken before saves and populated after the
        // saves are written. A save queued ahead of a request for the same
        // chunk is therefore on disk before that request is loaded.
        if running && unpublished.is_empty() {
            shared.to_populate.swap(&mut populate_batch);
        }
        shared.to_save.swap(&mut save_batch);

        for proxy in save_batch.drain(..) {
            match store.save(&proxy) {
                Ok(()) => saved_total += 1,
                Err(err) => warn!(
                    "Failed to save chunk ({}, {}): {err}",
                    proxy.coords.x, proxy.coords.y
                ),
            }
        }

        if running && !populate_batch.is_empty() {
            jobs.for_each_mut(&mut populate_batch, |proxy| populate(store, generator, proxy));
            unpublished.append(&mut populate_batch);
            shared.populated.publish(&mut unpublished);
        }
        populate_batch.clear();

        if !running {
            break;
        }
        let idle = shared.to_populate.is_empty() && shared.to_save.is_empty();
        if idle || !unpublished.is_empty() {
            shared.wake.wait_timeout(WORKER_IDLE_TIMEOUT);
        }
    }

    info!("Chunk worker stopped after saving {saved_total} chunk(s)");
}

/// Loads the proxy's saved blocks, or generates them when there is no usable
/// save. An unreadable save invalidates the proxy so the chunk is retried
/// rather than regenerated over the file.
fn populate(store: &ChunkStore, generator: &WorldGenerator, proxy: &mut ChunkProxy) {
    if !proxy.is_valid() {
        return;
    }

    match store.load_into(proxy) {
        Ok(true) => {}
        Ok(false) => {
            generator.populate(proxy);
            debug!("Generated chunk ({}, {})", proxy.coords.x, proxy.coords.y);
        }
        Err(err) if err.kind() == io::ErrorKind::InvalidData => {
            warn!(
                "Discarding corrupt save for chunk ({}, {}): {err}",
                proxy.coords.x, proxy.coords.y
            );
            generator.populate(proxy);
        }
        Err(err) => {
            warn!(
                "Could not read chunk ({}, {}), will retry: {err}",
                proxy.coords.x, proxy.coords.y
            );
            proxy.invalidate();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    use quarry_persist::chunk_store::ChunkStore;
    use quarry_shared::block::BlockType;
    use quarry_shared::chunk::ChunkProxy;
    use quarry_shared::coords::{ChunkPos, LocalPos};
    use quarry_shared::worldgen::WorldGenerator;

    use super::StreamingPipeline;
    use crate::error::StreamError;

    fn temp_dir(label: &str) -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let unique = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "quarry_stream_{label}_{}_{unique}",
            std::process::id()
        ))
    }

    fn wait_for_populated(pipeline: &StreamingPipeline, count: usize) -> Vec<ChunkProxy> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut collected = Vec::new();
        while collected.len() < count {
            assert!(Instant::now() < deadline, "worker did not deliver in time");
            let mut batch = Vec::new();
            pipeline.drain_populated(&mut batch);
            collected.append(&mut batch);
            thread::sleep(Duration::from_millis(5));
        }
        collected
    }

    #[test]
    fn missing_chunk_is_generated_deterministically() {
        let dir = temp_dir("generate");
        let store = ChunkStore::open(&dir).expect("open store");
        let pipeline =
            StreamingPipeline::start(store, WorldGenerator::new(77), 8, 1).expect("start");

        pipeline
            .request_populate(ChunkProxy::new(ChunkPos::new(0, 0)))
            .expect("queue");
        let populated = wait_for_populated(&pipeline, 1);

        let mut expected = ChunkProxy::new(ChunkPos::new(0, 0));
        WorldGenerator::new(77).populate(&mut expected);
        assert_eq!(populated[0].coords, ChunkPos::new(0, 0));
        assert!(populated[0].is_valid());
        assert_eq!(populated[0].as_slice(), expected.as_slice());
        assert_eq!(populated[0].get(LocalPos::new(0, 0, 0)), BlockType::BEDROCK);

        drop(pipeline);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn saved_chunk_loads_instead_of_generating() {
        let dir = temp_dir("load");
        let store = ChunkStore::open(&dir).expect("open store");
        let coords = ChunkPos::new(-3, 2);
        let saved = ChunkProxy::new_filled(coords, BlockType::CLAY_BRICK);
        store.save(&saved).expect("seed save file");

        let pipeline = StreamingPipeline::start(store, WorldGenerator::new(1), 8, 2).expect("start");
        pipeline
            .request_populate(ChunkProxy::new(coords))
            .expect("queue");
        let populated = wait_for_populated(&pipeline, 1);
        assert!(populated[0].is_uniform(BlockType::CLAY_BRICK));

        drop(pipeline);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_save_falls_back_to_generation() {
        let dir = temp_dir("corrupt");
        let store = ChunkStore::open(&dir).expect("open store");
        let coords = ChunkPos::new(4, 4);
        fs::write(store.chunk_path(coords), [1u8, 2, 3]).expect("write corrupt file");

        let pipeline = StreamingPipeline::start(store, WorldGenerator::new(9), 8, 1).expect("start");
        pipeline
            .request_populate(ChunkProxy::new(coords))
            .expect("queue");
        let populated = wait_for_populated(&pipeline, 1);

        let mut expected = ChunkProxy::new(coords);
        WorldGenerator::new(9).populate(&mut expected);
        assert!(populated[0].is_valid());
        assert_eq!(populated[0].as_slice(), expected.as_slice());

        drop(pipeline);
        let _ = fs::remove_dir_all(&dir);
    }

    fn wait_for_chunk(pipeline: &StreamingPipeline, coords: ChunkPos) -> ChunkProxy {
        let deadline = Instant::now() + Duration::from_secs(30);
        loop {
            assert!(Instant::now() < deadline, "chunk never came back from the worker");
            let mut batch = Vec::new();
            pipeline.drain_populated(&mut batch);
            if let Some(found) = batch.into_iter().find(|proxy| proxy.coords == coords) {
                return found;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn reload_after_save_sees_the_saved_blocks() {
        let dir = temp_dir("save_then_load");
        let store = ChunkStore::open(&dir).expect("open store");
        let pipeline =
            StreamingPipeline::start(store, WorldGenerator::new(5), 256, 1).expect("start");

        // Keep the worker busy so the save and the reload land in one batch.
        for x in 0..128 {
            pipeline
                .request_populate(ChunkProxy::new(ChunkPos::new(100 + x, 0)))
                .expect("queue");
        }
        let coords = ChunkPos::new(0, 0);
        pipeline
            .request_save(ChunkProxy::new_filled(coords, BlockType::CLAY))
            .expect("queue save");
        pipeline
            .request_populate(ChunkProxy::new(coords))
            .expect("queue reload");

        let reloaded = wait_for_chunk(&pipeline, coords);
        assert!(reloaded.is_valid());
        assert!(reloaded.is_uniform(BlockType::CLAY));

        drop(pipeline);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn populated_results_wait_for_room() {
        let dir = temp_dir("populated_cap");
        let store = ChunkStore::open(&dir).expect("open store");
        let pipeline = StreamingPipeline::start(store, WorldGenerator::new(8), 2, 1).expect("start");

        for x in 0..2 {
            pipeline
                .request_populate(ChunkProxy::new(ChunkPos::new(x, 0)))
                .expect("queue");
        }
        let deadline = Instant::now() + Duration::from_secs(10);
        while pipeline.pending_populate() > 0 {
            assert!(Instant::now() < deadline, "worker never took the requests");
            thread::sleep(Duration::from_millis(5));
        }
        for x in 2..4 {
            pipeline
                .request_populate(ChunkProxy::new(ChunkPos::new(x, 0)))
                .expect("queue");
        }
        thread::sleep(Duration::from_millis(200));

        let mut first = Vec::new();
        pipeline.drain_populated(&mut first);
        assert!(first.len() <= 2, "buffer held {} proxies", first.len());

        let rest = wait_for_populated(&pipeline, 4 - first.len());
        let mut seen: Vec<i32> = first.iter().chain(&rest).map(|proxy| proxy.coords.x).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);

        drop(pipeline);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn shutdown_flushes_queued_saves() {
        let dir = temp_dir("flush");
        let store = ChunkStore::open(&dir).expect("open store");
        let mut pipeline =
            StreamingPipeline::start(store.clone(), WorldGenerator::new(3), 8, 1).expect("start");

        for x in 0..3 {
            let proxy = ChunkProxy::new_filled(ChunkPos::new(x, 0), BlockType::SAND);
            pipeline.request_save(proxy).expect("queue save");
        }
        pipeline.shutdown();
        assert!(!pipeline.is_running());

        for x in 0..3 {
            let mut loaded = ChunkProxy::new(ChunkPos::new(x, 0));
            assert!(store.load_into(&mut loaded).expect("load"));
            assert!(loaded.is_uniform(BlockType::SAND));
        }
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn full_buffer_rejects_request() {
        let dir = temp_dir("full");
        let store = ChunkStore::open(&dir).expect("open store");
        let mut pipeline = StreamingPipeline::start(store, WorldGenerator::new(3), 1, 1).expect("start");
        // Stop the worker so nothing drains the buffer underneath the test.
        pipeline.shutdown();

        pipeline
            .request_save(ChunkProxy::new(ChunkPos::new(0, 0)))
            .expect("first fits");
        let err = pipeline
            .request_save(ChunkProxy::new(ChunkPos::new(1, 0)))
            .expect_err("second must be refused");
        assert_eq!(
            err,
            StreamError::BufferFull {
                buffer: "to-save",
                coords: ChunkPos::new(1, 0)
            }
        );
        let _ = fs::remove_dir_all(&dir);
    }
}
