use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::debug;

/// Small rayon pool for CPU-bound batch work such as terrain generation.
pub struct JobSystem {
    pool: ThreadPool,
}

impl JobSystem {
    pub fn new(num_threads: Option<usize>, name: &'static str) -> Result<Self, ThreadPoolBuildError> {
        let mut builder = ThreadPoolBuilder::new().thread_name(move |index| format!("{name}-{index}"));
        if let Some(count) = num_threads {
            builder = builder.num_threads(count.max(1));
        }

        let pool = builder.build()?;
        debug!("Job system '{name}' started with {} thread(s)", pool.current_num_threads());
        Ok(Self { pool })
    }

    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `job` on every item in parallel and returns once all are done.
    pub fn for_each_mut<T, F>(&self, items: &mut [T], job: F)
    where
        T: Send,
        F: Fn(&mut T) + Send + Sync,
    {
        self.pool.install(|| items.par_iter_mut().for_each(job));
    }
}
