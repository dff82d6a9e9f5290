//! Parallel execution of per-TU analyses.
//!
//! - `execution`: one (compilation database, TU file) job
//! - `pool`: the bounded worker pool and its synchronous degenerate form
//! - `sync_files`: shared append-only output files with per-file locking

mod execution;
mod pool;
mod sync_files;

pub use execution::{execute_with_files, TuExecution};
pub use pool::{make_thread_pool, JobQueue, SingleThreadQueue, WorkerPool};
pub use sync_files::{LockedStream, SynchronisedFile, SynchronisedFiles};
