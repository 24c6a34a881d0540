//! Concurrency primitives the Orchestrator composes against: a
//! process-wide run lock, a clock seam, and trigger pause/resume.

mod clock;
mod error;
mod lock;
mod scheduler;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::ConcurrencyError;
pub use lock::{FileLock, InMemoryLock, Lock, LockGuard};
pub use scheduler::{NoopScheduler, RecordingScheduler, RemoteTriggerScheduler, Scheduler};
