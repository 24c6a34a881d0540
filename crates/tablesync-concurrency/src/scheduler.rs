//! Pausing the external trigger that invokes a run, so a second
//! concurrent invocation can't fire while one is in progress.

use async_trait::async_trait;
use parking_lot::Mutex;
use tablesync_remote::{RemoteClient, RemoteError};

#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn pause(&self, client: &dyn RemoteClient, handler_name: &str) -> Result<(), RemoteError>;
    async fn resume(&self, client: &dyn RemoteClient, handler_name: &str) -> Result<(), RemoteError>;
}

/// Delegates straight through to the `RemoteClient`'s trigger controls.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoteTriggerScheduler;

#[async_trait]
impl Scheduler for RemoteTriggerScheduler {
    async fn pause(&self, client: &dyn RemoteClient, handler_name: &str) -> Result<(), RemoteError> {
        client.pause_trigger(handler_name).await
    }

    async fn resume(&self, client: &dyn RemoteClient, handler_name: &str) -> Result<(), RemoteError> {
        client.resume_trigger(handler_name).await
    }
}

/// A no-op scheduler for hosts with no external trigger to manage — the
/// Single-In-Progress guarantee for such hosts rests entirely on the
/// process-wide [`crate::Lock`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScheduler;

#[async_trait]
impl Scheduler for NoopScheduler {
    async fn pause(&self, _client: &dyn RemoteClient, _handler_name: &str) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn resume(&self, _client: &dyn RemoteClient, _handler_name: &str) -> Result<(), RemoteError> {
        Ok(())
    }
}

/// Records pause/resume calls instead of acting on them, for assertions
/// in orchestration tests.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    calls: Mutex<Vec<String>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn pause(&self, _client: &dyn RemoteClient, handler_name: &str) -> Result<(), RemoteError> {
        self.calls.lock().push(format!("pause:{handler_name}"));
        Ok(())
    }

    async fn resume(&self, _client: &dyn RemoteClient, handler_name: &str) -> Result<(), RemoteError> {
        self.calls.lock().push(format!("resume:{handler_name}"));
        Ok(())
    }
}
