//! Host process control
//!
//! The orchestrator never exits the process itself. It calls a
//! [`HostControl`] once, after shutdown or after a fatal startup error.

use crate::config::HostPolicy;
use std::sync::Arc;
use strum_macros::Display;
use tokio::sync::watch;

/// Why the host is being asked to terminate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TerminationReason {
    Shutdown,
    StartupFailed,
}

impl TerminationReason {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Shutdown => 0,
            Self::StartupFailed => 1,
        }
    }
}

pub trait HostControl: Send + Sync + 'static {
    fn terminate(&self, reason: TerminationReason);
}

/// Exits the process with the reason's exit code
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExit;

impl HostControl for ProcessExit {
    fn terminate(&self, reason: TerminationReason) {
        tracing::info!(%reason, "Exiting process");
        std::process::exit(reason.exit_code());
    }
}

/// Raises a flag an embedding loop (editor, test harness) can watch
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<Option<TerminationReason>>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<TerminationReason>> {
        self.tx.subscribe()
    }

    pub fn is_stopped(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn reason(&self) -> Option<TerminationReason> {
        *self.tx.borrow()
    }

    /// Resolve once the stop flag is raised
    pub async fn stopped(&self) -> Option<TerminationReason> {
        let mut rx = self.tx.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(reason) => *reason,
            Err(_) => None,
        }
    }
}

impl HostControl for StopSignal {
    fn terminate(&self, reason: TerminationReason) {
        tracing::info!(%reason, "Raising stop signal");
        self.tx.send_replace(Some(reason));
    }
}

/// Host control matching the configured policy
pub fn host_for(policy: HostPolicy) -> Arc<dyn HostControl> {
    match policy {
        HostPolicy::Exit => Arc::new(ProcessExit),
        HostPolicy::Stop => Arc::new(StopSignal::new()),
    }
}
