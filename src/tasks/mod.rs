//! Background tasks
//!
//! The API enqueues jobs on a Redis list; the `worker` binary executes them
//! and the `beat` binary enqueues the periodic ones.

pub mod queue;
pub mod scheduler;
pub mod worker;

pub use queue::{FailureOutcome, Job, JobEnvelope, TaskQueue};
pub use scheduler::{default_schedule, Beat, Cadence, ScheduleEntry};
pub use worker::Worker;

use tokio::sync::watch;
use tracing::{info, warn};

/// Resolve on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

/// A stop flag shared by the worker slots or the beat loop
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}
