use crate::error::WavefrontError;
use log::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// A process-wide shutdown request.
///
/// The flag starts unset and can only be set. It is advisory: the supervision loop of
/// the orchestrator stops waiting for the running tasks, but the tasks themselves are
/// never interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancellationCoordinator {
    cancelled: Arc<AtomicBool>,
}

impl CancellationCoordinator {
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the flag. Calling it more than once has no further effect.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            info!("Cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sets the flag when the process receives an interruption or termination signal.
    ///
    /// The signals are registered before this method returns; they are then awaited
    /// by a dedicated thread. It must be called after the process has been detached,
    /// because threads do not survive a fork.
    pub fn install_signal_handlers(&self) -> Result<(), WavefrontError> {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(
            |err| WavefrontError::ConfigurationError {
                message: format!("Cannot start the signal handler runtime. Err: {}", err),
            },
        )?;

        let mut signals = {
            let _guard = runtime.enter();
            signal::TerminationSignals::register().map_err(|err| {
                WavefrontError::ConfigurationError {
                    message: format!("Cannot register the signal handlers. Err: {}", err),
                }
            })?
        };

        let coordinator = self.clone();
        thread::Builder::new()
            .name("signal-handler".to_owned())
            .spawn(move || {
                let signal_name = runtime.block_on(async move { signals.recv().await });
                info!("Received {}, shutting down", signal_name);
                coordinator.cancel();
            })
            .map_err(|err| WavefrontError::WorkerSpawnError {
                message: format!("Cannot start the signal handler thread. Err: {}", err),
            })?;

        debug!("Signal handlers installed");
        Ok(())
    }
}

#[cfg(unix)]
mod signal {
    use tokio::signal::unix::{signal, Signal, SignalKind};

    pub struct TerminationSignals {
        interrupt: Signal,
        terminate: Signal,
    }

    impl TerminationSignals {
        pub fn register() -> std::io::Result<Self> {
            Ok(TerminationSignals {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }

        pub async fn recv(&mut self) -> &'static str {
            tokio::select! {
                _ = self.interrupt.recv() => "SIGINT",
                _ = self.terminate.recv() => "SIGTERM",
            }
        }
    }
}

#[cfg(not(unix))]
mod signal {
    pub struct TerminationSignals;

    impl TerminationSignals {
        pub fn register() -> std::io::Result<Self> {
            Ok(TerminationSignals)
        }

        pub async fn recv(&mut self) -> &'static str {
            if let Err(err) = tokio::signal::ctrl_c().await {
                log::error!("Cannot listen for ctrl-c. Err: {}", err);
            }
            "ctrl-c"
        }
    }
}
