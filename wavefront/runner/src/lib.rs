use crate::cancellation::CancellationCoordinator;
use crate::cli::Invocation;
use crate::error::WavefrontError;
use crate::orchestrator::TaskOrchestrator;
use crate::registry::CommandRegistry;
use log::*;
use std::sync::Arc;
use wavefront_common_logger::{LogWorkerGuard, LoggerConfig};

pub mod cancellation;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod orchestrator;
pub mod registry;

/// Runs what has been requested on the command line until completion or cancellation.
///
/// The log level is switched to the requested one and the process is detached, if
/// asked to, before any command starts.
pub fn execute_invocation(
    invocation: Invocation,
    registry: Arc<CommandRegistry>,
    logger: &LogWorkerGuard,
) -> Result<(), WavefrontError> {
    match invocation {
        Invocation::Configured(config) => {
            logger.reload(&config.logger_config().level)?;
            if config.options.daemon {
                daemon::daemonize(&config.options)?;
            }

            let cancellation = CancellationCoordinator::new();
            cancellation.install_signal_handlers()?;

            let report = TaskOrchestrator::new(registry, cancellation).run_all(&config)?;
            info!(
                "Supervision completed. Started: {}, finished: {}, cancelled: {}",
                report.started,
                report.finished.len(),
                report.cancelled
            );
            Ok(())
        }
        Invocation::Direct { command, args, options } => {
            logger.reload(&LoggerConfig::with_debug(options.debug).level)?;
            if options.daemon {
                daemon::daemonize(&options)?;
            }
            TaskOrchestrator::new(registry, CancellationCoordinator::new()).run_one(&command, &args)
        }
    }
}
