use crate::cancellation::CancellationCoordinator;
use crate::config::GlobalConfiguration;
use crate::error::WavefrontError;
use crate::registry::CommandRegistry;
use log::*;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use wavefront_command_common::CommandArgs;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The liveness outcome of a multi-task run.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisionReport {
    pub started: usize,
    /// The names of the finished tasks, in completion order
    pub finished: Vec<String>,
    /// Whether the supervision stopped because of a cancellation request
    pub cancelled: bool,
}

impl SupervisionReport {
    pub fn still_running(&self) -> usize {
        self.started - self.finished.len()
    }
}

/// Runs commands, either one in the calling thread or all the configured tasks
/// concurrently, one thread per task.
pub struct TaskOrchestrator {
    registry: Arc<CommandRegistry>,
    cancellation: CancellationCoordinator,
    poll_interval: Duration,
}

impl TaskOrchestrator {
    pub fn new(registry: Arc<CommandRegistry>, cancellation: CancellationCoordinator) -> Self {
        TaskOrchestrator { registry, cancellation, poll_interval: DEFAULT_POLL_INTERVAL }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Executes a single command synchronously.
    /// Failures are printed to stdout and swallowed unless `args.verbose` is set.
    pub fn run_one(&self, command_name: &str, args: &CommandArgs) -> Result<(), WavefrontError> {
        execute_command(&self.registry, command_name, args, &mut io::stdout())
    }

    /// Starts one detached thread per configured task and waits until all of them
    /// have finished or the cancellation is requested.
    pub fn run_all(&self, config: &GlobalConfiguration) -> Result<SupervisionReport, WavefrontError> {
        let (sender, receiver) = mpsc::channel();
        let mut alive = BTreeMap::new();

        for (index, task) in config.tasks.iter().enumerate() {
            let registry = self.registry.clone();
            let command_name = task.command.clone();
            let args = task.args.clone();
            let task_name = task.name.clone();
            let completion = CompletionNotifier { index, sender: sender.clone() };

            debug!("Starting thread [{}] with command [{}]", task.name, task.command);
            thread::Builder::new()
                .name(format!("task-{}", task.name))
                .spawn(move || {
                    let _completion = completion;
                    if let Err(err) =
                        execute_command(&registry, &command_name, &args, &mut io::stdout())
                    {
                        error!("Thread [{}] terminated with error: {}", task_name, err);
                    }
                })
                .map_err(|err| WavefrontError::WorkerSpawnError {
                    message: format!("Cannot start thread [{}]. Err: {}", task.name, err),
                })?;
            alive.insert(index, task.name.clone());
        }
        drop(sender);

        let started = alive.len();
        info!("Started {} thread(s)", started);

        let mut finished = Vec::with_capacity(started);
        let mut cancelled = false;
        while !alive.is_empty() {
            if self.cancellation.is_cancelled() {
                cancelled = true;
                break;
            }
            match receiver.recv_timeout(self.poll_interval) {
                Ok(index) => {
                    if let Some(name) = alive.remove(&index) {
                        debug!("Thread [{}] finished. {} still alive", name, alive.len());
                        finished.push(name);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        if cancelled {
            info!("Stopped waiting for {} running thread(s)", alive.len());
        }
        Ok(SupervisionReport { started, finished, cancelled })
    }
}

/// Reports the end of a worker to the supervision loop, even if the command panics.
struct CompletionNotifier {
    index: usize,
    sender: Sender<usize>,
}

impl Drop for CompletionNotifier {
    fn drop(&mut self) {
        let _ = self.sender.send(self.index);
    }
}

/// Resolves and executes a command, writing the failure message to `out` when the
/// invocation is not verbose. Verbose invocations return the error instead.
pub fn execute_command<W: Write>(
    registry: &CommandRegistry,
    command_name: &str,
    args: &CommandArgs,
    out: &mut W,
) -> Result<(), WavefrontError> {
    match resolve_and_execute(registry, command_name, args) {
        Ok(()) => Ok(()),
        Err(err) if args.verbose => Err(err),
        Err(err) => {
            if let Err(write_err) = writeln!(out, "{}", err) {
                warn!("Cannot print the error of command [{}]. Err: {}", command_name, write_err);
            }
            Ok(())
        }
    }
}

fn resolve_and_execute(
    registry: &CommandRegistry,
    command_name: &str,
    args: &CommandArgs,
) -> Result<(), WavefrontError> {
    let mut command = registry.resolve(command_name)?;
    command.set_verbose(args.verbose);
    info!(target: command.logger(), "Executing {}", command.description());
    command.execute(args)?;
    Ok(())
}
