use crate::config::ProcessOptions;
use crate::error::WavefrontError;
use daemonize::Daemonize;
use log::*;
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fs::{File, OpenOptions};

/// Fails with `DaemonLockError` if another process holds the lock on the PID file.
/// The lock is released before returning.
pub fn check_pid_lock(pid_path: &str) -> Result<(), WavefrontError> {
    let file = OpenOptions::new().write(true).create(true).open(pid_path).map_err(|err| {
        WavefrontError::DaemonError { message: format!("Cannot open PID file [{}]. Err: {}", pid_path, err) }
    })?;

    match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
        Ok(_lock) => Ok(()),
        Err((_file, errno)) if errno == Errno::EWOULDBLOCK => Err(WavefrontError::DaemonLockError {
            message: format!("PID file [{}] is locked by another instance", pid_path),
        }),
        Err((_file, errno)) => Err(WavefrontError::DaemonError {
            message: format!("Cannot lock PID file [{}]. Err: {}", pid_path, errno),
        }),
    }
}

/// Detaches the process. On success only the detached child returns; the foreground
/// process exits.
pub fn daemonize(options: &ProcessOptions) -> Result<(), WavefrontError> {
    check_pid_lock(&options.pid)?;

    println!("Running in background. stdout/stderr being redirected to {}", options.out);
    let stdout = File::create(&options.out).map_err(|err| WavefrontError::DaemonError {
        message: format!("Cannot open output file [{}]. Err: {}", options.out, err),
    })?;
    let stderr = stdout.try_clone().map_err(|err| WavefrontError::DaemonError {
        message: format!("Cannot open output file [{}]. Err: {}", options.out, err),
    })?;

    Daemonize::new()
        .pid_file(&options.pid)
        .working_directory(".")
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .map_err(|err| WavefrontError::DaemonError { message: format!("{}", err) })?;

    info!("Running in background with PID file [{}]", options.pid);
    Ok(())
}
