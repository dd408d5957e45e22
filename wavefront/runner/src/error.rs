use thiserror::Error;
use wavefront_command_common::CommandError;
use wavefront_common_logger::LoggerError;

#[derive(Error, Debug)]
pub enum WavefrontError {
    #[error("UnknownCommandError: [{name}]")]
    UnknownCommandError { name: String },
    #[error("CommandLoadError: cannot load command [{name}]: {message}")]
    CommandLoadError { name: String, message: String },
    #[error(transparent)]
    CommandExecutionError(#[from] CommandError),
    #[error("ConfigurationError: [{message}]")]
    ConfigurationError { message: String },
    #[error("DaemonLockError: [{message}]")]
    DaemonLockError { message: String },
    #[error("DaemonError: [{message}]")]
    DaemonError { message: String },
    #[error("WorkerSpawnError: [{message}]")]
    WorkerSpawnError { message: String },
    #[error("LoggerError: [{message}]")]
    LoggerError { message: String },
    #[error(transparent)]
    CommandLineError(#[from] clap::Error),
}

impl From<config_rs::ConfigError> for WavefrontError {
    fn from(error: config_rs::ConfigError) -> Self {
        WavefrontError::ConfigurationError { message: format!("{}", error) }
    }
}

impl From<LoggerError> for WavefrontError {
    fn from(error: LoggerError) -> Self {
        WavefrontError::LoggerError { message: format!("{}", error) }
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn execution_errors_should_keep_the_command_message() {
        // Arrange
        let error: WavefrontError = CommandError::execution("bad key").into();

        // Act
        let message = format!("{}", error);

        // Assert
        assert_eq!("bad key", message);
    }

    #[test]
    fn unknown_command_error_should_name_the_command() {
        let error = WavefrontError::UnknownCommandError { name: "doesnotexist".to_owned() };
        assert_eq!("UnknownCommandError: [doesnotexist]", format!("{}", error));
    }
}
