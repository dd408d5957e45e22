use thiserror::Error;

pub mod args;

pub use args::{parse_known_args, split_list, CommandArgs};

/// The argument parser a command populates with the options it expects.
pub type ArgParser = clap::Command<'static>;

/// A command is a self-contained unit of work (e.g. a metric retriever or a checker).
/// It declares its own arguments, and it is executed once with the arguments parsed
/// against that declaration.
///
/// A fresh instance is created for every invocation and it is owned by the thread
/// executing it.
pub trait Command: Send {
    /// A short human readable description of what the command does.
    fn description(&self) -> &str;

    /// The help text shown by the command line for this command.
    fn help_text(&self) -> &'static str;

    /// The log target used for the messages of this command.
    fn logger(&self) -> &str;

    fn verbose(&self) -> bool;

    fn set_verbose(&mut self, verbose: bool);

    /// Adds the arguments expected by the command to the parser.
    fn add_arguments(&self, parser: ArgParser) -> ArgParser;

    /// Executes the command with the parsed arguments.
    fn execute(&mut self, args: &CommandArgs) -> Result<(), CommandError>;
}

#[derive(Error, Debug, PartialEq, Clone)]
pub enum CommandError {
    #[error("{message}")]
    ExecutionError { message: String },
    #[error("MissingArgumentError: [{message}]")]
    MissingArgumentError { message: String },
    #[error("WrongArgumentError: [{message}]")]
    WrongArgumentError { message: String },
    #[error("ConfigurationError: [{message}]")]
    ConfigurationError { message: String },
}

impl CommandError {
    pub fn execution<M: Into<String>>(message: M) -> Self {
        CommandError::ExecutionError { message: message.into() }
    }
}
