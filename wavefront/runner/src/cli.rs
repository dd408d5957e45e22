use crate::config::{GlobalConfiguration, ProcessOptions};
use crate::error::WavefrontError;
use crate::registry::CommandRegistry;
use clap::{Arg, Args, FromArgMatches};
use log::*;
use wavefront_command_common::{parse_known_args, ArgParser, CommandArgs};

pub const APP_NAME: &str = "wavefront";
pub const CLI_DEFAULT_OUT_PATH: &str = "./wavefront.out";
pub const CLI_DEFAULT_PID_PATH: &str = "./wavefront.pid";

const CONFIG_ARG: &str = "config";

/// The process level flags of the direct invocation.
/// They are accepted before or after the command name.
#[derive(Debug, Args)]
#[clap(rename_all = "kebab-case")]
pub struct ProcessFlags {
    /// Propagate the command errors instead of printing them
    #[clap(long, global = true)]
    pub verbose: bool,

    #[clap(long, global = true, hide = true)]
    pub debug: bool,

    /// Run in background
    #[clap(long, global = true)]
    pub daemon: bool,

    /// The file receiving stdout and stderr when running in background
    #[clap(long, global = true, default_value = CLI_DEFAULT_OUT_PATH)]
    pub out: String,

    /// The PID lock file used when running in background
    #[clap(long, global = true, default_value = CLI_DEFAULT_PID_PATH)]
    pub pid: String,
}

impl From<ProcessFlags> for ProcessOptions {
    fn from(flags: ProcessFlags) -> Self {
        ProcessOptions {
            daemon: flags.daemon,
            verbose: flags.verbose,
            debug: flags.debug,
            out: flags.out,
            pid: flags.pid,
        }
    }
}

/// What the process has been asked to do.
#[derive(Debug)]
pub enum Invocation {
    /// Run all the tasks of a configuration file
    Configured(GlobalConfiguration),
    /// Run a single command once
    Direct { command: String, args: CommandArgs, options: ProcessOptions },
}

fn config_file_parser() -> ArgParser {
    ArgParser::new(APP_NAME).arg(Arg::new(CONFIG_ARG).short('c').long(CONFIG_ARG).takes_value(true))
}

/// Builds the command line with one subcommand per loadable command.
/// A command that fails to load is logged and left out.
pub fn build_command_line(registry: &CommandRegistry) -> ArgParser {
    let command_line = ArgParser::new(APP_NAME)
        .bin_name(APP_NAME)
        .no_binary_name(true)
        .about("Runs metric retrievers and checkers, once or as configured in a file")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new(CONFIG_ARG)
                .short('c')
                .long(CONFIG_ARG)
                .takes_value(true)
                .help("The configuration file. When present, all the other arguments are ignored"),
        );
    let mut command_line = ProcessFlags::augment_args(command_line);

    for descriptor in registry.descriptors() {
        match descriptor.load() {
            Ok(command) => {
                let subcommand = ArgParser::new(descriptor.name()).about(command.help_text());
                command_line = command_line.subcommand(command.add_arguments(subcommand));
            }
            Err(err) => error!("Cannot load command [{}]: {}", descriptor.name(), err),
        }
    }
    command_line
}

/// Parses the process arguments, binary name excluded.
///
/// If `-c <file>` is found anywhere the configuration file is loaded and everything
/// else is ignored. Otherwise the first positional token selects the command to run.
pub fn parse_invocation(
    registry: &CommandRegistry,
    tokens: &[String],
) -> Result<Invocation, WavefrontError> {
    let first_pass = parse_known_args(config_file_parser(), tokens)?;
    if let Some(config_file_path) = first_pass.value_of(CONFIG_ARG) {
        return Ok(Invocation::Configured(GlobalConfiguration::load_from_file(
            config_file_path,
            registry,
        )?));
    }

    let command_line = build_command_line(registry);
    let matches = command_line.clone().try_get_matches_from(tokens)?;
    let (command, sub_matches) = matches.subcommand().ok_or_else(|| {
        WavefrontError::ConfigurationError { message: "No command specified".to_owned() }
    })?;
    let subcommand = command_line
        .find_subcommand(command)
        .ok_or_else(|| WavefrontError::UnknownCommandError { name: command.to_owned() })?;

    let options: ProcessOptions = ProcessFlags::from_arg_matches(sub_matches)?.into();
    let args = CommandArgs::from_matches(subcommand, sub_matches).with_verbose(options.verbose);

    Ok(Invocation::Direct { command: command.to_owned(), args, options })
}
