use crate::error::WavefrontError;
use crate::registry::CommandRegistry;
use config_rs::{Config, ConfigError, File, FileFormat, Source, Value};
use log::*;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use wavefront_command_common::{parse_known_args, split_list, ArgParser, CommandArgs};
use wavefront_common_logger::LoggerConfig;

pub const GLOBAL_SECTION: &str = "global";
pub const LOGGER_SECTION: &str = "logger";
pub const TASK_SECTION_PREFIX: &str = "thread-";

pub const DEFAULT_OUT_PATH: &str = "wavefront.out";
pub const DEFAULT_PID_PATH: &str = "wavefront.pid";

/// The process level settings, shared by the configuration file and the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOptions {
    /// Detach the process and run it in background
    pub daemon: bool,
    pub verbose: bool,
    pub debug: bool,
    /// The file where stdout and stderr are redirected when running as daemon
    pub out: String,
    /// The PID lock file used when running as daemon
    pub pid: String,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        ProcessOptions {
            daemon: false,
            verbose: false,
            debug: false,
            out: DEFAULT_OUT_PATH.to_owned(),
            pid: DEFAULT_PID_PATH.to_owned(),
        }
    }
}

/// A command to run with its own arguments.
#[derive(Debug, Clone)]
pub struct TaskConfiguration {
    /// The task name, as listed in the `threads` key
    pub name: String,
    pub command: String,
    /// The arguments parsed with the parser of the command. They carry the `verbose`
    /// flag of the global configuration and the `delay` of the task.
    pub args: CommandArgs,
    /// Seconds. Carried with the task but no start offset is applied.
    pub delay: u64,
}

#[derive(Debug, Clone)]
pub struct GlobalConfiguration {
    pub config_file_path: Option<String>,
    pub options: ProcessOptions,
    pub task_names: Vec<String>,
    pub tasks: Vec<TaskConfiguration>,
    /// The content of the optional `logger` section
    pub logger: Option<LoggerConfig>,
}

impl GlobalConfiguration {
    pub fn load_from_file(
        config_file_path: &str,
        registry: &CommandRegistry,
    ) -> Result<GlobalConfiguration, WavefrontError> {
        info!("Reading configuration file {} ...", config_file_path);
        let mut source = Config::new();
        source.merge(File::new(config_file_path, FileFormat::Ini))?;
        build_configuration(&source, Some(config_file_path.to_owned()), registry)
    }

    pub fn load_from_str(
        content: &str,
        registry: &CommandRegistry,
    ) -> Result<GlobalConfiguration, WavefrontError> {
        let mut source = Config::new();
        source.merge(File::from_str(content, FileFormat::Ini))?;
        build_configuration(&source, None, registry)
    }

    /// The log level requested by the configuration.
    /// An explicit `logger` section wins over the `debug` flag.
    pub fn logger_config(&self) -> LoggerConfig {
        self.logger.clone().unwrap_or_else(|| LoggerConfig::with_debug(self.options.debug))
    }
}

fn build_configuration(
    source: &Config,
    config_file_path: Option<String>,
    registry: &CommandRegistry,
) -> Result<GlobalConfiguration, WavefrontError> {
    let sections = Sections::from_source(source)?;
    let global = sections.section(GLOBAL_SECTION);

    let defaults = ProcessOptions::default();
    let options = ProcessOptions {
        daemon: global.get_bool("daemon")?.unwrap_or(defaults.daemon),
        verbose: global.get_bool("verbose")?.unwrap_or(defaults.verbose),
        out: global.get_str("out")?.unwrap_or(defaults.out),
        pid: global.get_str("pid")?.unwrap_or(defaults.pid),
        debug: global.get_bool("debug")?.unwrap_or(defaults.debug),
    };

    let task_names =
        global.get_str("threads")?.map(|threads| split_list(&threads)).unwrap_or_default();

    let mut tasks = Vec::with_capacity(task_names.len());
    for name in &task_names {
        info!("Loading thread {}", name);
        tasks.push(build_task(&sections, name, options.verbose, registry)?);
    }

    Ok(GlobalConfiguration {
        config_file_path,
        options,
        task_names,
        tasks,
        logger: read_logger_config(&sections),
    })
}

fn build_task(
    sections: &Sections,
    name: &str,
    verbose: bool,
    registry: &CommandRegistry,
) -> Result<TaskConfiguration, WavefrontError> {
    let section_name = format!("{}{}", TASK_SECTION_PREFIX, name);
    let section = sections.section(&section_name);

    let command_name = section.get_str("command")?.ok_or_else(|| {
        WavefrontError::ConfigurationError {
            message: format!("Missing 'command' for thread [{}] in section [{}]", name, section_name),
        }
    })?;
    let tokens = section.get_str("args")?.map(|args| split_list(&args)).unwrap_or_default();
    let delay = match section.get_int("delay")? {
        Some(delay) if delay < 0 => {
            return Err(WavefrontError::ConfigurationError {
                message: format!("The delay of thread [{}] cannot be negative. Found: {}", name, delay),
            })
        }
        Some(delay) => delay as u64,
        None => 0,
    };

    let command = registry.resolve(&command_name)?;
    let parser = command.add_arguments(ArgParser::new(command_name.clone()));
    let args = parse_known_args(parser, &tokens)
        .map_err(|err| WavefrontError::ConfigurationError {
            message: format!("Wrong args for thread [{}]. Err: {}", name, err),
        })?
        .with_verbose(verbose)
        .with_delay(delay);

    Ok(TaskConfiguration { name: name.to_owned(), command: command_name, args, delay })
}

fn read_logger_config(sections: &Sections) -> Option<LoggerConfig> {
    match sections.section(LOGGER_SECTION).deserialize::<LoggerConfig>() {
        Some(Ok(logger)) => Some(logger),
        Some(Err(err)) => {
            debug!("Ignoring the malformed [{}] section: {}", LOGGER_SECTION, err);
            None
        }
        None => None,
    }
}

/// The sections of the configuration source. Option names are case insensitive and
/// stored lowercase; section names are matched as written, then lowercase.
struct Sections {
    sections: HashMap<String, HashMap<String, Value>>,
}

impl Sections {
    fn from_source(source: &Config) -> Result<Self, WavefrontError> {
        let mut sections = HashMap::new();
        for (name, value) in source.collect()? {
            let options = value.into_table().map_err(|err| WavefrontError::ConfigurationError {
                message: format!("Option [{}] is not inside a section. Err: {}", name, err),
            })?;
            let options =
                options.into_iter().map(|(key, value)| (key.to_lowercase(), value)).collect();
            sections.insert(name, options);
        }
        Ok(Sections { sections })
    }

    fn section<'a>(&'a self, name: &'a str) -> Section<'a> {
        let options =
            self.sections.get(name).or_else(|| self.sections.get(&name.to_lowercase()));
        Section { name, options }
    }
}

struct Section<'a> {
    name: &'a str,
    options: Option<&'a HashMap<String, Value>>,
}

impl<'a> Section<'a> {
    fn value(&self, key: &str) -> Option<Value> {
        self.options.and_then(|options| options.get(key)).cloned()
    }

    fn get_str(&self, key: &str) -> Result<Option<String>, WavefrontError> {
        self.value(key).map(|value| value.into_str().map_err(|err| self.wrong_value(key, err))).transpose()
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>, WavefrontError> {
        self.value(key).map(|value| value.into_bool().map_err(|err| self.wrong_value(key, err))).transpose()
    }

    fn get_int(&self, key: &str) -> Result<Option<i64>, WavefrontError> {
        self.value(key).map(|value| value.into_int().map_err(|err| self.wrong_value(key, err))).transpose()
    }

    /// `None` if the section does not exist.
    fn deserialize<T: DeserializeOwned>(&self) -> Option<Result<T, ConfigError>> {
        self.options.map(|options| Value::from(options.clone()).try_into::<T>())
    }

    fn wrong_value(&self, key: &str, err: ConfigError) -> WavefrontError {
        WavefrontError::ConfigurationError {
            message: format!("Wrong value for [{}] in section [{}]. Err: {}", key, self.name, err),
        }
    }
}

#[cfg(test)]
mod test {

    use super::*;

    fn registry() -> CommandRegistry {
        CommandRegistry::with_builtin_commands().unwrap()
    }

    #[test]
    fn should_use_the_defaults_if_the_global_section_is_missing() {
        // Act
        let config = GlobalConfiguration::load_from_str("", &registry()).unwrap();

        // Assert
        assert_eq!(ProcessOptions::default(), config.options);
        assert_eq!("wavefront.out", config.options.out);
        assert_eq!("wavefront.pid", config.options.pid);
        assert!(config.task_names.is_empty());
        assert!(config.tasks.is_empty());
        assert!(config.logger.is_none());
    }

    #[test]
    fn should_read_the_global_section() {
        // Arrange
        let content = r#"
[global]
daemon = true
verbose = true
debug = yes
out = /tmp/wf.out
pid = /tmp/wf.pid
"#;

        // Act
        let config = GlobalConfiguration::load_from_str(content, &registry()).unwrap();

        // Assert
        assert_eq!(
            ProcessOptions {
                daemon: true,
                verbose: true,
                debug: true,
                out: "/tmp/wf.out".to_owned(),
                pid: "/tmp/wf.pid".to_owned(),
            },
            config.options
        );
        assert_eq!("debug", config.logger_config().level);
    }

    #[test]
    fn should_read_the_tasks() {
        // Arrange
        let content = r#"
[global]
verbose = true
threads = checker, aws

[thread-checker]
command = systemchecker
args = --core-dir /var/crash --unknown-flag

[thread-aws]
command = awsmetrics
args = --namespaces=AWS/EC2,AWS/ELB
delay = 5
"#;

        // Act
        let config = GlobalConfiguration::load_from_str(content, &registry()).unwrap();

        // Assert
        assert_eq!(vec!["checker".to_owned(), "aws".to_owned()], config.task_names);
        assert_eq!(2, config.tasks.len());

        let checker = &config.tasks[0];
        assert_eq!("checker", checker.name);
        assert_eq!("systemchecker", checker.command);
        assert_eq!(Some("/var/crash"), checker.args.value_of("core-dir"));
        assert!(checker.args.verbose);
        assert_eq!(0, checker.delay);
        assert_eq!(0, checker.args.delay);

        let aws = &config.tasks[1];
        assert_eq!("awsmetrics", aws.command);
        assert_eq!(Some("AWS/EC2"), aws.args.value_of("namespaces"));
        assert_eq!(5, aws.delay);
        assert_eq!(5, aws.args.delay);
    }

    #[test]
    fn should_fail_if_a_task_references_an_unknown_command() {
        // Arrange
        let content = r#"
[global]
threads = c

[thread-c]
command = doesnotexist
"#;

        // Act
        let result = GlobalConfiguration::load_from_str(content, &registry());

        // Assert
        match result {
            Err(WavefrontError::UnknownCommandError { name }) => assert_eq!("doesnotexist", name),
            _ => assert!(false),
        }
    }

    #[test]
    fn should_fail_if_a_task_section_is_missing() {
        let content = "[global]\nthreads = missing\n";
        match GlobalConfiguration::load_from_str(content, &registry()) {
            Err(WavefrontError::ConfigurationError { message }) => assert!(message.contains("missing")),
            _ => assert!(false),
        }
    }

    #[test]
    fn should_fail_on_wrong_delay() {
        let content = "[global]\nthreads = a\n\n[thread-a]\ncommand = systemchecker\ndelay = soon\n";
        assert!(GlobalConfiguration::load_from_str(content, &registry()).is_err());

        let content = "[global]\nthreads = a\n\n[thread-a]\ncommand = systemchecker\ndelay = -1\n";
        assert!(GlobalConfiguration::load_from_str(content, &registry()).is_err());
    }

    #[test]
    fn should_fail_on_wrong_boolean() {
        let content = "[global]\ndaemon = maybe\n";
        match GlobalConfiguration::load_from_str(content, &registry()) {
            Err(WavefrontError::ConfigurationError { .. }) => {}
            _ => assert!(false),
        }
    }

    #[test]
    fn should_read_option_names_case_insensitively() {
        // Arrange
        let content = r#"
[global]
Threads = a
Daemon = true
VERBOSE = yes

[thread-a]
Command = systemchecker
Args = --core-dir /var/crash
Delay = 3

[logger]
Level = warn
"#;

        // Act
        let config = GlobalConfiguration::load_from_str(content, &registry()).unwrap();

        // Assert
        assert!(config.options.daemon);
        assert!(config.options.verbose);
        assert_eq!(1, config.tasks.len());
        assert_eq!("systemchecker", config.tasks[0].command);
        assert_eq!(Some("/var/crash"), config.tasks[0].args.value_of("core-dir"));
        assert_eq!(3, config.tasks[0].delay);
        assert_eq!("warn", config.logger_config().level);
    }

    #[test]
    fn should_fail_on_options_outside_of_any_section() {
        let content = "threads = a

[global]
verbose = true
";
        match GlobalConfiguration::load_from_str(content, &registry()) {
            Err(WavefrontError::ConfigurationError { message }) => assert!(message.contains("threads")),
            _ => assert!(false),
        }
    }

    #[test]
    fn should_read_the_logger_section() {
        // Arrange
        let content = "[global]\ndebug = true\n\n[logger]\nlevel = warn\n";

        // Act
        let config = GlobalConfiguration::load_from_str(content, &registry()).unwrap();

        // Assert
        assert_eq!(
            Some(LoggerConfig { level: "warn".to_owned(), stdout_output: true }),
            config.logger
        );
        assert_eq!("warn", config.logger_config().level);
    }

    #[test]
    fn should_ignore_a_malformed_logger_section() {
        // Arrange
        let content = "[global]\nverbose = false\n\n[logger]\nstdout_output = sometimes\n";

        // Act
        let config = GlobalConfiguration::load_from_str(content, &registry()).unwrap();

        // Assert
        assert!(config.logger.is_none());
        assert_eq!("info", config.logger_config().level);
    }
}
