use crate::error::WavefrontError;
use log::*;
use std::collections::BTreeMap;
use wavefront_command_awsmetrics::AwsMetricsCommand;
use wavefront_command_common::{Command, CommandError};
use wavefront_command_newrelic::NewRelicMetricRetrieverCommand;
use wavefront_command_system_checker::SystemCheckerCommand;

pub const NEWRELIC_COMMAND: &str = "newrelic";
pub const AWSMETRICS_COMMAND: &str = "awsmetrics";
pub const SYSTEMCHECKER_COMMAND: &str = "systemchecker";

/// Creates a fresh instance of a command.
pub type CommandLoader = fn() -> Result<Box<dyn Command>, CommandError>;

/// The name of a command and the loader that builds it.
#[derive(Clone)]
pub struct CommandDescriptor {
    name: String,
    loader: CommandLoader,
}

impl CommandDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn load(&self) -> Result<Box<dyn Command>, WavefrontError> {
        (self.loader)().map_err(|err| WavefrontError::CommandLoadError {
            name: self.name.clone(),
            message: format!("{}", err),
        })
    }
}

/// The commands available to the runner, by name.
/// It is populated at startup and it is read-only afterwards.
#[derive(Default, Clone)]
pub struct CommandRegistry {
    descriptors: BTreeMap<String, CommandDescriptor>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Builds a registry with all the commands shipped with wavefront.
    pub fn with_builtin_commands() -> Result<Self, WavefrontError> {
        let mut registry = CommandRegistry::new();
        registry.register(NEWRELIC_COMMAND, NewRelicMetricRetrieverCommand::boxed)?;
        registry.register(AWSMETRICS_COMMAND, AwsMetricsCommand::boxed)?;
        registry.register(SYSTEMCHECKER_COMMAND, SystemCheckerCommand::boxed)?;
        Ok(registry)
    }

    pub fn register(&mut self, name: &str, loader: CommandLoader) -> Result<(), WavefrontError> {
        if self.descriptors.contains_key(name) {
            return Err(WavefrontError::ConfigurationError {
                message: format!("A command named [{}] is already registered", name),
            });
        }
        debug!("Registering command [{}]", name);
        self.descriptors.insert(name.to_owned(), CommandDescriptor { name: name.to_owned(), loader });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    /// Returns a new instance of the command registered with `name`.
    pub fn resolve(&self, name: &str) -> Result<Box<dyn Command>, WavefrontError> {
        self.descriptors
            .get(name)
            .ok_or_else(|| WavefrontError::UnknownCommandError { name: name.to_owned() })?
            .load()
    }

    /// The registered commands sorted by name.
    pub fn descriptors(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.descriptors.values()
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use wavefront_command_common::{ArgParser, CommandArgs};

    struct CounterCommand {
        verbose: bool,
    }

    impl Command for CounterCommand {
        fn description(&self) -> &str {
            "counter"
        }
        fn help_text(&self) -> &'static str {
            "counter help"
        }
        fn logger(&self) -> &str {
            "test::counter"
        }
        fn verbose(&self) -> bool {
            self.verbose
        }
        fn set_verbose(&mut self, verbose: bool) {
            self.verbose = verbose;
        }
        fn add_arguments(&self, parser: ArgParser) -> ArgParser {
            parser
        }
        fn execute(&mut self, _args: &CommandArgs) -> Result<(), CommandError> {
            Ok(())
        }
    }

    fn counter() -> Result<Box<dyn Command>, CommandError> {
        Ok(Box::new(CounterCommand { verbose: false }))
    }

    fn broken() -> Result<Box<dyn Command>, CommandError> {
        Err(CommandError::ConfigurationError { message: "missing library".to_owned() })
    }

    #[test]
    fn should_return_a_fresh_instance_for_each_resolution() {
        // Arrange
        let mut registry = CommandRegistry::new();
        registry.register("counter", counter).unwrap();

        // Act
        let mut first = registry.resolve("counter").unwrap();
        let second = registry.resolve("counter").unwrap();
        first.set_verbose(true);

        // Assert
        assert!(first.verbose());
        assert!(!second.verbose());
        assert!(!registry.resolve("counter").unwrap().verbose());
    }

    #[test]
    fn should_fail_to_resolve_an_unknown_command() {
        // Arrange
        let registry = CommandRegistry::with_builtin_commands().unwrap();

        // Act
        let result = registry.resolve("doesnotexist");

        // Assert
        match result {
            Err(WavefrontError::UnknownCommandError { name }) => assert_eq!("doesnotexist", name),
            _ => assert!(false),
        }
    }

    #[test]
    fn should_propagate_load_errors_on_resolution() {
        // Arrange
        let mut registry = CommandRegistry::new();
        registry.register("broken", broken).unwrap();

        // Act
        let result = registry.resolve("broken");

        // Assert
        match result {
            Err(WavefrontError::CommandLoadError { name, message }) => {
                assert_eq!("broken", name);
                assert!(message.contains("missing library"));
            }
            _ => assert!(false),
        }
    }

    #[test]
    fn should_reject_duplicated_names() {
        let mut registry = CommandRegistry::new();
        registry.register("counter", counter).unwrap();
        assert!(registry.register("counter", broken).is_err());
        assert!(registry.resolve("counter").is_ok());
    }

    #[test]
    fn should_register_the_builtin_commands() {
        // Act
        let registry = CommandRegistry::with_builtin_commands().unwrap();

        // Assert
        let names: Vec<&str> = registry.descriptors().map(|descriptor| descriptor.name()).collect();
        assert_eq!(vec!["awsmetrics", "newrelic", "systemchecker"], names);
        assert!(registry.contains(SYSTEMCHECKER_COMMAND));
    }
}
