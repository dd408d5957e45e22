use httpmock::Method::GET;
use httpmock::MockServer;
use maplit::btreeset;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use wavefront_command_common::CommandArgs;
use wavefront_runner::cancellation::CancellationCoordinator;
use wavefront_runner::config::GlobalConfiguration;
use wavefront_runner::error::WavefrontError;
use wavefront_runner::orchestrator::{execute_command, TaskOrchestrator};
use wavefront_runner::registry::CommandRegistry;

#[test]
fn should_start_a_thread_for_each_configured_task() {
    // Arrange
    let server = MockServer::start();
    let identity = server.mock(|when, then| {
        when.method(GET).path("/latest/dynamic/instance-identity/document");
        then.status(200).header("content-type", "application/json").body(
            r#"{"instanceId": "i-42", "region": "eu-west-1", "availabilityZone": "eu-west-1b"}"#,
        );
    });
    let content = format!(
        r#"
[global]
threads = a, b

[thread-a]
command = systemchecker
args =

[thread-b]
command = awsmetrics
args = --metadata-url {}
delay = 5
"#,
        server.url("/latest")
    );
    let registry = Arc::new(CommandRegistry::with_builtin_commands().unwrap());
    let config = GlobalConfiguration::load_from_str(&content, &registry).unwrap();
    let orchestrator = TaskOrchestrator::new(registry, CancellationCoordinator::new())
        .with_poll_interval(Duration::from_millis(50));

    // Act
    let report = orchestrator.run_all(&config).unwrap();

    // Assert
    assert_eq!(vec![0, 5], config.tasks.iter().map(|task| task.delay).collect::<Vec<_>>());
    assert_eq!(2, report.started);
    assert!(!report.cancelled);
    let finished: BTreeSet<String> = report.finished.into_iter().collect();
    assert_eq!(btreeset! {"a".to_owned(), "b".to_owned()}, finished);
    identity.assert();
}

#[test]
fn should_fail_to_build_the_configuration_before_starting_any_thread() {
    // Arrange
    let content = r#"
[global]
threads = a, c

[thread-a]
command = systemchecker

[thread-c]
command = doesnotexist
"#;
    let registry = CommandRegistry::with_builtin_commands().unwrap();

    // Act
    let result = GlobalConfiguration::load_from_str(content, &registry);

    // Assert
    match result {
        Err(WavefrontError::UnknownCommandError { name }) => assert_eq!("doesnotexist", name),
        _ => assert!(false),
    }
}

#[test]
fn should_print_bad_key_if_newrelic_fails_without_verbose() {
    // Arrange
    let registry = CommandRegistry::with_builtin_commands().unwrap();
    let args = CommandArgs::default().with_value("api-key", " ");
    let mut out = vec![];

    // Act
    let result = execute_command(&registry, "newrelic", &args, &mut out);

    // Assert
    assert!(result.is_ok());
    assert_eq!("bad key\n", String::from_utf8(out).unwrap());
}

#[test]
fn should_propagate_bad_key_if_newrelic_fails_with_verbose() {
    // Arrange
    let registry = CommandRegistry::with_builtin_commands().unwrap();
    let args = CommandArgs::default().with_value("api-key", " ").with_verbose(true);

    // Act
    let result = execute_command(&registry, "newrelic", &args, &mut vec![]);

    // Assert
    match result {
        Err(err) => assert_eq!("bad key", format!("{}", err)),
        Ok(()) => assert!(false),
    }
}
