use std::sync::Arc;
use wavefront_common_logger::{setup_logger, LoggerConfig};
use wavefront_runner::cli::parse_invocation;
use wavefront_runner::error::WavefrontError;
use wavefront_runner::execute_invocation;
use wavefront_runner::registry::CommandRegistry;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let logger = setup_logger(&LoggerConfig::default())?;
    let registry = Arc::new(CommandRegistry::with_builtin_commands()?);

    let tokens: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match parse_invocation(&registry, &tokens) {
        Ok(invocation) => invocation,
        Err(WavefrontError::CommandLineError(err)) => err.exit(),
        Err(err) => return Err(err.into()),
    };

    execute_invocation(invocation, registry, &logger)?;
    Ok(())
}
