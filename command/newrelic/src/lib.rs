use clap::Arg;
use log::*;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use wavefront_command_common::{ArgParser, Command, CommandArgs, CommandError};

pub const NEWRELIC_DEFAULT_API_URL: &str = "https://api.newrelic.com";
pub const NEWRELIC_API_KEY_HEADER: &str = "X-Api-Key";
const LOGGER: &str = "wavefront::newrelic";
const DEFAULT_TIMEOUT_SECS: &str = "10";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Application {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub health_status: Option<String>,
    #[serde(default)]
    pub reporting: bool,
}

#[derive(Debug, Deserialize)]
struct ApplicationList {
    applications: Vec<Application>,
}

/// A command that retrieves the status of the applications monitored by New Relic
pub struct NewRelicMetricRetrieverCommand {
    client: Client,
    verbose: bool,
}

impl NewRelicMetricRetrieverCommand {
    pub fn new() -> Result<Self, CommandError> {
        let client = Client::builder().use_rustls_tls().build().map_err(|err| {
            CommandError::ConfigurationError {
                message: format!("Error while building the New Relic client. Err: {:?}", err),
            }
        })?;
        Ok(NewRelicMetricRetrieverCommand { client, verbose: false })
    }

    pub fn boxed() -> Result<Box<dyn Command>, CommandError> {
        Ok(Box::new(Self::new()?))
    }

    /// Calls the applications API of New Relic.
    pub fn retrieve_applications(
        &self,
        api_url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Vec<Application>, CommandError> {
        let api_key = api_key.trim();
        if api_key.is_empty() || api_key.contains(char::is_whitespace) {
            return Err(CommandError::execution("bad key"));
        }

        let url = format!("{}/v2/applications.json", api_url.trim_end_matches('/'));
        trace!(target: LOGGER, "NewRelic - HTTP GET - url: {}", url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(NEWRELIC_API_KEY_HEADER, api_key)
            .timeout(timeout)
            .send()
            .map_err(|err| {
                CommandError::execution(format!("Cannot perform GET request to {}. Err: {}", url, err))
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CommandError::execution("bad key"));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CommandError::execution(format!(
                "Failed response returned from New Relic. Response status: {:?} - body: {}",
                status, body
            )));
        }

        let list: ApplicationList = response.json().map_err(|err| {
            CommandError::execution(format!("Cannot parse the New Relic response. Err: {}", err))
        })?;
        Ok(list.applications)
    }
}

impl Command for NewRelicMetricRetrieverCommand {
    fn description(&self) -> &str {
        "New Relic metric retriever"
    }

    fn help_text(&self) -> &'static str {
        "Pull the application status from New Relic"
    }

    fn logger(&self) -> &str {
        LOGGER
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    fn add_arguments(&self, parser: ArgParser) -> ArgParser {
        parser
            .arg(
                Arg::new("api-key")
                    .long("api-key")
                    .takes_value(true)
                    .help("The New Relic REST API key"),
            )
            .arg(
                Arg::new("api-url")
                    .long("api-url")
                    .takes_value(true)
                    .default_value(NEWRELIC_DEFAULT_API_URL)
                    .help("The base URL of the New Relic REST API"),
            )
            .arg(
                Arg::new("timeout-secs")
                    .long("timeout-secs")
                    .takes_value(true)
                    .default_value(DEFAULT_TIMEOUT_SECS)
                    .help("The call timeout in seconds"),
            )
    }

    fn execute(&mut self, args: &CommandArgs) -> Result<(), CommandError> {
        let api_key = args.value_of("api-key").ok_or_else(|| CommandError::MissingArgumentError {
            message: "The New Relic API key (--api-key) is not specified".to_owned(),
        })?;
        let api_url = args.value_of("api-url").unwrap_or(NEWRELIC_DEFAULT_API_URL);
        let timeout_secs = args.parse_value::<u64>("timeout-secs")?.unwrap_or(10);

        let applications =
            self.retrieve_applications(api_url, api_key, Duration::from_secs(timeout_secs))?;

        info!(target: LOGGER, "Retrieved {} application(s) from New Relic", applications.len());
        for application in &applications {
            info!(
                target: LOGGER,
                "Application [{}] id: {} - health status: {} - reporting: {}",
                application.name,
                application.id,
                application.health_status.as_deref().unwrap_or("unknown"),
                application.reporting
            );
        }
        if self.verbose {
            debug!(target: LOGGER, "Applications: {:?}", applications);
        }
        Ok(())
    }
}
