use clap::Arg;
use log::*;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use wavefront_command_common::{split_list, ArgParser, Command, CommandArgs, CommandError};

pub const AWS_DEFAULT_METADATA_URL: &str = "http://169.254.169.254/latest";
pub const AWS_DEFAULT_NAMESPACES: &str = "AWS/EC2";
const IDENTITY_DOCUMENT_PATH: &str = "/dynamic/instance-identity/document";
const LOGGER: &str = "wavefront::awsmetrics";

/// The identity of the EC2 instance the command runs on.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceIdentity {
    pub instance_id: String,
    pub region: String,
    pub availability_zone: String,
    #[serde(default)]
    pub instance_type: Option<String>,
}

pub struct AwsMetricsCommand {
    client: Client,
    verbose: bool,
}

impl AwsMetricsCommand {
    pub fn new() -> Result<Self, CommandError> {
        let client = Client::builder().build().map_err(|err| CommandError::ConfigurationError {
            message: format!("Error while building the AWS metadata client. Err: {:?}", err),
        })?;
        Ok(AwsMetricsCommand { client, verbose: false })
    }

    pub fn boxed() -> Result<Box<dyn Command>, CommandError> {
        Ok(Box::new(Self::new()?))
    }

    pub fn instance_identity(
        &self,
        metadata_url: &str,
        timeout: Duration,
    ) -> Result<InstanceIdentity, CommandError> {
        let url = format!("{}{}", metadata_url.trim_end_matches('/'), IDENTITY_DOCUMENT_PATH);
        trace!(target: LOGGER, "AwsMetrics - HTTP GET - url: {}", url);

        let response = self.client.get(&url).timeout(timeout).send().map_err(|err| {
            CommandError::execution(format!(
                "Cannot read the instance identity from {}. Err: {}",
                url, err
            ))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CommandError::execution(format!(
                "Failed response returned from the instance metadata service. Response status: {:?}",
                status
            )));
        }

        response.json().map_err(|err| {
            CommandError::execution(format!("Cannot parse the instance identity. Err: {}", err))
        })
    }
}

impl Command for AwsMetricsCommand {
    fn description(&self) -> &str {
        "AWS metrics retriever"
    }

    fn help_text(&self) -> &'static str {
        "Report the AWS metrics of this instance"
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
                Arg::new("metadata-url")
                    .long("metadata-url")
                    .takes_value(true)
                    .default_value(AWS_DEFAULT_METADATA_URL)
                    .help("The base URL of the EC2 instance metadata service"),
            )
            .arg(
                Arg::new("namespaces")
                    .long("namespaces")
                    .takes_value(true)
                    .default_value(AWS_DEFAULT_NAMESPACES)
                    .help("Comma separated list of the CloudWatch namespaces to report"),
            )
            .arg(
                Arg::new("timeout-secs")
                    .long("timeout-secs")
                    .takes_value(true)
                    .default_value("2")
                    .help("The call timeout in seconds"),
            )
    }

    fn execute(&mut self, args: &CommandArgs) -> Result<(), CommandError> {
        let metadata_url = args.value_of("metadata-url").unwrap_or(AWS_DEFAULT_METADATA_URL);
        let namespaces = split_list(args.value_of("namespaces").unwrap_or(AWS_DEFAULT_NAMESPACES));
        let timeout_secs = args.parse_value::<u64>("timeout-secs")?.unwrap_or(2);

        if namespaces.is_empty() {
            return Err(CommandError::WrongArgumentError {
                message: "At least one CloudWatch namespace must be specified".to_owned(),
            });
        }

        let identity = self.instance_identity(metadata_url, Duration::from_secs(timeout_secs))?;

        info!(
            target: LOGGER,
            "Instance [{}] in region [{}] availability zone [{}]",
            identity.instance_id,
            identity.region,
            identity.availability_zone
        );
        for namespace in &namespaces {
            info!(
                target: LOGGER,
                "Reporting namespace [{}] for instance [{}]", namespace, identity.instance_id
            );
        }
        if self.verbose {
            debug!(target: LOGGER, "Instance identity: {:?}", identity);
        }
        Ok(())
    }
}
