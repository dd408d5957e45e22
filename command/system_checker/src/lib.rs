use clap::Arg;
use log::*;
use std::fs;
use std::path::{Path, PathBuf};
use wavefront_command_common::{ArgParser, Command, CommandArgs, CommandError};

pub const LOADAVG_PATH: &str = "/proc/loadavg";
const CORE_FILE_PREFIX: &str = "core";
const LOGGER: &str = "wavefront::systemchecker";

/// The 1, 5 and 15 minutes load averages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

impl LoadAverage {
    pub fn parse(content: &str) -> Result<LoadAverage, CommandError> {
        let mut fields = content.split_whitespace().map(|field| {
            field.parse::<f64>().map_err(|err| {
                CommandError::execution(format!("Cannot parse load average [{}]. Err: {}", field, err))
            })
        });
        let mut next = || {
            fields.next().unwrap_or_else(|| {
                Err(CommandError::execution(format!("Wrong load average format [{}]", content)))
            })
        };
        Ok(LoadAverage { one: next()?, five: next()?, fifteen: next()? })
    }

    pub fn max(&self) -> f64 {
        self.one.max(self.five).max(self.fifteen)
    }
}

/// Checks the health of the local system: load average and core dump files.
#[derive(Default)]
pub struct SystemCheckerCommand {
    verbose: bool,
}

impl SystemCheckerCommand {
    pub fn new() -> SystemCheckerCommand {
        Default::default()
    }

    pub fn boxed() -> Result<Box<dyn Command>, CommandError> {
        Ok(Box::new(Self::new()))
    }

    /// Returns the core dump files found in the directory.
    pub fn find_core_files(&self, core_dir: &Path) -> Result<Vec<PathBuf>, CommandError> {
        let entries = fs::read_dir(core_dir).map_err(|err| {
            CommandError::execution(format!(
                "Cannot access core directory [{}]: {}",
                core_dir.display(),
                err
            ))
        })?;

        let mut core_files = vec![];
        for entry in entries {
            let path = entry
                .map_err(|err| {
                    CommandError::execution(format!("Cannot read the directory entry. Err: {}", err))
                })?
                .path();
            let is_core_file = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(CORE_FILE_PREFIX))
                .unwrap_or(false);
            if is_core_file && path.is_file() {
                core_files.push(path);
            }
        }
        core_files.sort();
        Ok(core_files)
    }

    fn check_load(&self, loadavg_path: &Path, max_load: f64) -> Result<(), CommandError> {
        if !loadavg_path.exists() {
            debug!(target: LOGGER, "[{}] not available, load check skipped", loadavg_path.display());
            return Ok(());
        }
        let content = fs::read_to_string(loadavg_path).map_err(|err| {
            CommandError::execution(format!("Cannot read [{}]. Err: {}", loadavg_path.display(), err))
        })?;
        let load = LoadAverage::parse(&content)?;
        if load.max() > max_load {
            warn!(
                target: LOGGER,
                "Load average {} {} {} is above the threshold {}",
                load.one,
                load.five,
                load.fifteen,
                max_load
            );
        } else if self.verbose {
            info!(target: LOGGER, "Load average {} {} {}", load.one, load.five, load.fifteen);
        }
        Ok(())
    }
}

impl Command for SystemCheckerCommand {
    fn description(&self) -> &str {
        "System checker"
    }

    fn help_text(&self) -> &'static str {
        "Check the local system for high load and core dump files"
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
                Arg::new("core-dir")
                    .long("core-dir")
                    .takes_value(true)
                    .help("The directory where core dump files are written"),
            )
            .arg(
                Arg::new("max-load")
                    .long("max-load")
                    .takes_value(true)
                    .help("Warn if the load average is above this value"),
            )
            .arg(
                Arg::new("loadavg-path")
                    .long("loadavg-path")
                    .takes_value(true)
                    .default_value(LOADAVG_PATH)
                    .hide(true),
            )
    }

    fn execute(&mut self, args: &CommandArgs) -> Result<(), CommandError> {
        if let Some(max_load) = args.parse_value::<f64>("max-load")? {
            let loadavg_path = args.value_of("loadavg-path").unwrap_or(LOADAVG_PATH);
            self.check_load(Path::new(loadavg_path), max_load)?;
        }

        if let Some(core_dir) = args.value_of("core-dir") {
            let core_files = self.find_core_files(Path::new(core_dir))?;
            for core_file in &core_files {
                warn!(target: LOGGER, "Found core file [{}]", core_file.display());
            }
            if core_files.is_empty() {
                info!(target: LOGGER, "No core files found in [{}]", core_dir);
            }
        }

        Ok(())
    }
}
