use crate::{ArgParser, CommandError};
use clap::{Arg, ArgMatches};
use log::*;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// The ids of the arguments clap adds by itself to every parser.
/// `version` is dropped again when the parser is built, so the matches never know it.
const GENERATED_ARGUMENTS: [&str; 2] = ["help", "version"];

fn is_generated(arg: &Arg<'static>) -> bool {
    GENERATED_ARGUMENTS.contains(&arg.get_id())
}

/// The arguments of a single command invocation.
///
/// It holds the values parsed against the argument declaration of the command, plus
/// the `verbose` and `delay` settings overlaid by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandArgs {
    values: BTreeMap<String, Vec<String>>,
    flags: BTreeSet<String>,
    pub verbose: bool,
    pub delay: u64,
}

impl CommandArgs {
    /// Extracts the arguments declared by `parser` from the matches produced by it.
    pub fn from_matches(parser: &ArgParser, matches: &ArgMatches) -> Self {
        let mut args = CommandArgs::default();
        for arg in parser.get_arguments().filter(|arg| !is_generated(arg)) {
            let id = arg.get_id();
            if arg.is_takes_value_set() {
                if let Some(values) = matches.values_of(id) {
                    args.values.insert(id.to_owned(), values.map(|value| value.to_owned()).collect());
                }
            } else if matches.is_present(id) {
                args.flags.insert(id.to_owned());
            }
        }
        args
    }

    pub fn with_value<I: Into<String>, V: Into<String>>(mut self, id: I, value: V) -> Self {
        self.values.entry(id.into()).or_insert_with(Vec::new).push(value.into());
        self
    }

    pub fn with_flag<I: Into<String>>(mut self, id: I) -> Self {
        self.flags.insert(id.into());
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_delay(mut self, delay: u64) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the first value of the argument, if any.
    pub fn value_of(&self, id: &str) -> Option<&str> {
        self.values.get(id).and_then(|values| values.first()).map(|value| value.as_str())
    }

    pub fn values_of(&self, id: &str) -> Vec<&str> {
        self.values
            .get(id)
            .map(|values| values.iter().map(|value| value.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn is_present(&self, id: &str) -> bool {
        self.flags.contains(id) || self.values.contains_key(id)
    }

    /// Parses the first value of the argument into `T`.
    pub fn parse_value<T: FromStr>(&self, id: &str) -> Result<Option<T>, CommandError>
    where
        T::Err: std::fmt::Display,
    {
        match self.value_of(id) {
            Some(value) => value.parse::<T>().map(Some).map_err(|err| {
                CommandError::WrongArgumentError {
                    message: format!("Cannot parse argument [{}] value [{}]. Err: {}", id, value, err),
                }
            }),
            None => Ok(None),
        }
    }
}

/// Parses `tokens` against `parser` ignoring every token the parser does not declare.
///
/// Known options keep their value, given either inline (`--name=value`, `-nvalue`) or as
/// the following token. Positional tokens are kept only if the parser declares
/// positional arguments.
pub fn parse_known_args(parser: ArgParser, tokens: &[String]) -> Result<CommandArgs, clap::Error> {
    let known = KnownArguments::from_parser(&parser);
    let accepted = known.filter(tokens);
    let matches = parser.clone().no_binary_name(true).try_get_matches_from(accepted)?;
    Ok(CommandArgs::from_matches(&parser, &matches))
}

/// Splits a list value on commas and whitespaces, dropping the empty items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

struct KnownOption {
    long: Option<String>,
    short: Option<char>,
    takes_value: bool,
}

struct KnownArguments {
    options: Vec<KnownOption>,
    accepts_positionals: bool,
}

impl KnownArguments {
    fn from_parser(parser: &ArgParser) -> Self {
        let mut options = vec![];
        let mut accepts_positionals = false;
        for arg in parser.get_arguments().filter(|arg| !is_generated(arg)) {
            if arg.is_positional() {
                accepts_positionals = true;
            } else {
                options.push(KnownOption::from_arg(arg));
            }
        }
        KnownArguments { options, accepts_positionals }
    }

    fn find_long(&self, name: &str) -> Option<&KnownOption> {
        self.options.iter().find(|option| option.long.as_deref() == Some(name))
    }

    fn find_short(&self, name: char) -> Option<&KnownOption> {
        self.options.iter().find(|option| option.short == Some(name))
    }

    fn filter(&self, tokens: &[String]) -> Vec<String> {
        let mut accepted = vec![];
        let mut iter = tokens.iter();

        while let Some(token) = iter.next() {
            if token == "--" {
                if self.accepts_positionals {
                    accepted.push(token.clone());
                    accepted.extend(iter.cloned());
                }
                break;
            }

            let option = if let Some(long) = token.strip_prefix("--") {
                let (name, inline_value) = match long.split_once('=') {
                    Some((name, value)) => (name, Some(value)),
                    None => (long, None),
                };
                self.find_long(name).map(|option| (option, inline_value.is_some()))
            } else if let Some(short) = token.strip_prefix('-').filter(|short| !short.is_empty()) {
                let mut chars = short.chars();
                chars.next().and_then(|name| self.find_short(name)).map(|option| {
                    let has_inline_value = !chars.as_str().is_empty();
                    (option, has_inline_value)
                })
            } else {
                if self.accepts_positionals {
                    accepted.push(token.clone());
                } else {
                    debug!("Ignoring unrecognized argument [{}]", token);
                }
                continue;
            };

            match option {
                Some((option, has_inline_value)) => {
                    accepted.push(token.clone());
                    if option.takes_value && !has_inline_value {
                        if let Some(value) = iter.next() {
                            accepted.push(value.clone());
                        }
                    }
                }
                None => debug!("Ignoring unrecognized argument [{}]", token),
            }
        }

        accepted
    }
}

impl KnownOption {
    fn from_arg(arg: &Arg<'static>) -> Self {
        KnownOption {
            long: arg.get_long().map(|long| long.to_owned()),
            short: arg.get_short(),
            takes_value: arg.is_takes_value_set(),
        }
    }
}
