use clap::{Arg, ArgMatches, Command};

pub const ARG_FINALIZE_MAX_ATTEMPTS: &str = "finalize-max-attempts";
pub const ARG_FINALIZE_BACKOFF_SECONDS: &str = "finalize-backoff-seconds";

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub max_attempts: u32,
    pub backoff_seconds: u64,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            max_attempts: matches
                .get_one::<u32>(ARG_FINALIZE_MAX_ATTEMPTS)
                .copied()
                .unwrap_or(5),
            backoff_seconds: matches
                .get_one::<u64>(ARG_FINALIZE_BACKOFF_SECONDS)
                .copied()
                .unwrap_or(2),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FINALIZE_MAX_ATTEMPTS)
                .long(ARG_FINALIZE_MAX_ATTEMPTS)
                .help("Max attempts for post-login finalization")
                .env("PASSAGE_FINALIZE_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_FINALIZE_BACKOFF_SECONDS)
                .long(ARG_FINALIZE_BACKOFF_SECONDS)
                .help("Base delay for post-login finalization retry backoff")
                .env("PASSAGE_FINALIZE_BACKOFF_SECONDS")
                .default_value("2")
                .value_parser(clap::value_parser!(u64)),
        )
}
