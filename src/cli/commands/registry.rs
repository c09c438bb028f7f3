use clap::{Arg, ArgMatches, Command};

pub const ARG_DSN: &str = "dsn";
pub const ARG_WHITELIST: &str = "whitelist";

#[derive(Debug, Clone)]
pub struct Options {
    pub dsn: Option<String>,
    pub whitelist: String,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            dsn: matches
                .get_one::<String>(ARG_DSN)
                .cloned()
                .filter(|v| !v.trim().is_empty()),
            whitelist: matches
                .get_one::<String>(ARG_WHITELIST)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string")
                .long_help(
                    "Postgres connection string for the caller registry. Without it, callers are kept in memory and lost on restart.",
                )
                .env("PASSAGE_DSN"),
        )
        .arg(
            Arg::new(ARG_WHITELIST)
                .long(ARG_WHITELIST)
                .help("Comma-separated callers allowed to log in: '*', a homeserver domain or a full Matrix ID")
                .env("PASSAGE_WHITELIST")
                .default_value(""),
        )
}
