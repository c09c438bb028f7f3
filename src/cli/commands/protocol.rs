use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_PROTOCOL_URL: &str = "protocol-url";
pub const ARG_PROTOCOL_TOKEN: &str = "protocol-token";
pub const ARG_PROTOCOL_TIMEOUT: &str = "protocol-timeout";

#[derive(Debug, Clone)]
pub struct Options {
    pub url: String,
    pub token: Option<SecretString>,
    pub timeout_seconds: u64,
}

impl Options {
    /// Parse gateway arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the gateway URL is missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let url = match matches.get_one::<String>(ARG_PROTOCOL_URL).cloned() {
            Some(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => anyhow::bail!("missing required argument: --{ARG_PROTOCOL_URL}"),
        };

        let token = matches
            .get_one::<String>(ARG_PROTOCOL_TOKEN)
            .filter(|v| !v.trim().is_empty())
            .map(|v| SecretString::from(v.trim().to_string()));

        Ok(Self {
            url,
            token,
            timeout_seconds: matches
                .get_one::<u64>(ARG_PROTOCOL_TIMEOUT)
                .copied()
                .unwrap_or(30),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PROTOCOL_URL)
                .long(ARG_PROTOCOL_URL)
                .help("Base URL of the remote authentication gateway")
                .long_help(
                    "Base URL of the remote authentication gateway, example: https://gateway.tld:8443\n\nLogin steps are posted to {url}/v1/sessions/{identity}/{phone|code|password}.",
                )
                .env("PASSAGE_PROTOCOL_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_PROTOCOL_TOKEN)
                .long(ARG_PROTOCOL_TOKEN)
                .help("Bearer token sent to the gateway")
                .env("PASSAGE_PROTOCOL_TOKEN")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_PROTOCOL_TIMEOUT)
                .long(ARG_PROTOCOL_TIMEOUT)
                .help("Gateway request timeout in seconds")
                .env("PASSAGE_PROTOCOL_TIMEOUT")
                .default_value("30")
                .value_parser(clap::value_parser!(u64)),
        )
}
