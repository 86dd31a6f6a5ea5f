//! Command-line definition

use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

/// Environment variable holding the API access token
pub const API_KEY_ENV: &str = "FLAGSHIFT_API_KEY";
/// Environment variable holding the API domain
pub const DOMAIN_ENV: &str = "FLAGSHIFT_DOMAIN";

/// Full `flagshift` command
#[must_use]
pub fn command() -> Command {
    Command::new("flagshift")
        .version(crate::VERSION)
        .about("Copy feature-flag projects between management API accounts")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML config file; flags and environment variables override it"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::Count)
                .help("Raise log verbosity (debug, then trace)"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(["text", "json"])
                .help("Log output format"),
        )
        .subcommand(
            connection_args(project_args(
                Command::new("source").about("Download source projects into the snapshot directory"),
            ))
            .arg(
                Arg::new("page-size")
                    .long("page-size")
                    .value_parser(value_parser!(usize))
                    .help("Flags requested per index page"),
            ),
        )
        .subcommand(
            connection_args(project_args(
                Command::new("migrate").about("Recreate cached source projects in the destination account"),
            ))
            .arg(
                Arg::new("destination")
                    .long("destination")
                    .short('d')
                    .conflicts_with_all(["suffix", "all-projects"])
                    .help("Destination project key (single source project only)"),
            )
            .arg(
                Arg::new("suffix")
                    .long("suffix")
                    .short('n')
                    .help("Append to each destination key (`-suffix`) and name (` suffix`)"),
            )
            .arg(
                Arg::new("concurrency")
                    .long("concurrency")
                    .value_parser(value_parser!(usize))
                    .help("Projects migrated at once"),
            )
            .arg(
                Arg::new("max-retries")
                    .long("max-retries")
                    .value_parser(value_parser!(u32))
                    .help("Rate-limit retries per request before giving up"),
            )
            .arg(
                Arg::new("min-interval-ms")
                    .long("min-interval-ms")
                    .value_parser(value_parser!(u64))
                    .help("Minimum spacing between requests in milliseconds"),
            )
            .arg(
                Arg::new("strict-create")
                    .long("strict-create")
                    .action(ArgAction::SetTrue)
                    .help("Skip patches for resources whose create call failed"),
            )
            .arg(
                Arg::new("env")
                    .long("env")
                    .short('e')
                    .action(ArgAction::Append)
                    .help("Only patch flags in this environment (repeatable)"),
            )
            .arg(
                Arg::new("report-file")
                    .long("report-file")
                    .value_parser(value_parser!(PathBuf))
                    .help("Write the batch report as JSON"),
            ),
        )
}

fn project_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("project")
            .long("project")
            .short('p')
            .action(ArgAction::Append)
            .num_args(1..)
            .conflicts_with("all-projects")
            .help("Source project key (repeatable)"),
    )
    .arg(
        Arg::new("all-projects")
            .long("all-projects")
            .short('a')
            .action(ArgAction::SetTrue)
            .help("Use every available source project"),
    )
    .arg(
        Arg::new("source-dir")
            .long("source-dir")
            .value_parser(value_parser!(PathBuf))
            .help("Snapshot directory [default: ./source]"),
    )
}

fn connection_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("api-key")
            .long("api-key")
            .short('k')
            .env(API_KEY_ENV)
            .hide_env_values(true)
            .help("API access token"),
    )
    .arg(
        Arg::new("domain")
            .long("domain")
            .short('u')
            .env(DOMAIN_ENV)
            .help("API domain [default: app.launchdarkly.com]"),
    )
}
