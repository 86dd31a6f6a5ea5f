//! flagshift command line
//!
//! `flagshift source` downloads projects from the source account into a
//! snapshot directory; `flagshift migrate` replays them into the
//! destination account.
//!
//! Exit codes: 0 success, 2 finished with flags or resources to review,
//! 1 fatal error, 130 interrupted.

#![warn(unreachable_pub)]

pub mod cli;
pub mod commands;
pub mod logging;
pub mod settings;

pub use commands::{exit_code, EXIT_CANCELLED, EXIT_FAILURE, EXIT_SUCCESS, EXIT_WARNINGS};
pub use logging::{init_logging, LogFormat};
pub use settings::{FileConfig, MigrateSettings, ProjectSelection, SourceSettings};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
