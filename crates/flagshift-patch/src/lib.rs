//! flagshift patch compiler
//!
//! Turns source state into the ordered patch operations the destination
//! management API accepts.
//!
//! # Core Concepts
//!
//! - [`PatchCompiler`]: field patches, ordered rule appends, segment and
//!   flag-environment patch lists
//! - [`FieldExclusionTable`]: declarative table of derived/read-only fields
//!   that never reach the destination
//! - [`pointer`]: JSON pointer construction with segment escaping
//!
//! # Example
//!
//! ```rust
//! use flagshift_patch::PatchCompiler;
//! use flagshift_model::Rule;
//!
//! let compiler = PatchCompiler::new();
//! let rules = vec![Rule::default(), Rule::default()];
//! let ops = compiler.compile_rules(&rules, Some("environments/production"));
//! assert_eq!(ops.len(), 2);
//! assert_eq!(ops[0].path, "/environments/production/rules/-");
//! ```

#![warn(unreachable_pub)]

mod compiler;
mod error;
mod exclusion;
pub mod pointer;

pub use compiler::PatchCompiler;
pub use error::PatchError;
pub use exclusion::{ExclusionReason, FieldExclusionTable, FilteredFields};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
