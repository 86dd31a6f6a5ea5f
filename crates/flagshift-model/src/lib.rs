//! flagshift data model
//!
//! Typed views of everything that crosses the migration boundary:
//!
//! - [`snapshot`]: resources as read from the cached source snapshots
//! - [`body`]: creation bodies accepted by the destination API
//! - [`patch`]: the JSON-Patch subset the destination accepts
//!
//! Optional fields are modelled as `Option` and skipped on serialization, so a
//! body never carries a `null` or `false` placeholder the source did not have.

#![warn(unreachable_pub)]

pub mod body;
pub mod patch;
pub mod snapshot;

pub use body::{
    EnvironmentCreateBody, FlagAvailability, FlagCreateBody, ProjectAvailability,
    ProjectCreateBody, SegmentCreateBody, VariationBody,
};
pub use patch::{PatchOp, PatchOperation};
pub use snapshot::{
    ClientSideAvailability, EnvironmentSnapshot, FlagDefaults, FlagEnvironmentConfig,
    FlagSnapshot, ItemList, ProjectSnapshot, Rule, SegmentSnapshot, Variation,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
