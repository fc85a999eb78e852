//! Domain types shared across the migration pipeline.

pub mod error;
pub mod identity;
pub mod target;

pub use error::{MigrateError, Result};
pub use identity::{Identity, IdentityMapping};
pub use target::{ImportDestination, MigrationTarget, TargetKind};
