//! Cross-correlation of astronomical source catalogs.
//!
//! Source catalogs are matched by nearest neighbor within a correlation
//! radius and merged into a master catalog holding one row per physical
//! object, with every source kept as a row-aligned extension.

pub mod catalogs;
pub mod config;
pub mod correlation;
mod error;
pub mod master;
mod progress;

pub use catalogs::{ColumnType, Schema, SkyPosition, Table, Value};
pub use correlation::{clean_duplicates, combine, correlate, MatchOptions, MatchResult, Radius};
pub use error::{McError, Result};
pub use master::store::MasterFile;
pub use master::MasterCatalog;

#[cfg(feature = "pybindings")]
mod pybindings;
