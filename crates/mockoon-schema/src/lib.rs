//! Data model and schema handling for Mockoon environment data files.
//!
//! This crate defines the schema layer: extraction of environment definitions
//! from bare or bundled data files (`container`), the ordered schema migration
//! chain (`migration`), validation with auto-repair into the typed
//! [`Environment`] (`validate`), and the canonical process name ([`ProcessName`]).

pub mod container;
pub mod environment;
pub mod migration;
pub mod types;
pub mod validate;

pub use container::{extract_environments, parse_data_file, parse_data_str, DataError};
pub use environment::{
    Environment, Header, RawEnvironment, Route, RouteResponse, TlsOptions, DEFAULT_HOSTNAME,
    SCHEMA_VERSION_KEY,
};
pub use migration::{migrate, MigrationError, MigrationStep, CURRENT_SCHEMA_VERSION, MIGRATIONS};
pub use types::{ProcessName, PROCESS_PREFIX};
pub use validate::{validate, ValidationError};
