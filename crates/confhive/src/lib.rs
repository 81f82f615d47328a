//! Hierarchical configuration store.
//!
//! Global settings are overridden by site and application level files.
//! Each named section can be locked against overrides below a level, and
//! edits can be batched across requests into a transaction that commits
//! all or nothing.

pub mod api;
pub mod error;
pub mod scope;
pub mod section;
pub mod service;
pub mod settings;
pub mod sites;
pub mod store;
pub mod transaction;
pub mod unit;

pub use error::{ConfigError, ConfigResult};
pub use scope::{OverrideMode, Scope};
pub use section::{Section, SectionMutation, SectionRegistry};
pub use service::ConfigService;
pub use unit::{ManagementUnit, UnitContext};
