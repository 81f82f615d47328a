//! Sections: named groups of settings resolved through a level chain.

mod accessor;
mod mutation;
mod registry;

use serde::Serialize;
use serde_json::Value;

use crate::scope::{OverrideMode, Scope};

pub use accessor::SectionAccessor;
pub use mutation::{ContentChange, MutationSet, SectionMutation, StagedMutation};
pub use registry::{AllowDefinition, SectionDefinition, SectionRegistry};

/// A section as seen from one scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub name: String,
    pub scope: Scope,
    /// Most specific level of the scope's chain.
    pub location: String,
    /// Level the value comes from; `None` when the registered default applies.
    pub owning_location: Option<String>,
    pub value: Value,
    /// Stored at `location` itself rather than inherited.
    pub is_locally_stored: bool,
    /// Mode declared at `location`.
    pub override_mode: OverrideMode,
    /// Mode in force at `location` after walking the chain.
    pub override_mode_effective: OverrideMode,
    /// The view includes staged edits that are not in the live store yet.
    pub dirty: bool,
}
