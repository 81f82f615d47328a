//! API request handlers, organized by resource:
//! - `sections`: section read, write and revert at a scope
//! - `sites`: the sites registry
//! - `transactions`: transaction lifecycle
//! - `misc`: health check

mod misc;
mod sections;
mod sites;
mod transactions;

pub use misc::health;
pub use sections::{
    ScopeQuery, SectionMetadata, SectionPatch, SectionResponse, delete_section, get_section,
    list_sections, patch_section,
};
pub use sites::{create_site, delete_site, get_site, list_sites, patch_site};
pub use transactions::{
    TransactionPatch, create_transaction, get_transaction, list_transactions, patch_transaction,
};
