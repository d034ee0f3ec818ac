//! # roster-core: Foundational Types for the Roster Service
//!
//! Defines the data model shared by the schema validator and the API layer.
//!
//! ## Key Design Principles
//!
//! 1. **Profiles are open documents.** A [`Profile`] is an identifier plus an
//!    insertion-ordered JSON object. The JSON schemas are the only source of
//!    structural constraints; nothing here hard-codes profile fields.
//!
//! 2. **The store owns identity.** [`ProfileId`] values are assigned by the
//!    persistence layer. Client payloads never carry one: [`strip_id`] removes
//!    the [`ID_FIELD`] before any insert or merge.
//!
//! 3. **Updates merge, never replace.** [`merge_fields`] overwrites the fields
//!    named in a patch and leaves every other field untouched.
//!
//! 4. **Filters fail loudly.** A [`Filter`] accepts equality and a fixed set
//!    of comparison operators; anything else is a [`FilterError`], never a
//!    silently empty match.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `roster-*` crates (this is the leaf of the DAG).
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod document;
pub mod filter;
pub mod identity;

pub use document::{merge_fields, strip_id, Document, Profile, ID_FIELD, NAME_FIELD};
pub use filter::{Condition, Filter, FilterError, Operator};
pub use identity::{ProfileId, ProfileIdError};
