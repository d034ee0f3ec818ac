//! # roster-schema: Profile Payload Validation
//!
//! Validates create and update payloads against JSON Schema documents kept
//! on disk next to the service.
//!
//! ## Runtime Validation (`validate`)
//!
//! [`SchemaValidator`] knows where the "create" and "update" schemas live and
//! reads them on every call, so schema edits take effect without a restart.
//! Key function:
//!
//! - [`SchemaValidator::validate`]: validates a JSON payload against the
//!   schema selected by [`SchemaKind`].
//!
//! ## Crate Policy
//!
//! - A payload that does not conform yields
//!   [`SchemaValidationError::ValidationFailed`] carrying every violation in
//!   the validator's traversal order.
//! - A schema that cannot be read, parsed or compiled yields a different
//!   variant. Callers decide how lenient to be about those.
//! - No network access: `$ref`s resolve only to files in the schema directory.

pub mod validate;

pub use validate::{
    SchemaKind, SchemaValidationError, SchemaValidator, ValidationViolations, Violation,
};
