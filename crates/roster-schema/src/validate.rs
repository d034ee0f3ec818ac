//! # Schema Validation
//!
//! Runtime validation of profile payloads against JSON Schema documents.
//!
//! ## Loading
//!
//! Schemas are read from disk on every [`SchemaValidator::validate`] call.
//! The draft is taken from each document's `$schema` keyword. Format
//! assertions (`"format": "email"` etc.) are always enforced.
//!
//! ## Schema Resolution
//!
//! External `$ref`s are resolved by file name against the directory of the
//! schema being compiled. Nothing is fetched over the network.

use std::fmt;
use std::path::{Path, PathBuf};

use jsonschema::{Retrieve, Uri, Validator};
use serde_json::Value;
use thiserror::Error;

/// Default file name of the schema applied to create payloads.
pub const CREATE_SCHEMA_FILE: &str = "create-profile.schema.json";

/// Default file name of the schema applied to update payloads.
pub const UPDATE_SCHEMA_FILE: &str = "update-profile.schema.json";

/// Which payload shape to validate against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    /// Full profile submitted to the create endpoint.
    Create,
    /// Partial profile submitted to the update endpoint.
    Update,
}

impl SchemaKind {
    /// Return the string representation of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }

    /// Default schema file name for this kind.
    pub fn default_file_name(&self) -> &'static str {
        match self {
            Self::Create => CREATE_SCHEMA_FILE,
            Self::Update => UPDATE_SCHEMA_FILE,
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves `$ref` URIs to schema files in a local directory.
///
/// Only the last path segment of the URI is used, so both
/// `json-schema:///address.schema.json` and
/// `https://example.org/schemas/address.schema.json` resolve to
/// `<dir>/address.schema.json`.
struct LocalSchemaRetriever {
    dir: PathBuf,
}

impl Retrieve for LocalSchemaRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let uri_str = uri.as_str();
        let filename = uri_str
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| format!("cannot resolve '{uri_str}' to a schema file"))?;

        let path = self.dir.join(filename);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| format!("cannot read referenced schema {}: {e}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Error during schema validation.
#[derive(Error, Debug)]
pub enum SchemaValidationError {
    /// The payload did not conform to the schema.
    #[error("validation failed against {kind} schema:\n{violations}")]
    ValidationFailed {
        /// The schema that was validated against.
        kind: SchemaKind,
        /// Structured list of individual violations.
        violations: ValidationViolations,
    },

    /// The schema file could not be read or is not valid JSON.
    #[error("schema load error for '{path}': {reason}")]
    SchemaLoadError {
        /// Path of the schema file.
        path: String,
        /// Reason the schema could not be loaded.
        reason: String,
    },

    /// The schema is valid JSON but could not be compiled.
    #[error("validator build error for schema '{path}': {reason}")]
    ValidatorBuildError {
        /// Path of the schema file.
        path: String,
        /// Reason the validator could not be built.
        reason: String,
    },
}

impl SchemaValidationError {
    /// The violation list, when the payload itself was at fault.
    ///
    /// `None` means the validator failed internally and produced no verdict
    /// about the payload.
    pub fn violations(&self) -> Option<&ValidationViolations> {
        match self {
            Self::ValidationFailed { violations, .. } => Some(violations),
            _ => None,
        }
    }

    /// Whether this error originates from the schema rather than the payload.
    pub fn is_internal(&self) -> bool {
        self.violations().is_none()
    }
}

/// A single validation violation with structured context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON Pointer path to the violating field in the instance.
    pub instance_path: String,
    /// JSON Pointer path within the schema that triggered the error.
    pub schema_path: String,
    /// Human-readable description of the violation.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

/// Collection of validation violations, never empty when produced by
/// [`SchemaValidator::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationViolations {
    violations: Vec<Violation>,
}

impl ValidationViolations {
    /// Returns the number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Returns true if there are no violations.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns a slice of all violations.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Display form of every violation, in order.
    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }

    /// Consumes self and returns the inner Vec.
    pub fn into_inner(self) -> Vec<Violation> {
        self.violations
    }
}

impl fmt::Display for ValidationViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  {v}")?;
        }
        Ok(())
    }
}

/// Validates payloads against the create and update schemas.
///
/// Holds only the schema locations; the documents themselves are read on
/// each call. `SchemaValidator` is cheap to clone and `Send + Sync`.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    create_path: PathBuf,
    update_path: PathBuf,
}

impl SchemaValidator {
    /// Use explicit paths for the create and update schemas.
    pub fn new(create_path: impl Into<PathBuf>, update_path: impl Into<PathBuf>) -> Self {
        Self {
            create_path: create_path.into(),
            update_path: update_path.into(),
        }
    }

    /// Use the default schema file names inside `schema_dir`.
    pub fn from_dir(schema_dir: impl AsRef<Path>) -> Self {
        let dir = schema_dir.as_ref();
        Self::new(
            dir.join(SchemaKind::Create.default_file_name()),
            dir.join(SchemaKind::Update.default_file_name()),
        )
    }

    /// Location of the schema for `kind`.
    pub fn schema_path(&self, kind: SchemaKind) -> &Path {
        match kind {
            SchemaKind::Create => &self.create_path,
            SchemaKind::Update => &self.update_path,
        }
    }

    /// Read and parse the schema document for `kind`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidationError::SchemaLoadError` if the file cannot be
    /// read or is not valid JSON.
    pub fn load_schema(&self, kind: SchemaKind) -> Result<Value, SchemaValidationError> {
        let path = self.schema_path(kind);
        let content = std::fs::read_to_string(path).map_err(|e| {
            SchemaValidationError::SchemaLoadError {
                path: path.display().to_string(),
                reason: format!("cannot read file: {e}"),
            }
        })?;
        serde_json::from_str(&content).map_err(|e| SchemaValidationError::SchemaLoadError {
            path: path.display().to_string(),
            reason: format!("invalid JSON: {e}"),
        })
    }

    /// Load and compile the schema for `kind`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidationError::SchemaLoadError` if the schema cannot be
    /// loaded, `SchemaValidationError::ValidatorBuildError` if it does not compile.
    pub fn build_validator(&self, kind: SchemaKind) -> Result<Validator, SchemaValidationError> {
        let schema = self.load_schema(kind)?;
        let path = self.schema_path(kind);
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let mut opts = jsonschema::options();
        opts.should_validate_formats(true);
        opts.with_retriever(LocalSchemaRetriever { dir });
        opts.build(&schema)
            .map_err(|e| SchemaValidationError::ValidatorBuildError {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }

    /// Check that the schema for `kind` loads and compiles.
    pub fn check(&self, kind: SchemaKind) -> Result<(), SchemaValidationError> {
        self.build_validator(kind).map(|_| ())
    }

    /// Validate a payload against the schema for `kind`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidationError::ValidationFailed` with every violation
    /// when the payload does not conform, or a load/build error when the
    /// schema itself is unusable.
    pub fn validate(&self, kind: SchemaKind, payload: &Value) -> Result<(), SchemaValidationError> {
        let validator = self.build_validator(kind)?;

        let errors: Vec<Violation> = validator
            .iter_errors(payload)
            .map(|e| Violation {
                instance_path: e.instance_path.to_string(),
                schema_path: e.schema_path.to_string(),
                message: e.to_string(),
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            tracing::debug!(%kind, count = errors.len(), "payload failed schema validation");
            Err(SchemaValidationError::ValidationFailed {
                kind,
                violations: ValidationViolations { violations: errors },
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    /// Find the repository root by looking for Cargo.toml with [workspace].
    fn repo_root() -> PathBuf {
        let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        // crates/roster-schema -> repo root
        dir.pop(); // crates/
        dir.pop(); // repo root
        dir
    }

    fn repo_validator() -> SchemaValidator {
        SchemaValidator::from_dir(repo_root().join("schemas"))
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn repository_schemas_compile() {
        let validator = repo_validator();
        validator.check(SchemaKind::Create).unwrap();
        validator.check(SchemaKind::Update).unwrap();
    }

    #[test]
    fn valid_create_payload_passes() {
        let payload = json!({
            "name": "Asha Rao",
            "email": "asha@example.com",
            "age": 21,
            "course": "Physics",
            "hobby": "chess"
        });
        repo_validator()
            .validate(SchemaKind::Create, &payload)
            .unwrap();
    }

    #[test]
    fn missing_required_field_is_reported() {
        let payload = json!({"email": "asha@example.com", "age": 21});
        let err = repo_validator()
            .validate(SchemaKind::Create, &payload)
            .unwrap_err();
        let violations = err.violations().expect("expected violations");
        assert!(!violations.is_empty());
        let messages = violations.messages();
        assert!(
            messages.iter().any(|m| m.contains("name")),
            "Expected violation mentioning 'name', got: {messages:?}"
        );
        assert!(!err.is_internal());
    }

    #[test]
    fn every_violation_is_collected_in_order() {
        let payload = json!({"name": "", "email": "not-an-email", "age": -4});
        let err = repo_validator()
            .validate(SchemaKind::Create, &payload)
            .unwrap_err();
        let violations = err.violations().unwrap();
        assert!(violations.len() >= 3, "got: {violations}");
        let paths: Vec<&str> = violations
            .violations()
            .iter()
            .map(|v| v.instance_path.as_str())
            .collect();
        assert!(paths.contains(&"/name"));
        assert!(paths.contains(&"/email"));
        assert!(paths.contains(&"/age"));
    }

    #[test]
    fn update_schema_accepts_partial_payload() {
        repo_validator()
            .validate(SchemaKind::Update, &json!({"age": 22}))
            .unwrap();
    }

    #[test]
    fn update_schema_rejects_wrong_type() {
        let err = repo_validator()
            .validate(SchemaKind::Update, &json!({"age": "twenty"}))
            .unwrap_err();
        assert!(matches!(err, SchemaValidationError::ValidationFailed { .. }));
    }

    #[test]
    fn missing_schema_file_is_internal_error() {
        let dir = TempDir::new().unwrap();
        let validator = SchemaValidator::from_dir(dir.path());
        let err = validator
            .validate(SchemaKind::Create, &json!({}))
            .unwrap_err();
        assert!(
            matches!(err, SchemaValidationError::SchemaLoadError { .. }),
            "Expected SchemaLoadError, got: {err}"
        );
        assert!(err.is_internal());
        assert!(err.violations().is_none());
    }

    #[test]
    fn malformed_schema_json_is_load_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, CREATE_SCHEMA_FILE, "{ not json");
        let err = SchemaValidator::from_dir(dir.path())
            .validate(SchemaKind::Create, &json!({}))
            .unwrap_err();
        assert!(matches!(err, SchemaValidationError::SchemaLoadError { .. }));
    }

    #[test]
    fn uncompilable_schema_is_build_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, CREATE_SCHEMA_FILE, r#"{"type": "string", "pattern": "(["}"#);
        let err = SchemaValidator::from_dir(dir.path())
            .validate(SchemaKind::Create, &json!({}))
            .unwrap_err();
        assert!(
            matches!(err, SchemaValidationError::ValidatorBuildError { .. }),
            "Expected ValidatorBuildError, got: {err}"
        );
    }

    #[test]
    fn schema_is_reloaded_on_every_call() {
        let dir = TempDir::new().unwrap();
        write(&dir, UPDATE_SCHEMA_FILE, r#"{"type": "object"}"#);
        let validator = SchemaValidator::from_dir(dir.path());
        validator
            .validate(SchemaKind::Update, &json!({"age": "x"}))
            .unwrap();

        write(
            &dir,
            UPDATE_SCHEMA_FILE,
            r#"{"type": "object", "properties": {"age": {"type": "integer"}}}"#,
        );
        assert!(validator
            .validate(SchemaKind::Update, &json!({"age": "x"}))
            .is_err());
    }

    #[test]
    fn local_ref_resolves_from_schema_directory() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "address.schema.json",
            r#"{"type": "object", "required": ["city"]}"#,
        );
        write(
            &dir,
            CREATE_SCHEMA_FILE,
            r#"{
                "$id": "https://schemas.example.org/roster/create-profile.schema.json",
                "type": "object",
                "properties": {"address": {"$ref": "address.schema.json"}}
            }"#,
        );
        let validator = SchemaValidator::from_dir(dir.path());
        validator
            .validate(SchemaKind::Create, &json!({"address": {"city": "Pune"}}))
            .unwrap();
        assert!(validator
            .validate(SchemaKind::Create, &json!({"address": {}}))
            .is_err());
    }

    #[test]
    fn explicit_paths_are_honoured() {
        let dir = TempDir::new().unwrap();
        let create = write(&dir, "c.json", r#"{"required": ["a"]}"#);
        let update = write(&dir, "u.json", r#"{}"#);
        let validator = SchemaValidator::new(&create, &update);
        assert_eq!(validator.schema_path(SchemaKind::Create), create.as_path());
        assert!(validator.validate(SchemaKind::Create, &json!({})).is_err());
        validator.validate(SchemaKind::Update, &json!({})).unwrap();
    }

    #[test]
    fn violation_display_format() {
        let v = Violation {
            instance_path: "/age".to_string(),
            schema_path: "/properties/age/minimum".to_string(),
            message: "-4 is less than the minimum of 0".to_string(),
        };
        assert_eq!(v.to_string(), "/age: -4 is less than the minimum of 0");
    }

    #[test]
    fn violation_display_root() {
        let v = Violation {
            instance_path: String::new(),
            schema_path: "/required".to_string(),
            message: r#""name" is a required property"#.to_string(),
        };
        assert_eq!(v.to_string(), r#"(root): "name" is a required property"#);
    }

    #[test]
    fn schema_kind_names() {
        assert_eq!(SchemaKind::Create.to_string(), "create");
        assert_eq!(SchemaKind::Update.default_file_name(), UPDATE_SCHEMA_FILE);
    }
}
