//! # OpenAPI Specification Assembly
//!
//! Assembles the utoipa-documented profile routes into a single OpenAPI
//! document served at `/openapi.json`.
//!
//! Profiles are open documents validated by JSON Schema at runtime, so the
//! types below only describe the common shape for readers of the document.
//! They are never used to decode requests.

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::state::AppState;

/// Response envelope shared by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct EnvelopeDoc {
    /// Human-readable outcome, e.g. "user fetched successfully".
    pub msg: String,
    /// A profile, a list of profiles, a list of violation strings, or null.
    #[schema(value_type = Object)]
    pub data: Option<serde_json::Value>,
    /// Mirrors the HTTP status code.
    pub status: u16,
    /// Count of all matching profiles; list responses only.
    pub totalcount: Option<u64>,
}

/// Profile fields accepted on create and update.
///
/// Create requires `name`, `email` and `age`; update accepts any non-empty
/// subset. Additional fields are stored as given.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileInputDoc {
    pub name: String,
    pub email: String,
    pub age: u8,
    pub phone: Option<String>,
    pub course: Option<String>,
    pub skills: Option<Vec<String>>,
}

/// Assembled OpenAPI spec for the profile API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Roster Student Profile API",
        version = "0.1.0",
        description = "Schema-validated CRUD over the student profile collection."
    ),
    paths(
        crate::routes::profiles::create_profile,
        crate::routes::profiles::get_profile,
        crate::routes::profiles::update_profile,
        crate::routes::profiles::delete_profile,
        crate::routes::profiles::list_profiles,
    ),
    components(schemas(EnvelopeDoc, ProfileInputDoc)),
    tags(
        (name = "profiles", description = "Student profile collection"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
