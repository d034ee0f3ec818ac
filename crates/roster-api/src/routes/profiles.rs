//! # Student Profile API
//!
//! CRUD over the profile collection. Each handler is a short linear
//! pipeline: decode, validate, check uniqueness, mutate, shape the envelope.
//! Every failure leaves through [`AppError`], so clients always receive the
//! standard envelope.
//!
//! Create and update deliberately differ on schema problems: create refuses
//! to run without a loadable schema (500), update logs a warning and applies
//! the patch unvalidated. Only a produced violation list is fatal for update.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use roster_core::{strip_id, Document, Filter, Profile, NAME_FIELD};
use roster_schema::SchemaKind;
use serde_json::Value;
use utoipa::IntoParams;

use crate::envelope::Envelope;
use crate::error::{AppError, USER_EXISTS, USER_NOT_FOUND};
use crate::extractors::{extract_document, extract_id, MISSING_ID};
use crate::state::AppState;
use crate::store::ListQuery;

pub const CREATED: &str = "User inserted successfully";
pub const FETCHED: &str = "user fetched successfully";
pub const UPDATED: &str = "User updated successfully";
pub const DELETED: &str = "User deleted successfully";
pub const LISTED: &str = "Users fetched successfully";
pub const VALIDATION_ERROR: &str = "validation error";
pub const INVALID_PAYLOAD: &str = "invalid payload";
pub const INVALID_PAGE: &str = "invalid page";
pub const INVALID_FILTERS: &str = "invalid filters";

const DEFAULT_PAGE: u64 = 1;
const DEFAULT_SIZE: u64 = 10;

/// Query parameters of `GET /api/getAllUsers`.
///
/// Values stay strings so that a bad `page` or `size` is reported in the
/// envelope rather than as an extractor rejection.
#[derive(Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Filter as a JSON object, e.g. `{"course":"cs","age":{"$gte":20}}`.
    /// Supports `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in` and `$nin`.
    /// When absent or not an object, pagination is ignored and every profile
    /// is returned.
    pub filters: Option<String>,
    /// 1-based page number (default 1).
    pub page: Option<String>,
    /// Page size (default 10).
    pub size: Option<String>,
}

impl ListParams {
    /// Collect the known keys from decoded query pairs. A repeated key keeps
    /// its first value; unknown keys are ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "filters" => &mut params.filters,
                "page" => &mut params.page,
                "size" => &mut params.size,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }
}

/// Build the profiles router, mounted under `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/createProfile", post(create_profile))
        .route("/getAllUsers", get(list_profiles))
        .route("/getUserProfile", get(missing_id))
        .route("/getUserProfile/{id}", get(get_profile))
        .route("/updateProfile", put(missing_id))
        .route("/updateProfile/{id}", put(update_profile))
        .route("/deleteProfile", delete(missing_id))
        .route("/deleteProfile/{id}", delete(delete_profile))
}

/// POST /api/createProfile: Create a profile.
#[utoipa::path(
    post,
    path = "/api/createProfile",
    request_body = crate::openapi::ProfileInputDoc,
    responses(
        (status = 201, description = "Profile created", body = crate::openapi::EnvelopeDoc),
        (status = 400, description = "Malformed body or schema violations", body = crate::openapi::EnvelopeDoc),
        (status = 409, description = "Name already taken", body = crate::openapi::EnvelopeDoc),
        (status = 500, description = "Store or schema failure", body = crate::openapi::EnvelopeDoc),
    ),
    tag = "profiles"
)]
pub(crate) async fn create_profile(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Envelope<Profile>, AppError> {
    let mut fields = extract_document(body)?;

    if let Err(err) = state
        .validator
        .validate(SchemaKind::Create, &Value::Object(fields.clone()))
    {
        return Err(match err.violations() {
            Some(violations) => AppError::validation(VALIDATION_ERROR, violations),
            None => AppError::Internal(err.to_string()),
        });
    }

    if let Some(name) = fields.get(NAME_FIELD) {
        if state.store.find_by_field(NAME_FIELD, name).await?.is_some() {
            return Err(AppError::Conflict(USER_EXISTS.to_string()));
        }
    }

    if let Some(client_id) = strip_id(&mut fields) {
        tracing::debug!(%client_id, "discarded client-supplied _id");
    }
    let id = state.store.insert(fields).await?;
    let profile = state
        .store
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("inserted profile {id} could not be read back")))?;

    tracing::info!(%id, "profile created");
    Ok(Envelope::new(StatusCode::CREATED, CREATED, Some(profile)))
}

/// GET /api/getUserProfile/{id}: Fetch one profile.
#[utoipa::path(
    get,
    path = "/api/getUserProfile/{id}",
    params(("id" = String, Path, description = "Profile identifier (UUID)")),
    responses(
        (status = 200, description = "Profile found", body = crate::openapi::EnvelopeDoc),
        (status = 400, description = "Missing or malformed id", body = crate::openapi::EnvelopeDoc),
        (status = 404, description = "No such profile", body = crate::openapi::EnvelopeDoc),
    ),
    tag = "profiles"
)]
pub(crate) async fn get_profile(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Envelope<Profile>, AppError> {
    let id = extract_id(path)?;
    let profile = state
        .store
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))?;
    Ok(Envelope::ok(FETCHED, profile))
}

/// PUT /api/updateProfile/{id}: Merge fields into a profile.
#[utoipa::path(
    put,
    path = "/api/updateProfile/{id}",
    params(("id" = String, Path, description = "Profile identifier (UUID)")),
    request_body = crate::openapi::ProfileInputDoc,
    responses(
        (status = 200, description = "Profile updated", body = crate::openapi::EnvelopeDoc),
        (status = 400, description = "Bad id, malformed body or schema violations", body = crate::openapi::EnvelopeDoc),
        (status = 404, description = "No such profile", body = crate::openapi::EnvelopeDoc),
        (status = 409, description = "Name already taken", body = crate::openapi::EnvelopeDoc),
    ),
    tag = "profiles"
)]
pub(crate) async fn update_profile(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Envelope<()>, AppError> {
    let mut patch = extract_document(body)?;

    if let Err(err) = state
        .validator
        .validate(SchemaKind::Update, &Value::Object(patch.clone()))
    {
        match err.violations() {
            Some(violations) => return Err(AppError::validation(INVALID_PAYLOAD, violations)),
            None => tracing::warn!(error = %err, "update schema unusable, applying patch unvalidated"),
        }
    }

    let id = extract_id(path)?;
    let existing = state
        .store
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))?;

    if let Some(new_name) = patch.get(NAME_FIELD).and_then(Value::as_str) {
        if existing.name() != Some(new_name) {
            let taken = state
                .store
                .find_by_field(NAME_FIELD, &Value::from(new_name))
                .await?;
            if taken.is_some() {
                return Err(AppError::Conflict(USER_EXISTS.to_string()));
            }
        }
    }

    strip_id(&mut patch);
    state.store.update_by_id(id, patch).await?;

    tracing::info!(%id, "profile updated");
    Ok(Envelope::empty(StatusCode::OK, UPDATED))
}

/// DELETE /api/deleteProfile/{id}: Remove a profile.
#[utoipa::path(
    delete,
    path = "/api/deleteProfile/{id}",
    params(("id" = String, Path, description = "Profile identifier (UUID)")),
    responses(
        (status = 200, description = "Profile deleted", body = crate::openapi::EnvelopeDoc),
        (status = 400, description = "Missing or malformed id", body = crate::openapi::EnvelopeDoc),
        (status = 404, description = "No such profile", body = crate::openapi::EnvelopeDoc),
    ),
    tag = "profiles"
)]
pub(crate) async fn delete_profile(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Envelope<()>, AppError> {
    let id = extract_id(path)?;
    let removed = Value::Object(state.store.delete_by_id(id).await?.into_document());
    tracing::debug!(%id, profile = %removed, "profile deleted");
    Ok(Envelope::empty(StatusCode::OK, DELETED))
}

/// GET /api/getAllUsers: List profiles, optionally filtered and paged.
#[utoipa::path(
    get,
    path = "/api/getAllUsers",
    params(ListParams),
    responses(
        (status = 200, description = "Profiles and total count", body = crate::openapi::EnvelopeDoc),
        (status = 400, description = "Invalid page, size or filter operator", body = crate::openapi::EnvelopeDoc),
    ),
    tag = "profiles"
)]
pub(crate) async fn list_profiles(
    State(state): State<AppState>,
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Envelope<Vec<Profile>>, AppError> {
    let Query(pairs) = pairs.map_err(|err| {
        tracing::debug!(rejection = %err.body_text(), "bad list query");
        AppError::BadRequest(INVALID_PAGE.to_string())
    })?;
    let query = list_query(&ListParams::from_pairs(pairs))?;
    let page = state.store.find_many(&query).await?;
    tracing::debug!(returned = page.profiles.len(), total = page.total, "profiles listed");
    Ok(Envelope::ok(LISTED, page.profiles).with_total(page.total))
}

/// Answers the path-less id routes.
async fn missing_id() -> AppError {
    AppError::BadRequest(MISSING_ID.to_string())
}

/// Select list mode: filtered and paged when `filters` is a JSON object,
/// otherwise the whole collection.
fn list_query(params: &ListParams) -> Result<ListQuery, AppError> {
    let Some(raw) = parse_filters(params.filters.as_deref()) else {
        return Ok(ListQuery::all());
    };
    let filter = Filter::parse(&raw).map_err(|err| {
        tracing::debug!(error = %err, "rejected list filter");
        AppError::BadRequest(format!("{INVALID_FILTERS}: {err}"))
    })?;
    let page = parse_positive(params.page.as_deref(), DEFAULT_PAGE)?;
    let size = parse_positive(params.size.as_deref(), DEFAULT_SIZE)?;
    let skip = (page - 1)
        .checked_mul(size)
        .ok_or_else(|| AppError::BadRequest(INVALID_PAGE.to_string()))?;
    Ok(ListQuery::paged(filter, skip, size))
}

fn parse_filters(raw: Option<&str>) -> Option<Document> {
    match serde_json::from_str::<Value>(raw?) {
        Ok(Value::Object(filter)) => Some(filter),
        _ => None,
    }
}

/// Parse a positive integer, treating absent or blank input as `default`.
fn parse_positive(raw: Option<&str>, default: u64) -> Result<u64, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(s) => s
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| AppError::BadRequest(INVALID_PAGE.to_string())),
    }
}
