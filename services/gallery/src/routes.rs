//! Gallery HTTP routes

use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{
    error::{ServiceError, ServiceResult},
    middleware::{CallerId, auth_middleware},
    models::{Identity, IdentityId, LoginCredentials, NewIdentity, Upload},
    state::AppState,
    validation::{normalize_extension, validate_login, validate_password},
};

/// Response for token generation
#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Request for identity update
#[derive(Deserialize)]
pub struct UpdateIdentityRequest {
    pub name: String,
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub description: String,
}

/// Create the router for the gallery service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/images", post(upload_image))
        .route_layer(middleware::from_fn_with_state(
            state.controller.tokens().clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/users", post(create_user))
        .route("/auth/login", post(login))
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "gallery"
    }))
}

fn validate_credentials(login: &str, password: &str) -> ServiceResult<()> {
    validate_login(login).map_err(ServiceError::BadRequest)?;
    validate_password(password).map_err(ServiceError::BadRequest)
}

/// Register a new identity
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<NewIdentity>,
) -> ServiceResult<impl IntoResponse> {
    validate_credentials(&payload.login, &payload.password)?;

    let ctx = state.request_context();
    let id = state
        .controller
        .register_identity(&ctx, payload.into_identity())
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// Exchange credentials for a token
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginCredentials>,
) -> ServiceResult<impl IntoResponse> {
    info!("Login attempt for user: {}", payload.login);

    let ctx = state.request_context();
    let token = state
        .controller
        .authenticate(&ctx, &payload.login, &payload.password)
        .await?;

    Ok(Json(TokenResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.controller.tokens().token_expiry(),
    }))
}

/// Get an identity with its image URLs
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<IdentityId>,
) -> ServiceResult<impl IntoResponse> {
    let ctx = state.request_context();
    let identity = state.controller.fetch_identity(&ctx, id).await?;

    Ok(Json(identity))
}

/// Update the caller's own identity
pub async fn update_user(
    State(state): State<AppState>,
    Extension(CallerId(caller)): Extension<CallerId>,
    Path(id): Path<IdentityId>,
    Json(payload): Json<UpdateIdentityRequest>,
) -> ServiceResult<impl IntoResponse> {
    validate_credentials(&payload.login, &payload.password)?;

    let identity = Identity {
        id,
        name: payload.name,
        login: payload.login,
        password: payload.password,
        description: payload.description,
        asset_urls: Vec::new(),
    };

    let ctx = state.request_context();
    state
        .controller
        .update_identity(&ctx, caller, identity)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Delete the caller's own identity
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(CallerId(caller)): Extension<CallerId>,
    Path(id): Path<IdentityId>,
) -> ServiceResult<impl IntoResponse> {
    if caller != id {
        return Err(ServiceError::Forbidden(format!(
            "identity {} cannot delete identity {}",
            caller, id
        )));
    }

    let ctx = state.request_context();
    state.controller.delete_identity(&ctx, id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Upload an image for the caller
///
/// Expects a multipart form with a `file` field; the extension comes from an
/// optional `extension` field or else from the file name.
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(CallerId(caller)): Extension<CallerId>,
    mut multipart: Multipart,
) -> ServiceResult<impl IntoResponse> {
    let mut data: Option<Bytes> = None;
    let mut file_name: Option<String> = None;
    let mut extension: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(str::to_string);
                data = Some(field.bytes().await.map_err(|e| {
                    ServiceError::BadRequest(format!("Failed to read field: {}", e))
                })?);
            }
            "extension" => {
                extension = Some(field.text().await.map_err(|e| {
                    ServiceError::BadRequest(format!("Failed to read field: {}", e))
                })?);
            }
            _ => {}
        }
    }

    let data = data
        .filter(|data| !data.is_empty())
        .ok_or_else(|| ServiceError::BadRequest("Missing 'file' field".to_string()))?;

    let extension = extension
        .or_else(|| {
            file_name
                .as_deref()
                .and_then(|name| name.rsplit_once('.'))
                .map(|(_, ext)| ext.to_string())
        })
        .unwrap_or_default();
    let extension = normalize_extension(&extension).map_err(ServiceError::BadRequest)?;

    let ctx = state.request_context();
    let name = state
        .controller
        .upload_asset(
            &ctx,
            Upload {
                identity_id: caller,
                extension,
                data,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "name": name }))))
}
