mod oauth_handlers;
mod part_handlers;

use crate::auth::TokenStore;
use crate::cli::AppConfig;
use crate::digikey::error::DigikeyError;
use crate::digikey::{DigikeyApi, PartSearchProvider};
use crate::metadata::{MetadataError, PartMetadataService};
use crate::storage::{Db, PartRepository, PartTypeRepository, StorageError, StorageResult};
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{FromRequest, FromRequestParts, Query},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router as AxumRouter,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers
pub struct AppState {
    pub config: AppConfig,
    pub parts: PartRepository,
    pub part_types: PartTypeRepository,
    pub digikey: Arc<DigikeyApi>,
    pub metadata: PartMetadataService,
}

impl AppState {
    /// `search_provider` backs the metadata lookup; normally the same `DigikeyApi`
    pub fn new(
        config: AppConfig,
        db: Db,
        digikey: Arc<DigikeyApi>,
        search_provider: Arc<dyn PartSearchProvider>,
    ) -> Self {
        Self {
            config,
            parts: PartRepository::new(db.clone()),
            part_types: PartTypeRepository::new(db),
            digikey,
            metadata: PartMetadataService::new(search_provider),
        }
    }
}

/// Build every route over the shared state
pub fn build_router(state: Arc<AppState>) -> AxumRouter {
    AxumRouter::new()
        .route("/", get(serve_index))
        .route("/health", get(health_check))
        .route(
            "/part",
            get(part_handlers::get_part)
                .post(part_handlers::create_part)
                .put(part_handlers::update_part)
                .delete(part_handlers::delete_part),
        )
        .route("/part/list", get(part_handlers::list_parts))
        .route("/part/search", get(part_handlers::search_parts))
        .route("/part/lowStock", get(part_handlers::low_stock_parts))
        .route("/part/metadata", get(part_handlers::part_metadata))
        .route(
            "/partTypes",
            get(part_handlers::list_part_types).post(part_handlers::create_part_type),
        )
        // OAuth endpoints
        .route(
            "/Authorization/Authorize",
            get(oauth_handlers::authorization_callback),
        )
        .route("/api/oauth/status", get(oauth_handlers::oauth_status))
        .route("/api/oauth/logout", post(oauth_handlers::oauth_logout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: AppConfig) -> anyhow::Result<()> {
    let db_path = config.storage.database_path()?;
    let db = Db::open(&db_path, config.storage.pool_size)
        .map_err(|e| anyhow::anyhow!("Failed to open database {}: {}", db_path.display(), e))?;

    let token_store = TokenStore::new(config.digikey.token_file_path()?)
        .map_err(|e| anyhow::anyhow!("Failed to initialize token store: {}", e))?;
    if !token_store.list_providers().is_empty() {
        info!("🔐 Loaded saved DigiKey credential");
    }

    let digikey = Arc::new(
        DigikeyApi::new(config.digikey.clone(), token_store)
            .map_err(|e| anyhow::anyhow!("Failed to initialize DigiKey client: {}", e))?,
    );
    if !config.digikey.is_configured() {
        info!("ℹ️  DigiKey client_id/client_secret not set, metadata lookup disabled");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, db, digikey.clone(), digikey));
    let app = build_router(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("🚀 Binner listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Run repository work on the blocking pool
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::from(StorageError::Task(e.to_string())))?
        .map_err(AppError::from)
}

/// Serve the inventory UI
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("index.html"))
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "binner"
    }))
}

/// JSON body extractor that reports malformed input as an `AppError`
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Query string extractor that reports bad parameters as an `AppError`
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

/// Application error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Unauthorized(String),
    Supplier(String),
    Unavailable(String),
    Internal(String),
}

impl AppError {
    fn kind(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found_error"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict_error"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "authentication_error"),
            AppError::Supplier(_) => (StatusCode::BAD_GATEWAY, "supplier_error"),
            AppError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "api_error"),
        }
    }

    fn message(&self) -> &str {
        match self {
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Unauthorized(msg)
            | AppError::Supplier(msg)
            | AppError::Unavailable(msg)
            | AppError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.kind();

        let body = Json(serde_json::json!({
            "error": {
                "type": error_type,
                "message": self.message()
            }
        }));

        (status, body).into_response()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Supplier(msg) => write!(f, "Supplier error: {}", msg),
            AppError::Unavailable(msg) => write!(f, "Unavailable: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Invalid(e) => AppError::BadRequest(e.to_string()),
            StorageError::Conflict(msg) => AppError::Conflict(msg),
            StorageError::NotFound(msg) => AppError::NotFound(msg),
            other => {
                error!("❌ Storage error: {}", other);
                AppError::Internal(other.to_string())
            }
        }
    }
}

impl From<DigikeyError> for AppError {
    fn from(err: DigikeyError) -> Self {
        match err {
            DigikeyError::Unauthorized(msg) => AppError::Unauthorized(msg),
            DigikeyError::OAuth(e) => AppError::Unauthorized(e.to_string()),
            DigikeyError::ConfigError(msg) => AppError::Unavailable(msg),
            DigikeyError::StorageError(msg) => {
                error!("❌ Credential storage error: {}", msg);
                AppError::Internal(msg)
            }
            other => {
                error!("❌ DigiKey request failed: {}", other);
                AppError::Supplier(other.to_string())
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<MetadataError> for AppError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::MissingPartNumber => AppError::BadRequest(err.to_string()),
            MetadataError::NotFound(_) => AppError::NotFound(err.to_string()),
            MetadataError::Supplier(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ValidationError;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                AppError::from(StorageError::Invalid(ValidationError::MissingPartNumber)),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(StorageError::Conflict("dup".to_string())),
                StatusCode::CONFLICT,
            ),
            (
                AppError::from(DigikeyError::Unauthorized("timeout".to_string())),
                StatusCode::UNAUTHORIZED,
            ),
            (
                AppError::from(DigikeyError::ApiError {
                    status: 429,
                    message: "slow down".to_string(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::from(MetadataError::NotFound("X".to_string())),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::from(StorageError::Task("panicked".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
