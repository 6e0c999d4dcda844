//! HTTP server for backlog generation and export.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::JsonRejection, DefaultBodyLimit, Form, FromRequest, Multipart, Path, Request,
        State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::domain::encoding::normalize_bytes;
use crate::domain::export::{self, ExportFormat};
use crate::domain::extract::{extract_text, ExtractionInput};
use crate::domain::generation::{BacklogGenerator, BacklogSummary};
use crate::entities::GenerationRequest;
use crate::errors::{BacklogError, BacklogResult};

/// Error message for a `tech` field that is not a JSON array of strings.
pub const INVALID_TECH_MESSAGE: &str = "Format des technologies invalide";

/// Error message for missing specification, technologies or level.
pub const INCOMPLETE_DATA_MESSAGE: &str = "Données incomplètes";

/// Error message for an unknown export format.
pub const UNSUPPORTED_FORMAT_MESSAGE: &str = "Format non supporté";

const JSON_UTF8: &str = "application/json; charset=utf-8";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<BacklogGenerator>,
    /// Request body limit, uploads included.
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(generator: BacklogGenerator, max_upload_bytes: usize) -> Self {
        Self {
            generator: Arc::new(generator),
            max_upload_bytes,
        }
    }

    pub fn from_config(config: &Config) -> BacklogResult<Self> {
        Ok(Self::new(
            BacklogGenerator::from_config(config)?,
            config.server.max_upload_bytes,
        ))
    }
}

/// Build the HTTP router.
pub fn build_router(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(state.max_upload_bytes));

    Router::new()
        .route("/health", get(health_handler))
        .route("/generate-backlog", post(generate_backlog_handler))
        .route("/export-backlog/{format}", post(export_backlog_handler))
        .layer(middleware)
        .with_state(state)
}

/// Start the HTTP server.
pub async fn run_server(state: AppState, addr: &str) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Backlog server listening on {addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Errors
// ============================================================================

/// Error response: `{"error": "..."}` with a 4xx/5xx status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Keep the status axum chose for an extractor rejection (400, 413, 415...).
    pub fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<BacklogError> for ApiError {
    fn from(err: BacklogError) -> Self {
        match &err {
            BacklogError::Validation { .. } => Self::bad_request(INCOMPLETE_DATA_MESSAGE),
            BacklogError::UnsupportedFormat { .. } => Self::bad_request(UNSUPPORTED_FORMAT_MESSAGE),
            e if e.is_client_error() => Self::bad_request(e.to_string()),
            e => Self::internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "Request failed");
        } else {
            warn!(status = %self.status, error = %self.message, "Request rejected");
        }
        json_utf8(self.status, &json!({ "error": self.message }))
    }
}

/// Serialize `body` as JSON with an explicit UTF-8 charset.
fn json_utf8<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (
            status,
            [(header::CONTENT_TYPE, HeaderValue::from_static(JSON_UTF8))],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to serialize response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

/// Fields of the generation form, from either a multipart or urlencoded body.
#[derive(Debug, Default)]
pub struct GenerateForm {
    /// JSON array of technology names.
    pub tech: Option<String>,
    /// Skill level label.
    pub niveau_dev: Option<String>,
    /// Specification as text (`cdc` text field).
    pub cdc_text: Option<String>,
    /// Specification as an uploaded document (`cdc` file field).
    pub cdc_file: Option<Vec<u8>>,
}

impl GenerateForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let is_file = field.file_name().is_some();
            match (name.as_str(), is_file) {
                ("cdc", true) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
                    if !bytes.is_empty() {
                        form.cdc_file = Some(bytes.to_vec());
                    }
                }
                ("cdc" | "tech" | "niveau_dev", false) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
                    let value = normalize_bytes(&bytes);
                    match name.as_str() {
                        "cdc" => form.cdc_text = Some(value),
                        "tech" => form.tech = Some(value),
                        _ => form.niveau_dev = Some(value),
                    }
                }
                _ => {}
            }
        }
        Ok(form)
    }

    fn from_fields(mut fields: HashMap<String, String>) -> Self {
        Self {
            tech: fields.remove("tech"),
            niveau_dev: fields.remove("niveau_dev"),
            cdc_text: fields.remove("cdc"),
            cdc_file: None,
        }
    }

    /// Decode `tech`; a missing field is an empty list.
    pub fn technologies(&self) -> Result<Vec<String>, ApiError> {
        match self.tech.as_deref() {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str::<Vec<String>>(raw)
                .map_err(|_| ApiError::bad_request(INVALID_TECH_MESSAGE)),
        }
    }
}

impl<S> FromRequest<S> for GenerateForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
            Self::from_multipart(multipart).await
        } else {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
            Ok(Self::from_fields(fields))
        }
    }
}

/// Successful generation response.
#[derive(Debug, Serialize)]
struct GenerateResponse {
    analyse: String,
    backlog: String,
    degraded: bool,
    seed: i32,
    summary: BacklogSummary,
}

/// Export request body.
#[derive(Debug, Default, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub analyse: String,
    #[serde(default)]
    pub backlog: String,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /generate-backlog`
async fn generate_backlog_handler(
    State(state): State<AppState>,
    form: GenerateForm,
) -> Result<Response, ApiError> {
    let technologies = form.technologies()?;

    let input = ExtractionInput {
        raw_text: form.cdc_text,
        document: form.cdc_file,
    };
    let specification = extract_text(&input)?;

    let request = GenerationRequest::new(
        specification,
        technologies,
        form.niveau_dev.as_deref().unwrap_or_default(),
    )?;

    let outcome = state.generator.generate(&request).await?;

    Ok(json_utf8(
        StatusCode::OK,
        &GenerateResponse {
            summary: outcome.summary(),
            analyse: outcome.analysis,
            backlog: outcome.backlog_text,
            degraded: outcome.degraded,
            seed: outcome.seed.value(),
        },
    ))
}

/// `POST /export-backlog/{format}`
async fn export_backlog_handler(
    Path(format): Path<String>,
    body: Result<Json<ExportRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let format: ExportFormat = format.parse()?;
    let Json(request) = body.map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;

    let document = tokio::task::spawn_blocking(move || {
        export::render(format, &request.analyse, &request.backlog)
    })
    .await
    .map_err(|e| ApiError::internal(format!("export task failed: {e}")))??;

    let disposition = format!("attachment; filename=\"{}\"", document.filename);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, document.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.bytes,
    )
        .into_response())
}
