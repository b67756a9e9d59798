use axum::{
    debug_handler,
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    app::{CsrGenerator, GenerateError, GeneratedCsr},
    backend::BackendKind,
    config::OrganizationProfile,
    csr::{HostName, SubjectIdentity},
    utils::logging::{LogSettings, Logger},
};

static STATIC_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static");

#[derive(OpenApi)]
#[openapi(
    paths(csr_handler, profile_handler),
    components(schemas(CsrRequest, CsrResponse, OrganizationProfile, SubjectIdentity, HostName))
)]
struct ApiDoc;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CsrRequest {
    #[schema(example = "server.example.edu")]
    pub fqdn: String,
    /// Comma separated additional host names
    #[serde(default)]
    #[schema(example = "www.server.example.edu, api.server.example.edu")]
    pub sans: String,
}

#[derive(Serialize, ToSchema)]
pub struct CsrResponse {
    key_filename: String,
    key_pem: String,
    csr_filename: String,
    csr_pem: String,
    subject: SubjectIdentity,
    sans: Vec<String>,
    backend: String,
    public_key_sha256: String,
    generated_at: String,
}

impl From<GeneratedCsr> for CsrResponse {
    fn from(generated: GeneratedCsr) -> Self {
        Self {
            sans: generated
                .descriptor
                .sans
                .iter()
                .map(|n| n.as_str().to_string())
                .collect(),
            subject: generated.descriptor.subject,
            key_filename: generated.key_filename,
            key_pem: generated.key_pem,
            csr_filename: generated.csr_filename,
            csr_pem: generated.csr_pem,
            backend: generated.backend,
            public_key_sha256: generated.public_key_sha256,
            generated_at: generated.generated_at.to_rfc3339(),
        }
    }
}

pub struct WebServerState {
    pub is_running: bool,
    pub port: u16,
    pub profile: OrganizationProfile,
    pub backend: BackendKind,
    pub openssl: String,
    pub log_settings: LogSettings,
}

impl WebServerState {
    pub fn new(
        port: Option<u16>,
        profile: OrganizationProfile,
        backend: BackendKind,
        openssl: String,
        log_settings: LogSettings,
    ) -> Self {
        Self {
            port: port.unwrap_or(3000), // Default to port 3000 if none specified
            is_running: false,
            profile,
            backend,
            openssl,
            log_settings,
        }
    }

    fn logger(&self) -> Box<dyn Logger> {
        self.log_settings.build_logger()
    }
}

fn json_error(status: StatusCode, message: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

// Handler for /api/csr
#[utoipa::path(
    post,
    path = "/api/csr",
    request_body = CsrRequest,
    responses(
        (status = 200, description = "Generated private key and CSR", body = CsrResponse),
        (status = 400, description = "Missing or invalid FQDN"),
        (status = 500, description = "Key generation or signing failed")
    )
)]
#[debug_handler]
async fn csr_handler(
    State(state): State<Arc<RwLock<WebServerState>>>,
    Json(request): Json<CsrRequest>,
) -> Response {
    // Snapshot what the run needs, the lock is not held across the await
    let (profile, backend, logger) = {
        let state_guard = state.read().unwrap();
        (
            state_guard.profile.clone(),
            state_guard.backend.create(&state_guard.openssl),
            state_guard.logger(),
        )
    };

    let result = tokio::task::spawn_blocking(move || {
        let mut generator = CsrGenerator::new(logger, profile, backend);
        generator.generate(&request.fqdn, &request.sans)
    })
    .await;

    match result {
        Ok(Ok(generated)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            Json(serde_json::json!({ "data": CsrResponse::from(generated) })),
        )
            .into_response(),
        Ok(Err(e @ GenerateError::Validation(_))) => {
            json_error(StatusCode::BAD_REQUEST, e.to_string())
        }
        Ok(Err(e)) => json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        Err(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("CSR generation task failed: {}", e),
        ),
    }
}

// Handler for /api/profile
#[utoipa::path(
    get,
    path = "/api/profile",
    responses(
        (status = 200, description = "Organization profile used for every subject", body = OrganizationProfile)
    )
)]
#[debug_handler]
async fn profile_handler(State(state): State<Arc<RwLock<WebServerState>>>) -> Response {
    let profile = state.read().unwrap().profile.clone();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        Json(serde_json::json!({ "data": profile })),
    )
        .into_response()
}

async fn index_handler() -> Response {
    match STATIC_DIR
        .get_file("index.html")
        .and_then(|f| f.contents_utf8())
    {
        Some(html) => Html(html).into_response(),
        None => (StatusCode::NOT_FOUND, "index.html missing").into_response(),
    }
}

async fn asset_handler(Path(path): Path<String>) -> Response {
    let Some(file) = STATIC_DIR.get_file(&path) else {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };

    let content_type = match path.rsplit('.').next() {
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("html") => "text/html; charset=utf-8",
        _ => "application/octet-stream",
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type)],
        file.contents(),
    )
        .into_response()
}

async fn health_check() -> &'static str {
    "OK"
}

pub fn router(state: Arc<RwLock<WebServerState>>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/assets/*path", get(asset_handler))
        .route("/health", get(health_check))
        .route("/api/profile", get(profile_handler))
        .route("/api/csr", post(csr_handler))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .with_state(state)
}

pub async fn start_web_server(
    state: Arc<RwLock<WebServerState>>,
    shutdown: tokio::sync::oneshot::Receiver<()>,
) {
    let (port, mut logger) = {
        let state = state.read().unwrap();
        (state.port, state.logger())
    };

    let app = router(state.clone());

    let addr = format!("0.0.0.0:{}", port);
    match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => {
            logger.log(&format!("Web server listening on {}", addr));
            logger.debug_log("Available endpoints: /, /health, /api/profile, /api/csr, /swagger-ui");

            {
                let mut state = state.write().unwrap();
                state.is_running = true;
            }

            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown.await.ok();
                })
                .await
                .unwrap_or_else(|e| {
                    eprintln!("Server error: {}", e);
                    logger.log(&format!("Server error: {}", e));
                });

            state.write().unwrap().is_running = false;
        }
        Err(e) => {
            eprintln!("Failed to bind to address {}: {}", addr, e);
            logger.log(&format!("Failed to bind to address {}: {}", addr, e));
        }
    }
}
