use std::sync::Arc;
use std::time::Duration;

use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{
        HeaderValue, Method, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::{get, patch, post},
};
use log::{debug, info, warn};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::document::ChartDocument;
use crate::error::{AppError, IngestError, StoreError};
use crate::login::{self, AuthService, CurrentUser};
use crate::service::{self, CreateChartRequest, parse_columns, parse_tags};
use crate::store::{ChartStore, FileChartStore};
use crate::tokens::TokenIssuer;
use crate::upload::TempUpload;
use crate::users::UserStore;

/// Everything a handler needs, shared across requests
pub struct AppState {
    pub config: Config,
    pub charts: Arc<dyn ChartStore>,
    pub auth: AuthService,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Open the file-backed stores under `config.data_dir`
    pub async fn open(config: Config) -> Result<SharedState, StoreError> {
        let charts = FileChartStore::open(&config.data_dir).await?;
        let users = UserStore::open(&config.data_dir).await?;
        let tokens = TokenIssuer::new(config.auth.clone());

        Ok(Arc::new(Self {
            config,
            charts: Arc::new(charts),
            auth: AuthService::new(users, tokens),
        }))
    }
}

/// JSON envelope used by every endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: message.into(),
        })
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data: None,
            message: message.into(),
        })
    }
}

/// Build the application router
pub fn router(state: SharedState) -> Router {
    let protected = Router::new()
        .route("/api/v1/users/logout", post(login::handle_logout))
        .route(
            "/api/v1/users/change-password",
            post(login::handle_change_password),
        )
        .route("/api/v1/users/current-user", get(login::handle_current_user))
        .route(
            "/api/v1/users/update-account",
            patch(login::handle_update_account),
        )
        .route("/api/v1/graphs/create-from-csv", post(create_chart))
        .route("/api/v1/graphs/mine", get(my_charts))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            login::require_auth,
        ));

    let public = Router::new()
        .route("/api/v1/users/register", post(login::handle_register))
        .route("/api/v1/users/login", post(login::handle_login))
        .route("/api/v1/users/refresh-token", post(login::handle_refresh))
        .route("/api/v1/graphs/community-feed", get(community_feed))
        .route("/api/v1/graphs/:id", get(get_chart));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(cors_layer(&state.config.cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60));

    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            warn!("Ignoring invalid CORS origin {origin:?}");
            layer
        }
    }
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Opening stores under {}", config.data_dir.display());
    let state = AppState::open(config).await?;

    let address = format!("0.0.0.0:{}", state.config.port);
    let app = router(state);

    let listener = TcpListener::bind(&address).await?;
    info!("Listening on http://{address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn community_feed(
    State(state): State<SharedState>,
) -> Result<Json<ApiResponse<Vec<ChartDocument>>>, AppError> {
    let documents = service::community_feed(state.charts.as_ref(), state.config.feed_size).await?;
    Ok(ApiResponse::ok(
        documents,
        "Community feed fetched successfully",
    ))
}

async fn get_chart(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ChartDocument>>, AppError> {
    let document = state
        .charts
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Graph {id} not found")))?;

    Ok(ApiResponse::ok(document, "Graph fetched successfully"))
}

async fn my_charts(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<ChartDocument>>>, AppError> {
    let documents = state.charts.list_by_owner(&user.id).await?;
    Ok(ApiResponse::ok(documents, "Graphs fetched successfully"))
}

/// Create a chart from a multipart CSV upload
///
/// Fields: `csvFile` (the file), `chartType`, `columns` (JSON array), and
/// optionally `name`, `description` and `tags`. The staged file is dropped,
/// and therefore deleted, on every return path.
async fn create_chart(
    State(state): State<SharedState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<ChartDocument>>), AppError> {
    let mut upload: Option<TempUpload> = None;
    let mut request = CreateChartRequest::default();
    let mut columns_raw: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "csvFile" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(malformed)?;
                upload = Some(
                    TempUpload::stage(&state.config.upload_dir, file_name.as_deref(), bytes)
                        .await?,
                );
            }
            "chartType" => request.kind = field.text().await.map_err(malformed)?,
            "columns" => columns_raw = Some(field.text().await.map_err(malformed)?),
            "name" => request.meta.name = Some(field.text().await.map_err(malformed)?),
            "description" => {
                request.meta.description = Some(field.text().await.map_err(malformed)?)
            }
            "tags" => request.meta.tags = parse_tags(&field.text().await.map_err(malformed)?),
            other => debug!("Ignoring multipart field {other:?}"),
        }
    }

    request.columns = match columns_raw {
        Some(raw) if !raw.trim().is_empty() => parse_columns(&raw)?,
        _ => Vec::new(),
    };
    request.validate()?;

    let upload = upload.ok_or(IngestError::MissingFile)?;
    let document =
        service::create_from_csv(state.charts.as_ref(), &user.id, upload, request).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(document, "Chart created successfully"),
    ))
}

fn malformed(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("Malformed multipart body: {e}"))
}
