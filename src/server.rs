//! HTTP transport for the session boundary.
//!
//! Every route answers with a JSON envelope: `{"status": "success", ...payload}`
//! or `{"status": "error", "error": <kind>, "message": <text>}`. Session work
//! runs on the blocking pool behind a mutex, one request at a time.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::extract::{FromRequest, Request, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::config::ScatterConfig;
use crate::error::PipelineError;
use crate::pipeline::{OverflowPolicy, Row};
use crate::session::Session;

pub type SharedSession = Arc<Mutex<Session>>;

/// JSON request body whose rejections are reported in the error envelope.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Json<Value>;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::warn!(status = %rejection.status(), "rejected request body");
                Err(envelope(Err(PipelineError::InvalidRequest(rejection.body_text()))))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetModelRequest {
    pub model: String,
    pub dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct EmbedTextRequest {
    pub row: Row,
    pub field: String,
    pub overflow: Option<String>,
}

/// Target dimension as sent by the client: a number or a numeric string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DimensionArg {
    Number(usize),
    Text(String),
}

impl DimensionArg {
    fn resolve(&self) -> Result<usize, PipelineError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s.trim().parse().map_err(|_| {
                PipelineError::Configuration(format!("plot dimensions must be a number, got {s:?}"))
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReduceDimsRequest {
    #[serde(rename = "plotDimensions")]
    pub plot_dimensions: DimensionArg,
}

#[derive(Debug, Deserialize)]
pub struct PlotRequest {
    pub field: String,
    pub category: Option<String>,
    pub cmap: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

/// Build the API router around a shared session.
pub fn router(session: SharedSession) -> Router {
    Router::new()
        .route("/api/reset", get(reset))
        .route("/api/set-model", post(set_model))
        .route("/api/check-model", get(check_model))
        .route("/api/download-model", get(download_model))
        .route("/api/embed-text", post(embed_text))
        .route("/api/embed-category", post(embed_category))
        .route("/api/reduce-dims", post(reduce_dims))
        .route("/api/plot", post(plot))
        .route("/api/categorise", post(categorise))
        .with_state(session)
}

/// Start the HTTP server and run until ctrl-c.
pub async fn serve(config: ScatterConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let session = Session::from_config(&config)?;
    let shared: SharedSession = Arc::new(Mutex::new(session));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "scatterbrain listening at http://{bind_addr}/api");

    axum::serve(listener, router(shared))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down server");
        })
        .await?;

    Ok(())
}

/// Run `op` on the blocking pool with exclusive access to the session.
async fn with_session<T, F>(session: &SharedSession, op: F) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce(&mut Session) -> Result<T, PipelineError> + Send + 'static,
{
    let session = Arc::clone(session);
    tokio::task::spawn_blocking(move || {
        let mut guard = session
            .lock()
            .map_err(|e| PipelineError::Internal(format!("session lock poisoned: {e}")))?;
        op(&mut guard)
    })
    .await
    .map_err(|e| PipelineError::Internal(format!("session task failed: {e}")))?
}

/// Wrap an operation outcome in the response envelope.
pub fn envelope(result: Result<Value, PipelineError>) -> Json<Value> {
    match result {
        Ok(payload) => {
            let mut body = Map::new();
            body.insert("status".into(), json!("success"));
            if let Value::Object(fields) = payload {
                body.extend(fields);
            }
            Json(Value::Object(body))
        }
        Err(e) => Json(json!({
            "status": "error",
            "error": e.kind().as_str(),
            "message": e.to_string(),
        })),
    }
}

pub async fn reset(State(session): State<SharedSession>) -> Json<Value> {
    envelope(
        with_session(&session, |s| {
            s.reset();
            Ok(json!({}))
        })
        .await,
    )
}

pub async fn set_model(
    State(session): State<SharedSession>,
    ApiJson(req): ApiJson<SetModelRequest>,
) -> Json<Value> {
    envelope(
        with_session(&session, move |s| {
            s.set_encoder_config(&req.model, req.dimensions)?;
            Ok(json!({}))
        })
        .await,
    )
}

pub async fn check_model(State(session): State<SharedSession>) -> Json<Value> {
    envelope(
        with_session(&session, |s| {
            let availability = s.check_encoder()?;
            Ok(json!({ "availability": availability }))
        })
        .await,
    )
}

pub async fn download_model(State(session): State<SharedSession>) -> Json<Value> {
    envelope(
        with_session(&session, |s| {
            s.download_encoder()?;
            Ok(json!({}))
        })
        .await,
    )
}

pub async fn embed_text(
    State(session): State<SharedSession>,
    ApiJson(req): ApiJson<EmbedTextRequest>,
) -> Json<Value> {
    envelope(
        with_session(&session, move |s| {
            let policy = match req.overflow.as_deref() {
                Some(name) => name.parse::<OverflowPolicy>()?,
                None => OverflowPolicy::default(),
            };
            let embeddings = s.embed_and_append(req.row, &req.field, policy)?;
            Ok(json!({ "embeddings": embeddings }))
        })
        .await,
    )
}

pub async fn embed_category(
    State(session): State<SharedSession>,
    ApiJson(req): ApiJson<TextRequest>,
) -> Json<Value> {
    envelope(
        with_session(&session, move |s| {
            let embeddings = s.embed_reference(&req.text)?;
            Ok(json!({ "embeddings": embeddings }))
        })
        .await,
    )
}

pub async fn reduce_dims(
    State(session): State<SharedSession>,
    ApiJson(req): ApiJson<ReduceDimsRequest>,
) -> Json<Value> {
    envelope(
        with_session(&session, move |s| {
            let dims = req.plot_dimensions.resolve()?;
            let points = s.project(dims)?.len();
            Ok(json!({ "points": points }))
        })
        .await,
    )
}

pub async fn plot(
    State(session): State<SharedSession>,
    ApiJson(req): ApiJson<PlotRequest>,
) -> Json<Value> {
    envelope(
        with_session(&session, move |s| {
            let plot = s.assemble_plot(&req.field, req.category.as_deref(), req.cmap.as_deref())?;
            let plot = serde_json::to_value(plot)
                .map_err(|e| PipelineError::Internal(format!("serialization failed: {e}")))?;
            Ok(json!({ "plot": plot }))
        })
        .await,
    )
}

pub async fn categorise(
    State(session): State<SharedSession>,
    ApiJson(req): ApiJson<TextRequest>,
) -> Json<Value> {
    envelope(
        with_session(&session, move |s| {
            let closest = s.find_closest(&req.text)?;
            Ok(json!({ "closest": closest }))
        })
        .await,
    )
}
