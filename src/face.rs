use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info};

use crate::jobs::{JobEvent, JobId, JobRegistry, NewJob};
use crate::types::ValueMapping;

/// Body of `POST /fill-form`. Everything is optional so missing fields get a 400, not a 422.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FillFormPayload {
    url: Option<String>,
    form_data: Option<ValueMapping>,
    name: Option<String>,
}

impl JobEvent {
    fn to_sse_event(&self) -> Event {
        let name = match self {
            JobEvent::Created { .. } => "job_created",
            JobEvent::StatusChanged { .. } => "job_status",
            JobEvent::Deleted { .. } => "job_deleted",
        };
        Event::default()
            .event(name)
            .data(serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string()))
    }
}

pub fn router(registry: JobRegistry) -> Router {
    Router::new()
        .route("/fill-form", post(fill_form_handler))
        .route("/jobs", get(list_jobs_handler))
        .route("/jobs/{id}", get(get_job_handler).delete(delete_job_handler))
        .route("/events", get(sse_handler))
        .route("/health", get(health_handler))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .with_state(registry)
}

/// Bind the first free port in `port..port + 10` and serve until the process exits.
pub async fn serve(router: Router, port: u16) -> anyhow::Result<()> {
    let mut bound = None;
    for p in port..port.saturating_add(10) {
        match tokio::net::TcpListener::bind(format!("127.0.0.1:{}", p)).await {
            Ok(listener) => {
                bound = Some((listener, p));
                break;
            }
            Err(e) => debug!(port = p, error = %e, "port unavailable"),
        }
    }
    let (listener, port) = bound.ok_or_else(|| {
        anyhow::anyhow!(
            "Could not bind to any port {}-{}",
            port,
            port.saturating_add(9)
        )
    })?;

    info!("server running on http://localhost:{}", port);
    info!("form API: POST http://localhost:{}/fill-form", port);
    axum::serve(listener, router).await?;
    Ok(())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn fill_form_handler(
    State(registry): State<JobRegistry>,
    Json(payload): Json<FillFormPayload>,
) -> Response {
    let (Some(url), Some(form_data)) = (payload.url.filter(|u| !u.trim().is_empty()), payload.form_data)
    else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing required fields: url and formData are required",
        );
    };

    debug!(%url, "POST /fill-form");
    let job = registry.create(NewJob {
        url,
        form_data,
        name: payload.name,
    });

    (
        StatusCode::CREATED,
        Json(json!({
            "jobId": job.id,
            "status": job.status,
            "message": "Job created successfully",
        })),
    )
        .into_response()
}

async fn get_job_handler(State(registry): State<JobRegistry>, Path(id): Path<String>) -> Response {
    match id.parse::<JobId>().ok().and_then(|id| registry.get(id)) {
        Some(job) => Json(json!({ "job": job })).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Job not found"),
    }
}

async fn list_jobs_handler(State(registry): State<JobRegistry>) -> Response {
    let jobs = registry.list();
    Json(json!({ "total": jobs.len(), "jobs": jobs })).into_response()
}

async fn delete_job_handler(
    State(registry): State<JobRegistry>,
    Path(id): Path<String>,
) -> Response {
    match id.parse::<JobId>() {
        Ok(id) if registry.delete(id) => StatusCode::NO_CONTENT.into_response(),
        _ => error_response(StatusCode::NOT_FOUND, "Job not found"),
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "timestamp": Utc::now() }))
}

async fn sse_handler(
    State(registry): State<JobRegistry>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = registry.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result: Result<JobEvent, _>| match result {
        Ok(event) => Some(Ok::<_, Infallible>(event.to_sse_event())),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
