//! The trigger routes. All responses are plain text, one line per event,
//! matching what a cron mail or an uptime monitor expects to read.

use {
    axum::{
        Router,
        extract::{Path, Query, State},
        http::StatusCode,
        middleware,
        response::{IntoResponse, Response},
        routing::get,
    },
    chrono::Utc,
    jobtick_scheduler::{Error, types::TriggerKind},
    serde::Deserialize,
};

use crate::AppState;

const DEFAULT_LOG_LIMIT: usize = 10;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/jobs/trigger", get(trigger))
        .route("/jobs/trigger/{kind}", get(trigger_kind))
        .route("/jobs/trigger-manual/{job_id}", get(trigger_manual))
        .route("/jobs/trigger-next-task", get(trigger_next_task))
        .route("/jobs/logs", get(logs))
        .route("/jobs/logs/{limit}", get(logs_limit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ))
        .with_state(state)
}

async fn trigger(State(state): State<AppState>) -> Response {
    respond(state.service.trigger(None, Utc::now()).await)
}

async fn trigger_kind(State(state): State<AppState>, Path(kind): Path<String>) -> Response {
    let kind = match kind.parse::<TriggerKind>() {
        Ok(kind) => kind,
        Err(e) => return (StatusCode::BAD_REQUEST, format!("{e}\n")).into_response(),
    };
    respond(state.service.trigger(Some(kind), Utc::now()).await)
}

#[derive(Deserialize)]
struct ManualQuery {
    force: Option<String>,
}

async fn trigger_manual(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Query(query): Query<ManualQuery>,
) -> Response {
    let force = matches!(query.force.as_deref(), Some("1" | "true"));
    respond(state.service.trigger_manual(&job_id, force, Utc::now()).await)
}

async fn trigger_next_task(State(state): State<AppState>) -> Response {
    respond(state.service.trigger_next_task(Utc::now()).await)
}

async fn logs(State(state): State<AppState>) -> Response {
    recent(state, DEFAULT_LOG_LIMIT).await
}

async fn logs_limit(State(state): State<AppState>, Path(limit): Path<usize>) -> Response {
    recent(state, limit).await
}

async fn recent(state: AppState, limit: usize) -> Response {
    match state.service.recent_results(limit).await {
        Ok(results) => {
            let lines: Vec<String> = results.iter().map(|r| r.status_line()).collect();
            text_body(&lines)
        },
        Err(e) => error_response(&e),
    }
}

fn respond(result: Result<Vec<String>, Error>) -> Response {
    match result {
        Ok(lines) => text_body(&lines),
        Err(e) => error_response(&e),
    }
}

fn text_body(lines: &[String]) -> Response {
    let mut body = lines.join("\n");
    body.push('\n');
    body.into_response()
}

fn error_response(e: &Error) -> Response {
    let status = match e {
        Error::JobNotFound { .. } => StatusCode::NOT_FOUND,
        Error::Io(_) | Error::Sqlx(_) | Error::Migrate(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    (status, format!("{e}\n")).into_response()
}
