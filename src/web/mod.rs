use axum::{
    extract::{Query, State},
    response::Html,
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub mod state;

use crate::pipeline::{ItemKind, ItemStatus, Pipeline};
use state::{ControlAction, JobRequest, RunState, Session};

/// Shared server state: the pipeline plus per-session run control.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub sessions: Arc<RwLock<HashMap<String, Session>>>,
    pub output_root: PathBuf,
    pub max_upload_bytes: u64,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, output_root: PathBuf, max_upload_mb: u64) -> Self {
        Self {
            pipeline,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            output_root,
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/control", post(control))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the web front end.
pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    tracing::info!("Starting web front end on http://{addr}");

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

#[derive(Debug, Deserialize)]
struct ControlForm {
    session: String,
    action: ControlAction,
    path: Option<String>,
    kind: Option<String>,
    instruction: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    session: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    state: RunState,
    last_outcome: Option<String>,
}

/// Sessions opened by `GET /` but never driven by a control action are
/// abandoned; once this many sessions accumulate they are swept out.
const MAX_SESSIONS: usize = 128;

async fn index(State(app): State<AppState>) -> Html<String> {
    let session_id = Uuid::new_v4().to_string();
    let mut sessions = app.sessions.write().await;
    if sessions.len() >= MAX_SESSIONS {
        sessions.retain(|_, s| s.state != RunState::Idle || s.last_outcome.is_some());
    }
    sessions.insert(session_id.clone(), Session::default());
    drop(sessions);

    Html(render_page(&session_id))
}

/// Poll the session. An outcome is delivered exactly once; a session that
/// is back at `Idle` with its outcome delivered is dropped from the
/// registry, since the form recreates state on the next action anyway.
async fn status(
    State(app): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Json<StatusResponse> {
    let mut sessions = app.sessions.write().await;
    let Some(session) = sessions.get_mut(&query.session) else {
        return Json(StatusResponse {
            state: RunState::Idle,
            last_outcome: None,
        });
    };

    let response = StatusResponse {
        state: session.state,
        last_outcome: session.last_outcome.take(),
    };
    if session.state == RunState::Idle && session.pending.is_none() {
        sessions.remove(&query.session);
    }

    Json(response)
}

async fn control(
    State(app): State<AppState>,
    Form(form): Form<ControlForm>,
) -> Json<StatusResponse> {
    // The automatic completion transition is internal only.
    if form.action == ControlAction::PipelineComplete {
        return Json(snapshot(&app, &form.session).await);
    }

    let mut job_to_run = None;
    {
        let mut sessions = app.sessions.write().await;
        let session = sessions.entry(form.session.clone()).or_default();

        if form.action == ControlAction::RequestStart {
            match parse_job(&form) {
                Ok(job) => session.pending = Some(job),
                Err(reason) => {
                    session.last_outcome = Some(reason);
                    return Json(StatusResponse {
                        state: session.state,
                        last_outcome: session.last_outcome.clone(),
                    });
                }
            }
        }

        let (before, after) = session.transition(form.action);
        tracing::debug!("Session {}: {before:?} -> {after:?}", form.session);

        if before == RunState::AwaitingStartConfirmation && after == RunState::Processing {
            let generation = session.begin_run();
            job_to_run = session.pending.take().map(|job| (job, generation));
        }
        if after == RunState::Idle {
            session.pending = None;
        }
    }

    if let Some((job, generation)) = job_to_run {
        spawn_run(app.clone(), form.session.clone(), job, generation);
    }

    Json(snapshot(&app, &form.session).await)
}

async fn snapshot(app: &AppState, session: &str) -> StatusResponse {
    let sessions = app.sessions.read().await;
    let session = sessions.get(session);

    StatusResponse {
        state: session.map(|s| s.state).unwrap_or(RunState::Idle),
        last_outcome: session.and_then(|s| s.last_outcome.clone()),
    }
}

fn parse_job(form: &ControlForm) -> Result<JobRequest, String> {
    let path = form
        .path
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| "A file path is required to start a run.".to_string())?;

    let kind = match form.kind.as_deref() {
        Some("video") | None => ItemKind::Video,
        Some("audio") => ItemKind::Audio,
        Some("transcript") => ItemKind::Transcript,
        Some(other) => return Err(format!("Unknown file kind: {other}")),
    };

    let instruction = form
        .instruction
        .clone()
        .filter(|text| !text.trim().is_empty());

    Ok(JobRequest {
        path: PathBuf::from(path),
        kind,
        instruction,
    })
}

/// Run one confirmed job on its own task. The session returns to `Idle`
/// automatically when the run finishes; a cancel confirmed meanwhile has
/// already moved the state and the completion transition is then a no-op.
fn spawn_run(app: AppState, session_id: String, job: JobRequest, generation: u64) {
    tokio::spawn(async move {
        let outcome = run_job(&app, &job).await;
        finish_run(&app, &session_id, generation, outcome).await;
    });
}

/// Deliver a finished run's outcome to its session. The session only
/// accepts the delivery if `generation` still owns it, so a run that was
/// cancelled and replaced cannot reset or overwrite its successor.
async fn finish_run(app: &AppState, session_id: &str, generation: u64, outcome: String) {
    let mut sessions = app.sessions.write().await;
    if let Some(session) = sessions.get_mut(session_id) {
        if !session.finish_run(generation, outcome) {
            tracing::debug!("Session {session_id}: dropped completion from a superseded run");
        }
    }
}

async fn run_job(app: &AppState, job: &JobRequest) -> String {
    match fs_err::metadata(&job.path) {
        Ok(meta) if meta.len() > app.max_upload_bytes => {
            return format!(
                "{} exceeds the configured size limit of {} MB",
                job.path.display(),
                app.max_upload_bytes / (1024 * 1024)
            );
        }
        Err(e) => return format!("Cannot access {}: {e}", job.path.display()),
        Ok(_) => {}
    }

    let report = app
        .pipeline
        .run_single(&job.path, job.kind, job.instruction.clone(), &app.output_root)
        .await;

    match &report.status {
        ItemStatus::Completed => format!(
            "Done. Summary saved to {}",
            report
                .summary_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        ),
        ItemStatus::SummaryFailed => {
            "The summary file was written, but it contains an error message.".to_string()
        }
        ItemStatus::EmptyTranscript => {
            "The transcription was empty; the transcript was saved and the summary skipped."
                .to_string()
        }
        ItemStatus::ExtractionFailed(reason) => format!("Audio extraction failed: {reason}"),
        ItemStatus::TranscriptionFailed(reason) => format!("Transcription failed: {reason}"),
    }
}

fn render_page(session_id: &str) -> String {
    format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Video Summarizer</title></head>
<body>
  <h1>Video Summarizer</h1>
  <form method="post" action="/control">
    <input type="hidden" name="session" value="{session_id}">
    <p><label>File path: <input type="text" name="path" size="60"></label></p>
    <p>
      <label><input type="radio" name="kind" value="video" checked> Video</label>
      <label><input type="radio" name="kind" value="audio"> Audio</label>
      <label><input type="radio" name="kind" value="transcript"> Transcript</label>
    </p>
    <p><label>Instruction (optional):<br>
      <textarea name="instruction" rows="3" cols="60"></textarea></label></p>
    <p>
      <button name="action" value="request_start">Start</button>
      <button name="action" value="confirm">Confirm</button>
      <button name="action" value="cancel">Cancel</button>
      <button name="action" value="request_cancel">Request cancel</button>
    </p>
  </form>
  <p>Poll <code>/status?session={session_id}</code> for the run state.</p>
</body>
</html>
"#
    )
}
