mod jobs;

pub use jobs::*;

use crate::error::Result;
use crate::parser::normalize;
use crate::scheduler::{generate_schedule, Progress};
use crate::storage::{persist_schedule, schedule_rows, ScheduleStore};
use crate::types::{AppConfig, NormalizedInput, RawPayload, SolveOutcome};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Readers on a drained queue get a `: ping` about every 20 seconds
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobTable>,
    pub store: Option<Arc<dyn ScheduleStore>>,
    pub config: AppConfig,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/generar-horario-general", post(generate))
        .route("/generar-horario-general-job", post(generate_job))
        .route("/generar-horario-general-job/:job_id/events", get(job_events))
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("escuchando en {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Backend activo",
        "jobs_activos": state.jobs.len(),
    }))
}

fn missing_required_data(raw: &RawPayload) -> bool {
    raw.docentes.is_empty() || raw.asignaciones.is_empty() || raw.horas_curso_grado.is_empty()
}

/// Normalize, solve on a blocking worker, persist, and shape the response
/// payload the frontend consumes
async fn run_pipeline(state: &AppState, raw: RawPayload, progress: Progress) -> Result<Value> {
    let input = normalize(&raw)?;
    let solver_config = state.config.solver.clone();
    let worker_progress = progress.clone();
    let (input, outcome): (NormalizedInput, SolveOutcome) =
        tokio::task::spawn_blocking(move || -> Result<_> {
            let outcome = generate_schedule(&input, &solver_config, &worker_progress)?;
            Ok((input, outcome))
        })
        .await??;

    let rows = schedule_rows(&outcome.horario, &input.assignments, input.level, input.version);
    if let Some(store) = &state.store {
        persist_schedule(
            store.as_ref(),
            &rows,
            &input.level.to_string(),
            input.version,
            input.overwrite,
        )
        .await?;
    } else {
        info!("persistencia deshabilitada; {} filas no guardadas", rows.len());
    }

    Ok(json!({
        "horario": outcome.horario.to_matrix(input.level, input.grid),
        "asignaciones_exitosas": outcome.stats.asignaciones_exitosas,
        "asignaciones_fallidas": outcome.stats.asignaciones_fallidas,
        "total_bloques_asignados": outcome.stats.total_bloques_asignados,
        "version": input.version,
    }))
}

async fn generate(State(state): State<AppState>, Json(raw): Json<RawPayload>) -> Response {
    match run_pipeline(&state, raw, Progress::disabled()).await {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(e) => {
            error!("excepción general: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string(), "trace": format!("{e:?}")})),
            )
                .into_response()
        }
    }
}

async fn generate_job(State(state): State<AppState>, Json(raw): Json<RawPayload>) -> Response {
    if missing_required_data(&raw) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Faltan datos requeridos para generar el horario."})),
        )
            .into_response();
    }

    let job_id = state.jobs.create();
    let ttl = Duration::from_secs(state.config.server.job_ttl_secs);

    let progress_jobs = Arc::clone(&state.jobs);
    let progress = Progress::new(move |pct, stage| {
        progress_jobs.push_event(
            job_id,
            JobEvent::Progress {
                progress: pct,
                stage: stage.to_string(),
            },
        );
    });

    let worker_state = state.clone();
    tokio::spawn(async move {
        let event = match run_pipeline(&worker_state, raw, progress).await {
            Ok(payload) => JobEvent::Done { result: payload },
            Err(e) => {
                error!("job {job_id} falló: {e:#}");
                JobEvent::Error {
                    error: e.to_string(),
                }
            }
        };
        worker_state.jobs.push_event(job_id, event);
        Arc::clone(&worker_state.jobs).evict(job_id, ttl);
    });

    (StatusCode::ACCEPTED, Json(json!({"job_id": job_id}))).into_response()
}

async fn job_events(State(state): State<AppState>, Path(job_id): Path<String>) -> Response {
    let not_found = || {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Job no encontrado"})),
        )
            .into_response()
    };
    let Ok(id) = Uuid::parse_str(&job_id) else {
        return not_found();
    };
    let Some(mut feed) = state.jobs.subscribe(id) else {
        return not_found();
    };

    let stream = async_stream::stream! {
        loop {
            match feed.drain(HEARTBEAT_INTERVAL).await {
                Drained::Event(event) => {
                    let terminal = event.is_terminal();
                    yield Ok::<Event, Infallible>(
                        Event::default().event(event.name()).data(event.data().to_string()),
                    );
                    if terminal {
                        break;
                    }
                }
                Drained::Idle => yield Ok(Event::default().comment("ping")),
                Drained::Closed => break,
            }
        }
    };

    Sse::new(stream).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    fn test_state(store: Option<Arc<dyn ScheduleStore>>) -> AppState {
        let mut config = AppConfig::default();
        config.solver.max_time_secs = 30;
        config.solver.workers = 2;
        AppState {
            jobs: Arc::new(JobTable::new()),
            store,
            config,
        }
    }

    fn minimal_body() -> Value {
        json!({
            "docentes": [{"id": 1, "nombre": "Docente A", "jornada_total": 30, "aula_id": 1}],
            "asignaciones": {"1": {"6": {"docente_id": 1}}},
            "restricciones": {},
            "horas_curso_grado": {"1": {"6": 2}},
            "nivel": "Primaria",
            "version": 2
        })
    }

    async fn post_json(router: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_sync_endpoint_solves_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let state = test_state(Some(store.clone()));
        let (status, body) = post_json(
            router(state),
            "/generar-horario-general",
            minimal_body(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_bloques_asignados"], 2);
        assert_eq!(body["asignaciones_exitosas"], 1);
        assert_eq!(body["asignaciones_fallidas"], 0);
        assert_eq!(body["version"], 2);
        // 5 days x 8 blocks x 6 Primaria grades
        assert_eq!(body["horario"].as_array().unwrap().len(), 5);
        assert_eq!(body["horario"][0].as_array().unwrap().len(), 8);
        assert_eq!(body["horario"][0][0].as_array().unwrap().len(), 6);
        assert_eq!(store.rows().len(), 2);
    }

    #[tokio::test]
    async fn test_sync_endpoint_rejects_empty_payload() {
        let state = test_state(None);
        let (status, body) =
            post_json(router(state), "/generar-horario-general", json!({})).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("Faltan datos"));
        assert!(!body["trace"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_job_endpoint_returns_accepted_with_job_id() {
        let state = test_state(None);
        let (status, body) = post_json(
            router(state),
            "/generar-horario-general-job",
            minimal_body(),
        )
        .await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(Uuid::parse_str(body["job_id"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_job_endpoint_rejects_empty_payload_up_front() {
        let state = test_state(None);
        let (status, body) =
            post_json(router(state), "/generar-horario-general-job", json!({})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Faltan datos"));
    }

    #[tokio::test]
    async fn test_events_for_unknown_job_is_not_found() {
        let state = test_state(None);
        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri(format!("/generar-horario-general-job/{}/events", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_job_feed_ends_with_done_after_monotonic_progress() {
        let state = test_state(None);
        let jobs = Arc::clone(&state.jobs);
        let (status, body) = post_json(
            router(state),
            "/generar-horario-general-job",
            minimal_body(),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let id = Uuid::parse_str(body["job_id"].as_str().unwrap()).unwrap();
        let mut feed = jobs.subscribe(id).unwrap();

        let mut last_progress = 0u8;
        loop {
            match feed.drain(Duration::from_secs(30)).await {
                Drained::Event(JobEvent::Progress { progress, .. }) => {
                    assert!(progress > last_progress);
                    last_progress = progress;
                }
                Drained::Event(JobEvent::Done { result }) => {
                    assert_eq!(result["total_bloques_asignados"], 2);
                    break;
                }
                Drained::Event(JobEvent::Error { error }) => panic!("job falló: {error}"),
                Drained::Idle => panic!("sin eventos en 30 s"),
                Drained::Closed => panic!("cola cerrada antes del evento terminal"),
            }
        }
    }
}
