// src/api/jobs.rs
use crate::models::{BusinessRecord, JobConfig};
use crate::server::ServerState;
use crate::session::StatusSnapshot;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::serde::json::Json;
use rocket::{get, post, State};
use serde::Serialize;

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Session identity from the `X-Session-ID` header; browsers without one
/// share the default session, like the original UI.
pub struct SessionId(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionId {
    type Error = std::convert::Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let id = request
            .headers()
            .get_one("X-Session-ID")
            .unwrap_or("default");
        Outcome::Success(SessionId(id.to_string()))
    }
}

#[post("/jobs/start", data = "<job>")]
pub async fn start_job(
    state: &State<ServerState>,
    session: SessionId,
    job: Json<JobConfig>,
) -> Json<ApiResponse<String>> {
    match state.orchestrator.start_job(&session.0, job.into_inner()) {
        Ok(()) => Json(ApiResponse::success("Started".to_string())),
        Err(e) => Json(ApiResponse::error(e.to_string())),
    }
}

#[post("/jobs/stop")]
pub async fn stop_job(state: &State<ServerState>, session: SessionId) -> Json<ApiResponse<String>> {
    state.orchestrator.cancel(&session.0);
    Json(ApiResponse::success("Stopping".to_string()))
}

#[get("/jobs/status")]
pub async fn get_status(
    state: &State<ServerState>,
    session: SessionId,
) -> Json<ApiResponse<StatusSnapshot>> {
    Json(ApiResponse::success(state.orchestrator.status(&session.0)))
}

#[get("/jobs/results")]
pub async fn get_results(
    state: &State<ServerState>,
    session: SessionId,
) -> Json<ApiResponse<Vec<BusinessRecord>>> {
    Json(ApiResponse::success(state.orchestrator.results(&session.0)))
}

#[derive(Serialize)]
pub struct ExportPaths {
    pub json: String,
    pub csv: String,
}

#[post("/jobs/export")]
pub async fn export_results(
    state: &State<ServerState>,
    session: SessionId,
) -> Json<ApiResponse<ExportPaths>> {
    let records = state.orchestrator.results(&session.0);
    if records.is_empty() {
        return Json(ApiResponse::error("No data to export".to_string()));
    }

    let json = match state.exporter.save_json(&session.0, &records).await {
        Ok(path) => path,
        Err(e) => return Json(ApiResponse::error(e.to_string())),
    };
    let csv = match state.exporter.save_csv(&session.0, &records) {
        Ok(path) => path,
        Err(e) => return Json(ApiResponse::error(e.to_string())),
    };

    Json(ApiResponse::success(ExportPaths { json, csv }))
}
