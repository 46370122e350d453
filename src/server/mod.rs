// src/server/mod.rs
use crate::api::*;
use crate::config::Config;
use crate::export::ResultExporter;
use crate::orchestrator::Orchestrator;
use rocket::{routes, Build, Rocket};
use std::sync::Arc;

pub mod routes;

pub struct ServerState {
    pub orchestrator: Arc<Orchestrator>,
    pub exporter: ResultExporter,
}

pub fn build_rocket(config: Arc<Config>, orchestrator: Arc<Orchestrator>) -> Rocket<Build> {
    let exporter = ResultExporter::new(config.output.clone());
    let state = ServerState {
        orchestrator,
        exporter,
    };

    rocket::build().manage(state).mount(
        "/api",
        routes![
            // Health and info endpoints
            routes::health::health_check,
            routes::health::index,
            // Job lifecycle endpoints
            start_job,
            stop_job,
            get_status,
            get_results,
            export_results,
        ],
    )
}
