// src/server/routes.rs

pub mod health {
    use rocket::{get, serde::json::Json};
    use serde_json::{json, Value};

    #[get("/health")]
    pub async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "service": "maps-lead-scraper-api"
        }))
    }

    #[get("/")]
    pub async fn index() -> Json<Value> {
        Json(json!({
            "name": "Maps Lead Scraper API",
            "version": "0.1.0",
            "description": "API for running map scraping jobs and reading their results",
            "endpoints": {
                "health": "/api/health",
                "start": "/api/jobs/start",
                "stop": "/api/jobs/stop",
                "status": "/api/jobs/status",
                "results": "/api/jobs/results",
                "export": "/api/jobs/export"
            }
        }))
    }
}
