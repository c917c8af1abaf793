use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use tracing::trace;

/// Application start time, shared so the health endpoint can report
/// uptime without touching any other state.
#[derive(Clone, Debug)]
pub struct AppStartTime {
    pub start_datetime: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: i64,
}

pub struct HealthService;

impl HealthService {
    pub async fn health_check(app_start_time: web::Data<AppStartTime>) -> impl Responder {
        trace!("Received health check request");

        let uptime = chrono::Utc::now() - app_start_time.start_datetime;
        HttpResponse::Ok().json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: uptime.num_seconds(),
        })
    }
}
