use std::sync::Arc;

use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::affiliates::AffiliateBackend;
use crate::clicks::ClickManager;
use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::storage::{KvStore, ScopedStore};
use crate::tracker::{InitOutcome, PageView, ReferralTracker};

/// Shared handles for the tracker handlers.
pub struct AppState {
    pub store: Arc<dyn KvStore>,
    pub backend: Arc<dyn AffiliateBackend>,
    pub clicks: Arc<ClickManager>,
    pub clock: Arc<dyn Clock>,
    pub tracker_config: TrackerConfig,
}

impl AppState {
    fn tracker_for(&self, visitor_id: &str) -> ReferralTracker {
        ReferralTracker::new(
            Arc::new(ScopedStore::new(self.store.clone(), visitor_id)),
            self.backend.clone(),
            self.clicks.clone(),
            self.clock.clone(),
            self.tracker_config.clone(),
        )
    }
}

#[derive(Deserialize)]
pub struct TrackRequest {
    pub visitor_id: String,
    pub url: String,
}

#[derive(Serialize)]
pub struct TrackResponse {
    pub outcome: &'static str,
    pub code: Option<String>,
    /// Set only on capture: the page URL with the referral parameter
    /// stripped, for the frontend to history-replace.
    pub cleaned_url: Option<String>,
}

#[derive(Serialize)]
pub struct ReferralResponse {
    pub code: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

fn bad_visitor_id() -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: "visitor_id must be non-empty",
    })
}

fn header_value(req: &HttpRequest, name: header::HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(String::from)
}

pub struct TrackerService;

impl TrackerService {
    /// Page-load entry point: runs referral detection for the visitor
    /// and reports what happened. Click reporting is already detached
    /// by the time this responds.
    #[instrument(skip(req, payload, state), fields(url = %payload.url))]
    pub async fn handle_track(
        req: HttpRequest,
        payload: web::Json<TrackRequest>,
        state: web::Data<AppState>,
    ) -> impl Responder {
        if payload.visitor_id.trim().is_empty() {
            return bad_visitor_id();
        }

        let view = PageView {
            url: payload.url.clone(),
            user_agent: header_value(&req, header::USER_AGENT),
            referer: header_value(&req, header::REFERER),
        };

        let tracker = state.tracker_for(&payload.visitor_id);
        let response = match tracker.handle_page_load(&view).await {
            InitOutcome::Captured { code, cleaned_url } => TrackResponse {
                outcome: "captured",
                code: Some(code),
                cleaned_url: Some(cleaned_url),
            },
            InitOutcome::Restored { code } => TrackResponse {
                outcome: "restored",
                code: Some(code),
                cleaned_url: None,
            },
            InitOutcome::Expired => TrackResponse {
                outcome: "expired",
                code: None,
                cleaned_url: None,
            },
            InitOutcome::NoAttribution => TrackResponse {
                outcome: "none",
                code: None,
                cleaned_url: None,
            },
        };

        HttpResponse::Ok().json(response)
    }

    pub async fn handle_get_referral(
        path: web::Path<String>,
        state: web::Data<AppState>,
    ) -> impl Responder {
        let visitor_id = path.into_inner();
        if visitor_id.trim().is_empty() {
            return bad_visitor_id();
        }

        let tracker = state.tracker_for(&visitor_id);
        HttpResponse::Ok().json(ReferralResponse {
            code: tracker.active_code().await,
        })
    }

    /// Consumes the attribution after a conversion so the same code is
    /// not reapplied to a later, unrelated conversion.
    pub async fn handle_clear_referral(
        path: web::Path<String>,
        state: web::Data<AppState>,
    ) -> impl Responder {
        let visitor_id = path.into_inner();
        if visitor_id.trim().is_empty() {
            return bad_visitor_id();
        }

        let tracker = state.tracker_for(&visitor_id);
        tracker.clear().await;
        HttpResponse::NoContent().finish()
    }
}
