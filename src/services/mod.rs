//! HTTP service layer
//!
//! Thin actix handlers over the tracker. Each request builds a
//! [`crate::tracker::ReferralTracker`] scoped to the calling visitor;
//! the shared store, affiliate backend, and click buffer live in
//! [`AppState`].

pub mod health;
pub mod tracker_service;

pub use health::{AppStartTime, HealthService};
pub use tracker_service::{AppState, TrackerService};

use actix_web::web;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(HealthService::health_check))
        .route("/api/track", web::post().to(TrackerService::handle_track))
        .route(
            "/api/referral/{visitor_id}",
            web::get().to(TrackerService::handle_get_referral),
        )
        .route(
            "/api/referral/{visitor_id}",
            web::delete().to(TrackerService::handle_clear_referral),
        );
}
