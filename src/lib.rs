//! Reftrack - referral attribution tracking for a storefront
//!
//! Captures referral codes from inbound page URLs, persists them per
//! visitor with a 30-day window, reports attributable clicks to an
//! affiliate backend, and hands the active code to conversion flows.
//!
//! # Architecture
//! - `tracker`: attribution state machine (capture, restore, expire, clear)
//! - `storage`: visitor-side persistent key-value store backends
//! - `affiliates`: affiliate lookup and click-log backends
//! - `clicks`: buffered denormalized click counters
//! - `services`: HTTP handlers exposing the tracker per visitor
//! - `clock`: injectable time source for deterministic expiry
//! - `config`: environment-driven configuration

pub mod affiliates;
pub mod clicks;
pub mod clock;
pub mod config;
pub mod errors;
pub mod services;
pub mod storage;
pub mod tracker;
pub mod utils;
