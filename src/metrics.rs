//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Sign-in flow
    pub static ref LOGINS_STARTED_TOTAL: IntCounter = IntCounter::new(
        "signin_gate_logins_started_total",
        "Total number of redirects to the identity provider"
    ).expect("metric can be created");
    pub static ref CALLBACKS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("signin_gate_callbacks_total", "Total number of identity provider callbacks"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref LOGOUTS_TOTAL: IntCounter = IntCounter::new(
        "signin_gate_logouts_total",
        "Total number of logouts"
    ).expect("metric can be created");
    pub static ref GATE_REDIRECTS_TOTAL: IntCounter = IntCounter::new(
        "signin_gate_gate_redirects_total",
        "Total number of unauthenticated requests sent to /login"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("signin_gate_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(LOGINS_STARTED_TOTAL.clone()))
        .expect("LOGINS_STARTED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CALLBACKS_TOTAL.clone()))
        .expect("CALLBACKS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(LOGOUTS_TOTAL.clone()))
        .expect("LOGOUTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(GATE_REDIRECTS_TOTAL.clone()))
        .expect("GATE_REDIRECTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}
