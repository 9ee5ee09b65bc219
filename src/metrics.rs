use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use lazy_static::lazy_static;
use crate::error::Error;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref SUBMISSIONS: IntCounter = IntCounter::new(
        "token_submissions_total",
        "Total number of accepted token submissions"
    ).unwrap();

    pub static ref VOTES: IntCounterVec = IntCounterVec::new(
        Opts::new("votes_total", "Total number of recorded votes"),
        &["vote_type"]
    ).unwrap();

    pub static ref REJECTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("integrity_rejections_total", "Writes rejected by integrity checks"),
        &["kind"]
    ).unwrap();

    pub static ref PARTIAL_WRITES: IntCounter = IntCounter::new(
        "vote_partial_writes_total",
        "Votes recorded whose counter increment failed"
    ).unwrap();

    pub static ref METADATA_FALLBACKS: IntCounter = IntCounter::new(
        "metadata_fallbacks_total",
        "Submissions that used placeholder metadata"
    ).unwrap();

    pub static ref SKIPPED_DOCUMENTS: IntCounterVec = IntCounterVec::new(
        Opts::new("skipped_documents_total", "Stored documents skipped because they could not be decoded"),
        &["collection"]
    ).unwrap();

    pub static ref ACTIVE_SUBSCRIPTIONS: IntGauge = IntGauge::new(
        "active_subscriptions",
        "Currently open live subscriptions"
    ).unwrap();
}

pub fn record_rejection(err: &Error) {
    REJECTIONS.with_label_values(&[err.kind()]).inc();
}

fn register(collector: Box<dyn prometheus::core::Collector>) -> Result<(), prometheus::Error> {
    match REGISTRY.register(collector) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Registers all collectors. Safe to call more than once.
pub fn init() -> Result<(), prometheus::Error> {
    register(Box::new(SUBMISSIONS.clone()))?;
    register(Box::new(VOTES.clone()))?;
    register(Box::new(REJECTIONS.clone()))?;
    register(Box::new(PARTIAL_WRITES.clone()))?;
    register(Box::new(METADATA_FALLBACKS.clone()))?;
    register(Box::new(SKIPPED_DOCUMENTS.clone()))?;
    register(Box::new(ACTIVE_SUBSCRIPTIONS.clone()))?;
    Ok(())
}

/// Prometheus text exposition of the registry.
pub fn gather() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
