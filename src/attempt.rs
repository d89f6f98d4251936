//! Entry points used by resolution code around one top-level attempt.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::chain::Unwinding;
use crate::collector::{ErrorCollector, Report};
use crate::error::EngineError;
use crate::record::ErrorRecord;

static NEXT_ATTEMPT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
/// Handle owning the collector of one top-level provisioning or build call.
pub struct Attempt {
    id: u64,
    collector: ErrorCollector,
}

impl Attempt {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn error_count(&self) -> usize {
        self.collector.len()
    }

    pub fn has_errors(&self) -> bool {
        !self.collector.is_empty()
    }

    pub fn collector_mut(&mut self) -> &mut ErrorCollector {
        &mut self.collector
    }
}

/// Starts a top-level attempt with a fresh, private collector.
pub fn begin_top_level_attempt() -> Attempt {
    let id = NEXT_ATTEMPT_ID.fetch_add(1, Ordering::Relaxed);
    debug!(attempt = id, "began top-level attempt");
    Attempt {
        id,
        collector: ErrorCollector::new(),
    }
}

pub fn report_failure(handle: &mut Attempt, record: ErrorRecord) -> Result<(), EngineError> {
    handle.collector.record(record)
}

/// Records every error of an unwound failure against `handle`.
pub fn report_unwinding(handle: &mut Attempt, unwinding: Unwinding) -> Result<(), EngineError> {
    handle.collector.merge(unwinding)
}

/// Ends the attempt: `None` on success, otherwise the finalized report.
pub fn end_attempt(mut handle: Attempt) -> Result<Option<Report>, EngineError> {
    let report = handle.collector.finalize()?;
    debug!(attempt = handle.id, errors = report.len(), "ended top-level attempt");
    if report.is_empty() {
        Ok(None)
    } else {
        Ok(Some(report))
    }
}
