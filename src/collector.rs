//! Call-scoped error accumulation and finalized reports.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cause::{Cause, CauseId};
use crate::chain::Unwinding;
use crate::error::EngineError;
use crate::frame::ContextFrame;
use crate::record::ErrorRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectorState {
    Open,
    Finalized,
}

#[derive(Debug)]
/// Accumulates records for one top-level provisioning or container-build call.
///
/// Owned by the call that created it and passed down explicitly; never shared
/// across threads.
pub struct ErrorCollector {
    records: Vec<ErrorRecord>,
    state: CollectorState,
}

impl Default for ErrorCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            state: CollectorState::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == CollectorState::Open
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Appends `record`; its ordinal is its position in first-seen order.
    pub fn record(&mut self, record: ErrorRecord) -> Result<(), EngineError> {
        self.ensure_open("record")?;
        debug!(
            ordinal = self.records.len() + 1,
            kind = ?record.kind(),
            text = record.message(),
            "collected error record"
        );
        self.records.push(record);
        Ok(())
    }

    /// Records every error carried by an unwound failure.
    pub fn merge(&mut self, unwinding: Unwinding) -> Result<(), EngineError> {
        self.ensure_open("merge")?;
        for record in unwinding.into_records() {
            self.record(record)?;
        }
        Ok(())
    }

    /// Closes the collector and snapshots its records into a [`Report`].
    pub fn finalize(&mut self) -> Result<Report, EngineError> {
        self.ensure_open("finalize")?;
        self.state = CollectorState::Finalized;
        let report = Report::from_records(std::mem::take(&mut self.records));
        debug!(
            errors = report.len(),
            duplicates = report.entries.iter().filter(|e| e.duplicate_of.is_some()).count(),
            "finalized error collector"
        );
        Ok(report)
    }

    fn ensure_open(&self, operation: &str) -> Result<(), EngineError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(EngineError::IllegalState(format!(
                "cannot {operation}: error collector already finalized"
            )))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// One numbered record in a report.
pub struct ReportEntry {
    ordinal: usize,
    record: ErrorRecord,
    /// Earlier ordinal whose cause is this entry's cause object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duplicate_of: Option<usize>,
}

impl ReportEntry {
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn record(&self) -> &ErrorRecord {
        &self.record
    }

    pub fn duplicate_of(&self) -> Option<usize> {
        self.duplicate_of
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ReportRepr")]
/// Immutable snapshot of a finalized collector.
pub struct Report {
    entries: Vec<ReportEntry>,
}

impl Report {
    /// Numbers `records` from 1 and links repeated cause objects back to
    /// their first occurrence.
    pub fn from_records(records: Vec<ErrorRecord>) -> Self {
        let mut first_seen: HashMap<CauseId, usize> = HashMap::new();
        let entries = records
            .into_iter()
            .enumerate()
            .map(|(idx, record)| {
                let ordinal = idx + 1;
                let duplicate_of = record.cause().and_then(|cause| {
                    match first_seen.get(&cause.id()) {
                        Some(first) => Some(*first),
                        None => {
                            first_seen.insert(cause.id(), ordinal);
                            None
                        }
                    }
                });
                ReportEntry {
                    ordinal,
                    record,
                    duplicate_of,
                }
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn records(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.entries.iter().map(|e| &e.record)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cause objects in first-seen order, each listed once.
    pub fn distinct_causes(&self) -> Vec<&Cause> {
        self.entries
            .iter()
            .filter(|e| e.duplicate_of.is_none())
            .filter_map(|e| e.record.cause())
            .collect()
    }

    /// The cause, if exactly one distinct cause object exists.
    pub fn only_cause(&self) -> Option<&Cause> {
        match self.distinct_causes().as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Appends `frame` to every record while keeping ordinals and back
    /// references exactly as they were.
    pub fn with_frame(&self, frame: &ContextFrame) -> Report {
        let entries = self
            .entries
            .iter()
            .map(|e| ReportEntry {
                ordinal: e.ordinal,
                record: e.record.clone().with_frame(frame.clone()),
                duplicate_of: e.duplicate_of,
            })
            .collect();
        Report { entries }
    }

    pub(crate) fn into_records(self) -> Vec<ErrorRecord> {
        self.entries.into_iter().map(|e| e.record).collect()
    }
}

#[derive(Deserialize)]
struct ReportRepr {
    entries: Vec<ReportEntry>,
}

impl From<ReportRepr> for Report {
    /// Records that shared one cause object when serialized share one again.
    fn from(repr: ReportRepr) -> Self {
        let mut by_wire_id: HashMap<u64, Cause> = HashMap::new();
        let entries = repr
            .entries
            .into_iter()
            .map(|entry| {
                let relinked = match entry.record.cause().and_then(|c| c.wire_id().map(|w| (w, c))) {
                    Some((wire_id, cause)) => {
                        let shared = by_wire_id.entry(wire_id).or_insert_with(|| cause.clone());
                        if shared.is_same(cause) {
                            None
                        } else {
                            Some(shared.clone())
                        }
                    }
                    None => None,
                };
                match relinked {
                    Some(shared) => ReportEntry {
                        record: entry.record.with_cause(shared),
                        ..entry
                    },
                    None => entry,
                }
            })
            .collect();
        Report { entries }
    }
}
