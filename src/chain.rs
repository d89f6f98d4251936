//! Context chain builder: a failure picking up frames while it unwinds.

use crate::frame::ContextFrame;
use crate::record::ErrorRecord;

#[derive(Debug, Clone)]
/// Error records travelling outward through nested provisioning calls.
///
/// Each layer with something to say about the dependency path calls
/// [`Unwinding::with_frame`]. Pending frames are applied to every record when
/// the failure reaches a collector, after the frames the records already had.
pub struct Unwinding {
    records: Vec<ErrorRecord>,
    frames: Vec<ContextFrame>,
}

impl Unwinding {
    pub fn new(record: ErrorRecord) -> Self {
        Self::from_records(vec![record])
    }

    pub fn from_records(records: Vec<ErrorRecord>) -> Self {
        Self {
            records,
            frames: Vec::new(),
        }
    }

    /// Adds `frame` as the new outermost step.
    ///
    /// A frame equal to the current outermost one is the same unwinding step
    /// reported twice and is dropped.
    pub fn with_frame(mut self, frame: ContextFrame) -> Self {
        if self.frames.last() != Some(&frame) {
            self.frames.push(frame);
        }
        self
    }

    pub fn pending_frames(&self) -> &[ContextFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Finished records, innermost frames first.
    pub fn into_records(self) -> Vec<ErrorRecord> {
        let frames = self.frames;
        self.records
            .into_iter()
            .map(|record| record.with_frames(&frames))
            .collect()
    }
}

impl From<ErrorRecord> for Unwinding {
    fn from(record: ErrorRecord) -> Self {
        Self::new(record)
    }
}
