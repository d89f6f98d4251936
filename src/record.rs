//! Immutable error records.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cause::Cause;
use crate::frame::ContextFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Category tag rendered as `[<Name>]` after the ordinal.
pub enum ErrorKind {
    ErrorInjectingConstructor,
    ErrorInjectingMethod,
    ErrorInjectingField,
    ErrorInCustomProvider,
    ErrorInUserCode,
    InjectInnerClass,
    MisplacedBindingAnnotation,
    MissingImplementation,
    CircularDependency,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::ErrorInjectingConstructor => "ErrorInjectingConstructor",
            ErrorKind::ErrorInjectingMethod => "ErrorInjectingMethod",
            ErrorKind::ErrorInjectingField => "ErrorInjectingField",
            ErrorKind::ErrorInCustomProvider => "ErrorInCustomProvider",
            ErrorKind::ErrorInUserCode => "ErrorInUserCode",
            ErrorKind::InjectInnerClass => "InjectInnerClass",
            ErrorKind::MisplacedBindingAnnotation => "MisplacedBindingAnnotation",
            ErrorKind::MissingImplementation => "MissingImplementation",
            ErrorKind::CircularDependency => "CircularDependency",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// One failure occurrence: message, optional cause, and dependency path.
///
/// Frames are stored innermost-first; outer layers append as they unwind.
pub struct ErrorRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kind: Option<ErrorKind>,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cause: Option<Cause>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    frames: Vec<ContextFrame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

impl ErrorRecord {
    /// A container-side message with no throwable cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: None,
            message: message.into(),
            cause: None,
            frames: Vec::new(),
            source: None,
        }
    }

    /// A record describing `cause`, whose text becomes the message.
    pub fn from_cause(kind: ErrorKind, cause: Cause) -> Self {
        Self {
            kind: Some(kind),
            message: cause.to_string(),
            cause: Some(cause),
            frames: Vec::new(),
            source: None,
        }
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_cause(mut self, cause: Cause) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Declaration site of the offending binding.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns a copy with `frame` appended as the new outermost frame.
    pub fn with_frame(mut self, frame: ContextFrame) -> Self {
        self.frames.push(frame);
        self
    }

    pub(crate) fn with_frames(mut self, frames: &[ContextFrame]) -> Self {
        self.frames.extend_from_slice(frames);
        self
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    pub fn frames(&self) -> &[ContextFrame] {
        &self.frames
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Same cause object and the same message text.
    pub fn is_duplicate_of(&self, other: &ErrorRecord) -> bool {
        self.shares_cause_with(other) && self.message == other.message
    }

    pub fn shares_cause_with(&self, other: &ErrorRecord) -> bool {
        match (&self.cause, &other.cause) {
            (Some(a), Some(b)) => a.is_same(b),
            _ => false,
        }
    }
}
