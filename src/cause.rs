//! Throwable-equivalent failure causes with reference identity.
//!
//! Rust values have no object identity, so every freshly built [`Cause`]
//! receives a [`CauseId`] from a process-wide counter. Cloning a `Cause`
//! shares the allocation and therefore the identity; building a second cause
//! with identical text does not.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::key::simple_type_name;

static NEXT_CAUSE_ID: AtomicU64 = AtomicU64::new(1);

fn next_cause_id() -> CauseId {
    CauseId(NEXT_CAUSE_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Opaque identity token for one cause allocation.
pub struct CauseId(u64);

impl CauseId {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "CauseSnapshot", into = "CauseSnapshot")]
/// The original failure object behind an error record.
pub struct Cause {
    inner: Arc<CauseInner>,
}

struct CauseInner {
    id: CauseId,
    /// Identity the cause had in the process that serialized it.
    wire_id: Option<u64>,
    type_name: String,
    message: Option<String>,
    stack: Vec<String>,
    source: Option<Cause>,
}

impl Cause {
    /// Creates a cause with no stack lines and no source.
    pub fn new(type_name: impl Into<String>, message: Option<String>) -> Self {
        Self::builder(type_name).message_opt(message).build()
    }

    pub fn builder(type_name: impl Into<String>) -> CauseBuilder {
        CauseBuilder {
            type_name: type_name.into(),
            message: None,
            stack: Vec::new(),
            source: None,
        }
    }

    /// Creates a cause whose message is the text of `source`, the way a
    /// throwable constructed only from its cause describes itself.
    pub fn wrapping(type_name: impl Into<String>, source: Cause) -> Self {
        Self::builder(type_name)
            .message(source.to_string())
            .source(source)
            .build()
    }

    /// Adapts a Rust error, following its `source()` chain.
    pub fn from_error<E: std::error::Error + 'static>(err: &E) -> Self {
        let source = err.source().map(cause_from_dyn);
        let mut builder =
            Self::builder(simple_type_name(std::any::type_name::<E>())).message(err.to_string());
        if let Some(source) = source {
            builder = builder.source(source);
        }
        builder.build()
    }

    pub fn id(&self) -> CauseId {
        self.inner.id
    }

    pub fn type_name(&self) -> &str {
        &self.inner.type_name
    }

    pub fn message(&self) -> Option<&str> {
        self.inner.message.as_deref()
    }

    pub fn stack_trace(&self) -> &[String] {
        &self.inner.stack
    }

    pub fn source(&self) -> Option<&Cause> {
        self.inner.source.as_ref()
    }

    /// Reference identity: true only for clones of the same allocation.
    pub fn is_same(&self, other: &Cause) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Iterates this cause followed by its transitive sources.
    pub fn chain(&self) -> impl Iterator<Item = &Cause> {
        std::iter::successors(Some(self), |c| c.source())
    }

    pub(crate) fn wire_id(&self) -> Option<u64> {
        self.inner.wire_id
    }
}

fn cause_from_dyn(err: &(dyn std::error::Error + 'static)) -> Cause {
    let mut builder = Cause::builder("Error").message(err.to_string());
    if let Some(source) = err.source() {
        builder = builder.source(cause_from_dyn(source));
    }
    builder.build()
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.message {
            Some(message) => write!(f, "{}: {}", self.inner.type_name, message),
            None => f.write_str(&self.inner.type_name),
        }
    }
}

impl fmt::Debug for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cause")
            .field("id", &self.inner.id)
            .field("type_name", &self.inner.type_name)
            .field("message", &self.inner.message)
            .field("source", &self.inner.source)
            .finish()
    }
}

impl PartialEq for Cause {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

impl Eq for Cause {}

#[derive(Debug, Clone)]
/// Accumulates a cause before its identity is assigned.
pub struct CauseBuilder {
    type_name: String,
    message: Option<String>,
    stack: Vec<String>,
    source: Option<Cause>,
}

impl CauseBuilder {
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn message_opt(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    /// Appends one stack line, for example `at RealD.<init>(lib.rs:12)`.
    pub fn frame(mut self, line: impl Into<String>) -> Self {
        self.stack.push(line.into());
        self
    }

    pub fn source(mut self, source: Cause) -> Self {
        self.source = Some(source);
        self
    }

    pub fn build(self) -> Cause {
        Cause {
            inner: Arc::new(CauseInner {
                id: next_cause_id(),
                wire_id: None,
                type_name: self.type_name,
                message: self.message,
                stack: self.stack,
                source: self.source,
            }),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CauseSnapshot {
    id: u64,
    type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    stack: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<Box<CauseSnapshot>>,
}

impl From<Cause> for CauseSnapshot {
    fn from(cause: Cause) -> Self {
        snapshot_of(&cause)
    }
}

fn snapshot_of(cause: &Cause) -> CauseSnapshot {
    CauseSnapshot {
        id: cause.id().get(),
        type_name: cause.type_name().to_string(),
        message: cause.inner.message.clone(),
        stack: cause.inner.stack.clone(),
        source: cause.source().map(|s| Box::new(snapshot_of(s))),
    }
}

impl From<CauseSnapshot> for Cause {
    fn from(snapshot: CauseSnapshot) -> Self {
        Cause {
            inner: Arc::new(CauseInner {
                id: next_cause_id(),
                wire_id: Some(snapshot.id),
                type_name: snapshot.type_name,
                message: snapshot.message,
                stack: snapshot.stack,
                source: snapshot.source.map(|s| Cause::from(*s)),
            }),
        }
    }
}
