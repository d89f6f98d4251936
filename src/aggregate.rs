//! Aggregate failures thrown to callers, each wrapping one finalized report.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::cause::Cause;
use crate::collector::Report;
use crate::config::RenderConfig;
use crate::error::EngineError;
use crate::frame::ContextFrame;
use crate::record::ErrorRecord;
use crate::render::render_with;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    Provision,
    Configuration,
    Creation,
}

impl AggregateKind {
    /// Leading line of every rendered message of this kind.
    pub fn header(self) -> &'static str {
        match self {
            AggregateKind::Provision => "Unable to provision, see the following errors:",
            AggregateKind::Configuration => "Unable to configure, see the following errors:",
            AggregateKind::Creation => "Unable to create container, see the following errors:",
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateKind::Provision => "provision",
            AggregateKind::Configuration => "configuration",
            AggregateKind::Creation => "creation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Marks whether the container has already wrapped an aggregate.
///
/// Only `Wrapped` aggregates pass through nested provisioning layers
/// untouched; user-built ones are merged into a fresh report.
pub enum WrapState {
    /// Built by user code.
    Unwrapped,
    /// Built by the container at a provisioning boundary.
    Wrapped,
}

/// Accessors shared by the three aggregate failure types.
pub trait Aggregate {
    fn kind(&self) -> AggregateKind;
    fn report(&self) -> &Report;
    /// The complete rendered message, header included.
    fn message(&self) -> &str;
    fn cause(&self) -> Option<&Cause>;

    /// Records in ordinal order.
    fn error_messages(&self) -> Vec<&ErrorRecord> {
        self.report().records().collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AggregateReport {
    report: Report,
    message: String,
    #[serde(default)]
    render: RenderConfig,
}

impl AggregateReport {
    fn build(kind: AggregateKind, report: Report, render: RenderConfig) -> Result<Self, EngineError> {
        if report.is_empty() {
            return Err(EngineError::InvalidReport(format!(
                "{kind} error requires at least one error record"
            )));
        }
        Ok(Self::assemble(kind, report, render))
    }

    fn assemble(kind: AggregateKind, report: Report, render: RenderConfig) -> Self {
        let message = format!("{}\n\n{}", kind.header(), render_with(&report, &render));
        debug!(%kind, errors = report.len(), "built aggregate error");
        Self {
            report,
            message,
            render,
        }
    }

    /// True when `message` is what the report renders to under `render`.
    fn renders_message(&self, kind: AggregateKind) -> bool {
        let rendered = format!("{}\n\n{}", kind.header(), render_with(&self.report, &self.render));
        rendered == self.message
    }

    fn with_frame(&self, kind: AggregateKind, frame: &ContextFrame) -> Self {
        let report = self.report.with_frame(frame);
        let message = format!("{}\n\n{}", kind.header(), render_with(&report, &self.render));
        Self {
            report,
            message,
            render: self.render.clone(),
        }
    }
}

impl fmt::Display for AggregateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{inner}")]
/// Constructing or injecting an already-resolved binding failed.
pub struct ProvisionError {
    #[serde(flatten)]
    inner: AggregateReport,
    state: WrapState,
}

impl ProvisionError {
    /// A provisioning failure raised by user code.
    pub fn new(message: impl Into<String>, cause: Option<Cause>) -> Self {
        let mut record = ErrorRecord::new(message);
        if let Some(cause) = cause {
            record = record.with_cause(cause);
        }
        Self {
            inner: AggregateReport::assemble(
                AggregateKind::Provision,
                Report::from_records(vec![record]),
                RenderConfig::default(),
            ),
            state: WrapState::Unwrapped,
        }
    }

    pub fn from_report(report: Report) -> Result<Self, EngineError> {
        Self::from_report_with(report, &RenderConfig::default())
    }

    pub fn from_report_with(report: Report, render: &RenderConfig) -> Result<Self, EngineError> {
        Ok(Self {
            inner: AggregateReport::build(AggregateKind::Provision, report, render.clone())?,
            state: WrapState::Wrapped,
        })
    }

    /// Container-side constructor; callers never pass an empty list.
    pub(crate) fn from_records(records: Vec<ErrorRecord>, render: &RenderConfig) -> Self {
        Self {
            inner: AggregateReport::assemble(
                AggregateKind::Provision,
                Report::from_records(records),
                render.clone(),
            ),
            state: WrapState::Wrapped,
        }
    }

    pub fn wrap_state(&self) -> WrapState {
        self.state
    }

    /// Same report with one more outer frame on every record.
    pub fn with_context(&self, frame: ContextFrame) -> Self {
        Self {
            inner: self.inner.with_frame(AggregateKind::Provision, &frame),
            state: self.state,
        }
    }

    pub fn into_records(self) -> Vec<ErrorRecord> {
        self.inner.report.into_records()
    }
}

impl Aggregate for ProvisionError {
    fn kind(&self) -> AggregateKind {
        AggregateKind::Provision
    }

    fn report(&self) -> &Report {
        &self.inner.report
    }

    fn message(&self) -> &str {
        &self.inner.message
    }

    /// Set only when the report holds exactly one record.
    fn cause(&self) -> Option<&Cause> {
        match self.inner.report.entries() {
            [only] => only.record().cause(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{inner}")]
/// Structural binding mistake found without running user code.
pub struct ConfigurationError {
    #[serde(flatten)]
    inner: AggregateReport,
}

impl ConfigurationError {
    pub fn from_report(report: Report) -> Result<Self, EngineError> {
        Self::from_report_with(report, &RenderConfig::default())
    }

    /// Fails if any record carries a throwable cause.
    pub fn from_report_with(report: Report, render: &RenderConfig) -> Result<Self, EngineError> {
        if let Some(entry) = report.entries().iter().find(|e| e.record().cause().is_some()) {
            return Err(EngineError::InvalidReport(format!(
                "configuration error #{} carries a cause; configuration records are message-only",
                entry.ordinal()
            )));
        }
        Ok(Self {
            inner: AggregateReport::build(AggregateKind::Configuration, report, render.clone())?,
        })
    }

    pub(crate) fn from_records(records: Vec<ErrorRecord>, render: &RenderConfig) -> Self {
        Self {
            inner: AggregateReport::assemble(
                AggregateKind::Configuration,
                Report::from_records(records),
                render.clone(),
            ),
        }
    }

    pub fn with_context(&self, frame: ContextFrame) -> Self {
        Self {
            inner: self.inner.with_frame(AggregateKind::Configuration, &frame),
        }
    }

    pub fn into_records(self) -> Vec<ErrorRecord> {
        self.inner.report.into_records()
    }
}

impl Aggregate for ConfigurationError {
    fn kind(&self) -> AggregateKind {
        AggregateKind::Configuration
    }

    fn report(&self) -> &Report {
        &self.inner.report
    }

    fn message(&self) -> &str {
        &self.inner.message
    }

    fn cause(&self) -> Option<&Cause> {
        None
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{inner}")]
/// Building the container failed.
pub struct CreationError {
    #[serde(flatten)]
    inner: AggregateReport,
}

impl CreationError {
    pub fn from_report(report: Report) -> Result<Self, EngineError> {
        Self::from_report_with(report, &RenderConfig::default())
    }

    pub fn from_report_with(report: Report, render: &RenderConfig) -> Result<Self, EngineError> {
        Ok(Self {
            inner: AggregateReport::build(AggregateKind::Creation, report, render.clone())?,
        })
    }

    pub(crate) fn from_records(records: Vec<ErrorRecord>, render: &RenderConfig) -> Self {
        Self {
            inner: AggregateReport::assemble(AggregateKind::Creation, Report::from_records(records), render.clone()),
        }
    }
}

impl Aggregate for CreationError {
    fn kind(&self) -> AggregateKind {
        AggregateKind::Creation
    }

    fn report(&self) -> &Report {
        &self.inner.report
    }

    fn message(&self) -> &str {
        &self.inner.message
    }

    /// Set only when exactly one distinct cause object exists.
    fn cause(&self) -> Option<&Cause> {
        self.inner.report.only_cause()
    }
}

#[derive(Debug, Clone, Error, Serialize)]
#[serde(untagged)]
/// Failure of a top-level instance request.
pub enum InjectError {
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl InjectError {
    fn as_aggregate(&self) -> &dyn Aggregate {
        match self {
            InjectError::Provision(e) => e,
            InjectError::Configuration(e) => e,
        }
    }
}

impl Aggregate for InjectError {
    fn kind(&self) -> AggregateKind {
        self.as_aggregate().kind()
    }

    fn report(&self) -> &Report {
        self.as_aggregate().report()
    }

    fn message(&self) -> &str {
        self.as_aggregate().message()
    }

    fn cause(&self) -> Option<&Cause> {
        self.as_aggregate().cause()
    }
}

#[derive(Debug, Clone, Error, Serialize)]
#[serde(untagged)]
/// Any of the three aggregate kinds, as reconstructed from transport.
pub enum AggregateError {
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Creation(#[from] CreationError),
}

impl AggregateError {
    fn as_aggregate(&self) -> &dyn Aggregate {
        match self {
            AggregateError::Provision(e) => e,
            AggregateError::Configuration(e) => e,
            AggregateError::Creation(e) => e,
        }
    }

    /// Whether the carried message still matches its own report.
    pub(crate) fn renders_message(&self) -> bool {
        let inner = match self {
            AggregateError::Provision(e) => &e.inner,
            AggregateError::Configuration(e) => &e.inner,
            AggregateError::Creation(e) => &e.inner,
        };
        inner.renders_message(self.kind())
    }
}

impl From<InjectError> for AggregateError {
    fn from(err: InjectError) -> Self {
        match err {
            InjectError::Provision(e) => AggregateError::Provision(e),
            InjectError::Configuration(e) => AggregateError::Configuration(e),
        }
    }
}

impl Aggregate for AggregateError {
    fn kind(&self) -> AggregateKind {
        self.as_aggregate().kind()
    }

    fn report(&self) -> &Report {
        self.as_aggregate().report()
    }

    fn message(&self) -> &str {
        self.as_aggregate().message()
    }

    fn cause(&self) -> Option<&Cause> {
        self.as_aggregate().cause()
    }
}

#[derive(Debug, Clone)]
/// What user code (constructors, members, providers) may fail with.
pub enum Failure {
    /// An arbitrary throwable.
    Thrown(Cause),
    Provision(ProvisionError),
    Configuration(ConfigurationError),
}

impl Failure {
    pub fn thrown(type_name: impl Into<String>, message: Option<String>) -> Self {
        Failure::Thrown(Cause::new(type_name, message))
    }

    pub fn from_error<E: std::error::Error + 'static>(err: &E) -> Self {
        Failure::Thrown(Cause::from_error(err))
    }
}

impl From<Cause> for Failure {
    fn from(cause: Cause) -> Self {
        Failure::Thrown(cause)
    }
}

impl From<ProvisionError> for Failure {
    fn from(err: ProvisionError) -> Self {
        Failure::Provision(err)
    }
}

impl From<ConfigurationError> for Failure {
    fn from(err: ConfigurationError) -> Self {
        Failure::Configuration(err)
    }
}

impl From<InjectError> for Failure {
    fn from(err: InjectError) -> Self {
        match err {
            InjectError::Provision(e) => Failure::Provision(e),
            InjectError::Configuration(e) => Failure::Configuration(e),
        }
    }
}
