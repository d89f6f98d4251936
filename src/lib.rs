pub mod aggregate;
pub mod attempt;
pub mod cause;
pub mod chain;
pub mod collector;
pub mod config;
pub mod container;
pub mod error;
pub mod frame;
pub mod guard;
pub mod key;
pub mod record;
pub mod render;
pub mod transport;

use std::fs;
use std::path::Path;

pub use aggregate::{
    Aggregate, AggregateError, AggregateKind, ConfigurationError, CreationError, Failure,
    InjectError, ProvisionError, WrapState,
};
pub use attempt::{begin_top_level_attempt, end_attempt, report_failure, report_unwinding, Attempt};
pub use cause::{Cause, CauseBuilder, CauseId};
pub use chain::Unwinding;
pub use collector::{ErrorCollector, Report, ReportEntry};
pub use config::{EngineConfig, EnvProvider, MapEnvProvider, ProcessEnvProvider, RenderConfig, Stage};
pub use container::{Binder, Injector, InjectorBuilder, ProvisionContext, TypeSpec};
pub use error::EngineError;
pub use frame::{ContextFrame, InjectionTarget};
pub use guard::{should_wrap, WrapDecision};
pub use key::Key;
pub use record::{ErrorKind, ErrorRecord};
pub use render::{render, render_with};

/// Reads a transport token from `path` and rebuilds the aggregate it carries.
pub fn decode_file(path: &Path) -> Result<AggregateError, EngineError> {
    let token = fs::read_to_string(path)?;
    transport::decode(token.trim())
}

/// Checks format version and digest of the token in `path` without keeping
/// the aggregate.
pub fn verify_file(path: &Path) -> Result<(), EngineError> {
    decode_file(path).map(|_| ())
}
