//! Binding keys and type-name display helpers.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Identifies a binding: a type name plus an optional binding annotation.
pub struct Key {
    type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    annotation: Option<String>,
}

impl Key {
    /// Key for a Rust type, displayed by its simple name.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::named(simple_type_name(std::any::type_name::<T>()))
    }

    pub fn named(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            annotation: None,
        }
    }

    pub fn annotated_with(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn annotation(&self) -> Option<&str> {
        self.annotation.as_deref()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.annotation {
            Some(annotation) => write!(f, "@{} {}", annotation, self.type_name),
            None => f.write_str(&self.type_name),
        }
    }
}

fn module_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:[A-Za-z_][A-Za-z0-9_]*::)+").expect("valid regex"))
}

/// Strips module paths from a (possibly generic) Rust type name.
///
/// `alloc::sync::Arc<my_app::db::Pool>` becomes `Arc<Pool>`.
pub fn simple_type_name(full: &str) -> String {
    module_path_re().replace_all(full, "").into_owned()
}
