//! Dependency-path frames attached to error records.

use serde::{Deserialize, Serialize};

use crate::key::Key;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
/// One step of the dependency path that led to a failure.
pub enum ContextFrame {
    /// Constructing or injecting a member of `declaring_type`.
    ///
    /// `target` names the parameter or field being satisfied when the failure
    /// came from resolving a dependency rather than from the member itself.
    InjectingMember {
        declaring_type: String,
        member: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<InjectionTarget>,
    },
    /// Resolving the binding for `key`.
    Locating { key: Key },
    /// Calling a user-supplied provider installed at `source`.
    CustomProvider {
        provider_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    /// Inside a module/configuration block or provider function at `source`.
    UserCode { source: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
/// The dependency slot a member frame was satisfying.
pub enum InjectionTarget {
    /// Zero-based parameter `index` named `name`.
    Parameter { index: usize, name: String },
    Field { name: String },
}

impl ContextFrame {
    pub fn constructor(declaring_type: impl Into<String>) -> Self {
        Self::InjectingMember {
            declaring_type: declaring_type.into(),
            member: "<init>".to_string(),
            target: None,
        }
    }

    pub fn member(declaring_type: impl Into<String>, member: impl Into<String>) -> Self {
        Self::InjectingMember {
            declaring_type: declaring_type.into(),
            member: member.into(),
            target: None,
        }
    }

    pub fn parameter(
        declaring_type: impl Into<String>,
        member: impl Into<String>,
        index: usize,
        name: impl Into<String>,
    ) -> Self {
        Self::InjectingMember {
            declaring_type: declaring_type.into(),
            member: member.into(),
            target: Some(InjectionTarget::Parameter {
                index,
                name: name.into(),
            }),
        }
    }

    pub fn field(declaring_type: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self::InjectingMember {
            declaring_type: declaring_type.into(),
            member: name.clone(),
            target: Some(InjectionTarget::Field { name }),
        }
    }

    pub fn locating(key: Key) -> Self {
        Self::Locating { key }
    }

    pub fn custom_provider(provider_type: impl Into<String>, source: Option<String>) -> Self {
        Self::CustomProvider {
            provider_type: provider_type.into(),
            source,
        }
    }

    pub fn user_code(source: impl Into<String>) -> Self {
        Self::UserCode {
            source: source.into(),
        }
    }

    /// Rendered lines for this frame, without indentation.
    ///
    /// Continuation lines start with `\_ `.
    pub fn lines(&self) -> Vec<String> {
        match self {
            ContextFrame::InjectingMember {
                declaring_type,
                member,
                target,
            } => {
                let mut out = vec![format!("at {declaring_type}.{member}")];
                match target {
                    Some(InjectionTarget::Parameter { index, name }) => out.push(format!(
                        "\\_ for {} parameter {name}",
                        ordinal_word(index + 1)
                    )),
                    Some(InjectionTarget::Field { name }) => {
                        out.push(format!("\\_ for field {name}"))
                    }
                    None => {}
                }
                out
            }
            ContextFrame::Locating { key } => vec![format!("while locating {key}")],
            ContextFrame::CustomProvider {
                provider_type,
                source,
            } => {
                let mut out = Vec::new();
                if let Some(source) = source {
                    out.push(format!("at {source}"));
                }
                out.push(format!("\\_ via custom provider {provider_type}"));
                out
            }
            ContextFrame::UserCode { source } => vec![format!("at {source}")],
        }
    }
}

/// English ordinal for a 1-based position: `1st`, `2nd`, `3rd`, `11th`, `22nd`.
pub fn ordinal_word(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_words() {
        let words: Vec<String> = [1, 2, 3, 4, 11, 12, 13, 21, 22, 103, 111]
            .into_iter()
            .map(ordinal_word)
            .collect();
        assert_eq!(
            words,
            ["1st", "2nd", "3rd", "4th", "11th", "12th", "13th", "21st", "22nd", "103rd", "111th"]
        );
    }

    #[test]
    fn parameter_frame_lines() {
        let frame = ContextFrame::parameter("C", "setD", 0, "d");
        assert_eq!(frame.lines(), ["at C.setD", "\\_ for 1st parameter d"]);
    }

    #[test]
    fn field_frame_lines() {
        let frame = ContextFrame::field("B", "c");
        assert_eq!(frame.lines(), ["at B.c", "\\_ for field c"]);
    }

    #[test]
    fn provider_frame_without_source() {
        let frame = ContextFrame::custom_provider("DProvider", None);
        assert_eq!(frame.lines(), ["\\_ via custom provider DProvider"]);
    }
}
