//! Canonical text rendering of finalized reports.
//!
//! ```text
//! 1) [ErrorInjectingConstructor]: UnsupportedOperationException
//!   at RealD.<init>
//!   at C.setD
//!       \_ for 1st parameter d
//! Caused by: UnsupportedOperationException
//!     at RealD.<init>(lib.rs:40)
//!
//! 2) ...
//!
//! 2 errors
//! ```
//!
//! Output is a pure function of the report and config.

use std::fmt::Write as _;

use crate::cause::Cause;
use crate::collector::{Report, ReportEntry};
use crate::config::RenderConfig;

const FRAME_INDENT: &str = "  ";
const CONTINUATION_INDENT: &str = "      ";
const STACK_INDENT: &str = "    ";

pub fn render(report: &Report) -> String {
    render_with(report, &RenderConfig::default())
}

pub fn render_with(report: &Report, config: &RenderConfig) -> String {
    let mut out = String::new();
    for entry in report.entries() {
        render_entry(&mut out, entry, config);
        out.push('\n');
    }

    let count = report.len();
    if count == 1 {
        out.truncate(out.trim_end_matches('\n').len());
    } else {
        let _ = write!(out, "{count} errors");
    }
    out
}

fn render_entry(out: &mut String, entry: &ReportEntry, config: &RenderConfig) {
    let record = entry.record();
    let _ = write!(out, "{}) ", entry.ordinal());
    if let Some(kind) = record.kind() {
        let _ = write!(out, "[{kind}]: ");
    }
    out.push_str(record.message());
    out.push('\n');

    if let Some(source) = record.source() {
        let _ = writeln!(out, "{FRAME_INDENT}at {source}");
    }
    for frame in record.frames() {
        for line in frame.lines() {
            let indent = if line.starts_with("\\_") {
                CONTINUATION_INDENT
            } else {
                FRAME_INDENT
            };
            let _ = writeln!(out, "{indent}{line}");
        }
    }

    if let Some(cause) = record.cause() {
        match entry.duplicate_of() {
            Some(first) => {
                let _ = writeln!(out, "Caused by: {cause}");
                let _ = writeln!(out, "{STACK_INDENT}(same stack trace as error #{first})");
            }
            None => render_cause_chain(out, cause, config),
        }
    }
}

fn render_cause_chain(out: &mut String, cause: &Cause, config: &RenderConfig) {
    for link in cause.chain() {
        let _ = writeln!(out, "Caused by: {link}");
        let stack = link.stack_trace();
        let shown = config
            .max_stack_lines
            .map_or(stack.len(), |max| max.min(stack.len()));
        for line in &stack[..shown] {
            let _ = writeln!(out, "{STACK_INDENT}{line}");
        }
        if shown < stack.len() {
            let _ = writeln!(out, "{STACK_INDENT}... {} more", stack.len() - shown);
        }
    }
}
