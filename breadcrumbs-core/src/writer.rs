//! Rendering of crumb trees.
//!
//! - Human-readable text for quick debugging
//! - JSON, one object per crumb with its trail nested inside

use serde_json::Value;

use crate::crumb::{Crumb, Fields};
use crate::trail::TrailCapable;

/// Crumb tree renderer.
pub struct TrailWriter;

impl TrailWriter {
    /// Format a crumb and everything below it as an indented tree.
    ///
    /// ```text
    /// RootEntry
    /// ├── pipeline::load  info{path="in.csv"}
    /// │   └── pipeline::parse  info{strict=true}  extra{rows=10}
    /// └── pipeline::check  info{token=REDACTED}
    /// ```
    pub fn format_human_readable(root: &Crumb) -> String {
        let mut output = String::new();
        output.push_str(&Self::format_line(root));
        output.push('\n');
        Self::format_children(root, "", &mut output);
        output
    }

    pub fn to_json(root: &Crumb) -> serde_json::Result<Value> {
        serde_json::to_value(root)
    }

    pub fn to_json_string(root: &Crumb, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(root)
        } else {
            serde_json::to_string(root)
        }
    }

    fn format_children(parent: &Crumb, prefix: &str, output: &mut String) {
        let children = parent.trail();
        let count = children.len();
        for (i, child) in children.iter().enumerate() {
            let last = i + 1 == count;
            let (branch, continuation) = if last {
                ("└── ", "    ")
            } else {
                ("├── ", "│   ")
            };
            output.push_str(prefix);
            output.push_str(branch);
            output.push_str(&Self::format_line(child));
            output.push('\n');
            Self::format_children(child, &format!("{}{}", prefix, continuation), output);
        }
    }

    fn format_line(crumb: &Crumb) -> String {
        let mut line = crumb.title().to_string();
        let info = crumb.info();
        if !info.is_empty() {
            line.push_str(&format!("  info{{{}}}", Self::format_fields(&info)));
        }
        let extra = crumb.extra();
        if !extra.is_empty() {
            line.push_str(&format!("  extra{{{}}}", Self::format_fields(&extra)));
        }
        line
    }

    fn format_fields(fields: &Fields) -> String {
        fields
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
