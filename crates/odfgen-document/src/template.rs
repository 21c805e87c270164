//! Placeholder template engine.
//!
//! Supports placeholders like:
//! - `${title}` - Top-level data member
//! - `${customer.name}` - Nested object member
//! - `${lines.0.amount}` - Array element by index
//! - `${resource:images/logo.png}` - Absolute path of a file under the job's working directory
//!
//! Substituted values are XML-escaped.

use async_trait::async_trait;
use odfgen_core::document::{Document, PartKind, TemplateEngine};
use odfgen_core::{Error, Result};
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::LazyLock;

// Regex for matching ${...} placeholders
static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\$\{(?:resource:([^}]+)|([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z0-9_]+)*))\}",
    )
    .unwrap()
});

/// Parts a template is rendered into.
const RENDERED_PARTS: [PartKind; 2] = [PartKind::Content, PartKind::Styles];

/// Template engine substituting `${...}` placeholders from job data.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderEngine {
    strict: bool,
}

impl PlaceholderEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail on placeholders the data cannot satisfy instead of leaving them.
    pub fn strict() -> Self {
        Self { strict: true }
    }

    /// Interpolate all placeholders in a string.
    pub fn interpolate(&self, input: &str, data: &Value, working_dir: &Path) -> Result<String> {
        let mut output = String::with_capacity(input.len());
        let mut last = 0;

        for caps in PLACEHOLDER_REGEX.captures_iter(input) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            output.push_str(&input[last..whole.start()]);

            if let Some(resource) = caps.get(1) {
                output.push_str(&escape_xml(&resolve_resource(
                    working_dir,
                    resource.as_str(),
                )?));
            } else if let Some(path) = caps.get(2) {
                match lookup(data, path.as_str()) {
                    Some(value) => output.push_str(&escape_xml(&value)),
                    None if self.strict => {
                        return Err(Error::Render(format!(
                            "no value for placeholder {}",
                            whole.as_str()
                        )));
                    }
                    None => output.push_str(whole.as_str()),
                }
            }

            last = whole.end();
        }

        output.push_str(&input[last..]);
        Ok(output)
    }
}

#[async_trait]
impl TemplateEngine for PlaceholderEngine {
    async fn render(&self, document: &mut Document, data: &Value, working_dir: &Path) -> Result<()> {
        for kind in RENDERED_PARTS {
            let part = document.get_part_mut(kind).ok_or_else(|| {
                Error::Format(format!("part not found: {}", kind.member_path()))
            })?;
            part.markup = self
                .interpolate(&part.markup, data, working_dir)
                .map_err(|e| match e {
                    Error::Render(message) => {
                        Error::Render(format!("{}: {}", kind.member_path(), message))
                    }
                    other => other,
                })?;
        }
        Ok(())
    }
}

/// Resolve a dotted path to a scalar rendered as text.
fn lookup(data: &Value, path: &str) -> Option<String> {
    let mut current = data;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    match current {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn resolve_resource(working_dir: &Path, relative: &str) -> Result<String> {
    let path = working_dir.join(relative.trim());
    if !path.exists() {
        return Err(Error::Render(format!(
            "resource not found: {}",
            path.display()
        )));
    }
    Ok(path.to_string_lossy().to_string())
}

fn escape_xml(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
