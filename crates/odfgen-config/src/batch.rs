//! Batch configuration parsing.

use crate::{ConfigError, ConfigResult, EngineSettings};
use kdl::{KdlDocument, KdlNode, KdlValue};
use odfgen_core::{Job, Parameters};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A parsed batch file.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub settings: EngineSettings,
    pub resolvers: Vec<ResolverConfig>,
    pub jobs: Vec<Job>,
}

/// A resolver declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    /// Name actions refer to.
    pub name: String,
    pub kind: ResolverKind,
    /// Default output format.
    pub format: Option<String>,
    /// Default output directory.
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolverKind {
    /// Run an external conversion program.
    Command { program: String, args: Vec<String> },
    /// Copy the file into the output directory.
    Copy,
}

impl BatchConfig {
    /// `(job id, action)` pairs whose action names no declared resolver.
    /// Those actions are skipped at run time.
    pub fn unresolved_actions(&self) -> Vec<(String, String)> {
        let known: HashSet<&str> = self.resolvers.iter().map(|r| r.name.as_str()).collect();
        self.jobs
            .iter()
            .flat_map(|job| {
                job.actions
                    .iter()
                    .filter(|a| !known.contains(a.as_str()))
                    .map(|a| (job.id.clone(), a.clone()))
            })
            .collect()
    }
}

/// Read and parse a batch file. Relative paths resolve against its directory.
pub fn load_batch(path: &Path) -> ConfigResult<BatchConfig> {
    let content = std::fs::read_to_string(path)?;
    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    parse_batch(&content, base_dir)
}

/// Parse a batch configuration from KDL text.
pub fn parse_batch(kdl: &str, base_dir: &Path) -> ConfigResult<BatchConfig> {
    let doc: KdlDocument = kdl.parse()?;

    let mut settings = EngineSettings::default();
    let mut resolvers: Vec<ResolverConfig> = Vec::new();
    let mut jobs: Vec<Job> = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "settings" => {
                settings = parse_settings(node)?;
            }
            "resolver" => {
                let resolver = parse_resolver(node, base_dir)?;
                if resolvers.iter().any(|r| r.name == resolver.name) {
                    return Err(ConfigError::Duplicate(format!("resolver '{}'", resolver.name)));
                }
                resolvers.push(resolver);
            }
            "job" => {
                let job = parse_job(node, base_dir)?;
                if jobs.iter().any(|j| j.id == job.id) {
                    return Err(ConfigError::Duplicate(format!("job '{}'", job.id)));
                }
                jobs.push(job);
            }
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(BatchConfig {
        settings,
        resolvers,
        jobs,
    })
}

fn parse_settings(node: &KdlNode) -> ConfigResult<EngineSettings> {
    let mut settings = EngineSettings::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let field = child.name().value();
            match field {
                "extract-yield-every" => {
                    settings.extract_yield_every = get_usize_arg(child, field)?.max(1);
                }
                "stream-threshold" => {
                    settings.stream_threshold = get_usize_arg(child, field)? as u64;
                }
                "output-extension" => {
                    settings.output_extension = get_first_string_arg(child)
                        .ok_or_else(|| ConfigError::MissingField(field.to_string()))?;
                }
                "cleanup-on-failure" => {
                    settings.cleanup_on_failure = get_bool_arg(child, field)?;
                }
                "strict-placeholders" => {
                    settings.strict_placeholders = get_bool_arg(child, field)?;
                }
                "delete-chunk-delay-ms" => {
                    settings.delete_chunk_delay =
                        Duration::from_millis(get_usize_arg(child, field)? as u64);
                }
                "fan-out-width" => {
                    settings.fan_out_width = get_usize_arg(child, field)?.max(1);
                }
                _ => {}
            }
        }
    }

    Ok(settings)
}

fn parse_resolver(node: &KdlNode, base_dir: &Path) -> ConfigResult<ResolverConfig> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("resolver name".to_string()))?;
    let kind_name = get_string_prop(node, "type").unwrap_or_else(|| "command".to_string());

    let kind = match kind_name.as_str() {
        "command" => {
            let program = get_string_prop(node, "program").ok_or_else(|| {
                ConfigError::MissingField(format!("program for resolver '{}'", name))
            })?;
            let mut args = Vec::new();
            if let Some(children) = node.children() {
                for child in children.nodes() {
                    if child.name().value() == "arg" {
                        args.extend(get_all_string_args(child));
                    }
                }
            }
            ResolverKind::Command { program, args }
        }
        "copy" => ResolverKind::Copy,
        other => {
            return Err(invalid(
                "resolver type",
                &format!("unknown resolver type: {}", other),
            ));
        }
    };

    Ok(ResolverConfig {
        name,
        kind,
        format: get_string_prop(node, "format"),
        output_dir: get_string_prop(node, "output-dir").map(|p| resolve_path(base_dir, &p)),
    })
}

fn parse_job(node: &KdlNode, base_dir: &Path) -> ConfigResult<Job> {
    let id =
        get_first_string_arg(node).ok_or_else(|| ConfigError::MissingField("job id".to_string()))?;

    let required = |prop: &str| {
        get_string_prop(node, prop)
            .map(|p| resolve_path(base_dir, &p))
            .ok_or_else(|| ConfigError::MissingField(format!("{} for job '{}'", prop, id)))
    };
    let template = required("template")?;
    let working_dir = required("working-dir")?;
    let output_dir = required("output-dir")?;
    let output_name = get_string_prop(node, "output-name").unwrap_or_else(|| id.clone());

    let mut job = Job::new(id.clone(), template, working_dir, output_dir, output_name);

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "data-file" => {
                    let path = get_first_string_arg(child).ok_or_else(|| {
                        ConfigError::MissingField(format!("data-file path for job '{}'", id))
                    })?;
                    let content = std::fs::read_to_string(resolve_path(base_dir, &path))?;
                    job.data = serde_json::from_str(&content)?;
                }
                "data" => {
                    job.data = node_to_json(child);
                }
                "action" => {
                    job.actions.extend(get_all_string_args(child));
                }
                "parameters" => {
                    job.parameters = match node_to_json(child) {
                        Value::Object(map) => Parameters::from(map),
                        _ => {
                            return Err(invalid(
                                "parameters",
                                &format!("job '{}' parameters must be a block", id),
                            ));
                        }
                    };
                }
                _ => {}
            }
        }
    }

    Ok(job)
}

fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Convert a node into JSON.
///
/// A node with a single argument becomes that value, several arguments an
/// array; properties and children become object members. Repeated child
/// names collect into an array.
fn node_to_json(node: &KdlNode) -> Value {
    let args: Vec<Value> = node
        .entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| kdl_to_json(e.value()))
        .collect();

    let mut object = Map::new();
    for entry in node.entries() {
        if let Some(name) = entry.name() {
            object.insert(name.value().to_string(), kdl_to_json(entry.value()));
        }
    }
    if let Some(children) = node.children() {
        for child in children.nodes() {
            let key = child.name().value().to_string();
            let value = node_to_json(child);
            match object.remove(&key) {
                Some(Value::Array(mut items)) => {
                    items.push(value);
                    object.insert(key, Value::Array(items));
                }
                Some(existing) => {
                    object.insert(key, Value::Array(vec![existing, value]));
                }
                None => {
                    object.insert(key, value);
                }
            }
        }
    }

    if object.is_empty() {
        match args.len() {
            0 => Value::Null,
            1 => args.into_iter().next().unwrap_or(Value::Null),
            _ => Value::Array(args),
        }
    } else {
        if !args.is_empty() {
            object.insert("value".to_string(), Value::Array(args));
        }
        Value::Object(object)
    }
}

fn kdl_to_json(value: &KdlValue) -> Value {
    match value {
        KdlValue::String(s) => Value::String(s.clone()),
        KdlValue::Integer(i) => i64::try_from(*i)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(i.to_string())),
        KdlValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        KdlValue::Bool(b) => Value::Bool(*b),
        KdlValue::Null => Value::Null,
    }
}

// Helper functions for extracting values from KDL nodes

fn get_first_arg(node: &KdlNode) -> Option<&KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .map(|e| e.value())
}

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    get_first_arg(node)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

fn get_usize_arg(node: &KdlNode, field: &str) -> ConfigResult<usize> {
    get_first_arg(node)
        .and_then(|v| v.as_integer())
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| invalid(field, "expected a non-negative integer"))
}

fn get_bool_arg(node: &KdlNode, field: &str) -> ConfigResult<bool> {
    get_first_arg(node)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| invalid(field, "expected a boolean"))
}
