//! Configuration loader for the wave pipeline.
//!
//! Reads the YAML pipeline configuration, substitutes environment variables
//! using `${VAR}` / `${VAR:-default}` syntax, resolves relative paths
//! against the configuration file's directory and validates the result.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;

/// Load, expand and validate a pipeline configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline config from {:?}", path))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    parse_config(&content, base).with_context(|| format!("Invalid pipeline config {:?}", path))
}

/// Parse configuration text; relative paths are taken from `base`.
pub fn parse_config(content: &str, base: &Path) -> Result<PipelineConfig> {
    let expanded = expand_env_vars(content)?;

    let mut config: PipelineConfig =
        serde_yaml::from_str(&expanded).context("Failed to parse pipeline config YAML")?;

    resolve_paths(&mut config, base);
    config.validate()?;

    Ok(config)
}

fn resolve_paths(config: &mut PipelineConfig, base: &Path) {
    let resolve = |p: &PathBuf| -> PathBuf {
        if p.is_absolute() {
            p.clone()
        } else {
            base.join(p)
        }
    };

    for source in &mut config.sources {
        source.inputs = source.inputs.iter().map(resolve).collect();
        source.schema = source.schema.as_ref().map(resolve);
    }
    config.output.path = resolve(&config.output.path);
    config.output.summary_path = config.output.summary_path.as_ref().map(resolve);
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in YAML content
/// Supports ${VAR} and ${VAR:-default} syntax
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut var_expr = String::new();
            let mut depth = 1;

            while depth > 0 {
                match chars.next() {
                    Some('{') => {
                        depth += 1;
                        var_expr.push('{');
                    }
                    Some('}') => {
                        depth -= 1;
                        if depth > 0 {
                            var_expr.push('}');
                        }
                    }
                    Some(c) => var_expr.push(c),
                    None => anyhow::bail!("Unclosed variable substitution: ${{{}", var_expr),
                }
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// Resolve variable expression (supports VAR and VAR:-default syntax)
fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}
