//! Manifest parsing.

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use serde_yaml::{Mapping, Value as YamlValue};
use tracing::{debug, instrument};

use super::{placeholders, ActionRuntime, ActionSpec, ManifestDescriptor, PackageSpec};
use crate::error::{DeployError, DeployResult};
use crate::types::Parameters;

/// Keys allowed in a typed input declaration (`{type, value, default, ...}`).
const TYPED_INPUT_KEYS: &[&str] = &["type", "value", "default", "description", "required"];

#[derive(Debug, Default, Deserialize)]
struct RawManifest {
    #[serde(default)]
    project: Option<RawProject>,
    #[serde(default)]
    packages: Option<Mapping>,
    /// Single-package form: `package: { name: ..., actions: ... }`.
    #[serde(default)]
    package: Option<RawNamedPackage>,
}

#[derive(Debug, Default, Deserialize)]
struct RawProject {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    packages: Option<Mapping>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPackage {
    #[serde(default)]
    inputs: Option<Mapping>,
    #[serde(default)]
    actions: Option<Mapping>,
}

#[derive(Debug, Deserialize)]
struct RawNamedPackage {
    name: String,
    #[serde(flatten)]
    body: RawPackage,
}

#[derive(Debug, Default, Deserialize)]
struct RawAction {
    #[serde(default)]
    function: Option<String>,
    #[serde(default)]
    runtime: Option<String>,
    #[serde(default)]
    main: Option<String>,
    #[serde(default, rename = "web-export")]
    web_export: Option<YamlValue>,
    #[serde(default)]
    web: Option<YamlValue>,
    #[serde(default)]
    inputs: Option<Mapping>,
    #[serde(default)]
    annotations: Option<Mapping>,
    #[serde(default)]
    limits: Option<YamlValue>,
}

/// Read and parse a manifest file.
#[instrument]
pub fn parse_manifest(path: &Path) -> DeployResult<ManifestDescriptor> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        DeployError::ManifestParse(format!("failed to read {name}: {e}"))
    })?;
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    parse_manifest_str(&content, &base_dir)
}

/// Parse manifest text; function paths resolve against `base_dir`.
pub fn parse_manifest_str(content: &str, base_dir: &Path) -> DeployResult<ManifestDescriptor> {
    let raw: Option<RawManifest> = serde_yaml::from_str(content).map_err(parse_error)?;
    let raw = raw.unwrap_or_default();

    let mut project_name = None;
    let mut package_entries: Vec<(String, RawPackage)> = Vec::new();

    if let Some(project) = raw.project {
        project_name = project.name;
        collect_packages(project.packages, &mut package_entries)?;
    }
    collect_packages(raw.packages, &mut package_entries)?;
    if let Some(named) = raw.package {
        push_package(named.name, named.body, &mut package_entries)?;
    }

    if package_entries.is_empty() {
        return Err(invalid("manifest declares no packages"));
    }

    let packages = package_entries
        .into_iter()
        .map(|(name, body)| build_package(name, body, base_dir))
        .collect::<DeployResult<Vec<_>>>()?;

    let descriptor = ManifestDescriptor {
        project: project_name,
        base_dir: base_dir.to_owned(),
        packages,
    };
    debug!(
        packages = descriptor.packages.len(),
        actions = descriptor.action_count(),
        "manifest parsed"
    );
    Ok(descriptor)
}

fn collect_packages(
    packages: Option<Mapping>,
    into: &mut Vec<(String, RawPackage)>,
) -> DeployResult<()> {
    for (key, value) in packages.unwrap_or_default() {
        let name = mapping_key(&key, "package")?;
        let body: Option<RawPackage> = serde_yaml::from_value(value)
            .map_err(|e| invalid(&format!("package {name}: {e}")))?;
        push_package(name, body.unwrap_or_default(), into)?;
    }
    Ok(())
}

fn push_package(
    name: String,
    body: RawPackage,
    into: &mut Vec<(String, RawPackage)>,
) -> DeployResult<()> {
    if into.iter().any(|(existing, _)| *existing == name) {
        return Err(invalid(&format!("package {name} is declared more than once")));
    }
    into.push((name, body));
    Ok(())
}

fn build_package(name: String, body: RawPackage, base_dir: &Path) -> DeployResult<PackageSpec> {
    let parameters = convert_inputs(body.inputs, &format!("package {name}"))?;

    for key in placeholders(&name) {
        if !parameters.contains_key(key) {
            return Err(invalid(&format!(
                "package {name} references undeclared input {key}"
            )));
        }
    }

    let mut actions = Vec::new();
    for (key, value) in body.actions.unwrap_or_default() {
        let action_name = mapping_key(&key, "action")?;
        let raw: Option<RawAction> = serde_yaml::from_value(value)
            .map_err(|e| invalid(&format!("action {action_name}: {e}")))?;
        actions.push(build_action(
            action_name,
            raw.unwrap_or_default(),
            &parameters,
            base_dir,
        )?);
    }

    if actions.is_empty() {
        return Err(invalid(&format!("package {name} declares no actions")));
    }

    Ok(PackageSpec {
        name,
        parameters,
        actions,
    })
}

fn build_action(
    name: String,
    raw: RawAction,
    package_parameters: &Parameters,
    base_dir: &Path,
) -> DeployResult<ActionSpec> {
    let context = format!("action {name}");
    let parameters = convert_inputs(raw.inputs, &context)?;

    for key in placeholders(&name) {
        if !parameters.contains_key(key) && !package_parameters.contains_key(key) {
            return Err(invalid(&format!("{context} references undeclared input {key}")));
        }
    }

    let function = raw
        .function
        .ok_or_else(|| invalid(&format!("{context} has no function")))?;
    let function = resolve_function(&function, base_dir, &context)?;

    let kind = match raw.runtime {
        Some(runtime) if !runtime.trim().is_empty() => runtime.trim().to_owned(),
        _ => infer_runtime(&function)
            .ok_or_else(|| invalid(&format!("{context}: cannot infer runtime, set `runtime`")))?
            .to_owned(),
    };

    let web_export = match raw.web_export.or(raw.web) {
        Some(value) => parse_flag(&value).ok_or_else(|| {
            invalid(&format!("{context}: web-export must be true, false or raw"))
        })?,
        None => false,
    };

    let annotations = convert_mapping(raw.annotations, &context)?;
    let limits = raw
        .limits
        .map(|v| yaml_to_json(&v, &context))
        .transpose()?;

    Ok(ActionSpec {
        name,
        parameters,
        runtime: ActionRuntime {
            function,
            kind,
            main: raw.main.filter(|m| !m.trim().is_empty()),
            web_export,
            annotations,
            limits,
        },
    })
}

/// Resolve an action's source file, which must live under `base_dir`.
fn resolve_function(function: &str, base_dir: &Path, context: &str) -> DeployResult<PathBuf> {
    let relative = Path::new(function);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(invalid(&format!(
            "{context}: function path {function} must be relative to the manifest"
        )));
    }

    let path = base_dir.join(relative);
    if !path.is_file() {
        return Err(invalid(&format!(
            "{context}: function file {function} not found"
        )));
    }

    // Symlinks may still point outside the manifest directory.
    let root = if base_dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        base_dir
    };
    let escapes = match (root.canonicalize(), path.canonicalize()) {
        (Ok(root), Ok(resolved)) => !resolved.starts_with(root),
        _ => true,
    };
    if escapes {
        return Err(invalid(&format!(
            "{context}: function path {function} escapes the manifest directory"
        )));
    }
    Ok(path)
}

/// Runtime kind for a source file extension.
fn infer_runtime(function: &Path) -> Option<&'static str> {
    let ext = function.extension()?.to_str()?;
    let kind = match ext.to_ascii_lowercase().as_str() {
        "js" => "nodejs:default",
        "py" => "python:default",
        "go" => "go:default",
        "java" | "jar" => "java:default",
        "php" => "php:default",
        "rb" => "ruby:default",
        "swift" => "swift:default",
        _ => return None,
    };
    Some(kind)
}

fn parse_flag(value: &YamlValue) -> Option<bool> {
    match value {
        YamlValue::Bool(b) => Some(*b),
        YamlValue::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "raw" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Convert declared inputs, unwrapping typed declarations.
fn convert_inputs(inputs: Option<Mapping>, context: &str) -> DeployResult<Parameters> {
    let mut parameters = Parameters::new();
    for (key, value) in inputs.unwrap_or_default() {
        let name = mapping_key(&key, "input")?;
        let value = match typed_input(&value) {
            Some(resolved) => yaml_to_json(&resolved, context)?,
            None => yaml_to_json(&value, context)?,
        };
        parameters.insert(name, value);
    }
    Ok(parameters)
}

/// `{type: string, value: x, default: y}` resolves to `x`, then `y`, then the
/// type's zero value.
fn typed_input(value: &YamlValue) -> Option<YamlValue> {
    let mapping = value.as_mapping()?;
    let type_name = mapping.get("type")?.as_str()?;
    let only_typed_keys = mapping
        .keys()
        .all(|k| k.as_str().is_some_and(|k| TYPED_INPUT_KEYS.contains(&k)));
    if !only_typed_keys {
        return None;
    }

    let resolved = mapping
        .get("value")
        .or_else(|| mapping.get("default"))
        .cloned()
        .unwrap_or_else(|| match type_name {
            "string" => YamlValue::String(String::new()),
            "integer" => YamlValue::Number(0.into()),
            "float" => YamlValue::Number(0.0.into()),
            "boolean" => YamlValue::Bool(false),
            _ => YamlValue::Null,
        });
    Some(resolved)
}

fn convert_mapping(mapping: Option<Mapping>, context: &str) -> DeployResult<Parameters> {
    let mut out = Parameters::new();
    for (key, value) in mapping.unwrap_or_default() {
        out.insert(mapping_key(&key, "annotation")?, yaml_to_json(&value, context)?);
    }
    Ok(out)
}

fn yaml_to_json(value: &YamlValue, context: &str) -> DeployResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| invalid(&format!("{context}: {e}")))
}

fn mapping_key(key: &YamlValue, what: &str) -> DeployResult<String> {
    match key {
        YamlValue::String(s) if !s.trim().is_empty() => Ok(s.clone()),
        YamlValue::Number(n) => Ok(n.to_string()),
        _ => Err(invalid(&format!("{what} names must be non-empty strings"))),
    }
}

fn parse_error(e: serde_yaml::Error) -> DeployError {
    DeployError::ManifestParse(e.to_string())
}

fn invalid(message: &str) -> DeployError {
    DeployError::ManifestParse(message.to_owned())
}
