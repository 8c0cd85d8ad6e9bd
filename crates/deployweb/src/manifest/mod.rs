//! Deployment manifests.
//!
//! A manifest is a YAML file (`manifest.yaml` or `manifest.yml`) describing
//! packages of actions:
//!
//! ```yaml
//! packages:
//!   ${PACKAGE_NAME}:
//!     inputs:
//!       PACKAGE_NAME: hello_package
//!     actions:
//!       helloworld:
//!         function: src/hello.js
//!         inputs:
//!           greeting: Hello
//! ```
//!
//! Package and action names may reference declared inputs with `$NAME` or
//! `${NAME}`; the reference is resolved after caller overrides are applied.
//! The package named `default` deploys its actions without a package.

mod locate;
mod overlay;
mod parse;

pub use locate::{locate_manifest, MANIFEST_FILE_NAMES};
pub use overlay::apply_overrides;
pub use parse::{parse_manifest, parse_manifest_str};

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;

use crate::types::Parameters;

/// Package name meaning "deploy these actions without a package".
pub const DEFAULT_PACKAGE: &str = "default";

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
        .expect("valid placeholder regex")
});

/// Structured form of a parsed manifest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestDescriptor {
    /// Project name, if the manifest declares one.
    pub project: Option<String>,
    /// Directory holding the manifest; function paths are relative to it.
    pub base_dir: PathBuf,
    /// Packages in manifest order.
    pub packages: Vec<PackageSpec>,
}

impl ManifestDescriptor {
    /// Total number of actions across all packages.
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.packages.iter().map(|p| p.actions.len()).sum()
    }
}

/// A package and its actions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageSpec {
    /// Name as written in the manifest, possibly with placeholders.
    pub name: String,
    /// Package-level declared parameters.
    pub parameters: Parameters,
    /// Actions in manifest order.
    pub actions: Vec<ActionSpec>,
}

impl PackageSpec {
    /// Whether this is the `default` package, whose actions deploy unqualified.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_PACKAGE
    }

    /// Package name with placeholders substituted from its parameters.
    #[must_use]
    pub fn resolved_name(&self) -> String {
        render_name(&self.name, |key| self.parameters.get(key))
    }
}

/// An action declared in a package.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionSpec {
    /// Name as written in the manifest, possibly with placeholders.
    pub name: String,
    /// Declared parameters, unique by name.
    pub parameters: Parameters,
    /// Runtime metadata passed through to the platform.
    pub runtime: ActionRuntime,
}

impl ActionSpec {
    /// Action name with placeholders substituted from its own parameters,
    /// then from its package's.
    #[must_use]
    pub fn resolved_name(&self, package: &PackageSpec) -> String {
        render_name(&self.name, |key| {
            self.parameters
                .get(key)
                .or_else(|| package.parameters.get(key))
        })
    }
}

/// How an action runs on the platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRuntime {
    /// Source file, absolute, inside the manifest directory.
    pub function: PathBuf,
    /// Runtime kind, e.g. `nodejs:default`.
    pub kind: String,
    /// Entry point, when not the runtime default.
    pub main: Option<String>,
    /// Whether the action is exported as a web action.
    pub web_export: bool,
    /// Annotations set on the action.
    pub annotations: Parameters,
    /// Limits as written in the manifest.
    pub limits: Option<serde_json::Value>,
}

/// Names of the parameters referenced by placeholders in `template`.
pub(crate) fn placeholders(template: &str) -> Vec<&str> {
    PLACEHOLDER_RE
        .captures_iter(template)
        .filter_map(|cap| cap.get(1).or_else(|| cap.get(2)))
        .map(|m| m.as_str())
        .collect()
}

/// Substitute placeholders in `template`. Unknown names are left as written.
fn render_name<'a>(
    template: &str,
    lookup: impl Fn(&str) -> Option<&'a serde_json::Value>,
) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |cap: &Captures<'_>| {
            let key = cap
                .get(1)
                .or_else(|| cap.get(2))
                .map_or("", |m| m.as_str());
            lookup(key).map_or_else(|| cap[0].to_owned(), render_value)
        })
        .into_owned()
}

/// Text form of a parameter value when used inside a name.
fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn package(name: &str, params: Parameters) -> PackageSpec {
        PackageSpec {
            name: name.to_owned(),
            parameters: params,
            actions: Vec::new(),
        }
    }

    #[test]
    fn finds_both_placeholder_forms() {
        assert_eq!(placeholders("${PACKAGE_NAME}"), vec!["PACKAGE_NAME"]);
        assert_eq!(placeholders("$PREFIX-${SUFFIX}"), vec!["PREFIX", "SUFFIX"]);
        assert!(placeholders("plain-name").is_empty());
    }

    #[test]
    fn package_name_resolves_from_parameters() {
        let params = Parameters::from([("PACKAGE_NAME".to_owned(), json!("myPackage"))]);
        assert_eq!(package("${PACKAGE_NAME}", params.clone()).resolved_name(), "myPackage");
        assert_eq!(package("$PACKAGE_NAME", params.clone()).resolved_name(), "myPackage");
        assert_eq!(package("pre-${PACKAGE_NAME}-v1", params).resolved_name(), "pre-myPackage-v1");
    }

    #[test]
    fn non_string_values_render_as_text() {
        let params = Parameters::from([
            ("VERSION".to_owned(), json!(2)),
            ("FLAG".to_owned(), json!(true)),
        ]);
        assert_eq!(package("app-$VERSION-$FLAG", params).resolved_name(), "app-2-true");
    }

    #[test]
    fn action_name_prefers_own_parameters() {
        let pkg = package(
            "pkg",
            Parameters::from([("NAME".to_owned(), json!("from-package"))]),
        );
        let action = ActionSpec {
            name: "${NAME}".to_owned(),
            parameters: Parameters::from([("NAME".to_owned(), json!("from-action"))]),
            runtime: ActionRuntime {
                function: PathBuf::from("/tmp/a.js"),
                kind: "nodejs:default".to_owned(),
                main: None,
                web_export: false,
                annotations: Parameters::new(),
                limits: None,
            },
        };
        assert_eq!(action.resolved_name(&pkg), "from-action");

        let inherited = ActionSpec {
            parameters: Parameters::new(),
            ..action
        };
        assert_eq!(inherited.resolved_name(&pkg), "from-package");
    }

    #[test]
    fn default_package_detection() {
        assert!(package("default", Parameters::new()).is_default());
        assert!(!package("defaults", Parameters::new()).is_default());
    }
}
