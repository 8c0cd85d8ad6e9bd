//! Caller parameter overrides.

use super::ManifestDescriptor;
use crate::types::Parameters;

/// Return a copy of `descriptor` with `overrides` applied.
///
/// An override replaces the value of every declared parameter with the same
/// name, at package and action level alike. Overrides naming no declared
/// parameter are ignored, and no parameter is ever added or removed.
#[must_use]
pub fn apply_overrides(
    descriptor: &ManifestDescriptor,
    overrides: &Parameters,
) -> ManifestDescriptor {
    let mut merged = descriptor.clone();
    if overrides.is_empty() {
        return merged;
    }

    for package in &mut merged.packages {
        replace_declared(&mut package.parameters, overrides);
        for action in &mut package.actions {
            replace_declared(&mut action.parameters, overrides);
        }
    }
    merged
}

fn replace_declared(parameters: &mut Parameters, overrides: &Parameters) {
    for (name, value) in parameters.iter_mut() {
        if let Some(replacement) = overrides.get(name) {
            value.clone_from(replacement);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;

    use super::*;
    use crate::manifest::{ActionRuntime, ActionSpec, PackageSpec};

    fn descriptor() -> ManifestDescriptor {
        ManifestDescriptor {
            project: None,
            base_dir: PathBuf::from("/repo"),
            packages: vec![PackageSpec {
                name: "${PACKAGE_NAME}".to_owned(),
                parameters: Parameters::from([
                    ("PACKAGE_NAME".to_owned(), json!("hello_package")),
                    ("region".to_owned(), json!("eu")),
                ]),
                actions: vec![ActionSpec {
                    name: "helloworld".to_owned(),
                    parameters: Parameters::from([
                        ("greeting".to_owned(), json!("Hello")),
                        ("region".to_owned(), json!("eu")),
                    ]),
                    runtime: ActionRuntime {
                        function: PathBuf::from("/repo/src/hello.js"),
                        kind: "nodejs:default".to_owned(),
                        main: None,
                        web_export: false,
                        annotations: Parameters::new(),
                        limits: None,
                    },
                }],
            }],
        }
    }

    #[test]
    fn override_changes_resolved_package_name() {
        let overrides = Parameters::from([("PACKAGE_NAME".to_owned(), json!("myPackage"))]);
        let merged = apply_overrides(&descriptor(), &overrides);
        assert_eq!(merged.packages[0].resolved_name(), "myPackage");
    }

    #[test]
    fn override_reaches_package_and_action_levels() {
        let overrides = Parameters::from([("region".to_owned(), json!("us"))]);
        let merged = apply_overrides(&descriptor(), &overrides);

        assert_eq!(merged.packages[0].parameters["region"], json!("us"));
        assert_eq!(merged.packages[0].actions[0].parameters["region"], json!("us"));
        assert_eq!(merged.packages[0].actions[0].parameters["greeting"], json!("Hello"));
    }

    #[test]
    fn unmatched_overrides_are_ignored() {
        let original = descriptor();
        let overrides = Parameters::from([("useless".to_owned(), json!("value"))]);
        assert_eq!(apply_overrides(&original, &overrides), original);
    }

    #[test]
    fn input_descriptor_is_untouched() {
        let original = descriptor();
        let snapshot = original.clone();
        let overrides = Parameters::from([("greeting".to_owned(), json!({"nested": [1, 2]}))]);

        let merged = apply_overrides(&original, &overrides);
        assert_eq!(original, snapshot);
        assert_eq!(
            merged.packages[0].actions[0].parameters["greeting"],
            json!({"nested": [1, 2]})
        );
    }

    #[test]
    fn empty_overrides_return_equal_copy() {
        let original = descriptor();
        assert_eq!(apply_overrides(&original, &Parameters::new()), original);
    }
}
