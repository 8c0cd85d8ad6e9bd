//! Fixture repositories for integration tests.

use std::path::Path;

use tempfile::TempDir;

/// Manifest directory of the hello-world fixture.
pub const HELLO_MANIFEST_PATH: &str = "tests/src/integration/helloworld";

/// Directory that exists in the fixture but holds no manifest.
pub const NO_MANIFEST_PATH: &str = "tests/src/integration";

const HELLO_MANIFEST: &str = r"
project:
  name: helloworld
  packages:
    ${PACKAGE_NAME}:
      inputs:
        PACKAGE_NAME: hello_world_package
      actions:
        helloworld:
          function: actions/hello.js
          runtime: nodejs:default
          inputs:
            name:
              type: string
              default: Amy
            place: Paris
";

const HELLO_JS: &str = r"function main(params) {
    return { greeting: `Hello, ${params.name} from ${params.place}` };
}
";

/// A repository holding the hello-world manifest.
pub fn hello_repository() -> TempDir {
    let repo = TempDir::new().unwrap();
    let manifest_dir = repo.path().join(HELLO_MANIFEST_PATH);
    std::fs::create_dir_all(manifest_dir.join("actions")).unwrap();
    std::fs::write(manifest_dir.join("manifest.yaml"), HELLO_MANIFEST).unwrap();
    std::fs::write(manifest_dir.join("actions/hello.js"), HELLO_JS).unwrap();
    std::fs::write(repo.path().join("README.md"), "# fixture\n").unwrap();
    repo
}

/// Recursively copy `from` into the existing directory `to`.
pub fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            std::fs::create_dir_all(&target)?;
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
