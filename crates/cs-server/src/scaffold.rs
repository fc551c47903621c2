//! Project scaffolding requested by clients.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use cs_core::ScaffoldConfig;

use crate::error::ScaffoldError;

/// Subdirectories created in every new project.
pub const PROJECT_DIRS: &[&str] = &["src", "tests", "docs"];

/// Creates projects on behalf of clients.
///
/// Implementations run on a blocking thread and may do filesystem I/O.
pub trait ProjectScaffolder: Send + Sync + 'static {
    /// Creates (or completes) the project `name` and returns its directory.
    ///
    /// Must succeed when the project already exists.
    fn create_project(&self, name: &str) -> Result<Utf8PathBuf, ScaffoldError>;
}

impl<S: ProjectScaffolder + ?Sized> ProjectScaffolder for std::sync::Arc<S> {
    fn create_project(&self, name: &str) -> Result<Utf8PathBuf, ScaffoldError> {
        (**self).create_project(name)
    }
}

/// Scaffolds projects as directories under a workspace directory.
///
/// ```text
/// <workspace>/<name>/
/// ├── README.md
/// ├── docs/
/// ├── src/
/// └── tests/
/// ```
///
/// Existing directories and an existing `README.md` are left untouched.
#[derive(Debug, Clone)]
pub struct FsScaffolder {
    workspace: Utf8PathBuf,
}

impl FsScaffolder {
    /// Creates a scaffolder rooted at `workspace`.
    pub fn new(workspace: impl Into<Utf8PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }

    /// Creates a scaffolder for the configured workspace.
    pub fn from_config(config: &ScaffoldConfig) -> Self {
        Self::new(config.resolve_workspace())
    }

    /// The directory projects are created in.
    pub fn workspace(&self) -> &Utf8Path {
        &self.workspace
    }
}

impl ProjectScaffolder for FsScaffolder {
    fn create_project(&self, name: &str) -> Result<Utf8PathBuf, ScaffoldError> {
        validate_name(name)?;

        let project = self.workspace.join(name);
        create_dir(&project)?;
        for dir in PROJECT_DIRS {
            create_dir(&project.join(dir))?;
        }
        write_readme(&project.join("README.md"), name)?;

        tracing::info!(name, path = %project, "Project scaffolded");
        Ok(project)
    }
}

fn validate_name(name: &str) -> Result<(), ScaffoldError> {
    if name.trim().is_empty() {
        return Err(ScaffoldError::invalid_name(name, "must not be empty"));
    }
    if name == "." || name == ".." {
        return Err(ScaffoldError::invalid_name(name, "must not be a relative directory"));
    }
    if name.contains(['/', '\\']) {
        return Err(ScaffoldError::invalid_name(name, "must not contain path separators"));
    }
    if name.contains('\0') {
        return Err(ScaffoldError::invalid_name(name, "must not contain NUL"));
    }
    Ok(())
}

fn create_dir(path: &Utf8Path) -> Result<(), ScaffoldError> {
    fs::create_dir_all(path).map_err(|source| ScaffoldError::io(path, source))
}

fn write_readme(path: &Utf8Path, name: &str) -> Result<(), ScaffoldError> {
    let file = OpenOptions::new().write(true).create_new(true).open(path);
    let mut file = match file {
        Ok(file) => file,
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => return Ok(()),
        Err(source) => return Err(ScaffoldError::io(path, source)),
    };

    write!(
        file,
        "# {name}\n\nThis is a project managed by codestream.\n"
    )
    .map_err(|source| ScaffoldError::io(path, source))
}
