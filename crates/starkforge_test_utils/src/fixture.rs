use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::{ScriptedContract, ScriptedProject};

/// A project directory on disk whose files are known to a
/// [`ScriptedProject`].
pub struct ProjectFixture {
    dir: TempDir,
    project: ScriptedProject,
}

impl ProjectFixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create project directory"),
            project: ScriptedProject::new(),
        }
    }

    /// Canonical path of the project root.
    pub fn root(&self) -> PathBuf {
        dunce::canonicalize(self.dir.path()).expect("project root exists")
    }

    pub fn project(&self) -> &ScriptedProject {
        &self.project
    }

    /// Creates an empty file at `relative` inside the project.
    pub fn add_file(&self, relative: impl AsRef<Path>) -> PathBuf {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create directory");
        }
        std::fs::write(&path, "").expect("failed to create file");
        path
    }

    pub fn add_contract(&self, relative: impl AsRef<Path>, contract: ScriptedContract) -> PathBuf {
        let path = self.add_file(relative);
        self.project.add_contract(&path, contract);
        path
    }

    /// Adds a file that fails to compile with `message`.
    pub fn add_broken(&self, relative: impl AsRef<Path>, message: &str) -> PathBuf {
        let path = self.add_file(relative);
        self.project.add_broken(&path, message);
        path
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}
