use std::{
    io,
    path::{Path, PathBuf},
};

use tempfile::TempDir;
use tracing::warn;

use crate::domain::request::OutputFormat;

const INPUT_BASENAME: &str = "input";
const OUTPUT_BASENAME: &str = "output";

/// Per-request scratch directory. Removed on [`Workspace::close`] or on drop.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh, exclusively owned directory under `root` (or the system temp dir).
    pub fn create(root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("texrender-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Source document handed to the compiler.
    pub fn input_document(&self) -> PathBuf {
        self.dir.path().join(format!("{INPUT_BASENAME}.tex"))
    }

    /// Document the compiler is expected to produce next to the input.
    pub fn compiled_document(&self) -> PathBuf {
        self.dir.path().join(format!("{INPUT_BASENAME}.pdf"))
    }

    /// Output root passed to the converter; PNG mode appends the extension itself.
    pub fn artifact_root(&self) -> PathBuf {
        self.dir.path().join(OUTPUT_BASENAME)
    }

    pub fn artifact(&self, format: OutputFormat) -> PathBuf {
        self.dir
            .path()
            .join(format!("{OUTPUT_BASENAME}.{}", format.as_str()))
    }

    /// Remove the directory now, logging instead of failing if removal goes wrong.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(err) = self.dir.close() {
            warn!(
                target = "application::render::workspace",
                op = "workspace::close",
                result = "error",
                path = %path.display(),
                error = %err,
                "Failed to remove render workspace"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_live_inside_the_workspace() {
        let root = TempDir::new().expect("root");
        let workspace = Workspace::create(Some(root.path())).expect("workspace");
        let dir = workspace.path().to_path_buf();

        assert!(dir.starts_with(root.path()));
        assert_eq!(workspace.input_document(), dir.join("input.tex"));
        assert_eq!(workspace.compiled_document(), dir.join("input.pdf"));
        assert_eq!(workspace.artifact(OutputFormat::Svg), dir.join("output.svg"));
        assert_eq!(workspace.artifact(OutputFormat::Png), dir.join("output.png"));
        assert_eq!(workspace.artifact_root(), dir.join("output"));
    }

    #[test]
    fn close_removes_directory_and_contents() {
        let root = TempDir::new().expect("root");
        let workspace = Workspace::create(Some(root.path())).expect("workspace");
        let dir = workspace.path().to_path_buf();
        std::fs::write(workspace.input_document(), "x").expect("write");

        workspace.close();
        assert!(!dir.exists());
    }

    #[test]
    fn drop_removes_directory() {
        let root = TempDir::new().expect("root");
        let dir = {
            let workspace = Workspace::create(Some(root.path())).expect("workspace");
            workspace.path().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn concurrent_workspaces_are_distinct() {
        let root = TempDir::new().expect("root");
        let first = Workspace::create(Some(root.path())).expect("first");
        let second = Workspace::create(Some(root.path())).expect("second");
        assert_ne!(first.path(), second.path());
    }
}
