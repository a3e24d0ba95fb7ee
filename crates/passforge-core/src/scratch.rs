use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch file path inside its own fresh temporary directory.
///
/// Every evaluation artifact (optimized bitcode, object, executable,
/// captured output) lives in its own `Scratch`; dropping it removes the
/// whole directory, on every exit path.
pub struct Scratch {
    _dir: TempDir,
    file: PathBuf,
}

impl Scratch {
    /// Failure to allocate scratch space is a configuration problem with
    /// the host, not a property of the candidate under evaluation.
    pub fn new() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("passforge")
            .tempdir()
            .expect("failed to create scratch directory");
        let file = dir.path().join("file");
        Self { _dir: dir, file }
    }

    pub fn path(&self) -> &Path {
        &self.file
    }
}

impl Default for Scratch {
    fn default() -> Self {
        Self::new()
    }
}
