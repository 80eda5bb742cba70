//! On-disk layout shared by every detection: where artifacts and results land.

use std::path::{Path, PathBuf};

use crate::config::BridgeConfig;
use crate::consts::{PROCESSED_PREFIX, RESULTS_FILE};
use crate::error::{DetectionError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    processed_dir: PathBuf,
    results_dir: PathBuf,
}

impl Layout {
    pub fn new(processed_dir: impl Into<PathBuf>, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            processed_dir: processed_dir.into(),
            results_dir: results_dir.into(),
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(&config.processed_dir, &config.results_dir)
    }

    /// Create both directories if absent. Safe to call any number of times.
    pub fn bootstrap(&self) -> Result<()> {
        for dir in [&self.processed_dir, &self.results_dir] {
            std::fs::create_dir_all(dir).map_err(|source| DetectionError::Bootstrap {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// The single results file used by generic detection in shared mode.
    pub fn shared_results_file(&self) -> PathBuf {
        self.results_dir.join(RESULTS_FILE)
    }

    /// A results file private to one request.
    pub fn scoped_results_file(&self, request_id: &str) -> PathBuf {
        self.results_dir.join(format!("results-{request_id}.json"))
    }

    /// `<processed_dir>/processed_<basename>`, or `None` if `image` names no file.
    pub fn processed_path_for(&self, image: &Path) -> Option<PathBuf> {
        let name = image.file_name()?;
        let mut file_name = std::ffi::OsString::from(PROCESSED_PREFIX);
        file_name.push(name);
        Some(self.processed_dir.join(file_name))
    }
}

/// Removes a request-scoped results file when dropped, however the call
/// holding it ended: success, failure, timeout or an abandoned future.
#[derive(Debug)]
pub struct ScopedResults {
    path: PathBuf,
}

impl ScopedResults {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedResults {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "cannot remove results file"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout_in(dir: &TempDir) -> Layout {
        Layout::new(dir.path().join("processed"), dir.path().join("results"))
    }

    #[test]
    fn bootstrap_creates_both_dirs() {
        let dir = TempDir::new().unwrap();
        let layout = layout_in(&dir);

        layout.bootstrap().unwrap();

        assert!(layout.processed_dir().is_dir());
        assert!(layout.results_dir().is_dir());
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let layout = layout_in(&dir);

        layout.bootstrap().unwrap();
        layout.bootstrap().unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn bootstrap_creates_nested_dirs() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path().join("a/b/processed"), dir.path().join("c/results"));
        layout.bootstrap().unwrap();
        assert!(layout.processed_dir().is_dir());
        assert!(layout.results_dir().is_dir());
    }

    #[test]
    fn bootstrap_fails_when_path_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("processed");
        std::fs::write(&blocker, "").unwrap();

        let err = layout_in(&dir).bootstrap().unwrap_err();
        assert!(matches!(err, DetectionError::Bootstrap { ref path, .. } if *path == blocker));
    }

    #[test]
    fn processed_path_ignores_input_directory() {
        let layout = Layout::new("/srv/processed", "/srv/results");
        let expected = PathBuf::from("/srv/processed/processed_cat.png");

        for input in ["cat.png", "uploads/cat.png", "/tmp/a/b/cat.png", "./cat.png"] {
            assert_eq!(layout.processed_path_for(Path::new(input)), Some(expected.clone()));
        }
    }

    #[test]
    fn processed_path_requires_a_file_name() {
        let layout = Layout::new("/srv/processed", "/srv/results");
        assert_eq!(layout.processed_path_for(Path::new("/")), None);
        assert_eq!(layout.processed_path_for(Path::new("uploads/..")), None);
    }

    #[test]
    fn scoped_results_removes_file_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results-abc.json");
        std::fs::write(&path, "{}").unwrap();

        let scoped = ScopedResults::new(&path);
        assert_eq!(scoped.path(), path);
        drop(scoped);

        assert!(!path.exists());
    }

    #[test]
    fn scoped_results_tolerates_missing_file() {
        let dir = TempDir::new().unwrap();
        drop(ScopedResults::new(dir.path().join("never-written.json")));
    }

    #[test]
    fn results_files_live_in_results_dir() {
        let layout = Layout::new("/srv/processed", "/srv/results");
        assert_eq!(
            layout.shared_results_file(),
            PathBuf::from("/srv/results/results.json")
        );
        assert_eq!(
            layout.scoped_results_file("abc"),
            PathBuf::from("/srv/results/results-abc.json")
        );
    }
}
