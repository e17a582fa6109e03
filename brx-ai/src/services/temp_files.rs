//! Temporary upload files
//!
//! Each request owns one file for exactly as long as it holds the
//! [`TempAudioFile`] guard; dropping the guard deletes the file. The periodic
//! sweep only catches files leaked by a crashed process.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Uniquely named file in the temp directory, removed on drop
#[derive(Debug)]
pub struct TempAudioFile {
    path: PathBuf,
}

impl TempAudioFile {
    /// Reserve `<dir>/<uuid>.<extension>` without creating it
    pub fn reserve(dir: &Path, extension: &str) -> Self {
        let name = if extension.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            format!("{}.{}", Uuid::new_v4(), extension)
        };
        Self { path: dir.join(name) }
    }

    /// Write `bytes` to a fresh temp file
    ///
    /// A failed write still removes whatever was created.
    pub async fn write(dir: &Path, extension: &str, bytes: &[u8]) -> io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let file = Self::reserve(dir, extension);
        tokio::fs::write(&file.path, bytes).await?;
        debug!("Saved temporary file: {}", file.path.display());
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempAudioFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Cleaned up temporary file: {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to clean up {}: {}", self.path.display(), e),
        }
    }
}

/// Delete regular files in `dir` last modified more than `max_age` ago
///
/// Returns the number of files removed. A missing directory counts as empty.
pub fn sweep_stale_files(dir: &Path, max_age: Duration) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return 0,
        Err(e) => {
            warn!("Cannot read temp directory {}: {}", dir.display(), e);
            return 0;
        }
    };

    let now = SystemTime::now();
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(metadata) = entry.metadata() else { continue };
        if !metadata.is_file() {
            continue;
        }
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age > max_age {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    removed += 1;
                    debug!("Removed stale temp file: {}", path.display());
                }
                Err(e) => warn!("Failed to remove stale temp file {}: {}", path.display(), e),
            }
        }
    }

    if removed > 0 {
        info!("Cleaned up {} stale temp files in {}", removed, dir.display());
    }
    removed
}

/// Run [`sweep_stale_files`] every `interval` on the blocking pool
pub fn spawn_periodic_sweep(dir: PathBuf, interval: Duration, max_age: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        info!(
            "Temp file sweep started ({}s interval, max age {}s)",
            interval.as_secs(),
            max_age.as_secs()
        );
        loop {
            ticker.tick().await;
            let dir = dir.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || sweep_stale_files(&dir, max_age)).await {
                warn!("Temp file sweep task failed: {}", e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guard_removes_file_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let file = TempAudioFile::write(dir.path(), "wav", b"RIFF").await.unwrap();
            assert!(file.path().exists());
            assert_eq!(file.path().extension().and_then(|e| e.to_str()), Some("wav"));
            file.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_guard_removes_file_on_error_path() {
        async fn failing(dir: &Path) -> Result<(), String> {
            let _file = TempAudioFile::write(dir, "mp3", b"data").await.map_err(|e| e.to_string())?;
            Err("processing failed".to_string())
        }

        let dir = tempfile::tempdir().unwrap();
        assert!(failing(dir.path()).await.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_of_never_written_file_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let file = TempAudioFile::reserve(dir.path(), "wav");
        assert!(!file.path().exists());
        drop(file);
    }

    #[test]
    fn test_sweep_respects_age() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fresh.wav"), b"x").unwrap();

        assert_eq!(sweep_stale_files(dir.path(), Duration::from_secs(3600)), 0);
        assert!(dir.path().join("fresh.wav").exists());

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(sweep_stale_files(dir.path(), Duration::from_millis(1)), 1);
        assert!(!dir.path().join("fresh.wav").exists());
    }

    #[test]
    fn test_sweep_missing_dir() {
        assert_eq!(sweep_stale_files(Path::new("/no/such/dir"), Duration::ZERO), 0);
    }
}
