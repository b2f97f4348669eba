//! Environment/runtime helpers
//!
//! Startup-time provisioning of the directories the service relies on.
//! Paths are anchored to the directory holding the executable, never to the
//! current working directory.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

/// Outcome of a successful [`ensure_dir`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirStatus {
    Created,
    AlreadyPresent,
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("{} exists but is not a directory", path.display())]
    NotADirectory { path: PathBuf },
    #[error("cannot create {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Directory containing the running executable.
pub fn program_root() -> io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("executable path {} has no parent directory", exe.display()),
        )
    })
}

/// Anchor `dir` under `root` unless it is already absolute.
pub fn resolve_under(root: &Path, dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        root.join(dir)
    }
}

/// Ensure `path` exists as a directory, creating missing parents.
///
/// Existing contents are left alone. The creation diagnostic is only logged
/// when this call actually created the directory, so repeated startups stay
/// quiet once the directory is in place.
pub async fn ensure_dir(path: &Path) -> Result<DirStatus, ProvisionError> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => {
            debug!(path = %path.display(), "directory already present");
            return Ok(DirStatus::AlreadyPresent);
        }
        Ok(_) => {
            return Err(ProvisionError::NotADirectory {
                path: path.to_path_buf(),
            })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(ProvisionError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    fs::create_dir_all(path)
        .await
        .map_err(|source| ProvisionError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    info!(path = %path.display(), "Dossier {} créé", dir_label(path));
    Ok(DirStatus::Created)
}

fn dir_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    /// In-memory sink for the fmt subscriber.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
            String::from_utf8_lossy(&bytes).into_owned()
        }

        fn count(&self, needle: &str) -> usize {
            self.contents().matches(needle).count()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Ok(mut inner) = self.0.lock() {
                inner.extend_from_slice(buf);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
        let buffer = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buffer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (buffer, guard)
    }

    #[tokio::test]
    async fn creation_message_logged_once_across_two_runs() -> Result<(), anyhow::Error> {
        let tmp = tempfile::tempdir()?;
        let images = tmp.path().join("images");
        let (logs, _guard) = capture_logs();

        ensure_dir(&images).await?;
        assert_eq!(logs.count("Dossier images créé"), 1);

        ensure_dir(&images).await?;
        assert_eq!(logs.count("Dossier images créé"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn no_creation_message_for_existing_directory() -> Result<(), anyhow::Error> {
        let tmp = tempfile::tempdir()?;
        let images = tmp.path().join("images");
        std::fs::create_dir(&images)?;
        std::fs::write(images.join("a.png"), b"\x89PNG")?;
        let (logs, _guard) = capture_logs();

        ensure_dir(&images).await?;

        assert_eq!(logs.count("Dossier images créé"), 0);
        assert_eq!(std::fs::read(images.join("a.png"))?, b"\x89PNG");
        Ok(())
    }

    #[tokio::test]
    async fn no_creation_message_when_provisioning_fails() -> Result<(), anyhow::Error> {
        let tmp = tempfile::tempdir()?;
        let images = tmp.path().join("images");
        std::fs::write(&images, b"not a dir")?;
        let (logs, _guard) = capture_logs();

        assert!(ensure_dir(&images).await.is_err());

        assert_eq!(logs.count("créé"), 0);
        Ok(())
    }

    #[tokio::test]
    async fn creates_missing_directory() -> Result<(), anyhow::Error> {
        let tmp = tempfile::tempdir()?;
        let images = tmp.path().join("images");

        let status = ensure_dir(&images).await?;

        assert_eq!(status, DirStatus::Created);
        assert!(images.is_dir());
        assert_eq!(std::fs::read_dir(&images)?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn creates_missing_parents() -> Result<(), anyhow::Error> {
        let tmp = tempfile::tempdir()?;
        let nested = tmp.path().join("var").join("media").join("images");

        assert_eq!(ensure_dir(&nested).await?, DirStatus::Created);
        assert!(nested.is_dir());
        Ok(())
    }

    #[tokio::test]
    async fn existing_directory_keeps_its_contents() -> Result<(), anyhow::Error> {
        let tmp = tempfile::tempdir()?;
        let images = tmp.path().join("images");
        std::fs::create_dir(&images)?;
        std::fs::write(images.join("a.png"), b"\x89PNG")?;

        let status = ensure_dir(&images).await?;

        assert_eq!(status, DirStatus::AlreadyPresent);
        assert_eq!(std::fs::read(images.join("a.png"))?, b"\x89PNG");
        assert_eq!(std::fs::read_dir(&images)?.count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn second_run_reports_already_present() -> Result<(), anyhow::Error> {
        let tmp = tempfile::tempdir()?;
        let images = tmp.path().join("images");

        let first = ensure_dir(&images).await?;
        let second = ensure_dir(&images).await?;

        assert_eq!(first, DirStatus::Created);
        assert_eq!(second, DirStatus::AlreadyPresent);
        assert!(images.is_dir());
        Ok(())
    }

    #[tokio::test]
    async fn regular_file_in_the_way_is_an_error() -> Result<(), anyhow::Error> {
        let tmp = tempfile::tempdir()?;
        let images = tmp.path().join("images");
        std::fs::write(&images, b"not a dir")?;

        let err = ensure_dir(&images).await.unwrap_err();

        assert!(matches!(err, ProvisionError::NotADirectory { ref path } if path == &images));
        assert_eq!(std::fs::read(&images)?, b"not a dir");
        Ok(())
    }

    #[tokio::test]
    async fn file_as_parent_is_an_io_error() -> Result<(), anyhow::Error> {
        let tmp = tempfile::tempdir()?;
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"")?;

        let err = ensure_dir(&blocker.join("images")).await.unwrap_err();

        assert!(matches!(err, ProvisionError::Io { .. }));
        assert!(err.to_string().contains("images"));
        Ok(())
    }

    #[test]
    fn relative_dirs_are_anchored_to_root() {
        let root = Path::new("/opt/app/bin");
        assert_eq!(
            resolve_under(root, Path::new("images")),
            PathBuf::from("/opt/app/bin/images")
        );
        assert_eq!(
            resolve_under(root, Path::new("/srv/images")),
            PathBuf::from("/srv/images")
        );
    }

    #[test]
    fn program_root_is_an_existing_directory() -> io::Result<()> {
        let root = program_root()?;
        assert!(root.is_absolute());
        assert!(root.is_dir());
        Ok(())
    }

    #[test]
    fn label_uses_last_component() {
        assert_eq!(dir_label(Path::new("/opt/app/images")), "images");
    }
}
