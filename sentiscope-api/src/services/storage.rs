//! Local file storage for analysed uploads
//!
//! Files live under `<root>/storage/<user>/<kind>/<timestamp>-<name>` and are
//! served at `/files/<relative path>` to their owner only. Callers treat
//! storage as best-effort: a failed store leaves the analysis without a file.

use std::path::{Component, Path, PathBuf};

use sentiscope_common::Result;

/// URL prefix the storage directory is served under
pub const FILES_ROUTE: &str = "/files";

/// Location of a stored file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Path relative to the storage root, always with `/` separators
    pub path: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Persist `bytes` for `user_id` under the `kind` folder (`csv`, `image`)
    pub async fn store(
        &self,
        user_id: &str,
        kind: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredFile> {
        let file_name = format!(
            "{}-{}",
            chrono::Utc::now().timestamp_millis(),
            sanitize_file_name(original_name)
        );
        let relative = format!("{}/{}/{}", sanitize_segment(user_id), sanitize_segment(kind), file_name);
        let full_path = self.root.join(&relative);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full_path, bytes).await?;

        tracing::info!(path = %relative, bytes = bytes.len(), "Stored file");

        Ok(StoredFile {
            url: self.url_for(&relative),
            path: relative,
        })
    }

    pub async fn read(&self, relative: &str) -> Result<Vec<u8>> {
        let path = self.resolve(relative)?;
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(sentiscope_common::Error::NotFound("File not found".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Read a stored file on behalf of `user_id`
    ///
    /// Files under another user's folder are reported as missing.
    pub async fn read_owned(&self, user_id: &str, relative: &str) -> Result<Vec<u8>> {
        let owner = relative.trim_start_matches('/').split('/').next().unwrap_or_default();
        if owner != sanitize_segment(user_id) {
            return Err(sentiscope_common::Error::NotFound("File not found".to_string()));
        }
        self.read(relative.trim_start_matches('/')).await
    }

    /// Remove a stored file; a missing file is not an error
    pub async fn delete(&self, relative: &str) -> Result<()> {
        let path = self.resolve(relative)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %relative, "Deleted stored file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn url_for(&self, relative: &str) -> String {
        format!("{}/{}", FILES_ROUTE, relative.trim_start_matches('/'))
    }

    /// Join a stored relative path, refusing anything that escapes the root
    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let relative_path = Path::new(relative);
        let escapes = relative_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes || relative.is_empty() {
            return Err(sentiscope_common::Error::InvalidInput(format!(
                "Invalid storage path: {}",
                relative
            )));
        }
        Ok(self.root.join(relative_path))
    }
}

/// Keep `[A-Za-z0-9._-]`, replace everything else, and never return an empty name
fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_read_delete() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path());

        let stored = storage
            .store("user-1", "csv", "reviews.csv", b"text\nhello\n")
            .await
            .unwrap();
        assert!(stored.path.starts_with("user-1/csv/"));
        assert!(stored.path.ends_with("-reviews.csv"));
        assert_eq!(stored.url, format!("/files/{}", stored.path));

        assert_eq!(storage.read(&stored.path).await.unwrap(), b"text\nhello\n");

        storage.delete(&stored.path).await.unwrap();
        assert!(storage.read(&stored.path).await.is_err());
        // Second delete is a no-op
        storage.delete(&stored.path).await.unwrap();
    }

    #[tokio::test]
    async fn test_read_owned_checks_owner_segment() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path());
        let stored = storage.store("owner-1", "image", "a.png", b"png").await.unwrap();

        assert_eq!(storage.read_owned("owner-1", &stored.path).await.unwrap(), b"png");

        let err = storage.read_owned("intruder", &stored.path).await.unwrap_err();
        assert!(matches!(err, sentiscope_common::Error::NotFound(_)));

        let err = storage.read_owned("owner-1", "owner-1/image/missing.png").await.unwrap_err();
        assert!(matches!(err, sentiscope_common::Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path());
        assert!(storage.read("../etc/passwd").await.is_err());
        assert!(storage.delete("/etc/passwd").await.is_err());
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../evil name.png"), "evil_name.png");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "upload");
    }
}
