use anyhow::{Result, bail};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

/// Extensions accepted for background image uploads, matched
/// case-insensitively against the client filename.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// URL prefix under which the upload tree is mounted.
const UPLOADS_MOUNT: &str = "/uploads/";

/// Manages the on-disk upload tree, partitioned per user:
/// `{root}/{user_id}` for model files, `{root}/{user_id}/animations` and
/// `{root}/{user_id}/backgrounds` for their children. Stored filenames
/// are random UUIDs with the original extension preserved, so two
/// uploads can never collide regardless of display name.
pub struct Storage {
    root: PathBuf,
}

/// Result of a successful store: the wire path recorded in the database
/// and the concrete location on disk.
pub struct StoredFile {
    pub url_path: String,
    pub disk_path: PathBuf,
}

impl Storage {
    pub async fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root).await?;
        info!("Upload storage directory: {}", root.display());
        Ok(Self { root })
    }

    /// Write an uploaded blob under the owner's directory and return its
    /// normalized forward-slash URL path rooted at `/uploads`.
    pub async fn store(
        &self,
        user_id: &str,
        category: Option<&str>,
        original_filename: &str,
        bytes: &[u8],
    ) -> Result<StoredFile> {
        let mut dir = self.root.join(user_id);
        let mut url = format!("{}{}", UPLOADS_MOUNT, user_id);
        if let Some(category) = category {
            dir = dir.join(category);
            url.push('/');
            url.push_str(category);
        }
        fs::create_dir_all(&dir).await?;

        let file_name = match extension_of(original_filename) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };
        let disk_path = dir.join(&file_name);
        fs::write(&disk_path, bytes).await?;

        url.push('/');
        url.push_str(&file_name);

        Ok(StoredFile {
            url_path: url,
            disk_path,
        })
    }

    /// Delete the file behind a stored URL path. A file that is already
    /// gone is tolerated.
    pub async fn delete(&self, url_path: &str) -> Result<()> {
        let Some(relative) = url_path.strip_prefix(UPLOADS_MOUNT) else {
            bail!("Path {} is outside the upload mount", url_path);
        };
        let disk_path = self.root.join(relative);

        match fs::remove_file(&disk_path).await {
            Ok(()) => {
                info!("Deleted stored file {}", disk_path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Stored file {} already gone", disk_path.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Extension of a client-supplied filename, if any.
pub fn extension_of(filename: &str) -> Option<&str> {
    Path::new(filename).extension().and_then(|e| e.to_str())
}

/// Stem of a client-supplied filename (extension stripped); animation
/// display names are derived from this.
pub fn stem_of(filename: &str) -> Option<&str> {
    Path::new(filename).file_stem().and_then(|s| s.to_str())
}

/// Whether a filename is acceptable as a background image. Checked
/// before any byte reaches disk.
pub fn is_allowed_image(filename: &str) -> bool {
    extension_of(filename)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("atelier-storage-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_store_writes_under_user_dir() {
        let storage = Storage::new(temp_root()).await.unwrap();

        let stored = storage
            .store("user-1", None, "avatar.vrm", b"vrm-bytes")
            .await
            .unwrap();

        assert!(stored.url_path.starts_with("/uploads/user-1/"));
        assert!(stored.url_path.ends_with(".vrm"));
        assert_eq!(std::fs::read(&stored.disk_path).unwrap(), b"vrm-bytes");
    }

    #[tokio::test]
    async fn test_store_category_and_unique_names() {
        let storage = Storage::new(temp_root()).await.unwrap();

        let a = storage
            .store("u", Some("animations"), "walk.vrma", b"a")
            .await
            .unwrap();
        let b = storage
            .store("u", Some("animations"), "walk.vrma", b"b")
            .await
            .unwrap();

        assert_ne!(a.url_path, b.url_path);
        assert!(a.url_path.starts_with("/uploads/u/animations/"));
        assert!(b.url_path.ends_with(".vrma"));
    }

    #[tokio::test]
    async fn test_store_without_extension() {
        let storage = Storage::new(temp_root()).await.unwrap();
        let stored = storage.store("u", None, "blob", b"x").await.unwrap();
        assert!(!stored.url_path.contains('.'));
    }

    #[tokio::test]
    async fn test_delete_is_tolerant_of_missing_files() {
        let storage = Storage::new(temp_root()).await.unwrap();

        let stored = storage
            .store("u", Some("backgrounds"), "sky.png", b"png")
            .await
            .unwrap();
        storage.delete(&stored.url_path).await.unwrap();
        assert!(!stored.disk_path.exists());

        // Second delete: already gone, still Ok
        storage.delete(&stored.url_path).await.unwrap();

        // Paths outside the mount are refused
        assert!(storage.delete("/etc/passwd").await.is_err());
    }

    #[test]
    fn test_image_allow_list() {
        assert!(is_allowed_image("photo.jpg"));
        assert!(is_allowed_image("photo.JPEG"));
        assert!(is_allowed_image("photo.Png"));
        assert!(is_allowed_image("anim.gif"));
        assert!(!is_allowed_image("notes.txt"));
        assert!(!is_allowed_image("archive.tar.gz"));
        assert!(!is_allowed_image("no_extension"));
    }

    #[test]
    fn test_filename_helpers() {
        assert_eq!(stem_of("walk.vrma"), Some("walk"));
        assert_eq!(stem_of("my.dance.vrma"), Some("my.dance"));
        assert_eq!(extension_of("walk.vrma"), Some("vrma"));
        assert_eq!(extension_of("bare"), None);
    }
}
