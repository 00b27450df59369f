//! Object-storage sync and upload.
//!
//! A sync mirrors every object under a prefix whose key matches a suffix
//! into a local directory. Downloads land in a staging directory first and
//! are swapped into place last, so an aborted run never leaves a
//! half-written mirror; the swap still discards whatever the previous run
//! left behind, even when the new listing is empty.

use std::path::{Path, PathBuf};

use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use tracing::{debug, info};

use crate::config::Config;
use crate::errors::AppError;

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
pub async fn build_s3_client(config: &Config) -> S3Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "jobrec-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    S3Client::new(&s3_config)
}

/// Bucket-scoped mirror operations.
pub struct ObjectMirror {
    s3: S3Client,
    bucket: String,
}

impl ObjectMirror {
    pub fn new(s3: S3Client, bucket: String) -> Self {
        Self { s3, bucket }
    }

    /// Mirrors all objects under `prefix/` whose keys end with `suffix`
    /// into `dest_dir`, replacing whatever was there. Returns the local
    /// file names that were written.
    pub async fn sync(
        &self,
        prefix: &str,
        suffix: &str,
        dest_dir: &Path,
    ) -> Result<Vec<String>, AppError> {
        // Staged in the working directory so the final rename never
        // crosses a filesystem boundary.
        let staging = tempfile::tempdir_in(".").map_err(AppError::Io)?;
        let keys = self.list_keys(prefix).await?;

        let mut names = Vec::new();
        for key in &keys {
            debug!(%key, "listed object");
            let name = match staged_name(prefix, suffix, key) {
                Some(name) => name,
                None => continue,
            };
            self.download(key, &staging.path().join(&name)).await?;
            names.push(name);
        }

        replace_dir(staging.path(), &names, dest_dir)?;

        info!(
            prefix,
            suffix,
            count = names.len(),
            dest = %dest_dir.display(),
            "sync complete"
        );
        Ok(names)
    }

    /// Lists every key under `prefix/`, following continuation tokens.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut req = self
                .s3
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(format!("{prefix}/"));
            if let Some(token) = &continuation {
                req = req.continuation_token(token);
            }

            let page = req
                .send()
                .await
                .map_err(|e| AppError::Storage(format!("listing s3://{}/{prefix}/ failed: {e}", self.bucket)))?;

            for object in page.contents() {
                if let Some(key) = object.key() {
                    keys.push(key.to_string());
                }
            }

            match page.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(keys)
    }

    async fn download(&self, key: &str, dest: &Path) -> Result<(), AppError> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(AppError::Io)?;
        }
        let object = self
            .s3
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("downloading {key} failed: {e}")))?;

        let bytes = object
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("reading body of {key} failed: {e}")))?
            .into_bytes();

        std::fs::write(dest, &bytes).map_err(AppError::Io)?;
        debug!(key, bytes = bytes.len(), "downloaded");
        Ok(())
    }

    /// Uploads the local file at `relative_path` to the destination key
    /// equal to that path, unmodified. Overwrites unconditionally.
    pub async fn upload_result(&self, relative_path: &Path) -> Result<String, AppError> {
        let key = destination_key(relative_path)?;
        let body = std::fs::read(relative_path).map_err(AppError::Io)?;

        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type("text/plain")
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("uploading {key} failed: {e}")))?;

        info!("Uploaded s3://{}/{}", self.bucket, key);
        Ok(key)
    }
}

/// Swaps the staged file set into place as the new mirror. Runs even when
/// `names` is empty so a stale mirror is cleared by an empty listing.
fn replace_dir(staging: &Path, names: &[String], dest_dir: &Path) -> Result<(), AppError> {
    if dest_dir.exists() {
        std::fs::remove_dir_all(dest_dir).map_err(AppError::Io)?;
    }
    std::fs::create_dir_all(dest_dir).map_err(AppError::Io)?;
    for name in names {
        let target = dest_dir.join(name);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(AppError::Io)?;
        }
        std::fs::rename(staging.join(name), target).map_err(AppError::Io)?;
    }
    Ok(())
}

/// Selects a listed key for download: the key must end with `suffix`
/// (plain string match, no path-component awareness) and map to a
/// non-empty local name under `prefix/`.
fn staged_name(prefix: &str, suffix: &str, key: &str) -> Option<String> {
    if !key.ends_with(suffix) {
        return None;
    }
    local_name(prefix, key)
}

/// Maps an object key to its local file name by stripping the prefix.
/// Returns `None` for the bare prefix placeholder and nested keys' empty tails.
fn local_name(prefix: &str, key: &str) -> Option<String> {
    let tail = key.strip_prefix(prefix)?.strip_prefix('/')?;
    if tail.is_empty() {
        None
    } else {
        Some(tail.to_string())
    }
}

/// Destination key for an upload: the relative path with `/` separators.
fn destination_key(relative_path: &Path) -> Result<String, AppError> {
    if relative_path.is_absolute() {
        return Err(AppError::Storage(format!(
            "upload path must be relative: {}",
            relative_path.display()
        )));
    }
    let parts: Vec<String> = relative_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

/// Local mirror directory for a storage prefix (same name, CWD-relative).
pub fn mirror_dir(prefix: &str) -> PathBuf {
    PathBuf::from(prefix)
}

/// Reads a synced mirror back, erroring if the directory is absent.
pub fn require_mirror(prefix: &str) -> Result<PathBuf, AppError> {
    let dir = mirror_dir(prefix);
    if !dir.is_dir() {
        return Err(AppError::Document(format!(
            "local mirror '{}' does not exist; run the matching download step first",
            dir.display()
        )));
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_name_strips_prefix() {
        assert_eq!(local_name("jds", "jds/a.pdf"), Some("a.pdf".to_string()));
    }

    #[test]
    fn test_local_name_rejects_bare_prefix_placeholder() {
        assert_eq!(local_name("jds", "jds/"), None);
        assert_eq!(local_name("jds", "jds"), None);
    }

    #[test]
    fn test_local_name_rejects_foreign_prefix() {
        assert_eq!(local_name("jds", "cvs/a.pdf"), None);
    }

    #[test]
    fn test_staged_name_filters_on_suffix() {
        assert_eq!(
            staged_name("jds", ".pdf", "jds/a.pdf"),
            Some("a.pdf".to_string())
        );
        assert_eq!(staged_name("jds", ".pdf", "jds/notes.txt"), None);
        // Directory placeholder objects never carry a name.
        assert_eq!(staged_name("jds", "", "jds/"), None);
    }

    #[test]
    fn test_staged_name_suffix_is_a_plain_string_match() {
        // A résumé sync filters on "{id}.pdf"; the match is intentionally
        // not anchored at a path component boundary.
        assert_eq!(
            staged_name("cvs", "742.pdf", "cvs/742.pdf"),
            Some("742.pdf".to_string())
        );
        assert_eq!(
            staged_name("cvs", "742.pdf", "cvs/1742.pdf"),
            Some("1742.pdf".to_string())
        );
        assert_eq!(staged_name("cvs", "742.pdf", "cvs/742.pdf.bak"), None);
    }

    #[test]
    fn test_destination_key_equals_relative_path() {
        let key = destination_key(Path::new("job_recommend/42_recommended.txt")).unwrap();
        assert_eq!(key, "job_recommend/42_recommended.txt");
    }

    #[test]
    fn test_destination_key_rejects_absolute_path() {
        assert!(destination_key(Path::new("/tmp/out.txt")).is_err());
    }

    #[test]
    fn test_replace_dir_discards_stale_contents() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("jds");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("stale.pdf"), b"old").unwrap();

        let staging = root.path().join("staging");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("a.pdf"), b"new").unwrap();

        replace_dir(&staging, &["a.pdf".to_string()], &dest).unwrap();

        assert!(dest.join("a.pdf").is_file());
        assert!(!dest.join("stale.pdf").exists());
    }

    #[test]
    fn test_replace_dir_empty_listing_still_wipes() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("jds");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("stale.pdf"), b"old").unwrap();

        let staging = root.path().join("staging");
        std::fs::create_dir_all(&staging).unwrap();

        replace_dir(&staging, &[], &dest).unwrap();

        assert!(dest.is_dir());
        assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 0);
    }
}
