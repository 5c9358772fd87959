//! Filesystem-backed [`ObjectStore`].
//!
//! Objects live at `{root}/{bucket}/{path}`. Signed URLs point at the
//! `/api/storage` download route and carry an expiry timestamp plus an MD5
//! signature over `secret:bucket/path:expires`.

use super::{validate_object_path, ObjectStore, StorageError, StoreOptions};
use chrono::Utc;
use log::{info, warn};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Route prefix the download handler is mounted on.
pub const DOWNLOAD_PREFIX: &str = "/api/storage";

pub struct LocalObjectStore {
    root: PathBuf,
    secret: String,
    public_buckets: HashSet<String>,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, secret: &str) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        info!("Object store rooted at {}", root.display());
        Ok(Self {
            root,
            secret: secret.to_string(),
            public_buckets: HashSet::new(),
        })
    }

    /// Allows unsigned downloads from `bucket`.
    pub fn with_public_bucket(mut self, bucket: &str) -> Self {
        self.public_buckets.insert(bucket.to_string());
        self
    }

    fn object_path(&self, bucket: &str, path: &str) -> Result<PathBuf, StorageError> {
        validate_object_path(bucket)?;
        validate_object_path(path)?;
        Ok(self.root.join(bucket).join(path))
    }

    fn sign(&self, bucket: &str, path: &str, expires: i64) -> String {
        let digest = md5::compute(format!("{}:{}/{}:{}", self.secret, bucket, path, expires));
        format!("{:x}", digest)
    }
}

impl ObjectStore for LocalObjectStore {
    fn store(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        options: &StoreOptions,
    ) -> Result<String, StorageError> {
        let target = self.object_path(bucket, path)?;
        if target.exists() && !options.upsert {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{}/{} already exists", bucket, path),
            )));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)?;
        info!(
            "Stored {} bytes at {}/{} ({})",
            bytes.len(),
            bucket,
            path,
            options.content_type
        );
        Ok(path.to_string())
    }

    fn create_signed_url(&self, bucket: &str, path: &str, ttl: Duration) -> Result<String, StorageError> {
        let target = self.object_path(bucket, path)?;
        if !target.is_file() {
            return Err(StorageError::NotFound(format!("{}/{}", bucket, path)));
        }
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(format!(
            "{}?expires={}&signature={}",
            self.get_public_url(bucket, path),
            expires,
            self.sign(bucket, path, expires)
        ))
    }

    fn get_public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", DOWNLOAD_PREFIX, bucket, path)
    }

    fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StorageError> {
        for path in paths {
            let target = self.object_path(bucket, path)?;
            match fs::remove_file(&target) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!("Object {}/{} already removed", bucket, path);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn fetch(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        let target = self.object_path(bucket, path)?;
        fs::read(&target).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(format!("{}/{}", bucket, path)),
            _ => e.into(),
        })
    }

    fn verify_signature(
        &self,
        bucket: &str,
        path: &str,
        expires: Option<i64>,
        signature: Option<&str>,
    ) -> Result<(), StorageError> {
        self.object_path(bucket, path)?;
        if self.public_buckets.contains(bucket) {
            return Ok(());
        }
        let (Some(expires), Some(signature)) = (expires, signature) else {
            return Err(StorageError::BadSignature);
        };
        if expires < Utc::now().timestamp() || self.sign(bucket, path, expires) != signature {
            return Err(StorageError::BadSignature);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_param(url: &str, name: &str) -> Option<String> {
        url.split_once('?')?
            .1
            .split('&')
            .find_map(|pair| pair.strip_prefix(&format!("{}=", name)).map(str::to_string))
    }

    #[test]
    fn stored_objects_can_be_fetched_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "secret").unwrap();
        let options = StoreOptions::new("text/html");

        store.store("documents", "t1/out.html", b"<p>hi</p>", &options).unwrap();
        assert_eq!(store.fetch("documents", "t1/out.html").unwrap(), b"<p>hi</p>");
        assert!(store.store("documents", "t1/out.html", b"x", &options).is_err());
        store
            .store("documents", "t1/out.html", b"x", &options.clone().upsert())
            .unwrap();

        store.remove("documents", &["t1/out.html".to_string()]).unwrap();
        assert!(matches!(
            store.fetch("documents", "t1/out.html"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn signed_urls_verify_until_tampered() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "secret").unwrap();
        store
            .store("documents", "a.html", b"x", &StoreOptions::new("text/html"))
            .unwrap();

        let url = store
            .create_signed_url("documents", "a.html", Duration::from_secs(60))
            .unwrap();
        assert!(url.starts_with("/api/storage/documents/a.html?"));
        let expires = query_param(&url, "expires").and_then(|e| e.parse().ok());
        let signature = query_param(&url, "signature");

        assert!(store
            .verify_signature("documents", "a.html", expires, signature.as_deref())
            .is_ok());
        assert!(store
            .verify_signature("documents", "b.html", expires, signature.as_deref())
            .is_err());
        assert!(store.verify_signature("documents", "a.html", None, None).is_err());
    }

    #[test]
    fn expired_signatures_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "secret").unwrap();
        let past = Utc::now().timestamp() - 10;
        let signature = store.sign("documents", "a.html", past);
        assert!(matches!(
            store.verify_signature("documents", "a.html", Some(past), Some(&signature)),
            Err(StorageError::BadSignature)
        ));
    }

    #[test]
    fn public_buckets_skip_signatures() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "secret")
            .unwrap()
            .with_public_bucket("public");
        assert!(store.verify_signature("public", "logo.png", None, None).is_ok());
        assert!(store.verify_signature("public", "../x", None, None).is_err());
    }
}
