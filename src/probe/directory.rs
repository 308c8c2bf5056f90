//! Probe backed by a local directory mirror of the storage backend.
//!
//! Objects of bucket `b` live at `{root}/b/{key}`, with `/` in the key
//! mapping to directory separators. Used for dry runs of the shell binary.

use super::{ExistenceProbe, ProbeResult};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::io::{self, ErrorKind};
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DirectoryProbe {
    root: PathBuf,
}

impl DirectoryProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bucket_root(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    fn object_path(&self, bucket: &str, key: &str) -> io::Result<PathBuf> {
        let mut path = self.bucket_root(bucket);
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(io::Error::new(
                    ErrorKind::InvalidInput,
                    format!("object key `{key}` cannot be mapped to a file"),
                ));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

#[async_trait]
impl ExistenceProbe for DirectoryProbe {
    async fn check(
        &self,
        bucket: &str,
        keys: &BTreeSet<String>,
    ) -> ProbeResult<HashMap<String, bool>> {
        let bucket_root = self.bucket_root(bucket);
        if !fs::try_exists(&bucket_root).await? {
            debug!("bucket directory {} missing", bucket_root.display());
            return Ok(keys.iter().map(|key| (key.clone(), false)).collect());
        }

        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            let path = self.object_path(bucket, key)?;
            let exists = match fs::metadata(&path).await {
                Ok(meta) => meta.is_file(),
                // a file where the key expects a directory
                Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                    false
                }
                Err(err) => return Err(err.into()),
            };
            found.insert(key.clone(), exists);
        }

        Ok(found)
    }
}
