//! Reconciled mapping of local files to destination objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A local file selected for upload.
///
/// `base` is the directory the object key is derived relative to. When it is
/// `None` the builder's root (if any) is used instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub path: PathBuf,
    #[serde(default)]
    pub base: Option<PathBuf>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
}

impl FileDescriptor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            base: None,
            size: None,
            modified: None,
        }
    }

    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = Some(base.into());
        self
    }
}

impl From<&str> for FileDescriptor {
    fn from(path: &str) -> Self {
        FileDescriptor::new(path)
    }
}

impl From<PathBuf> for FileDescriptor {
    fn from(path: PathBuf) -> Self {
        FileDescriptor::new(path)
    }
}

/// Where an upload goes: a bucket plus an optional key prefix inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub bucket: String,
    /// Empty, or ends with `/`.
    pub prefix: String,
}

impl Destination {
    /// Split `bucket/sub/folder` into bucket `bucket` and prefix `sub/folder/`.
    pub fn parse(destination: &str) -> Self {
        let trimmed = destination.trim().trim_matches('/');
        let (bucket, rest) = trimmed.split_once('/').unwrap_or((trimmed, ""));

        let prefix = rest
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/");

        Self {
            bucket: bucket.to_string(),
            prefix: if prefix.is_empty() {
                prefix
            } else {
                format!("{prefix}/")
            },
        }
    }
}

/// Result of reconciliation. `files`, `objects` and `exists` are index-aligned.
///
/// Existence is a snapshot taken when the set was built; it is never
/// refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UploadSetWire")]
pub struct UploadSet {
    bucket: String,
    files: Vec<PathBuf>,
    objects: Vec<String>,
    exists: Vec<bool>,
}

/// One row of an [`UploadSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadEntry<'a> {
    pub file: &'a Path,
    pub object: &'a str,
    pub exists: bool,
}

impl UploadSet {
    pub(crate) fn new(
        bucket: String,
        files: Vec<PathBuf>,
        objects: Vec<String>,
        exists: Vec<bool>,
    ) -> Self {
        debug_assert_eq!(files.len(), objects.len());
        debug_assert_eq!(files.len(), exists.len());
        Self {
            bucket,
            files,
            objects,
            exists,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn objects(&self) -> &[String] {
        &self.objects
    }

    pub fn exists(&self) -> &[bool] {
        &self.exists
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = UploadEntry<'_>> {
        self.files
            .iter()
            .zip(&self.objects)
            .zip(&self.exists)
            .map(|((file, object), exists)| UploadEntry {
                file,
                object,
                exists: *exists,
            })
    }

    /// Entries whose object is already present in the bucket.
    pub fn conflicts(&self) -> impl Iterator<Item = UploadEntry<'_>> {
        self.entries().filter(|entry| entry.exists)
    }
}

#[derive(Deserialize)]
struct UploadSetWire {
    bucket: String,
    files: Vec<PathBuf>,
    objects: Vec<String>,
    exists: Vec<bool>,
}

impl TryFrom<UploadSetWire> for UploadSet {
    type Error = String;

    fn try_from(wire: UploadSetWire) -> Result<Self, Self::Error> {
        if wire.files.len() != wire.objects.len() || wire.files.len() != wire.exists.len() {
            return Err(format!(
                "upload set arrays are misaligned: {} files, {} objects, {} exists",
                wire.files.len(),
                wire.objects.len(),
                wire.exists.len()
            ));
        }
        Ok(Self {
            bucket: wire.bucket,
            files: wire.files,
            objects: wire.objects,
            exists: wire.exists,
        })
    }
}
