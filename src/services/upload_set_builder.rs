//! src/services/upload_set_builder.rs
//!
//! Reconciliation of a local file selection against a bucket. Produces an
//! [`UploadSet`] mapping each file to its destination object key together with
//! whether that object already exists remotely.
//!
//! The build is all-or-nothing: any failure (bad bucket name, unusable or
//! colliding file, probe error) returns an error and no set at all.

use crate::errors::{AirlockError, AirlockResult};
use crate::models::upload_set::{Destination, FileDescriptor, UploadSet};
use crate::probe::{ExistenceProbe, ProbeError};
use crate::services::name_validator::{ExistingNames, NameValidator, NamingPolicy};
use crate::services::operation_log::OperationLog;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const MAX_OBJECT_KEY_LEN: usize = 1024;

/// Builds [`UploadSet`]s. Immutable once configured, so one builder can serve
/// any number of concurrent `build` calls.
#[derive(Debug, Clone, Default)]
pub struct UploadSetBuilder {
    validator: NameValidator,
    existing: ExistingNames,
    root: Option<PathBuf>,
    prefix: String,
    suffix: String,
    selected: BTreeSet<String>,
    log: Option<Arc<OperationLog>>,
}

impl UploadSetBuilder {
    pub fn new(policy: NamingPolicy) -> Self {
        Self {
            validator: NameValidator::new(policy),
            ..Default::default()
        }
    }

    /// Bucket names the destination is validated against. Empty by default,
    /// which allows uploading into an existing bucket.
    pub fn with_existing_names(mut self, existing: ExistingNames) -> Self {
        self.existing = existing;
        self
    }

    /// Directory keys are derived relative to, for files without their own base.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Prefix prepended to every key. Its segments follow the same rules as
    /// file paths and are checked when keys are derived.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.trim_matches('/').to_string();
        self
    }

    /// Suffix appended to every key, e.g. `.c4gh` for encrypted uploads.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Object keys of files the caller has already selected in an earlier
    /// step. Deriving one of these again is a collision.
    pub fn with_selected<I, S>(mut self, objects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected = objects.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_log(mut self, log: Arc<OperationLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Convenience for a `bucket/prefix` destination: applies the prefix and
    /// returns the bucket to build against.
    pub fn for_destination(self, destination: &Destination) -> (Self, String) {
        let bucket = destination.bucket.clone();
        (self.with_prefix(&destination.prefix), bucket)
    }

    pub fn validator(&self) -> &NameValidator {
        &self.validator
    }

    /// Reconcile `files` against `bucket`.
    ///
    /// Keys are checked with a single probe call. `files`, `objects` and
    /// `exists` of the result share the order of `files`.
    pub async fn build<P>(
        &self,
        bucket: &str,
        files: &[FileDescriptor],
        probe: &P,
    ) -> AirlockResult<UploadSet>
    where
        P: ExistenceProbe + ?Sized,
    {
        let validation = self.validator.validate(bucket, &self.existing);
        if !validation.is_valid() {
            return Err(self.fail(AirlockError::InvalidBucketName {
                name: bucket.to_string(),
                result: validation,
            }));
        }

        let objects = self.derive_keys(files).map_err(|err| self.fail(err))?;
        let paths: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();

        if objects.is_empty() {
            debug!("empty selection for bucket `{bucket}`, skipping existence check");
            return Ok(UploadSet::new(bucket.to_string(), paths, objects, Vec::new()));
        }

        let requested: BTreeSet<String> = objects.iter().cloned().collect();
        debug!(
            "checking {} object keys in bucket `{bucket}`",
            requested.len()
        );

        let answer = probe
            .check(bucket, &requested)
            .await
            .map_err(|source| {
                self.fail(AirlockError::ProbeUnavailable {
                    bucket: bucket.to_string(),
                    source,
                })
            })?;

        let exists = objects
            .iter()
            .map(|key| {
                answer.get(key).copied().ok_or_else(|| {
                    self.fail(AirlockError::ProbeUnavailable {
                        bucket: bucket.to_string(),
                        source: ProbeError::InvalidResponse(format!(
                            "no answer for object `{key}`"
                        )),
                    })
                })
            })
            .collect::<AirlockResult<Vec<bool>>>()?;

        let set = UploadSet::new(bucket.to_string(), paths, objects, exists);
        let conflicts = set.conflicts().count();
        for entry in set.conflicts() {
            debug!("object `{}` already exists in `{bucket}`", entry.object);
        }
        info!(
            "reconciled {} files for bucket `{bucket}`, {conflicts} already exist",
            set.len()
        );
        self.log_info(format!(
            "{} files selected for bucket {bucket}, {conflicts} of them would overwrite existing objects",
            set.len()
        ));

        Ok(set)
    }

    /// Derive the object key for every file, in order, rejecting collisions
    /// with each other and with the already-selected objects.
    pub fn derive_keys(&self, files: &[FileDescriptor]) -> AirlockResult<Vec<String>> {
        let mut seen: HashMap<String, usize> = HashMap::with_capacity(files.len());
        let mut keys = Vec::with_capacity(files.len());

        for (index, file) in files.iter().enumerate() {
            let key = self.derive_key(file)?;

            if self.selected.contains(&key) {
                return Err(AirlockError::DuplicateObjectKey {
                    key,
                    path: file.path.clone(),
                    previous: None,
                });
            }
            if let Some(&first) = seen.get(&key) {
                return Err(AirlockError::DuplicateObjectKey {
                    key,
                    path: file.path.clone(),
                    previous: Some(files[first].path.clone()),
                });
            }

            seen.insert(key.clone(), index);
            keys.push(key);
        }

        Ok(keys)
    }

    /// Object key for one file: its path relative to its base, with `/` as
    /// separator, wrapped in the configured prefix and suffix.
    pub fn derive_key(&self, file: &FileDescriptor) -> AirlockResult<String> {
        let path = file.path.as_path();
        if path.to_str().is_none() {
            return Err(AirlockError::malformed(path, "path is not valid UTF-8"));
        }

        let relative = match file.base.as_deref().or(self.root.as_deref()) {
            Some(base) => path.strip_prefix(base).map_err(|_| {
                AirlockError::malformed(path, format!("not inside {}", base.display()))
            })?,
            None if path.is_absolute() => {
                return Err(AirlockError::malformed(
                    path,
                    "absolute path given without a root to derive the object key from",
                ));
            }
            None => path,
        };

        let mut segments = key_segments(path, &self.prefix)?;
        let relative = relative.to_string_lossy();
        let body = key_segments(path, &relative)?;
        if body.is_empty() {
            return Err(AirlockError::malformed(
                path,
                "no file name left to derive an object key from",
            ));
        }
        segments.extend(body);
        let key = format!("{}{}", segments.join("/"), self.suffix);
        ensure_key_safe(path, &key)?;

        debug!("derived object key `{key}` for {}", path.display());
        Ok(key)
    }

    /// Report a failure once: to the operation log when attached (which
    /// mirrors to `tracing`), otherwise straight to `tracing`.
    fn fail(&self, err: AirlockError) -> AirlockError {
        match &self.log {
            Some(log) => log.emit_error(&err),
            None => warn!("reconciliation failed: {err}"),
        }
        err
    }

    fn log_info(&self, message: String) {
        if let Some(log) = &self.log {
            log.info(message);
        }
    }
}

/// Split `raw` into key segments, treating backslashes as separators too
/// and dropping empty and `.` segments.
fn key_segments<'a>(path: &Path, raw: &'a str) -> AirlockResult<Vec<&'a str>> {
    let mut segments = Vec::new();
    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(AirlockError::malformed(
                    path,
                    "parent directory references are not allowed",
                ));
            }
            other => segments.push(other),
        }
    }
    Ok(segments)
}

fn ensure_key_safe(path: &Path, key: &str) -> AirlockResult<()> {
    if key.len() > MAX_OBJECT_KEY_LEN {
        return Err(AirlockError::malformed(
            path,
            format!("object key is longer than {MAX_OBJECT_KEY_LEN} bytes"),
        ));
    }
    if key.chars().any(char::is_control) {
        return Err(AirlockError::malformed(
            path,
            "object key contains control characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::log_entry::LogLevel;
    use crate::probe::{MemoryProbe, ProbeResult};
    use async_trait::async_trait;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::Layer;
    use tracing_subscriber::layer::{Context, SubscriberExt};

    fn files(paths: &[&str]) -> Vec<FileDescriptor> {
        paths.iter().map(|p| FileDescriptor::from(*p)).collect()
    }

    fn builder() -> UploadSetBuilder {
        UploadSetBuilder::new(NamingPolicy::default())
    }

    /// Answers for every key except `skip`.
    struct PartialProbe {
        skip: &'static str,
    }

    #[async_trait]
    impl ExistenceProbe for PartialProbe {
        async fn check(
            &self,
            _bucket: &str,
            keys: &BTreeSet<String>,
        ) -> ProbeResult<HashMap<String, bool>> {
            Ok(keys
                .iter()
                .filter(|k| k.as_str() != self.skip)
                .map(|k| (k.clone(), false))
                .collect())
        }
    }

    #[tokio::test]
    async fn reconciles_in_selection_order() {
        let probe = MemoryProbe::new().with_objects("bucket", ["a/x.txt"]);
        let set = builder()
            .build("bucket", &files(&["a/x.txt", "a/y.txt"]), &probe)
            .await
            .unwrap();

        assert_eq!(set.bucket(), "bucket");
        assert_eq!(set.files(), [PathBuf::from("a/x.txt"), PathBuf::from("a/y.txt")]);
        assert_eq!(set.objects(), ["a/x.txt", "a/y.txt"]);
        assert_eq!(set.exists(), [true, false]);
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn order_is_preserved_for_unsorted_input() {
        let probe = MemoryProbe::new().with_objects("bucket", ["m.txt"]);
        let input = files(&["z.txt", "a.txt", "m.txt"]);
        let set = builder().build("bucket", &input, &probe).await.unwrap();

        for (i, entry) in set.entries().enumerate() {
            assert_eq!(entry.file, input[i].path);
            assert_eq!(entry.object, input[i].path.to_str().unwrap());
            assert_eq!(entry.exists, entry.object == "m.txt");
        }
    }

    #[tokio::test]
    async fn repeated_builds_are_identical() {
        let probe = MemoryProbe::new().with_objects("bucket", ["b/2.txt"]);
        let input = files(&["b/1.txt", "b/2.txt"]);
        let b = builder();

        let first = b.build("bucket", &input, &probe).await.unwrap();
        let second = b.build("bucket", &input, &probe).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn invalid_bucket_fails_before_probing() {
        let probe = MemoryProbe::new();
        let err = builder()
            .build("My_Bucket", &files(&["a.txt"]), &probe)
            .await
            .unwrap_err();

        assert!(matches!(err, AirlockError::InvalidBucketName { .. }));
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test]
    async fn strict_existing_names_reject_bucket() {
        let probe = MemoryProbe::new();
        let err = builder()
            .with_existing_names(ExistingNames::new(["taken"]))
            .build("taken", &files(&["a.txt"]), &probe)
            .await
            .unwrap_err();

        match err {
            AirlockError::InvalidBucketName { result, .. } => {
                assert!(result.unique_or_ownable.is_fail());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn colliding_files_fail_without_probing() {
        let probe = MemoryProbe::new();
        let err = builder()
            .build("bucket", &files(&["a/x.txt", "a/./x.txt"]), &probe)
            .await
            .unwrap_err();

        match err {
            AirlockError::DuplicateObjectKey { key, previous, .. } => {
                assert_eq!(key, "a/x.txt");
                assert_eq!(previous, Some(PathBuf::from("a/x.txt")));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(probe.calls(), 0);
    }

    #[test]
    fn backslash_and_slash_paths_collide() {
        let err = builder()
            .derive_keys(&files(&["dir/file.txt", "dir\\file.txt"]))
            .unwrap_err();
        assert!(matches!(err, AirlockError::DuplicateObjectKey { .. }));
    }

    #[test]
    fn already_selected_objects_collide() {
        let err = builder()
            .with_root("/data")
            .with_prefix("dir")
            .with_selected(["dir/subdir2/fatal.log"])
            .derive_keys(&files(&["/data/subdir2/event.log", "/data/subdir2/fatal.log"]))
            .unwrap_err();

        match err {
            AirlockError::DuplicateObjectKey { key, previous, .. } => {
                assert_eq!(key, "dir/subdir2/fatal.log");
                assert_eq!(previous, None);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn probe_failure_yields_no_set() {
        let probe = MemoryProbe::new();
        probe.set_failing(true);
        let err = builder()
            .build("bucket", &files(&["a.txt"]), &probe)
            .await
            .unwrap_err();

        assert!(matches!(err, AirlockError::ProbeUnavailable { .. }));
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn incomplete_probe_answer_is_a_failure() {
        let probe = PartialProbe { skip: "b.txt" };
        let err = builder()
            .build("bucket", &files(&["a.txt", "b.txt"]), &probe)
            .await
            .unwrap_err();

        match err {
            AirlockError::ProbeUnavailable { source, .. } => {
                assert!(matches!(source, ProbeError::InvalidResponse(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_selection_skips_probe() {
        let probe = MemoryProbe::new();
        let set = builder().build("bucket", &[], &probe).await.unwrap();
        assert!(set.is_empty());
        assert_eq!(probe.calls(), 0);
    }

    #[test]
    fn keys_are_relative_to_base_with_prefix_and_suffix() {
        let b = builder().with_prefix("/subfolder/").with_suffix(".c4gh");
        let file = FileDescriptor::new("/tmp/x/dir/subdir/file.txt").with_base("/tmp/x");
        assert_eq!(
            b.derive_key(&file).unwrap(),
            "subfolder/dir/subdir/file.txt.c4gh"
        );
    }

    #[test]
    fn descriptor_base_overrides_builder_root() {
        let b = builder().with_root("/home/user");
        let own = FileDescriptor::new("/mnt/share/run.sh").with_base("/mnt/share");
        assert_eq!(b.derive_key(&own).unwrap(), "run.sh");
        assert_eq!(
            b.derive_key(&FileDescriptor::new("/home/user/docs/a.txt")).unwrap(),
            "docs/a.txt"
        );
    }

    #[test]
    fn malformed_descriptors_are_rejected() {
        let b = builder().with_root("/data");
        for path in ["/elsewhere/a.txt", "/data", "/data/../etc/passwd"] {
            let err = b.derive_key(&FileDescriptor::new(path)).unwrap_err();
            assert!(
                matches!(err, AirlockError::MalformedFileDescriptor { .. }),
                "{path}: {err}"
            );
        }

        let rootless = builder();
        assert!(rootless.derive_key(&FileDescriptor::new("/abs/a.txt")).is_err());
        assert!(rootless.derive_key(&FileDescriptor::new("a\u{7}.txt")).is_err());
        let long = "a/".repeat(600) + "x";
        assert!(rootless.derive_key(&FileDescriptor::new(long.as_str())).is_err());
    }

    #[test]
    fn destination_prefix_is_applied() {
        let (b, bucket) = builder().for_destination(&Destination::parse("bucket/subfolder"));
        assert_eq!(bucket, "bucket");
        assert_eq!(
            b.derive_key(&FileDescriptor::from("file.txt")).unwrap(),
            "subfolder/file.txt"
        );
    }

    #[test]
    fn destination_prefix_follows_key_segment_rules() {
        let (b, _) = builder().for_destination(&Destination::parse("bucket/../x"));
        let err = b.derive_key(&FileDescriptor::from("f.txt")).unwrap_err();
        assert!(matches!(err, AirlockError::MalformedFileDescriptor { .. }), "{err}");

        let (b, _) = builder().for_destination(&Destination::parse("bucket/./in\\sub"));
        assert_eq!(
            b.derive_key(&FileDescriptor::from("f.txt")).unwrap(),
            "in/sub/f.txt"
        );
    }

    #[derive(Clone, Default)]
    struct LevelRecorder(Arc<std::sync::Mutex<Vec<Level>>>);

    impl<S: Subscriber> Layer<S> for LevelRecorder {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            self.0.lock().unwrap().push(*event.metadata().level());
        }
    }

    #[tokio::test]
    async fn failures_are_traced_once() {
        let recorder = LevelRecorder::default();
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(recorder.clone()));
        let probe = MemoryProbe::new();

        let log = Arc::new(OperationLog::default());
        let _ = builder()
            .with_log(log)
            .build("Bad_Name", &files(&["a.txt"]), &probe)
            .await;
        let _ = builder().build("Bad_Name", &files(&["a.txt"]), &probe).await;

        let problems: Vec<Level> = recorder
            .0
            .lock()
            .unwrap()
            .iter()
            .copied()
            .filter(|level| *level == Level::WARN || *level == Level::ERROR)
            .collect();
        assert_eq!(problems, [Level::ERROR, Level::WARN]);
    }

    #[tokio::test]
    async fn outcomes_are_reported_to_the_log() {
        let log = Arc::new(OperationLog::default());
        let probe = MemoryProbe::new().with_objects("bucket", ["a.txt"]);
        let b = builder().with_log(log.clone());

        b.build("bucket", &files(&["a.txt", "b.txt"]), &probe)
            .await
            .unwrap();
        probe.set_failing(true);
        let _ = b.build("bucket", &files(&["a.txt"]), &probe).await;

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, LogLevel::Info);
        assert!(entries[0].headline().contains("1 of them would overwrite"));
        assert_eq!(entries[1].level, LogLevel::Error);
        assert_eq!(entries[1].message.len(), 2);
    }
}
