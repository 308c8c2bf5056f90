//! Expands a user's file/directory selection into file descriptors.
//!
//! Each selected item contributes descriptors whose key base is the item's
//! parent directory, so selecting `/home/u/dir` produces keys `dir/...` and
//! selecting `/home/u/file.txt` produces `file.txt`. Directories are walked
//! recursively in file-name order. Symbolic links are skipped.

use crate::errors::{AirlockError, AirlockResult};
use crate::models::upload_set::FileDescriptor;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

pub fn scan_selection<P: AsRef<Path>>(selection: &[P]) -> AirlockResult<Vec<FileDescriptor>> {
    let mut descriptors = Vec::new();
    for item in selection {
        scan_item(item.as_ref(), &mut descriptors)?;
    }
    debug!(
        "selection of {} items expanded to {} files",
        selection.len(),
        descriptors.len()
    );
    Ok(descriptors)
}

fn scan_item(item: &Path, out: &mut Vec<FileDescriptor>) -> AirlockResult<()> {
    let meta = fs::symlink_metadata(item)
        .map_err(|err| AirlockError::malformed(item, err.to_string()))?;
    let base = base_of(item)?;

    if meta.file_type().is_symlink() {
        debug!("skipping symbolic link {}", item.display());
        return Ok(());
    }
    if meta.is_file() {
        out.push(describe(item.to_path_buf(), base, &meta));
        return Ok(());
    }

    for entry in WalkDir::new(item).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(item).to_path_buf();
            AirlockError::malformed(&path, err.to_string())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let meta = entry
            .metadata()
            .map_err(|err| AirlockError::malformed(entry.path(), err.to_string()))?;
        out.push(describe(entry.into_path(), base.clone(), &meta));
    }
    Ok(())
}

/// Parent of the selected item. A bare relative name has the empty path as
/// parent, which leaves the name itself as the key. A filesystem root has no
/// parent to derive keys from.
fn base_of(item: &Path) -> AirlockResult<PathBuf> {
    item.parent().map(Path::to_path_buf).ok_or_else(|| {
        AirlockError::malformed(item, "a filesystem root cannot be selected for upload")
    })
}

fn describe(path: PathBuf, base: PathBuf, meta: &fs::Metadata) -> FileDescriptor {
    FileDescriptor {
        path,
        base: Some(base),
        size: Some(meta.len()),
        modified: meta.modified().ok().map(DateTime::<Utc>::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::name_validator::NamingPolicy;
    use crate::services::upload_set_builder::UploadSetBuilder;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("dir/subdir")).unwrap();
        fs::create_dir_all(root.join("dir/subdir2")).unwrap();
        for file in [
            "file.txt",
            "run.sh",
            "dir/file2.txt",
            "dir/subdir/file.txt",
            "dir/subdir/another-file.txt",
            "dir/subdir2/event.log",
            "dir/subdir2/fatal.log",
        ] {
            fs::write(root.join(file), b"hello world\n").unwrap();
        }
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(root.join("file.txt"), root.join("file-link.txt")).unwrap();
            std::os::unix::fs::symlink(root.join("file.txt"), root.join("dir/subdir/file-link.txt"))
                .unwrap();
        }
        dir
    }

    fn keys(descriptors: &[FileDescriptor], prefix: &str) -> Vec<String> {
        UploadSetBuilder::new(NamingPolicy::default())
            .with_prefix(prefix)
            .derive_keys(descriptors)
            .unwrap()
    }

    #[test]
    fn directories_expand_relative_to_their_parent() {
        let dir = fixture();
        let root = dir.path();
        let descriptors =
            scan_selection(&[root.join("file.txt"), root.join("dir/subdir2")]).unwrap();

        assert_eq!(
            keys(&descriptors, "subfolder"),
            [
                "subfolder/file.txt",
                "subfolder/subdir2/event.log",
                "subfolder/subdir2/fatal.log"
            ]
        );
        assert!(descriptors.iter().all(|d| d.size == Some(12)));
        assert!(descriptors.iter().all(|d| d.modified.is_some()));
    }

    #[cfg(unix)]
    #[test]
    fn symbolic_links_are_skipped() {
        let dir = fixture();
        let root = dir.path();
        let descriptors = scan_selection(&[root.join("dir"), root.join("file-link.txt")]).unwrap();

        let found = keys(&descriptors, "");
        assert_eq!(
            found,
            [
                "dir/file2.txt",
                "dir/subdir/another-file.txt",
                "dir/subdir/file.txt",
                "dir/subdir2/event.log",
                "dir/subdir2/fatal.log",
            ]
        );
    }

    #[test]
    fn missing_items_are_malformed() {
        let dir = fixture();
        let err = scan_selection(&[dir.path().join("dir2/file.txt")]).unwrap_err();
        assert!(matches!(err, AirlockError::MalformedFileDescriptor { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn filesystem_root_is_rejected() {
        let err = scan_selection(&["/"]).unwrap_err();
        assert!(matches!(err, AirlockError::MalformedFileDescriptor { .. }), "{err}");
    }

    #[test]
    fn selecting_a_file_twice_collides() {
        let dir = fixture();
        let file = dir.path().join("file.txt");
        let descriptors = scan_selection(&[file.clone(), file]).unwrap();
        let err = UploadSetBuilder::new(NamingPolicy::default())
            .derive_keys(&descriptors)
            .unwrap_err();
        assert!(matches!(err, AirlockError::DuplicateObjectKey { .. }));
    }
}
