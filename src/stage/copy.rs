// ABOUTME: Recursive copy that recreates symlinks and replaces stale destinations.
// ABOUTME: Never descends into the deploy repository itself.

use std::fs;
use std::io;
use std::path::Path;

use super::{PlannedCopy, StageError};

/// Replace each planned destination with a fresh copy of its source.
pub(crate) fn copy_artifacts(copies: &[PlannedCopy], exclude: &Path) -> Result<(), StageError> {
    for copy in copies {
        let copy_err = |source| StageError::Copy {
            from: copy.from.clone(),
            to: copy.to.clone(),
            source,
        };
        remove_existing(&copy.to).map_err(copy_err)?;
        if let Some(parent) = copy.to.parent() {
            fs::create_dir_all(parent).map_err(copy_err)?;
        }
        copy_tree(&copy.from, &copy.to, exclude).map_err(copy_err)?;
        tracing::debug!("staged {}", copy.relative);
    }
    Ok(())
}

/// Remove whatever is at `path` (file, symlink or directory tree).
pub(crate) fn remove_existing(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Copy `from` to `to`, skipping `exclude` if it lies inside `from`.
pub(crate) fn copy_tree(from: &Path, to: &Path, exclude: &Path) -> io::Result<()> {
    if from == exclude {
        return Ok(());
    }

    let meta = fs::symlink_metadata(from)?;
    let file_type = meta.file_type();

    if file_type.is_symlink() {
        let target = fs::read_link(from)?;
        symlink(&target, to)
    } else if file_type.is_dir() {
        fs::create_dir_all(to)?;
        fs::set_permissions(to, meta.permissions())?;
        let mut entries = fs::read_dir(from)?.collect::<io::Result<Vec<_>>>()?;
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let name = entry.file_name();
            if name == ".git" {
                continue;
            }
            copy_tree(&entry.path(), &to.join(&name), exclude)?;
        }
        Ok(())
    } else {
        fs::copy(from, to).map(|_| ())
    }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are only supported on unix",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_nested_tree() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("a/b")).unwrap();
        fs::write(src.join("a/b/file.txt"), "hello").unwrap();
        fs::write(src.join("top.txt"), "top").unwrap();

        let dst = dir.path().join("dst");
        copy_tree(&src, &dst, &dir.path().join("unrelated")).unwrap();

        assert_eq!(fs::read_to_string(dst.join("a/b/file.txt")).unwrap(), "hello");
        assert_eq!(fs::read_to_string(dst.join("top.txt")).unwrap(), "top");
    }

    #[cfg(unix)]
    #[test]
    fn recreates_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("real.txt"), "x").unwrap();
        std::os::unix::fs::symlink("real.txt", src.join("link.txt")).unwrap();

        let dst = dir.path().join("dst");
        copy_tree(&src, &dst, &dir.path().join("none")).unwrap();

        let link = fs::read_link(dst.join("link.txt")).unwrap();
        assert_eq!(link, Path::new("real.txt"));
    }

    #[test]
    fn skips_excluded_path() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join(".deploy")).unwrap();
        fs::write(src.join(".deploy/inner"), "x").unwrap();
        fs::write(src.join("keep"), "y").unwrap();

        let dst = dir.path().join("dst");
        copy_tree(&src, &dst, &src.join(".deploy")).unwrap();

        assert!(dst.join("keep").exists());
        assert!(!dst.join(".deploy").exists());
    }

    #[test]
    fn copy_artifacts_replaces_stale_destinations() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("build/dist");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("app.js"), "new").unwrap();
        let dst = dir.path().join("deploy/dist");
        fs::create_dir_all(&dst).unwrap();
        fs::write(dst.join("stale.js"), "old").unwrap();

        let copies = [PlannedCopy {
            relative: "dist".to_string(),
            from: src,
            to: dst.clone(),
        }];
        copy_artifacts(&copies, &dir.path().join("deploy")).unwrap();

        assert_eq!(fs::read_to_string(dst.join("app.js")).unwrap(), "new");
        assert!(!dst.join("stale.js").exists());
    }

    #[test]
    fn copy_artifacts_names_the_failing_source() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("build/gone");
        let copies = [PlannedCopy {
            relative: "gone".to_string(),
            from: missing.clone(),
            to: dir.path().join("deploy/gone"),
        }];

        let err = copy_artifacts(&copies, &dir.path().join("deploy")).unwrap_err();

        assert!(matches!(err, StageError::Copy { ref from, .. } if *from == missing));
    }

    #[test]
    fn remove_existing_handles_all_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        fs::write(&file, "x").unwrap();
        remove_existing(&file).unwrap();
        assert!(!file.exists());

        let tree = dir.path().join("t");
        fs::create_dir_all(tree.join("nested")).unwrap();
        remove_existing(&tree).unwrap();
        assert!(!tree.exists());

        remove_existing(&dir.path().join("missing")).unwrap();
    }
}
