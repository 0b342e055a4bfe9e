//! Mirror copy of the source subtree into the deploy location.
//!
//! Every file is copied on every deploy. Existing files are overwritten,
//! files that only exist at the destination are left alone.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use super::error::{DeployError, DeployResult};

/// What a copy pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub files: usize,
    pub dirs: usize,
    pub bytes: u64,
}

/// Copy everything under `src` into `dst`, creating directories as needed.
///
/// The first failure aborts the pass.
pub fn mirror_copy(src: &Path, dst: &Path) -> DeployResult<CopyStats> {
    let copy_err = |from: &Path, to: &Path, source: std::io::Error| DeployError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    fs::create_dir_all(dst).map_err(|e| copy_err(src, dst, e))?;

    let mut stats = CopyStats::default();

    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(|e| {
            let from = e.path().unwrap_or(src).to_path_buf();
            copy_err(&from, dst, e.into())
        })?;

        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| copy_err(entry.path(), dst, std::io::Error::other(e)))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| copy_err(entry.path(), &target, e))?;
            stats.dirs += 1;
        } else {
            let bytes =
                fs::copy(entry.path(), &target).map_err(|e| copy_err(entry.path(), &target, e))?;
            stats.files += 1;
            stats.bytes += bytes;
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copies_nested_tree() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("share/app");
        let dst = temp_dir.path().join("deploy/app");
        fs::create_dir_all(src.join("static/css")).unwrap();
        fs::write(src.join("main.py"), "print('v1')").unwrap();
        fs::write(src.join("static/css/site.css"), "body {}").unwrap();

        let stats = mirror_copy(&src, &dst).unwrap();

        assert_eq!(stats.files, 2);
        assert_eq!(fs::read_to_string(dst.join("main.py")).unwrap(), "print('v1')");
        assert_eq!(fs::read_to_string(dst.join("static/css/site.css")).unwrap(), "body {}");
    }

    #[test]
    fn test_overwrites_and_keeps_stale_files() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dst).unwrap();
        fs::write(src.join("main.py"), "print('v2')").unwrap();
        fs::write(dst.join("main.py"), "print('v1') # much longer old content").unwrap();
        fs::write(dst.join("stale.log"), "old").unwrap();

        mirror_copy(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("main.py")).unwrap(), "print('v2')");
        assert!(dst.join("stale.log").exists());
    }

    #[test]
    fn test_missing_source_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = mirror_copy(&temp_dir.path().join("missing"), &temp_dir.path().join("dst"));
        assert!(matches!(result, Err(DeployError::Copy { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_preserves_executable_bit() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("run.sh"), "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(src.join("run.sh"), fs::Permissions::from_mode(0o755)).unwrap();

        mirror_copy(&src, &dst).unwrap();

        let mode = fs::metadata(dst.join("run.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}
