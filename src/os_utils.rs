//! Utilities pertaining to filesystem and other os-level settings
//!

use camino::{Utf8Path, Utf8PathBuf};

/// Create a novel directory path if it does not exist already
///
/// If the directory already exists no operations are performed
///
/// * `label` - used to describe the error directory in an error message
///
pub fn create_dir_all(dir: &Utf8Path, label: &str) {
    if !dir.is_dir() {
        match std::fs::create_dir_all(dir) {
            Ok(_) => {}
            Err(e) => {
                panic!("Can't create new {} directory at '{}': {}", label, dir, e);
            }
        }
    }
}

/// Attempt to increase open file limit to the system's hard limit on *nix-like systems
///
/// This is an optional increase so continue through all failure cases without error.
///
pub fn attempt_max_open_file_limit() {
    use rlimit::Resource;

    let (soft, hard) = match Resource::NOFILE.get() {
        Ok(x) => x,
        Err(_) => return,
    };

    if soft < hard {
        rlimit::setrlimit(Resource::NOFILE, hard, hard).unwrap_or_default();
    }
}

/// Return true if `filename` exists and holds at least one byte
///
/// Zero-byte files are treated the same as absent files, so a tool that touched its output
/// before dying doesn't pass for one that completed.
///
pub fn is_nonempty_file(filename: &Utf8Path) -> bool {
    match std::fs::metadata(filename) {
        Ok(x) => x.is_file() && x.len() > 0,
        Err(_) => false,
    }
}

/// Scratch directory removed on every exit path
///
/// Each job gets its own scratch path, so removal here can't collide with a concurrently
/// running job. The drop handler ignores removal errors to keep failure paths simple.
///
pub struct ScratchDir {
    dir: Utf8PathBuf,
}

impl ScratchDir {
    pub fn create(dir: Utf8PathBuf) -> Self {
        create_dir_all(&dir, "scratch");
        Self { dir }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.dir
    }

    pub fn join(&self, filename: &str) -> Utf8PathBuf {
        self.dir.join(filename)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_nonempty_file() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp_dir.path()).unwrap();

        let missing = dir.join("missing.txt");
        assert!(!is_nonempty_file(&missing));

        let empty = dir.join("empty.txt");
        std::fs::write(&empty, b"").unwrap();
        assert!(!is_nonempty_file(&empty));

        let full = dir.join("full.txt");
        std::fs::write(&full, b"x").unwrap();
        assert!(is_nonempty_file(&full));
    }

    #[test]
    fn test_scratch_dir_removed_on_drop() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp_dir.path()).unwrap();

        let scratch_path = dir.join("scratch");
        {
            let scratch = ScratchDir::create(scratch_path.clone());
            std::fs::write(scratch.join("batch.tmp"), b"x").unwrap();
            assert!(scratch_path.is_dir());
        }
        assert!(!scratch_path.exists());
    }

    #[test]
    fn test_scratch_dir_removed_on_error_path() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(tmp_dir.path()).unwrap();

        let scratch_path = dir.join("scratch");
        let failing_job = || -> Result<(), String> {
            let scratch = ScratchDir::create(scratch_path.clone());
            std::fs::write(scratch.join("batch.tmp"), b"x").unwrap();
            Err("simulated merge failure".to_string())
        };
        assert!(failing_job().is_err());
        assert!(!scratch_path.exists());
    }
}
