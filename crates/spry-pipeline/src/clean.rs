//! Removal of the build output directory.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::CleanError;

/// Delete `dir` and everything under it.
///
/// Refuses to delete the project directory itself or anything outside it. A
/// missing directory is not an error. Returns whether anything was removed.
pub fn clean_dir(dir: &Path, project_dir: &Path) -> Result<bool, CleanError> {
    let io_err = |source: io::Error| CleanError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let target = match dir.canonicalize() {
        Ok(path) => path,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(io_err(e)),
    };
    let project = project_dir.canonicalize().map_err(io_err)?;

    if target == project {
        return Err(CleanError::Refused {
            path: dir.to_path_buf(),
            reason: "it is the project directory",
        });
    }
    if !target.starts_with(&project) {
        return Err(CleanError::Refused {
            path: dir.to_path_buf(),
            reason: "it is outside the project directory",
        });
    }

    tracing::debug!(path = %target.display(), "removing clean directory");
    fs::remove_dir_all(&target).map_err(io_err)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn removes_directory_tree() {
        let project = TempDir::new().unwrap();
        let dist = project.path().join("dist");
        fs::create_dir_all(dist.join("css")).unwrap();
        fs::write(dist.join("css/site.css"), "a{}").unwrap();

        assert!(clean_dir(&dist, project.path()).unwrap());
        assert!(!dist.exists());
    }

    #[test]
    fn missing_directory_is_a_no_op() {
        let project = TempDir::new().unwrap();
        assert!(!clean_dir(&project.path().join("dist"), project.path()).unwrap());
    }

    #[test]
    fn refuses_project_and_outside_directories() {
        let parent = TempDir::new().unwrap();
        let project = parent.path().join("project");
        let sibling = parent.path().join("sibling");
        fs::create_dir_all(&project).unwrap();
        fs::create_dir_all(&sibling).unwrap();

        assert!(matches!(clean_dir(&project, &project), Err(CleanError::Refused { .. })));
        assert!(matches!(
            clean_dir(&project.join("../sibling"), &project),
            Err(CleanError::Refused { .. })
        ));
        assert!(sibling.exists());
    }
}
