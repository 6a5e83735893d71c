//! Glob matching and input expansion.
//!
//! Patterns use gitignore glob syntax relative to the project directory. A
//! pattern without a leading `**/` is anchored to the project directory, so
//! `*.css` only matches top-level files. A leading `!` excludes.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use ignore::WalkBuilder;
use ignore::overrides::{Override, OverrideBuilder};

/// Compiled set of globs rooted at a directory.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    overrides: Override,
}

impl GlobMatcher {
    pub fn new(root: &Path, patterns: &[String]) -> Result<Self, ignore::Error> {
        let mut builder = OverrideBuilder::new(root);
        for pattern in patterns {
            builder.add(&anchor(pattern))?;
        }
        Ok(Self {
            overrides: builder.build()?,
        })
    }

    /// Whether a file path (absolute under the root, or root-relative) matches.
    pub fn is_match(&self, path: &Path) -> bool {
        self.overrides.matched(path, false).is_whitelist()
    }
}

fn anchor(pattern: &str) -> String {
    let (negated, body) = match pattern.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, pattern),
    };
    let body = body.trim_start_matches("./");
    let anchored = if body.starts_with('/') || body.starts_with("**") {
        body.to_string()
    } else {
        format!("/{}", body)
    };
    if negated { format!("!{}", anchored) } else { anchored }
}

/// Directory a pattern can only match beneath.
fn walk_root(pattern: &str) -> PathBuf {
    let pattern = pattern.trim_start_matches("./").trim_start_matches('/');
    let mut components: Vec<Component<'_>> = Path::new(pattern).components().collect();
    // The last component names files, never a directory to walk.
    components.pop();
    components
        .into_iter()
        .take_while(|component| {
            let text = component.as_os_str().to_string_lossy();
            !text.contains(['*', '?', '[', '{'])
        })
        .collect()
}

/// Expand patterns into existing files.
///
/// Results follow pattern order; files matched by one pattern are sorted, and a
/// file matched by several patterns appears once, at its first match.
pub fn expand_inputs(base: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, ignore::Error> {
    let all = GlobMatcher::new(base, patterns)?;
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for pattern in patterns.iter().filter(|pattern| !pattern.starts_with('!')) {
        let single = GlobMatcher::new(base, std::slice::from_ref(pattern))?;
        let root = base.join(walk_root(pattern));
        if !root.is_dir() {
            continue;
        }

        let mut matched = Vec::new();
        for entry in WalkBuilder::new(&root).standard_filters(false).hidden(true).build() {
            let entry = entry?;
            if !entry.file_type().is_some_and(|kind| kind.is_file()) {
                continue;
            }
            let path = entry.path();
            if single.is_match(path) && all.is_match(path) {
                matched.push(path.to_path_buf());
            }
        }

        matched.sort();
        files.extend(matched.into_iter().filter(|path| seen.insert(path.clone())));
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        for file in [
            "top.css",
            "app/styles/b.css",
            "app/styles/a.css",
            "app/styles/vendor.css",
            "app/styles/nested/c.css",
            "app/styles/.hidden.css",
            "app/index.html",
        ] {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, file).unwrap();
        }
        dir
    }

    fn names(base: &Path, files: Vec<PathBuf>) -> Vec<String> {
        files
            .into_iter()
            .map(|path| path.strip_prefix(base).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn single_star_does_not_cross_directories() {
        let dir = project();
        let files = expand_inputs(dir.path(), &["app/styles/*.css".into()]).unwrap();
        assert_eq!(
            names(dir.path(), files),
            ["app/styles/a.css", "app/styles/b.css", "app/styles/vendor.css"]
        );
    }

    #[test]
    fn double_star_recurses() {
        let dir = project();
        let files = expand_inputs(dir.path(), &["app/**/*.css".into()]).unwrap();
        assert!(names(dir.path(), files).contains(&"app/styles/nested/c.css".to_string()));
    }

    #[test]
    fn bare_pattern_is_anchored() {
        let dir = project();
        let files = expand_inputs(dir.path(), &["*.css".into()]).unwrap();
        assert_eq!(names(dir.path(), files), ["top.css"]);
    }

    #[test]
    fn pattern_order_and_exclusions() {
        let dir = project();
        let files = expand_inputs(
            dir.path(),
            &[
                "app/styles/vendor.css".into(),
                "app/styles/*.css".into(),
                "!app/styles/b.css".into(),
            ],
        )
        .unwrap();
        assert_eq!(names(dir.path(), files), ["app/styles/vendor.css", "app/styles/a.css"]);
    }

    #[test]
    fn missing_directory_matches_nothing() {
        let dir = project();
        assert!(expand_inputs(dir.path(), &["nope/*.css".into()]).unwrap().is_empty());
    }

    #[test]
    fn matcher_accepts_absolute_and_relative_paths() {
        let dir = project();
        let matcher = GlobMatcher::new(dir.path(), &["app/**/*.html".into()]).unwrap();
        assert!(matcher.is_match(&dir.path().join("app/index.html")));
        assert!(matcher.is_match(Path::new("app/index.html")));
        assert!(!matcher.is_match(Path::new("app/styles/a.css")));
    }
}
