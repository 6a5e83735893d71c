//! Transform stages.
//!
//! Every stage implements [`Transform`]: it takes the artifact by value and
//! returns the rewritten artifact. Stages run in configured order.

mod concat;
mod css;
mod sourcemap;

use std::fmt;
use std::sync::Arc;

use spry_config::{ConfigError, TransformSpec};

pub use concat::Concat;
pub use css::{Autoprefix, Minify, browser_targets};
pub use sourcemap::SourceMap;

use crate::artifact::Artifact;

/// One stage of a transform chain.
pub trait Transform: Send + Sync + fmt::Debug {
    /// Stage name reported in errors
    fn name(&self) -> &str;

    fn apply(&self, artifact: Artifact) -> anyhow::Result<Artifact>;
}

/// Shared, ordered list of stages.
pub type TransformChain = Arc<[Arc<dyn Transform>]>;

/// Build the stages for a configured chain.
///
/// `browsers` are the task's browserslist queries; they are resolved once here
/// so every run of the task uses the same targets.
pub fn build_chain(specs: &[TransformSpec], browsers: &[String]) -> Result<TransformChain, ConfigError> {
    let mut chain: Vec<Arc<dyn Transform>> = Vec::with_capacity(specs.len());

    for spec in specs {
        let stage: Arc<dyn Transform> = match spec {
            TransformSpec::Identity => Arc::new(Identity),
            TransformSpec::Autoprefix => Arc::new(Autoprefix::new(browser_targets(browsers)?)),
            TransformSpec::Concat { separator } => Arc::new(Concat::new(separator.clone())),
            TransformSpec::Minify => Arc::new(Minify::new(browser_targets(browsers)?)),
            TransformSpec::Sourcemap { mode } => Arc::new(SourceMap::new(*mode)),
        };
        chain.push(stage);
    }

    Ok(chain.into())
}

/// Passes the artifact through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transform for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    fn apply(&self, artifact: Artifact) -> anyhow::Result<Artifact> {
        Ok(artifact)
    }
}

/// Per-file text rewrite backed by a closure.
///
/// ```
/// use spry_pipeline::transforms::{FnTransform, Transform};
///
/// let upper = FnTransform::new("upper", |text| Ok(text.to_uppercase()));
/// assert_eq!(upper.name(), "upper");
/// ```
pub struct FnTransform {
    name: String,
    f: Box<dyn Fn(&str) -> anyhow::Result<String> + Send + Sync>,
}

impl FnTransform {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl fmt::Debug for FnTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTransform").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Transform for FnTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, artifact: Artifact) -> anyhow::Result<Artifact> {
        artifact.map_pieces(|_, text| (self.f)(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::SourceFile;
    use spry_config::SourceMapMode;

    #[test]
    fn builds_stages_in_order() {
        let chain = build_chain(
            &[
                TransformSpec::Autoprefix,
                TransformSpec::concat(),
                TransformSpec::Minify,
                TransformSpec::sourcemap(SourceMapMode::External),
            ],
            &["defaults".to_string()],
        )
        .unwrap();

        let names: Vec<_> = chain.iter().map(|stage| stage.name()).collect();
        assert_eq!(names, ["autoprefix", "concat", "minify", "sourcemap"]);
    }

    #[test]
    fn rejects_bad_browserslist_query() {
        let err = build_chain(&[TransformSpec::Minify], &["netscape >= 4".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn identity_is_a_no_op() {
        let artifact = Artifact::from_sources(vec![SourceFile::new("/p/a.css", "a.css", "a{}")], "a.css");
        assert_eq!(Identity.apply(artifact.clone()).unwrap(), artifact);
    }
}
