use super::Transform;
use crate::artifact::Artifact;

/// Joins every piece into a single output, in input order.
#[derive(Debug, Clone)]
pub struct Concat {
    separator: String,
}

impl Concat {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }
}

impl Transform for Concat {
    fn name(&self) -> &str {
        "concat"
    }

    fn apply(&self, mut artifact: Artifact) -> anyhow::Result<Artifact> {
        artifact.separator = self.separator.clone();
        Ok(artifact)
    }
}
