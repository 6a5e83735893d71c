//! In-memory representation of a task's output while it moves through the
//! transform chain.
//!
//! An [`Artifact`] keeps one [`Piece`] of text per contributing source until
//! the pieces are joined on write. Keeping the pieces apart lets per-file
//! stages (prefixing, minification) report the file that failed and lets the
//! source map stage attribute every output line to a source.

use std::path::{Path, PathBuf};

use spry_config::SourceMapMode;

/// A loaded input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path on disk
    pub path: PathBuf,
    /// Path recorded in source maps, relative to the project directory
    pub name: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Text derived from one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    /// Index into [`Artifact::sources`]
    pub source: usize,
    pub text: String,
    /// Line `n` of `text` still corresponds to line `n` of the source.
    pub line_exact: bool,
}

impl Piece {
    /// Replace the text, dropping line exactness when the line count changes.
    pub fn replace_text(&mut self, text: String) {
        if line_count(&text) != line_count(&self.text) {
            self.line_exact = false;
        }
        self.text = text;
    }
}

/// Source map produced by the `sourcemap` stage, emitted on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedMap {
    pub mode: SourceMapMode,
    /// Source map v3 JSON
    pub json: String,
    /// `data:application/json;...` URL of the same map
    pub data_url: String,
}

/// Output under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub sources: Vec<SourceFile>,
    pub pieces: Vec<Piece>,
    /// Text placed between pieces when rendering. Empty until `concat` runs.
    pub separator: String,
    /// File name of the output, used as the map's `file` field
    pub file_name: String,
    pub source_map: Option<EmittedMap>,
}

impl Artifact {
    /// One exact piece per source, in input order.
    pub fn from_sources(sources: Vec<SourceFile>, file_name: impl Into<String>) -> Self {
        let pieces = sources
            .iter()
            .enumerate()
            .map(|(index, source)| Piece {
                source: index,
                text: source.content.clone(),
                line_exact: true,
            })
            .collect();

        Self {
            sources,
            pieces,
            separator: String::new(),
            file_name: file_name.into(),
            source_map: None,
        }
    }

    /// Path of the source a piece came from.
    pub fn source_path(&self, piece: &Piece) -> &Path {
        &self.sources[piece.source].path
    }

    /// Apply a fallible text rewrite to every piece.
    ///
    /// Errors are tagged with the path of the piece that failed.
    pub fn map_pieces<F>(mut self, mut f: F) -> anyhow::Result<Self>
    where
        F: FnMut(&Path, &str) -> anyhow::Result<String>,
    {
        for piece in &mut self.pieces {
            let path = &self.sources[piece.source].path;
            let text = f(path, &piece.text).map_err(|err| PieceError {
                path: path.clone(),
                cause: err,
            })?;
            piece.replace_text(text);
        }
        Ok(self)
    }

    /// Joined output text, without any source map comment.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (index, piece) in self.pieces.iter().enumerate() {
            if index > 0 {
                out.push_str(&self.separator);
            }
            out.push_str(&piece.text);
        }
        out
    }
}

/// A per-piece rewrite failed. Carries the source path so the pipeline can
/// report which file broke the stage.
#[derive(Debug, thiserror::Error)]
#[error("{cause}")]
pub struct PieceError {
    pub path: PathBuf,
    pub cause: anyhow::Error,
}

pub(crate) fn line_count(text: &str) -> usize {
    text.bytes().filter(|&b| b == b'\n').count()
}
