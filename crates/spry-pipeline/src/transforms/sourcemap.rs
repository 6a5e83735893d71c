use oxc_sourcemap::SourceMapBuilder;
use spry_config::SourceMapMode;

use super::Transform;
use crate::artifact::{Artifact, EmittedMap};

/// Records a line-level source map for the artifact as it stands.
///
/// A piece whose line structure survived earlier stages maps line for line;
/// any other piece maps each of its output lines to the first line of its
/// source.
#[derive(Debug, Clone, Copy)]
pub struct SourceMap {
    mode: SourceMapMode,
}

impl SourceMap {
    pub fn new(mode: SourceMapMode) -> Self {
        Self { mode }
    }
}

impl Transform for SourceMap {
    fn name(&self) -> &str {
        "sourcemap"
    }

    fn apply(&self, mut artifact: Artifact) -> anyhow::Result<Artifact> {
        let mut builder = SourceMapBuilder::default();
        builder.set_file(&artifact.file_name);

        let ids: Vec<u32> = artifact
            .sources
            .iter()
            .map(|source| builder.add_source_and_content(&source.name, &source.content))
            .collect();

        let mut cursor = Cursor::default();
        for (index, piece) in artifact.pieces.iter().enumerate() {
            if index > 0 {
                cursor.advance(&artifact.separator);
            }

            for (offset, line) in piece.text.split('\n').enumerate() {
                if line.is_empty() {
                    continue;
                }
                let dst_line = cursor.line + offset as u32;
                let dst_col = if offset == 0 { cursor.column } else { 0 };
                let src_line = if piece.line_exact { offset as u32 } else { 0 };
                builder.add_token(dst_line, dst_col, src_line, 0, Some(ids[piece.source]), None);
            }

            cursor.advance(&piece.text);
        }

        let map = builder.into_sourcemap();
        artifact.source_map = Some(EmittedMap {
            mode: self.mode,
            json: map.to_json_string(),
            data_url: map.to_data_url(),
        });
        Ok(artifact)
    }
}

/// Generated position, columns in UTF-16 units.
#[derive(Debug, Default, Clone, Copy)]
struct Cursor {
    line: u32,
    column: u32,
}

impl Cursor {
    fn advance(&mut self, text: &str) {
        match text.rfind('\n') {
            Some(last) => {
                self.line += text[..=last].bytes().filter(|&b| b == b'\n').count() as u32;
                self.column = text[last + 1..].encode_utf16().count() as u32;
            }
            None => self.column += text.encode_utf16().count() as u32,
        }
    }
}
