use std::path::Path;

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use spry_config::ConfigError;

use super::Transform;
use crate::artifact::Artifact;

/// Resolve browserslist queries into Lightning CSS targets.
pub fn browser_targets(queries: &[String]) -> Result<Targets, ConfigError> {
    let browsers = Browsers::from_browserslist(queries.iter().map(String::as_str))
        .map_err(|e| ConfigError::invalid("browsers", format!("invalid browserslist query: {}", e)))?;

    Ok(Targets {
        browsers,
        ..Targets::default()
    })
}

/// Parse, lower for the targets and print.
fn process_css(path: &Path, source: &str, targets: &Targets, minify: bool) -> anyhow::Result<String> {
    let mut stylesheet = StyleSheet::parse(
        source,
        ParserOptions {
            filename: path.to_string_lossy().to_string(),
            ..Default::default()
        },
    )
    .map_err(|e| anyhow::anyhow!("failed to parse CSS: {}", e))?;

    stylesheet
        .minify(MinifyOptions {
            targets: targets.clone(),
            ..Default::default()
        })
        .map_err(|e| anyhow::anyhow!("failed to transform CSS: {}", e))?;

    let result = stylesheet
        .to_css(PrinterOptions {
            minify,
            targets: targets.clone(),
            ..Default::default()
        })
        .map_err(|e| anyhow::anyhow!("failed to print CSS: {}", e))?;

    Ok(result.code)
}

/// Adds vendor prefixes required by the task's browsers.
///
/// Output keeps Lightning CSS's pretty printer formatting, so line numbers can
/// drift from the source.
#[derive(Debug, Clone)]
pub struct Autoprefix {
    targets: Targets,
}

impl Autoprefix {
    pub fn new(targets: Targets) -> Self {
        Self { targets }
    }
}

impl Transform for Autoprefix {
    fn name(&self) -> &str {
        "autoprefix"
    }

    fn apply(&self, artifact: Artifact) -> anyhow::Result<Artifact> {
        artifact.map_pieces(|path, text| process_css(path, text, &self.targets, false))
    }
}

/// Minifies each piece.
#[derive(Debug, Clone)]
pub struct Minify {
    targets: Targets,
}

impl Minify {
    pub fn new(targets: Targets) -> Self {
        Self { targets }
    }
}

impl Transform for Minify {
    fn name(&self) -> &str {
        "minify"
    }

    fn apply(&self, artifact: Artifact) -> anyhow::Result<Artifact> {
        artifact.map_pieces(|path, text| process_css(path, text, &self.targets, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{PieceError, SourceFile};

    fn single(content: &str) -> Artifact {
        Artifact::from_sources(vec![SourceFile::new("/p/a.css", "a.css", content)], "a.css")
    }

    #[test]
    fn autoprefix_adds_vendor_prefixes() {
        let targets = browser_targets(&["safari 8".to_string()]).unwrap();
        let out = Autoprefix::new(targets)
            .apply(single(".row { display: flex; user-select: none; }"))
            .unwrap();

        let css = out.render();
        assert!(css.contains("-webkit-user-select"), "{}", css);
        assert!(css.contains("display: flex"), "{}", css);
    }

    #[test]
    fn minify_shrinks_output() {
        let css = "body {\n  color: red;\n  background: blue;\n}\n";
        let targets = browser_targets(&["defaults".to_string()]).unwrap();
        let out = Minify::new(targets).apply(single(css)).unwrap();

        let minified = out.render();
        assert!(minified.len() < css.len());
        assert!(minified.contains("color"));
        assert!(!out.pieces[0].line_exact);
    }

    #[test]
    fn parse_error_names_the_file() {
        let targets = browser_targets(&["defaults".to_string()]).unwrap();
        let err = Minify::new(targets).apply(single(".a..b { color: red; }")).unwrap_err();

        let piece = err.downcast_ref::<PieceError>().unwrap();
        assert!(piece.path.ends_with("a.css"));
    }
}
