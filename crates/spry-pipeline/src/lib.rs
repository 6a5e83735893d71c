//! Asset transform pipeline for spry.
//!
//! A [`BuildTask`] expands its input globs, runs the files through an ordered
//! chain of [`Transform`] stages and atomically writes one output artifact,
//! plus a source map when the chain ends in `sourcemap`.
//!
//! Built-in stages:
//!
//! - `identity` passes text through
//! - `autoprefix` adds vendor prefixes for the task's browserslist targets
//! - `concat` joins all inputs with a separator
//! - `minify` minifies with Lightning CSS
//! - `sourcemap` records a source map, inline or external
//!
//! ```no_run
//! use spry_config::{SpryConfig, TaskConfig, TransformSpec};
//! use spry_pipeline::BuildTask;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = SpryConfig::default();
//! let task = TaskConfig::new("styles")
//!     .with_watch("app/styles/*.css")
//!     .with_transform(TransformSpec::Autoprefix)
//!     .with_transform(TransformSpec::concat())
//!     .with_output("app/dist/styles.css");
//!
//! if let Some(task) = BuildTask::from_config(&task, &config)? {
//!     let report = task.run()?;
//!     println!("wrote {} bytes", report.bytes);
//! }
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod clean;
pub mod error;
pub mod inputs;
pub mod pipeline;
pub mod transforms;

pub use artifact::{Artifact, Piece, SourceFile};
pub use clean::clean_dir;
pub use error::{CleanError, STAGE_LOAD, STAGE_WRITE, TransformError};
pub use inputs::{GlobMatcher, expand_inputs};
pub use pipeline::{BuildReport, BuildTask};
pub use transforms::{FnTransform, Transform, TransformChain, build_chain};
