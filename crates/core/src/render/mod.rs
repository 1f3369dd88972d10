//! Destination path rendering.
//!
//! Name templates substitute context fields into a relative path below a
//! library root. See [`Template`] for the placeholder syntax.

mod helpers;
mod template;

use thiserror::Error;

pub use helpers::{clean, clean_title, sanitize};
pub use template::{Helper, RenderedPath, Template};

use crate::candidate::EvaluationContext;

/// Errors from template parsing and rendering.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    #[error("unclosed placeholder at offset {offset}")]
    Unclosed { offset: usize },

    #[error("empty placeholder")]
    EmptyPlaceholder,

    #[error("invalid placeholder: {0}")]
    InvalidPlaceholder(String),

    #[error("unknown template helper: {0}")]
    UnknownHelper(String),

    #[error("unknown template field: {0}")]
    UnknownField(String),

    #[error("invalid format suffix: {0}")]
    InvalidFormat(String),

    #[error("template rendered an empty path")]
    EmptyPath,
}

/// Parse and render in one step.
pub fn render(template: &str, ctx: &EvaluationContext) -> Result<RenderedPath, RenderError> {
    Template::parse(template)?.render(ctx)
}
