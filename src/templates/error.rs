//! Template engine error types

use thiserror::Error;

/// Template loading and rendering errors
#[derive(Debug, Error)]
pub enum TemplateError {
    /// No embedded template with this name
    #[error("Template not found: {0}")]
    NotFound(String),

    /// Template is not valid UTF-8
    #[error("Template {0} is not valid UTF-8")]
    Encoding(String),

    /// Parse or render failure, with the tera error chain
    #[error("Template error: {0}")]
    Render(String),
}
