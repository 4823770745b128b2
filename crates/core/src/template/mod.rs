//! Template resolution and rendering.
//!
//! [`TemplateResolver`] maps a template name and [`TemplateFormat`] to a file
//! in the template directory and renders it as a Go `text/template`
//! with the person record bound as `.`.

pub mod format;
pub mod render;
pub mod resolver;

pub use format::TemplateFormat;
pub use render::person_context;
pub use resolver::{TemplateResolver, TemplateSource, TEMPLATE_NAME_PATTERN};
