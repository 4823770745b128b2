//! Output formats and `Accept`-header negotiation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Representation a template is rendered into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateFormat {
    #[default]
    Text,
    Html,
}

impl TemplateFormat {
    /// Pick the format for an `Accept` header value.
    ///
    /// Any mention of `text/html` selects HTML; everything else, including
    /// a missing header, is plain text. Quality values are not weighed.
    /// The value is searched as raw bytes, so header values that are not
    /// visible ASCII still negotiate.
    pub fn from_accept(accept: Option<&[u8]>) -> Self {
        const HTML: &[u8] = b"text/html";
        match accept {
            Some(value) if value.windows(HTML.len()).any(|w| w == HTML) => TemplateFormat::Html,
            _ => TemplateFormat::Text,
        }
    }

    /// Infix used in template file names (`<name>.<infix>.tmpl`).
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateFormat::Text => "text",
            TemplateFormat::Html => "html",
        }
    }

    /// `Content-Type` of a response rendered in this format.
    pub fn content_type(self) -> &'static str {
        match self {
            TemplateFormat::Text => "text/plain; charset=utf-8",
            TemplateFormat::Html => "text/html; charset=utf-8",
        }
    }
}

impl fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
