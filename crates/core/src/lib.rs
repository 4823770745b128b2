//! ldap-template core library.
//!
//! Looks people up in a directory server and renders them through named
//! templates: configuration, error types, the directory client and person
//! lookup, and template resolution/rendering.

pub mod config;
pub mod directory;
pub mod errors;
pub mod template;

// Re-exports for convenience.
pub use config::AppConfig;
pub use directory::{PersonLookup, PersonRecord};
pub use template::{TemplateFormat, TemplateResolver};
