//! HTTP endpoint modules.

pub mod status;
pub mod template_gen;
