//! Template infrastructure - sources, rendering and helpers

mod handlebars_renderer;
mod helpers;
mod source;

pub use handlebars_renderer::HandlebarsRenderer;
pub use helpers::{default_helpers, HelperFn, HelperRegistry};
pub use source::{PromptsDirectory, DEFAULT_EXTENSION};
