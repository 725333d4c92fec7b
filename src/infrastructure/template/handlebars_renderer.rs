//! Template renderer backed by the handlebars crate

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use handlebars::Handlebars;
use serde_json::{Map, Value};
use tracing::debug;

use super::helpers::HelperRegistry;
use crate::domain::chain::{RenderError, RenderedTemplate, TemplateRenderer, TemplateSource};
use crate::domain::schema::split_front_matter;

/// Renders templates loaded from a `TemplateSource`
///
/// Output is never HTML-escaped. Front matter is stripped before rendering.
/// Each render builds its handlebars registry from one helper snapshot.
#[derive(Debug)]
pub struct HandlebarsRenderer {
    templates: Arc<dyn TemplateSource>,
    helpers: Arc<HelperRegistry>,
}

impl HandlebarsRenderer {
    pub fn new(templates: Arc<dyn TemplateSource>, helpers: Arc<HelperRegistry>) -> Self {
        Self { templates, helpers }
    }

    /// Render template source text directly
    pub fn render_source(
        &self,
        label: &str,
        source: &str,
        data: &Map<String, Value>,
    ) -> Result<String, RenderError> {
        let body = split_front_matter(source).body;

        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        self.helpers.install(&mut handlebars);

        handlebars
            .register_template_string(label, body)
            .map_err(|e| RenderError::parse(label, e.to_string()))?;

        handlebars
            .render(label, data)
            .map_err(|e| RenderError::runtime(label, e.to_string()))
    }
}

#[async_trait]
impl TemplateRenderer for HandlebarsRenderer {
    async fn render(
        &self,
        template_path: &str,
        data: &Map<String, Value>,
    ) -> Result<RenderedTemplate, RenderError> {
        let started = Instant::now();

        let source = self.templates.load(template_path).await?;
        let text = self.render_source(template_path, &source, data)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        debug!(template = template_path, elapsed_ms, "Rendered template");

        Ok(RenderedTemplate::new(parse_output(text), elapsed_ms))
    }
}

/// A rendered JSON object becomes structured output, anything else stays text
fn parse_output(text: String) -> Value {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    if unfenced.starts_with('{') {
        if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(unfenced) {
            return Value::Object(fields);
        }
    }

    Value::String(text)
}
