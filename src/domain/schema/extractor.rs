//! Static schema extraction for Handlebars templates
//!
//! Compiles the template with the `handlebars` parser, so a template is
//! rejected here exactly when the renderer would reject it, then walks the
//! syntax tree without rendering anything. Every top-level field the template
//! reads is reported, plus every helper it invokes. The analysis
//! over-approximates: a field referenced anywhere, including inside a
//! conditional branch, is reported. Fields that only ever appear in
//! conditional positions (`if`/`unless` conditions and bodies, field
//! sections, inverse sections) are reported as optional.
//!
//! Templates may start with a YAML front matter block declaring `inputs` and
//! `outputs` as field lists:
//!
//! ```text
//! ---
//! outputs:
//!   - name: summary
//!     type: string
//! ---
//! Summarize {{document}}
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};

use handlebars::template::{
    BlockParam, DecoratorTemplate, HelperTemplate, Parameter, Subexpression, TemplateElement,
};
use handlebars::{Path, Template};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::field::{SchemaField, UnifiedSchema};

/// Leading `---` delimited YAML block
static FRONT_MATTER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?ms)\A---[ \t]*\r?\n(.*?)^---[ \t]*\r?(?:\n|\z)").unwrap()
});

/// Helpers the template engine always provides
pub const BUILTIN_HELPERS: &[&str] = &[
    "if", "unless", "each", "with", "lookup", "log", "raw", "eq", "ne", "gt", "gte", "lt", "lte",
    "and", "or", "not", "len",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_HELPERS.contains(&name)
}

/// Source of the helper names currently registered with the template engine
///
/// Consulted on every extraction, so helpers registered after start-up are
/// recognised as helpers rather than fields.
pub trait HelperCatalog: Send + Sync + std::fmt::Debug {
    fn helper_names(&self) -> Vec<String>;
}

/// Error raised when a template is syntactically invalid
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{label}:{line}:{column}: {message}")]
pub struct TemplateParseError {
    pub label: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// Result of analysing a template
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaExtraction {
    pub schema: UnifiedSchema,
    pub required_helpers: Vec<String>,
}

/// A template split into its optional front matter and renderable body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateParts<'a> {
    pub front_matter: Option<&'a str>,
    pub body: &'a str,
    /// Number of source lines preceding the body
    pub line_offset: usize,
}

/// Separate a leading YAML front matter block from the template body
pub fn split_front_matter(source: &str) -> TemplateParts<'_> {
    match FRONT_MATTER_PATTERN.captures(source) {
        Some(caps) => {
            let whole = caps.get(0).map(|m| m.end()).unwrap_or(0);
            let yaml = caps.get(1).map(|m| m.as_str()).unwrap_or("");

            TemplateParts {
                front_matter: Some(yaml),
                body: &source[whole..],
                line_offset: source[..whole].matches('\n').count(),
            }
        }
        None => TemplateParts {
            front_matter: None,
            body: source,
            line_offset: 0,
        },
    }
}

#[derive(Debug, Default, Deserialize)]
struct Declarations {
    #[serde(default)]
    inputs: Vec<SchemaField>,
    #[serde(default)]
    outputs: Vec<SchemaField>,
}

/// Extract the unified schema of a template knowing only the built-in helpers
pub fn extract_unified_schema(
    source: &str,
    label: &str,
) -> Result<SchemaExtraction, TemplateParseError> {
    SchemaExtractor::new().extract(source, label)
}

/// Template schema extractor
///
/// A bare `{{name}}` is ambiguous between a field and a zero-argument helper.
/// Built-in helpers and names registered as known helpers are treated as
/// helper calls; everything else is treated as a field.
#[derive(Debug, Clone, Default)]
pub struct SchemaExtractor {
    known_helpers: HashSet<String>,
}

impl SchemaExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_helpers<I, S>(helpers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_helpers: helpers.into_iter().map(Into::into).collect(),
        }
    }

    /// Extractor aware of everything the catalog currently holds
    pub fn from_catalog(catalog: &dyn HelperCatalog) -> Self {
        Self::with_helpers(catalog.helper_names())
    }

    pub fn extract(
        &self,
        source: &str,
        label: &str,
    ) -> Result<SchemaExtraction, TemplateParseError> {
        let parts = split_front_matter(source);

        let declarations = match parts.front_matter {
            Some(yaml) if !yaml.trim().is_empty() => {
                serde_yaml::from_str::<Declarations>(yaml).map_err(|e| TemplateParseError {
                    label: label.to_string(),
                    line: 1,
                    column: 1,
                    message: format!("Invalid front matter: {}", e),
                })?
            }
            _ => Declarations::default(),
        };

        let template = Template::compile(parts.body).map_err(|e| {
            let (line, column) = e.pos().unwrap_or((1, 1));
            TemplateParseError {
                label: label.to_string(),
                line: line + parts.line_offset,
                column,
                message: e.reason().to_string(),
            }
        })?;

        let mut collector = Collector::new(&self.known_helpers);
        collector.template(&template);
        let (mut inputs, helpers) = collector.finish();

        for declared in declarations.inputs {
            match inputs.iter_mut().find(|f| f.name == declared.name) {
                Some(existing) => {
                    existing.required = declared.required;
                    existing.field_type = declared.field_type.or(existing.field_type);
                    existing.description = declared.description.or(existing.description.take());
                }
                None => inputs.push(declared),
            }
        }

        Ok(SchemaExtraction {
            schema: UnifiedSchema {
                inputs,
                outputs: declarations.outputs,
            },
            required_helpers: helpers,
        })
    }
}

#[derive(Debug, Default)]
struct Frame {
    /// `each`/`with` bodies and field sections evaluate paths against a new context
    scoped: bool,
    conditional: bool,
    block_params: Vec<String>,
}

#[derive(Debug)]
struct FieldUse {
    name: String,
    required: bool,
}

/// Walks a compiled template, recording field reads and helper calls
struct Collector<'a> {
    known_helpers: &'a HashSet<String>,
    frames: Vec<Frame>,
    fields: Vec<FieldUse>,
    positions: HashMap<String, usize>,
    helpers: BTreeSet<String>,
}

impl<'a> Collector<'a> {
    fn new(known_helpers: &'a HashSet<String>) -> Self {
        Self {
            known_helpers,
            frames: Vec::new(),
            fields: Vec::new(),
            positions: HashMap::new(),
            helpers: BTreeSet::new(),
        }
    }

    fn finish(self) -> (Vec<SchemaField>, Vec<String>) {
        let fields = self
            .fields
            .into_iter()
            .map(|f| SchemaField {
                name: f.name,
                field_type: None,
                required: f.required,
                description: None,
            })
            .collect();

        (fields, self.helpers.into_iter().collect())
    }

    fn template(&mut self, template: &Template) {
        for element in &template.elements {
            self.element(element);
        }
    }

    fn element(&mut self, element: &TemplateElement) {
        let conditional = self.in_conditional();

        match element {
            TemplateElement::Expression(call) | TemplateElement::HtmlExpression(call) => {
                self.call(call, conditional)
            }
            TemplateElement::HelperBlock(block) => self.block(block, conditional),
            TemplateElement::PartialExpression(partial)
            | TemplateElement::PartialBlock(partial)
            | TemplateElement::DecoratorExpression(partial)
            | TemplateElement::DecoratorBlock(partial) => self.decorator(partial, conditional),
            _ => {}
        }
    }

    fn is_known_helper(&self, name: &str) -> bool {
        is_builtin(name) || self.known_helpers.contains(name)
    }

    /// Arguments or a known name make an expression a helper call
    fn is_helper_call(&self, call: &HelperTemplate) -> bool {
        !call.params.is_empty()
            || !call.hash.is_empty()
            || name_of(&call.name).is_some_and(|name| self.is_known_helper(name))
    }

    /// `{{name}}`, `{{helper args}}` or the inside of a sub-expression
    fn call(&mut self, call: &HelperTemplate, conditional: bool) {
        if !self.is_helper_call(call) {
            self.parameter(&call.name, conditional);
            return;
        }

        match name_of(&call.name) {
            Some(name) => {
                self.helpers.insert(name.to_string());
            }
            None => self.parameter(&call.name, conditional),
        }
        self.arguments(call, conditional);
    }

    fn block(&mut self, block: &HelperTemplate, conditional: bool) {
        let name = name_of(&block.name).unwrap_or_default();

        let body = if self.is_helper_call(block) {
            let guard = matches!(name, "if" | "unless");
            self.helpers.insert(name.to_string());
            self.arguments(block, conditional || guard);

            Frame {
                scoped: matches!(name, "each" | "with"),
                conditional: guard,
                block_params: block_param_names(block.block_param.as_ref()),
            }
        } else {
            // `{{#field}}...{{/field}}` renders with the field as context, only when truthy
            self.parameter(&block.name, true);

            Frame {
                scoped: true,
                conditional: true,
                block_params: block_param_names(block.block_param.as_ref()),
            }
        };

        if let Some(template) = &block.template {
            self.frames.push(body);
            self.template(template);
            self.frames.pop();
        }

        // Inverse sections run in the enclosing scope
        if let Some(inverse) = &block.inverse {
            self.frames.push(Frame {
                conditional: true,
                ..Frame::default()
            });
            self.template(inverse);
            self.frames.pop();
        }
    }

    /// Partials, partial blocks and decorators
    fn decorator(&mut self, decorator: &DecoratorTemplate, conditional: bool) {
        if let Parameter::Subexpression(dynamic) = &decorator.name {
            self.subexpression(dynamic, conditional);
        }
        for param in &decorator.params {
            self.parameter(param, conditional);
        }
        for value in sorted_hash(&decorator.hash) {
            self.parameter(value, conditional);
        }
        if let Some(template) = &decorator.template {
            self.template(template);
        }
    }

    fn arguments(&mut self, call: &HelperTemplate, conditional: bool) {
        for param in &call.params {
            self.parameter(param, conditional);
        }
        for value in sorted_hash(&call.hash) {
            self.parameter(value, conditional);
        }
    }

    fn parameter(&mut self, param: &Parameter, conditional: bool) {
        match param {
            Parameter::Subexpression(sub) => self.subexpression(sub, conditional),
            Parameter::Literal(_) => {}
            other => {
                if let Some(path) = name_of(other) {
                    self.use_path(path, conditional);
                }
            }
        }
    }

    fn subexpression(&mut self, sub: &Subexpression, conditional: bool) {
        match sub.element.as_ref() {
            TemplateElement::Expression(call) | TemplateElement::HtmlExpression(call) => {
                self.call(call, conditional)
            }
            _ => {}
        }
    }

    fn in_conditional(&self) -> bool {
        self.frames.iter().any(|f| f.conditional)
    }

    fn scope_depth(&self) -> usize {
        self.frames.iter().filter(|f| f.scoped).count()
    }

    fn is_block_param(&self, name: &str) -> bool {
        self.frames
            .iter()
            .any(|f| f.block_params.iter().any(|p| p == name))
    }

    fn use_path(&mut self, path: &str, conditional: bool) {
        let Some(name) = self.top_level_name(path) else {
            return;
        };

        match self.positions.get(&name) {
            Some(&index) => self.fields[index].required |= !conditional,
            None => {
                self.positions.insert(name.clone(), self.fields.len());
                self.fields.push(FieldUse {
                    name,
                    required: !conditional,
                });
            }
        }
    }

    /// Resolve a path expression to the top-level field it reads, if any
    fn top_level_name(&self, path: &str) -> Option<String> {
        let mut rest = path;

        let rooted = match rest.strip_prefix("@root.").or_else(|| rest.strip_prefix("@root/")) {
            Some(stripped) => {
                rest = stripped;
                true
            }
            None => false,
        };

        if !rooted && rest.starts_with('@') {
            return None;
        }

        let mut up = 0;
        while let Some(stripped) = rest.strip_prefix("../") {
            up += 1;
            rest = stripped;
        }

        for prefix in ["this.", "this/", "./"] {
            if let Some(stripped) = rest.strip_prefix(prefix) {
                rest = stripped;
                break;
            }
        }

        if matches!(rest, "" | "this" | "." | "..") {
            return None;
        }

        let head = match rest.strip_prefix('[') {
            Some(bracketed) => bracketed.split(']').next().unwrap_or(""),
            None => rest.split(['.', '/']).next().unwrap_or(""),
        };

        if head.is_empty() {
            return None;
        }

        if !rooted {
            if up == 0 && self.is_block_param(head) {
                return None;
            }
            if up < self.scope_depth() {
                return None;
            }
        }

        Some(head.to_string())
    }
}

/// Source text of a name or path parameter
fn name_of(param: &Parameter) -> Option<&str> {
    match param {
        Parameter::Name(name) => Some(name),
        Parameter::Path(Path::Relative((_, raw))) => Some(raw),
        Parameter::Path(Path::Local((_, _, raw))) => Some(raw),
        _ => None,
    }
}

fn block_param_names(param: Option<&BlockParam>) -> Vec<String> {
    let names = match param {
        Some(BlockParam::Single(single)) => vec![single],
        Some(BlockParam::Pair((first, second))) => vec![first, second],
        _ => Vec::new(),
    };

    names
        .into_iter()
        .filter_map(name_of)
        .map(str::to_string)
        .collect()
}

/// Hash arguments in key order, so field order does not depend on hashing
fn sorted_hash(hash: &HashMap<String, Parameter>) -> Vec<&Parameter> {
    let mut entries: Vec<_> = hash.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries.into_iter().map(|(_, value)| value).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> SchemaExtraction {
        extract_unified_schema(source, "test.hbs").unwrap()
    }

    fn input<'a>(extraction: &'a SchemaExtraction, name: &str) -> &'a SchemaField {
        extraction
            .schema
            .input(name)
            .unwrap_or_else(|| panic!("field '{}' not extracted", name))
    }

    #[derive(Debug)]
    struct Catalog(Vec<&'static str>);

    impl HelperCatalog for Catalog {
        fn helper_names(&self) -> Vec<String> {
            self.0.iter().map(|s| s.to_string()).collect()
        }
    }

    #[test]
    fn test_simple_fields() {
        let result = extract("Hello {{name}}, welcome to {{{site.title}}}!");

        assert_eq!(result.schema.input_names(), vec!["name", "site"]);
        assert!(input(&result, "name").required);
        assert!(result.required_helpers.is_empty());
    }

    #[test]
    fn test_field_inside_conditional_is_reported() {
        let result = extract("{{#if published}}<h1>{{title}}</h1>{{/if}}");

        let title = input(&result, "title");
        assert!(!title.required);
        assert!(!input(&result, "published").required);
        assert_eq!(result.required_helpers, vec!["if"]);
    }

    #[test]
    fn test_field_inside_unless_else_branch_is_reported() {
        let result = extract("{{#unless draft}}live{{else}}{{title}}{{/unless}}");
        assert!(result.schema.input("title").is_some());
    }

    #[test]
    fn test_unconditional_use_makes_field_required() {
        let result = extract("{{#if title}}{{title}}{{/if}} {{title}}");
        assert!(input(&result, "title").required);
    }

    #[test]
    fn test_each_changes_scope() {
        let result = extract("{{#each items}}{{name}} of {{../title}}{{/each}}");

        assert_eq!(result.schema.input_names(), vec!["items", "title"]);
        assert!(input(&result, "items").required);
    }

    #[test]
    fn test_block_arguments_get_no_inferred_type() {
        let result = extract("{{#each sections}}{{@key}}={{this}};{{/each}}{{#with author}}{{name}}{{/with}}");

        assert_eq!(input(&result, "sections").field_type, None);
        assert_eq!(input(&result, "author").field_type, None);
    }

    #[test]
    fn test_each_inverse_runs_in_outer_scope() {
        let result = extract("{{#each items}}{{name}}{{else}}{{fallback}}{{/each}}");

        assert!(result.schema.input("name").is_none());
        assert!(!input(&result, "fallback").required);
    }

    #[test]
    fn test_with_and_root_paths() {
        let result = extract("{{#with author}}{{name}} writes for {{@root.site}}{{/with}}");
        assert_eq!(result.schema.input_names(), vec!["author", "site"]);
    }

    #[test]
    fn test_block_params_are_not_fields() {
        let result = extract("{{#each users as |user idx|}}{{idx}}: {{user.name}}{{/each}}");
        assert_eq!(result.schema.input_names(), vec!["users"]);
    }

    #[test]
    fn test_data_variables_are_not_fields() {
        let result = extract("{{#each list}}{{@index}} {{this}}{{/each}}{{@key}}");
        assert_eq!(result.schema.input_names(), vec!["list"]);
    }

    #[test]
    fn test_helpers_and_subexpressions() {
        let result = extract(
            r#"{{uppercase title}} {{#if (eq status "done")}}ok{{/if}} {{truncate body length=limit}}"#,
        );

        assert_eq!(result.required_helpers, vec!["eq", "if", "truncate", "uppercase"]);
        assert_eq!(
            result.schema.input_names(),
            vec!["title", "status", "body", "limit"]
        );
        assert!(!input(&result, "status").required);
    }

    #[test]
    fn test_else_if_chain() {
        let result = extract("{{#if a}}x{{else if b}}y{{else}}{{c}}{{/if}}");

        assert_eq!(result.required_helpers, vec!["if"]);
        for name in ["a", "b", "c"] {
            assert!(!input(&result, name).required, "{} should be optional", name);
        }
    }

    #[test]
    fn test_field_section() {
        let result = extract("{{#author}}{{name}}{{/author}}{{summary}}");

        assert_eq!(result.schema.input_names(), vec!["author", "summary"]);
        assert!(!input(&result, "author").required);
        assert!(result.required_helpers.is_empty());
    }

    #[test]
    fn test_partials() {
        let result = extract("{{> header title=pageTitle}}{{#> layout}}{{body}}{{/layout}}");
        assert_eq!(result.schema.input_names(), vec!["pageTitle", "body"]);
        assert!(result.required_helpers.is_empty());
    }

    #[test]
    fn test_comments_and_escapes_are_ignored() {
        let result = extract("{{!-- {{secret}} --}}{{! note }} \\{{literal}} {{~ real ~}}");
        assert_eq!(result.schema.input_names(), vec!["real"]);
    }

    #[test]
    fn test_raw_block_content_is_ignored() {
        let result = extract("{{{{raw}}}}{{not_a_field}}{{{{/raw}}}}{{after}}");
        assert_eq!(result.schema.input_names(), vec!["after"]);
        assert_eq!(result.required_helpers, vec!["raw"]);
    }

    #[test]
    fn test_known_helper_without_arguments() {
        let extractor = SchemaExtractor::with_helpers(["today"]);
        let result = extractor.extract("Date: {{today}} {{name}}", "t").unwrap();

        assert_eq!(result.schema.input_names(), vec!["name"]);
        assert_eq!(result.required_helpers, vec!["today"]);
    }

    #[test]
    fn test_builtin_helper_without_arguments() {
        let result = extract("{{log}} {{name}}");

        assert_eq!(result.schema.input_names(), vec!["name"]);
        assert_eq!(result.required_helpers, vec!["log"]);
    }

    #[test]
    fn test_extractor_from_catalog() {
        let extractor = SchemaExtractor::from_catalog(&Catalog(vec!["today"]));
        let result = extractor.extract("{{today}}", "t").unwrap();

        assert!(result.schema.inputs.is_empty());
        assert_eq!(result.required_helpers, vec!["today"]);
    }

    #[test]
    fn test_front_matter_declarations() {
        let source = "---\ninputs:\n  - name: topic\n    type: string\n    required: true\n    description: Subject\n  - name: tone\n    type: string\noutputs:\n  - name: draft\n    type: string\n    required: true\n---\nWrite about {{topic}}.\n";
        let result = extract(source);

        let topic = input(&result, "topic");
        assert_eq!(topic.field_type, Some(super::super::FieldType::String));
        assert_eq!(topic.description.as_deref(), Some("Subject"));

        let tone = input(&result, "tone");
        assert!(!tone.required);

        assert_eq!(result.schema.outputs.len(), 1);
        assert_eq!(result.schema.outputs[0].name, "draft");
    }

    #[test]
    fn test_split_front_matter() {
        let parts = split_front_matter("---\na: 1\n---\nbody {{x}}");
        assert_eq!(parts.front_matter, Some("a: 1\n"));
        assert_eq!(parts.body, "body {{x}}");
        assert_eq!(parts.line_offset, 3);

        let plain = split_front_matter("no front matter");
        assert_eq!(plain.front_matter, None);
        assert_eq!(plain.body, "no front matter");
    }

    #[test]
    fn test_rejects_what_the_engine_rejects() {
        let invalid = [
            "{{foo.}}",
            "{{a..b}}",
            "{{#if a}}x{{else}}y{{else}}z{{/if}}",
            "{{'single'}}",
            "{{#if ready}}never closed",
            "{{#each xs}}{{/if}}",
            "Hello {{name",
        ];

        for source in invalid {
            assert!(Template::compile(source).is_err(), "engine accepted {:?}", source);
            assert!(
                extract_unified_schema(source, "t").is_err(),
                "extractor accepted {:?}",
                source
            );
        }
    }

    #[test]
    fn test_accepts_what_the_engine_accepts() {
        let valid = [
            "plain text",
            "{{a.b.c}} {{../up}}",
            "{{#each xs as |x|}}{{x}}{{else}}none{{/each}}",
            r#"{{join (lookup items 0) sep=", "}}"#,
        ];

        for source in valid {
            assert!(Template::compile(source).is_ok(), "engine rejected {:?}", source);
            assert!(
                extract_unified_schema(source, "t").is_ok(),
                "extractor rejected {:?}",
                source
            );
        }
    }

    #[test]
    fn test_error_carries_label() {
        let err = extract_unified_schema("line one\n{{foo.}}", "greet.hbs").unwrap_err();

        assert_eq!(err.label, "greet.hbs");
        assert_eq!(err.line, 2);
        assert!(!err.message.is_empty());
        assert!(err.to_string().starts_with("greet.hbs:2:"));
    }

    #[test]
    fn test_error_line_accounts_for_front_matter() {
        let err = extract_unified_schema("---\noutputs: []\n---\n\n{{foo.}}", "t").unwrap_err();
        assert_eq!(err.line, 5);
    }

    #[test]
    fn test_invalid_front_matter() {
        let err = extract_unified_schema("---\ninputs: [unclosed\n---\n{{x}}", "t").unwrap_err();
        assert!(err.message.starts_with("Invalid front matter"));
    }
}
