//! Template helper registry
//!
//! Helpers are plain functions over their evaluated parameters. The registry
//! holds an immutable map behind an `Arc`; registration clones the map,
//! modifies the copy and swaps it in, so a render that took a snapshot keeps
//! a consistent helper set even while helpers are being reloaded.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use handlebars::{
    Context, Handlebars, Helper, HelperDef, RenderContext, RenderError as HandlebarsError,
    ScopedJson,
};
use serde_json::Value;

use crate::domain::schema::{is_builtin, HelperCatalog};
use crate::domain::DomainError;

/// A helper: evaluated positional parameters in, JSON value out
pub type HelperFn = fn(&[Value]) -> Value;

/// Name to function map with copy-on-write updates
#[derive(Debug, Default)]
pub struct HelperRegistry {
    helpers: RwLock<Arc<BTreeMap<String, HelperFn>>>,
}

impl HelperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the default formatting helpers
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.replace_all(default_helpers());
        registry
    }

    /// Add or replace one helper
    pub fn register(&self, name: impl Into<String>, helper: HelperFn) -> Result<(), DomainError> {
        let name = name.into();
        if is_builtin(&name) {
            return Err(DomainError::validation(format!(
                "Helper '{}' is built in and cannot be replaced",
                name
            )));
        }

        let mut guard = self.helpers.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = BTreeMap::clone(&guard);
        next.insert(name, helper);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Swap in a whole new helper set
    pub fn replace_all(&self, helpers: BTreeMap<String, HelperFn>) {
        let mut guard = self.helpers.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(helpers);
    }

    /// The current helper set; unaffected by later registrations
    pub fn snapshot(&self) -> Arc<BTreeMap<String, HelperFn>> {
        let guard = self.helpers.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn names(&self) -> Vec<String> {
        self.snapshot().keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.snapshot().contains_key(name)
    }

    /// Register the snapshot's helpers on a handlebars registry
    pub fn install(&self, handlebars: &mut Handlebars<'_>) {
        for (name, helper) in self.snapshot().iter() {
            handlebars.register_helper(name, Box::new(FnHelper(*helper)));
        }
    }
}

impl HelperCatalog for HelperRegistry {
    fn helper_names(&self) -> Vec<String> {
        self.names()
    }
}

/// Adapts a `HelperFn` to the handlebars helper interface
struct FnHelper(HelperFn);

impl HelperDef for FnHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, HandlebarsError> {
        let params: Vec<Value> = h.params().iter().map(|p| p.value().clone()).collect();
        Ok(ScopedJson::Derived((self.0)(&params)))
    }
}

fn first_str(params: &[Value]) -> String {
    match params.first() {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn uppercase(params: &[Value]) -> Value {
    Value::String(first_str(params).to_uppercase())
}

fn lowercase(params: &[Value]) -> Value {
    Value::String(first_str(params).to_lowercase())
}

fn json(params: &[Value]) -> Value {
    let value = params.first().cloned().unwrap_or(Value::Null);
    Value::String(serde_json::to_string(&value).unwrap_or_default())
}

fn slugify(params: &[Value]) -> Value {
    let slug: String = first_str(params)
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    Value::String(slug)
}

/// First parameter that is neither null nor an empty string
fn default(params: &[Value]) -> Value {
    params
        .iter()
        .find(|v| !v.is_null() && v.as_str() != Some(""))
        .cloned()
        .unwrap_or(Value::Null)
}

fn join(params: &[Value]) -> Value {
    let separator = params.get(1).and_then(Value::as_str).unwrap_or(", ");
    let items = params
        .first()
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(separator)
        })
        .unwrap_or_default();
    Value::String(items)
}

pub fn default_helpers() -> BTreeMap<String, HelperFn> {
    let helpers: [(&str, HelperFn); 6] = [
        ("uppercase", uppercase),
        ("lowercase", lowercase),
        ("json", json),
        ("slugify", slugify),
        ("default", default),
        ("join", join),
    ];
    helpers
        .into_iter()
        .map(|(name, helper)| (name.to_string(), helper))
        .collect()
}
