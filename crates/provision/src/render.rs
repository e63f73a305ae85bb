//! Configuration renderer.
//!
//! Templates are plain text with `{{ name }}` placeholders. Rendering is a
//! pure function of template and context: the whole template is checked for
//! missing variables first, so a failed render produces no output at all.

use crate::error::RenderError;
use crate::types::RenderContext;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
});

const BUILTIN_WP_CONFIG: &str = include_str!("../templates/wp-config.php.tmpl");

/// A configuration template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    source: String,
}

impl Template {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// The bundled WordPress `wp-config.php` template
    pub fn builtin() -> Self {
        Self::new("builtin:wp-config.php", BUILTIN_WP_CONFIG)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Referenced variable names, in order of first appearance
    pub fn references(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for caps in PLACEHOLDER.captures_iter(&self.source) {
            let name = &caps[1];
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Render against a complete context
    pub fn render(&self, ctx: &RenderContext) -> Result<Vec<u8>, RenderError> {
        if let Some(missing) = self
            .references()
            .into_iter()
            .find(|name| !ctx.is_resolved(name))
        {
            return Err(RenderError::MissingVariable(missing));
        }

        let rendered = PLACEHOLDER.replace_all(&self.source, |caps: &Captures<'_>| {
            ctx.get(&caps[1]).unwrap_or_default().to_string()
        });
        Ok(rendered.into_owned().into_bytes())
    }
}
