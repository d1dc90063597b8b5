//! Certificate rendering.
//!
//! Rendering is a capability behind the [`Renderer`] trait: take template
//! markup plus a variable map and return PDF bytes. The shipped backend
//! ([`pdf::GenpdfRenderer`]) lays the markup out with genpdf; tests use
//! lightweight fakes.

pub mod markup;
pub mod pdf;

use common::model::template::TemplateType;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;

pub type Variables = BTreeMap<String, String>;

/// `{{ name }}` with optional inner whitespace.
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid regex"));

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(String),
    #[error("font error: {0}")]
    Font(String),
    #[error("image error: {0}")]
    Image(String),
    #[error("pdf error: {0}")]
    Pdf(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("renderer panicked: {0}")]
    Panicked(String),
}

pub trait Renderer: Send + Sync {
    fn render(&self, kind: TemplateType, markup: &str, variables: &Variables) -> Result<Vec<u8>, RenderError>;
}

/// Replaces every placeholder with its value. Unknown names become empty.
pub fn substitute(markup: &str, variables: &Variables) -> String {
    PLACEHOLDER_RE
        .replace_all(markup, |caps: &Captures| {
            variables.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Placeholder names in order of first appearance, without duplicates.
pub fn extract_variables(markup: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(markup) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_and_blanks_unknown() {
        let mut vars = Variables::new();
        vars.insert("participant_name".into(), "Иван Петров".into());
        let out = substitute("<h1>{{participant_name}}</h1><p>{{ role }}</p>", &vars);
        assert_eq!(out, "<h1>Иван Петров</h1><p></p>");
    }

    #[test]
    fn extracts_unique_names_in_order() {
        let names = extract_variables("{{ b }} {{a}} {{b}} {not} {{ 1x }}");
        assert_eq!(names, vec!["b".to_string(), "a".to_string()]);
    }
}
