/// Template rendering for notes created by a sync.
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{|\}\}|\{([^{}\r\n]+)\}").unwrap());

pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, vars: &HashMap<String, String>) -> String;
}

/// `{key}` placeholders. Unknown keys are left as written; `{{` and `}}`
/// produce literal braces.
#[derive(Debug, Default, Clone, Copy)]
pub struct BraceTemplate;

impl TemplateRenderer for BraceTemplate {
    fn render(&self, template: &str, vars: &HashMap<String, String>) -> String {
        PLACEHOLDER_RE
            .replace_all(template, |caps: &Captures| match caps.get(1) {
                Some(key) => match vars.get(key.as_str()) {
                    Some(value) => value.clone(),
                    None => caps[0].to_string(),
                },
                None if &caps[0] == "{{" => "{".to_string(),
                None => "}".to_string(),
            })
            .into_owned()
    }
}
