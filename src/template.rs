//! template.rs — Sustitución `{{token}}` sobre los fragmentos HTML de hover y detalle

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("regex de plantilla"));

const DETAIL_FALLBACK: &str =
    r#"<div class="detail"><h3>{{name}}</h3><p>{{lts_label}}</p><p>{{length_m}} m</p></div>"#;
const HOVER_FALLBACK: &str = r#"<span class="hover">{{emoji}} {{label}}</span>"#;

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn value_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => escape_html(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => escape_html(&other.to_string()),
    }
}

/// Una sola pasada; las claves ausentes quedan como cadena vacía
pub fn replace_template(template: &str, data: &Map<String, Value>) -> String {
    TOKEN
        .replace_all(template, |caps: &Captures| match data.get(&caps[1]) {
            Some(v) => value_text(v),
            None => {
                debug!("plantilla: sin valor para {{{{{}}}}}", &caps[1]);
                String::new()
            }
        })
        .into_owned()
}

#[derive(Clone, Debug)]
pub struct Template {
    pub name: &'static str,
    text: Option<String>,
    fallback: &'static str,
}

impl Template {
    pub fn new(name: &'static str, fallback: &'static str) -> Self {
        Self { name, text: None, fallback }
    }

    pub fn set_text(&mut self, text: String) {
        debug!("plantilla {}: {} bytes", self.name, text.len());
        self.text = Some(text);
    }

    pub fn is_ready(&self) -> bool {
        self.text.is_some()
    }

    /// Hasta que llegue el texto real se usa el fragmento por defecto
    pub fn render<T: Serialize>(&self, data: &T) -> String {
        let tpl = self.text.as_deref().unwrap_or(self.fallback);
        match serde_json::to_value(data) {
            Ok(Value::Object(map)) => replace_template(tpl, &map),
            _ => replace_template(tpl, &Map::new()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TemplateSet {
    pub detail: Template,
    pub hover: Template,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self {
            detail: Template::new("detail", DETAIL_FALLBACK),
            hover: Template::new("hover", HOVER_FALLBACK),
        }
    }
}

impl TemplateSet {
    pub fn ready(&self) -> bool {
        self.detail.is_ready() && self.hover.is_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn substitutes_known_tokens() {
        let out = replace_template("<b>{{label}}</b>", &obj(json!({ "label": "High Stress" })));
        assert_eq!(out, "<b>High Stress</b>");
    }

    #[test]
    fn missing_token_becomes_empty() {
        assert_eq!(replace_template("<b>{{label}}</b>", &Map::new()), "<b></b>");
        assert_eq!(replace_template("{{a}}-{{b}}", &obj(json!({ "a": 1, "b": null }))), "1-");
    }

    #[test]
    fn single_pass_and_escaped() {
        let data = obj(json!({ "name": "{{name}}", "x": "<i>A & B</i>" }));
        assert_eq!(replace_template("{{name}}", &data), "{{name}}");
        assert_eq!(replace_template("{{x}}", &data), "&lt;i&gt;A &amp; B&lt;/i&gt;");
    }

    #[test]
    fn fallback_until_text_loaded() {
        #[derive(Serialize)]
        struct V {
            emoji: &'static str,
            label: &'static str,
        }
        let mut t = Template::new("hover", HOVER_FALLBACK);
        let v = V { emoji: "😀", label: "LTS 1: low stress" };
        assert!(!t.is_ready());
        assert_eq!(t.render(&v), r#"<span class="hover">😀 LTS 1: low stress</span>"#);

        t.set_text("<p>{{label}}</p>".into());
        assert!(t.is_ready());
        assert_eq!(t.render(&v), "<p>LTS 1: low stress</p>");
    }

    #[test]
    fn set_ready_needs_both() {
        let mut s = TemplateSet::default();
        s.detail.set_text("x".into());
        assert!(!s.ready());
        s.hover.set_text("y".into());
        assert!(s.ready());
    }
}
