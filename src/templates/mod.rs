//! Template engine
//!
//! HTML views render through Tera. Templates are embedded into the binary
//! from the `templates/` directory, base templates are loaded first so the
//! inheritance chains resolve, and a `url(name=..., ...)` function reverses
//! named routes from inside templates.

use rust_embed::RustEmbed;
use std::collections::HashMap;
use std::error::Error as StdError;
use tera::{Context as TeraContext, Tera, Value};

use crate::urls;

mod error;

pub use error::TemplateError;

/// Template rendered when a view fails
pub const ERROR_TEMPLATE: &str = "polls/error.html";

/// Embedded HTML templates
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct TemplateAssets;

/// Tera engine over the embedded templates
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Load every embedded template
    pub fn new() -> Result<Self, TemplateError> {
        let mut templates = Vec::new();
        for name in TemplateAssets::iter() {
            let file = TemplateAssets::get(&name)
                .ok_or_else(|| TemplateError::NotFound(name.to_string()))?;
            let content = String::from_utf8(file.data.into_owned())
                .map_err(|_| TemplateError::Encoding(name.to_string()))?;
            templates.push((name.to_string(), content));
        }
        Self::from_templates(templates)
    }

    /// Build an engine from `(name, source)` pairs
    pub fn from_templates<I>(templates: I) -> Result<Self, TemplateError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut templates: Vec<(String, String)> = templates.into_iter().collect();

        // Base templates first so children can extend them
        templates.sort_by(|a, b| is_base(&b.0).cmp(&is_base(&a.0)).then(a.0.cmp(&b.0)));

        let mut tera = Tera::default();
        for (name, content) in &templates {
            tera.add_raw_template(name, content).map_err(|e| {
                TemplateError::Render(format!("Failed to add template {}: {}", name, e))
            })?;
        }
        tera.build_inheritance_chains().map_err(|e| {
            TemplateError::Render(format!("Failed to build template inheritance: {}", e))
        })?;
        tera.register_function("url", UrlFunction);

        tracing::debug!("Loaded {} templates", templates.len());
        Ok(Self { tera })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|t| t == name)
    }

    /// Render a template, reporting the whole tera error chain on failure
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String, TemplateError> {
        self.tera.render(template, context).map_err(|e| {
            let mut error_msg = format!("Failed to render '{}': {}", template, e);
            let mut source = e.source();
            while let Some(s) = source {
                error_msg.push_str(&format!("\n  Caused by: {}", s));
                source = s.source();
            }
            TemplateError::Render(error_msg)
        })
    }

    /// Error page for `status`, rendered through the error template
    pub fn error_page(&self, site_title: &str, status: u16, message: &str) -> String {
        let mut context = TeraContext::new();
        context.insert("site_title", site_title);
        context.insert("status", &status);
        context.insert("error_message", message);
        context.insert("flash_messages", &Vec::<()>::new());

        match self.render(ERROR_TEMPLATE, &context) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Failed to render error template: {}", e);
                simple_error_page(status, message)
            }
        }
    }
}

fn is_base(name: &str) -> bool {
    name == "base.html" || name.ends_with("/base.html")
}

/// `url(name="yearly_archive", year=2024)`
///
/// Output is marked safe: reversed paths are already percent-encoded.
struct UrlFunction;

impl tera::Function for UrlFunction {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let name = args
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| tera::Error::msg("url() needs a string `name` argument"))?;

        let rendered: Vec<(&str, String)> = args
            .iter()
            .filter(|(key, _)| key.as_str() != "name")
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.as_str(), value)
            })
            .collect();
        let borrowed: Vec<(&str, &str)> =
            rendered.iter().map(|(k, v)| (*k, v.as_str())).collect();

        urls::reverse(name, &borrowed)
            .map(Value::String)
            .map_err(|e| tera::Error::msg(e.to_string()))
    }

    fn is_safe(&self) -> bool {
        true
    }
}

/// Last-resort error page when no template can be rendered
fn simple_error_page(status: u16, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Error {status}</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            max-width: 600px;
            margin: 50px auto;
            padding: 20px;
        }}
        h1 {{ color: #e74c3c; }}
    </style>
</head>
<body>
    <h1>Error {status}</h1>
    <p>{message}</p>
</body>
</html>"#,
        status = status,
        message = tera::escape_html(message)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(extra: &[(&str, &str)]) -> TemplateEngine {
        let mut templates = vec![
            (
                "polls/base.html".to_string(),
                "<title>{% block title %}{{ site_title }}{% endblock %}</title>{% block content %}{% endblock %}"
                    .to_string(),
            ),
            (
                ERROR_TEMPLATE.to_string(),
                r#"{% extends "polls/base.html" %}{% block content %}E{{ status }}: {{ error_message }}{% endblock %}"#
                    .to_string(),
            ),
        ];
        templates.extend(extra.iter().map(|(n, c)| (n.to_string(), c.to_string())));
        TemplateEngine::from_templates(templates).unwrap()
    }

    #[test]
    fn test_embedded_templates_load() {
        let engine = TemplateEngine::new().unwrap();
        for name in [
            "polls/base.html",
            "polls/home.html",
            "polls/about.html",
            "polls/log_message.html",
            "polls/message_list.html",
            "polls/yearly_archive.html",
            "polls/monthly_archive.html",
            "polls/now.html",
            "polls/contact.html",
            "polls/search.html",
            "polls/post_detail.html",
            ERROR_TEMPLATE,
        ] {
            assert!(engine.has_template(name), "missing {}", name);
        }
    }

    #[test]
    fn test_child_extends_base_regardless_of_order() {
        let engine = engine(&[(
            "polls/a_child.html",
            r#"{% extends "polls/base.html" %}{% block content %}hi {{ who }}{% endblock %}"#,
        )]);
        let mut context = TeraContext::new();
        context.insert("site_title", "Polls");
        context.insert("who", "<b>you</b>");

        let html = engine.render("polls/a_child.html", &context).unwrap();
        assert_eq!(html, "<title>Polls</title>hi &lt;b&gt;you&lt;&#x2F;b&gt;");
    }

    #[test]
    fn test_url_function() {
        let engine = engine(&[(
            "polls/links.html",
            r#"{{ url(name="home") }}|{{ url(name="yearly_archive", year=999) }}|{{ url(name="monthly_archive", year=2024, month=2) }}"#,
        )]);
        let html = engine.render("polls/links.html", &TeraContext::new()).unwrap();
        assert_eq!(html, "/|/archive/0999/|/archive/2024/2/");
    }

    #[test]
    fn test_render_error_reports_template() {
        let engine = engine(&[("polls/broken.html", r#"{{ url(name="nowhere") }}"#)]);
        let err = engine.render("polls/broken.html", &TeraContext::new()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("polls/broken.html"));
        assert!(message.contains("nowhere"));
    }

    #[test]
    fn test_simple_error_page_escapes_message() {
        let html = simple_error_page(404, "<script>");
        assert!(html.contains("Error 404"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_error_page() {
        let engine = engine(&[]);
        let html = engine.error_page("Polls", 404, "No messages");
        assert!(html.contains("E404: No messages"));
    }
}
