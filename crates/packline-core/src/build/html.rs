//! HTML document generation.

use crate::resolver::HtmlInject;

/// Public URLs of the files the document must load, in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlTags {
    pub scripts: Vec<String>,
    pub styles: Vec<String>,
}

impl HtmlTags {
    fn render(&self) -> String {
        let mut out = String::new();
        for href in &self.styles {
            out.push_str(&format!("  <link href=\"{}\" rel=\"stylesheet\">\n", escape_attr(href)));
        }
        for src in &self.scripts {
            out.push_str(&format!("  <script defer src=\"{}\"></script>\n", escape_attr(src)));
        }
        out
    }
}

/// Generate a minimal document when the project has no template.
fn generate_index_html(title: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{title}</title>
</head>
<body>
  <div id="root"></div>
</body>
</html>
"#,
        title = escape_text(title)
    )
}

/// Render `template` (or a generated document) with `tags` injected before
/// `</head>` or `</body>`. Tags are appended when the marker is missing.
#[must_use]
pub fn render_document(template: Option<&str>, title: &str, tags: &HtmlTags, inject: HtmlInject) -> String {
    let document = match template {
        Some(t) => t.to_string(),
        None => generate_index_html(title),
    };
    let marker = match inject {
        HtmlInject::Head => "</head>",
        HtmlInject::Body => "</body>",
    };

    let rendered = tags.render();
    match find_ascii_case_insensitive(&document, marker) {
        Some(pos) => {
            let mut out = String::with_capacity(document.len() + rendered.len());
            out.push_str(&document[..pos]);
            out.push_str(&rendered);
            out.push_str(&document[pos..]);
            out
        }
        None => document + rendered.as_str(),
    }
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
