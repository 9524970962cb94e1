//! Markdown → sanitized HTML for the read-only view of a post.

use std::collections::HashSet;

use ammonia::Builder as AmmoniaBuilder;
use comrak::{Arena, Options, format_html, parse_document};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to render markdown: {message}")]
    Markdown { message: String },
}

pub struct MarkdownRenderer {
    options: Options<'static>,
    sanitizer: AmmoniaBuilder<'static>,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self {
            options: default_options(),
            sanitizer: build_sanitizer(),
        }
    }

    pub fn render(&self, markdown: &str) -> Result<String, RenderError> {
        let arena = Arena::new();
        let root = parse_document(&arena, markdown, &self.options);

        let mut html = String::new();
        format_html(root, &self.options, &mut html).map_err(|err| RenderError::Markdown {
            message: err.to_string(),
        })?;
        Ok(self.sanitizer.clean(&html).to_string())
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn default_options() -> Options<'static> {
    let mut options = Options::default();
    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;

    let render = &mut options.render;
    render.github_pre_lang = true;
    render.tasklist_classes = true;
    // Raw HTML passes through comrak; ammonia decides what survives.
    render.r#unsafe = true;
    options
}

fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();
    let tags: HashSet<&'static str> = HashSet::from([
        "a", "blockquote", "br", "code", "del", "div", "em", "h1", "h2", "h3", "h4", "h5", "h6",
        "hr", "img", "input", "li", "ol", "p", "pre", "section", "span", "strong", "sup", "table",
        "tbody", "td", "th", "thead", "tr", "ul",
    ]);
    builder.tags(tags);
    builder.add_generic_attributes(&["class", "id"]);
    builder.add_tag_attributes("img", &["alt", "title", "width", "height"]);
    builder.add_tag_attributes("th", &["align"]);
    builder.add_tag_attributes("td", &["align"]);
    builder.add_tag_attributes("input", &["type", "checked", "disabled"]);
    builder.add_tag_attributes("code", &["class"]);
    builder.add_tag_attributes("pre", &["lang"]);
    builder
}
