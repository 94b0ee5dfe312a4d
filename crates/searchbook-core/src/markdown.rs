//! Default markdown renderer.

use pulldown_cmark::{Event, Options, Parser, html};

use crate::services::MarkdownRenderer;

/// CommonMark renderer backed by `pulldown-cmark`.
///
/// Raw HTML in the source is escaped and shown as text.
#[derive(Debug, Clone, Copy)]
pub struct CmarkRenderer {
    options: Options,
}

impl Default for CmarkRenderer {
    fn default() -> Self {
        Self {
            options: Options::ENABLE_TABLES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS,
        }
    }
}

impl MarkdownRenderer for CmarkRenderer {
    fn render(&self, text: &str) -> String {
        let parser = Parser::new_ext(text, self.options).map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });

        let mut rendered = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut rendered, parser);
        rendered
    }
}
