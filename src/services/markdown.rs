//! Markdown rendering
//!
//! Converts blog posts and newsletter bodies to HTML with pulldown-cmark.
//! Raw HTML in the source is escaped rather than passed through.
//!
//! ```
//! use devstudio::services::markdown::MarkdownRenderer;
//!
//! let html = MarkdownRenderer::new().render("# Hello\n\nThis is **bold**.");
//! assert!(html.contains("<h1>Hello</h1>"));
//! assert!(html.contains("<strong>bold</strong>"));
//! ```

use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self
    }

    fn options() -> Options {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
        options
    }

    pub fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, Self::options());
        let events = self.process_events(parser);

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());
        html_output
    }

    /// Plain-text summary of the first paragraphs, cut at a word boundary
    pub fn excerpt(&self, markdown: &str, max_chars: usize) -> String {
        let mut text = String::new();
        for event in Parser::new_ext(markdown, Self::options()) {
            match event {
                Event::Text(t) | Event::Code(t) => text.push_str(&t),
                Event::SoftBreak | Event::HardBreak | Event::End(TagEnd::Paragraph) => {
                    text.push(' ')
                }
                Event::End(TagEnd::Heading(_)) => text.push(' '),
                _ => {}
            }
            if text.chars().count() > max_chars {
                break;
            }
        }

        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.chars().count() <= max_chars {
            return text;
        }

        let cut: String = text.chars().take(max_chars).collect();
        let cut = match cut.rfind(' ') {
            Some(idx) if idx > 0 => &cut[..idx],
            _ => cut.as_str(),
        };
        format!("{}…", cut.trim_end())
    }

    /// Code blocks get a `language-*` class; raw HTML becomes text.
    fn process_events<'a>(&self, parser: Parser<'a>) -> Vec<Event<'a>> {
        let mut events = Vec::new();
        let mut in_code_block = false;
        let mut code_lang: Option<String> = None;
        let mut code_content = String::new();

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    code_content.clear();
                    code_lang = match kind {
                        CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                        _ => None,
                    };
                }
                Event::End(TagEnd::CodeBlock) => {
                    in_code_block = false;
                    let block = match code_lang.take() {
                        Some(lang) => format!(
                            "<pre><code class=\"language-{}\">{}</code></pre>\n",
                            html_escape(&lang),
                            html_escape(&code_content)
                        ),
                        None => format!("<pre><code>{}</code></pre>\n", html_escape(&code_content)),
                    };
                    events.push(Event::Html(block.into()));
                }
                Event::Text(text) if in_code_block => code_content.push_str(&text),
                Event::Html(raw) | Event::InlineHtml(raw) => events.push(Event::Text(raw)),
                _ => events.push(event),
            }
        }

        events
    }
}

pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basics() {
        let html = MarkdownRenderer::new().render("## Title\n\n- one\n- two\n\n[link](https://example.com)");
        assert!(html.contains("<h2>Title</h2>"));
        assert!(html.contains("<li>one</li>"));
        assert!(html.contains("<a href=\"https://example.com\">link</a>"));
    }

    #[test]
    fn test_code_block_language_class() {
        let html = MarkdownRenderer::new().render("```rust\nfn main() {}\n```");
        assert!(html.contains("<code class=\"language-rust\">fn main() {}"));
    }

    #[test]
    fn test_code_block_escapes_content() {
        let html = MarkdownRenderer::new().render("```\n<b>&</b>\n```");
        assert!(html.contains("&lt;b&gt;&amp;&lt;/b&gt;"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = MarkdownRenderer::new().render("hello <script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_table() {
        let html = MarkdownRenderer::new().render("| a | b |\n|---|---|\n| 1 | 2 |");
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_excerpt_short_text_unchanged() {
        let renderer = MarkdownRenderer::new();
        assert_eq!(renderer.excerpt("# Hi\n\nShort **text**.", 100), "Hi Short text.");
    }

    #[test]
    fn test_excerpt_cuts_at_word_boundary() {
        let renderer = MarkdownRenderer::new();
        let excerpt = renderer.excerpt("alpha beta gamma delta epsilon", 14);
        assert_eq!(excerpt, "alpha beta…");
    }
}
