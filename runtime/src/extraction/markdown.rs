//! HTML to markdown conversion over the sanitized element tree.

use crate::extraction::sanitizer::SanitizerConfig;
use scraper::node::Node;
use scraper::{ElementRef, Html};

/// Markdown view of one fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub markdown: String,
    /// Characters in the raw HTML.
    pub raw_chars: usize,
    /// Characters in the extracted markdown.
    pub clean_chars: usize,
}

/// Sanitize `html` and render what is left as markdown.
pub fn extract_page(html: &str) -> ExtractedPage {
    let markdown = html_to_markdown(html, &SanitizerConfig::default());
    ExtractedPage {
        raw_chars: html.chars().count(),
        clean_chars: markdown.chars().count(),
        markdown,
    }
}

pub fn html_to_markdown(html: &str, sanitizer: &SanitizerConfig) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let document = Html::parse_document(html);
    let mut w = Writer::default();
    w.element(document.root_element(), sanitizer);
    w.finish()
}

#[derive(Default)]
struct Writer {
    out: String,
    /// Nesting of `ul`/`ol`; `Some(n)` is the next ordinal of an ordered list.
    lists: Vec<Option<usize>>,
}

impl Writer {
    fn element(&mut self, el: ElementRef<'_>, sanitizer: &SanitizerConfig) {
        if sanitizer.should_strip(el.value()) {
            return;
        }
        let name = el.value().name();
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                let text = collapse_whitespace(&el.text().collect::<String>());
                if !text.is_empty() {
                    self.block_break();
                    self.out.push_str(&"#".repeat(level));
                    self.out.push(' ');
                    self.out.push_str(&text);
                    self.block_break();
                }
            }
            "pre" => {
                let code: String = el.text().collect();
                let code = code.trim_matches('\n');
                if !code.trim().is_empty() {
                    self.block_break();
                    self.out.push_str("```\n");
                    self.out.push_str(code);
                    self.out.push_str("\n```");
                    self.block_break();
                }
            }
            "ul" | "ol" => {
                self.block_break();
                self.lists.push((name == "ol").then_some(1));
                self.children(el, sanitizer);
                self.lists.pop();
                self.block_break();
            }
            "li" => {
                self.line_break();
                let depth = self.lists.len().saturating_sub(1);
                self.out.push_str(&"  ".repeat(depth));
                match self.lists.last_mut() {
                    Some(Some(n)) => {
                        self.out.push_str(&format!("{n}. "));
                        *n += 1;
                    }
                    _ => self.out.push_str("- "),
                }
                self.children(el, sanitizer);
                self.line_break();
            }
            "br" => self.line_break(),
            "hr" => {
                self.block_break();
                self.out.push_str("---");
                self.block_break();
            }
            "code" => self.wrapped(el, sanitizer, "`"),
            "strong" | "b" => self.wrapped(el, sanitizer, "**"),
            "em" | "i" => self.wrapped(el, sanitizer, "*"),
            "a" => {
                let text = collapse_whitespace(&el.text().collect::<String>());
                let href = el.value().attr("href").unwrap_or_default().trim();
                if text.is_empty() {
                    return;
                }
                if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
                    self.text(&text);
                } else {
                    self.text(&format!("[{text}]({href})"));
                }
            }
            "img" => {
                if let Some(alt) = el.value().attr("alt").map(str::trim).filter(|a| !a.is_empty()) {
                    let src = el.value().attr("src").unwrap_or_default();
                    self.text(&format!("![{alt}]({src})"));
                }
            }
            "p" | "div" | "section" | "article" | "main" | "aside" | "blockquote" | "table"
            | "tr" | "figure" | "figcaption" | "dl" | "dt" | "dd" | "form" | "fieldset"
            | "address" | "details" | "summary" => {
                self.block_break();
                self.children(el, sanitizer);
                self.block_break();
            }
            "td" | "th" => {
                self.children(el, sanitizer);
                self.text(" ");
            }
            _ => self.children(el, sanitizer),
        }
    }

    fn children(&mut self, el: ElementRef<'_>, sanitizer: &SanitizerConfig) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => self.text(text),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.element(child_el, sanitizer);
                    }
                }
                _ => {}
            }
        }
    }

    fn wrapped(&mut self, el: ElementRef<'_>, sanitizer: &SanitizerConfig, marker: &str) {
        let text = collapse_whitespace(&el.text().collect::<String>());
        if text.is_empty() {
            return;
        }
        if el.children().any(|c| c.value().is_element()) {
            self.children(el, sanitizer);
        } else {
            self.text(&format!("{marker}{text}{marker}"));
        }
    }

    /// Inline text with whitespace runs collapsed.
    fn text(&mut self, raw: &str) {
        let starts_ws = raw.starts_with(char::is_whitespace);
        let ends_ws = raw.ends_with(char::is_whitespace);
        let body = collapse_whitespace(raw);

        if body.is_empty() {
            if !raw.is_empty() && !self.at_line_start() && !self.out.ends_with(' ') {
                self.out.push(' ');
            }
            return;
        }
        if starts_ws && !self.at_line_start() && !self.out.ends_with(' ') {
            self.out.push(' ');
        }
        self.out.push_str(&body);
        if ends_ws {
            self.out.push(' ');
        }
    }

    fn at_line_start(&self) -> bool {
        self.out.is_empty() || self.out.ends_with('\n')
    }

    fn trim_trailing_spaces(&mut self) {
        let keep = self.out.trim_end_matches(' ').len();
        self.out.truncate(keep);
    }

    fn line_break(&mut self) {
        self.trim_trailing_spaces();
        if !self.at_line_start() {
            self.out.push('\n');
        }
    }

    fn block_break(&mut self) {
        self.trim_trailing_spaces();
        if self.out.is_empty() || self.out.ends_with("\n\n") {
            return;
        }
        if self.out.ends_with('\n') {
            self.out.push('\n');
        } else {
            self.out.push_str("\n\n");
        }
    }

    fn finish(self) -> String {
        let lines: Vec<&str> = self.out.lines().map(str::trim_end).collect();
        let mut out = String::with_capacity(self.out.len());
        let mut blank_run = 0;
        for line in lines {
            if line.is_empty() {
                blank_run += 1;
                if blank_run > 1 {
                    continue;
                }
            } else {
                blank_run = 0;
            }
            out.push_str(line);
            out.push('\n');
        }
        out.trim().to_string()
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
