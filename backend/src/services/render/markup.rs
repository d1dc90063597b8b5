//! Reduces HTML/SVG certificate markup to a flat list of layout blocks.
//!
//! The reduction is shallow: it keeps headings, paragraphs with bold and
//! italic runs, list items, inline `data:` images and explicit breaks, and
//! drops everything else. Paragraph text keeps `<b>`/`<i>` tags so the PDF
//! layer can style the runs.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::Regex;
use std::sync::LazyLock;

static INVISIBLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!--.*?-->|<!doctype[^>]*>|<\?xml.*?\?>|<style\b.*?</style\s*>|<script\b.*?</script\s*>|<head\b.*?</head\s*>|<title\b.*?</title\s*>")
        .expect("valid regex")
});
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9:-]*)([^>]*)>").expect("valid regex"));
static DATA_URI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:src|href)\s*=\s*["']data:[^;,"']+;base64,([^"']+)["']"#).expect("valid regex")
});
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading(String),
    Paragraph(String),
    ListItem(String),
    Image(Vec<u8>),
    Break,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Paragraph,
    Heading,
    ListItem,
}

struct Builder {
    blocks: Vec<Block>,
    buf: String,
    kind: Kind,
}

impl Builder {
    fn text(&mut self, raw: &str) {
        let decoded = decode_entities(raw);
        let collapsed = WS_RE.replace_all(&decoded, " ");
        self.buf.push_str(&collapsed);
    }

    fn flush(&mut self) {
        let text = self.buf.trim();
        if !strip_style_tags(text).trim().is_empty() {
            let text = text.to_string();
            self.blocks.push(match self.kind {
                Kind::Paragraph => Block::Paragraph(text),
                Kind::Heading => Block::Heading(strip_style_tags(&text)),
                Kind::ListItem => Block::ListItem(text),
            });
        }
        self.buf.clear();
    }

    fn switch(&mut self, kind: Kind) {
        self.flush();
        self.kind = kind;
    }
}

fn is_block_tag(name: &str) -> bool {
    matches!(
        name,
        "p" | "div" | "section" | "article" | "header" | "footer" | "main" | "body"
            | "table" | "tr" | "ul" | "ol" | "blockquote" | "center" | "text" | "tspan" | "g"
    )
}

pub fn markup_to_blocks(markup: &str) -> Vec<Block> {
    let visible = INVISIBLE_RE.replace_all(markup, "");
    let mut b = Builder {
        blocks: Vec::new(),
        buf: String::new(),
        kind: Kind::Paragraph,
    };

    let mut last = 0;
    for caps in TAG_RE.captures_iter(&visible) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        b.text(&visible[last..whole.start]);
        last = whole.end;

        let closing = &caps[1] == "/";
        let name = caps[2].to_ascii_lowercase();
        let attrs = &caps[3];

        match name.as_str() {
            "b" | "strong" => b.buf.push_str(if closing { "</b>" } else { "<b>" }),
            "i" | "em" => b.buf.push_str(if closing { "</i>" } else { "<i>" }),
            "br" => {
                b.flush();
                b.blocks.push(Block::Break);
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                b.switch(if closing { Kind::Paragraph } else { Kind::Heading })
            }
            "li" => b.switch(if closing { Kind::Paragraph } else { Kind::ListItem }),
            "img" | "image" => {
                b.flush();
                match DATA_URI_RE.captures(attrs) {
                    Some(img) => match BASE64.decode(img[1].trim()) {
                        Ok(bytes) => b.blocks.push(Block::Image(bytes)),
                        Err(e) => log::warn!("skipping image with invalid base64: {}", e),
                    },
                    None => log::debug!("skipping non-inline image: {}", attrs.trim()),
                }
            }
            n if is_block_tag(n) => b.flush(),
            _ => {}
        }
    }
    b.text(&visible[last..]);
    b.flush();
    b.blocks
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&laquo;", "«")
        .replace("&raquo;", "»")
        .replace("&mdash;", "—")
        .replace("&amp;", "&")
}

pub(crate) fn strip_style_tags(s: &str) -> String {
    s.replace("<b>", "")
        .replace("</b>", "")
        .replace("<i>", "")
        .replace("</i>", "")
}
