//! The plain-text rendering of a remote page's block content: headings,
//! list items, and inline links, reconstructed reciprocally on push.

use std::sync::OnceLock;

use regex::Regex;
use tablesync_remote::{InlineSpan, PageBlock};

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[([^\]]*)\]\(([^)]*)\)").unwrap())
}

fn spans_to_text(spans: &[InlineSpan]) -> String {
    spans
        .iter()
        .map(|span| match span {
            InlineSpan::Text(t) => t.clone(),
            InlineSpan::Link { text, url } => format!("[{text}]({url})"),
        })
        .collect()
}

fn text_to_spans(line: &str) -> Vec<InlineSpan> {
    let pattern = link_pattern();
    let mut spans = Vec::new();
    let mut last = 0;
    for caps in pattern.captures_iter(line) {
        let whole = caps.get(0).unwrap();
        if whole.start() > last {
            spans.push(InlineSpan::Text(line[last..whole.start()].to_string()));
        }
        spans.push(InlineSpan::Link {
            text: caps[1].to_string(),
            url: caps[2].to_string(),
        });
        last = whole.end();
    }
    if last < line.len() {
        spans.push(InlineSpan::Text(line[last..].to_string()));
    }
    if spans.is_empty() {
        spans.push(InlineSpan::Text(String::new()));
    }
    spans
}

pub fn blocks_to_body(blocks: &[PageBlock]) -> String {
    let mut lines = Vec::with_capacity(blocks.len());
    let mut numbered_seq = 0u32;
    for block in blocks {
        match block {
            PageBlock::Heading { level, text } => {
                numbered_seq = 0;
                let hashes = "#".repeat((*level).clamp(1, 6) as usize);
                lines.push(format!("{hashes} {text}"));
            }
            PageBlock::Paragraph { spans } => {
                numbered_seq = 0;
                lines.push(spans_to_text(spans));
            }
            PageBlock::BulletItem { spans } => {
                numbered_seq = 0;
                lines.push(format!("- {}", spans_to_text(spans)));
            }
            PageBlock::NumberedItem { spans } => {
                numbered_seq += 1;
                lines.push(format!("{numbered_seq}. {}", spans_to_text(spans)));
            }
        }
    }
    lines.join("\n")
}

pub fn body_to_blocks(body: &str) -> Vec<PageBlock> {
    let mut blocks = Vec::new();
    for raw_line in body.lines() {
        if raw_line.is_empty() {
            continue;
        }
        if let Some(rest) = raw_line.strip_prefix("- ") {
            blocks.push(PageBlock::BulletItem {
                spans: text_to_spans(rest),
            });
            continue;
        }
        if let Some((number, rest)) = raw_line.split_once(". ") {
            if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
                blocks.push(PageBlock::NumberedItem {
                    spans: text_to_spans(rest),
                });
                continue;
            }
        }
        let heading_level = raw_line.chars().take_while(|c| *c == '#').count();
        if heading_level > 0 && raw_line.as_bytes().get(heading_level) == Some(&b' ') {
            blocks.push(PageBlock::Heading {
                level: heading_level.min(6) as u8,
                text: raw_line[heading_level + 1..].to_string(),
            });
            continue;
        }
        blocks.push(PageBlock::Paragraph {
            spans: text_to_spans(raw_line),
        });
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_headings_and_paragraphs() {
        let blocks = vec![
            PageBlock::Heading {
                level: 2,
                text: "Overview".to_string(),
            },
            PageBlock::Paragraph {
                spans: vec![InlineSpan::Text("plain text".to_string())],
            },
        ];
        let body = blocks_to_body(&blocks);
        assert_eq!(body, "## Overview\nplain text");
        assert_eq!(body_to_blocks(&body), blocks);
    }

    #[test]
    fn round_trips_links_inside_bullets() {
        let blocks = vec![PageBlock::BulletItem {
            spans: vec![
                InlineSpan::Text("see ".to_string()),
                InlineSpan::Link {
                    text: "docs".to_string(),
                    url: "https://example.com".to_string(),
                },
            ],
        }];
        let body = blocks_to_body(&blocks);
        assert_eq!(body, "- see [docs](https://example.com)");
        assert_eq!(body_to_blocks(&body), blocks);
    }

    #[test]
    fn numbered_items_renumber_sequentially() {
        let blocks = vec![
            PageBlock::NumberedItem {
                spans: vec![InlineSpan::Text("first".to_string())],
            },
            PageBlock::NumberedItem {
                spans: vec![InlineSpan::Text("second".to_string())],
            },
        ];
        let body = blocks_to_body(&blocks);
        assert_eq!(body, "1. first\n2. second");
    }
}
