//! HTML-to-text cleanup for captured feed text.
//!
//! Tags are dropped, with `<a href>` anchors rewritten as OSC-8 terminal
//! hyperlinks around the anchor text. Named and numeric entities are
//! decoded, ASCII whitespace runs collapse to a single space, and control
//! characters other than TAB and LF are removed (both end up collapsed as
//! whitespace anyway).

use super::xml::find_attr;

const OSC8_PREFIX: &str = "\x1b]8;;";
const OSC8_ST: &str = "\x1b\\";

struct Cleaner {
    out: String,
    pending_space: bool,
    emitted: bool,
    link_open: bool,
}

impl Cleaner {
    fn new(capacity: usize) -> Self {
        Self {
            out: String::with_capacity(capacity),
            pending_space: false,
            emitted: false,
            link_open: false,
        }
    }

    fn push_char(&mut self, c: char) {
        if c.is_ascii_whitespace() {
            self.pending_space = true;
            return;
        }
        if c.is_control() && c != '\t' && c != '\n' {
            return;
        }
        self.flush_space();
        self.out.push(c);
        self.emitted = true;
    }

    fn flush_space(&mut self) {
        if self.pending_space && self.emitted {
            self.out.push(' ');
        }
        self.pending_space = false;
    }

    fn open_link(&mut self, href: &str) {
        if self.link_open {
            self.close_link();
        }
        self.flush_space();
        self.out.push_str(OSC8_PREFIX);
        self.out.push_str(href);
        self.out.push_str(OSC8_ST);
        self.link_open = true;
    }

    fn close_link(&mut self) {
        if self.link_open {
            self.out.push_str(OSC8_PREFIX);
            self.out.push_str(OSC8_ST);
            self.link_open = false;
        }
    }

    fn handle_tag(&mut self, tag: &str) {
        let tag = tag.trim();
        if let Some(name) = tag.strip_prefix('/') {
            if name.trim().eq_ignore_ascii_case("a") {
                self.close_link();
            }
            return;
        }
        let name_end = tag
            .find(|c: char| c.is_ascii_whitespace())
            .unwrap_or(tag.len());
        if tag[..name_end].eq_ignore_ascii_case("a") {
            if let Some(href) = find_attr(&tag[name_end..], "href") {
                self.open_link(&decode_entities(href));
            }
        }
    }

    fn finish(mut self) -> String {
        self.close_link();
        self.out
    }
}

/// Cleans a captured text value into display-ready plain text.
pub fn clean_html(input: &str) -> String {
    let mut cleaner = Cleaner::new(input.len());
    let mut rest = input;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('<') {
            match after.find('>') {
                Some(end) => {
                    let (tag, stripped) = after.split_at(end);
                    let tag = tag.strip_suffix('/').unwrap_or(tag);
                    cleaner.handle_tag(tag);
                    rest = &stripped[1..];
                }
                // A dangling '<' swallows the remainder.
                None => break,
            }
            continue;
        }
        if rest.starts_with('&') {
            let (decoded, consumed) = decode_one_entity(rest);
            match decoded {
                Some(c) => cleaner.push_char(c),
                None => cleaner.push_char('&'),
            }
            rest = &rest[consumed..];
            continue;
        }
        let mut chars = rest.char_indices();
        let (_, c) = chars.next().unwrap_or((0, ' '));
        cleaner.push_char(c);
        rest = &rest[c.len_utf8()..];
    }
    cleaner.finish()
}

/// Decodes every entity in a string (used for attribute values).
pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while !rest.is_empty() {
        if rest.starts_with('&') {
            let (decoded, consumed) = decode_one_entity(rest);
            match decoded {
                Some(c) => out.push(c),
                None => out.push('&'),
            }
            rest = &rest[consumed..];
        } else {
            let c = rest.chars().next().unwrap_or(' ');
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    out
}

const NAMED: [(&str, char); 15] = [
    ("&amp;", '&'),
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&quot;", '"'),
    ("&apos;", '\''),
    ("&nbsp;", '\u{a0}'),
    ("&rsquo;", '\u{2019}'),
    ("&lsquo;", '\u{2018}'),
    ("&rdquo;", '\u{201d}'),
    ("&ldquo;", '\u{201c}'),
    ("&hellip;", '\u{2026}'),
    ("&ndash;", '\u{2013}'),
    ("&mdash;", '\u{2014}'),
    ("&bull;", '\u{2022}'),
    ("&middot;", '\u{b7}'),
];

/// Decodes the entity at the head of `rest`. Returns the decoded char and
/// the bytes consumed; an unrecognized or invalid entity consumes just the
/// ampersand and is passed through literally.
fn decode_one_entity(rest: &str) -> (Option<char>, usize) {
    for (entity, c) in NAMED {
        if rest.starts_with(entity) {
            return (Some(c), entity.len());
        }
    }
    if let Some(body) = rest.strip_prefix("&#") {
        // Bounded lookahead: codepoints are at most 7 digits plus the hex marker.
        let bytes = body.as_bytes();
        let limit = bytes.len().min(9);
        if let Some(semi) = bytes[..limit].iter().position(|&b| b == b';') {
            let digits = &body[..semi];
            let value = if let Some(hex) = digits.strip_prefix(['x', 'X']) {
                u32::from_str_radix(hex, 16).ok()
            } else {
                digits.parse::<u32>().ok()
            };
            if let Some(c) = value.filter(|v| *v <= 0x0010_FFFF).and_then(char::from_u32) {
                return (Some(c), 2 + semi + 1);
            }
        }
    }
    (None, 1)
}
