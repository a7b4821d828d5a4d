//! Minimal pull tokenizer for feed XML.
//!
//! Tolerates the realities of feed bodies: comments, CDATA, processing
//! instructions, doctype noise, and truncation at an arbitrary byte. A
//! truncated construct ends the event stream instead of erroring, which is
//! what lets size-capped downloads parse cleanly.

#[derive(Debug)]
pub enum XmlEvent<'a> {
    Start(Tag<'a>),
    End(&'a str),
    Text(&'a str),
    CData(&'a str),
}

#[derive(Debug)]
pub struct Tag<'a> {
    pub name: &'a str,
    attrs: &'a str,
    pub self_closing: bool,
}

impl<'a> Tag<'a> {
    pub fn attr(&self, want: &str) -> Option<&'a str> {
        find_attr(self.attrs, want)
    }
}

/// Scans `name="value"` pairs, attribute names compared case-insensitively.
/// Accepts single or double quotes and bare unquoted values.
pub fn find_attr<'a>(attrs: &'a str, want: &str) -> Option<&'a str> {
    let mut rest = attrs;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return None;
        }
        let eq = rest.find('=')?;
        let name = rest[..eq].trim();
        let after = rest[eq + 1..].trim_start();
        let (value, next) = match after.as_bytes().first() {
            Some(&q) if q == b'"' || q == b'\'' => {
                let body = &after[1..];
                match body.find(q as char) {
                    Some(i) => (&body[..i], &body[i + 1..]),
                    None => (body, ""),
                }
            }
            _ => {
                let end = after
                    .find(|c: char| c.is_ascii_whitespace())
                    .unwrap_or(after.len());
                (&after[..end], &after[end..])
            }
        };
        if name.eq_ignore_ascii_case(want) {
            return Some(value);
        }
        rest = next;
    }
}

pub struct XmlReader<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> XmlReader<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    pub fn next_event(&mut self) -> Option<XmlEvent<'a>> {
        loop {
            let rest = &self.input[self.pos..];
            if rest.is_empty() {
                return None;
            }
            if !rest.starts_with('<') {
                let end = rest.find('<').unwrap_or(rest.len());
                let text = &rest[..end];
                self.pos += end;
                return Some(XmlEvent::Text(text));
            }
            if let Some(after) = rest.strip_prefix("<!--") {
                match after.find("-->") {
                    Some(i) => {
                        self.pos += 4 + i + 3;
                        continue;
                    }
                    None => {
                        self.pos = self.input.len();
                        return None;
                    }
                }
            }
            if let Some(after) = rest.strip_prefix("<![CDATA[") {
                match after.find("]]>") {
                    Some(i) => {
                        let text = &after[..i];
                        self.pos += 9 + i + 3;
                        return Some(XmlEvent::CData(text));
                    }
                    None => {
                        self.pos = self.input.len();
                        return None;
                    }
                }
            }
            if rest.starts_with("<?") || rest.starts_with("<!") {
                match rest.find('>') {
                    Some(i) => {
                        self.pos += i + 1;
                        continue;
                    }
                    None => {
                        self.pos = self.input.len();
                        return None;
                    }
                }
            }
            if let Some(after) = rest.strip_prefix("</") {
                match after.find('>') {
                    Some(i) => {
                        let name = after[..i].trim();
                        self.pos += 2 + i + 1;
                        return Some(XmlEvent::End(name));
                    }
                    None => {
                        self.pos = self.input.len();
                        return None;
                    }
                }
            }
            // Start tag: find the closing '>' outside quoted attribute values.
            let bytes = rest.as_bytes();
            let mut i = 1;
            let mut quote: Option<u8> = None;
            while i < bytes.len() {
                let b = bytes[i];
                match quote {
                    Some(q) => {
                        if b == q {
                            quote = None;
                        }
                    }
                    None => match b {
                        b'"' | b'\'' => quote = Some(b),
                        b'>' => break,
                        _ => {}
                    },
                }
                i += 1;
            }
            if i >= bytes.len() {
                // Truncated mid-tag.
                self.pos = self.input.len();
                return None;
            }
            let inner = &rest[1..i];
            let (inner, self_closing) = match inner.strip_suffix('/') {
                Some(stripped) => (stripped, true),
                None => (inner, false),
            };
            let name_end = inner
                .find(|c: char| c.is_ascii_whitespace())
                .unwrap_or(inner.len());
            let name = &inner[..name_end];
            let attrs = inner[name_end..].trim_start();
            self.pos += i + 1;
            return Some(XmlEvent::Start(Tag {
                name,
                attrs,
                self_closing,
            }));
        }
    }
}
