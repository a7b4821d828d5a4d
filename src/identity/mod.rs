//! Canonicalizes article identifiers (guid or link) into a stable form and
//! hashes them for the seen store.
//!
//! Two spellings of the same article must land on the same 64-bit hash, so
//! hosts are lowercased, `http` is folded into `https`, trailing slashes and
//! fragments are dropped, and tracking queries are removed before hashing.

/// Fixed seed for [`hash64`]. Changing the seed or the mixing function
/// invalidates existing `seen_ids.bin` files.
const HASH_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Query prefixes that mark the whole query string as tracking noise.
const TRACKING_PREFIXES: [&str; 3] = ["utm_", "fbclid=", "ref="];

/// Canonicalizes a raw identifier. Never fails: inputs that do not look like
/// an http(s) URI are treated as opaque GUIDs and lowercased whole.
pub fn normalize(raw: &str) -> String {
    decode_basic_entities(&normalize_uri(raw))
}

/// Convenience for the dedup layer: normalize then hash.
pub fn item_hash(key: &str) -> u64 {
    hash64(&normalize(key))
}

fn normalize_uri(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let scheme_len = if bytes.len() >= 8 && bytes[..8].eq_ignore_ascii_case(b"https://") {
        8
    } else if bytes.len() >= 7 && bytes[..7].eq_ignore_ascii_case(b"http://") {
        7
    } else {
        return raw.to_ascii_lowercase();
    };

    let rest = &raw[scheme_len..];
    let split = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(split);
    if authority.is_empty() {
        // Unparsable URI: https:// plus the lowercased raw input.
        return format!("https://{}", raw.to_ascii_lowercase());
    }

    let tail = match tail.find('#') {
        Some(i) => &tail[..i],
        None => tail,
    };
    let (mut path, query) = match tail.find('?') {
        Some(i) => (&tail[..i], Some(&tail[i + 1..])),
        None => (tail, None),
    };
    while path.len() > 1 && path.ends_with('/') {
        path = &path[..path.len() - 1];
    }
    let query = query.filter(|q| !TRACKING_PREFIXES.iter().any(|p| q.starts_with(p)));

    let mut out = String::with_capacity(raw.len() + 1);
    out.push_str("https://");
    out.push_str(&authority.to_ascii_lowercase());
    out.push_str(path);
    if let Some(q) = query {
        out.push('?');
        out.push_str(q);
    }
    out
}

/// Decodes the five basic named entities anywhere in `input`.
fn decode_basic_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let mut matched = false;
        for (entity, ch) in [
            ("&amp;", '&'),
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
            ("&apos;", '\''),
        ] {
            if rest.starts_with(entity) {
                out.push(ch);
                rest = &rest[entity.len()..];
                matched = true;
                break;
            }
        }
        if !matched {
            out.push('&');
            rest = &rest[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Seeded 64-bit mixer over the key bytes. Deterministic across platforms
/// and versions; not cryptographic.
pub fn hash64(key: &str) -> u64 {
    let data = key.as_bytes();
    let mut h = HASH_SEED ^ (data.len() as u64).wrapping_mul(0x517c_c1b7_2722_0a95);
    for &byte in data {
        h ^= (byte as u64).wrapping_mul(0x0100_0000_01b3);
        h = h.rotate_left(13).wrapping_mul(0xff51_afd7_ed55_8ccd);
    }
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^ (h >> 29)
}
