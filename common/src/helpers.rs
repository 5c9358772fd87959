//! Text utilities shared by the mapper and the populator.
//!
//! - **Index conversion** between Rust's UTF-8 byte indices and the UTF-16 code
//!   unit offsets browsers report for selections.
//! - **HTML escaping** of text and attribute values, plus decoding of the
//!   entities an editing surface commonly emits.

/// Converts a UTF-8 byte index to its corresponding UTF-16 code unit index.
///
/// Used when the mapper reports a position back to the rendering layer, e.g.
/// the caret position right after a freshly inserted marker.
pub fn byte_to_utf16_idx(s: &str, byte_idx: usize) -> usize {
    let byte_idx = floor_char_boundary(s, byte_idx);
    s[..byte_idx].encode_utf16().count()
}

/// Converts a UTF-16 code unit index to its corresponding UTF-8 byte index.
///
/// Offsets past the end clamp to `s.len()`; an offset in the middle of a
/// surrogate pair rounds up to the end of that character.
pub fn utf16_to_byte_idx(s: &str, utf16_idx: usize) -> usize {
    let mut units = 0usize;
    for (byte_idx, ch) in s.char_indices() {
        if units >= utf16_idx {
            return byte_idx;
        }
        units += ch.len_utf16();
    }
    s.len()
}

/// Largest char boundary `<= idx`, clamped to the string length.
pub fn floor_char_boundary(s: &str, idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    let mut idx = idx;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Escapes special HTML characters in a string.
///
/// Applied to every value the populator substitutes and to the text and
/// attributes the mapper serializes, so content can never turn into markup.
pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Decodes the named and numeric entities an editing surface produces.
///
/// Unknown entities are kept verbatim.
pub fn unescape_html(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&tail[1..end]).map(|ch| (ch, end)));
        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse::<u32>().ok()?
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_offsets_round_trip_through_bytes() {
        let text = "Señor 😀 Doe";
        let byte = utf16_to_byte_idx(text, 8);
        assert_eq!(&text[byte..], " Doe");
        assert_eq!(byte_to_utf16_idx(text, byte), 8);
        assert_eq!(utf16_to_byte_idx(text, 500), text.len());
    }

    #[test]
    fn escaping_and_unescaping_are_inverse_for_text() {
        let raw = r#"Smith & "Sons" <Trust>"#;
        assert_eq!(unescape_html(&escape_html(raw)), raw);
        assert_eq!(unescape_html("a&nbsp;b &#39;c&#x27; &bogus; & d"), "a\u{a0}b 'c' &bogus; & d");
    }
}
