//! Shared XML attribute and escaping utilities for the package reader and writer.
//!
//! All functions handle namespace-prefixed attributes and UTF-8 conversion
//! safely.

use quick_xml::events::BytesStart;

/// Extract a string attribute value by key, unescaping entities.
///
/// Returns `None` if the attribute is missing or not valid UTF-8.
pub fn attr_string(e: &BytesStart, key: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == key {
            return attr.unescape_value().ok().map(|s| s.into_owned());
        }
    }
    None
}

/// Extract a string attribute by local name (ignoring namespace prefix).
pub fn attr_string_local(e: &BytesStart, key: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == key {
            return attr.unescape_value().ok().map(|s| s.into_owned());
        }
    }
    None
}

/// Extract a `u32` attribute value by key.
pub fn attr_u32(e: &BytesStart, key: &[u8]) -> Option<u32> {
    attr_string(e, key).and_then(|s| s.trim().parse().ok())
}

/// Collect every attribute except the ones named in `skip`, in document order.
///
/// Values stay in their escaped XML form so they can be written back verbatim.
pub fn raw_attrs_except(e: &BytesStart, skip: &[&[u8]]) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .filter(|attr| !skip.contains(&attr.key.as_ref()))
        .filter_map(|attr| {
            let key = std::str::from_utf8(attr.key.as_ref()).ok()?;
            let value = std::str::from_utf8(&attr.value).ok()?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Namespace prefix of an element name (`x` for `x:sheetData`), if any.
pub fn name_prefix(e: &BytesStart) -> Option<String> {
    e.name()
        .prefix()
        .and_then(|p| std::str::from_utf8(p.as_ref()).ok().map(str::to_string))
}

/// Minimal XML escaping for attribute/text content.
pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;

    fn make_start(xml: &str) -> BytesStart<'_> {
        // Strip < and > / /> to get just the tag content
        let content = xml
            .trim_start_matches('<')
            .trim_end_matches('>')
            .trim_end_matches('/')
            .trim_end();
        BytesStart::from_content(content, content.find(' ').unwrap_or(content.len()))
    }

    #[test]
    fn test_attr_string() {
        let e = make_start(r#"<c r="B2" t="s" />"#);
        assert_eq!(attr_string(&e, b"r"), Some("B2".to_string()));
        assert_eq!(attr_string(&e, b"missing"), None);
    }

    #[test]
    fn test_attr_string_unescapes() {
        let e = make_start(r#"<sheet name="A &amp; B" />"#);
        assert_eq!(attr_string(&e, b"name"), Some("A & B".to_string()));
    }

    #[test]
    fn test_attr_string_local() {
        let e = make_start(r#"<sheet r:id="rId3" />"#);
        assert_eq!(attr_string_local(&e, b"id"), Some("rId3".to_string()));
        assert_eq!(attr_string(&e, b"id"), None);
    }

    #[test]
    fn test_attr_u32() {
        let e = make_start(r#"<c s="42" />"#);
        assert_eq!(attr_u32(&e, b"s"), Some(42));
        assert_eq!(attr_u32(&e, b"missing"), None);
    }

    #[test]
    fn test_raw_attrs_except() {
        let e = make_start(r#"<row r="9" spans="1:11" ht="30" customHeight="1" />"#);
        let attrs = raw_attrs_except(&e, &[b"r", b"spans"]);
        assert_eq!(
            attrs,
            vec![
                ("ht".to_string(), "30".to_string()),
                ("customHeight".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_name_prefix() {
        let e = make_start("<x:sheetData>");
        assert_eq!(name_prefix(&e), Some("x".to_string()));
        let plain = make_start("<sheetData>");
        assert_eq!(name_prefix(&plain), None);
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape(r#"a<b>&"c'"#), "a&lt;b&gt;&amp;&quot;c&apos;");
        assert_eq!(xml_escape("Pérez"), "Pérez");
    }
}
