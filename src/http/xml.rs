//! JSON value → XML document encoding.
//!
//! Objects become nested elements, array items and numeric keys become
//! `item<N>`, scalars become escaped text. The document root is `<root>`.

use std::fmt::Write;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum XmlError {
    #[error("invalid XML element name: {0:?}")]
    InvalidName(String),
}

/// Encode `value` under a `<root>` element.
pub fn encode(value: &Value) -> Result<String, XmlError> {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    write_element(&mut out, "root", value)?;
    out.push('\n');
    Ok(out)
}

/// Document returned when encoding fails.
pub fn error_document() -> String {
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root><error>Server Error</error></root>\n"
        .to_string()
}

fn write_element(out: &mut String, name: &str, value: &Value) -> Result<(), XmlError> {
    match value {
        Value::Null => {
            let _ = write!(out, "<{name}/>");
        }
        Value::Object(map) => {
            let _ = write!(out, "<{name}>");
            for (key, child) in map {
                let child_name = element_name(key)?;
                write_element(out, &child_name, child)?;
            }
            let _ = write!(out, "</{name}>");
        }
        Value::Array(items) => {
            let _ = write!(out, "<{name}>");
            for (index, child) in items.iter().enumerate() {
                write_element(out, &format!("item{index}"), child)?;
            }
            let _ = write!(out, "</{name}>");
        }
        Value::String(text) => {
            let _ = write!(out, "<{name}>{}</{name}>", escape(text));
        }
        Value::Bool(_) | Value::Number(_) => {
            let _ = write!(out, "<{name}>{value}</{name}>");
        }
    }
    Ok(())
}

fn element_name(key: &str) -> Result<String, XmlError> {
    if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(format!("item{key}"));
    }

    let mut chars = key.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid_start && valid_rest && !key.to_ascii_lowercase().starts_with("xml") {
        Ok(key.to_string())
    } else {
        Err(XmlError::InvalidName(key.to_string()))
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_document() {
        let doc = encode(&json!({"user": {"id": 7, "name": "a&b"}, "tags": ["x", "y"]})).unwrap();
        assert!(doc.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(doc.contains("<user><id>7</id><name>a&amp;b</name></user>"));
        assert!(doc.contains("<tags><item0>x</item0><item1>y</item1></tags>"));
    }

    #[test]
    fn test_numeric_keys_and_null() {
        let doc = encode(&json!({"0": true, "empty": null})).unwrap();
        assert!(doc.contains("<item0>true</item0>"));
        assert!(doc.contains("<empty/>"));
    }

    #[test]
    fn test_invalid_element_name() {
        assert_eq!(
            encode(&json!({"bad key": 1})),
            Err(XmlError::InvalidName("bad key".into()))
        );
        assert!(encode(&json!({"1abc": 1})).is_err());
        assert!(error_document().contains("Server Error"));
    }
}
