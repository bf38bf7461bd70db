//! Minimal frontmatter scanner for task files.
//!
//! A document starts with a `---` line, carries `key: value` pairs until the
//! closing `---` line, and the rest is the free-form body. Values are scalars
//! (number, boolean, null, quoted or bare string) or one-line bracketed
//! arrays. Nested maps and multi-line values are not supported.
//!
//! Writeback preserves key order (entries live in an insertion-ordered list,
//! not a map) and requotes strings; numbers, booleans, arrays and null are
//! emitted unquoted.

use crate::error::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum FmValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<FmValue>),
}

impl FmValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn parse_scalar(raw: &str) -> FmValue {
        let raw = raw.trim();
        if raw.len() >= 2 {
            if let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
                return FmValue::Str(inner.replace("\\\"", "\"").replace("\\\\", "\\"));
            }
            if let Some(inner) = raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
                return FmValue::Str(inner.to_string());
            }
        }
        match raw {
            "true" => return FmValue::Bool(true),
            "false" => return FmValue::Bool(false),
            "null" | "" => return FmValue::Null,
            _ => {}
        }
        if let Ok(i) = raw.parse::<i64>() {
            return FmValue::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return FmValue::Float(f);
        }
        FmValue::Str(raw.to_string())
    }

    fn parse(raw: &str) -> FmValue {
        let raw = raw.trim();
        if let Some(inner) = raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            if inner.trim().is_empty() {
                return FmValue::Array(Vec::new());
            }
            return FmValue::Array(inner.split(',').map(Self::parse_scalar).collect());
        }
        Self::parse_scalar(raw)
    }

    fn render(&self) -> String {
        match self {
            Self::Null => "null".into(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => format!("{f:?}"),
            Self::Str(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Self::Array(items) => {
                let rendered: Vec<String> = items.iter().map(FmValue::render).collect();
                format!("[{}]", rendered.join(", "))
            }
        }
    }
}

impl From<&str> for FmValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for FmValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

/// Ordered key/value frontmatter block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    entries: Vec<(String, FmValue)>,
}

impl Frontmatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a document into its frontmatter block and body.
    ///
    /// The body is returned verbatim, starting at the line after the closing
    /// delimiter, so `render_document` round-trips byte-for-byte.
    pub fn parse(text: &str) -> Result<(Self, String), Error> {
        let after = text
            .strip_prefix("---")
            .ok_or_else(|| Error::Task("missing frontmatter delimiter".into()))?;
        let end = after
            .find("\n---")
            .ok_or_else(|| Error::Task("unterminated frontmatter block".into()))?;
        let block = &after[..end];
        let body = after[end + 4..].strip_prefix('\n').unwrap_or(&after[end + 4..]);

        let mut entries = Vec::new();
        for line in block.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| Error::Task(format!("invalid frontmatter line: {line}")))?;
            entries.push((key.trim().to_string(), FmValue::parse(value)));
        }
        Ok((Self { entries }, body.to_string()))
    }

    pub fn get(&self, key: &str) -> Option<&FmValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn str_value(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FmValue::as_str)
    }

    /// Replace an existing key in place, or append a new one.
    pub fn set(&mut self, key: impl Into<String>, value: FmValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(&value.render());
            out.push('\n');
        }
        out
    }

    pub fn render_document(&self, body: &str) -> String {
        format!("---\n{}---\n{}", self.render(), body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "---\n\
        id: \"t_001\"\n\
        name: \"fetch logs\"\n\
        status: \"pending\"\n\
        attempts: 3\n\
        ratio: 0.5\n\
        urgent: true\n\
        started: null\n\
        tags: [\"ops\", \"logs\"]\n\
        ---\n\
        \n\
        Collect the last hour of logs.\n";

    #[test]
    fn parse_extracts_typed_values_and_body() {
        let (fm, body) = Frontmatter::parse(SAMPLE).unwrap();

        assert_eq!(fm.str_value("id"), Some("t_001"));
        assert_eq!(fm.str_value("name"), Some("fetch logs"));
        assert_eq!(fm.get("attempts"), Some(&FmValue::Int(3)));
        assert_eq!(fm.get("ratio"), Some(&FmValue::Float(0.5)));
        assert_eq!(fm.get("urgent"), Some(&FmValue::Bool(true)));
        assert!(fm.get("started").unwrap().is_null());
        assert_eq!(
            fm.get("tags"),
            Some(&FmValue::Array(vec![
                FmValue::Str("ops".into()),
                FmValue::Str("logs".into())
            ]))
        );
        assert_eq!(body, "\nCollect the last hour of logs.\n");
    }

    #[test]
    fn parse_accepts_bare_and_single_quoted_strings() {
        let doc = "---\nname: plain words here\nkind: 'single'\n---\nbody";
        let (fm, _) = Frontmatter::parse(doc).unwrap();
        assert_eq!(fm.str_value("name"), Some("plain words here"));
        assert_eq!(fm.str_value("kind"), Some("single"));
    }

    #[test]
    fn parse_rejects_missing_delimiters() {
        assert!(Frontmatter::parse("no frontmatter").is_err());
        assert!(Frontmatter::parse("---\nkey: value\nno closing").is_err());
    }

    #[test]
    fn parse_rejects_malformed_line() {
        let err = Frontmatter::parse("---\nnot a pair\n---\n").unwrap_err();
        assert!(err.to_string().contains("invalid frontmatter line"));
    }

    #[test]
    fn writeback_preserves_key_order_and_requotes() {
        let (fm, body) = Frontmatter::parse(SAMPLE).unwrap();
        let rendered = fm.render_document(&body);

        let keys: Vec<&str> = fm.keys().collect();
        assert_eq!(
            keys,
            vec!["id", "name", "status", "attempts", "ratio", "urgent", "started", "tags"]
        );
        assert!(rendered.contains("id: \"t_001\"\n"));
        assert!(rendered.contains("attempts: 3\n"));
        assert!(rendered.contains("ratio: 0.5\n"));
        assert!(rendered.contains("urgent: true\n"));
        assert!(rendered.contains("started: null\n"));
        assert!(rendered.contains("tags: [\"ops\", \"logs\"]\n"));

        // Stable under a second parse/render cycle.
        let (fm2, body2) = Frontmatter::parse(&rendered).unwrap();
        assert_eq!(fm2.render_document(&body2), rendered);
    }

    #[test]
    fn set_replaces_in_place_and_appends_new() {
        let (mut fm, _) = Frontmatter::parse(SAMPLE).unwrap();
        fm.set("status", FmValue::Str("running".into()));
        fm.set("completed", FmValue::Null);

        let keys: Vec<&str> = fm.keys().collect();
        assert_eq!(keys[2], "status");
        assert_eq!(*keys.last().unwrap(), "completed");
        assert_eq!(fm.str_value("status"), Some("running"));
    }

    #[test]
    fn bare_string_is_requoted_on_writeback() {
        let (fm, body) = Frontmatter::parse("---\nname: hello world\n---\n").unwrap();
        assert_eq!(fm.render_document(&body), "---\nname: \"hello world\"\n---\n");
    }

    #[test]
    fn string_escapes_roundtrip() {
        let mut fm = Frontmatter::new();
        fm.set("msg", FmValue::Str("say \"hi\" \\ bye".into()));
        let doc = fm.render_document("");
        let (parsed, _) = Frontmatter::parse(&doc).unwrap();
        assert_eq!(parsed.str_value("msg"), Some("say \"hi\" \\ bye"));
    }

    #[test]
    fn empty_array_roundtrips() {
        let (fm, _) = Frontmatter::parse("---\ntags: []\n---\n").unwrap();
        assert_eq!(fm.get("tags"), Some(&FmValue::Array(vec![])));
        assert!(fm.render().contains("tags: []"));
    }
}
