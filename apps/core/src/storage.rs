//! Flat-file key/value store with a bracket-delimited line format.
//!
//! ```text
//! [key]
//! value
//! [array:key]
//! first
//! second
//! ```
//!
//! A header line starts with `[` and ends with `]`. Loading is best effort:
//! malformed or non-UTF-8 lines are logged and skipped, the rest of the file
//! still loads. A file that cannot be read at all disables saving, so the
//! history on disk is never replaced by an empty one.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use crate::logging;

const ARRAY_TAG: &str = "array";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreValue {
    Scalar(String),
    List(Vec<String>),
}

impl From<&str> for StoreValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for StoreValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<String>> for StoreValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Unrepresentable(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(error) => write!(f, "storage io error: {error}"),
            Self::Unrepresentable(detail) => write!(f, "value cannot be stored: {detail}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatErrorKind {
    MalformedHeader(String),
    MissingValue(String),
    MissingItems(String),
    OrphanValue(String),
    InvalidEncoding,
}

/// One skipped line; `line` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatError {
    pub line: usize,
    pub kind: FormatErrorKind,
}

impl Display for FormatErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedHeader(header) => write!(f, "wrong file format: {header}"),
            Self::MissingValue(key) => write!(f, "missing value for key: {key}"),
            Self::MissingItems(key) => write!(f, "missing items for array: {key}"),
            Self::OrphanValue(value) => write!(f, "value without header: {value}"),
            Self::InvalidEncoding => write!(f, "line is not valid UTF-8"),
        }
    }
}

impl Display for FormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)
    }
}

impl std::error::Error for FormatError {}

enum Header {
    Scalar(String),
    List(String),
}

enum ScanState {
    ExpectHeader,
    Scalar { key: String, line: usize },
    List { key: String, line: usize, items: Vec<String> },
}

pub struct Store {
    path: PathBuf,
    usable: bool,
    entries: BTreeMap<String, StoreValue>,
}

impl Store {
    /// Binds the store to `path`, creating parent directories and an empty file when missing.
    /// A filesystem failure leaves an in-memory store whose `load`/`save` do nothing.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        logging::info(&format!("storage path: {}", path.display()));
        let usable = match ensure_file(&path) {
            Ok(()) => true,
            Err(error) => {
                logging::error(&format!(
                    "storage unavailable at {}: {error}",
                    path.display()
                ));
                false
            }
        };

        Self {
            path,
            usable,
            entries: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_usable(&self) -> bool {
        self.usable
    }

    /// Replaces in-memory state with the file contents. Returns the skipped lines, already logged.
    pub fn load(&mut self) -> Vec<FormatError> {
        if !self.usable {
            return Vec::new();
        }

        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(error) => {
                logging::error(&format!(
                    "failed to read storage {}, saving disabled: {error}",
                    self.path.display()
                ));
                self.usable = false;
                return Vec::new();
            }
        };

        let (entries, errors) = parse(&raw);
        for error in &errors {
            logging::store_format_error(&self.path, error);
        }
        self.entries = entries;
        errors
    }

    pub fn save(&self) -> Result<(), StoreError> {
        if !self.usable {
            return Ok(());
        }

        std::fs::write(&self.path, serialize(&self.entries))?;
        logging::info(&format!(
            "storage saved entries={} path={}",
            self.entries.len(),
            self.path.display()
        ));
        Ok(())
    }

    pub fn put(&mut self, key: &str, value: impl Into<StoreValue>) -> Result<(), StoreError> {
        let value = value.into();
        check_key(key)?;
        match &value {
            StoreValue::Scalar(text) => check_value(text)?,
            StoreValue::List(items) => {
                for item in items {
                    check_value(item)?;
                }
            }
        }
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    pub fn get_item(&self, key: &str) -> String {
        match self.entries.get(key) {
            Some(StoreValue::Scalar(value)) => value.clone(),
            Some(StoreValue::List(_)) | None => String::new(),
        }
    }

    pub fn get_array(&self, key: &str) -> Vec<String> {
        match self.entries.get(key) {
            Some(StoreValue::List(items)) => items.clone(),
            Some(StoreValue::Scalar(_)) | None => Vec::new(),
        }
    }

    /// Mutable handle to the list under `key`. An absent key, or one holding a scalar,
    /// is replaced by an empty list first.
    pub fn array_mut(&mut self, key: &str) -> &mut Vec<String> {
        let slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| StoreValue::List(Vec::new()));
        list_slot(slot)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// True when `value` survives a save/load cycle unchanged.
pub fn is_representable(value: &str) -> bool {
    check_value(value).is_ok()
}

fn check_key(key: &str) -> Result<(), StoreError> {
    if key.trim().is_empty() {
        return Err(StoreError::Unrepresentable("empty key".to_string()));
    }
    if key.trim() != key || key.contains([':', '[', ']', '\n', '\r']) {
        return Err(StoreError::Unrepresentable(format!("key {key:?}")));
    }
    Ok(())
}

fn check_value(value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::Unrepresentable("blank value".to_string()));
    }
    if value.contains(['\n', '\r']) {
        return Err(StoreError::Unrepresentable(format!(
            "line break in value {value:?}"
        )));
    }
    if looks_like_header(value.trim()) {
        return Err(StoreError::Unrepresentable(format!(
            "value {value:?} reads back as a header"
        )));
    }
    Ok(())
}

fn looks_like_header(line: &str) -> bool {
    line.len() >= 2 && line.starts_with('[') && line.ends_with(']')
}

fn ensure_file(path: &Path) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            logging::info(&format!("creating storage directory {}", parent.display()));
            std::fs::create_dir_all(parent)?;
        }
    }
    if !path.exists() {
        logging::info(&format!("creating storage file {}", path.display()));
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
    }
    Ok(())
}

fn list_slot(slot: &mut StoreValue) -> &mut Vec<String> {
    match slot {
        StoreValue::List(items) => items,
        StoreValue::Scalar(_) => {
            *slot = StoreValue::List(Vec::new());
            list_slot(slot)
        }
    }
}

fn parse_header(line: &str) -> Option<Header> {
    let inner = &line[1..line.len() - 1];
    let parts: Vec<&str> = inner.split(':').collect();
    match parts.as_slice() {
        [key] if !key.is_empty() => Some(Header::Scalar((*key).to_string())),
        [tag, key] if *tag == ARRAY_TAG && !key.is_empty() => {
            Some(Header::List((*key).to_string()))
        }
        _ => None,
    }
}

/// Lines are decoded one at a time; an undecodable line is reported and the
/// scan continues in whatever state it was in.
fn parse(raw: &[u8]) -> (BTreeMap<String, StoreValue>, Vec<FormatError>) {
    let mut entries = BTreeMap::new();
    let mut errors = Vec::new();
    let mut state = ScanState::ExpectHeader;

    for (index, raw_line) in raw.split(|byte| *byte == b'\n').enumerate() {
        let line_no = index + 1;
        let raw_line = raw_line.strip_suffix(b"\r").unwrap_or(raw_line);
        let Ok(value) = std::str::from_utf8(raw_line) else {
            errors.push(FormatError {
                line: line_no,
                kind: FormatErrorKind::InvalidEncoding,
            });
            continue;
        };
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }

        if looks_like_header(trimmed) {
            finish(state, &mut entries, &mut errors);
            state = match parse_header(trimmed) {
                Some(Header::Scalar(key)) => ScanState::Scalar { key, line: line_no },
                Some(Header::List(key)) => ScanState::List {
                    key,
                    line: line_no,
                    items: Vec::new(),
                },
                None => {
                    errors.push(FormatError {
                        line: line_no,
                        kind: FormatErrorKind::MalformedHeader(trimmed.to_string()),
                    });
                    ScanState::ExpectHeader
                }
            };
            continue;
        }

        state = match state {
            ScanState::ExpectHeader => {
                errors.push(FormatError {
                    line: line_no,
                    kind: FormatErrorKind::OrphanValue(value.to_string()),
                });
                ScanState::ExpectHeader
            }
            ScanState::Scalar { key, .. } => {
                entries.insert(key, StoreValue::Scalar(value.to_string()));
                ScanState::ExpectHeader
            }
            ScanState::List {
                key,
                line,
                mut items,
            } => {
                items.push(value.to_string());
                ScanState::List { key, line, items }
            }
        };
    }
    finish(state, &mut entries, &mut errors);

    (entries, errors)
}

fn finish(
    state: ScanState,
    entries: &mut BTreeMap<String, StoreValue>,
    errors: &mut Vec<FormatError>,
) {
    match state {
        ScanState::ExpectHeader => {}
        ScanState::Scalar { key, line } => errors.push(FormatError {
            line,
            kind: FormatErrorKind::MissingValue(key),
        }),
        ScanState::List { key, line, items } => {
            if items.is_empty() {
                errors.push(FormatError {
                    line,
                    kind: FormatErrorKind::MissingItems(key),
                });
            } else {
                entries.insert(key, StoreValue::List(items));
            }
        }
    }
}

fn serialize(entries: &BTreeMap<String, StoreValue>) -> String {
    let mut out = String::new();
    for (key, value) in entries {
        match value {
            StoreValue::Scalar(text) => {
                if !is_representable(text) {
                    logging::warn(&format!("storage save: skipping value for key {key}"));
                    continue;
                }
                out.push_str(&format!("[{key}]\n{text}\n"));
            }
            StoreValue::List(items) => {
                let kept: Vec<&String> = items
                    .iter()
                    .filter(|item| {
                        let ok = is_representable(item);
                        if !ok {
                            logging::warn(&format!(
                                "storage save: skipping item {item:?} of array {key}"
                            ));
                        }
                        ok
                    })
                    .collect();
                if kept.is_empty() {
                    continue;
                }
                out.push_str(&format!("[{ARRAY_TAG}:{key}]\n"));
                for item in kept {
                    out.push_str(item);
                    out.push('\n');
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{parse, serialize, FormatErrorKind, StoreValue};

    #[test]
    fn crlf_and_blank_lines_are_tolerated() {
        let (entries, errors) = parse(b"[name]\r\nvalue\r\n\r\n[array:list]\r\na\r\n\r\nb\r\n");
        assert!(errors.is_empty());
        assert_eq!(entries.get("name"), Some(&StoreValue::Scalar("value".into())));
        assert_eq!(
            entries.get("list"),
            Some(&StoreValue::List(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn scalar_header_followed_by_header_is_reported() {
        let (entries, errors) = parse(b"[lonely]\n[kept]\nvalue\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 1);
        assert_eq!(errors[0].kind, FormatErrorKind::MissingValue("lonely".into()));
        assert_eq!(entries.get("kept"), Some(&StoreValue::Scalar("value".into())));
    }

    #[test]
    fn unknown_header_shapes_are_skipped() {
        let (entries, errors) = parse(b"[map:x]\nignored\n[a:b:c]\n[]\n[ok]\n1\n");
        let kinds: Vec<_> = errors.iter().map(|e| e.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                FormatErrorKind::MalformedHeader("[map:x]".into()),
                FormatErrorKind::OrphanValue("ignored".into()),
                FormatErrorKind::MalformedHeader("[a:b:c]".into()),
                FormatErrorKind::MalformedHeader("[]".into()),
            ]
        );
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn empty_array_is_reported_and_dropped() {
        let (entries, errors) = parse(b"[array:empty]\n");
        assert!(entries.is_empty());
        assert_eq!(errors[0].kind, FormatErrorKind::MissingItems("empty".into()));
    }

    #[test]
    fn scalar_takes_exactly_one_value_line() {
        let (entries, errors) = parse(b"[k]\nfirst\nsecond\n");
        assert_eq!(entries.get("k"), Some(&StoreValue::Scalar("first".into())));
        assert_eq!(errors[0].kind, FormatErrorKind::OrphanValue("second".into()));
    }

    #[test]
    fn serializer_skips_lines_that_would_parse_as_headers() {
        let mut entries = std::collections::BTreeMap::new();
        entries.insert(
            "h".to_string(),
            StoreValue::List(vec!["[not:a:header]".into(), "C:\\ok".into()]),
        );
        entries.insert("empty".to_string(), StoreValue::List(Vec::new()));
        assert_eq!(serialize(&entries), "[array:h]\nC:\\ok\n");
    }
}
