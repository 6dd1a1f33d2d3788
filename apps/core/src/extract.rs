use std::sync::LazyLock;

use regex::Regex;

/// A drive letter (any single word character), a colon, then the shortest run of text that
/// ends right before a closing `"` at end of input, a `";` separator, or end of input.
static DRIVE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([[:word:]]:.+?)(?:"$|";|$)"#).expect("drive path pattern should compile")
});

/// First drive-rooted path embedded in `input`, verbatim. `None` means no path-shaped text
/// was found, which is distinct from a path that does not exist.
pub fn extract_path(input: &str) -> Option<&str> {
    DRIVE_PATH
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
