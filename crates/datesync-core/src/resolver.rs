//! Bare file identifiers from sharing URLs
//!
//! Examples:
//! - "https://store.example/file/d/ABC123/view?usp=sharing" -> "ABC123"
//! - "https://store.example/open?id=XYZ" -> "XYZ"
//! - "https://store.example/uc?id=XYZ&export=download" -> "XYZ"
//! - "PLAINID" -> "PLAINID"

const FILE_PATH_MARKER: &str = "/file/d/";

/// Extract the identifier from a raw identifier or sharing URL
///
/// Anything unrecognised, or a recognised shape without its closing
/// delimiter, comes back unchanged (trimmed).
pub fn resolve(raw: &str) -> String {
    let value = raw.trim();
    if value.is_empty() {
        return String::new();
    }

    if value.contains(FILE_PATH_MARKER) {
        return from_file_path(value).unwrap_or(value).to_string();
    }

    from_query(value).unwrap_or(value).to_string()
}

fn from_file_path(value: &str) -> Option<&str> {
    let start = value.find(FILE_PATH_MARKER)? + FILE_PATH_MARKER.len();
    let rest = &value[start..];
    let end = rest.find('/')?;
    non_empty(&rest[..end])
}

fn from_query(value: &str) -> Option<&str> {
    let start = query_param_start(value, "id=")?;
    let rest = &value[start..];
    let end = rest.find('&').unwrap_or(rest.len());
    non_empty(&rest[..end])
}

/// Offset just past `key` where it begins a query parameter
fn query_param_start(value: &str, key: &str) -> Option<usize> {
    value.match_indices(key).find_map(|(idx, _)| {
        let at_boundary = idx == 0 || matches!(value.as_bytes()[idx - 1], b'?' | b'&');
        at_boundary.then_some(idx + key.len())
    })
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}
