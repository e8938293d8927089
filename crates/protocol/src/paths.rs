//! JSON-Pointer path classification for UI patches.
//!
//! Legal path roots are exactly `/root` and `/elements/<key>` plus its
//! sub-paths. Classification is hand-rolled string scanning — the shapes are
//! too simple to justify a regex dependency.

pub const ROOT_PATH: &str = "/root";

const ELEMENTS_PREFIX: &str = "/elements/";

/// The `<key>` of an exact element-root path `/elements/<key>`, if `path`
/// is one.
pub fn element_root_key(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(ELEMENTS_PREFIX)?;
    (!rest.is_empty() && !rest.contains('/')).then_some(rest)
}

/// The `<key>` segment of any `/elements/<key>[/...]` path.
pub fn element_key(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(ELEMENTS_PREFIX)?;
    let key = rest.split('/').next().unwrap_or(rest);
    (!key.is_empty()).then_some(key)
}

/// True for any path under `/elements/` with a non-empty remainder,
/// including element roots.
pub fn is_element_path(path: &str) -> bool {
    path.strip_prefix(ELEMENTS_PREFIX)
        .is_some_and(|rest| !rest.is_empty())
}

/// True for `/elements/<key>/children/-` and `/elements/<key>/children/<n>`.
pub fn is_children_append(path: &str) -> bool {
    let Some(rest) = path.strip_prefix(ELEMENTS_PREFIX) else {
        return false;
    };
    let mut segments = rest.split('/');
    let key_ok = segments.next().is_some_and(|k| !k.is_empty());
    let children_ok = segments.next() == Some("children");
    let index_ok = segments
        .next()
        .is_some_and(|i| i == "-" || (!i.is_empty() && i.bytes().all(|b| b.is_ascii_digit())));
    key_ok && children_ok && index_ok && segments.next().is_none()
}

/// True for the children-collection path `/elements/<key>/children` itself.
pub fn is_children_collection(path: &str) -> bool {
    let Some(rest) = path.strip_prefix(ELEMENTS_PREFIX) else {
        return false;
    };
    let mut segments = rest.split('/');
    let key_ok = segments.next().is_some_and(|k| !k.is_empty());
    key_ok && segments.next() == Some("children") && segments.next().is_none()
}

/// Path for appending a child key to an element.
pub fn children_append_path(element_key: &str) -> String {
    format!("{ELEMENTS_PREFIX}{element_key}/children/-")
}

/// Path for appending to an array-valued prop of an element.
pub fn prop_append_path(element_key: &str, prop_name: &str) -> String {
    format!(
        "{ELEMENTS_PREFIX}{element_key}/props/{}/-",
        escape_segment(prop_name)
    )
}

/// Exact element-root path for a key.
pub fn element_root_path(element_key: &str) -> String {
    format!("{ELEMENTS_PREFIX}{element_key}")
}

/// Escape one JSON-Pointer segment per RFC 6901: `~` → `~0`, `/` → `~1`.
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}
