//! Structural paths and remove-state keys.
//!
//! Paths identify a position inside a configuration tree across runs. They
//! are plain strings so they can be used directly as keys of the persisted
//! [`RemoveState`](crate::RemoveState).

/// Suffix of a baseline snapshot key.
pub const BASE_SUFFIX: &str = "::BASE";

/// Infix of a positional removal record key.
pub const REMOVE_INFIX: &str = "::REMOVE[";

/// Append `key` to `path`.
///
/// Mapping keys are joined with `.`; index segments (`[i]`) are appended
/// without a separator. An empty `path` yields `key` unchanged.
pub fn path_join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else if key.starts_with('[') {
        format!("{path}{key}")
    } else {
        format!("{path}.{key}")
    }
}

/// The path segment for list index `i`.
pub fn index_segment(i: usize) -> String {
    format!("[{i}]")
}

/// Key under which the baseline snapshot of the list at `path` is stored.
pub fn base_state_key(path: &str) -> String {
    format!("{path}{BASE_SUFFIX}")
}

/// Key recording the effect of a positional `REMOVE` at `path[index]`.
pub fn remove_state_key(path: &str, index: usize) -> String {
    format!("{path}{REMOVE_INFIX}{index}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_rules() {
        assert_eq!(path_join("", "a"), "a");
        assert_eq!(path_join("a", "b"), "a.b");
        assert_eq!(path_join("a", "[0]"), "a[0]");
        assert_eq!(path_join("a[0]", "b"), "a[0].b");
        assert_eq!(path_join("", "[3]"), "[3]");
    }

    #[test]
    fn state_keys() {
        let list = path_join("field_table", "methods");
        assert_eq!(base_state_key(&list), "field_table.methods::BASE");
        assert_eq!(remove_state_key(&list, 3), "field_table.methods::REMOVE[3]");
        assert_eq!(
            remove_state_key(&path_join(&list, &index_segment(1)), 0),
            "field_table.methods[1]::REMOVE[0]"
        );
    }
}
