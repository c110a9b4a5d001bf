//! Target name validation.
//!
//! A target name doubles as a relative file path under the state directory
//! (`<dir>/<target>.json`), and in practice is a branch name. Accepted names:
//!
//! - are non-empty
//! - contain no whitespace, `~`, `^`, `:`, `?`, `*`, `[`, `\` or NUL
//! - contain no `..`
//! - do not start or end with `/`
//! - have no empty `/`-separated component and no component starting with `.`

use crate::error::{StateError, StateResult};

const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '\0', '~', '^', ':', '?', '*', '[', '\\'];

fn invalid(name: &str, reason: impl Into<String>) -> StateError {
    StateError::InvalidTarget {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a target name, returning `Ok(())` if it is safe to use as a
/// state file stem.
///
/// ```
/// use expgen_state::validate_target_name;
///
/// assert!(validate_target_name("perturb_1").is_ok());
/// assert!(validate_target_name("ctrl/1deg_jra55").is_ok());
/// assert!(validate_target_name("../outside").is_err());
/// ```
pub fn validate_target_name(name: &str) -> StateResult<()> {
    if name.is_empty() {
        return Err(invalid(name, "target name must not be empty"));
    }

    if let Some(ch) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
    }

    if name.contains("..") {
        return Err(invalid(name, "must not contain '..'"));
    }

    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid(name, "must not start or end with '/'"));
    }

    for component in name.split('/') {
        if component.is_empty() {
            return Err(invalid(name, "path components must not be empty"));
        }
        if component.starts_with('.') {
            return Err(invalid(name, format!("component must not start with '.': {component:?}")));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_branch_like_names() {
        for name in ["perturb_1", "ctrl", "1deg_jra55_ryf", "v1.0", "block/run-2", "a/b/c"] {
            assert!(validate_target_name(name).is_ok(), "{name} rejected");
        }
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(
            validate_target_name(""),
            Err(StateError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn rejects_traversal() {
        assert!(validate_target_name("..").is_err());
        assert!(validate_target_name("../x").is_err());
        assert!(validate_target_name("a/../b").is_err());
        assert!(validate_target_name("a..b").is_err());
    }

    #[test]
    fn rejects_forbidden_chars() {
        for name in ["has space", "tab\there", "a~b", "a^b", "a:b", "a?b", "a*b", "a[b", "a\\b", "nul\0"] {
            assert!(validate_target_name(name).is_err(), "{name:?} accepted");
        }
    }

    #[test]
    fn rejects_bad_slashes_and_hidden_components() {
        assert!(validate_target_name("/abs").is_err());
        assert!(validate_target_name("trailing/").is_err());
        assert!(validate_target_name("a//b").is_err());
        assert!(validate_target_name(".hidden").is_err());
        assert!(validate_target_name("run/.hidden").is_err());
    }

    #[test]
    fn error_names_the_target() {
        let err = validate_target_name("a b").unwrap_err();
        assert!(err.to_string().contains("\"a b\""));
    }
}
