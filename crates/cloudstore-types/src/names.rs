//! Object name validation.
//!
//! The core only enforces what every backend needs: a name is non-empty and
//! free of control characters. Backends with stricter rules (for example a
//! filesystem mirror rejecting `..` components) report their own violations
//! as invalid-argument errors.

use crate::error::{TypeError, TypeResult};

/// Validate an object name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use cloudstore_types::validate_object_name;
///
/// assert!(validate_object_name("a/b.txt").is_ok());
/// assert!(validate_object_name("").is_err());
/// assert!(validate_object_name("bad\nname").is_err());
/// ```
pub fn validate_object_name(name: &str) -> TypeResult<()> {
    if name.is_empty() {
        return Err(TypeError::InvalidName {
            name: name.to_string(),
            reason: "object name must not be empty".into(),
        });
    }

    if let Some(ch) = name.chars().find(|c| c.is_control()) {
        return Err(TypeError::InvalidName {
            name: name.to_string(),
            reason: format!("contains control character: {ch:?}"),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_nested_names() {
        assert!(validate_object_name("hello.txt").is_ok());
        assert!(validate_object_name("a/b/c.bin").is_ok());
        assert!(validate_object_name("with space/ünïcode").is_ok());
    }

    #[test]
    fn rejects_empty() {
        let err = validate_object_name("").unwrap_err();
        assert!(matches!(err, TypeError::InvalidName { .. }));
    }

    #[test]
    fn rejects_control_characters() {
        assert!(validate_object_name("a\0b").is_err());
        assert!(validate_object_name("tab\there").is_err());
    }
}
