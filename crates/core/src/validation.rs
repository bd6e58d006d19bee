//! Input validation utilities.

use crate::{AttentionError, AttentionResult};

/// Validates that a namespace string is safe for embedding in a URI or e-mail domain.
///
/// The namespace becomes the domain part of commit author addresses (`{actor}@{namespace}`).
///
/// # Errors
///
/// Returns [`AttentionError::InvalidInput`] if the namespace is empty, longer than 253 bytes,
/// or contains anything other than ASCII alphanumerics, `.`, `-` and `_`.
pub fn validate_namespace_safe_for_uri(namespace: &str) -> AttentionResult<()> {
    const MAX_NAMESPACE_LEN: usize = 253;

    if namespace.trim().is_empty() {
        return Err(AttentionError::InvalidInput(
            "namespace cannot be empty".into(),
        ));
    }

    if namespace.len() > MAX_NAMESPACE_LEN {
        return Err(AttentionError::InvalidInput(format!(
            "namespace exceeds maximum length of {MAX_NAMESPACE_LEN} characters"
        )));
    }

    let ok = namespace
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'.' | b'-' | b'_'));

    if !ok {
        return Err(AttentionError::InvalidInput(
            "namespace contains invalid characters (only alphanumeric, '.', '-', '_' allowed)"
                .into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_dotted_namespace() {
        assert!(validate_namespace_safe_for_uri("ulr.dev.1").is_ok());
    }

    #[test]
    fn rejects_blank_and_unsafe_namespaces() {
        for bad in ["", "   ", "ulr/dev", "ulr dev", "hospitalñ"] {
            assert!(
                validate_namespace_safe_for_uri(bad).is_err(),
                "accepted {bad:?}"
            );
        }
        assert!(validate_namespace_safe_for_uri(&"a".repeat(254)).is_err());
    }
}
