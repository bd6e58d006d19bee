//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into services as
//! `Arc<CoreConfig>`. Services never read environment variables while handling a request.

use crate::constants::ATTENTIONS_DIR_NAME;
use crate::validation::validate_namespace_safe_for_uri;
use crate::{AttentionError, AttentionResult};
use std::path::{Path, PathBuf};
use ulr_types::NonEmptyText;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    care_location: NonEmptyText,
    namespace: String,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// - [`AttentionError::MissingCareLocation`] / [`AttentionError::InvalidCareLocation`] if the
    ///   care location is blank or spans several lines.
    /// - [`AttentionError::InvalidInput`] if the namespace is not URI-safe.
    pub fn new(
        data_dir: PathBuf,
        care_location: impl AsRef<str>,
        namespace: impl Into<String>,
    ) -> AttentionResult<Self> {
        let care_location = care_location.as_ref();
        if care_location.contains(['\n', '\r']) {
            return Err(AttentionError::InvalidCareLocation);
        }
        let care_location =
            NonEmptyText::new(care_location).map_err(|_| AttentionError::MissingCareLocation)?;

        let namespace = namespace.into();
        validate_namespace_safe_for_uri(&namespace)?;

        Ok(Self {
            data_dir,
            care_location,
            namespace,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Root of the sharded episode directories.
    pub fn attentions_dir(&self) -> PathBuf {
        self.data_dir.join(ATTENTIONS_DIR_NAME)
    }

    pub fn care_location(&self) -> &str {
        self.care_location.as_str()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attentions_dir_is_under_data_dir() {
        let cfg = CoreConfig::new(PathBuf::from("/srv/ulr"), "Urgencia", "ulr.test").unwrap();
        assert_eq!(
            cfg.attentions_dir(),
            PathBuf::from("/srv/ulr/clinical_attentions")
        );
    }

    #[test]
    fn rejects_blank_care_location() {
        let err = CoreConfig::new(PathBuf::from("/tmp"), "  ", "ulr.test").unwrap_err();
        assert!(matches!(err, AttentionError::MissingCareLocation));
    }

    #[test]
    fn rejects_unsafe_namespace() {
        let err = CoreConfig::new(PathBuf::from("/tmp"), "Urgencia", "a b").unwrap_err();
        assert!(matches!(err, AttentionError::InvalidInput(_)));
    }
}
