//! Path, filename and default constants for the episode store.

/// Directory name for clinical attention storage under the data dir.
pub const ATTENTIONS_DIR_NAME: &str = "clinical_attentions";

/// Default data directory when none is configured.
pub const DEFAULT_DATA_DIR: &str = "attention_data";

/// Filename of the episode record inside each episode repository.
pub const ATTENTION_FILENAME: &str = "ATTENTION.yaml";

/// Default care location recorded in commit trailers.
pub const DEFAULT_CARE_LOCATION: &str = "Servicio de Urgencia";

/// Default namespace used for commit author e-mail addresses.
pub const DEFAULT_NAMESPACE: &str = "ulr.dev.1";

/// Default page size for listings.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Upper bound on page size for listings.
pub const MAX_PAGE_SIZE: usize = 100;
