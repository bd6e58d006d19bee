//! Optimistic edits with rollback.
//!
//! An edit is applied to local state before the server confirms it. The pre-image returned by
//! [`LocalEdit::apply`] is kept until the single confirmation attempt resolves: on failure it is
//! handed back to [`LocalEdit::revert`], on success the server's copy replaces the local one.

use crate::ClientResult;
use api_shared::AttentionDto;
use std::collections::HashMap;
use std::future::Future;

/// A reversible change to some local state.
pub trait LocalEdit {
    type Target;
    /// Whatever is needed to undo [`LocalEdit::apply`].
    type PreImage;
    /// What the server returns when it accepts the edit.
    type Confirmed;

    fn apply(&self, target: &mut Self::Target) -> Self::PreImage;

    fn revert(&self, target: &mut Self::Target, pre_image: Self::PreImage);

    fn adopt(&self, target: &mut Self::Target, confirmed: &Self::Confirmed);
}

/// Applies `edit` to `target`, then awaits `confirm` exactly once.
///
/// # Errors
///
/// Returns the confirmation error after `target` has been restored.
pub async fn run_optimistic<E, F, Fut>(
    target: &mut E::Target,
    edit: &E,
    confirm: F,
) -> ClientResult<E::Confirmed>
where
    E: LocalEdit,
    F: FnOnce() -> Fut,
    Fut: Future<Output = ClientResult<E::Confirmed>>,
{
    let pre_image = edit.apply(target);
    match confirm().await {
        Ok(confirmed) => {
            edit.adopt(target, &confirmed);
            Ok(confirmed)
        }
        Err(e) => {
            edit.revert(target, pre_image);
            Err(e)
        }
    }
}

/// Locally held copies of clinical attentions, keyed by id. Typically one listing page.
#[derive(Clone, Debug, Default)]
pub struct AttentionCache {
    items: HashMap<String, AttentionDto>,
}

impl AttentionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&AttentionDto> {
        self.items.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut AttentionDto> {
        self.items.get_mut(id)
    }

    /// Inserts or replaces the cached copy.
    pub fn upsert(&mut self, attention: AttentionDto) {
        self.items.insert(attention.id.clone(), attention);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<AttentionDto> for AttentionCache {
    fn from_iter<I: IntoIterator<Item = AttentionDto>>(iter: I) -> Self {
        let mut cache = Self::new();
        for attention in iter {
            cache.upsert(attention);
        }
        cache
    }
}

/// Inline pertinence change on a cached attention.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PertinenceEdit {
    id: String,
    value: Option<bool>,
}

impl PertinenceEdit {
    pub fn new(id: impl Into<String>, value: Option<bool>) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}

impl LocalEdit for PertinenceEdit {
    type Target = AttentionCache;
    /// `None` when the attention was not cached, so there is nothing to restore.
    type PreImage = Option<Option<bool>>;
    type Confirmed = AttentionDto;

    fn apply(&self, cache: &mut AttentionCache) -> Self::PreImage {
        let attention = cache.get_mut(&self.id)?;
        let previous = attention.pertinencia;
        attention.set_pertinencia(self.value);
        Some(previous)
    }

    fn revert(&self, cache: &mut AttentionCache, pre_image: Self::PreImage) {
        if let (Some(previous), Some(attention)) = (pre_image, cache.get_mut(&self.id)) {
            attention.set_pertinencia(previous);
        }
    }

    fn adopt(&self, cache: &mut AttentionCache, confirmed: &AttentionDto) {
        cache.upsert(confirmed.clone());
    }
}
