//! Screen content index and layered resource fallback.
//!
//! The controller reduces playback state to one of these indices, then
//! resolves it to a visual resource: an explicit override if one was
//! configured, otherwise the static fallback chain. Chains are acyclic by
//! construction and terminate at `Playback`, `Logo` or `EditorPreview`,
//! where "no resource" is a valid answer meaning "pass the raw capture
//! frame through".

use crate::core::events::ErrorCode;
use crate::entities::resource::VisualResource;

/// What the screen should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenContent {
    /// Live capture from the active backend.
    Playback,
    Logo,
    Loading,
    Sync,
    AudioOnly,
    Error,
    ErrorInvalid,
    ErrorBlocked,
    ErrorRateLimited,
    EditorPreview,
}

impl ScreenContent {
    pub const COUNT: usize = 10;

    pub const ALL: [ScreenContent; Self::COUNT] = [
        ScreenContent::Playback,
        ScreenContent::Logo,
        ScreenContent::Loading,
        ScreenContent::Sync,
        ScreenContent::AudioOnly,
        ScreenContent::Error,
        ScreenContent::ErrorInvalid,
        ScreenContent::ErrorBlocked,
        ScreenContent::ErrorRateLimited,
        ScreenContent::EditorPreview,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Static fallback pointer, followed when no override resource exists.
    pub fn fallback(self) -> Option<ScreenContent> {
        match self {
            ScreenContent::Playback => None,
            ScreenContent::Logo => None,
            ScreenContent::Loading => Some(ScreenContent::Logo),
            ScreenContent::Sync => Some(ScreenContent::Loading),
            ScreenContent::AudioOnly => Some(ScreenContent::Logo),
            ScreenContent::Error => Some(ScreenContent::Logo),
            ScreenContent::ErrorInvalid => Some(ScreenContent::Error),
            ScreenContent::ErrorBlocked => Some(ScreenContent::Error),
            ScreenContent::ErrorRateLimited => Some(ScreenContent::Error),
            ScreenContent::EditorPreview => None,
        }
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            ScreenContent::Error
                | ScreenContent::ErrorInvalid
                | ScreenContent::ErrorBlocked
                | ScreenContent::ErrorRateLimited
        )
    }
}

impl ErrorCode {
    /// Error screen variant for this code. The synthetic retry signal
    /// shows the generic error slate.
    pub fn screen_content(self) -> ScreenContent {
        match self {
            ErrorCode::Generic => ScreenContent::Error,
            ErrorCode::InvalidUrl => ScreenContent::ErrorInvalid,
            ErrorCode::AccessBlocked => ScreenContent::ErrorBlocked,
            ErrorCode::RateLimited => ScreenContent::ErrorRateLimited,
            ErrorCode::RetryEndStream => ScreenContent::Error,
        }
    }
}

/// Per-content override resources, configured once.
#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    slots: [Option<VisualResource>; ScreenContent::COUNT],
}

impl OverrideTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, content: ScreenContent, resource: VisualResource) -> &mut Self {
        self.slots[content.index()] = Some(resource);
        self
    }

    pub fn clear(&mut self, content: ScreenContent) {
        self.slots[content.index()] = None;
    }

    /// The explicit override for `content`, no chain walking.
    pub fn get(&self, content: ScreenContent) -> Option<&VisualResource> {
        self.slots[content.index()].as_ref()
    }

    pub fn has(&self, content: ScreenContent) -> bool {
        self.slots[content.index()].is_some()
    }

    /// Walk the fallback chain from `content` until a resource is found or
    /// a terminal index is reached without one.
    pub fn resolve(&self, content: ScreenContent) -> Option<&VisualResource> {
        let mut current = content;
        loop {
            if let Some(resource) = self.get(current) {
                return Some(resource);
            }
            match current.fallback() {
                Some(next) => current = next,
                None => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_chains_terminate() {
        for content in ScreenContent::ALL {
            let mut hops = 0;
            let mut current = content;
            while let Some(next) = current.fallback() {
                current = next;
                hops += 1;
                assert!(hops <= ScreenContent::COUNT, "cycle from {:?}", content);
            }
            assert!(current.fallback().is_none());
        }
    }

    #[test]
    fn test_resolve_prefers_explicit_override() {
        let mut table = OverrideTable::new();
        table.set(ScreenContent::Logo, VisualResource::new("logo", 512, 512));
        table.set(
            ScreenContent::Loading,
            VisualResource::new("spinner", 256, 256),
        );

        assert_eq!(
            table.resolve(ScreenContent::Loading).map(|r| r.name.as_str()),
            Some("spinner")
        );
    }

    #[test]
    fn test_resolve_walks_to_logo() {
        let mut table = OverrideTable::new();
        table.set(ScreenContent::Logo, VisualResource::new("logo", 512, 512));

        // loading -> logo
        assert_eq!(
            table.resolve(ScreenContent::Loading).map(|r| r.name.as_str()),
            Some("logo")
        );
        // sync -> loading -> logo
        assert_eq!(
            table.resolve(ScreenContent::Sync).map(|r| r.name.as_str()),
            Some("logo")
        );
    }

    #[test]
    fn test_error_variant_chain() {
        let mut table = OverrideTable::new();
        table.set(ScreenContent::Error, VisualResource::new("slate", 512, 512));

        // error-invalid -> error
        assert_eq!(
            table
                .resolve(ScreenContent::ErrorInvalid)
                .map(|r| r.name.as_str()),
            Some("slate")
        );
        // with nothing configured at all, the chain ends empty
        let empty = OverrideTable::new();
        assert!(empty.resolve(ScreenContent::ErrorInvalid).is_none());
    }

    #[test]
    fn test_terminal_without_resource_is_none() {
        let table = OverrideTable::new();
        assert!(table.resolve(ScreenContent::Playback).is_none());
        assert!(table.resolve(ScreenContent::EditorPreview).is_none());
    }

    #[test]
    fn test_error_codes_map_to_variants() {
        assert_eq!(
            ErrorCode::InvalidUrl.screen_content(),
            ScreenContent::ErrorInvalid
        );
        assert_eq!(
            ErrorCode::RetryEndStream.screen_content(),
            ScreenContent::Error
        );
    }
}
