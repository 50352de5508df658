//! Testing utilities and mock backends.
//!
//! The mocks implement the capability traits with scripted failures so the
//! orchestrator can be driven through retries, fallbacks and timeouts
//! without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use genjobs_core::testing::{fixtures, MockImageEnhancer};
//!
//! let upscaler = MockImageEnhancer::new("upscaler");
//! let catalog = ProviderCatalog::new()
//!     .with_backend(fixtures::image_backend(&upscaler, true, 10));
//! ```

mod mock_media;
mod mock_text;
mod script;

pub use mock_media::{MockImageEnhancer, MockLipSyncer, MockScraper};
pub use mock_text::MockTextGenerator;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;

    use super::{MockImageEnhancer, MockLipSyncer, MockScraper, MockTextGenerator};
    use crate::provider::{BackendHandle, RegisteredBackend};

    fn registered(handle: BackendHandle, managed: bool, priority: i64) -> RegisteredBackend {
        RegisteredBackend {
            name: handle.name().to_string(),
            handle,
            managed,
            default_priority: priority,
        }
    }

    /// Catalog entry for a mock text backend. Clones share scripted state.
    pub fn text_backend(mock: &MockTextGenerator, managed: bool, priority: i64) -> RegisteredBackend {
        registered(BackendHandle::Text(Arc::new(mock.clone())), managed, priority)
    }

    pub fn image_backend(mock: &MockImageEnhancer, managed: bool, priority: i64) -> RegisteredBackend {
        registered(BackendHandle::Image(Arc::new(mock.clone())), managed, priority)
    }

    pub fn lip_sync_backend(mock: &MockLipSyncer, managed: bool, priority: i64) -> RegisteredBackend {
        registered(BackendHandle::LipSync(Arc::new(mock.clone())), managed, priority)
    }

    pub fn scrape_backend(mock: &MockScraper, managed: bool, priority: i64) -> RegisteredBackend {
        registered(BackendHandle::Scrape(Arc::new(mock.clone())), managed, priority)
    }
}
