//! Shared application state.

use carousel_dispatch::ChatHandler;
use carousel_store::CredentialStore;
use std::sync::Arc;

/// State shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    /// The dispatch core
    pub chat: Arc<ChatHandler>,
    /// Caller credential store backing authentication
    pub credentials: CredentialStore,
}

impl AppState {
    /// Assemble the state.
    #[must_use]
    pub fn new(chat: Arc<ChatHandler>, credentials: CredentialStore) -> Self {
        Self { chat, credentials }
    }
}
