//! # adbroker Core
//!
//! Core library for the adbroker OAuth token broker.
//!
//! This crate provides:
//! - The durable credential record and its storage backends
//! - The token manager that hands out valid access tokens, refreshing them
//!   through the authorization server when they expire
//! - The Authorization Code flow that obtains the first refresh token
//! - A small Amazon Ads API client built on the token manager
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use adbroker_core::{TokenManager, TokenError};
//!
//! async fn bearer(manager: &impl TokenManager) -> Result<String, TokenError> {
//!     let token = manager.get_valid_access_token().await?;
//!     Ok(format!("Bearer {}", token.expose()))
//! }
//! ```

pub mod ads_client;
pub mod cache;
pub mod model;
pub mod oauth;
pub mod provider;
pub mod store;
pub mod token;
pub mod token_manager;

// Re-export commonly used types at crate root
pub use model::CredentialRecord;

pub use store::{
    create_store, CredentialStore, MemoryStore, Secret, SqliteStore, StoreBackend, StoreError,
};

#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;

pub use token::{TokenError, TokenInfo, TokenManager, TokenSet};

pub use cache::TokenCache;

pub use provider::ProviderConfig;

pub use oauth::{AuthorizationFlow, TokenEndpoint};

pub use token_manager::DefaultTokenManager;

pub use ads_client::{AdsClient, AdsError};
