//! Chat-completion transports for grokcli.
//!
//! All providers implement the `grokcli_core::Provider` trait. The model
//! gateway in `grokcli-agent` wraps them with retry and request
//! normalization; nothing here retries.

pub mod openai_compat;

use std::sync::Arc;

use grokcli_config::ProviderProfile;
use grokcli_core::Provider;

pub use openai_compat::OpenAiCompatProvider;

/// Build the provider for a resolved session profile.
pub fn build_from_profile(profile: &ProviderProfile) -> Arc<dyn Provider> {
    Arc::new(OpenAiCompatProvider::new(
        profile.name.clone(),
        profile.base_url.clone(),
        profile.api_key.clone(),
    ))
}
