//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities; clone them freely.
//! The `complete` method is `async fn` on the enum so callers need no
//! trait-object machinery.

pub mod providers;

use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("failed to start model runner: {0}")]
    Spawn(String),
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("provider timed out after {0}s")]
    Timeout(u64),
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    Subprocess(providers::subprocess::SubprocessProvider),
    #[cfg(feature = "provider-http")]
    Http(providers::http::HttpProvider),
}

impl LlmProvider {
    /// Send `content` to the provider and return its text reply.
    pub async fn complete(&self, content: &str) -> Result<String, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.complete(content).await,
            LlmProvider::Subprocess(p) => p.complete(content).await,
            #[cfg(feature = "provider-http")]
            LlmProvider::Http(p) => p.complete(content).await,
        }
    }

    /// Short name for logs and the startup banner.
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Dummy(_) => "dummy",
            LlmProvider::Subprocess(_) => "subprocess",
            #[cfg(feature = "provider-http")]
            LlmProvider::Http(_) => "http",
        }
    }
}
