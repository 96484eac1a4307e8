//! LLM provider implementations.
//!
//! `build(config)` is the factory, called once at startup.
//! Adding a new backend = new module + new match arm.

pub mod dummy;
#[cfg(feature = "provider-http")]
pub mod http;
pub mod subprocess;

use std::time::Duration;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ProviderError};

/// Construct the configured `LlmProvider`.
pub fn build(config: &LlmConfig) -> Result<LlmProvider, ProviderError> {
    let timeout = Duration::from_secs(config.timeout_seconds);
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider)),
        "subprocess" | "ollama" => {
            let sp = &config.subprocess;
            Ok(LlmProvider::Subprocess(subprocess::SubprocessProvider::new(
                sp.command.clone(),
                sp.args.clone(),
                timeout,
            )
            .with_host(sp.host.clone())
            .with_path_dirs(sp.path_dirs.clone())))
        }
        #[cfg(feature = "provider-http")]
        "http" => Ok(LlmProvider::Http(http::HttpProvider::new(
            config.http.url.clone(),
            timeout,
        )?)),
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn builds_dummy() {
        let cfg = Config::test_default(std::path::Path::new("/tmp"));
        assert_eq!(build(&cfg.llm).unwrap().name(), "dummy");
    }

    #[test]
    fn builds_subprocess_under_both_names() {
        let mut cfg = Config::test_default(std::path::Path::new("/tmp")).llm;
        for name in ["subprocess", "ollama"] {
            cfg.provider = name.into();
            assert_eq!(build(&cfg).unwrap().name(), "subprocess");
        }
    }

    #[test]
    fn unknown_provider_errors() {
        let mut cfg = Config::test_default(std::path::Path::new("/tmp")).llm;
        cfg.provider = "gpt-9".into();
        assert!(matches!(build(&cfg), Err(ProviderError::UnknownProvider(p)) if p == "gpt-9"));
    }
}
