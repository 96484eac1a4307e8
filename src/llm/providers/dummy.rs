//! Dummy provider: echoes input back prefixed with `[echo]`.
//! Lets the whole chat flow run without a model runner installed.

use crate::llm::ProviderError;

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn complete(&self, content: &str) -> Result<String, ProviderError> {
        Ok(format!("[echo] {content}"))
    }
}
