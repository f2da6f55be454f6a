//! Text generation providers and the primary → secondary fallback chain
//!
//! Every generation call goes through the provider's rate limiter first.
//! Fallback is sequential: the secondary is only tried after the primary
//! has failed.

use crate::error::RefinementError;
use crate::models::Provider;
use crate::rate_limiter::RateLimiter;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

pub mod client;
pub use client::ChatCompletionClient;

/// An opaque text-in, text-out generation backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// A generator together with the quota it must respect.
#[derive(Clone)]
pub struct ProviderSlot {
    generator: Arc<dyn TextGenerator>,
    limiter: Arc<RateLimiter>,
}

impl ProviderSlot {
    pub fn new(generator: Arc<dyn TextGenerator>, limiter: Arc<RateLimiter>) -> Self {
        Self { generator, limiter }
    }

    pub fn name(&self) -> &str {
        self.generator.name()
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.limiter.acquire().await;
        self.generator.generate(prompt).await
    }
}

/// Reply accepted by the chain, with the provider that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Answered<T> {
    pub value: T,
    pub provider: Provider,
}

#[derive(Clone)]
pub struct FallbackChain {
    primary: ProviderSlot,
    secondary: ProviderSlot,
}

impl FallbackChain {
    pub fn new(primary: ProviderSlot, secondary: ProviderSlot) -> Self {
        Self { primary, secondary }
    }

    fn slot(&self, provider: Provider) -> &ProviderSlot {
        match provider {
            Provider::Primary => &self.primary,
            Provider::Secondary => &self.secondary,
        }
    }

    /// Raw generation through one provider.
    pub async fn generate_text(&self, prompt: &str, provider: Provider) -> Result<String> {
        self.slot(provider).generate(prompt).await
    }

    /// Generate with `prompt` and `interpret` the reply, falling back to the
    /// secondary provider if either step fails on the primary.
    ///
    /// A reply that `interpret` rejects counts as a provider failure.
    pub async fn call_with_fallback<T, F>(&self, prompt: &str, interpret: F) -> Result<Answered<T>>
    where
        F: Fn(&str) -> Result<T> + Send + Sync,
        T: Send,
    {
        let mut failures = Vec::with_capacity(2);

        for provider in [Provider::Primary, Provider::Secondary] {
            let slot = self.slot(provider);
            debug!(%provider, name = slot.name(), "Calling provider");

            let outcome = slot
                .generate(prompt)
                .await
                .and_then(|reply| interpret(&reply));

            match outcome {
                Ok(value) => return Ok(Answered { value, provider }),
                Err(e) => {
                    warn!(%provider, name = slot.name(), error = %e, "Provider call failed");
                    failures.push(format!("{} ({}): {}", provider, slot.name(), e));
                }
            }
        }

        Err(RefinementError::Llm(format!(
            "All providers failed: {}",
            failures.join("; ")
        )))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted generators shared by unit tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays canned replies in order; `Err` entries simulate transport failures.
    pub struct ScriptedGenerator {
        name: String,
        replies: Mutex<VecDeque<std::result::Result<String, String>>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        pub fn new(name: &str, replies: Vec<std::result::Result<&str, &str>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            })
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        fn name(&self) -> &str {
            &self.name
        }

        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.replies.lock().unwrap().pop_front() {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(message)) => Err(RefinementError::Provider {
                    provider: self.name.clone(),
                    message,
                }),
                None => Err(RefinementError::Llm("script exhausted".to_string())),
            }
        }
    }

    pub fn chain(primary: Arc<ScriptedGenerator>, secondary: Arc<ScriptedGenerator>) -> FallbackChain {
        let limiter = || Arc::new(RateLimiter::new(100, Duration::from_secs(60)));
        FallbackChain::new(
            ProviderSlot::new(primary, limiter()),
            ProviderSlot::new(secondary, limiter()),
        )
    }
}
