//! Strategy selection and the uniform classification entry point.

use super::local::{KeywordResolver, LocalParseResolver};
use super::remote::RemoteIntentResolver;
use super::{IntentResolver, Resolution, ResponseGenerator};
use crate::config::{BuddyConfig, IntentStrategy};
use crate::error::Result;
use tracing::{info, warn};

/// The one intent strategy chosen for this process.
pub struct IntentEngine {
    resolver: Box<dyn IntentResolver>,
}

impl IntentEngine {
    /// Build the configured strategy.
    ///
    /// With [`IntentStrategy::Auto`], the remote resolver is tried first,
    /// then the local parse, then keyword matching; a strategy that cannot
    /// be constructed hands over to the next one. A forced strategy that
    /// cannot be constructed is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if a forced strategy (or every strategy) fails to
    /// construct.
    pub async fn from_config(config: &BuddyConfig) -> Result<Self> {
        let resolver: Box<dyn IntentResolver> = match config.intent.strategy {
            IntentStrategy::Remote => {
                Box::new(RemoteIntentResolver::connect(&config.llm, &config.llm_rules).await?)
            }
            IntentStrategy::Local => Box::new(LocalParseResolver::new()?),
            IntentStrategy::Keyword => Box::new(KeywordResolver::new()?),
            IntentStrategy::Auto => Self::auto_select(config).await?,
        };
        info!(strategy = resolver.name(), "intent strategy selected");
        Ok(Self { resolver })
    }

    async fn auto_select(config: &BuddyConfig) -> Result<Box<dyn IntentResolver>> {
        match RemoteIntentResolver::connect(&config.llm, &config.llm_rules).await {
            Ok(remote) => return Ok(Box::new(remote)),
            Err(e) => warn!("remote intent resolver unavailable: {e}"),
        }
        match LocalParseResolver::new() {
            Ok(local) => return Ok(Box::new(local)),
            Err(e) => warn!("local parse resolver unavailable: {e}"),
        }
        Ok(Box::new(KeywordResolver::new()?))
    }

    /// Wrap an already-built strategy.
    pub fn with_resolver(resolver: Box<dyn IntentResolver>) -> Self {
        Self { resolver }
    }

    /// Name of the active strategy.
    pub fn strategy_name(&self) -> &'static str {
        self.resolver.name()
    }

    /// Classify one utterance.
    pub async fn process_text(&self, text: &str) -> Resolution {
        let text = text.trim();
        if text.is_empty() {
            return Resolution::unknown();
        }
        self.resolver.process_text(text).await
    }

    /// Confirmation text capability of the active strategy.
    pub fn responder(&self) -> Option<&dyn ResponseGenerator> {
        self.resolver.responder()
    }

    /// Stop the active strategy's background work.
    pub async fn shutdown(&self) {
        self.resolver.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::intent::Intent;

    fn config(strategy: IntentStrategy) -> BuddyConfig {
        let mut config = BuddyConfig::default();
        config.intent.strategy = strategy;
        config
    }

    #[tokio::test]
    async fn auto_falls_back_to_local_parse_when_remote_is_disabled() {
        let mut config = config(IntentStrategy::Auto);
        config.llm.enabled = false;

        let engine = IntentEngine::from_config(&config).await.unwrap();
        assert_eq!(engine.strategy_name(), "local-parse");
        assert!(engine.responder().is_none());
    }

    #[tokio::test]
    async fn auto_falls_back_on_bad_url() {
        let mut config = config(IntentStrategy::Auto);
        config.llm.base_url = "ftp://example.com".into();

        let engine = IntentEngine::from_config(&config).await.unwrap();
        assert_eq!(engine.strategy_name(), "local-parse");
    }

    #[tokio::test]
    async fn forced_remote_with_bad_url_is_an_error() {
        let mut config = config(IntentStrategy::Remote);
        config.llm.base_url = "::nope".into();
        assert!(IntentEngine::from_config(&config).await.is_err());
    }

    #[tokio::test]
    async fn keyword_strategy_is_honoured() {
        let engine = IntentEngine::from_config(&config(IntentStrategy::Keyword))
            .await
            .unwrap();
        assert_eq!(engine.strategy_name(), "keyword");

        let r = engine.process_text("scroll up 10").await;
        assert_eq!(r.intent(), Intent::Scroll);
    }

    #[tokio::test]
    async fn blank_input_is_unknown() {
        let engine = IntentEngine::from_config(&config(IntentStrategy::Local))
            .await
            .unwrap();
        assert_eq!(engine.process_text("   ").await, Resolution::unknown());
        engine.shutdown().await;
    }
}
