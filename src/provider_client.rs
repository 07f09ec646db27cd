use crate::ai_validator;
use crate::cache_validator::{self, ResponseCache};
use crate::circuit_breaker::ProviderCircuitBreaker;
use crate::errors::AppError;
use crate::prompts::SYSTEM_PROMPT;
use failsafe::CircuitBreaker;
use serde_json::json;
use std::future::Future;
use std::time::Duration;

/// Source of free-text risk analysis. Output is untrusted and always goes
/// through `ai_validator` before use.
pub trait RiskProvider: Send + Sync {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, AppError>> + Send;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Client for an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct HttpRiskProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpRiskProvider {
    /// Creates a new `HttpRiskProvider`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the provider API, without the `/chat/completions` suffix.
    /// * `api_key` - Bearer token.
    /// * `model` - Model name sent with every request.
    /// * `timeout` - Per-request client timeout.
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create provider client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }

    async fn chat(&self, prompt: &str) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::info!("Requesting risk analysis from provider: {}", url);

        let body = json!({
            "model": self.model,
            "temperature": 0.2,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ]
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Provider returned {}: {}",
                status, error_text
            )));
        }

        let data: serde_json::Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse provider response: {}", e))
        })?;

        data.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                tracing::warn!("Unexpected provider response format: {:?}", data);
                AppError::ExternalApiError(
                    "Provider response missing choices[0].message.content".to_string(),
                )
            })
    }
}

impl RiskProvider for HttpRiskProvider {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, AppError>> + Send {
        self.chat(prompt)
    }
}

/// The configured provider. Selection is explicit and passed to every
/// assessment call.
#[derive(Clone)]
pub enum Provider {
    Disabled,
    Http(HttpRiskProvider),
}

impl RiskProvider for Provider {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, AppError>> + Send {
        async move {
            match self {
                Provider::Disabled => Err(AppError::ExternalApiError(
                    "External risk provider is disabled".to_string(),
                )),
                Provider::Http(client) => client.complete(prompt).await,
            }
        }
    }

    fn is_enabled(&self) -> bool {
        matches!(self, Provider::Http(_))
    }
}

/// Provider call path shared by all services: response cache, circuit
/// breaker, then a hard deadline around the provider call.
#[derive(Clone)]
pub struct ProviderGateway<P = Provider> {
    provider: P,
    breaker: ProviderCircuitBreaker,
    cache: ResponseCache,
    deadline: Duration,
}

impl<P: RiskProvider> ProviderGateway<P> {
    pub fn new(
        provider: P,
        breaker: ProviderCircuitBreaker,
        cache: ResponseCache,
        deadline: Duration,
    ) -> Self {
        Self {
            provider,
            breaker,
            cache,
            deadline,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_enabled()
    }

    /// Raw provider text for `prompt`, served from cache when possible.
    pub async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        if !self.provider.is_enabled() {
            return Err(AppError::ExternalApiError(
                "External risk provider is disabled".to_string(),
            ));
        }

        let key = cache_validator::prompt_key(prompt);
        if let Some(cached) = cache_validator::get_validated(&self.cache, &key).await {
            return Ok(cached);
        }

        if !self.breaker.is_call_permitted() {
            tracing::warn!("Provider circuit open, skipping external call");
            return Err(AppError::ExternalApiError(
                "Provider circuit breaker is open".to_string(),
            ));
        }

        let outcome = match tokio::time::timeout(self.deadline, self.provider.complete(prompt)).await
        {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(format!(
                "Provider did not answer within {}s",
                self.deadline.as_secs()
            ))),
        };

        // Feed the outcome into the breaker's failure policy.
        let _ = self.breaker.call(|| outcome.as_ref().map(|_| ()).map_err(|_| ()));

        match outcome {
            Ok(text) => {
                if ai_validator::extract_json(&text).is_some() {
                    cache_validator::insert_validated(&self.cache, key, text.clone()).await;
                } else {
                    tracing::debug!("Provider answer has no JSON object, not caching");
                }
                Ok(text)
            }
            Err(e) => {
                tracing::error!("Provider call failed: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_validator::build_response_cache;
    use crate::circuit_breaker::create_provider_circuit_breaker;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        reply: Option<&'static str>,
    }

    impl RiskProvider for CountingProvider {
        fn complete(&self, _prompt: &str) -> impl Future<Output = Result<String, AppError>> + Send {
            let calls = self.calls.clone();
            let reply = self.reply;
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                reply
                    .map(str::to_string)
                    .ok_or_else(|| AppError::ExternalApiError("boom".to_string()))
            }
        }
    }

    fn gateway(reply: Option<&'static str>) -> (ProviderGateway<CountingProvider>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let gateway = ProviderGateway::new(
            CountingProvider {
                calls: calls.clone(),
                reply,
            },
            create_provider_circuit_breaker(),
            build_response_cache(Duration::from_secs(60)),
            Duration::from_secs(5),
        );
        (gateway, calls)
    }

    #[tokio::test]
    async fn test_client_creation() {
        let client = HttpRiskProvider::new(
            "https://example.com/v1/".to_string(),
            "key".to_string(),
            "model".to_string(),
            Duration::from_secs(5),
        );
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url, "https://example.com/v1");
    }

    #[tokio::test]
    async fn test_disabled_provider_is_rejected() {
        let gateway = ProviderGateway::new(
            Provider::Disabled,
            create_provider_circuit_breaker(),
            build_response_cache(Duration::from_secs(60)),
            Duration::from_secs(5),
        );
        assert!(!gateway.is_enabled());
        assert!(gateway.complete("anything").await.is_err());
    }

    #[tokio::test]
    async fn test_repeated_prompt_served_from_cache() {
        let (gateway, calls) = gateway(Some("{\"overallScore\": 20}"));

        gateway.complete("assess v-1").await.unwrap();
        gateway.complete("assess v-1").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_answer_without_json_is_not_cached() {
        let (gateway, calls) = gateway(Some("I am unable to assess this vendor."));

        let first = gateway.complete("assess v-2").await.unwrap();
        gateway.complete("assess v-2").await.unwrap();

        assert_eq!(first, "I am unable to assess this vendor.");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_breaker_stops_calls_after_failures() {
        let (gateway, calls) = gateway(None);

        for i in 0..8 {
            assert!(gateway.complete(&format!("prompt {}", i)).await.is_err());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }
}
