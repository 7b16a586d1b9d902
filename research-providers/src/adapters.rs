//! ABOUTME: Thin HTTP adapters wiring OpenAI/Anthropic/Gemini into LlmProvider
//! ABOUTME: Constructed once at the composition root from ResearchConfig

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use research_core::{GenerateOptions, LlmProvider, ResearchError, TokenInfo};
use serde_json::{json, Value};

use crate::multi_provider::ANTHROPIC_MAX_TOKENS_FLOOR;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Vendor {
    OpenAi,
    Anthropic,
    Gemini,
}

/// Shared chat-completion adapter; vendor-specific request/response shapes
/// differ only in `build_request`/`extract_text`/`extract_usage`, kept as
/// match arms on `Vendor` rather than a trait hierarchy per provider.
pub struct HttpChatProvider {
    name: &'static str,
    vendor: Vendor,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpChatProvider {
    pub fn openai(api_key: String, model: Option<String>) -> Self {
        Self {
            name: "openai",
            vendor: Vendor::OpenAi,
            client: reqwest::Client::new(),
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key,
            model: model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
        }
    }

    pub fn anthropic(api_key: String, model: Option<String>) -> Self {
        Self {
            name: "anthropic",
            vendor: Vendor::Anthropic,
            client: reqwest::Client::new(),
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            api_key,
            model: model.unwrap_or_else(|| "claude-3-5-sonnet-latest".to_string()),
        }
    }

    pub fn gemini(api_key: String, model: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| "gemini-1.5-pro".to_string());
        Self {
            name: "gemini",
            vendor: Vendor::Gemini,
            client: reqwest::Client::new(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            api_key,
            model,
        }
    }

    fn request_url(&self) -> String {
        match self.vendor {
            Vendor::Gemini => format!(
                "{}/{}:generateContent?key={}",
                self.endpoint, self.model, self.api_key
            ),
            Vendor::OpenAi | Vendor::Anthropic => self.endpoint.clone(),
        }
    }

    /// Builds the vendor-shaped request body. `max_tokens` is resolved
    /// per §4.2: Anthropic requires an explicit value (floor 8192 when the
    /// caller omitted one); other vendors may omit the field entirely.
    fn build_request(&self, prompt: &str, options: &GenerateOptions) -> Value {
        match self.vendor {
            Vendor::OpenAi => {
                let mut body = json!({
                    "model": self.model,
                    "messages": [{"role": "user", "content": prompt}],
                });
                if let Some(t) = options.temperature {
                    body["temperature"] = json!(t);
                }
                if let Some(m) = options.max_tokens {
                    body["max_tokens"] = json!(m);
                }
                body
            }
            Vendor::Anthropic => {
                let max_tokens = options.max_tokens.unwrap_or(ANTHROPIC_MAX_TOKENS_FLOOR);
                let mut body = json!({
                    "model": self.model,
                    "max_tokens": max_tokens,
                    "messages": [{"role": "user", "content": prompt}],
                });
                if let Some(t) = options.temperature {
                    body["temperature"] = json!(t);
                }
                body
            }
            Vendor::Gemini => {
                let mut body = json!({
                    "contents": [{"parts": [{"text": prompt}]}],
                });
                let mut generation_config = serde_json::Map::new();
                if let Some(t) = options.temperature {
                    generation_config.insert("temperature".to_string(), json!(t));
                }
                if let Some(m) = options.max_tokens {
                    generation_config.insert("maxOutputTokens".to_string(), json!(m));
                }
                if !generation_config.is_empty() {
                    body["generationConfig"] = Value::Object(generation_config);
                }
                body
            }
        }
    }

    fn extract_text(&self, value: &Value) -> String {
        match self.vendor {
            Vendor::OpenAi => value["choices"][0]["message"]["content"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            Vendor::Anthropic => value["content"][0]["text"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            Vendor::Gemini => value["candidates"][0]["content"]["parts"][0]["text"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
        }
    }

    fn extract_usage(&self, value: &Value) -> TokenInfo {
        match self.vendor {
            Vendor::OpenAi => {
                let usage = &value["usage"];
                TokenInfo {
                    prompt_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0),
                    completion_tokens: usage["completion_tokens"].as_u64().unwrap_or(0),
                    total_tokens: usage["total_tokens"].as_u64().unwrap_or(0),
                    estimated: usage["total_tokens"].is_null(),
                }
            }
            Vendor::Anthropic => {
                let usage = &value["usage"];
                let prompt_tokens = usage["input_tokens"].as_u64().unwrap_or(0);
                let completion_tokens = usage["output_tokens"].as_u64().unwrap_or(0);
                TokenInfo {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: prompt_tokens + completion_tokens,
                    estimated: usage["input_tokens"].is_null(),
                }
            }
            Vendor::Gemini => {
                let usage = &value["usageMetadata"];
                let prompt_tokens = usage["promptTokenCount"].as_u64().unwrap_or(0);
                let completion_tokens = usage["candidatesTokenCount"].as_u64().unwrap_or(0);
                let total_tokens = usage["totalTokenCount"]
                    .as_u64()
                    .unwrap_or(prompt_tokens + completion_tokens);
                TokenInfo {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens,
                    estimated: usage["totalTokenCount"].is_null(),
                }
            }
        }
    }
}

#[async_trait]
impl LlmProvider for HttpChatProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<(String, TokenInfo), ResearchError> {
        let body = self.build_request(prompt, options);
        let mut request = self.client.post(self.request_url()).json(&body);
        request = match self.vendor {
            Vendor::Anthropic => request
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01"),
            Vendor::OpenAi => request.bearer_auth(&self.api_key),
            Vendor::Gemini => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| ResearchError::network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ResearchError::llm(format!("{status}: {text}")));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ResearchError::llm(e.to_string()))?;

        let text = self.extract_text(&value);
        let tokens = self.extract_usage(&value);

        Ok((text, tokens))
    }

    async fn stream(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<BoxStream<'static, Result<String, ResearchError>>, ResearchError> {
        // Calls go through plain request/response HTTP rather than SSE
        // chunk parsing here; `stream` still honours the first-chunk-
        // commits discipline in `multi_provider` by yielding the whole
        // text as a single chunk.
        let (text, _) = self.generate(prompt, options).await?;
        Ok(Box::pin(stream::once(async move { Ok(text) })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anthropic_request_floors_max_tokens_to_8192_when_unset() {
        let provider = HttpChatProvider::anthropic("key".to_string(), None);
        let body = provider.build_request("hello", &GenerateOptions::default());
        assert_eq!(body["max_tokens"], json!(8192));
    }

    #[test]
    fn anthropic_request_keeps_caller_max_tokens() {
        let provider = HttpChatProvider::anthropic("key".to_string(), None);
        let options = GenerateOptions {
            max_tokens: Some(500),
            temperature: None,
        };
        let body = provider.build_request("hello", &options);
        assert_eq!(body["max_tokens"], json!(500));
    }

    #[test]
    fn openai_request_omits_max_tokens_when_unset() {
        let provider = HttpChatProvider::openai("key".to_string(), None);
        let body = provider.build_request("hello", &GenerateOptions::default());
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn gemini_request_uses_contents_shape() {
        let provider = HttpChatProvider::gemini("key".to_string(), None);
        let body = provider.build_request("hello", &GenerateOptions::default());
        assert_eq!(body["contents"][0]["parts"][0]["text"], json!("hello"));
    }

    #[test]
    fn gemini_url_carries_api_key_as_query_param() {
        let provider = HttpChatProvider::gemini("secret-key".to_string(), None);
        assert!(provider
            .request_url()
            .ends_with(":generateContent?key=secret-key"));
    }

    #[test]
    fn openai_extracts_text_from_choices() {
        let provider = HttpChatProvider::openai("key".to_string(), None);
        let value = json!({
            "choices": [{"message": {"content": "hi there"}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5},
        });
        assert_eq!(provider.extract_text(&value), "hi there");
        let tokens = provider.extract_usage(&value);
        assert_eq!(tokens.total_tokens, 5);
        assert!(!tokens.estimated);
    }

    #[test]
    fn anthropic_extracts_text_from_content_block() {
        let provider = HttpChatProvider::anthropic("key".to_string(), None);
        let value = json!({
            "content": [{"type": "text", "text": "hi there"}],
            "usage": {"input_tokens": 4, "output_tokens": 6},
        });
        assert_eq!(provider.extract_text(&value), "hi there");
        let tokens = provider.extract_usage(&value);
        assert_eq!(tokens.prompt_tokens, 4);
        assert_eq!(tokens.completion_tokens, 6);
        assert_eq!(tokens.total_tokens, 10);
    }

    #[test]
    fn gemini_extracts_text_from_candidates() {
        let provider = HttpChatProvider::gemini("key".to_string(), None);
        let value = json!({
            "candidates": [{"content": {"parts": [{"text": "hi there"}]}}],
            "usageMetadata": {"promptTokenCount": 1, "candidatesTokenCount": 2, "totalTokenCount": 3},
        });
        assert_eq!(provider.extract_text(&value), "hi there");
        assert_eq!(provider.extract_usage(&value).total_tokens, 3);
    }

    #[test]
    fn unavailable_when_api_key_empty() {
        let provider = HttpChatProvider::openai(String::new(), None);
        assert!(!provider.is_available());
    }
}
