use crate::config::LlmConfig;
use crate::types::CompanyProfile;
use crate::{CrawlerError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Chat completion request body for an OpenAI-compatible endpoint.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize)]
struct Message {
    role: String,
    content: String,
}

impl Message {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// The `LlmClient` struct talks to an OpenAI-compatible chat completions
/// endpoint and turns the site document into a structured `CompanyProfile`.
pub struct LlmClient {
    /// The HTTP client used for API requests.
    client: Client,
    /// The endpoint, model, and sampling settings.
    config: LlmConfig,
}

impl LlmClient {
    /// Creates a new `LlmClient` with the given configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - The endpoint, model, and sampling settings.
    ///
    /// # Returns
    ///
    /// A new instance of `LlmClient`.
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Sends one chat completion request and returns the first choice's
    /// content.
    ///
    /// # Arguments
    ///
    /// * `system` - The system prompt.
    /// * `user` - The user prompt.
    ///
    /// # Returns
    ///
    /// A `Result` containing the model's response text, or an error if the
    /// request failed or the response carried no choices.
    pub async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![Message::system(system), Message::user(user)],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );

        let mut builder = self.client.post(&url).json(&request);
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }

        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CrawlerError::LlmError(format!(
                "endpoint returned {}: {}",
                status, body
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| CrawlerError::LlmError(format!("malformed response: {}", e)))?;

        if let Some(usage) = &chat.usage {
            debug!(
                "LLM usage: {} prompt + {} completion = {} tokens",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }

        chat.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CrawlerError::LlmError("response carried no choices".to_string()))
    }

    /// Runs the extraction prompts and parses the response into a
    /// `CompanyProfile`.
    ///
    /// A response that is not parseable JSON, even after cleanup, yields the
    /// fallback profile instead of failing the pipeline: the crawl data is
    /// still worth recording.
    ///
    /// # Arguments
    ///
    /// * `system` - The extraction system prompt.
    /// * `user` - The user prompt carrying the site content.
    ///
    /// # Returns
    ///
    /// A `Result` containing the extracted (or fallback) profile. Transport
    /// errors still fail.
    pub async fn extract_profile(&self, system: &str, user: &str) -> Result<CompanyProfile> {
        let raw = self.chat(system, user).await?;

        match parse_profile(&raw) {
            Ok(profile) => Ok(profile),
            Err(e) => {
                warn!("Could not parse profile response, using fallback: {}", e);
                Ok(fallback_profile())
            }
        }
    }
}

/// Parses a model response into a `CompanyProfile`: code fences stripped,
/// then a direct parse, then a parse after best-effort JSON cleanup.
pub fn parse_profile(raw: &str) -> Result<CompanyProfile> {
    let stripped = strip_code_fences(raw);

    match serde_json::from_str(stripped) {
        Ok(profile) => Ok(profile),
        Err(first_err) => {
            let cleaned = cleanup_json(stripped);
            serde_json::from_str(&cleaned).map_err(|_| {
                CrawlerError::ProfileError(format!("invalid JSON: {}", first_err))
            })
        }
    }
}

/// Removes a surrounding markdown code fence (```json ... ```), if present.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();

    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // the fence line may carry a language tag
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches(['\r', '\n'])
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

/// Best-effort cleanup of common model JSON mistakes: explanatory text
/// around the object and trailing commas before a closing bracket.
fn cleanup_json(text: &str) -> String {
    let start = text.find('{');
    let end = text.rfind('}');
    let body = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    };

    // strip trailing commas outside of string literals
    let mut out = String::with_capacity(body.len());
    let mut in_string = false;
    let mut escaped = false;
    let chars: Vec<char> = body.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace()).copied();
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// The profile recorded when the model's response was unusable.
fn fallback_profile() -> CompanyProfile {
    let mut profile = CompanyProfile::default();
    profile.company_info.name = Some("Unknown Company".to_string());
    profile.company_info.description =
        Some("Company information extraction failed due to an unparseable response.".to_string());
    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests fence stripping with and without a language tag.
    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }

    /// Tests the trailing comma and surrounding-text cleanup.
    #[test]
    fn test_cleanup_json() {
        let dirty = "Here is the data: {\"services\": [{\"name\": \"A\", \"description\": null,}],} done";
        let cleaned = cleanup_json(dirty);
        assert_eq!(
            cleaned,
            "{\"services\": [{\"name\": \"A\", \"description\": null}]}"
        );
    }

    /// Tests that commas inside string values survive cleanup.
    #[test]
    fn test_cleanup_preserves_strings() {
        let text = r#"{"name": "Acme, Inc.,"}"#;
        assert_eq!(cleanup_json(text), text);
    }

    /// Tests profile parsing of a fenced, slightly malformed response.
    #[test]
    fn test_parse_profile_with_cleanup() {
        let raw = "```json\n{\"company_info\": {\"name\": \"Acme\",}, \"services\": [], \"products\": [],}\n```";
        let profile = parse_profile(raw).unwrap();
        assert_eq!(profile.company_info.name.as_deref(), Some("Acme"));
    }

    /// Tests that hopeless responses are rejected (the client then records
    /// the fallback profile).
    #[test]
    fn test_parse_profile_garbage() {
        assert!(parse_profile("I could not find any company data.").is_err());
        let fallback = fallback_profile();
        assert_eq!(fallback.company_info.name.as_deref(), Some("Unknown Company"));
    }

    /// Tests a chat round trip against a mock endpoint.
    #[tokio::test]
    async fn test_chat_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices": [{"message": {"role": "assistant", "content": "hello"}}],
                    "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}}"#,
            )
            .create_async()
            .await;

        let config = LlmConfig {
            endpoint: server.url(),
            api_key: String::new(),
            model: "test-model".to_string(),
            temperature: 0.1,
            max_tokens: 128,
        };

        let client = LlmClient::new(config);
        let reply = client.chat("system", "user").await.unwrap();

        assert_eq!(reply, "hello");
        mock.assert_async().await;
    }

    /// Tests that a non-2xx response surfaces as an LLM error.
    #[tokio::test]
    async fn test_chat_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let config = LlmConfig {
            endpoint: server.url(),
            api_key: String::new(),
            model: "test-model".to_string(),
            temperature: 0.1,
            max_tokens: 128,
        };

        let client = LlmClient::new(config);
        let err = client.chat("system", "user").await.unwrap_err();
        assert!(matches!(err, CrawlerError::LlmError(_)));
    }
}
