use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::analysis::ports::{VisionAnalyzer, VisionError, VisionRequest};
use crate::config::Config;

/// OpenAI 兼容的 chat completions 视觉模型客户端
pub struct OpenAiVisionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: serde_json::Value,
    response_format: serde_json::Value,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiVisionClient {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
        }
    }

    fn build_body<'a>(&'a self, request: &VisionRequest<'_>) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages: json!([
                { "role": "system", "content": request.system_prompt },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": request.user_prompt },
                        {
                            "type": "image_url",
                            "image_url": { "url": request.image_url, "detail": "high" }
                        }
                    ]
                }
            ]),
            response_format: json!({ "type": "json_object" }),
            max_tokens: request.max_tokens,
            temperature: 0.7,
        }
    }
}

#[async_trait]
impl VisionAnalyzer for OpenAiVisionClient {
    async fn analyze(&self, request: VisionRequest<'_>) -> Result<String, VisionError> {
        tracing::info!(
            "Requesting {} analysis from {} (age {}, {})",
            request.mode.as_str(),
            self.model,
            request.child_age,
            request.age_group.label()
        );

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.build_body(&request))
            .send()
            .await
            .map_err(|e| VisionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VisionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| VisionError::Transport(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(VisionError::EmptyResponse)?;

        tracing::info!("Vision response received ({} chars)", content.len());
        Ok(content)
    }
}
