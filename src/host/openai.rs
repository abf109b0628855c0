use super::*;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};

/// Personality handed to the narration model for every request.
const SYSTEM_PROMPT: &str = "You are a friendly, natural game show host for a word toss-up game. \
Sound like a real person, not a robot! Talk like you're having a conversation with friends, \
use casual language and contractions, be genuinely excited but not over-the-top, and react \
naturally to what happens in the moment. Keep it short (1-2 sentences), sound natural and \
conversational. Never reveal puzzle answers.";

/// Narrator backed by any OpenAI-compatible chat completions endpoint.
pub struct OpenAiNarrator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiNarrator {
    /// Create a narrator for the given key, model and API base URL.
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        let client = Client::with_config(config);

        Self { client, model }
    }
}

#[async_trait]
impl Narrator for OpenAiNarrator {
    async fn narrate(&self, request: NarrateRequest) -> HostResult<String> {
        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()
                    .map_err(|e| HostError::ApiError(e.to_string()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(request.prompt.as_str())
                    .build()
                    .map_err(|e| HostError::ApiError(e.to_string()))?
                    .into(),
            ])
            .max_tokens(request.max_tokens)
            .temperature(0.8)
            .build()
            .map_err(|e| HostError::ApiError(e.to_string()))?;

        let response =
            tokio::time::timeout(request.timeout, self.client.chat().create(chat_request))
                .await
                .map_err(|_| HostError::Timeout(request.timeout))?
                .map_err(|e| HostError::ApiError(e.to_string()))?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| HostError::ParseError("No content in response".to_string()))?;

        Ok(text.trim().to_string())
    }

    fn name(&self) -> &str {
        "openai"
    }
}
