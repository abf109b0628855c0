use super::*;
use base64::Engine;
use serde_json::{json, Value};

/// Speech synthesis over a Higgs-Audio-style vLLM chat completions endpoint.
///
/// The response shape varies with server configuration, so audio is looked
/// for in the handful of places deployments have been seen to put it.
pub struct SpeechClient {
    client: reqwest::Client,
    config: TtsConfig,
}

/// Scene description steering the audio model toward game-show delivery.
const TTS_SYSTEM_PROMPT: &str = "Generate expressive game show host audio following instruction.\n\n\
<|scene_desc_start|>\n\
Audio is recorded in a professional game show studio with good acoustics. \
The speaker is an enthusiastic, friendly game show host with natural speech patterns, \
appropriate pacing, and engaging intonation suitable for a TV game show audience.\n\
<|scene_desc_end|>";

impl SpeechClient {
    pub fn new(config: TtsConfig) -> Self {
        let client = reqwest::Client::new();
        Self { client, config }
    }

    /// Synthesize one narration line into a base64 audio clip.
    pub async fn synthesize(&self, text: &str) -> HostResult<AudioClip> {
        let payload = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": TTS_SYSTEM_PROMPT },
                { "role": "user", "content": text },
            ],
            "max_tokens": 1024,
            "temperature": 0.3,
            "top_p": 0.95,
            "stop": ["<|end_of_text|>", "<|eot_id|>"],
            "stream": false,
        });

        let mut request = self
            .client
            .post(format!("{}/v1/chat/completions", self.config.base_url))
            .json(&payload)
            .timeout(self.config.timeout);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                HostError::Timeout(self.config.timeout)
            } else {
                HostError::ApiError(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(HostError::ApiError(format!(
                "TTS endpoint returned status {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| HostError::ParseError(e.to_string()))?;

        let audio = extract_audio(&body)
            .ok_or_else(|| HostError::ParseError("No audio data in response".to_string()))?;

        Ok(AudioClip {
            audio,
            audio_format: "mp3".to_string(),
        })
    }
}

/// Pull base64 audio out of the first choice, wherever the server put it.
fn extract_audio(body: &Value) -> Option<String> {
    let choice = body.get("choices")?.get(0)?;

    let candidates = [
        choice.get("audio"),
        choice.get("message").and_then(|m| m.get("audio")),
        choice.get("content").and_then(|c| c.get("audio")),
        choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.get("audio")),
    ];

    for candidate in candidates.into_iter().flatten() {
        match candidate {
            Value::String(s) => return Some(s.clone()),
            // Some servers return the raw sample bytes as a JSON array.
            Value::Array(bytes) => {
                let raw: Option<Vec<u8>> = bytes
                    .iter()
                    .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
                    .collect();
                if let Some(raw) = raw {
                    return Some(base64::engine::general_purpose::STANDARD.encode(raw));
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_audio_string_from_choice() {
        let body = json!({"choices": [{"audio": "QUJD"}]});
        assert_eq!(extract_audio(&body).as_deref(), Some("QUJD"));
    }

    #[test]
    fn extracts_audio_nested_in_message_content() {
        let body = json!({"choices": [{"message": {"content": {"audio": "QUJD"}}}]});
        assert_eq!(extract_audio(&body).as_deref(), Some("QUJD"));
    }

    #[test]
    fn encodes_audio_byte_arrays() {
        let body = json!({"choices": [{"message": {"audio": [65, 66, 67]}}]});
        assert_eq!(extract_audio(&body).as_deref(), Some("QUJD"));
    }

    #[test]
    fn missing_audio_yields_none() {
        let body = json!({"choices": [{"message": {"content": "just text"}}]});
        assert_eq!(extract_audio(&body), None);
    }
}
