use serde_json::{json, Value};
use thiserror::Error;
use serde::Deserialize;
use reqwest::Client;
use tracing::{info, error, debug};

use crate::config::Config;
use crate::image::{ImageError, ImageRef};

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Gemini API key is not configured")] MissingApiKey,
    #[error("HTTP error: {0}")] Http(String),
    #[error("API error: status={status} body={body}")] Api { status: u16, body: String },
    #[error("parse error: {0}")] Parse(String),
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let Value::String(s) = val {
                        if s.len() > 100 && s.is_ascii() {
                            *val = Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn preview(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let head: String = text.chars().take(limit).collect();
    format!("{}...", head)
}

pub fn text_part(text: &str) -> Value {
    json!({ "text": text })
}

pub fn image_part(image: &ImageRef) -> Value {
    json!({ "inlineData": { "mimeType": image.mime_type(), "data": image.to_base64() } })
}

pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Fails with [`GeminiError::MissingApiKey`] before any network traffic.
    pub async fn generate_content(
        &self,
        model: &str,
        parts: Vec<Value>,
        generation_config: Option<Value>,
    ) -> Result<GeminiResponse, GeminiError> {
        let api_key = self.api_key.as_deref().ok_or(GeminiError::MissingApiKey)?;
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let mut request_body = json!({
            "contents": [{ "role": "user", "parts": parts }]
        });
        if let Some(cfg) = generation_config {
            request_body["generationConfig"] = cfg;
        }

        info!("🔗 Making request to: {}", url);
        if tracing::enabled!(tracing::Level::DEBUG) {
            let mut logged = request_body.clone();
            truncate_base64_in_json(&mut logged);
            debug!("📤 Request body: {}", serde_json::to_string_pretty(&logged).unwrap_or_default());
        }

        let response = self.client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        let response_text = response.text().await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        if !status.is_success() {
            error!("❌ API Error response: {}", preview(&response_text, 800));
            return Err(GeminiError::Api { status: status.as_u16(), body: response_text });
        }

        if tracing::enabled!(tracing::Level::DEBUG) {
            let logged = match serde_json::from_str::<Value>(&response_text) {
                Ok(mut v) => {
                    truncate_base64_in_json(&mut v);
                    serde_json::to_string_pretty(&v).unwrap_or_default()
                }
                Err(_) => preview(&response_text, 1000),
            };
            debug!("📥 Raw Gemini API response: {}", logged);
        }

        serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Parse(format!("{}: {}", e, preview(&response_text, 200))))
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData
    },
    Text { text: String },
    #[allow(dead_code)]
    Other(Value)
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType", default)]
    mime_type: String,
}

impl GeminiResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates.first().into_iter().flat_map(|c| c.content.parts.iter())
    }

    /// Text parts of the first candidate, joined. `None` when there is no non-blank text.
    pub fn text(&self) -> Option<String> {
        let joined: String = self
            .parts()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        let trimmed = joined.trim();
        if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
    }

    /// First inline image of the first candidate.
    pub fn first_image(&self) -> Option<Result<ImageRef, ImageError>> {
        self.parts().find_map(|p| match p {
            Part::Inline { inline_data } => {
                info!("🎯 Found image data with mime type: {}", inline_data.mime_type);
                Some(ImageRef::from_inline(&inline_data.mime_type, &inline_data.data))
            }
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::tests::TINY_PNG_B64;
    use pretty_assertions::assert_eq;

    fn response(value: Value) -> GeminiResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn text_joins_parts_of_first_candidate() {
        let resp = response(json!({
            "candidates": [
                { "content": { "parts": [{ "text": "{\"a\":" }, { "text": " 1}" }] } },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        }));
        assert_eq!(resp.text().as_deref(), Some("{\"a\": 1}"));
    }

    #[test]
    fn blank_or_missing_text_is_none() {
        assert_eq!(response(json!({})).text(), None);
        assert_eq!(response(json!({ "candidates": [{ "content": { "parts": [{ "text": "  " }] } }] })).text(), None);
    }

    #[test]
    fn first_image_skips_text_and_unknown_parts() {
        let resp = response(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Here you go" },
                { "thoughtSignature": "xyz" },
                { "inlineData": { "mimeType": "image/png", "data": TINY_PNG_B64 } }
            ] } }]
        }));
        let image = resp.first_image().unwrap().unwrap();
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(resp.text().as_deref(), Some("Here you go"));
    }

    #[test]
    fn truncation_only_touches_long_data_fields() {
        let long = "A".repeat(300);
        let mut v = json!({ "parts": [{ "inlineData": { "data": long, "mimeType": "image/png" } }, { "text": "short" }] });
        truncate_base64_in_json(&mut v);
        let data = v["parts"][0]["inlineData"]["data"].as_str().unwrap();
        assert!(data.ends_with("[truncated 250 chars]"));
        assert_eq!(v["parts"][1]["text"], "short");
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let client = GeminiClient::new(&Config {
            api_base: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        });
        let err = client.generate_content("m", vec![text_part("hi")], None).await.unwrap_err();
        assert!(matches!(err, GeminiError::MissingApiKey));
    }
}
