//! The six model operations the workflow depends on.
//!
//! Face analysis, refinement, image synthesis and chat edits are blocking: their
//! errors propagate. Style suggestions and barber instructions are enhancements and
//! degrade to an empty list or a fallback text instead, except when the API key is
//! missing, which is never softened.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn, error};

use crate::config::Config;
use crate::gemini::{image_part, text_part, GeminiClient, GeminiError};
use crate::i18n::Language;
use crate::image::{ImageError, ImageRef};
use crate::models::{ChatEdit, FaceAnalysisResult, FaceDimensions, HairstyleRequest, UserProfile};
use crate::prompts::{self, RenderMode};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gemini API key is not configured")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("analysis failed: {0}")]
    Analysis(String),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

impl GatewayError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, GatewayError::MissingApiKey)
    }
}

impl From<GeminiError> for GatewayError {
    fn from(e: GeminiError) -> Self {
        match e {
            GeminiError::MissingApiKey => GatewayError::MissingApiKey,
            GeminiError::Parse(msg) => GatewayError::MalformedResponse(msg),
            other => GatewayError::Transport(other.to_string()),
        }
    }
}

impl From<ImageError> for GatewayError {
    fn from(e: ImageError) -> Self {
        GatewayError::MalformedResponse(format!("inline image: {}", e))
    }
}

#[async_trait]
pub trait StylistGateway: Send + Sync {
    async fn analyze_face_shape(
        &self,
        image: &ImageRef,
        profile: &UserProfile,
        lang: Language,
    ) -> Result<FaceAnalysisResult, GatewayError>;

    async fn refine_face_analysis(
        &self,
        image: &ImageRef,
        profile: &UserProfile,
        dimensions: &FaceDimensions,
        lang: Language,
    ) -> Result<FaceAnalysisResult, GatewayError>;

    /// Soft-fails to an empty list.
    async fn get_more_style_recommendations(
        &self,
        analysis: &FaceAnalysisResult,
        current_styles: &[String],
        lang: Language,
    ) -> Result<Vec<String>, GatewayError>;

    async fn generate_hairstyle_image(
        &self,
        image: &ImageRef,
        analysis: &FaceAnalysisResult,
        request: &HairstyleRequest,
        lang: Language,
        mode: RenderMode,
    ) -> Result<ImageRef, GatewayError>;

    /// Single turn; the model sees only the current image and this instruction.
    async fn modify_hairstyle_with_chat(
        &self,
        image: &ImageRef,
        instruction: &str,
        lang: Language,
    ) -> Result<ChatEdit, GatewayError>;

    /// Soft-fails to a localized fallback text.
    async fn generate_barber_instructions(
        &self,
        analysis: &FaceAnalysisResult,
        request: &HairstyleRequest,
        lang: Language,
    ) -> Result<String, GatewayError>;
}

/// Analysis object as the model returns it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisPayload {
    face_shape: String,
    jawline_characteristics: String,
    forehead_height: String,
    skin_tone_description: String,
    features_summary: String,
    recommended_styles: Vec<String>,
}

impl From<AnalysisPayload> for FaceAnalysisResult {
    fn from(p: AnalysisPayload) -> Self {
        FaceAnalysisResult {
            face_shape: p.face_shape,
            jawline_characteristics: p.jawline_characteristics,
            forehead_height: p.forehead_height,
            skin_tone_description: p.skin_tone_description,
            features_summary: p.features_summary,
            recommended_styles: clean_styles(p.recommended_styles),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StylesPayload {
    #[serde(default)]
    styles: Vec<String>,
}

fn clean_styles(styles: Vec<String>) -> Vec<String> {
    styles
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Models sometimes wrap JSON in a fenced block even in JSON mode.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}

pub(crate) fn parse_analysis(text: &str) -> Result<FaceAnalysisResult, GatewayError> {
    serde_json::from_str::<AnalysisPayload>(strip_code_fence(text))
        .map(FaceAnalysisResult::from)
        .map_err(|e| GatewayError::MalformedResponse(format!("analysis: {}", e)))
}

pub(crate) fn parse_styles(text: &str) -> Result<Vec<String>, GatewayError> {
    serde_json::from_str::<StylesPayload>(strip_code_fence(text))
        .map(|p| clean_styles(p.styles))
        .map_err(|e| GatewayError::MalformedResponse(format!("styles: {}", e)))
}

pub struct GeminiGateway {
    client: GeminiClient,
    text_model: String,
    image_model: String,
}

impl GeminiGateway {
    pub fn new(config: &Config) -> Self {
        Self {
            client: GeminiClient::new(config),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
        }
    }

    async fn structured_analysis(&self, image: &ImageRef, prompt: String) -> Result<FaceAnalysisResult, GatewayError> {
        let response = self
            .client
            .generate_content(
                &self.text_model,
                vec![image_part(image), text_part(&prompt)],
                Some(prompts::json_config(prompts::analysis_schema())),
            )
            .await?;
        let text = response
            .text()
            .ok_or_else(|| GatewayError::Analysis("no analysis returned".into()))?;
        parse_analysis(&text)
    }
}

#[async_trait]
impl StylistGateway for GeminiGateway {
    async fn analyze_face_shape(
        &self,
        image: &ImageRef,
        profile: &UserProfile,
        lang: Language,
    ) -> Result<FaceAnalysisResult, GatewayError> {
        info!("🔍 Analyzing face shape ({} bytes, {})", image.len(), image.mime_type());
        let result = self.structured_analysis(image, prompts::analysis_prompt(profile, lang)).await;
        match &result {
            Ok(a) => info!("✅ Face analysis complete: shape={}", a.face_shape),
            Err(e) => error!("❌ Analysis failed: {}", e),
        }
        result
    }

    async fn refine_face_analysis(
        &self,
        image: &ImageRef,
        profile: &UserProfile,
        dimensions: &FaceDimensions,
        lang: Language,
    ) -> Result<FaceAnalysisResult, GatewayError> {
        info!("📏 Refining face analysis with measurements");
        let result = self
            .structured_analysis(image, prompts::refine_prompt(profile, dimensions, lang))
            .await;
        match &result {
            Ok(a) => info!("✅ Refined analysis complete: shape={}", a.face_shape),
            Err(e) => error!("❌ Refined analysis failed: {}", e),
        }
        result
    }

    async fn get_more_style_recommendations(
        &self,
        analysis: &FaceAnalysisResult,
        current_styles: &[String],
        lang: Language,
    ) -> Result<Vec<String>, GatewayError> {
        let prompt = prompts::more_styles_prompt(analysis, current_styles, lang);
        let response = self
            .client
            .generate_content(
                &self.text_model,
                vec![text_part(&prompt)],
                Some(prompts::json_config(prompts::styles_schema())),
            )
            .await;

        let styles = match response.map_err(GatewayError::from) {
            Ok(resp) => match resp.text() {
                Some(text) => parse_styles(&text),
                None => Ok(Vec::new()),
            },
            Err(e) => Err(e),
        };

        match styles {
            Ok(styles) => {
                info!("✅ Got {} more style suggestions", styles.len());
                Ok(styles)
            }
            Err(e) if e.is_configuration() => Err(e),
            Err(e) => {
                warn!("⚠️ Failed to get more styles, returning none: {}", e);
                Ok(Vec::new())
            }
        }
    }

    async fn generate_hairstyle_image(
        &self,
        image: &ImageRef,
        analysis: &FaceAnalysisResult,
        request: &HairstyleRequest,
        _lang: Language,
        mode: RenderMode,
    ) -> Result<ImageRef, GatewayError> {
        let prompt = prompts::image_prompt(analysis, request, mode);
        info!("🎨 Generating hairstyle image ({:?}) style='{}'", mode, request.style_name);
        let response = self
            .client
            .generate_content(&self.image_model, vec![image_part(image), text_part(&prompt)], Some(prompts::image_config()))
            .await
            .map_err(|e| {
                error!("❌ Image generation failed: {}", e);
                GatewayError::from(e)
            })?;

        match response.first_image() {
            Some(image) => {
                let image = image?;
                info!("✅ Generated {} image ({} bytes)", image.mime_type(), image.len());
                Ok(image)
            }
            None => {
                error!("❌ No image data found in API response");
                Err(GatewayError::Generation("no image generated".into()))
            }
        }
    }

    async fn modify_hairstyle_with_chat(
        &self,
        image: &ImageRef,
        instruction: &str,
        lang: Language,
    ) -> Result<ChatEdit, GatewayError> {
        let prompt = prompts::chat_prompt(instruction, lang);
        info!("💬 Chat edit: '{}'", instruction.trim());
        let response = self
            .client
            .generate_content(&self.image_model, vec![image_part(image), text_part(&prompt)], Some(prompts::image_config()))
            .await
            .map_err(|e| {
                error!("❌ Chat modification failed: {}", e);
                GatewayError::from(e)
            })?;

        let image = match response.first_image() {
            Some(image) => image?,
            None => {
                error!("❌ No image generated from chat modification");
                return Err(GatewayError::Generation("no image generated from chat modification".into()));
            }
        };
        let reply = response
            .text()
            .unwrap_or_else(|| lang.texts().chat_default_reply.to_string());
        Ok(ChatEdit { image, reply })
    }

    async fn generate_barber_instructions(
        &self,
        analysis: &FaceAnalysisResult,
        request: &HairstyleRequest,
        lang: Language,
    ) -> Result<String, GatewayError> {
        let prompt = prompts::instructions_prompt(analysis, request, lang);
        match self.client.generate_content(&self.text_model, vec![text_part(&prompt)], None).await {
            Ok(resp) => Ok(resp.text().unwrap_or_else(|| lang.texts().no_instructions.to_string())),
            Err(GeminiError::MissingApiKey) => Err(GatewayError::MissingApiKey),
            Err(e) => {
                warn!("⚠️ Instruction generation failed, using fallback: {}", e);
                Ok(lang.texts().instructions_fallback.to_string())
            }
        }
    }
}
