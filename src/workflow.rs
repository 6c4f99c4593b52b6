//! Per-session workflow: Profile → Upload → Analysis → StyleConfig → Result.
//!
//! Store locks are held only for short critical sections. A model-backed action
//! raises its busy flag and snapshots its inputs under the lock, awaits the gateway
//! with the lock released, then commits the outcome in one write. Nothing from a
//! failed call is ever committed.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::gateway::{GatewayError, StylistGateway};
use crate::i18n::{Language, Texts};
use crate::image::ImageRef;
use crate::models::{
    FaceAnalysisResult, FaceDimensions, GeneratedHairstyle, HairstyleRequest, LightingCondition,
    ProfileUpdate, UserProfile,
};
use crate::pdf;
use crate::prompts::RenderMode;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Profile = 1,
    Upload = 2,
    Analysis = 3,
    StyleConfig = 4,
    Result = 5,
}

impl Step {
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn previous(self) -> Option<Step> {
        match self {
            Step::Profile => None,
            Step::Upload => Some(Step::Profile),
            Step::Analysis => Some(Step::Upload),
            Step::StyleConfig => Some(Step::Analysis),
            Step::Result => Some(Step::StyleConfig),
        }
    }

    pub fn label(self, lang: Language) -> &'static str {
        lang.texts().steps[self.number() as usize - 1]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyKind {
    Analyzing,
    Refining,
    Shuffling,
    Generating,
    Chatting,
}

#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusyFlags {
    pub analyzing: bool,
    pub refining: bool,
    pub shuffling: bool,
    pub generating: bool,
    pub chatting: bool,
}

impl BusyFlags {
    fn flag(&mut self, kind: BusyKind) -> &mut bool {
        match kind {
            BusyKind::Analyzing => &mut self.analyzing,
            BusyKind::Refining => &mut self.refining,
            BusyKind::Shuffling => &mut self.shuffling,
            BusyKind::Generating => &mut self.generating,
            BusyKind::Chatting => &mut self.chatting,
        }
    }

    /// Any outstanding model request freezes the session; only the paired
    /// image and instruction calls run under one flag.
    pub fn blocking(&self) -> bool {
        self.analyzing || self.refining || self.shuffling || self.generating || self.chatting
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub language: Language,
    pub step: Step,
    pub profile: UserProfile,
    pub source_image: Option<ImageRef>,
    pub analysis: Option<FaceAnalysisResult>,
    /// Suggestions shown on the style step; reset from each new analysis.
    pub recommendations: Vec<String>,
    pub last_request: Option<HairstyleRequest>,
    pub generated: Option<GeneratedHairstyle>,
    pub chat_reply: Option<String>,
    pub busy: BusyFlags,
    pub alert: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    fn new(language: Language) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            language,
            step: Step::Profile,
            profile: UserProfile::default(),
            source_image: None,
            analysis: None,
            recommendations: Vec::new(),
            last_request: None,
            generated: None,
            chat_reply: None,
            busy: BusyFlags::default(),
            alert: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn texts(&self) -> &'static Texts {
        self.language.texts()
    }

    fn expect_step(&self, expected: Step) -> Result<(), WorkflowError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(WorkflowError::WrongStep { expected, actual: self.step })
        }
    }

    fn expect_idle(&self) -> Result<(), WorkflowError> {
        if self.busy.blocking() { Err(WorkflowError::Busy) } else { Ok(()) }
    }
}

type Store = Arc<RwLock<HashMap<Uuid, Session>>>;

/// Clears its busy flag when dropped, including when the awaiting request is cancelled.
struct BusyGuard {
    sessions: Store,
    id: Uuid,
    kind: BusyKind,
}

impl BusyGuard {
    fn finish<R>(self, f: impl FnOnce(&mut Session) -> R) -> Result<R, WorkflowError> {
        let mut store = self.sessions.write();
        let session = store.get_mut(&self.id).ok_or(WorkflowError::SessionNotFound(self.id))?;
        *session.busy.flag(self.kind) = false;
        session.updated_at = Utc::now();
        Ok(f(session))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        if let Some(session) = self.sessions.write().get_mut(&self.id) {
            *session.busy.flag(self.kind) = false;
        }
    }
}

pub struct ImageDownload {
    pub bytes: bytes::Bytes,
    pub mime_type: String,
    pub filename: String,
}

#[derive(Clone)]
pub struct WorkflowController {
    sessions: Store,
    gateway: Arc<dyn StylistGateway>,
    default_language: Language,
    /// TTF used for guide PDFs whose text the builtin font cannot draw.
    guide_font: Option<Arc<[u8]>>,
}

impl WorkflowController {
    pub fn new(gateway: Arc<dyn StylistGateway>, default_language: Language) -> Self {
        Self { sessions: Arc::default(), gateway, default_language, guide_font: None }
    }

    pub fn with_guide_font(mut self, font: Arc<[u8]>) -> Self {
        self.guide_font = Some(font);
        self
    }

    pub fn create_session(&self, language: Option<Language>) -> Session {
        let session = Session::new(language.unwrap_or(self.default_language));
        info!(session = %session.id, "🆕 Session created");
        self.sessions.write().insert(session.id, session.clone());
        session
    }

    pub fn get(&self, id: Uuid) -> Result<Session, WorkflowError> {
        self.sessions.read().get(&id).cloned().ok_or(WorkflowError::SessionNotFound(id))
    }

    pub fn remove_session(&self, id: Uuid) -> Result<(), WorkflowError> {
        self.sessions.write().remove(&id).ok_or(WorkflowError::SessionNotFound(id))?;
        info!(session = %id, "🗑️ Session removed");
        Ok(())
    }

    /// Drops sessions idle for longer than `max_idle`. Sessions with a request in flight are kept.
    pub fn purge_idle(&self, max_idle: chrono::Duration) -> usize {
        let cutoff = Utc::now() - max_idle;
        let mut store = self.sessions.write();
        let before = store.len();
        store.retain(|_, s| s.busy.blocking() || s.updated_at >= cutoff);
        before - store.len()
    }

    fn with_session<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Session) -> Result<R, WorkflowError>,
    ) -> Result<R, WorkflowError> {
        let mut store = self.sessions.write();
        let session = store.get_mut(&id).ok_or(WorkflowError::SessionNotFound(id))?;
        let out = f(session)?;
        session.updated_at = Utc::now();
        Ok(out)
    }

    fn update(&self, id: Uuid, f: impl FnOnce(&mut Session) -> Result<(), WorkflowError>) -> Result<Session, WorkflowError> {
        self.with_session(id, |s| {
            f(s)?;
            s.updated_at = Utc::now();
            Ok(s.clone())
        })
    }

    /// Validates and snapshots under the lock, then raises `kind`.
    fn begin<T>(
        &self,
        id: Uuid,
        kind: BusyKind,
        f: impl FnOnce(&mut Session) -> Result<T, WorkflowError>,
    ) -> Result<(T, BusyGuard), WorkflowError> {
        self.with_session(id, |s| {
            s.expect_idle()?;
            let snapshot = f(s)?;
            *s.busy.flag(kind) = true;
            s.alert = None;
            Ok(snapshot)
        })
        .map(|snapshot| (snapshot, BusyGuard { sessions: Arc::clone(&self.sessions), id, kind }))
    }

    pub fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<Session, WorkflowError> {
        self.update(id, |s| {
            s.expect_step(Step::Profile)?;
            s.profile.apply(update);
            Ok(())
        })
    }

    pub fn confirm_profile(&self, id: Uuid) -> Result<Session, WorkflowError> {
        self.update(id, |s| {
            s.expect_step(Step::Profile)?;
            s.step = Step::Upload;
            info!(session = %id, "➡️ Profile confirmed");
            Ok(())
        })
    }

    /// Affects labels, alerts and the language directive of later prompts only.
    /// Without an explicit language the current one is toggled.
    pub fn set_language(&self, id: Uuid, language: Option<Language>) -> Result<Session, WorkflowError> {
        self.update(id, |s| {
            s.language = language.unwrap_or(s.language.toggled());
            Ok(())
        })
    }

    pub async fn submit_image(&self, id: Uuid, body: bytes::Bytes) -> Result<Session, WorkflowError> {
        let image = match ImageRef::from_body(body) {
            Ok(image) => image,
            Err(e) => {
                self.with_session(id, |s| {
                    s.expect_idle()?;
                    s.expect_step(Step::Upload)?;
                    s.alert = Some(s.texts().analysis_failed.to_string());
                    Ok(())
                })?;
                return Err(e.into());
            }
        };

        let ((profile, lang), guard) = self.begin(id, BusyKind::Analyzing, |s| {
            s.expect_step(Step::Upload)?;
            Ok((s.profile.clone(), s.language))
        })?;
        info!(session = %id, "📸 Image submitted ({} bytes, {})", image.len(), image.mime_type());

        let outcome = self.gateway.analyze_face_shape(&image, &profile, lang).await;
        guard.finish(|s| match outcome {
            Ok(analysis) => {
                s.recommendations = analysis.recommended_styles.clone();
                s.analysis = Some(analysis);
                s.source_image = Some(image);
                // Results derived from an earlier photo no longer apply.
                s.generated = None;
                s.last_request = None;
                s.chat_reply = None;
                s.step = Step::Analysis;
                info!(session = %id, "➡️ Analysis ready");
                Ok(s.clone())
            }
            Err(e) => Err(blocked(s, |t| t.analysis_failed, e)),
        })?
    }

    pub async fn refine_analysis(&self, id: Uuid, dimensions: FaceDimensions) -> Result<Session, WorkflowError> {
        let ((image, profile, lang), guard) = self.begin(id, BusyKind::Refining, |s| {
            s.expect_step(Step::Analysis)?;
            let image = s.source_image.clone().ok_or(WorkflowError::MissingPrerequisite("source image"))?;
            Ok((image, s.profile.clone(), s.language))
        })?;

        let outcome = self.gateway.refine_face_analysis(&image, &profile, &dimensions, lang).await;
        guard.finish(|s| match outcome {
            Ok(analysis) => {
                s.recommendations = analysis.recommended_styles.clone();
                s.analysis = Some(analysis);
                Ok(s.clone())
            }
            Err(e) => Err(blocked(s, |t| t.refine_failed, e)),
        })?
    }

    pub fn continue_to_styles(&self, id: Uuid) -> Result<Session, WorkflowError> {
        self.update(id, |s| {
            s.expect_idle()?;
            s.expect_step(Step::Analysis)?;
            if s.analysis.is_none() {
                return Err(WorkflowError::MissingPrerequisite("face analysis"));
            }
            s.step = Step::StyleConfig;
            Ok(())
        })
    }

    /// Replaces the suggestion list wholesale, or leaves it untouched when nothing comes back.
    pub async fn shuffle_styles(&self, id: Uuid) -> Result<Session, WorkflowError> {
        let ((analysis, current, lang), guard) = self.begin(id, BusyKind::Shuffling, |s| {
            s.expect_step(Step::StyleConfig)?;
            let analysis = s.analysis.clone().ok_or(WorkflowError::MissingPrerequisite("face analysis"))?;
            Ok((analysis, s.recommendations.clone(), s.language))
        })?;

        let outcome = self.gateway.get_more_style_recommendations(&analysis, &current, lang).await;
        guard.finish(|s| {
            match outcome {
                Ok(styles) if !styles.is_empty() => s.recommendations = styles,
                Ok(_) => info!(session = %id, "No new styles returned, keeping current list"),
                Err(e) => warn!(session = %id, "Style refresh failed, keeping current list: {}", e),
            }
            s.clone()
        })
    }

    pub async fn generate_hairstyle(&self, id: Uuid, request: HairstyleRequest) -> Result<Session, WorkflowError> {
        if request.style_name.trim().is_empty() {
            return Err(WorkflowError::InvalidInput("style name is empty".into()));
        }
        let ((image, analysis, lang), guard) = self.begin(id, BusyKind::Generating, |s| {
            s.expect_step(Step::StyleConfig)?;
            let image = s.source_image.clone().ok_or(WorkflowError::MissingPrerequisite("source image"))?;
            let analysis = s.analysis.clone().ok_or(WorkflowError::MissingPrerequisite("face analysis"))?;
            s.chat_reply = None;
            Ok((image, analysis, s.language))
        })?;
        info!(session = %id, "🎨 Generating '{}'", request.style_name);

        self.render(id, guard, image, analysis, request, lang, RenderMode::Restyle).await
    }

    /// Re-renders the current result under new lighting, keeping hair and face.
    pub async fn relight(&self, id: Uuid, lighting: LightingCondition) -> Result<Session, WorkflowError> {
        let ((image, analysis, request, lang), guard) = self.begin(id, BusyKind::Generating, |s| {
            s.expect_step(Step::Result)?;
            let generated = s.generated.as_ref().ok_or(WorkflowError::MissingPrerequisite("generated hairstyle"))?;
            let last = s.last_request.clone().ok_or(WorkflowError::MissingPrerequisite("hairstyle request"))?;
            let analysis = s.analysis.clone().ok_or(WorkflowError::MissingPrerequisite("face analysis"))?;
            let image = generated.image.clone();
            s.chat_reply = None;
            Ok((image, analysis, HairstyleRequest { lighting, ..last }, s.language))
        })?;
        info!(session = %id, "💡 Relighting to {:?}", lighting);

        self.render(id, guard, image, analysis, request, lang, RenderMode::Relight).await
    }

    /// Image and instructions run together; the result is committed only if both succeed.
    #[allow(clippy::too_many_arguments)]
    async fn render(
        &self,
        id: Uuid,
        guard: BusyGuard,
        image: ImageRef,
        analysis: FaceAnalysisResult,
        request: HairstyleRequest,
        lang: Language,
        mode: RenderMode,
    ) -> Result<Session, WorkflowError> {
        let (image_result, instructions_result) = tokio::join!(
            self.gateway.generate_hairstyle_image(&image, &analysis, &request, lang, mode),
            self.gateway.generate_barber_instructions(&analysis, &request, lang)
        );

        guard.finish(|s| match (image_result, instructions_result) {
            (Ok(image), Ok(barber_instructions)) => {
                s.generated = Some(GeneratedHairstyle { image, barber_instructions });
                s.last_request = Some(request);
                s.step = Step::Result;
                info!(session = %id, "➡️ Hairstyle ready");
                Ok(s.clone())
            }
            (Err(e), _) | (_, Err(e)) => Err(blocked(s, |t| t.generation_failed, e)),
        })?
    }

    /// Replaces only the image; the barber instructions are left as they are.
    pub async fn chat_edit(&self, id: Uuid, instruction: &str) -> Result<Session, WorkflowError> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(WorkflowError::InvalidInput("instruction is empty".into()));
        }
        let ((image, lang), guard) = self.begin(id, BusyKind::Chatting, |s| {
            s.expect_step(Step::Result)?;
            let generated = s.generated.as_ref().ok_or(WorkflowError::MissingPrerequisite("generated hairstyle"))?;
            Ok((generated.image.clone(), s.language))
        })?;

        let outcome = self.gateway.modify_hairstyle_with_chat(&image, instruction, lang).await;
        guard.finish(|s| match outcome {
            Ok(edit) => {
                match s.generated.as_mut() {
                    Some(generated) => generated.image = edit.image,
                    None => return Err(WorkflowError::MissingPrerequisite("generated hairstyle")),
                }
                s.chat_reply = Some(edit.reply);
                Ok(s.clone())
            }
            Err(e) => Err(blocked(s, |t| t.chat_failed, e)),
        })?
    }

    /// Steps back without discarding anything computed downstream.
    pub fn back(&self, id: Uuid) -> Result<Session, WorkflowError> {
        self.update(id, |s| {
            s.expect_idle()?;
            if let Some(prev) = s.step.previous() {
                info!(session = %id, "⬅️ {:?} -> {:?}", s.step, prev);
                s.step = prev;
            }
            Ok(())
        })
    }

    pub fn try_another(&self, id: Uuid) -> Result<Session, WorkflowError> {
        self.update(id, |s| {
            s.expect_idle()?;
            s.expect_step(Step::Result)?;
            s.step = Step::StyleConfig;
            Ok(())
        })
    }

    pub fn download_image(&self, id: Uuid) -> Result<ImageDownload, WorkflowError> {
        let session = self.get(id)?;
        let generated = session.generated.ok_or(WorkflowError::MissingPrerequisite("generated hairstyle"))?;
        let filename = format!(
            "ai-hairstyle-architect-{}.{}",
            Utc::now().timestamp_millis(),
            generated.image.file_extension()
        );
        Ok(ImageDownload {
            bytes: generated.image.bytes().clone(),
            mime_type: generated.image.mime_type().to_string(),
            filename,
        })
    }

    pub fn export_guide(&self, id: Uuid) -> Result<Vec<u8>, WorkflowError> {
        let session = self.get(id)?;
        let analysis = session.analysis.as_ref().ok_or(WorkflowError::MissingPrerequisite("face analysis"))?;
        let request = session.last_request.as_ref().ok_or(WorkflowError::MissingPrerequisite("hairstyle request"))?;
        let generated = session.generated.as_ref().ok_or(WorkflowError::MissingPrerequisite("generated hairstyle"))?;
        let guide = pdf::generate_guide(
            session.language,
            analysis,
            request,
            &generated.barber_instructions,
            self.guide_font.as_deref(),
        )?;
        Ok(guide)
    }
}

fn blocked(session: &mut Session, pick: fn(&Texts) -> &'static str, source: GatewayError) -> WorkflowError {
    let alert = pick(session.texts());
    warn!(session = %session.id, step = ?session.step, "❌ {}", source);
    session.alert = Some(alert.to_string());
    WorkflowError::Blocked { alert: alert.to_string(), source }
}

#[derive(Debug, Serialize)]
pub struct GeneratedView {
    pub image_url: String,
    pub barber_instructions: String,
}

/// What clients see of a session. The source photo is not echoed back.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub language: Language,
    pub step: Step,
    pub step_number: u8,
    pub step_label: &'static str,
    pub profile: UserProfile,
    pub has_source_image: bool,
    pub analysis: Option<FaceAnalysisResult>,
    pub recommendations: Vec<String>,
    pub last_request: Option<HairstyleRequest>,
    pub generated: Option<GeneratedView>,
    pub chat_reply: Option<String>,
    pub busy: BusyFlags,
    pub can_go_back: bool,
    pub alert: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Session> for SessionView {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id,
            language: s.language,
            step: s.step,
            step_number: s.step.number(),
            step_label: s.step.label(s.language),
            profile: s.profile.clone(),
            has_source_image: s.source_image.is_some(),
            analysis: s.analysis.clone(),
            recommendations: s.recommendations.clone(),
            last_request: s.last_request.clone(),
            generated: s.generated.as_ref().map(|g| GeneratedView {
                image_url: g.image.to_data_uri(),
                barber_instructions: g.barber_instructions.clone(),
            }),
            chat_reply: s.chat_reply.clone(),
            busy: s.busy,
            can_go_back: s.step.previous().is_some() && !s.busy.blocking(),
            alert: s.alert.clone(),
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}
