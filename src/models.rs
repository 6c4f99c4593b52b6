use serde::{Serialize, Deserialize};
use serde_json::Value;

use crate::image::ImageRef;

pub const DEFAULT_AGE: u32 = 25;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
    #[serde(rename = "Non-Binary")]
    NonBinary,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::NonBinary];

    pub fn prompt_label(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::NonBinary => "Non-Binary",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HairCurl { Straight, Wavy, Curly, Coily }

impl HairCurl {
    pub const ALL: [HairCurl; 4] = [HairCurl::Straight, HairCurl::Wavy, HairCurl::Curly, HairCurl::Coily];

    pub fn prompt_label(self) -> &'static str {
        match self {
            HairCurl::Straight => "Straight",
            HairCurl::Wavy => "Wavy",
            HairCurl::Curly => "Curly",
            HairCurl::Coily => "Coily",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HairThickness { Fine, Medium, Thick }

impl HairThickness {
    pub const ALL: [HairThickness; 3] = [HairThickness::Fine, HairThickness::Medium, HairThickness::Thick];

    pub fn prompt_label(self) -> &'static str {
        match self {
            HairThickness::Fine => "Fine",
            HairThickness::Medium => "Medium",
            HairThickness::Thick => "Thick",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HairLength { Buzz, Short, Medium, Long }

impl HairLength {
    pub const ALL: [HairLength; 4] = [HairLength::Buzz, HairLength::Short, HairLength::Medium, HairLength::Long];

    /// English description sent to the model regardless of UI language.
    pub fn prompt_label(self) -> &'static str {
        match self {
            HairLength::Buzz => "Buzz Cut / Very Short",
            HairLength::Short => "Short (Above Ear)",
            HairLength::Medium => "Medium (Chin/Shoulder)",
            HairLength::Long => "Long (Below Shoulder)",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LightingCondition {
    #[default]
    Studio,
    NaturalIndoor,
    OutdoorSunny,
    OutdoorCloudy,
    EveningWarm,
}

impl LightingCondition {
    pub const ALL: [LightingCondition; 5] = [
        LightingCondition::Studio,
        LightingCondition::NaturalIndoor,
        LightingCondition::OutdoorSunny,
        LightingCondition::OutdoorCloudy,
        LightingCondition::EveningWarm,
    ];

    pub fn prompt_label(self) -> &'static str {
        match self {
            LightingCondition::Studio => "Studio Balanced",
            LightingCondition::NaturalIndoor => "Natural Indoor Window",
            LightingCondition::OutdoorSunny => "Outdoor Sunny",
            LightingCondition::OutdoorCloudy => "Outdoor Cloudy",
            LightingCondition::EveningWarm => "Warm Evening Light",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserProfile {
    pub gender: Gender,
    pub age: u32,
    pub hair_curl: HairCurl,
    pub hair_thickness: HairThickness,
    pub current_color: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            gender: Gender::Male,
            age: DEFAULT_AGE,
            hair_curl: HairCurl::Straight,
            hair_thickness: HairThickness::Medium,
            current_color: "Brown".to_string(),
        }
    }
}

/// Partial edit from the profile form. `age` is taken as raw form input.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub age: Option<Value>,
    #[serde(default)]
    pub hair_curl: Option<HairCurl>,
    #[serde(default)]
    pub hair_thickness: Option<HairThickness>,
    #[serde(default)]
    pub current_color: Option<String>,
}

impl UserProfile {
    pub fn apply(&mut self, update: ProfileUpdate) {
        if let Some(g) = update.gender { self.gender = g; }
        if let Some(raw) = update.age.as_ref() { self.age = coerce_age(raw); }
        if let Some(c) = update.hair_curl { self.hair_curl = c; }
        if let Some(t) = update.hair_thickness { self.hair_thickness = t; }
        if let Some(color) = update.current_color { self.current_color = color; }
    }
}

/// Anything that is not a positive whole number becomes [`DEFAULT_AGE`].
pub fn coerce_age(raw: &Value) -> u32 {
    let parsed = match raw {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            let end = s
                .char_indices()
                .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
                .map(|(i, _)| i)
                .unwrap_or(s.len());
            s[..end].parse::<i64>().ok()
        }
        _ => None,
    };
    match parsed {
        Some(age) if age > 0 && age <= u32::MAX as i64 => age as u32,
        _ => DEFAULT_AGE,
    }
}

/// Optional measurements used to correct a face analysis. Free text, never validated.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct FaceDimensions {
    #[serde(default)]
    pub face_length: String,
    #[serde(default)]
    pub cheekbone_width: String,
    #[serde(default)]
    pub jawline_width: String,
    #[serde(default)]
    pub forehead_width: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FaceAnalysisResult {
    pub face_shape: String,
    pub jawline_characteristics: String,
    pub forehead_height: String,
    pub skin_tone_description: String,
    pub features_summary: String,
    pub recommended_styles: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HairstyleRequest {
    pub style_name: String,
    pub length: HairLength,
    pub color: String,
    #[serde(default)]
    pub lighting: LightingCondition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedHairstyle {
    pub image: ImageRef,
    /// Markdown.
    pub barber_instructions: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatEdit {
    pub image: ImageRef,
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LanguageChange {
    #[serde(default)]
    pub language: Option<crate::i18n::Language>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct NewSession {
    #[serde(default)]
    pub language: Option<crate::i18n::Language>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RelightRequest {
    pub lighting: LightingCondition,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatRequest {
    pub instruction: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn age_coercion_matches_form_behaviour() {
        assert_eq!(coerce_age(&json!(30)), 30);
        assert_eq!(coerce_age(&json!("42")), 42);
        assert_eq!(coerce_age(&json!("31 years")), 31);
        assert_eq!(coerce_age(&json!(27.9)), 27);
        assert_eq!(coerce_age(&json!("")), DEFAULT_AGE);
        assert_eq!(coerce_age(&json!("abc")), DEFAULT_AGE);
        assert_eq!(coerce_age(&json!(0)), DEFAULT_AGE);
        assert_eq!(coerce_age(&json!(-4)), DEFAULT_AGE);
        assert_eq!(coerce_age(&json!(null)), DEFAULT_AGE);
    }

    #[test]
    fn profile_update_only_touches_given_fields() {
        let mut profile = UserProfile::default();
        profile.apply(ProfileUpdate {
            hair_curl: Some(HairCurl::Wavy),
            age: Some(json!("not a number")),
            ..Default::default()
        });
        assert_eq!(profile.hair_curl, HairCurl::Wavy);
        assert_eq!(profile.age, DEFAULT_AGE);
        assert_eq!(profile.gender, Gender::Male);
        assert_eq!(profile.current_color, "Brown");
    }

    #[test]
    fn enums_use_their_wire_names() {
        assert_eq!(serde_json::to_value(Gender::NonBinary).unwrap(), json!("Non-Binary"));
        let req: HairstyleRequest = serde_json::from_value(json!({
            "style_name": "Textured Crop",
            "length": "Short",
            "color": "Natural"
        }))
        .unwrap();
        assert_eq!(req.lighting, LightingCondition::Studio);
        assert_eq!(req.length.prompt_label(), "Short (Above Ear)");
    }
}
