//! Localized strings, keyed by variant rather than by display text.

use serde::{Serialize, Deserialize};

use crate::models::{Gender, HairCurl, HairLength, HairThickness, LightingCondition};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Zh,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Zh => "zh",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" | "eng" | "english" => Some(Language::En),
            "zh" | "zh-cn" | "cn" | "chinese" => Some(Language::Zh),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Language::En => Language::Zh,
            Language::Zh => Language::En,
        }
    }

    pub fn texts(self) -> &'static Texts {
        match self {
            Language::En => &EN,
            Language::Zh => &ZH,
        }
    }
}

/// User-facing alert sentences and gateway fallbacks.
#[derive(Debug)]
pub struct Texts {
    pub analysis_failed: &'static str,
    pub refine_failed: &'static str,
    pub generation_failed: &'static str,
    pub chat_failed: &'static str,
    pub chat_default_reply: &'static str,
    pub instructions_fallback: &'static str,
    pub no_instructions: &'static str,
    /// Directive used by the face analysis prompts.
    pub analysis_directive: &'static str,
    /// Directive used by the style suggestion prompt.
    pub suggestions_directive: &'static str,
    /// Directive used by the barber instruction prompt.
    pub instructions_directive: &'static str,
    /// Language name inserted into the chat edit prompt.
    pub reply_language: &'static str,
    pub steps: [&'static str; 5],
}

static EN: Texts = Texts {
    analysis_failed: "Failed to analyze image. Please try again with a clearer photo.",
    refine_failed: "Re-analysis failed. Please try again.",
    generation_failed: "Failed to generate hairstyle.",
    chat_failed: "Modification failed.",
    chat_default_reply: "Hairstyle modified as requested.",
    instructions_fallback: "Could not generate technical instructions at this time.",
    no_instructions: "No instructions generated.",
    analysis_directive: "Output must be in English.",
    suggestions_directive: "Output in English.",
    instructions_directive: "Provide the output in English.",
    reply_language: "English",
    steps: ["Profile", "Upload", "Analysis", "Style", "Result"],
};

static ZH: Texts = Texts {
    analysis_failed: "图像分析失败，请尝试使用更清晰的照片。",
    refine_failed: "重新分析失败，请重试。",
    generation_failed: "生成失败，请检查API Key。",
    chat_failed: "修改失败。",
    chat_default_reply: "已根据您的要求修改发型。",
    instructions_fallback: "暂时无法生成技术说明。",
    no_instructions: "未生成说明。",
    analysis_directive: "Output must be in Chinese (Simplified).",
    suggestions_directive: "Output in Chinese (Simplified).",
    instructions_directive: "Provide the output in Chinese (Simplified).",
    reply_language: "Chinese",
    steps: ["档案", "上传", "分析", "设计", "成果"],
};

pub fn gender_label(lang: Language, gender: Gender) -> &'static str {
    match (lang, gender) {
        (Language::En, Gender::Male) => "Male",
        (Language::En, Gender::Female) => "Female",
        (Language::En, Gender::NonBinary) => "Non-Binary",
        (Language::Zh, Gender::Male) => "男性",
        (Language::Zh, Gender::Female) => "女性",
        (Language::Zh, Gender::NonBinary) => "其他",
    }
}

pub fn curl_label(lang: Language, curl: HairCurl) -> &'static str {
    match (lang, curl) {
        (Language::En, c) => c.prompt_label(),
        (Language::Zh, HairCurl::Straight) => "直发",
        (Language::Zh, HairCurl::Wavy) => "波浪",
        (Language::Zh, HairCurl::Curly) => "卷发",
        (Language::Zh, HairCurl::Coily) => "自然卷",
    }
}

pub fn thickness_label(lang: Language, thickness: HairThickness) -> &'static str {
    match (lang, thickness) {
        (Language::En, t) => t.prompt_label(),
        (Language::Zh, HairThickness::Fine) => "细软",
        (Language::Zh, HairThickness::Medium) => "中等",
        (Language::Zh, HairThickness::Thick) => "粗硬",
    }
}

pub fn length_label(lang: Language, length: HairLength) -> &'static str {
    match (lang, length) {
        (Language::En, HairLength::Buzz) => "Buzz / Very Short",
        (Language::En, HairLength::Short) => "Short (Above Ear)",
        (Language::En, HairLength::Medium) => "Medium (Shoulder)",
        (Language::En, HairLength::Long) => "Long (Below Shoulder)",
        (Language::Zh, HairLength::Buzz) => "超短 / 寸头",
        (Language::Zh, HairLength::Short) => "短发 (耳上)",
        (Language::Zh, HairLength::Medium) => "中发 (及肩)",
        (Language::Zh, HairLength::Long) => "长发 (过肩)",
    }
}

pub fn lighting_label(lang: Language, lighting: LightingCondition) -> &'static str {
    match (lang, lighting) {
        (Language::En, l) => l.prompt_label(),
        (Language::Zh, LightingCondition::Studio) => "影棚均衡光",
        (Language::Zh, LightingCondition::NaturalIndoor) => "室内窗光",
        (Language::Zh, LightingCondition::OutdoorSunny) => "户外晴天",
        (Language::Zh, LightingCondition::OutdoorCloudy) => "户外阴天",
        (Language::Zh, LightingCondition::EveningWarm) => "傍晚暖光",
    }
}

#[derive(Debug, Serialize)]
pub struct Choice<T> {
    pub value: T,
    pub label: &'static str,
}

/// Everything a front end needs to render the five steps in one language.
#[derive(Debug, Serialize)]
pub struct LabelTable {
    pub language: Language,
    pub steps: [&'static str; 5],
    pub genders: Vec<Choice<Gender>>,
    pub hair_curls: Vec<Choice<HairCurl>>,
    pub hair_thicknesses: Vec<Choice<HairThickness>>,
    pub lengths: Vec<Choice<HairLength>>,
    pub lighting: Vec<Choice<LightingCondition>>,
}

pub fn label_table(lang: Language) -> LabelTable {
    LabelTable {
        language: lang,
        steps: lang.texts().steps,
        genders: Gender::ALL.iter().map(|&g| Choice { value: g, label: gender_label(lang, g) }).collect(),
        hair_curls: HairCurl::ALL.iter().map(|&c| Choice { value: c, label: curl_label(lang, c) }).collect(),
        hair_thicknesses: HairThickness::ALL
            .iter()
            .map(|&t| Choice { value: t, label: thickness_label(lang, t) })
            .collect(),
        lengths: HairLength::ALL.iter().map(|&l| Choice { value: l, label: length_label(lang, l) }).collect(),
        lighting: LightingCondition::ALL
            .iter()
            .map(|&l| Choice { value: l, label: lighting_label(lang, l) })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn language_codes_round_trip_through_toggle() {
        assert_eq!(Language::from_code("ZH"), Some(Language::Zh));
        assert_eq!(Language::from_code("fr"), None);
        assert_eq!(Language::En.toggled(), Language::Zh);
        assert_eq!(Language::Zh.toggled().code(), "en");
    }

    #[test]
    fn label_table_covers_every_variant() {
        let table = label_table(Language::Zh);
        assert_eq!(table.genders.len(), 3);
        assert_eq!(table.hair_curls.len(), 4);
        assert_eq!(table.hair_thicknesses.len(), 3);
        assert_eq!(table.lengths.len(), 4);
        assert_eq!(table.lighting.len(), 5);
        assert_eq!(table.hair_curls[3].label, "自然卷");
        assert_eq!(table.steps[4], "成果");
    }

    #[test]
    fn english_labels_are_not_used_as_keys() {
        // Labels may coincide with variant names in English but lookups never go through them.
        assert_eq!(curl_label(Language::En, HairCurl::Wavy), "Wavy");
        assert_eq!(curl_label(Language::Zh, HairCurl::Wavy), "波浪");
    }
}
