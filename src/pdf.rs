use crate::i18n::{length_label, lighting_label, Language};
use crate::models::{FaceAnalysisResult, HairstyleRequest};
use printpdf::*;
use std::io::BufWriter;
use thiserror::Error;

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN: f32 = 15.0;
const WRAP_AT: usize = 95;

#[derive(Debug, Error, PartialEq)]
pub enum GuideError {
    /// The builtin fonts only cover WinAnsi; anything else would be dropped silently.
    #[error("guide contains text the builtin PDF font cannot draw; set GUIDE_FONT_PATH to a Unicode (CJK) TTF font")]
    FontRequired,
    #[error("could not load guide font: {0}")]
    Font(String),
    #[error("could not write PDF: {0}")]
    Write(String),
}

/// Characters outside Latin-1 that WinAnsiEncoding still maps.
const WIN_ANSI_EXTRAS: &[char] = &[
    '\u{20AC}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}', '\u{02C6}', '\u{2030}',
    '\u{0160}', '\u{2039}', '\u{0152}', '\u{017D}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}',
    '\u{2013}', '\u{2014}', '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{017E}', '\u{0178}',
];

fn win_ansi(c: char) -> bool {
    c.is_ascii_whitespace() || matches!(c as u32, 0x20..=0x7E | 0xA0..=0xFF) || WIN_ANSI_EXTRAS.contains(&c)
}

/// Salon hand-out: analysis, requested look and the barber's guide.
///
/// Without `unicode_font` (TTF bytes) the builtin Helvetica is used, and a guide
/// whose text it cannot draw is refused instead of being written with gaps.
pub fn generate_guide(
    lang: Language,
    analysis: &FaceAnalysisResult,
    request: &HairstyleRequest,
    barber_instructions: &str,
    unicode_font: Option<&[u8]>,
) -> Result<Vec<u8>, GuideError> {
    if unicode_font.is_none() {
        let content = [
            request.style_name.as_str(),
            request.color.as_str(),
            length_label(lang, request.length),
            lighting_label(lang, request.lighting),
            analysis.face_shape.as_str(),
            analysis.jawline_characteristics.as_str(),
            analysis.forehead_height.as_str(),
            analysis.skin_tone_description.as_str(),
            analysis.features_summary.as_str(),
            barber_instructions,
        ];
        if let Some(c) = content.iter().flat_map(|t| t.chars()).find(|&c| !win_ansi(c)) {
            tracing::warn!("⚠️ Guide needs a Unicode font (found {:?}), none configured", c);
            return Err(GuideError::FontRequired);
        }
    }

    let (doc, page, layer) = PdfDocument::new(
        format!("Hairstyle Guide: {}", truncate(&request.style_name, 48)),
        Mm(PAGE_W),
        Mm(PAGE_H),
        "Layer 1",
    );
    let (font, bold) = match unicode_font {
        Some(bytes) => {
            let font = doc
                .add_external_font(std::io::Cursor::new(bytes))
                .map_err(|e| GuideError::Font(e.to_string()))?;
            (font.clone(), font)
        }
        None => {
            let font = doc
                .add_builtin_font(BuiltinFont::Helvetica)
                .map_err(|e| GuideError::Font(e.to_string()))?;
            let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).unwrap_or_else(|_| font.clone());
            (font, bold)
        }
    };

    let mut cursor = PageCursor { layer: doc.get_page(page).get_layer(layer), y: PAGE_H - 22.0 };

    cursor.line(&doc, "Hairstyle Guide", 20.0, &bold, 12.0);
    cursor.line(&doc, &request.style_name, 14.0, &bold, 10.0);

    cursor.line(&doc, "Requested look", 12.0, &bold, 7.0);
    for row in [
        format!("Length: {}", length_label(lang, request.length)),
        format!("Color: {}", request.color),
        format!("Lighting: {}", lighting_label(lang, request.lighting)),
    ] {
        cursor.line(&doc, &row, 10.0, &font, 5.5);
    }
    cursor.gap(4.0);

    cursor.line(&doc, "Face analysis", 12.0, &bold, 7.0);
    for row in [
        format!("Face shape: {}", analysis.face_shape),
        format!("Jawline: {}", analysis.jawline_characteristics),
        format!("Forehead: {}", analysis.forehead_height),
        format!("Skin tone: {}", analysis.skin_tone_description),
        format!("Notes: {}", analysis.features_summary),
    ] {
        cursor.paragraph(&doc, &row, 10.0, &font);
    }
    cursor.gap(4.0);

    cursor.line(&doc, "Barber's guide", 12.0, &bold, 7.0);
    for raw in barber_instructions.lines() {
        let text = raw.trim_end().trim_start_matches('#').trim_start().replace("**", "");
        if text.is_empty() {
            cursor.gap(2.5);
            continue;
        }
        cursor.paragraph(&doc, &text, 9.5, &font);
    }

    cursor.gap(6.0);
    cursor.line(&doc, "Visualizations are AI approximations. Consult a professional.", 8.0, &font, 5.0);

    let mut buf: Vec<u8> = Vec::new();
    {
        let mut writer = BufWriter::new(&mut buf);
        doc.save(&mut writer).map_err(|e| {
            tracing::error!("❌ Failed to write PDF: {}", e);
            GuideError::Write(e.to_string())
        })?;
    }
    Ok(buf)
}

struct PageCursor {
    layer: PdfLayerReference,
    y: f32,
}

impl PageCursor {
    fn line(&mut self, doc: &PdfDocumentReference, text: &str, size: f32, font: &IndirectFontRef, advance: f32) {
        if self.y < 20.0 {
            let (page, layer) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
            self.layer = doc.get_page(page).get_layer(layer);
            self.y = PAGE_H - 22.0;
        }
        self.layer.use_text(text, size, Mm(MARGIN), Mm(self.y), font);
        self.y -= advance;
    }

    fn paragraph(&mut self, doc: &PdfDocumentReference, text: &str, size: f32, font: &IndirectFontRef) {
        for chunk in wrap(text, WRAP_AT) {
            self.line(doc, &chunk, size, font, size * 0.5 + 0.5);
        }
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = current.chars().count() + word.chars().count() + usize::from(!current.is_empty());
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}…", s.chars().take(max).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HairLength, LightingCondition};
    use pretty_assertions::assert_eq;

    #[test]
    fn wrap_breaks_on_words() {
        assert_eq!(wrap("aa bb cc", 5), vec!["aa bb".to_string(), "cc".to_string()]);
        assert_eq!(wrap("   ", 5), Vec::<String>::new());
        assert_eq!(wrap("averyveryverylongword x", 5), vec!["averyveryverylongword".to_string(), "x".to_string()]);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("寸头造型", 2), "寸头…");
        assert_eq!(truncate("Crop", 10), "Crop");
    }

    fn analysis() -> FaceAnalysisResult {
        FaceAnalysisResult {
            face_shape: "Oval".into(),
            jawline_characteristics: "Soft".into(),
            forehead_height: "Average".into(),
            skin_tone_description: "Warm".into(),
            features_summary: "Balanced.".into(),
            recommended_styles: vec![],
        }
    }

    fn request() -> HairstyleRequest {
        HairstyleRequest {
            style_name: "Textured Crop".into(),
            length: HairLength::Short,
            color: "Natural".into(),
            lighting: LightingCondition::Studio,
        }
    }

    #[test]
    fn guide_is_a_pdf_even_when_long() {
        let instructions = "## Cut\n- **Sides**: #2 guard, fade to #4 \u{2014} \u{201C}soft\u{201D}\n\n".repeat(60);
        let bytes = generate_guide(Language::En, &analysis(), &request(), &instructions, None).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn chinese_guide_without_unicode_font_is_refused() {
        let result = generate_guide(Language::Zh, &analysis(), &request(), "- Sides: #2", None);
        assert_eq!(result, Err(GuideError::FontRequired));

        let mut zh = analysis();
        zh.face_shape = "椭圆形脸".into();
        let result = generate_guide(Language::En, &zh, &request(), "- Sides: #2", None);
        assert_eq!(result, Err(GuideError::FontRequired));
    }

    #[test]
    fn win_ansi_covers_latin_and_typographic_marks() {
        assert!("Café crème: 5€ – “fade”…".chars().all(win_ansi));
        assert!(!win_ansi('椭'));
        assert!(!win_ansi('\u{2192}'));
    }
}
