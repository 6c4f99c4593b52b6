use serde_json::{json, Value};

use crate::i18n::Language;
use crate::models::{FaceAnalysisResult, FaceDimensions, HairstyleRequest, UserProfile};

const NOT_PROVIDED: &str = "Not provided";

/// Which of the two image prompts to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Apply style, length and color to the source photo.
    Restyle,
    /// Input already carries the hairstyle; only lighting may change.
    Relight,
}

fn or_not_provided(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.is_empty() { NOT_PROVIDED } else { trimmed }
}

fn profile_lines(profile: &UserProfile) -> String {
    format!(
        "User Profile: Age {}, Gender {}.\nHair Characteristics: {}, {}. Current color: {}.",
        profile.age,
        profile.gender.prompt_label(),
        profile.hair_curl.prompt_label(),
        profile.hair_thickness.prompt_label(),
        or_not_provided(&profile.current_color),
    )
}

pub fn analysis_prompt(profile: &UserProfile, lang: Language) -> String {
    format!(
        "Analyze the facial features of the person in this image acting as a professional stylist.\n\
         {profile}\n\n\
         {directive}\n\
         Return a strictly valid JSON object with the following analysis:\n\
         - faceShape: (e.g., Oval, Square, Round, Heart, Diamond - translated if needed)\n\
         - jawlineCharacteristics: Brief description.\n\
         - foreheadHeight: Brief description.\n\
         - skinToneDescription: Brief professional description of skin tone/undertone.\n\
         - featuresSummary: A 2-sentence summary of key facial landmarks affecting hairstyle choice.\n\
         - recommendedStyles: An array of 4 specific hairstyle names that would suit this face shape.",
        profile = profile_lines(profile),
        directive = lang.texts().analysis_directive,
    )
}

pub fn refine_prompt(profile: &UserProfile, dims: &FaceDimensions, lang: Language) -> String {
    format!(
        "Re-analyze the facial features of the person in this image acting as a professional stylist.\n\
         The user has provided specific physical measurements to help correct the analysis:\n\
         - Face Length: {length}\n\
         - Cheekbone Width: {cheek}\n\
         - Jawline Width: {jaw}\n\
         - Forehead Width: {forehead}\n\n\
         {profile}\n\n\
         Task: Re-calculate the face shape based on the visual evidence combined with these provided measurements.\n\
         (e.g., If Face Length is significantly larger than Width, prioritize Oval/Oblong. If Length ~ Width, prioritize Round/Square).\n\n\
         {directive}\n\
         Return a strictly valid JSON object with the following analysis:\n\
         - faceShape: (e.g., Oval, Square, Round, Heart, Diamond - translated if needed)\n\
         - jawlineCharacteristics: Brief description adapting to new info.\n\
         - foreheadHeight: Brief description.\n\
         - skinToneDescription: Brief description.\n\
         - featuresSummary: A 2-sentence summary explaining how the measurements influenced this new analysis.\n\
         - recommendedStyles: An array of 4 specific hairstyle names that suit this corrected face shape.",
        length = or_not_provided(&dims.face_length),
        cheek = or_not_provided(&dims.cheekbone_width),
        jaw = or_not_provided(&dims.jawline_width),
        forehead = or_not_provided(&dims.forehead_width),
        profile = profile_lines(profile),
        directive = lang.texts().analysis_directive,
    )
}

pub fn more_styles_prompt(analysis: &FaceAnalysisResult, current: &[String], lang: Language) -> String {
    format!(
        "Act as a professional hair stylist.\n\
         Context: A client with {shape} face shape and features: {features}.\n\
         Previous recommendations were: {previous}.\n\n\
         Task: Provide 4 NEW and DISTINCT recommended hairstyle names that are different from the previous ones.\n\
         {directive}\n\n\
         Return ONLY a JSON object with this schema: {{ \"styles\": [\"style1\", \"style2\", \"style3\", \"style4\"] }}",
        shape = analysis.face_shape,
        features = analysis.features_summary,
        previous = current.join(", "),
        directive = lang.texts().suggestions_directive,
    )
}

pub fn image_prompt(analysis: &FaceAnalysisResult, request: &HairstyleRequest, mode: RenderMode) -> String {
    let lighting = request.lighting.prompt_label();
    match mode {
        RenderMode::Relight => format!(
            "Photorealistic image editing task.\n\
             Action: Change the lighting environment of the input image to: {lighting}.\n\n\
             CRITICAL INSTRUCTIONS:\n\
             1. DO NOT change the person's face. The facial identity must remain pixel-perfectly identical.\n\
             2. DO NOT change the hairstyle shape, length, or texture.\n\
             3. ONLY adjust the global lighting, shadows, and color temperature to match the requested atmosphere ({lighting}).\n\
             4. Output quality: 8k, photorealistic."
        ),
        RenderMode::Restyle => format!(
            "Photorealistic image editing task.\n\
             Action: Apply a new hairstyle to the person in the input image.\n\
             Target Hairstyle: {style} ({length}).\n\
             Target Hair Color: {color}.\n\
             Lighting Condition: {lighting}.\n\n\
             CRITICAL INSTRUCTIONS:\n\
             1. PRESERVE THE FACE EXACTLY. Do not alter the eye shape, nose, mouth, or facial structure. The subject must be instantly recognizable as the original person.\n\
             2. Only replace/modify the hair region.\n\
             3. Blend the hair naturally with the {shape} face shape.\n\
             4. Image quality: 8k, highly detailed, cinematic texture.",
            style = request.style_name,
            length = request.length.prompt_label(),
            color = request.color,
            shape = analysis.face_shape,
        ),
    }
}

pub fn chat_prompt(instruction: &str, lang: Language) -> String {
    format!(
        "Image Editing Task.\n\
         Input Image: A person with a specific hairstyle.\n\
         User Instruction: \"{instruction}\"\n\n\
         CRITICAL RULES:\n\
         1. PRESERVE THE FACE IDENTITY EXACTLY. Do not change facial features.\n\
         2. Modify the hairstyle according to the user's instruction (e.g., make it shorter, change color, add bangs).\n\
         3. Maintain photorealism and high quality.\n\
         4. If the instruction is about lighting, adjust the lighting while keeping the hair shape.\n\n\
         After generating the image, also provide a very brief (1 sentence) text confirmation of what was changed in {language}.",
        instruction = instruction.trim(),
        language = lang.texts().reply_language,
    )
}

pub fn instructions_prompt(analysis: &FaceAnalysisResult, request: &HairstyleRequest, lang: Language) -> String {
    format!(
        "Create technical instructions for a professional barber/stylist to achieve the following look:\n\
         Style: {style}\n\
         Length Category: {length}\n\
         Hair Color: {color}\n\
         Client Face Shape: {shape}\n\
         Client Hair Type: {features} (Contextual)\n\n\
         {directive}\n\
         Provide the output in clean Markdown format. Include:\n\
         1. **Guard Numbers/Shear Technique**: Specific lengths in cm/mm and inches for top, sides, and back.\n\
         2. **Texturing**: How to handle weight (e.g., point cutting, thinning shears).\n\
         3. **Finishing**: Styling products recommended.\n\
         4. **Maintenance**: How often to trim.\n\n\
         Keep it concise and practical.",
        style = request.style_name,
        length = request.length.prompt_label(),
        color = request.color,
        shape = analysis.face_shape,
        features = analysis.features_summary,
        directive = lang.texts().instructions_directive,
    )
}

pub fn analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "faceShape": { "type": "STRING" },
            "jawlineCharacteristics": { "type": "STRING" },
            "foreheadHeight": { "type": "STRING" },
            "skinToneDescription": { "type": "STRING" },
            "featuresSummary": { "type": "STRING" },
            "recommendedStyles": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": [
            "faceShape", "jawlineCharacteristics", "foreheadHeight",
            "skinToneDescription", "featuresSummary", "recommendedStyles"
        ]
    })
}

pub fn styles_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "styles": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": ["styles"]
    })
}

pub fn json_config(schema: Value) -> Value {
    json!({
        "responseMimeType": "application/json",
        "responseSchema": schema
    })
}

pub fn image_config() -> Value {
    json!({
        "responseModalities": ["TEXT", "IMAGE"],
        "candidateCount": 1
    })
}
