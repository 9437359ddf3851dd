//! System prompts for the text rewrite modes.
//!
//! Kept together so the instructions can be tuned without touching the
//! request code.

/// Russian input to English image-generation prompt text.
pub const RU_TO_EN_PROMPT: &str = "Translate Russian text into natural, concise English prompt text for image generation.\nOutput only English text.";

/// English prompt text back to Russian for review.
pub const EN_TO_RU_PROMPT: &str =
    "Translate English prompt text into Russian. Output only Russian text.";

/// Polish an English prompt without changing its meaning.
pub const IMPROVE_PROMPT: &str = "Rewrite the English prompt text to sound more natural and useful for image generation. Keep meaning. Output only the improved prompt.";
