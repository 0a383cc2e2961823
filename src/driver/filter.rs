//! Acceptance filtering for raw model output.
//!
//! Speech models hallucinate on silence and music: bracketed sound tags,
//! stock sign-off phrases, stray punctuation. Everything here is judged on
//! the trimmed text; rejected chunks never reach the presentation surface.

use crate::defaults;

/// Decides whether raw model output is worth presenting.
#[derive(Debug, Clone)]
pub struct AcceptanceFilter {
    min_chars: usize,
    filler_phrases: Vec<String>,
}

impl AcceptanceFilter {
    pub fn new(min_chars: usize, filler_phrases: &[String]) -> Self {
        Self {
            min_chars,
            filler_phrases: filler_phrases
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }

    /// Returns the cleaned text when accepted, `None` when rejected.
    pub fn accept(&self, raw: &str) -> Option<String> {
        let text = raw.trim();
        if text.is_empty() || text.len() <= self.min_chars {
            return None;
        }
        if Self::is_sound_tag(text) {
            return None;
        }
        let lowered = text.to_lowercase();
        if self.filler_phrases.iter().any(|p| lowered.contains(p)) {
            return None;
        }
        Some(text.to_string())
    }

    /// `[music]`, `(applause)` and the like: fully bracketed annotations.
    fn is_sound_tag(text: &str) -> bool {
        (text.starts_with('[') && text.ends_with(']'))
            || (text.starts_with('(') && text.ends_with(')'))
    }
}

impl Default for AcceptanceFilter {
    fn default() -> Self {
        let phrases: Vec<String> = defaults::FILLER_PHRASES
            .iter()
            .map(|p| p.to_string())
            .collect();
        Self::new(defaults::MIN_ACCEPTED_CHARS, &phrases)
    }
}
