//! Guardrails over generated utterances before they reach text-to-speech.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

// Characters that read badly aloud; a response containing any of them
// came from the model leaking its formatting.
static SPECIAL_CHARACTERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[{}\[\]_()]").expect("valid special-character pattern"));

/// One pass/fail rule over a generated response.
pub trait ResponseCheck: Send + Sync {
    /// `None` when the response passes, otherwise the reason it failed.
    fn check(&self, response: &str) -> Option<String>;
}

pub struct SpecialCharacterCheck;

impl ResponseCheck for SpecialCharacterCheck {
    fn check(&self, response: &str) -> Option<String> {
        if SPECIAL_CHARACTERS.is_match(response) {
            Some("special characters check failed".to_string())
        } else {
            None
        }
    }
}

pub struct LengthCheck {
    pub max_chars: usize,
}

impl ResponseCheck for LengthCheck {
    fn check(&self, response: &str) -> Option<String> {
        let length = response.chars().count();
        if length > self.max_chars {
            Some(format!("length check failed: {length} exceeds limit of {}", self.max_chars))
        } else {
            None
        }
    }
}

pub struct ProhibitedPhraseCheck {
    phrases: BTreeSet<String>,
}

impl ProhibitedPhraseCheck {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { phrases: phrases.into_iter().map(Into::into).collect() }
    }

    fn normalize(text: &str) -> String {
        text.to_lowercase().trim().to_string()
    }
}

impl ResponseCheck for ProhibitedPhraseCheck {
    fn check(&self, response: &str) -> Option<String> {
        let normalized = Self::normalize(response);
        for phrase in &self.phrases {
            if normalized.contains(&Self::normalize(phrase)) {
                return Some(format!("prohibited phrase check failed: contains `{phrase}`"));
            }
        }
        None
    }
}

/// Ordered stack of checks; the first failure wins.
pub struct ResponseValidator {
    checks: Vec<Box<dyn ResponseCheck>>,
}

impl ResponseValidator {
    pub fn new(checks: Vec<Box<dyn ResponseCheck>>) -> Self {
        Self { checks }
    }

    /// Special characters, length and prohibited phrases, in that order.
    pub fn standard<I, S>(max_chars: usize, prohibited_phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(vec![
            Box::new(SpecialCharacterCheck),
            Box::new(LengthCheck { max_chars }),
            Box::new(ProhibitedPhraseCheck::new(prohibited_phrases)),
        ])
    }

    pub fn validate(&self, response: &str) -> Result<(), String> {
        for check in &self.checks {
            if let Some(reason) = check.check(response) {
                return Err(reason);
            }
        }
        Ok(())
    }
}

impl Default for ResponseValidator {
    fn default() -> Self {
        Self::standard(280, Vec::<String>::new())
    }
}
