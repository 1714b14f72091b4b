//! Termination phrase detection
//!
//! A [`TerminationPhraseSet`] is built once (per process, or per controller
//! when a custom set is configured) and shared read-only between calls. The
//! phrase list is compiled into a single [`RegexSet`] at construction so each
//! finalized utterance is scanned in one pass.
//!
//! When several phrases occur in the same utterance the winner is the first
//! one in priority order: longer phrases before shorter ones, ties broken
//! alphabetically. "Thanks, goodbye!" therefore resolves to `goodbye`, not to
//! the `bye` it also contains.

use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use regex::RegexSet;
use std::cmp::Ordering;
use std::sync::{Arc, OnceLock};

/// Phrases used when no custom set is configured
pub const DEFAULT_TERMINATION_PHRASES: [&str; 5] =
    ["goodbye", "bye", "thank you", "end call", "that's all"];

/// Spoken when the detected phrase has no dedicated response
pub const DEFAULT_FALLBACK_ACKNOWLEDGMENT: &str = "Thank you! Goodbye.";

const ACKNOWLEDGMENTS: [(&str, &str); 5] = [
    ("goodbye", "Goodbye! It was nice talking with you."),
    ("bye", "Bye! Take care."),
    ("thank you", "You're welcome! Have a great day."),
    ("end call", "Ending the call now. Goodbye!"),
    ("that's all", "Understood. Thank you for the conversation!"),
];

/// Immutable, pre-compiled set of lowercase termination phrases
#[derive(Debug, Clone)]
pub struct TerminationPhraseSet {
    /// Phrases in match-priority order
    phrases: Vec<String>,
    matcher: RegexSet,
}

impl TerminationPhraseSet {
    /// Build a set from caller-supplied phrases. Blank entries are dropped; an
    /// empty result falls back to [`DEFAULT_TERMINATION_PHRASES`].
    pub fn new<I, S>(phrases: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = phrases
            .into_iter()
            .map(|p| normalize(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();

        if normalized.is_empty() {
            normalized = DEFAULT_TERMINATION_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect();
        }

        normalized.sort_by(|a, b| priority(a, b));
        normalized.dedup();

        let matcher = RegexSet::new(normalized.iter().map(|p| regex::escape(p))).map_err(|e| {
            DomainError::InvalidConfiguration(format!("termination phrases: {}", e))
        })?;

        Ok(Self {
            phrases: normalized,
            matcher,
        })
    }

    /// Shared default set, compiled on first use
    pub fn defaults() -> Arc<Self> {
        static DEFAULTS: OnceLock<Arc<TerminationPhraseSet>> = OnceLock::new();
        DEFAULTS
            .get_or_init(|| {
                Arc::new(
                    Self::new(DEFAULT_TERMINATION_PHRASES)
                        .expect("escaped literal phrases always compile"),
                )
            })
            .clone()
    }

    /// Shared set for an optional override; `None` or an empty list selects the defaults.
    pub fn from_override<I, S>(phrases: Option<I>) -> Result<Arc<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match phrases {
            Some(list) => {
                let list: Vec<String> = list.into_iter().map(|p| p.as_ref().to_string()).collect();
                if list.iter().all(|p| p.trim().is_empty()) {
                    Ok(Self::defaults())
                } else {
                    Ok(Arc::new(Self::new(list)?))
                }
            }
            None => Ok(Self::defaults()),
        }
    }

    /// First phrase (in priority order) contained anywhere in `text`
    pub fn detect(&self, text: &str) -> Option<&str> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return None;
        }

        self.matcher
            .matches(&normalized)
            .iter()
            .next()
            .map(|index| self.phrases[index].as_str())
    }

    pub fn contains(&self, phrase: &str) -> bool {
        let phrase = normalize(phrase);
        self.phrases.iter().any(|p| *p == phrase)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.phrases.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

impl PartialEq for TerminationPhraseSet {
    fn eq(&self, other: &Self) -> bool {
        self.phrases == other.phrases
    }
}

/// Scan `text` for any phrase in `phrases`
pub fn detect<'a>(text: &str, phrases: &'a TerminationPhraseSet) -> Option<&'a str> {
    phrases.detect(text)
}

/// Short spoken response for a detected phrase
pub fn acknowledgment_for<'a>(phrase: &str, fallback: &'a str) -> &'a str {
    let phrase = normalize(phrase);

    if let Some((_, response)) = ACKNOWLEDGMENTS.iter().find(|(p, _)| *p == phrase) {
        return *response;
    }

    ACKNOWLEDGMENTS
        .iter()
        .find(|(p, _)| phrase.contains(*p))
        .map(|(_, response)| *response)
        .unwrap_or(fallback)
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase().replace('\u{2019}', "'")
}

fn priority(a: &str, b: &str) -> Ordering {
    b.len().cmp(&a.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Arc<TerminationPhraseSet> {
        TerminationPhraseSet::defaults()
    }

    #[test]
    fn test_exact_default_phrases() {
        let set = defaults();
        for phrase in DEFAULT_TERMINATION_PHRASES {
            assert_eq!(set.detect(phrase), Some(phrase), "phrase {phrase}");
        }
    }

    #[test]
    fn test_case_insensitive() {
        let set = defaults();
        assert_eq!(set.detect("GOODBYE"), Some("goodbye"));
        assert_eq!(set.detect("gOoDbYe"), Some("goodbye"));
        assert_eq!(set.detect("End Call"), Some("end call"));
        assert_eq!(set.detect("THAT'S ALL"), Some("that's all"));
    }

    #[test]
    fn test_phrase_inside_sentence() {
        let set = defaults();
        assert_eq!(
            set.detect("well, thank you for your help"),
            Some("thank you")
        );
        assert_eq!(set.detect("Please end call when you're ready"), Some("end call"));
        assert_eq!(set.detect("That's all I needed to know"), Some("that's all"));
    }

    #[test]
    fn test_overlapping_phrases_prefer_longest() {
        let set = defaults();
        assert_eq!(set.detect("Thanks, goodbye!"), Some("goodbye"));
        assert_eq!(set.detect("thank you, bye"), Some("thank you"));
    }

    #[test]
    fn test_tie_break_is_stable() {
        let set = TerminationPhraseSet::new(["hola", "ciao"]).unwrap();
        for _ in 0..10 {
            assert_eq!(set.detect("hola, ciao"), Some("ciao"));
            assert_eq!(set.detect("ciao, hola"), Some("ciao"));
        }
    }

    #[test]
    fn test_no_match() {
        let set = defaults();
        assert_eq!(set.detect("I need a regrip"), None);
        assert_eq!(set.detect("hello there"), None);
    }

    #[test]
    fn test_empty_input() {
        let set = defaults();
        assert_eq!(set.detect(""), None);
        assert_eq!(set.detect("   \t\n"), None);
    }

    #[test]
    fn test_typographic_apostrophe() {
        assert_eq!(defaults().detect("That\u{2019}s all"), Some("that's all"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let set = TerminationPhraseSet::new(["done (really)", "a.b"]).unwrap();
        assert_eq!(set.detect("i'm done (really)"), Some("done (really)"));
        assert_eq!(set.detect("axb"), None);
    }

    #[test]
    fn test_custom_set_normalized() {
        let set = TerminationPhraseSet::new(["  Farewell ", "FAREWELL", ""]).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains("farewell"));
        assert_eq!(set.detect("okay, farewell"), Some("farewell"));
        assert_eq!(set.detect("goodbye"), None);
    }

    #[test]
    fn test_empty_override_uses_defaults() {
        let empty: Vec<String> = Vec::new();
        let set = TerminationPhraseSet::new(empty).unwrap();
        assert_eq!(set, *defaults());

        let from_none = TerminationPhraseSet::from_override(None::<Vec<String>>).unwrap();
        assert!(Arc::ptr_eq(&from_none, &defaults()));

        let from_blank = TerminationPhraseSet::from_override(Some(vec!["  "])).unwrap();
        assert!(Arc::ptr_eq(&from_blank, &defaults()));
    }

    #[test]
    fn test_free_function_matches_method() {
        let set = defaults();
        assert_eq!(detect("bye now", &set), set.detect("bye now"));
    }

    #[test]
    fn test_acknowledgments() {
        let fallback = DEFAULT_FALLBACK_ACKNOWLEDGMENT;
        assert_eq!(acknowledgment_for("goodbye", fallback), "Goodbye! It was nice talking with you.");
        assert_eq!(acknowledgment_for("Bye", fallback), "Bye! Take care.");
        assert_eq!(acknowledgment_for("that's all", fallback), "Understood. Thank you for the conversation!");
        assert_eq!(acknowledgment_for("farewell", fallback), "Thank you! Goodbye.");
        assert_eq!(acknowledgment_for("please end call", fallback), "Ending the call now. Goodbye!");
    }
}
