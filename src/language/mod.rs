//! Language detection for bot biographies.
//!
//! The detector walks the biography line by line and returns the label of
//! the first line whose identified code maps to a known entry in the
//! language table. Detection never fails: every error degrades to the
//! unknown label.

use crate::config::{UNKNOWN_LANGUAGE, language_label};

/// Identifies the language of a single line of text.
///
/// The production implementation wraps `whatlang`; tests substitute a fake so
/// the line-selection logic can be exercised deterministically.
pub trait LanguageHeuristic {
    /// Returns the detector code for the line, or `None` if identification
    /// failed.
    fn identify(&self, line: &str) -> Option<String>;
}

/// Heuristic backed by the `whatlang` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatlangHeuristic;

impl LanguageHeuristic for WhatlangHeuristic {
    fn identify(&self, line: &str) -> Option<String> {
        whatlang::detect(line).map(|info| info.lang().code().to_owned())
    }
}

/// Outcome of running detection over a biography.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// Human-readable language label (or the unknown label).
    pub label: String,

    /// Whether a known language was actually identified.
    pub found: bool,
}

impl Detection {
    fn unknown() -> Self {
        Self {
            label: UNKNOWN_LANGUAGE.to_owned(),
            found: false,
        }
    }
}

/// Biography language detector.
#[derive(Debug, Clone, Default)]
pub struct LanguageDetector<H = WhatlangHeuristic> {
    heuristic: H,
}

impl LanguageDetector<WhatlangHeuristic> {
    /// Creates a detector backed by `whatlang`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H: LanguageHeuristic> LanguageDetector<H> {
    /// Creates a detector with a custom heuristic.
    #[must_use]
    pub fn with_heuristic(heuristic: H) -> Self {
        Self { heuristic }
    }

    /// Detects the language of a biography.
    ///
    /// Splits the text into non-empty trimmed lines and returns the label of
    /// the first line whose identified code maps to a known language. Lines
    /// the heuristic cannot identify are skipped. If no line yields a known
    /// code, returns the unknown label with `found = false`.
    #[must_use]
    pub fn detect(&self, text: &str) -> Detection {
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let Some(code) = self.heuristic.identify(line) else {
                continue;
            };

            if let Some(label) = language_label(&code) {
                tracing::debug!("Detected language '{}' (code: {})", label, code);
                return Detection {
                    label: label.to_owned(),
                    found: true,
                };
            }

            tracing::debug!("Line yielded unmapped code '{}', skipping", code);
        }

        Detection::unknown()
    }
}
