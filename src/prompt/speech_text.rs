//! Spoken-text normalization applied to every reply before synthesis.

use regex::Regex;

/// An abbreviation and its spoken form.
struct Expansion {
    pattern: Regex,
    spoken: &'static str,
}

/// Rewrites reply text so it reads well aloud.
pub struct SpeechNormalizer {
    repeated_terminal: Regex,
    expansions: Vec<Expansion>,
}

impl SpeechNormalizer {
    /// Compile the normalization rules.
    ///
    /// # Errors
    /// Returns an error if any regex pattern is invalid.
    pub fn new() -> Result<Self, regex::Error> {
        let rules: [(&str, &'static str); 10] = [
            (r"\bDr\.", "Doctor"),
            (r"\bMrs\.", "Missus"),
            (r"\bMr\.", "Mister"),
            (r"\bMs\.", "Miz"),
            (r"\bProf\.", "Professor"),
            (r"\b(?i:etc)\.(\s+\p{Lu})", "et cetera.${1}"),
            (r"(?i)\betc\.", "et cetera"),
            (r"(?i)\bi\.e\.", "that is"),
            (r"(?i)\be\.g\.", "for example"),
            (r"(?i)\bvs\.", "versus"),
        ];

        let mut expansions = Vec::with_capacity(rules.len());
        for (pattern, spoken) in rules {
            expansions.push(Expansion {
                pattern: Regex::new(pattern)?,
                spoken,
            });
        }

        Ok(Self {
            repeated_terminal: Regex::new(r"([.!?])[.!?]+")?,
            expansions,
        })
    }

    /// Expand abbreviations, collapse repeated terminal punctuation and make sure
    /// the text ends with a terminal mark.
    #[must_use]
    pub fn normalize(&self, text: &str) -> String {
        let mut out = text.trim().to_string();
        if out.is_empty() {
            return out;
        }

        for expansion in &self.expansions {
            if expansion.pattern.is_match(&out) {
                out = expansion
                    .pattern
                    .replace_all(&out, expansion.spoken)
                    .into_owned();
            }
        }

        out = self.repeated_terminal.replace_all(&out, "$1").into_owned();

        let trimmed_len = out.trim_end().len();
        out.truncate(trimmed_len);
        if !out.ends_with(['.', '!', '?']) {
            out.push('.');
        }
        out
    }
}
