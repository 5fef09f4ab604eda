//! Correction pipeline: scoped regex rewrites applied to generated sentences.
//!
//! Rules run in table order and each one rewrites the output of the rules
//! before it. A rule only touches sentences whose template key is in its
//! `applies_to` set; an empty set means every key.

use regex::Regex;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::core::catalog::ron_options;
use crate::core::generator::Sentence;

#[derive(Debug, Error)]
pub enum CorrectionError {
    #[error("invalid correction pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// A correction rule as written in a RON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "Rule")]
pub struct RuleDef {
    pub pattern: String,
    /// Replacement with `$1` / `${1}` / `$name` backreferences.
    pub replacement: String,
    #[serde(default)]
    pub applies_to: Vec<String>,
}

/// A compiled correction rule.
#[derive(Debug, Clone)]
pub struct CorrectionRule {
    regex: Regex,
    replacement: String,
    applies_to: FxHashSet<String>,
}

impl CorrectionRule {
    pub fn new<I, S>(pattern: &str, replacement: &str, applies_to: I) -> Result<Self, CorrectionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let regex = Regex::new(pattern).map_err(|source| CorrectionError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            regex,
            replacement: replacement.to_string(),
            applies_to: applies_to.into_iter().map(Into::into).collect(),
        })
    }

    /// A rule that applies to every template key.
    pub fn global(pattern: &str, replacement: &str) -> Result<Self, CorrectionError> {
        Self::new(pattern, replacement, std::iter::empty::<String>())
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Template keys this rule is restricted to; empty means unrestricted.
    pub fn scope(&self) -> &FxHashSet<String> {
        &self.applies_to
    }

    pub fn applies_to(&self, key: &str) -> bool {
        self.applies_to.is_empty() || self.applies_to.contains(key)
    }

    /// One replace-all pass over `text`.
    pub fn apply(&self, text: &str) -> String {
        self.regex
            .replace_all(text, self.replacement.as_str())
            .into_owned()
    }
}

impl TryFrom<&RuleDef> for CorrectionRule {
    type Error = CorrectionError;

    fn try_from(def: &RuleDef) -> Result<Self, Self::Error> {
        Self::new(&def.pattern, &def.replacement, def.applies_to.iter().cloned())
    }
}

/// An ordered table of correction rules.
#[derive(Debug, Clone, Default)]
pub struct CorrectionSet {
    rules: Vec<CorrectionRule>,
}

impl CorrectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: CorrectionRule) {
        self.rules.push(rule);
    }

    /// Append another table; its rules run after the existing ones.
    pub fn extend(&mut self, other: CorrectionSet) {
        self.rules.extend(other.rules);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CorrectionRule> {
        self.rules.iter()
    }

    /// Compile rule definitions in order.
    pub fn from_definitions(defs: &[RuleDef]) -> Result<CorrectionSet, CorrectionError> {
        let rules = defs
            .iter()
            .map(CorrectionRule::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CorrectionSet { rules })
    }

    /// Load a correction table from a RON file containing a list of rules.
    pub fn load_from_ron(path: &Path) -> Result<CorrectionSet, CorrectionError> {
        let contents = std::fs::read_to_string(path)?;
        let set = Self::parse_ron(&contents)?;
        debug!(path = %path.display(), rules = set.len(), "loaded correction rules");
        Ok(set)
    }

    pub fn parse_ron(input: &str) -> Result<CorrectionSet, CorrectionError> {
        let defs: Vec<RuleDef> = ron_options().from_str(input)?;
        Self::from_definitions(&defs)
    }

    /// Run every applicable rule over one sentence, in table order.
    pub fn correct_text(&self, key: &str, text: &str) -> String {
        let mut current = text.to_string();
        for rule in self.rules.iter().filter(|r| r.applies_to(key)) {
            current = rule.apply(&current);
        }
        current
    }

    /// Correct every sentence, keeping order and keys.
    pub fn correct(&self, sentences: Vec<Sentence>) -> Vec<Sentence> {
        sentences
            .into_iter()
            .map(|sentence| {
                let text = self.correct_text(&sentence.key, &sentence.text);
                Sentence { text, ..sentence }
            })
            .collect()
    }
}

impl FromIterator<CorrectionRule> for CorrectionSet {
    fn from_iter<I: IntoIterator<Item = CorrectionRule>>(iter: I) -> Self {
        CorrectionSet {
            rules: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number_rules() -> CorrectionSet {
        CorrectionSet::parse_ron(
            r#"[
                Rule(pattern: r"\b(\d+)\.0\b", replacement: "${1}"),
                Rule(pattern: r"\b(\d+)\.(\d+)\b", replacement: "${1},${2}"),
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn decimal_point_becomes_comma() {
        let rules: CorrectionSet = [CorrectionRule::global(r"\b(\d+)\.(\d+)\b", "${1},${2}").unwrap()]
            .into_iter()
            .collect();
        assert_eq!(rules.correct_text("absatz1", "34.5 Prozent"), "34,5 Prozent");
    }

    #[test]
    fn trailing_zero_stripped_before_comma_rule() {
        let rules = number_rules();
        assert_eq!(rules.correct_text("absatz1", "50.0 Prozent"), "50 Prozent");
        assert_eq!(rules.correct_text("absatz1", "34.5 Prozent"), "34,5 Prozent");
        assert_eq!(rules.correct_text("absatz1", "50.05 Prozent"), "50,05 Prozent");
    }

    #[test]
    fn rule_order_matters() {
        let mut reversed = CorrectionSet::new();
        reversed.push(CorrectionRule::global(r"\b(\d+)\.(\d+)\b", "${1},${2}").unwrap());
        reversed.push(CorrectionRule::global(r"\b(\d+)\.0\b", "${1}").unwrap());
        assert_eq!(reversed.correct_text("x", "50.0 Prozent"), "50,0 Prozent");
    }

    #[test]
    fn later_rule_sees_earlier_output() {
        let mut rules = CorrectionSet::new();
        rules.push(CorrectionRule::global(r"\bSPD\b", "die SPD").unwrap());
        rules.push(CorrectionRule::global(r"\bvor die SPD\b", "vor der SPD").unwrap());
        assert_eq!(
            rules.correct_text("absatz1_abstand", "Sie liegt vor SPD."),
            "Sie liegt vor der SPD."
        );
    }

    #[test]
    fn scoped_rule_never_touches_other_keys() {
        let mut rules = CorrectionSet::new();
        rules.push(CorrectionRule::new(r"Wahl", "Abstimmung", ["titel"]).unwrap());
        let sentences = vec![
            Sentence::new("titel", "Wahl in Beispielstadt"),
            Sentence::new("absatz1_gewinner", "Bei der Wahl in Beispielstadt"),
        ];
        let corrected = rules.correct(sentences);
        assert_eq!(corrected[0].text, "Abstimmung in Beispielstadt");
        assert_eq!(corrected[1].text, "Bei der Wahl in Beispielstadt");
        assert_eq!(corrected[1].key, "absatz1_gewinner");
    }

    #[test]
    fn empty_scope_applies_everywhere() {
        let rule = CorrectionRule::global("a", "b").unwrap();
        assert!(rule.applies_to("titel"));
        assert!(rule.applies_to("absatz1_anything"));
        assert!(rule.scope().is_empty());
    }

    #[test]
    fn invalid_pattern_is_a_load_error() {
        let result = CorrectionSet::parse_ron(r#"[Rule(pattern: "(unclosed", replacement: "")]"#);
        assert!(matches!(
            result,
            Err(CorrectionError::InvalidPattern { ref pattern, .. }) if pattern == "(unclosed"
        ));
    }

    #[test]
    fn correction_keeps_order() {
        let rules = number_rules();
        let corrected = rules.correct(vec![
            Sentence::new("b", "2.0"),
            Sentence::new("a", "1.5"),
        ]);
        assert_eq!(
            corrected,
            vec![Sentence::new("b", "2"), Sentence::new("a", "1,5")]
        );
    }

    #[test]
    fn unicode_word_boundaries() {
        let rule = CorrectionRule::global(r"\bGrüne\b", "die Grünen").unwrap();
        assert_eq!(rule.apply("vor Grüne."), "vor die Grünen.");
        assert_eq!(rule.apply("Grünen"), "Grünen");
    }
}
