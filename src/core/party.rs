//! Party grammar: grammatical class and pronoun per party short name, and the
//! article/case correction rules derived from them.
//!
//! Party names arrive in sentences bare ("vor CDU"). The derived rules add
//! the nominative article ("vor die CDU") for every template and then, for
//! the templates listed in `dative_templates`, turn the article after "vor"
//! into the dative ("vor der CDU").

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::catalog::ron_options;
use crate::core::correction::{CorrectionError, CorrectionRule, CorrectionSet};

#[derive(Debug, Error)]
pub enum PartyGrammarError {
    #[error("correction error: {0}")]
    Correction(#[from] CorrectionError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Irregular article forms for one party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "Forms")]
pub struct CaseForms {
    pub nominative: String,
    pub dative: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "PartyGrammar")]
pub struct PartyGrammar {
    /// Parties taking "die" / "der".
    #[serde(default)]
    pub feminine: Vec<String>,
    /// Parties taking "das" / "dem".
    #[serde(default)]
    pub neuter: Vec<String>,
    /// Short name → display name, rendered as "die Partei <name>".
    #[serde(default)]
    pub with_party_prefix: IndexMap<String, String>,
    /// Short name → full nominative and dative forms.
    #[serde(default)]
    pub explicit: IndexMap<String, CaseForms>,
    #[serde(default)]
    pub pronouns: IndexMap<String, String>,
    #[serde(default = "default_pronoun")]
    pub default_pronoun: String,
    /// Template keys whose sentences put the party after "vor".
    #[serde(default)]
    pub dative_templates: Vec<String>,
}

fn default_pronoun() -> String {
    "Sie".to_string()
}

impl Default for PartyGrammar {
    fn default() -> Self {
        Self {
            feminine: Vec::new(),
            neuter: Vec::new(),
            with_party_prefix: IndexMap::new(),
            explicit: IndexMap::new(),
            pronouns: IndexMap::new(),
            default_pronoun: default_pronoun(),
            dative_templates: Vec::new(),
        }
    }
}

impl PartyGrammar {
    pub fn load_from_ron(path: &Path) -> Result<PartyGrammar, PartyGrammarError> {
        let contents = std::fs::read_to_string(path)?;
        let grammar = Self::parse_ron(&contents)?;
        debug!(
            path = %path.display(),
            parties = grammar.parties().count(),
            "loaded party grammar"
        );
        Ok(grammar)
    }

    pub fn parse_ron(input: &str) -> Result<PartyGrammar, PartyGrammarError> {
        Ok(ron_options().from_str(input)?)
    }

    /// Every party short name the grammar knows, in declaration order.
    pub fn parties(&self) -> impl Iterator<Item = &str> {
        self.feminine
            .iter()
            .chain(&self.neuter)
            .chain(self.with_party_prefix.keys())
            .chain(self.explicit.keys())
            .map(String::as_str)
    }

    pub fn pronoun(&self, party: &str) -> Option<&str> {
        self.pronouns.get(party).map(String::as_str)
    }

    /// The pronoun for `party`, falling back to the default pronoun.
    pub fn pronoun_or_default(&self, party: &str) -> &str {
        match self.pronoun(party) {
            Some(pronoun) => pronoun,
            None => {
                warn!(party, pronoun = %self.default_pronoun, "no pronoun for party, using default");
                &self.default_pronoun
            }
        }
    }

    /// Derive the article and case corrections. Nominative rules apply to
    /// every template; dative rules only to `dative_templates` and are
    /// matched against the already nominative text.
    pub fn corrections(&self) -> Result<CorrectionSet, PartyGrammarError> {
        let mut set = CorrectionSet::new();
        let everywhere = std::iter::empty::<String>;
        let dative = || self.dative_templates.iter().cloned();

        if let Some(alts) = alternation(&self.feminine) {
            set.push(CorrectionRule::new(&format!(r"\b({alts})\b"), "die ${1}", everywhere())?);
        }
        if let Some(alts) = alternation(&self.neuter) {
            set.push(CorrectionRule::new(&format!(r"\b({alts})\b"), "das ${1}", everywhere())?);
        }
        for (key, name) in &self.with_party_prefix {
            set.push(CorrectionRule::new(
                &format!(r"\b{}\b", regex::escape(key)),
                &literal(&format!("die Partei {name}")),
                everywhere(),
            )?);
        }
        for (key, forms) in &self.explicit {
            set.push(CorrectionRule::new(
                &format!(r"\b{}\b", regex::escape(key)),
                &literal(&forms.nominative),
                everywhere(),
            )?);
        }

        if self.dative_templates.is_empty() {
            return Ok(set);
        }
        if let Some(alts) = alternation(&self.feminine) {
            set.push(CorrectionRule::new(&format!(r"\bvor die ({alts})\b"), "vor der ${1}", dative())?);
        }
        if let Some(alts) = alternation(&self.neuter) {
            set.push(CorrectionRule::new(&format!(r"\bvor das ({alts})\b"), "vor dem ${1}", dative())?);
        }
        for name in self.with_party_prefix.values() {
            let name = regex::escape(name);
            set.push(CorrectionRule::new(
                &format!(r"\bvor die Partei ({name})\b"),
                "vor der Partei ${1}",
                dative(),
            )?);
        }
        for forms in self.explicit.values() {
            set.push(CorrectionRule::new(
                &format!(r"\bvor {}\b", regex::escape(&forms.nominative)),
                &literal(&format!("vor {}", forms.dative)),
                dative(),
            )?);
        }
        Ok(set)
    }
}

/// `a|b|c` over escaped names, longest first so a name never loses to its
/// own prefix. `None` for an empty list.
fn alternation(names: &[String]) -> Option<String> {
    if names.is_empty() {
        return None;
    }
    let mut sorted: Vec<&String> = names.iter().collect();
    sorted.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    Some(
        sorted
            .into_iter()
            .map(|name| regex::escape(name))
            .collect::<Vec<_>>()
            .join("|"),
    )
}

/// Escape `$` so a replacement is inserted literally.
fn literal(text: &str) -> String {
    text.replace('$', "$$")
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAMMAR: &str = r#"
        PartyGrammar(
            feminine: ["SPD", "CDU"],
            neuter: ["BSW", "Bündnis Deutschland"],
            with_party_prefix: {"dieBasis LV": "dieBasis", "FW-PB": "Freie Wähler"},
            explicit: {
                "Grüne": Forms(nominative: "die Grünen", dative: "den Grünen"),
                "Linke": Forms(nominative: "Die Linke", dative: "Der Linken"),
            },
            pronouns: {"SPD": "Sie", "BSW": "Es", "Grüne": "Sie"},
            dative_templates: ["absatz1_abstand_singular", "absatz1_abstand_plural"],
        )
    "#;

    fn grammar() -> PartyGrammar {
        PartyGrammar::parse_ron(GRAMMAR).unwrap()
    }

    fn correct(key: &str, text: &str) -> String {
        grammar().corrections().unwrap().correct_text(key, text)
    }

    #[test]
    fn nominative_articles() {
        assert_eq!(
            correct("titel_absolute_mehrheit", "Absolute Mehrheit für SPD in Beispielstadt"),
            "Absolute Mehrheit für die SPD in Beispielstadt"
        );
        assert_eq!(correct("x", "Für BSW stimmten"), "Für das BSW stimmten");
        assert_eq!(
            correct("x", "Für Bündnis Deutschland stimmten"),
            "Für das Bündnis Deutschland stimmten"
        );
        assert_eq!(correct("x", "an Grüne."), "an die Grünen.");
        assert_eq!(correct("x", "an Linke."), "an Die Linke.");
        assert_eq!(correct("x", "an FW-PB."), "an die Partei Freie Wähler.");
    }

    #[test]
    fn dative_after_vor_in_dative_templates() {
        let key = "absatz1_abstand_singular";
        assert_eq!(correct(key, "Sie liegt damit vor CDU."), "Sie liegt damit vor der CDU.");
        assert_eq!(correct(key, "Sie liegt damit vor BSW."), "Sie liegt damit vor dem BSW.");
        assert_eq!(
            correct(key, "Sie liegt damit vor Grüne."),
            "Sie liegt damit vor den Grünen."
        );
        assert_eq!(
            correct(key, "Sie liegt damit vor Linke."),
            "Sie liegt damit vor Der Linken."
        );
        assert_eq!(
            correct(key, "Sie liegt damit vor dieBasis LV."),
            "Sie liegt damit vor der Partei dieBasis."
        );
    }

    #[test]
    fn dative_rules_are_scoped() {
        assert_eq!(correct("absatz1_gewinner", "vor CDU"), "vor die CDU");
    }

    #[test]
    fn rule_order_nominative_before_dative() {
        let set = grammar().corrections().unwrap();
        let scoped: Vec<bool> = set.iter().map(|r| r.scope().is_empty()).collect();
        let first_scoped = scoped.iter().position(|global| !global).unwrap();
        assert!(scoped[..first_scoped].iter().all(|g| *g));
        assert!(scoped[first_scoped..].iter().all(|g| !*g));
    }

    #[test]
    fn pronoun_lookup_and_default() {
        let g = grammar();
        assert_eq!(g.pronoun("BSW"), Some("Es"));
        assert_eq!(g.pronoun("Volt"), None);
        assert_eq!(g.pronoun_or_default("Volt"), "Sie");
    }

    #[test]
    fn empty_grammar_derives_no_rules() {
        let set = PartyGrammar::default().corrections().unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn names_are_escaped() {
        let g = PartyGrammar {
            feminine: vec!["A.B".to_string()],
            ..PartyGrammar::default()
        };
        let set = g.corrections().unwrap();
        assert_eq!(set.correct_text("x", "für AxB"), "für AxB");
        assert_eq!(set.correct_text("x", "für A.B"), "für die A.B");
    }

    #[test]
    fn parties_lists_every_class() {
        let g = grammar();
        let names: Vec<&str> = g.parties().collect();
        assert_eq!(
            names,
            vec!["SPD", "CDU", "BSW", "Bündnis Deutschland", "dieBasis LV", "FW-PB", "Grüne", "Linke"]
        );
    }
}
