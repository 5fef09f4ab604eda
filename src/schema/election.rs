use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

use super::variables::Variables;
use crate::core::party::PartyGrammar;

/// Rank prefixes for the first ten parties, winner first.
pub const RANKS: [&str; 10] = [
    "gewinner", "zweite", "dritte", "vierte", "fuenfte", "sechste", "siebte", "achte", "neunte",
    "zehnte",
];

#[derive(Debug, Error)]
pub enum ElectionError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("election result lists no candidates")]
    NoCandidates,
    #[error("result row ({kandidatur_id}, {pos}) has no candidate entry")]
    UnknownCandidate { kandidatur_id: CandidacyId, pos: i64 },
}

/// Candidacy identifier as delivered by the results feed: numeric or text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CandidacyId {
    Number(i64),
    Text(String),
}

impl fmt::Display for CandidacyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Raw election record. Only the fields the texts need are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionRecord {
    pub wahl: Election,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Election {
    /// Municipality name, e.g. `"Beispielstadt, Stadt"`.
    pub gks_name: String,
    pub ergebnis: ResultSet,
    #[serde(default)]
    pub kandidaten: Vec<Candidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    #[serde(default)]
    pub kandidaten: Vec<ResultRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub kandidatur_id: CandidacyId,
    pub pos: i64,
    pub prozent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub kandidatur_id: CandidacyId,
    pub pos: i64,
    pub partei: String,
}

/// One party's share, after joining result rows with candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub party: String,
    pub percent: f64,
}

impl ElectionRecord {
    pub fn from_json(input: &str) -> Result<ElectionRecord, ElectionError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn load_json(path: &Path) -> Result<ElectionRecord, ElectionError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Municipality name without the trailing qualifier after the first comma.
    pub fn place_name(&self) -> &str {
        self.wahl
            .gks_name
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
    }

    /// Result rows joined with their candidates, highest share first. Ties
    /// keep feed order.
    pub fn standings(&self) -> Result<Vec<Standing>, ElectionError> {
        let rows = &self.wahl.ergebnis.kandidaten;
        if rows.is_empty() {
            return Err(ElectionError::NoCandidates);
        }
        let mut standings = rows
            .iter()
            .map(|row| {
                self.wahl
                    .kandidaten
                    .iter()
                    .find(|c| c.kandidatur_id == row.kandidatur_id && c.pos == row.pos)
                    .map(|c| Standing {
                        party: c.partei.clone(),
                        percent: row.prozent,
                    })
                    .ok_or_else(|| ElectionError::UnknownCandidate {
                        kandidatur_id: row.kandidatur_id.clone(),
                        pos: row.pos,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        standings.sort_by(|a, b| b.percent.total_cmp(&a.percent));
        Ok(standings)
    }

    /// Flatten into the variables the templates read: `name`, `ortsname`,
    /// `num_parties` and `<rank>_partei` / `<rank>_prozent` /
    /// `<rank>_pronomen` for up to ten ranks.
    pub fn to_variables(&self, grammar: &PartyGrammar) -> Result<Variables, ElectionError> {
        let standings = self.standings()?;
        let mut vars = Variables::new()
            .with("name", self.place_name())
            .with("ortsname", self.place_name())
            .with("num_parties", standings.len() as i64);
        for (rank, standing) in RANKS.iter().zip(&standings) {
            vars.insert(format!("{rank}_partei"), standing.party.as_str());
            vars.insert(format!("{rank}_prozent"), standing.percent);
            vars.insert(
                format!("{rank}_pronomen"),
                grammar.pronoun_or_default(&standing.party),
            );
        }
        Ok(vars)
    }
}

/// Every variable name extraction can produce.
pub fn known_variables() -> Vec<String> {
    let mut names = vec![
        "name".to_string(),
        "ortsname".to_string(),
        "num_parties".to_string(),
    ];
    for rank in RANKS {
        for suffix in ["partei", "prozent", "pronomen"] {
            names.push(format!("{rank}_{suffix}"));
        }
    }
    names
}
