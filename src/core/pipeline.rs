//! The main text pipeline: variables → selection → rendering → correction
//! → article.
//!
//! The engine owns the template catalog, the correction table, the party
//! grammar and the article layout. All of it is read-only after `build()`;
//! every generation method takes `&self` and a caller-supplied RNG.

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::core::article::{self, Article, ArticleLayout, LayoutError};
use crate::core::catalog::{CatalogError, Template, TemplateCatalog};
use crate::core::correction::{CorrectionError, CorrectionSet};
use crate::core::generator::{self, RenderError, Sentence};
use crate::core::party::{PartyGrammar, PartyGrammarError};
use crate::core::selector::{self, Criterion};
use crate::schema::election::{ElectionError, ElectionRecord};
use crate::schema::variables::Variables;

/// Directory holding the shipped data sets, one subdirectory per set.
pub const DATA_ROOT: &str = "wahl_data";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("correction error: {0}")]
    Correction(#[from] CorrectionError),
    #[error("party grammar error: {0}")]
    PartyGrammar(#[from] PartyGrammarError),
    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),
    #[error("render error: {0}")]
    Render(#[from] RenderError),
    #[error("election error: {0}")]
    Election(#[from] ElectionError),
    #[error("data set directory not found: {0}")]
    DataSetNotFound(PathBuf),
}

/// The top-level text engine. Built via `WahltextEngine::builder()`.
#[derive(Debug, Clone)]
pub struct WahltextEngine {
    catalog: TemplateCatalog,
    corrections: CorrectionSet,
    parties: PartyGrammar,
    layout: ArticleLayout,
    seed: u64,
}

/// Builder for constructing a `WahltextEngine`.
#[derive(Debug, Default)]
pub struct WahltextEngineBuilder {
    data_dirs: Vec<PathBuf>,
    templates_path: Option<PathBuf>,
    corrections_path: Option<PathBuf>,
    parties_path: Option<PathBuf>,
    layout_path: Option<PathBuf>,
    seed: u64,
    /// Directly provided catalog (for testing without files).
    catalog: Option<TemplateCatalog>,
    /// Directly provided corrections, run after any loaded ones.
    corrections: Option<CorrectionSet>,
    /// Directly provided party grammar (for testing without files).
    parties: Option<PartyGrammar>,
    /// Directly provided layout (for testing without files).
    layout: Option<ArticleLayout>,
}

impl WahltextEngine {
    pub fn builder() -> WahltextEngineBuilder {
        WahltextEngineBuilder::default()
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// The full correction table: configured rules, then party-derived rules.
    pub fn corrections(&self) -> &CorrectionSet {
        &self.corrections
    }

    pub fn parties(&self) -> &PartyGrammar {
        &self.parties
    }

    pub fn layout(&self) -> &ArticleLayout {
        &self.layout
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Eligible templates for `criterion`, in catalog (or key-list) order.
    pub fn select(&self, criterion: &Criterion, vars: &Variables) -> Vec<&Template> {
        selector::select(&self.catalog, criterion, vars)
    }

    /// Render selected templates without correcting them.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        selected: &[&Template],
        vars: &Variables,
        rng: &mut R,
    ) -> Result<Vec<Sentence>, PipelineError> {
        Ok(generator::render(selected, vars, rng)?)
    }

    pub fn correct(&self, sentences: Vec<Sentence>) -> Vec<Sentence> {
        self.corrections.correct(sentences)
    }

    /// Generate, correct and space-join one selection.
    pub fn build_text<R: Rng + ?Sized>(
        &self,
        selected: &[&Template],
        vars: &Variables,
        rng: &mut R,
    ) -> Result<String, PipelineError> {
        Ok(article::build(selected, vars, &self.corrections, rng)?)
    }

    /// Build every given section independently, in the given order.
    pub fn build_article<R: Rng + ?Sized>(
        &self,
        sections: &IndexMap<String, Vec<&Template>>,
        vars: &Variables,
        rng: &mut R,
    ) -> Result<Article, PipelineError> {
        Ok(article::build_article(sections, vars, &self.corrections, rng)?)
    }

    /// Build the configured layout with a caller-supplied RNG.
    pub fn compose_with_rng<R: Rng + ?Sized>(
        &self,
        vars: &Variables,
        rng: &mut R,
    ) -> Result<Article, PipelineError> {
        let sections = self.layout.resolve(&self.catalog, vars);
        self.build_article(&sections, vars, rng)
    }

    /// Build the configured layout from a fresh RNG seeded with the engine
    /// seed. Repeated calls with the same variables give the same article.
    pub fn compose(&self, vars: &Variables) -> Result<Article, PipelineError> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.compose_with_rng(vars, &mut rng)
    }

    /// Extract variables from a raw election record using this engine's
    /// party grammar for pronouns.
    pub fn variables_for(&self, record: &ElectionRecord) -> Result<Variables, PipelineError> {
        Ok(record.to_variables(&self.parties)?)
    }

    pub fn compose_election(&self, record: &ElectionRecord) -> Result<Article, PipelineError> {
        let vars = self.variables_for(record)?;
        self.compose(&vars)
    }
}

impl WahltextEngineBuilder {
    /// Load a shipped data set from `wahl_data/<name>/`.
    pub fn data_set(self, name: &str) -> Self {
        self.data_dir(Path::new(DATA_ROOT).join(name))
    }

    /// Load `templates.ron`, `corrections.ron`, `parties.ron` and
    /// `layout.ron` from a directory. Files that are absent are skipped.
    /// Later directories extend or override earlier ones.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dirs.push(dir.into());
        self
    }

    pub fn templates_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.templates_path = Some(path.into());
        self
    }

    pub fn corrections_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.corrections_path = Some(path.into());
        self
    }

    pub fn parties_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.parties_path = Some(path.into());
        self
    }

    pub fn layout_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.layout_path = Some(path.into());
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Provide a catalog directly. Loaded templates are merged on top.
    pub fn with_catalog(mut self, catalog: TemplateCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_corrections(mut self, corrections: CorrectionSet) -> Self {
        self.corrections = Some(corrections);
        self
    }

    /// Provide a party grammar directly; it takes precedence over files.
    pub fn with_parties(mut self, parties: PartyGrammar) -> Self {
        self.parties = Some(parties);
        self
    }

    /// Provide a layout directly; it takes precedence over files.
    pub fn with_layout(mut self, layout: ArticleLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn build(self) -> Result<WahltextEngine, PipelineError> {
        let mut catalog = self.catalog.unwrap_or_default();
        let mut corrections = CorrectionSet::new();
        let mut parties = None;
        let mut layout = None;

        // Load data set directories in order
        for dir in &self.data_dirs {
            if !dir.is_dir() {
                return Err(PipelineError::DataSetNotFound(dir.clone()));
            }
            let templates = dir.join("templates.ron");
            if templates.exists() {
                catalog.merge(TemplateCatalog::load_from_ron(&templates)?);
            }
            let rules = dir.join("corrections.ron");
            if rules.exists() {
                corrections.extend(CorrectionSet::load_from_ron(&rules)?);
            }
            let grammar = dir.join("parties.ron");
            if grammar.exists() {
                parties = Some(PartyGrammar::load_from_ron(&grammar)?);
            }
            let sections = dir.join("layout.ron");
            if sections.exists() {
                layout = Some(ArticleLayout::load_from_ron(&sections)?);
            }
        }

        // Individual files override data sets
        if let Some(ref path) = self.templates_path {
            catalog.merge(TemplateCatalog::load_from_ron(path)?);
        }
        if let Some(ref path) = self.corrections_path {
            corrections.extend(CorrectionSet::load_from_ron(path)?);
        }
        if let Some(ref path) = self.parties_path {
            parties = Some(PartyGrammar::load_from_ron(path)?);
        }
        if let Some(ref path) = self.layout_path {
            layout = Some(ArticleLayout::load_from_ron(path)?);
        }

        if let Some(extra) = self.corrections {
            corrections.extend(extra);
        }
        let parties = self.parties.or(parties).unwrap_or_default();
        corrections.extend(parties.corrections()?);

        let layout = match self.layout.or(layout) {
            Some(layout) => layout,
            None => topic_layout(&catalog),
        };

        debug!(
            templates = catalog.len(),
            corrections = corrections.len(),
            sections = layout.len(),
            seed = self.seed,
            "built wahltext engine"
        );

        Ok(WahltextEngine {
            catalog,
            corrections,
            parties,
            layout,
            seed: self.seed,
        })
    }
}

/// Fallback layout: one section per catalog topic, named after the topic.
fn topic_layout(catalog: &TemplateCatalog) -> ArticleLayout {
    catalog
        .topics()
        .into_iter()
        .fold(ArticleLayout::default(), |layout, topic| {
            layout.section(topic, Criterion::topic(topic))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::correction::CorrectionRule;

    fn build_test_engine() -> WahltextEngine {
        let catalog = TemplateCatalog::parse_ron(
            r#"{
                "titel_absolute_mehrheit": Template(
                    topic: "ergebnis",
                    conditions: ["gewinner_prozent >= 50", "gewinner_prozent != zweite_prozent"],
                    text: "Absolute Mehrheit für {gewinner_partei} in {name}",
                ),
                "titel_gleichauf": Template(
                    topic: "ergebnis",
                    conditions: ["gewinner_prozent == zweite_prozent"],
                    text: "{gewinner_partei} und {zweite_partei} gleichauf",
                ),
                "absatz1_gewinner": Template(
                    topic: "absatz1",
                    text: [
                        "Für {gewinner_partei} stimmten {gewinner_prozent} Prozent.",
                        "{gewinner_prozent} Prozent stimmten für {gewinner_partei}.",
                    ],
                ),
            }"#,
        )
        .unwrap();
        let parties = PartyGrammar::parse_ron(r#"PartyGrammar(feminine: ["SPD", "CDU"])"#).unwrap();
        let numbers: CorrectionSet = [
            CorrectionRule::global(r"\b(\d+)\.0\b", "${1}").unwrap(),
            CorrectionRule::global(r"\b(\d+)\.(\d+)\b", "${1},${2}").unwrap(),
        ]
        .into_iter()
        .collect();

        WahltextEngine::builder()
            .seed(42)
            .with_catalog(catalog)
            .with_corrections(numbers)
            .with_parties(parties)
            .build()
            .unwrap()
    }

    fn majority() -> Variables {
        Variables::new()
            .with("gewinner_partei", "SPD")
            .with("gewinner_prozent", 52.0)
            .with("zweite_partei", "CDU")
            .with("zweite_prozent", 30.0)
            .with("name", "Beispielstadt")
    }

    #[test]
    fn compose_majority() {
        let engine = build_test_engine();
        let article = engine.compose(&majority()).unwrap();
        assert_eq!(
            article.get("ergebnis"),
            Some("Absolute Mehrheit für die SPD in Beispielstadt")
        );
        let absatz = article.get("absatz1").unwrap();
        assert!(absatz.contains("52 Prozent"));
        assert!(absatz.contains("die SPD"));
    }

    #[test]
    fn fallback_layout_follows_topics() {
        let engine = build_test_engine();
        let names: Vec<&str> = engine.layout().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["ergebnis", "absatz1"]);
    }

    #[test]
    fn party_rules_run_after_configured_rules() {
        let engine = build_test_engine();
        let patterns: Vec<&str> = engine.corrections().iter().map(|r| r.pattern()).collect();
        assert_eq!(patterns.len(), 3);
        assert_eq!(patterns[2], r"\b(SPD|CDU)\b");
    }

    #[test]
    fn compose_is_reproducible() {
        let engine = build_test_engine();
        let first = engine.compose(&majority()).unwrap();
        let second = engine.compose(&majority()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn step_by_step_matches_build_text() {
        let engine = build_test_engine();
        let vars = majority();
        let selected = engine.select(&Criterion::topic("ergebnis"), &vars);
        let mut rng = StdRng::seed_from_u64(1);
        let sentences = engine.generate(&selected, &vars, &mut rng).unwrap();
        assert_eq!(sentences[0].text, "Absolute Mehrheit für SPD in Beispielstadt");
        let corrected = engine.correct(sentences);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            engine.build_text(&selected, &vars, &mut rng).unwrap(),
            corrected[0].text
        );
    }

    #[test]
    fn missing_variable_is_a_render_error() {
        let engine = build_test_engine();
        let vars = Variables::new()
            .with("gewinner_prozent", 52.0)
            .with("zweite_prozent", 30.0);
        assert!(matches!(
            engine.compose(&vars),
            Err(PipelineError::Render(RenderError::MissingVariable { .. }))
        ));
    }

    #[test]
    fn unknown_data_set_is_an_error() {
        let result = WahltextEngine::builder().data_set("gibt_es_nicht").build();
        assert!(matches!(result, Err(PipelineError::DataSetNotFound(_))));
    }
}
