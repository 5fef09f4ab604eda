//! Article assembly: generate, correct and join sentences per section.

use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::core::catalog::{ron_options, Template, TemplateCatalog};
use crate::core::correction::CorrectionSet;
use crate::core::generator::{self, RenderError};
use crate::core::selector::{self, Criterion};
use crate::schema::variables::Variables;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("duplicate section '{0}'")]
    DuplicateSection(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Generated article: section name → corrected section text, in layout order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Article {
    sections: IndexMap<String, String>,
}

impl Article {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, section: impl Into<String>, text: impl Into<String>) {
        self.sections.insert(section.into(), text.into());
    }

    pub fn get(&self, section: &str) -> Option<&str> {
        self.sections.get(section).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Non-empty sections separated by blank lines.
impl fmt::Display for Article {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (_, text) in self.iter().filter(|(_, text)| !text.is_empty()) {
            if !first {
                f.write_str("\n\n")?;
            }
            f.write_str(text)?;
            first = false;
        }
        Ok(())
    }
}

/// One section of a layout. Its selections are concatenated in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "Section")]
pub struct SectionSpec {
    pub name: String,
    pub select: Vec<Criterion>,
}

/// Which selection feeds which section, in output order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleLayout {
    sections: Vec<SectionSpec>,
}

impl ArticleLayout {
    pub fn new(sections: Vec<SectionSpec>) -> Result<ArticleLayout, LayoutError> {
        for (i, section) in sections.iter().enumerate() {
            if sections[..i].iter().any(|s| s.name == section.name) {
                return Err(LayoutError::DuplicateSection(section.name.clone()));
            }
        }
        Ok(ArticleLayout { sections })
    }

    /// Builder-style: append a section. Naming an existing section adds the
    /// criterion to it, so section names stay unique.
    pub fn section(mut self, name: impl Into<String>, select: Criterion) -> Self {
        let name = name.into();
        match self.sections.iter_mut().find(|s| s.name == name) {
            Some(existing) => existing.select.push(select),
            None => self.sections.push(SectionSpec {
                name,
                select: vec![select],
            }),
        }
        self
    }

    pub fn load_from_ron(path: &Path) -> Result<ArticleLayout, LayoutError> {
        let contents = std::fs::read_to_string(path)?;
        let layout = Self::parse_ron(&contents)?;
        debug!(path = %path.display(), sections = layout.len(), "loaded article layout");
        Ok(layout)
    }

    pub fn parse_ron(input: &str) -> Result<ArticleLayout, LayoutError> {
        let sections: Vec<SectionSpec> = ron_options().from_str(input)?;
        Self::new(sections)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SectionSpec> {
        self.sections.iter()
    }

    /// Run every section's selections against `catalog`.
    pub fn resolve<'a>(
        &self,
        catalog: &'a TemplateCatalog,
        vars: &Variables,
    ) -> IndexMap<String, Vec<&'a Template>> {
        self.sections
            .iter()
            .map(|section| {
                let selected: Vec<&'a Template> = section
                    .select
                    .iter()
                    .flat_map(|criterion| selector::select(catalog, criterion, vars))
                    .collect();
                (section.name.clone(), selected)
            })
            .collect()
    }
}

/// Render, correct and space-join `selected` in selection order. An empty
/// selection gives an empty string.
pub fn build<R: Rng + ?Sized>(
    selected: &[&Template],
    vars: &Variables,
    corrections: &CorrectionSet,
    rng: &mut R,
) -> Result<String, RenderError> {
    let sentences = generator::render(selected, vars, rng)?;
    Ok(corrections
        .correct(sentences)
        .into_iter()
        .map(|s| s.text)
        .collect::<Vec<_>>()
        .join(" "))
}

/// Build each section independently, in the order given.
pub fn build_article<R: Rng + ?Sized>(
    sections: &IndexMap<String, Vec<&Template>>,
    vars: &Variables,
    corrections: &CorrectionSet,
    rng: &mut R,
) -> Result<Article, RenderError> {
    let mut article = Article::new();
    for (name, selected) in sections {
        let text = build(selected, vars, corrections, &mut *rng)?;
        article.insert(name.clone(), text);
    }
    Ok(article)
}
