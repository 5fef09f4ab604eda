//! Template catalog: types, text parsing and RON loading.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::core::expr::{Condition, ExprError};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("template '{template}': {message}")]
    TextParse { template: String, message: String },
    #[error("template '{template}' has an empty variant list")]
    NoVariants { template: String },
    #[error("template '{template}', condition `{condition}`: {source}")]
    InvalidCondition {
        template: String,
        condition: String,
        #[source]
        source: ExprError,
    },
    #[error("duplicate template key '{0}'")]
    DuplicateKey(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// A segment of a parsed sentence pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Segment {
    /// Literal text, emitted as-is.
    Literal(String),
    /// Variable substitution: `{name}`.
    Placeholder(String),
}

/// A parsed sentence pattern, stored as a sequence of segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub segments: Vec<Segment>,
}

impl Pattern {
    /// Parse a sentence pattern.
    ///
    /// Syntax:
    /// - `{name}` → `Placeholder` (name must be an identifier)
    /// - `{{` / `}}` → literal `{` / `}`
    /// - Everything else → `Literal`
    pub fn parse(input: &str) -> Result<Pattern, String> {
        let mut segments = Vec::new();
        let mut literal_buf = String::new();
        let chars: Vec<char> = input.chars().collect();
        let len = chars.len();
        let mut i = 0;

        while i < len {
            if chars[i] == '{' {
                // Escaped brace
                if i + 1 < len && chars[i + 1] == '{' {
                    literal_buf.push('{');
                    i += 2;
                    continue;
                }

                if !literal_buf.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal_buf)));
                }

                let start = i + 1;
                let mut end = start;
                while end < len && chars[end] != '}' {
                    if chars[end] == '{' {
                        return Err("nested braces are not allowed".to_string());
                    }
                    end += 1;
                }
                if end == len {
                    return Err("unclosed brace".to_string());
                }

                let name: String = chars[start..end].iter().collect();
                if name.is_empty() {
                    return Err("empty braces".to_string());
                }
                if !is_identifier(&name) {
                    return Err(format!("invalid placeholder '{{{}}}'", name));
                }
                segments.push(Segment::Placeholder(name));
                i = end + 1;
            } else if chars[i] == '}' {
                if i + 1 < len && chars[i + 1] == '}' {
                    literal_buf.push('}');
                    i += 2;
                    continue;
                }
                return Err("unmatched closing brace".to_string());
            } else {
                literal_buf.push(chars[i]);
                i += 1;
            }
        }

        if !literal_buf.is_empty() {
            segments.push(Segment::Literal(literal_buf));
        }

        Ok(Pattern { segments })
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// The text of a template: either fixed, or a set of interchangeable
/// variants of which one is drawn per generation.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateText {
    Single(Pattern),
    Variants(Vec<Pattern>),
}

impl TemplateText {
    pub fn patterns(&self) -> &[Pattern] {
        match self {
            Self::Single(p) => std::slice::from_ref(p),
            Self::Variants(ps) => ps,
        }
    }
}

/// A compiled template: parsed text and parsed conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub key: String,
    pub text: TemplateText,
    pub topic: Option<String>,
    pub conditions: Vec<Condition>,
}

impl Template {
    /// Every placeholder referenced by any variant, deduplicated.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for pattern in self.text.patterns() {
            for name in pattern.placeholders() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

/// Raw text as written in a catalog file: one string or a list of variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawText {
    Single(String),
    Variants(Vec<String>),
}

/// A template as written in a catalog file, before compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "Template")]
pub struct TemplateDef {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    pub text: RawText,
}

impl TemplateDef {
    /// Parse text and conditions. Conditions using constructs outside the
    /// whitelist are rejected here rather than at generation time.
    pub fn compile(&self, key: &str) -> Result<Template, CatalogError> {
        let parse_text = |raw: &str| {
            Pattern::parse(raw).map_err(|message| CatalogError::TextParse {
                template: key.to_string(),
                message,
            })
        };

        let text = match &self.text {
            RawText::Single(raw) => TemplateText::Single(parse_text(raw)?),
            RawText::Variants(raws) => {
                if raws.is_empty() {
                    return Err(CatalogError::NoVariants {
                        template: key.to_string(),
                    });
                }
                TemplateText::Variants(
                    raws.iter()
                        .map(|raw| parse_text(raw))
                        .collect::<Result<Vec<_>, _>>()?,
                )
            }
        };

        let conditions = self
            .conditions
            .iter()
            .map(|source| {
                Condition::parse(source).map_err(|e| CatalogError::InvalidCondition {
                    template: key.to_string(),
                    condition: source.clone(),
                    source: e,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Template {
            key: key.to_string(),
            text,
            topic: self.topic.clone(),
            conditions,
        })
    }
}

/// An ordered, read-only set of templates. Iteration order is the order
/// templates were defined in, which is also the order their sentences
/// appear in generated text.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: IndexMap<String, Template>,
}

impl TemplateCatalog {
    /// Compile definitions in the given order. Fails on the first invalid
    /// template or repeated key.
    pub fn from_definitions<I, K>(defs: I) -> Result<TemplateCatalog, CatalogError>
    where
        I: IntoIterator<Item = (K, TemplateDef)>,
        K: Into<String>,
    {
        let mut templates = IndexMap::new();
        for (key, def) in defs {
            let key = key.into();
            if templates.contains_key(&key) {
                return Err(CatalogError::DuplicateKey(key));
            }
            let template = def.compile(&key)?;
            templates.insert(key, template);
        }
        Ok(TemplateCatalog { templates })
    }

    /// Load a catalog from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<TemplateCatalog, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        let catalog = Self::parse_ron(&contents)?;
        debug!(path = %path.display(), templates = catalog.len(), "loaded template catalog");
        Ok(catalog)
    }

    /// Parse a catalog from a RON string: a map of key → `Template(...)`.
    pub fn parse_ron(input: &str) -> Result<TemplateCatalog, CatalogError> {
        Self::from_definitions(parse_definitions(input)?)
    }

    pub fn get(&self, key: &str) -> Option<&Template> {
        self.templates.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.templates.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Templates in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Distinct topics in order of first appearance.
    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = Vec::new();
        for topic in self.iter().filter_map(|t| t.topic.as_deref()) {
            if !topics.contains(&topic) {
                topics.push(topic);
            }
        }
        topics
    }

    /// Merge another catalog into this one. Templates from `other` replace
    /// same-key templates in place; new keys are appended.
    pub fn merge(&mut self, other: TemplateCatalog) {
        for (key, template) in other.templates {
            self.templates.insert(key, template);
        }
    }
}

/// Parse raw definitions without compiling them, preserving file order.
/// Used by tooling that wants to report every problem instead of the first.
///
/// Repeated keys are kept as separate entries so that compilation can
/// reject them. `implicit_some` is always on, so `topic: "titel"` needs
/// no `Some(..)`.
pub fn parse_definitions(input: &str) -> Result<Vec<(String, TemplateDef)>, CatalogError> {
    let Definitions(defs) = ron_options().from_str(input)?;
    Ok(defs)
}

/// Catalog file contents in file order, duplicates included.
struct Definitions(Vec<(String, TemplateDef)>);

impl<'de> Deserialize<'de> for Definitions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de;

        struct DefinitionsVisitor;

        impl<'de> de::Visitor<'de> for DefinitionsVisitor {
            type Value = Definitions;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a map of template keys to Template(...) records")
            }

            fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut defs = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, TemplateDef>()? {
                    defs.push(entry);
                }
                Ok(Definitions(defs))
            }
        }

        deserializer.deserialize_map(DefinitionsVisitor)
    }
}

pub(crate) fn ron_options() -> ron::Options {
    ron::Options::default().with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_literal_only() {
        let p = Pattern::parse("In Beispielstadt traten keine weiteren Parteien an.").unwrap();
        assert_eq!(
            p.segments,
            vec![Segment::Literal(
                "In Beispielstadt traten keine weiteren Parteien an.".to_string()
            )]
        );
    }

    #[test]
    fn parse_placeholders() {
        let p = Pattern::parse("Wahl: {gewinner_partei} stärkste Kraft in {name}").unwrap();
        assert_eq!(
            p.segments,
            vec![
                Segment::Literal("Wahl: ".to_string()),
                Segment::Placeholder("gewinner_partei".to_string()),
                Segment::Literal(" stärkste Kraft in ".to_string()),
                Segment::Placeholder("name".to_string()),
            ]
        );
        assert_eq!(
            p.placeholders().collect::<Vec<_>>(),
            vec!["gewinner_partei", "name"]
        );
    }

    #[test]
    fn parse_escaped_braces() {
        let p = Pattern::parse("Use {{braces}} here.").unwrap();
        assert_eq!(
            p.segments,
            vec![Segment::Literal("Use {braces} here.".to_string())]
        );
    }

    #[test]
    fn parse_errors() {
        assert!(Pattern::parse("Bad {} here").is_err());
        assert!(Pattern::parse("Bad {outer{inner}} here").is_err());
        assert!(Pattern::parse("Bad {unclosed here").is_err());
        assert!(Pattern::parse("Bad } here").is_err());
        assert!(Pattern::parse("Bad {x:.1f} here").is_err());
        assert!(Pattern::parse("Bad {a.b} here").is_err());
    }

    #[test]
    fn load_test_catalog_from_ron() {
        let path = std::path::PathBuf::from("tests/fixtures/test_templates.ron");
        let catalog = TemplateCatalog::load_from_ron(&path).unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(
            catalog.keys().collect::<Vec<_>>(),
            vec!["titel_mehrheit", "titel_vorn", "absatz1_intro", "absatz1_variante"]
        );
        assert_eq!(catalog.topics(), vec!["titel", "absatz1"]);

        let intro = catalog.get("absatz1_intro").unwrap();
        assert!(intro.conditions.is_empty());
        assert!(matches!(intro.text, TemplateText::Single(_)));

        let variante = catalog.get("absatz1_variante").unwrap();
        assert!(matches!(variante.text, TemplateText::Variants(ref v) if v.len() == 2));
    }

    #[test]
    fn unsafe_condition_rejected_at_load() {
        let input = r#"{
            "boese": Template(
                conditions: ["open('x') == 1"],
                text: "nie",
            ),
        }"#;
        let err = TemplateCatalog::parse_ron(input).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::InvalidCondition {
                source: ExprError::UnsafeExpression(_),
                ..
            }
        ));
    }

    #[test]
    fn bad_text_rejected_at_load() {
        let input = r#"{ "kaputt": Template(text: "{offen") }"#;
        assert!(matches!(
            TemplateCatalog::parse_ron(input),
            Err(CatalogError::TextParse { .. })
        ));
        let input = r#"{ "leer": Template(text: []) }"#;
        assert!(matches!(
            TemplateCatalog::parse_ron(input),
            Err(CatalogError::NoVariants { .. })
        ));
    }

    #[test]
    fn duplicate_keys_in_ron_rejected() {
        let input = r#"{
            "a": Template(text: "eins"),
            "a": Template(text: "zwei"),
        }"#;
        assert_eq!(parse_definitions(input).unwrap().len(), 2);
        assert!(matches!(
            TemplateCatalog::parse_ron(input),
            Err(CatalogError::DuplicateKey(k)) if k == "a"
        ));
    }

    #[test]
    fn duplicate_keys_rejected() {
        let def = TemplateDef {
            topic: None,
            conditions: vec![],
            text: RawText::Single("x".to_string()),
        };
        let result = TemplateCatalog::from_definitions(vec![("a", def.clone()), ("a", def)]);
        assert!(matches!(result, Err(CatalogError::DuplicateKey(k)) if k == "a"));
    }

    #[test]
    fn placeholders_across_variants() {
        let def = TemplateDef {
            topic: Some("absatz1".to_string()),
            conditions: vec![],
            text: RawText::Variants(vec![
                "{gewinner_partei} gewinnt in {name}.".to_string(),
                "In {name} siegt {gewinner_partei} mit {gewinner_prozent} Prozent.".to_string(),
            ]),
        };
        let t = def.compile("absatz1_sieg").unwrap();
        assert_eq!(
            t.placeholders(),
            vec!["gewinner_partei", "name", "gewinner_prozent"]
        );
    }

    #[test]
    fn merge_replaces_in_place_and_appends() {
        let mut base = TemplateCatalog::parse_ron(
            r#"{ "a": Template(text: "alt"), "b": Template(text: "b") }"#,
        )
        .unwrap();
        let other = TemplateCatalog::parse_ron(
            r#"{ "a": Template(text: "neu"), "c": Template(text: "c") }"#,
        )
        .unwrap();
        base.merge(other);
        assert_eq!(base.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(
            base.get("a").unwrap().text,
            TemplateText::Single(Pattern::parse("neu").unwrap())
        );
    }
}
