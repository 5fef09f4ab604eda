//! Text generation: fills selected templates with variable values.

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::core::catalog::{Pattern, Segment, Template, TemplateText};
use crate::schema::variables::Variables;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("template '{template}' references missing variable '{placeholder}'")]
    MissingVariable {
        template: String,
        placeholder: String,
    },
    #[error("template '{template}' has no text variants")]
    NoVariants { template: String },
}

/// One rendered sentence, tagged with the template it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub key: String,
    pub text: String,
}

impl Sentence {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
        }
    }
}

/// Render every selected template in order.
///
/// Variant templates draw one variant from `rng`; fixed templates never
/// touch it. A missing or null placeholder value aborts with
/// [`RenderError::MissingVariable`].
pub fn render<R: Rng + ?Sized>(
    selected: &[&Template],
    vars: &Variables,
    rng: &mut R,
) -> Result<Vec<Sentence>, RenderError> {
    selected
        .iter()
        .map(|template| render_template(template, vars, &mut *rng))
        .collect()
}

pub fn render_template<R: Rng + ?Sized>(
    template: &Template,
    vars: &Variables,
    rng: &mut R,
) -> Result<Sentence, RenderError> {
    let pattern = match &template.text {
        TemplateText::Single(pattern) => pattern,
        TemplateText::Variants(variants) => {
            variants
                .choose(rng)
                .ok_or_else(|| RenderError::NoVariants {
                    template: template.key.clone(),
                })?
        }
    };
    let text = fill(pattern, vars).map_err(|placeholder| RenderError::MissingVariable {
        template: template.key.clone(),
        placeholder,
    })?;
    Ok(Sentence {
        key: template.key.clone(),
        text,
    })
}

/// Substitute variables into a pattern; on failure returns the name of the
/// first unresolved placeholder.
fn fill(pattern: &Pattern, vars: &Variables) -> Result<String, String> {
    let mut out = String::new();
    for segment in &pattern.segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Placeholder(name) => match vars.get(name) {
                Some(value) if !value.is_null() => out.push_str(&value.to_string()),
                _ => return Err(name.clone()),
            },
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{RawText, TemplateDef};
    use crate::schema::value::Value;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn template(key: &str, text: RawText) -> Template {
        TemplateDef {
            topic: None,
            conditions: vec![],
            text,
        }
        .compile(key)
        .unwrap()
    }

    fn vars() -> Variables {
        Variables::new()
            .with("gewinner_partei", "SPD")
            .with("gewinner_prozent", 52.0)
            .with("name", "Beispielstadt")
            .with("dritte_partei", Value::Null)
    }

    #[test]
    fn substitutes_placeholders_verbatim() {
        let t = template(
            "absatz1_gewinner",
            RawText::Single("Für {gewinner_partei} stimmten {gewinner_prozent} Prozent.".to_string()),
        );
        let mut rng = StdRng::seed_from_u64(1);
        let sentences = render(&[&t], &vars(), &mut rng).unwrap();
        assert_eq!(
            sentences,
            vec![Sentence::new(
                "absatz1_gewinner",
                "Für SPD stimmten 52.0 Prozent."
            )]
        );
    }

    #[test]
    fn missing_variable_names_template_and_placeholder() {
        let t = template(
            "absatz1_weitere_3",
            RawText::Single("Auf dem dritten Platz folgt {dritte_prozent}.".to_string()),
        );
        let mut rng = StdRng::seed_from_u64(1);
        let err = render(&[&t], &vars(), &mut rng).unwrap_err();
        assert_eq!(
            err,
            RenderError::MissingVariable {
                template: "absatz1_weitere_3".to_string(),
                placeholder: "dritte_prozent".to_string(),
            }
        );
    }

    #[test]
    fn null_value_counts_as_missing() {
        let t = template("x", RawText::Single("{dritte_partei}".to_string()));
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            render_template(&t, &vars(), &mut rng),
            Err(RenderError::MissingVariable { ref placeholder, .. }) if placeholder == "dritte_partei"
        ));
    }

    #[test]
    fn variants_are_reproducible_with_same_seed() {
        let t = template(
            "titel",
            RawText::Variants(vec![
                "A {name}".to_string(),
                "B {name}".to_string(),
                "C {name}".to_string(),
            ]),
        );
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..10)
                .map(|_| render_template(&t, &vars(), &mut rng).unwrap().text)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn every_variant_is_reachable() {
        let t = template(
            "titel",
            RawText::Variants(vec!["A".to_string(), "B".to_string()]),
        );
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(render_template(&t, &vars(), &mut rng).unwrap().text);
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn order_is_preserved() {
        let a = template("a", RawText::Single("eins".to_string()));
        let b = template("b", RawText::Single("zwei".to_string()));
        let c = template("c", RawText::Single("drei".to_string()));
        let mut rng = StdRng::seed_from_u64(0);
        let keys: Vec<String> = render(&[&c, &a, &b], &vars(), &mut rng)
            .unwrap()
            .into_iter()
            .map(|s| s.key)
            .collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }
}
