//! Data loading tests: fixtures and the shipped kommunalwahl data set.

use std::path::Path;

use wahltext_engine::core::article::ArticleLayout;
use wahltext_engine::core::catalog::{CatalogError, TemplateCatalog, TemplateText};
use wahltext_engine::core::correction::CorrectionSet;
use wahltext_engine::core::expr::ExprError;
use wahltext_engine::core::party::PartyGrammar;
use wahltext_engine::schema::election::known_variables;
use wahltext_engine::{Criterion, Variables};

const DATA: &str = "wahl_data/kommunalwahl";

#[test]
fn fixture_catalog_keeps_file_order() {
    let catalog = TemplateCatalog::load_from_ron(Path::new("tests/fixtures/test_templates.ron")).unwrap();
    let keys: Vec<&str> = catalog.keys().collect();
    assert_eq!(
        keys,
        vec!["titel_mehrheit", "titel_vorn", "absatz1_intro", "absatz1_variante"]
    );
    assert_eq!(catalog.topics(), vec!["titel", "absatz1"]);
    assert!(matches!(
        catalog.get("absatz1_variante").unwrap().text,
        TemplateText::Variants(ref v) if v.len() == 2
    ));
}

#[test]
fn shipped_catalog_loads() {
    let catalog = TemplateCatalog::load_from_ron(&Path::new(DATA).join("templates.ron")).unwrap();
    assert_eq!(catalog.len(), 12);
    assert_eq!(catalog.topics(), vec!["ergebnis", "absatz1"]);
    assert_eq!(catalog.keys().next(), Some("titel_gleichauf"));
    assert_eq!(catalog.keys().last(), Some("absatz1_weitere_3"));
}

#[test]
fn shipped_templates_only_use_extracted_variables() {
    let catalog = TemplateCatalog::load_from_ron(&Path::new(DATA).join("templates.ron")).unwrap();
    let known = known_variables();
    for template in catalog.iter() {
        for name in template.placeholders() {
            assert!(known.iter().any(|k| k == name), "{}: {}", template.key, name);
        }
        for condition in &template.conditions {
            for name in condition.expr().names() {
                assert!(known.iter().any(|k| k == name), "{}: {}", template.key, name);
            }
        }
    }
}

#[test]
fn shipped_corrections_and_parties_load() {
    let rules = CorrectionSet::load_from_ron(&Path::new(DATA).join("corrections.ron")).unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules.correct_text("titel_gleichauf", "50.0 und 34.5"), "50 und 34,5");

    let parties = PartyGrammar::load_from_ron(&Path::new(DATA).join("parties.ron")).unwrap();
    assert_eq!(parties.pronoun("Bündnis Deutschland"), Some("Es"));
    assert_eq!(parties.pronoun("Tierschutzpartei"), Some("Sie"));
    // every party the grammar knows has a pronoun
    assert!(parties.parties().all(|p| parties.pronoun(p).is_some()));

    let derived = parties.corrections().unwrap();
    assert_eq!(derived.len(), 14);
    let catalog = TemplateCatalog::load_from_ron(&Path::new(DATA).join("templates.ron")).unwrap();
    for rule in derived.iter() {
        for key in rule.scope() {
            assert!(catalog.contains(key), "unknown scope key {}", key);
        }
    }
}

#[test]
fn shipped_layout_covers_every_template() {
    let layout = ArticleLayout::load_from_ron(&Path::new(DATA).join("layout.ron")).unwrap();
    let names: Vec<&str> = layout.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Titel", "Absatz1"]);

    let catalog = TemplateCatalog::load_from_ron(&Path::new(DATA).join("templates.ron")).unwrap();
    for template in catalog.iter() {
        let covered = layout.iter().flat_map(|s| &s.select).any(|c| match c {
            Criterion::All => true,
            Criterion::Topic(t) => template.topic.as_deref() == Some(t.as_str()),
            Criterion::Keys(keys) => keys.contains(&template.key),
        });
        assert!(covered, "{} not in layout", template.key);
    }
}

#[test]
fn unsafe_condition_rejected_at_load() {
    let result = TemplateCatalog::parse_ron(
        r#"{
            "boese": Template(
                conditions: ["__import__('os').system('rm -rf /')"],
                text: "nie",
            ),
        }"#,
    );
    match result {
        Err(CatalogError::InvalidCondition { template, source, .. }) => {
            assert_eq!(template, "boese");
            assert!(matches!(source, ExprError::UnsafeExpression(_)));
        }
        other => panic!("expected invalid condition, got {:?}", other),
    }
}

#[test]
fn oversized_condition_rejected_at_load() {
    let condition = format!("num_parties{} >= 0", " + 1".repeat(10_000));
    let input = format!(r#"{{"lang": Template(conditions: ["{}"], text: "nie")}}"#, condition);
    match TemplateCatalog::parse_ron(&input) {
        Err(CatalogError::InvalidCondition { template, source, .. }) => {
            assert_eq!(template, "lang");
            assert!(matches!(source, ExprError::Syntax { .. }));
        }
        other => panic!("expected invalid condition, got {:?}", other.map(|c| c.len())),
    }
}

#[test]
fn repeated_key_rejected_at_load() {
    let result = TemplateCatalog::parse_ron(
        r#"{
            "titel_vorn": Template(text: "eins"),
            "absatz1_intro": Template(text: "zwei"),
            "titel_vorn": Template(text: "drei"),
        }"#,
    );
    assert!(matches!(result, Err(CatalogError::DuplicateKey(ref k)) if k == "titel_vorn"));
}

#[test]
fn malformed_text_rejected_at_load() {
    let result = TemplateCatalog::parse_ron(r#"{"kaputt": Template(text: "Für {partei stimmten")}"#);
    assert!(matches!(result, Err(CatalogError::TextParse { ref template, .. }) if template == "kaputt"));
}

#[test]
fn merge_overrides_in_place() {
    let mut catalog = TemplateCatalog::load_from_ron(Path::new("tests/fixtures/test_templates.ron")).unwrap();
    let overrides = TemplateCatalog::parse_ron(
        r#"{
            "titel_vorn": Template(topic: "titel", text: "{gewinner_partei} führt"),
            "absatz1_neu": Template(topic: "absatz1", text: "Neu."),
        }"#,
    )
    .unwrap();
    catalog.merge(overrides);
    let keys: Vec<&str> = catalog.keys().collect();
    assert_eq!(
        keys,
        vec!["titel_mehrheit", "titel_vorn", "absatz1_intro", "absatz1_variante", "absatz1_neu"]
    );
    assert!(catalog.get("titel_vorn").unwrap().conditions.is_empty());

    let selected = wahltext_engine::core::selector::select(
        &catalog,
        &Criterion::topic("titel"),
        &Variables::new().with("gewinner_prozent", 70.0),
    );
    assert_eq!(selected.len(), 2);
}
