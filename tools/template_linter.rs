//! Template Linter: validates a data set directory.
//!
//! Usage: template_linter <data_dir>
//!
//! Errors: repeated template keys, unparsable or unsafe conditions, malformed
//! template text, invalid correction patterns, unreadable files.
//! Warnings: placeholders or condition names the extraction never produces,
//! `applies_to` keys missing from the catalog, templates no layout section
//! selects.

use clap::Parser;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

use wahltext_engine::core::article::ArticleLayout;
use wahltext_engine::core::catalog::{parse_definitions, Pattern, RawText, TemplateDef};
use wahltext_engine::core::correction::CorrectionSet;
use wahltext_engine::core::expr::Condition;
use wahltext_engine::core::party::PartyGrammar;
use wahltext_engine::core::selector::Criterion;
use wahltext_engine::schema::election::known_variables;

#[derive(Parser)]
#[command(name = "template_linter")]
#[command(about = "Check a wahltext data set for errors")]
struct Cli {
    /// Data set directory
    data_dir: PathBuf,
}

#[derive(Default)]
struct Report {
    errors: Vec<String>,
    warnings: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    if !cli.data_dir.is_dir() {
        eprintln!("ERROR: Path '{}' is not a directory", cli.data_dir.display());
        process::exit(1);
    }

    let report = lint_dir(&cli.data_dir);

    println!("\n=== Template Lint Report ===\n");

    if report.errors.is_empty() && report.warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &report.warnings {
        println!("WARNING: {}", warning);
    }

    for error in &report.errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        report.errors.len(),
        report.warnings.len()
    );

    if !report.errors.is_empty() {
        process::exit(1);
    }
}

fn lint_dir(dir: &Path) -> Report {
    let mut report = Report::default();
    let known: HashSet<String> = known_variables().into_iter().collect();

    // Templates are parsed leniently so every problem is reported
    let mut defs = Vec::new();
    let templates_path = dir.join("templates.ron");
    match std::fs::read_to_string(&templates_path) {
        Ok(contents) => match parse_definitions(&contents) {
            Ok(parsed) => {
                println!("  Loaded: {} ({} templates)", templates_path.display(), parsed.len());
                defs = parsed;
            }
            Err(e) => report.errors.push(format!("{}: {}", templates_path.display(), e)),
        },
        Err(e) => report.errors.push(format!("{}: {}", templates_path.display(), e)),
    }
    let mut keys: HashSet<&str> = HashSet::new();
    for (key, def) in &defs {
        if !keys.insert(key.as_str()) {
            report.errors.push(format!("Template '{}' is defined more than once", key));
        }
        lint_template(key, def, &known, &mut report);
    }

    let corrections_path = dir.join("corrections.ron");
    if corrections_path.exists() {
        match CorrectionSet::load_from_ron(&corrections_path) {
            Ok(rules) => {
                println!("  Loaded: {} ({} rules)", corrections_path.display(), rules.len());
                lint_scopes(&rules, &keys, &mut report);
            }
            Err(e) => report.errors.push(format!("{}: {}", corrections_path.display(), e)),
        }
    }

    let parties_path = dir.join("parties.ron");
    if parties_path.exists() {
        match PartyGrammar::load_from_ron(&parties_path) {
            Ok(grammar) => {
                println!("  Loaded: {}", parties_path.display());
                for party in grammar.parties() {
                    if grammar.pronoun(party).is_none() {
                        report.warnings.push(format!(
                            "Party '{}' has no pronoun, '{}' will be used",
                            party, grammar.default_pronoun
                        ));
                    }
                }
                match grammar.corrections() {
                    Ok(rules) => lint_scopes(&rules, &keys, &mut report),
                    Err(e) => report.errors.push(format!("{}: {}", parties_path.display(), e)),
                }
            }
            Err(e) => report.errors.push(format!("{}: {}", parties_path.display(), e)),
        }
    }

    let layout_path = dir.join("layout.ron");
    if layout_path.exists() {
        match ArticleLayout::load_from_ron(&layout_path) {
            Ok(layout) => {
                println!("  Loaded: {} ({} sections)", layout_path.display(), layout.len());
                for (key, def) in &defs {
                    let reachable = layout
                        .iter()
                        .flat_map(|section| &section.select)
                        .any(|criterion| selects(criterion, key, def));
                    if !reachable {
                        report
                            .warnings
                            .push(format!("Template '{}' is not selected by any layout section", key));
                    }
                }
            }
            Err(e) => report.errors.push(format!("{}: {}", layout_path.display(), e)),
        }
    }

    report
}

fn lint_template(key: &str, def: &TemplateDef, known: &HashSet<String>, report: &mut Report) {
    let raws: Vec<&String> = match &def.text {
        RawText::Single(raw) => vec![raw],
        RawText::Variants(raws) => raws.iter().collect(),
    };
    if raws.is_empty() {
        report.errors.push(format!("Template '{}' has an empty variant list", key));
    }

    let mut unknown = BTreeSet::new();
    for raw in raws {
        match Pattern::parse(raw) {
            Ok(pattern) => unknown.extend(
                pattern
                    .placeholders()
                    .filter(|n| !known.contains(*n))
                    .map(str::to_string),
            ),
            Err(message) => report.errors.push(format!("Template '{}': {}", key, message)),
        }
    }
    for name in unknown {
        report.warnings.push(format!(
            "Template '{}' uses placeholder '{}', which extraction never sets",
            key, name
        ));
    }

    for source in &def.conditions {
        match Condition::parse(source) {
            Ok(condition) => {
                for name in condition.expr().names() {
                    if !known.contains(name) {
                        report.warnings.push(format!(
                            "Template '{}' condition `{}` reads '{}', which extraction never sets",
                            key, source, name
                        ));
                    }
                }
            }
            Err(e) => {
                report.errors.push(format!("Template '{}' condition `{}`: {}", key, source, e));
            }
        }
    }
}

fn lint_scopes(rules: &CorrectionSet, keys: &HashSet<&str>, report: &mut Report) {
    for rule in rules.iter() {
        for key in rule.scope() {
            if !keys.contains(key.as_str()) {
                report.warnings.push(format!(
                    "Correction `{}` applies to unknown template '{}'",
                    rule.pattern(),
                    key
                ));
            }
        }
    }
}

fn selects(criterion: &Criterion, key: &str, def: &TemplateDef) -> bool {
    match criterion {
        Criterion::All => true,
        Criterion::Topic(label) => def.topic.as_deref() == Some(label.as_str()),
        Criterion::Keys(keys) => keys.iter().any(|k| k == key),
    }
}
