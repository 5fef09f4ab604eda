//! Beispielstadt example: one municipality through the whole pipeline.
//!
//! Raw result → variables → Titel and Absatz1, first with the shipped
//! layout, then step by step for a single topic, then for a tie and a
//! Greens win.
//!
//! Run with: cargo run --example beispielstadt

use rand::rngs::StdRng;
use rand::SeedableRng;
use wahltext_engine::schema::election::ElectionRecord;
use wahltext_engine::{Criterion, Variables, WahltextEngine};

const RESULT: &str = r#"{
    "wahl": {
        "gks_name": "Beispielstadt, Stadt",
        "ergebnis": {
            "kandidaten": [
                {"kandidatur_id": 1, "pos": 1, "prozent": 31.4},
                {"kandidatur_id": 2, "pos": 1, "prozent": 27.9},
                {"kandidatur_id": 3, "pos": 1, "prozent": 14.2},
                {"kandidatur_id": 4, "pos": 1, "prozent": 11.0},
                {"kandidatur_id": 5, "pos": 1, "prozent": 8.5},
                {"kandidatur_id": 6, "pos": 1, "prozent": 7.0}
            ]
        },
        "kandidaten": [
            {"kandidatur_id": 1, "pos": 1, "partei": "CDU"},
            {"kandidatur_id": 2, "pos": 1, "partei": "SPD"},
            {"kandidatur_id": 3, "pos": 1, "partei": "Grüne"},
            {"kandidatur_id": 4, "pos": 1, "partei": "BSW"},
            {"kandidatur_id": 5, "pos": 1, "partei": "FW-PB"},
            {"kandidatur_id": 6, "pos": 1, "partei": "Linke"}
        ]
    }
}"#;

fn main() {
    let engine = WahltextEngine::builder()
        .data_set("kommunalwahl")
        .seed(2026)
        .build()
        .expect("Failed to build engine");

    // --- Whole article from a raw result ---
    let record = ElectionRecord::from_json(RESULT).expect("Failed to parse result");
    let article = engine
        .compose_election(&record)
        .expect("Failed to compose article");
    println!("=== Beispielstadt ===\n");
    for (section, text) in article.iter() {
        println!("[{}]\n{}\n", section, text);
    }

    // --- Step by step for the headline ---
    let vars = engine.variables_for(&record).expect("Failed to extract variables");
    let selected = engine.select(&Criterion::topic("ergebnis"), &vars);
    let mut rng = StdRng::seed_from_u64(7);
    let raw = engine
        .generate(&selected, &vars, &mut rng)
        .expect("Failed to render headline");
    for sentence in &raw {
        println!("{:<24} {}", sentence.key, sentence.text);
    }
    for sentence in engine.correct(raw) {
        println!("{:<24} {}", sentence.key, sentence.text);
    }
    println!();

    // --- Hand-built variables: a tie and a Greens win ---
    let tie = Variables::new()
        .with("name", "Musterdorf")
        .with("num_parties", 2i64)
        .with("gewinner_partei", "SPD")
        .with("gewinner_prozent", 40.0)
        .with("gewinner_pronomen", "Sie")
        .with("zweite_partei", "CDU")
        .with("zweite_prozent", 40.0);
    print_article(&engine, "Musterdorf", &tie);

    let greens = Variables::new()
        .with("name", "Grünhausen")
        .with("num_parties", 2i64)
        .with("gewinner_partei", "Grüne")
        .with("gewinner_prozent", 55.5)
        .with("gewinner_pronomen", "Sie")
        .with("zweite_partei", "Volt")
        .with("zweite_prozent", 44.5);
    print_article(&engine, "Grünhausen", &greens);
}

fn print_article(engine: &WahltextEngine, title: &str, vars: &Variables) {
    let article = engine.compose(vars).expect("Failed to compose article");
    println!("=== {} ===\n", title);
    println!("{}\n", article);
}
