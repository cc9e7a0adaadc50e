//! Generator for the fingerprint golden fixture.
//!
//! Canonicalizes a fixed intent document and prints the resulting
//! fingerprint so a reviewer can lock it into a golden file.
//!
//! Usage: `fingerprint_golden_generator <output_file>`
//!
//! The output file is overwritten if it already exists.

use forge_kernel::fingerprint;
use forge_kernel::intent;

fn sample_intent() -> serde_json::Value {
    serde_json::json!({
        "model_version": "1.0",
        "entries": [
            {"kind": "value_object", "name": "OrderId", "fields": []},
            {
                "kind": "entity",
                "name": "Order",
                "fields": [
                    {"name": "id", "type": "id"},
                    {"name": "total_cents", "type": "int"}
                ]
            }
        ]
    })
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        eprintln!("usage: fingerprint_golden_generator <output_file>");
        std::process::exit(1);
    }
    let output_path = std::path::Path::new(&args[1]);

    let (canon_intent, model) = intent::canonicalize(&sample_intent()).expect("intent canonicalization failed");
    let fp = fingerprint::compute(&canon_intent, b"{}", b"{}", "forge-harness@0.0.1");

    let contents = format!(
        "fingerprint={}\nentry_count={}\ncanon_intent_bytes={}\n",
        fp,
        model.entries.len(),
        canon_intent.len()
    );
    std::fs::write(output_path, &contents).expect("failed to write golden fixture");

    println!("{contents}");
    println!("golden written to: {}", output_path.display());
}
