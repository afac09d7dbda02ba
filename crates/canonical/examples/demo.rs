use canonical::{canonicalize, CanonicalizationResult, CanonicalizeConfig};
use std::fs;

fn main() {
    let file_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "crates/canonical/examples/sample_10k.htm".to_string());
    let content = fs::read_to_string(&file_path).expect("file path invalid");

    let result: CanonicalizationResult =
        canonicalize("demo-doc", &content, &CanonicalizeConfig::default())
            .expect("canonicalization succeeds");
    println!("canonical:\n{}", result.text);
    println!();
    for table in &result.tables {
        println!(
            "table {} ({}): {} cells",
            table.table_index,
            table.kind.as_str(),
            table.cells.len()
        );
    }
    println!("sha256: {}", result.sha256_hex);
}
