//! OpenAPI Specification Generator Binary
//!
//! Prints the Strata OpenAPI document as JSON to stdout.
//!
//! Usage:
//!   cargo run -p strata-api --bin generate-openapi > openapi.json

use strata_api::ApiDoc;

fn main() {
    match ApiDoc::to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI document: {}", e);
            std::process::exit(1);
        }
    }
}
