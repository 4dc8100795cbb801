use popflow_merge::{
    annotate, merge, ContentMapping, CouponDisplayItem, CouponSelection, DesignDocument,
    FieldDefinition, MergeError,
};
use std::env;
use std::fs;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "annotate" if args.len() == 4 => run_annotate(&args[2], &args[3]),
        "merge" if args.len() == 4 || args.len() == 5 => {
            run_merge(&args[2], &args[3], args.get(4).map(String::as_str))
        }
        _ => {
            usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("✗ {}", e);
        process::exit(1);
    }
}

fn usage() {
    eprintln!("Usage:");
    eprintln!("  merge-preview annotate <design.json> <fields.json>");
    eprintln!("  merge-preview merge <template.html> <mapping.json> [coupons.json]");
    eprintln!();
    eprintln!("annotate prints the annotated design JSON to stdout;");
    eprintln!("merge prints the merged HTML to stdout. Warnings go to stderr.");
}

fn read_file(path: &str) -> Result<String, MergeError> {
    fs::read_to_string(path)
        .map_err(|e| MergeError::Invalid(format!("failed to read '{}': {}", path, e)))
}

fn run_annotate(design_path: &str, fields_path: &str) -> Result<(), MergeError> {
    let design = DesignDocument::from_json(&read_file(design_path)?)?;
    let fields: Vec<FieldDefinition> = serde_json::from_str(&read_file(fields_path)?)
        .map_err(|e| MergeError::FieldsParse(e.to_string()))?;

    let annotated = annotate(&design, &fields);
    for diagnostic in &annotated.diagnostics {
        eprintln!("warning: {}", diagnostic);
    }
    println!("{}", annotated.design.to_json()?);
    eprintln!("✓ {} annotated", design_path);
    Ok(())
}

fn run_merge(
    template_path: &str,
    mapping_path: &str,
    coupons_path: Option<&str>,
) -> Result<(), MergeError> {
    let html = read_file(template_path)?;
    let mapping: ContentMapping = serde_json::from_str(&read_file(mapping_path)?)
        .map_err(|e| MergeError::MappingParse(e.to_string()))?;

    let selection = match coupons_path {
        Some(path) => {
            let items: Vec<CouponDisplayItem> = serde_json::from_str(&read_file(path)?)
                .map_err(|e| MergeError::CouponsParse(e.to_string()))?;
            CouponSelection {
                items,
                changed: true,
            }
        }
        None => CouponSelection::default(),
    };

    let merged = merge(&html, &mapping, &selection);
    for diagnostic in &merged.diagnostics {
        eprintln!("warning: {}", diagnostic);
    }
    println!("{}", merged.html);
    eprintln!("✓ {} merged", template_path);
    Ok(())
}
