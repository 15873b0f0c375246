use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;

use mindee::{reconstruct_table, PositionedField};

use super::read_json;

pub fn cmd_table(file: &Path, anchors: &[String], columns: &[String], tolerance: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&tolerance) {
        anyhow::bail!("tolerance must be between 0 and 1, got {tolerance}");
    }
    let fields: HashMap<String, Vec<PositionedField>> = read_json(file)?;
    let anchors: Vec<&str> = anchors.iter().map(String::as_str).collect();
    let columns: Vec<&str> = columns.iter().map(String::as_str).collect();

    let lines = reconstruct_table(&anchors, &columns, &fields, tolerance)?;
    if lines.is_empty() {
        eprintln!("No anchor column has values, no rows");
        return Ok(());
    }

    for line in &lines {
        let cells: Vec<String> = line
            .iter()
            .map(|(column, value)| format!("{column}={}", value.content))
            .collect();
        println!("{}\t{}", line.row_number, cells.join("\t"));
    }
    Ok(())
}
