use std::path::Path;

use anyhow::Result;

use super::load_source;

pub fn cmd_pages(file: &Path) -> Result<()> {
    let source = load_source(file)?;
    println!("kind: {}", source.kind());
    println!("pages: {}", source.page_count()?);
    Ok(())
}
