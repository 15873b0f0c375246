use std::path::Path;

use anyhow::Result;

use mindee::{extract_invoices, PageGroup};

use super::{ensure_dir, load_source, read_json, remote_client};

pub async fn cmd_split(file: &Path, groups: Option<&Path>, strict: bool, output: &Path) -> Result<()> {
    let source = load_source(file)?;

    let documents = match groups {
        Some(path) => {
            let groups: Vec<PageGroup> = read_json(path)?;
            extract_invoices(&source, &groups, strict)?
        }
        None => remote_client()?.split_invoices(&source, strict).await?,
    };

    ensure_dir(output)?;
    for doc in &documents {
        let path = doc.write_to_dir(output)?;
        let (first, last) = doc.source_range();
        println!("{}\tpages {}-{}", path.display(), first + 1, last + 1);
    }
    eprintln!("{} document(s) written", documents.len());

    Ok(())
}
