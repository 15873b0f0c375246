use std::path::Path;

use anyhow::Result;

use mindee::geometry::Polygon;
use mindee::ImageExtractor;

use super::{ensure_dir, load_source, read_json, remote_client};

pub async fn cmd_crop(file: &Path, page: usize, polygons: Option<&Path>, output: &Path) -> Result<()> {
    let source = load_source(file)?;

    let images = match polygons {
        Some(path) => {
            let polygons: Vec<Polygon> = read_json(path)?;
            if polygons.is_empty() {
                anyhow::bail!("{} contains no polygons", path.display());
            }
            ImageExtractor::new(&source)?.extract_regions(page, &polygons)?
        }
        None => remote_client()?.extract_receipts(&source).await?,
    };

    ensure_dir(output)?;
    for image in &images {
        let path = image.save_to_dir(output)?;
        let (width, height) = image.dimensions();
        println!("{}\t{width}x{height}", path.display());
    }
    eprintln!("{} image(s) written", images.len());

    Ok(())
}
