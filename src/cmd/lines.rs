use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use mindee::parsing::{Ocr, OcrWord};
use mindee::reconstruct_lines;

use super::read_json;

/// A bare word list (one page) or a full OCR block.
#[derive(Deserialize)]
#[serde(untagged)]
enum OcrInput {
    Words(Vec<OcrWord>),
    Document(Ocr),
}

pub fn cmd_lines(file: &Path) -> Result<()> {
    match read_json::<OcrInput>(file)? {
        OcrInput::Words(words) => {
            for line in reconstruct_lines(&words).context("failed to rebuild lines")? {
                println!("{line}");
            }
        }
        OcrInput::Document(ocr) => {
            println!("{}", ocr.to_text().context("failed to rebuild lines")?);
        }
    }
    Ok(())
}
