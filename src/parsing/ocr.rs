//! Reading-order reconstruction of OCR words.
//!
//! The OCR payload lists the words of a page in no particular order. Lines
//! are rebuilt by clustering words whose vertical extents overlap:
//!
//! 1. Sort words by the top of their polygon.
//! 2. Take the first unassigned word as the anchor of a new line.
//! 3. Add every unassigned word whose centroid lies in the anchor's Y
//!    extent, or whose Y extent contains the anchor's centroid.
//! 4. Sort the line left to right and repeat until every word is placed.
//!
//! Complexity: O(n²) per page, fine for the low hundreds of words a page has.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::{point_in_y_range, MinMax, Point, Polygon};

/// A single OCR word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrWord {
    pub text: String,
    #[serde(default)]
    pub confidence: f64,
    pub polygon: Polygon,
}

impl OcrWord {
    pub fn new(text: impl Into<String>, polygon: Polygon) -> Self {
        Self {
            text: text.into(),
            confidence: 1.0,
            polygon,
        }
    }
}

/// Words of one line, left to right.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OcrLine(Vec<OcrWord>);

impl OcrLine {
    pub fn words(&self) -> &[OcrWord] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_words(self) -> Vec<OcrWord> {
        self.0
    }
}

impl fmt::Display for OcrLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, word) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(&word.text)?;
        }
        Ok(())
    }
}

/// OCR result of one page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OcrPage {
    #[serde(default)]
    pub id: usize,
    #[serde(default)]
    pub all_words: Vec<OcrWord>,
}

impl OcrPage {
    pub fn all_lines(&self) -> Result<Vec<OcrLine>> {
        reconstruct_lines(&self.all_words)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MVisionV1 {
    #[serde(default)]
    pub pages: Vec<OcrPage>,
}

/// Document-level OCR block (`document.ocr` in a response).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ocr {
    #[serde(rename = "mvision-v1", default)]
    pub mvision_v1: MVisionV1,
}

impl Ocr {
    /// Full text, one reconstructed line per row, pages separated by a blank line.
    pub fn to_text(&self) -> Result<String> {
        let mut pages = Vec::with_capacity(self.mvision_v1.pages.len());
        for page in &self.mvision_v1.pages {
            let lines = page.all_lines()?;
            pages.push(
                lines
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n"),
            );
        }
        Ok(pages.join("\n\n"))
    }
}

/// A word with its geometry precomputed.
struct Placed<'a> {
    word: &'a OcrWord,
    y: MinMax,
    x_min: f64,
    centroid: Point,
}

impl<'a> Placed<'a> {
    fn new(word: &'a OcrWord) -> Result<Self> {
        let b = word.polygon.bbox()?;
        Ok(Self {
            word,
            y: MinMax {
                min: b.y_min,
                max: b.y_max,
            },
            x_min: b.x_min,
            centroid: word.polygon.centroid()?,
        })
    }

    /// The test is symmetric: the anchor is not guaranteed to be the
    /// geometrically tallest word of its line.
    fn same_line(&self, other: &Placed<'_>) -> bool {
        point_in_y_range(self.centroid, other.y.min, other.y.max)
            || point_in_y_range(other.centroid, self.y.min, self.y.max)
    }
}

/// Cluster unordered words into lines, top to bottom then left to right.
///
/// Fails only when a word has an empty polygon. No words means no lines.
pub fn reconstruct_lines(words: &[OcrWord]) -> Result<Vec<OcrLine>> {
    let mut placed = words.iter().map(Placed::new).collect::<Result<Vec<_>>>()?;
    placed.sort_by(|a, b| a.y.min.total_cmp(&b.y.min));

    let mut assigned = vec![false; placed.len()];
    let mut lines = Vec::new();

    for anchor_idx in 0..placed.len() {
        if assigned[anchor_idx] {
            continue;
        }
        assigned[anchor_idx] = true;
        let anchor = &placed[anchor_idx];
        let mut members = vec![anchor_idx];

        // Every word before the anchor is already assigned.
        for idx in anchor_idx + 1..placed.len() {
            if !assigned[idx] && anchor.same_line(&placed[idx]) {
                assigned[idx] = true;
                members.push(idx);
            }
        }

        members.sort_by(|&a, &b| placed[a].x_min.total_cmp(&placed[b].x_min));
        lines.push(OcrLine(
            members.into_iter().map(|i| placed[i].word.clone()).collect(),
        ));
    }

    Ok(lines)
}
