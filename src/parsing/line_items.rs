//! Table row reconstruction from per-column positioned values.
//!
//! Extraction returns each table column as an independent list of values
//! with polygons. Rows are rebuilt around an anchor column:
//!
//! 1. Pick the anchor: the first candidate with the most values.
//! 2. Band the page: anchor values whose tops are within `tolerance` of the
//!    current row's top extend that row, anything further starts a new one.
//!    The anchor values of a band make up that row's anchor cell.
//! 3. Drop every other column value into the row whose top and bottom both
//!    match its own within `tolerance`. Several values landing in the same cell
//!    are merged (text joined, boxes unioned, confidences multiplied).

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use super::{Field, PositionedField};
use crate::error::Result;
use crate::geometry::{merge_polygons, BoundingBox};

/// Default vertical tolerance, in relative page height.
pub const DEFAULT_HEIGHT_TOLERANCE: f64 = 0.01;

/// One reconstructed table row.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// 1-based, top to bottom.
    pub row_number: usize,
    pub bbox: BoundingBox,
    /// Columns without a value in this row are absent.
    pub fields: BTreeMap<String, PositionedField>,
}

impl Line {
    pub fn field(&self, column: &str) -> Option<&PositionedField> {
        self.fields.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PositionedField)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Fold `value` into the cell of `column`.
    fn absorb(&mut self, column: &str, value: &PositionedField) -> Result<()> {
        match self.fields.get_mut(column) {
            None => {
                self.fields.insert(column.to_string(), value.clone());
            }
            Some(cell) => {
                if cell.content.is_empty() {
                    cell.content.clone_from(&value.content);
                } else if !value.content.is_empty() {
                    cell.content.push(' ');
                    cell.content.push_str(&value.content);
                }
                cell.polygon = merge_polygons(&[cell.polygon.clone(), value.polygon.clone()])?;
                // Probability that every contributing detection is right.
                cell.confidence *= value.confidence;
            }
        }
        Ok(())
    }
}

/// Values that can be placed on the page.
///
/// The API reports undetected values with an empty polygon.
fn located<'a>(column: &'a str, values: &'a [PositionedField]) -> impl Iterator<Item = &'a PositionedField> {
    values.iter().filter(move |v| {
        if v.polygon.is_empty() {
            debug!(column, content = %v.content, "Skipping value without a polygon");
            return false;
        }
        true
    })
}

/// First candidate holding the largest non-zero number of located values.
fn find_best_anchor<'a>(
    candidates: &[&'a str],
    fields: &HashMap<String, Vec<PositionedField>>,
) -> Option<&'a str> {
    let mut best: Option<(&str, usize)> = None;
    for &name in candidates {
        let count = fields
            .get(name)
            .map_or(0, |values| values.iter().filter(|v| !v.polygon.is_empty()).count());
        if count > 0 && best.map_or(true, |(_, n)| count > n) {
            best = Some((name, count));
        }
    }
    best.map(|(name, _)| name)
}

/// A row band and the anchor values folded into it, top to bottom.
struct Band<'a> {
    bbox: BoundingBox,
    values: Vec<&'a PositionedField>,
}

/// Vertical bands, one per row, from the anchor column.
fn row_bands<'a>(anchor: &'a str, anchor_values: &'a [PositionedField], tolerance: f64) -> Result<Vec<Band<'a>>> {
    let mut boxed = located(anchor, anchor_values)
        .map(|v| -> Result<_> { Ok((v.polygon.bbox()?, v)) })
        .collect::<Result<Vec<_>>>()?;
    boxed.sort_by(|a, b| a.0.y_min.total_cmp(&b.0.y_min));

    let mut bands: Vec<Band<'_>> = Vec::new();
    for (b, value) in boxed {
        match bands.last_mut() {
            Some(current) if (b.y_min - current.bbox.y_min).abs() <= tolerance => {
                current.bbox = current.bbox.union(&b);
                current.values.push(value);
            }
            _ => bands.push(Band {
                bbox: b,
                values: vec![value],
            }),
        }
    }
    Ok(bands)
}

/// Rebuild table rows from per-column values.
///
/// Returns no rows (and logs a warning) when none of `anchor_candidates`
/// has a located value. Values without a polygon are skipped.
pub fn reconstruct_table(
    anchor_candidates: &[&str],
    columns: &[&str],
    fields: &HashMap<String, Vec<PositionedField>>,
    height_tolerance: f64,
) -> Result<Vec<Line>> {
    let Some(anchor) = find_best_anchor(anchor_candidates, fields) else {
        warn!(candidates = ?anchor_candidates, "No anchor column has any value, no rows built");
        return Ok(Vec::new());
    };

    let bands = row_bands(anchor, &fields[anchor], height_tolerance)?;
    debug!(anchor, rows = bands.len(), "Anchor column selected");

    let mut lines = Vec::with_capacity(bands.len());
    for (i, band) in bands.into_iter().enumerate() {
        let mut line = Line {
            row_number: i + 1,
            bbox: band.bbox,
            fields: BTreeMap::new(),
        };
        for value in band.values {
            line.absorb(anchor, value)?;
        }
        lines.push(line);
    }

    let mut seen: Vec<&str> = Vec::with_capacity(columns.len() + 1);
    seen.push(anchor);
    for &column in columns {
        if seen.contains(&column) {
            continue;
        }
        seen.push(column);

        let Some(values) = fields.get(column) else {
            continue;
        };
        for value in located(column, values) {
            let y = value.polygon.min_max_y()?;
            let closest = lines
                .iter_mut()
                .filter_map(|line| {
                    let top = (y.min - line.bbox.y_min).abs();
                    let bottom = (y.max - line.bbox.y_max).abs();
                    (top <= height_tolerance && bottom <= height_tolerance)
                        .then_some((top + bottom, line))
                })
                .min_by(|a, b| a.0.total_cmp(&b.0));

            if let Some((_, line)) = closest {
                line.absorb(column, value)?;
            }
        }
    }

    Ok(lines)
}

/// [`reconstruct_table`] over the fields of a generated document.
///
/// Only fields carrying values (simple or list) take part.
pub fn reconstruct_table_from_fields(
    anchor_candidates: &[&str],
    columns: &[&str],
    fields: &BTreeMap<String, Field>,
    height_tolerance: f64,
) -> Result<Vec<Line>> {
    let by_column: HashMap<String, Vec<PositionedField>> = fields
        .iter()
        .map(|(name, field)| (name.clone(), field.values().to_vec()))
        .collect();
    reconstruct_table(anchor_candidates, columns, &by_column, height_tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Polygon};

    fn value(content: &str, confidence: f64, x0: f64, y0: f64, x1: f64, y1: f64) -> PositionedField {
        PositionedField::new(
            content,
            confidence,
            Polygon::new(vec![
                Point::new(x0, y0),
                Point::new(x1, y0),
                Point::new(x1, y1),
                Point::new(x0, y1),
            ]),
        )
    }

    fn columns(entries: Vec<(&str, Vec<PositionedField>)>) -> HashMap<String, Vec<PositionedField>> {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn one_row_per_spaced_anchor_value() {
        let fields = columns(vec![(
            "description",
            (0..5)
                .map(|i| {
                    let y = 0.2 + f64::from(i) * 0.05;
                    value(&format!("item {i}"), 0.9, 0.1, y, 0.4, y + 0.02)
                })
                .rev()
                .collect(),
        )]);
        let lines = reconstruct_table(&["description"], &[], &fields, DEFAULT_HEIGHT_TOLERANCE).unwrap();
        assert_eq!(lines.len(), 5);
        // Rows come out top to bottom whatever the input order.
        assert_eq!(lines[0].field("description").unwrap().content, "item 0");
        assert_eq!(lines[4].row_number, 5);
    }

    #[test]
    fn anchor_is_first_candidate_with_most_values() {
        let fields = columns(vec![
            ("code", vec![value("A1", 0.9, 0.0, 0.2, 0.1, 0.22)]),
            (
                "description",
                vec![
                    value("Bolt", 0.9, 0.1, 0.2, 0.4, 0.22),
                    value("Nut", 0.9, 0.1, 0.3, 0.4, 0.32),
                ],
            ),
            (
                "amount",
                vec![
                    value("1.00", 0.9, 0.7, 0.2, 0.8, 0.22),
                    value("2.00", 0.9, 0.7, 0.3, 0.8, 0.32),
                ],
            ),
        ]);
        let anchor = find_best_anchor(&["code", "description", "amount"], &fields);
        assert_eq!(anchor, Some("description"));
        assert_eq!(find_best_anchor(&["missing"], &fields), None);
    }

    #[test]
    fn no_anchor_is_soft_empty_result() {
        let fields = columns(vec![("amount", vec![value("1", 0.9, 0.7, 0.2, 0.8, 0.22)])]);
        let lines = reconstruct_table(&["description"], &["amount"], &fields, 0.01).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn columns_join_rows_and_absent_cells_stay_absent() {
        let fields = columns(vec![
            (
                "description",
                vec![
                    value("Bolt", 0.9, 0.1, 0.200, 0.4, 0.220),
                    value("Nut", 0.9, 0.1, 0.300, 0.4, 0.320),
                ],
            ),
            ("amount", vec![value("2.00", 0.8, 0.7, 0.302, 0.8, 0.318)]),
        ]);
        let lines = reconstruct_table(&["description"], &["amount"], &fields, 0.01).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].field("amount").is_none());
        assert_eq!(lines[1].field("amount").unwrap().content, "2.00");
        assert_eq!(lines[1].field("description").unwrap().content, "Nut");
    }

    #[test]
    fn same_cell_values_are_merged() {
        let fields = columns(vec![
            ("description", vec![value("Hex bolt", 0.9, 0.1, 0.2, 0.4, 0.22)]),
            (
                "unit",
                vec![
                    value("per", 0.5, 0.5, 0.2, 0.55, 0.22),
                    value("box", 0.8, 0.56, 0.201, 0.6, 0.219),
                ],
            ),
        ]);
        let lines = reconstruct_table(&["description"], &["unit"], &fields, 0.01).unwrap();
        let unit = lines[0].field("unit").unwrap();
        assert_eq!(unit.content, "per box");
        assert!((unit.confidence - 0.4).abs() < 1e-9);
        let b = unit.polygon.bbox().unwrap();
        assert!((b.x_min - 0.5).abs() < 1e-9 && (b.x_max - 0.6).abs() < 1e-9);
    }

    #[test]
    fn close_anchor_values_extend_one_band() {
        let fields = columns(vec![(
            "description",
            vec![
                value("Hex", 0.9, 0.1, 0.200, 0.2, 0.220),
                value("bolt", 0.9, 0.21, 0.205, 0.3, 0.225),
            ],
        )]);
        let lines = reconstruct_table(&["description"], &[], &fields, 0.01).unwrap();
        assert_eq!(lines.len(), 1);
        assert!((lines[0].bbox.y_max - 0.225).abs() < 1e-9);
    }

    #[test]
    fn anchor_values_of_a_band_share_its_cell() {
        // Bottoms differ by more than the tolerance: both still belong to the row.
        let fields = columns(vec![(
            "description",
            vec![
                value("Hex", 0.9, 0.1, 0.200, 0.2, 0.220),
                value("bolt", 0.5, 0.21, 0.205, 0.3, 0.240),
            ],
        )]);
        let lines = reconstruct_table(&["description"], &["description"], &fields, 0.01).unwrap();
        assert_eq!(lines.len(), 1);
        let cell = lines[0].field("description").unwrap();
        assert_eq!(cell.content, "Hex bolt");
        assert!((cell.confidence - 0.45).abs() < 1e-9);
        let b = cell.polygon.bbox().unwrap();
        assert!((b.y_min - 0.200).abs() < 1e-9 && (b.y_max - 0.240).abs() < 1e-9);
    }

    #[test]
    fn values_without_polygon_are_skipped() {
        let unlocated = PositionedField::new("?", 0.0, Polygon::default());
        let fields = columns(vec![
            (
                "code",
                vec![unlocated.clone(), unlocated.clone(), unlocated.clone()],
            ),
            (
                "description",
                vec![
                    value("Bolt", 0.9, 0.1, 0.2, 0.4, 0.22),
                    unlocated.clone(),
                    value("Nut", 0.9, 0.1, 0.3, 0.4, 0.32),
                ],
            ),
            ("amount", vec![unlocated, value("2.00", 0.8, 0.7, 0.3, 0.8, 0.32)]),
        ]);
        // `code` has the most values but none on the page.
        let lines = reconstruct_table(&["code", "description"], &["amount"], &fields, 0.01).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].field("description").unwrap().content, "Bolt");
        assert_eq!(lines[1].field("amount").unwrap().content, "2.00");
        assert!(lines.iter().all(|l| l.field("code").is_none()));
    }

    #[test]
    fn generated_fields_feed_the_reconstructor() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "description".to_string(),
            Field::List {
                values: vec![
                    value("Bolt", 0.9, 0.1, 0.2, 0.4, 0.22),
                    value("Nut", 0.9, 0.1, 0.3, 0.4, 0.32),
                ],
            },
        );
        fields.insert(
            "supplier".to_string(),
            Field::Simple(value("ACME", 0.9, 0.1, 0.05, 0.3, 0.07)),
        );
        let lines = reconstruct_table_from_fields(&["description"], &["supplier"], &fields, 0.01).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.field("supplier").is_none()));
    }
}
