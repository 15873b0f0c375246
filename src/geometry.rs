//! Geometry over relative page coordinates.
//!
//! All coordinates are relative to the page: `(0, 0)` is the top-left
//! corner and `(1, 1)` the bottom-right one, so Y grows downwards. The
//! functions here are pure and never allocate more than their output.

use serde::{Deserialize, Serialize};

use crate::error::{MindeeError, Result};

/// A point in relative page coordinates.
///
/// Serialized as a `[x, y]` pair, which is how the API sends vertices.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// Inclusive range of a projection on one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

/// Ordered vertices of a (possibly non-convex) region.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon(Vec<Point>);

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.0.iter()
    }

    pub fn bbox(&self) -> Result<BoundingBox> {
        bbox(self)
    }

    pub fn centroid(&self) -> Result<Point> {
        centroid(self)
    }

    pub fn min_max_y(&self) -> Result<MinMax> {
        min_max_y(self)
    }

    pub fn min_max_x(&self) -> Result<MinMax> {
        min_max_x(self)
    }
}

impl From<Vec<Point>> for Polygon {
    fn from(points: Vec<Point>) -> Self {
        Self(points)
    }
}

impl FromIterator<Point> for Polygon {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Polygon {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Axis-aligned bounding box, always regenerable from a [`Polygon`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Smallest box covering both `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }

    /// Corners clockwise from the top-left one.
    pub fn to_polygon(&self) -> Polygon {
        Polygon(vec![
            Point::new(self.x_min, self.y_min),
            Point::new(self.x_max, self.y_min),
            Point::new(self.x_max, self.y_max),
            Point::new(self.x_min, self.y_max),
        ])
    }
}

/// A polygon with exactly four vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadrilateral {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl TryFrom<&Polygon> for Quadrilateral {
    type Error = MindeeError;

    fn try_from(polygon: &Polygon) -> Result<Self> {
        match polygon.points() {
            [top_left, top_right, bottom_right, bottom_left] => Ok(Self {
                top_left: *top_left,
                top_right: *top_right,
                bottom_right: *bottom_right,
                bottom_left: *bottom_left,
            }),
            points => Err(MindeeError::Geometry(format!(
                "a quadrilateral needs 4 vertices, got {}",
                points.len()
            ))),
        }
    }
}

impl From<Quadrilateral> for Polygon {
    fn from(q: Quadrilateral) -> Self {
        Polygon(vec![q.top_left, q.top_right, q.bottom_right, q.bottom_left])
    }
}

fn empty_polygon() -> MindeeError {
    MindeeError::Geometry("cannot compute a bounding box of an empty polygon".into())
}

/// Axis-aligned bounding box of `polygon`.
pub fn bbox(polygon: &Polygon) -> Result<BoundingBox> {
    let first = polygon.points().first().ok_or_else(empty_polygon)?;
    let init = BoundingBox {
        x_min: first.x,
        y_min: first.y,
        x_max: first.x,
        y_max: first.y,
    };
    Ok(polygon.iter().skip(1).fold(init, |b, p| BoundingBox {
        x_min: b.x_min.min(p.x),
        y_min: b.y_min.min(p.y),
        x_max: b.x_max.max(p.x),
        y_max: b.y_max.max(p.y),
    }))
}

/// Arithmetic mean of the vertices.
pub fn centroid(polygon: &Polygon) -> Result<Point> {
    if polygon.is_empty() {
        return Err(empty_polygon());
    }
    let n = polygon.len() as f64;
    let (sx, sy) = polygon
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Ok(Point::new(sx / n, sy / n))
}

pub fn min_max_y(polygon: &Polygon) -> Result<MinMax> {
    let b = bbox(polygon)?;
    Ok(MinMax {
        min: b.y_min,
        max: b.y_max,
    })
}

pub fn min_max_x(polygon: &Polygon) -> Result<MinMax> {
    let b = bbox(polygon)?;
    Ok(MinMax {
        min: b.x_min,
        max: b.x_max,
    })
}

/// Inclusive on both ends.
pub fn point_in_y_range(point: Point, min_y: f64, max_y: f64) -> bool {
    min_y <= point.y && point.y <= max_y
}

/// Inclusive on both ends.
pub fn point_in_x_range(point: Point, min_x: f64, max_x: f64) -> bool {
    min_x <= point.x && point.x <= max_x
}

/// Whether `point` lies within the vertical extent of `polygon`.
///
/// An empty polygon has no extent, so nothing lies within it.
pub fn is_point_in_polygon_y(point: Point, polygon: &Polygon) -> bool {
    min_max_y(polygon).is_ok_and(|r| point_in_y_range(point, r.min, r.max))
}

/// Four-corner bounding quadrilateral of the union of `polygons`.
///
/// Empty polygons in the list are ignored; the call fails only when there
/// is no vertex at all.
pub fn merge_polygons(polygons: &[Polygon]) -> Result<Polygon> {
    let merged = polygons
        .iter()
        .filter(|p| !p.is_empty())
        .map(bbox)
        .try_fold(None::<BoundingBox>, |acc, b| {
            let b = b?;
            Ok::<_, MindeeError>(Some(acc.map_or(b, |a| a.union(&b))))
        })?;

    merged.map(|b| b.to_polygon()).ok_or_else(|| {
        MindeeError::Geometry("cannot merge an empty list of polygons".into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poly(points: &[(f64, f64)]) -> Polygon {
        points.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn bbox_of_non_convex_polygon() {
        let p = poly(&[(0.1, 0.2), (0.5, 0.1), (0.3, 0.3), (0.6, 0.4), (0.2, 0.5)]);
        let b = bbox(&p).unwrap();
        assert_eq!(
            b,
            BoundingBox {
                x_min: 0.1,
                y_min: 0.1,
                x_max: 0.6,
                y_max: 0.5
            }
        );
    }

    #[test]
    fn bbox_of_empty_polygon_fails() {
        let err = bbox(&Polygon::default()).unwrap_err();
        assert!(matches!(err, MindeeError::Geometry(_)));
    }

    #[test]
    fn centroid_is_vertex_mean() {
        let p = poly(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        assert_eq!(centroid(&p).unwrap(), Point::new(0.5, 0.5));
        assert!(centroid(&Polygon::default()).is_err());
    }

    #[test]
    fn y_range_is_inclusive() {
        assert!(point_in_y_range(Point::new(0.0, 0.2), 0.2, 0.4));
        assert!(point_in_y_range(Point::new(0.0, 0.4), 0.2, 0.4));
        assert!(!point_in_y_range(Point::new(0.0, 0.41), 0.2, 0.4));
        assert!(point_in_x_range(Point::new(0.3, 0.0), 0.3, 0.3));
    }

    #[test]
    fn point_in_polygon_y_uses_vertical_extent() {
        let p = poly(&[(0.1, 0.2), (0.3, 0.2), (0.3, 0.3), (0.1, 0.3)]);
        assert!(is_point_in_polygon_y(Point::new(0.9, 0.25), &p));
        assert!(!is_point_in_polygon_y(Point::new(0.2, 0.35), &p));
        assert!(!is_point_in_polygon_y(Point::new(0.2, 0.25), &Polygon::default()));
    }

    #[test]
    fn merge_covers_all_polygons() {
        let a = poly(&[(0.1, 0.1), (0.2, 0.1), (0.2, 0.2), (0.1, 0.2)]);
        let b = poly(&[(0.5, 0.4), (0.7, 0.4), (0.7, 0.6)]);
        let merged = merge_polygons(&[a, b]).unwrap();
        assert_eq!(merged.len(), 4);
        assert_eq!(
            bbox(&merged).unwrap(),
            BoundingBox {
                x_min: 0.1,
                y_min: 0.1,
                x_max: 0.7,
                y_max: 0.6
            }
        );
    }

    #[test]
    fn merge_single_polygon_keeps_bbox() {
        let p = poly(&[(0.15, 0.3), (0.4, 0.25), (0.35, 0.6), (0.2, 0.55), (0.1, 0.4)]);
        let merged = merge_polygons(std::slice::from_ref(&p)).unwrap();
        assert_eq!(bbox(&merged).unwrap(), bbox(&p).unwrap());
    }

    #[test]
    fn merge_empty_list_fails() {
        assert!(merge_polygons(&[]).is_err());
        assert!(merge_polygons(&[Polygon::default()]).is_err());
    }

    #[test]
    fn quadrilateral_requires_four_vertices() {
        let quad = poly(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        let q = Quadrilateral::try_from(&quad).unwrap();
        assert_eq!(q.bottom_right, Point::new(1.0, 1.0));
        assert_eq!(Polygon::from(q), quad);

        let tri = poly(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        let err = Quadrilateral::try_from(&tri).unwrap_err();
        assert!(err.to_string().contains("got 3"));
    }

    #[test]
    fn polygon_deserializes_from_pairs() {
        let p: Polygon = serde_json::from_str("[[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]]").unwrap();
        assert_eq!(p.len(), 3);
        assert_eq!(p.points()[1], Point::new(0.3, 0.4));
        assert_eq!(
            serde_json::to_string(&p).unwrap(),
            "[[0.1,0.2],[0.3,0.4],[0.5,0.6]]"
        );
    }

    #[test]
    fn union_and_dimensions() {
        let a = BoundingBox {
            x_min: 0.1,
            y_min: 0.1,
            x_max: 0.3,
            y_max: 0.2,
        };
        let b = BoundingBox {
            x_min: 0.2,
            y_min: 0.15,
            x_max: 0.5,
            y_max: 0.4,
        };
        let u = a.union(&b);
        assert!((u.width() - 0.4).abs() < 1e-9);
        assert!((u.height() - 0.3).abs() < 1e-9);
        assert!((u.area() - 0.12).abs() < 1e-9);
    }
}
