use geo::{Euclidean, Haversine, Length, LineInterpolatePoint, LineLocatePoint};
use geo_types::{Coord, LineString, Point};

/// Coordinates closer than this on both axes are the same point.
pub const DEFAULT_COORDINATE_MARGIN: f64 = 1.0e-9;

/// Linear referencing on trail-path polylines. Fractions run from 0.0 at the
/// first coordinate to 1.0 at the last one.
pub trait GeometryService {
    /// Fraction along `line` of the point closest to `coord`.
    fn locate_on_line(&self, line: &LineString<f64>, coord: Coord<f64>) -> f64;

    fn interpolate(&self, line: &LineString<f64>, fraction: f64) -> Coord<f64>;

    /// Coordinates of `line` between two fractions. Runs backwards when
    /// `from > to`.
    fn extract(&self, line: &LineString<f64>, from: f64, to: f64) -> Vec<Coord<f64>>;

    fn same_point(&self, a: Coord<f64>, b: Coord<f64>) -> bool;

    /// Whether `line` begins at either end of `other`.
    fn starts_at_extremity(&self, line: &LineString<f64>, other: &LineString<f64>) -> bool {
        let (Some(start), Some(other_first), Some(other_last)) =
            (line.0.first(), other.0.first(), other.0.last())
        else {
            return false;
        };
        self.same_point(*start, *other_first) || self.same_point(*start, *other_last)
    }

    fn is_loop(&self, line: &LineString<f64>) -> bool {
        match (line.0.first(), line.0.last()) {
            (Some(first), Some(last)) if line.0.len() > 1 => self.same_point(*first, *last),
            _ => false,
        }
    }
}

/// Euclidean linear referencing directly on the coordinate plane.
#[derive(Debug, Clone, Copy)]
pub struct PlanarGeometry {
    margin: f64,
}

impl PlanarGeometry {
    pub fn new(margin: f64) -> Self {
        Self { margin }
    }

    // (index of the vertex before `fraction`, the interpolated point)
    fn locate_vertex(&self, line: &LineString<f64>, fraction: f64) -> (usize, Coord<f64>) {
        let point = self.interpolate(line, fraction);
        let last_segment = line.0.len().saturating_sub(2);
        let target = fraction * Euclidean.length(line);

        let mut travelled = 0.0;
        for (i, segment) in line.lines().enumerate() {
            travelled += Euclidean.length(&segment);
            if travelled >= target {
                return (i, point);
            }
        }
        (last_segment, point)
    }
}

impl Default for PlanarGeometry {
    fn default() -> Self {
        Self::new(DEFAULT_COORDINATE_MARGIN)
    }
}

impl GeometryService for PlanarGeometry {
    fn locate_on_line(&self, line: &LineString<f64>, coord: Coord<f64>) -> f64 {
        line.line_locate_point(&Point::from(coord))
            .filter(|fraction| fraction.is_finite())
            .map(|fraction| fraction.clamp(0.0, 1.0))
            .unwrap_or(0.0)
    }

    fn interpolate(&self, line: &LineString<f64>, fraction: f64) -> Coord<f64> {
        match line.line_interpolate_point(fraction.clamp(0.0, 1.0)) {
            Some(point) => point.0,
            None => line.0.first().copied().unwrap_or(Coord { x: 0.0, y: 0.0 }),
        }
    }

    fn extract(&self, line: &LineString<f64>, from: f64, to: f64) -> Vec<Coord<f64>> {
        if line.0.is_empty() {
            return Vec::new();
        }
        if from > to {
            let mut reversed = self.extract(line, to, from);
            reversed.reverse();
            return reversed;
        }

        let from = from.clamp(0.0, 1.0);
        let to = to.clamp(0.0, 1.0);
        if line.0.len() == 1 || from == to {
            return vec![self.interpolate(line, to)];
        }

        let (start_idx, start_point) = self.locate_vertex(line, from);
        let (end_idx, end_point) = self.locate_vertex(line, to);

        let mut points = Vec::with_capacity(end_idx.saturating_sub(start_idx) + 2);
        points.push(start_point);
        points.extend_from_slice(&line.0[start_idx + 1..=end_idx]);
        points.push(end_point);
        points.dedup_by(|a, b| self.same_point(*a, *b));
        points
    }

    fn same_point(&self, a: Coord<f64>, b: Coord<f64>) -> bool {
        (a.x - b.x).abs() <= self.margin && (a.y - b.y).abs() <= self.margin
    }
}

pub fn polyline_length(line: &LineString<f64>) -> f64 {
    Euclidean.length(line)
}

/// Great-circle length in meters of a lon/lat polyline.
pub fn haversine_length(line: &LineString<f64>) -> f64 {
    Haversine.length(line)
}
