use crate::config::{ProjectionConfig, ViewportConfig};
use geo::{Coord, Geometry, LineString, Polygon};
use std::f64::consts::PI;
use std::fmt::Write;

// Web Mercator latitude limit
const MAX_LATITUDE: f64 = 85.05112878;

/// Spherical Mercator projection centred on `center`, with the centre placed
/// at `translate` on the drawing surface.
#[derive(Debug, Clone, Copy)]
pub struct Mercator {
    center_lon: f64,
    center_y: f64,
    scale: f64,
    translate: (f64, f64),
}

fn mercator_y(lat: f64) -> f64 {
    let lat_rad = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    (PI / 4.0 + lat_rad / 2.0).tan().ln()
}

impl Mercator {
    pub fn new(center: [f64; 2], scale: f64, translate: (f64, f64)) -> Self {
        Self {
            center_lon: center[0],
            center_y: mercator_y(center[1]),
            scale,
            translate,
        }
    }

    /// Projection for a viewport: centred horizontally and vertically on the
    /// full viewing surface, not the shorter drawing surface.
    pub fn for_viewport(projection: &ProjectionConfig, viewport: &ViewportConfig) -> Self {
        Self::new(
            projection.center,
            projection.scale,
            (viewport.width / 2.0, viewport.height / 2.0),
        )
    }

    /// Projects `(lon, lat)` in degrees to surface pixels.
    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let x = self.translate.0 + self.scale * (lon - self.center_lon).to_radians();
        let y = self.translate.1 - self.scale * (mercator_y(lat) - self.center_y);
        (x, y)
    }

    /// SVG path data for a geometry. Points produce no outline; an empty
    /// string means nothing to draw.
    pub fn path_data(&self, geometry: &Geometry<f64>) -> String {
        let mut d = String::new();
        self.append_geometry(&mut d, geometry);
        d
    }

    fn append_geometry(&self, d: &mut String, geometry: &Geometry<f64>) {
        match geometry {
            Geometry::Polygon(p) => self.append_polygon(d, p),
            Geometry::MultiPolygon(mp) => mp.iter().for_each(|p| self.append_polygon(d, p)),
            Geometry::LineString(ls) => self.append_line(d, ls, false),
            Geometry::MultiLineString(mls) => mls.iter().for_each(|ls| self.append_line(d, ls, false)),
            Geometry::Rect(r) => self.append_polygon(d, &r.to_polygon()),
            Geometry::Triangle(t) => self.append_polygon(d, &t.to_polygon()),
            Geometry::Line(l) => self.append_coords(d, [l.start, l.end].into_iter(), false),
            Geometry::GeometryCollection(gc) => gc.iter().for_each(|g| self.append_geometry(d, g)),
            Geometry::Point(_) | Geometry::MultiPoint(_) => {}
        }
    }

    fn append_polygon(&self, d: &mut String, polygon: &Polygon<f64>) {
        self.append_line(d, polygon.exterior(), true);
        for interior in polygon.interiors() {
            self.append_line(d, interior, true);
        }
    }

    fn append_line(&self, d: &mut String, line: &LineString<f64>, ring: bool) {
        // Closed rings repeat the first coordinate; `Z` closes them instead.
        let coords = &line.0;
        let coords = if ring && coords.len() > 1 && coords.first() == coords.last() {
            &coords[..coords.len() - 1]
        } else {
            &coords[..]
        };
        self.append_coords(d, coords.iter().copied(), ring);
    }

    fn append_coords(&self, d: &mut String, coords: impl Iterator<Item = Coord<f64>>, close: bool) {
        let mut empty = true;
        for (i, c) in coords.enumerate() {
            let (x, y) = self.project(c.x, c.y);
            let cmd = if i == 0 { 'M' } else { 'L' };
            let _ = write!(d, "{}{},{}", cmd, round3(x), round3(y));
            empty = false;
        }
        if close && !empty {
            d.push('Z');
        }
    }
}

fn round3(v: f64) -> f64 {
    let r = (v * 1000.0).round() / 1000.0;
    // avoid printing "-0"
    if r == 0.0 { 0.0 } else { r }
}
