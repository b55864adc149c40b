//! Decoding of the hex-encoded (E)WKB geometry columns.
//!
//! Input files carry PostGIS-style hex EWKB: a byte-order marker, a geometry
//! type whose high bits flag an optional SRID (and Z/M dimensions), then the
//! coordinates. Z and M values are read and dropped.

use geo::{
    Contains, Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point,
    Polygon,
};

use crate::error::GeometryError;

const EWKB_Z: u32 = 0x8000_0000;
const EWKB_M: u32 = 0x4000_0000;
const EWKB_SRID: u32 = 0x2000_0000;

/// Smallest encoding of a member geometry: byte order plus type.
const MIN_MEMBER_BYTES: usize = 5;

/// Decode a hex (E)WKB string into a geometry.
pub fn decode_hex_ewkb(hex_str: &str) -> Result<Geometry<f64>, GeometryError> {
    let bytes = hex::decode(hex_str.trim()).map_err(|e| GeometryError::Hex(e.to_string()))?;
    let mut reader = WkbReader::new(&bytes);
    let geometry = reader.geometry(false)?;
    if !reader.at_end() {
        return Err(GeometryError::TrailingBytes);
    }
    Ok(geometry)
}

/// Decode a hex (E)WKB string that must hold a point.
pub fn decode_hex_point(hex_str: &str) -> Result<Point<f64>, GeometryError> {
    match decode_hex_ewkb(hex_str)? {
        Geometry::Point(p) => Ok(p),
        other => Err(GeometryError::NotAPoint(geometry_name(&other))),
    }
}

pub fn geometry_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Structural validity good enough for a containment test: finite
/// coordinates, closed polygon rings of at least four points, non-empty lines.
pub fn is_valid_shape(geometry: &Geometry<f64>) -> bool {
    fn ring_ok(ring: &LineString<f64>) -> bool {
        ring.0.len() >= 4 && ring.is_closed() && ring.coords().all(coord_ok)
    }
    fn coord_ok(c: &Coord<f64>) -> bool {
        c.x.is_finite() && c.y.is_finite()
    }
    fn polygon_ok(p: &Polygon<f64>) -> bool {
        ring_ok(p.exterior()) && p.interiors().iter().all(ring_ok)
    }

    match geometry {
        Geometry::Point(p) => coord_ok(&p.0),
        Geometry::LineString(ls) => ls.0.len() >= 2 && ls.coords().all(coord_ok),
        Geometry::MultiLineString(mls) => {
            !mls.0.is_empty() && mls.iter().all(|ls| ls.0.len() >= 2 && ls.coords().all(coord_ok))
        }
        Geometry::Polygon(p) => polygon_ok(p),
        Geometry::MultiPolygon(mp) => !mp.0.is_empty() && mp.iter().all(polygon_ok),
        Geometry::MultiPoint(mp) => !mp.0.is_empty() && mp.iter().all(|p| coord_ok(&p.0)),
        _ => false,
    }
}

/// Whether `shape` contains the point at (lon, lat).
pub fn shape_contains(shape: &Geometry<f64>, point: Point<f64>) -> bool {
    shape.contains(&point)
}

struct WkbReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> WkbReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }

    /// Read an element count, rejecting counts the rest of the buffer
    /// cannot hold at `item_bytes` each.
    fn count(&mut self, little: bool, item_bytes: usize) -> Result<usize, GeometryError> {
        let n = self.u32(little)? as usize;
        let remaining = self.bytes.len() - self.pos;
        if n.saturating_mul(item_bytes) > remaining {
            return Err(GeometryError::Truncated(self.pos));
        }
        Ok(n)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], GeometryError> {
        let end = self.pos + N;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(GeometryError::Truncated(self.pos))?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn u32(&mut self, little: bool) -> Result<u32, GeometryError> {
        let b = self.take::<4>()?;
        Ok(if little {
            u32::from_le_bytes(b)
        } else {
            u32::from_be_bytes(b)
        })
    }

    fn f64(&mut self, little: bool) -> Result<f64, GeometryError> {
        let b = self.take::<8>()?;
        Ok(if little {
            f64::from_le_bytes(b)
        } else {
            f64::from_be_bytes(b)
        })
    }

    /// Members of a multi geometry are simple geometries; collections do
    /// not nest.
    fn geometry(&mut self, member: bool) -> Result<Geometry<f64>, GeometryError> {
        let [order] = self.take::<1>()?;
        let little = match order {
            0 => false,
            1 => true,
            other => return Err(GeometryError::ByteOrder(other)),
        };

        let raw_type = self.u32(little)?;
        let mut extra_dims = 0;
        if raw_type & EWKB_Z != 0 {
            extra_dims += 1;
        }
        if raw_type & EWKB_M != 0 {
            extra_dims += 1;
        }
        if raw_type & EWKB_SRID != 0 {
            // srid value itself is not kept, everything is assumed WGS84
            self.u32(little)?;
        }

        // ISO WKB encodes dimensions as 1000/2000/3000 offsets instead of flags
        let mut base = raw_type & 0x0fff_ffff;
        if base > 1000 {
            extra_dims += match base / 1000 {
                1 | 2 => 1,
                3 => 2,
                _ => 0,
            };
            base %= 1000;
        }

        if member && matches!(base, 4..=6) {
            return Err(GeometryError::UnsupportedType(base));
        }

        match base {
            1 => Ok(Geometry::Point(self.point(little, extra_dims)?)),
            2 => Ok(Geometry::LineString(self.line_string(little, extra_dims)?)),
            3 => Ok(Geometry::Polygon(self.polygon(little, extra_dims)?)),
            4 => {
                let n = self.count(little, MIN_MEMBER_BYTES)?;
                let mut points = Vec::with_capacity(n);
                for _ in 0..n {
                    match self.geometry(true)? {
                        Geometry::Point(p) => points.push(p),
                        other => return Err(GeometryError::NotAPoint(geometry_name(&other))),
                    }
                }
                Ok(Geometry::MultiPoint(MultiPoint::new(points)))
            }
            5 => {
                let n = self.count(little, MIN_MEMBER_BYTES)?;
                let mut lines = Vec::with_capacity(n);
                for _ in 0..n {
                    if let Geometry::LineString(ls) = self.geometry(true)? {
                        lines.push(ls);
                    } else {
                        return Err(GeometryError::UnsupportedType(base));
                    }
                }
                Ok(Geometry::MultiLineString(MultiLineString::new(lines)))
            }
            6 => {
                let n = self.count(little, MIN_MEMBER_BYTES)?;
                let mut polygons = Vec::with_capacity(n);
                for _ in 0..n {
                    if let Geometry::Polygon(p) = self.geometry(true)? {
                        polygons.push(p);
                    } else {
                        return Err(GeometryError::UnsupportedType(base));
                    }
                }
                Ok(Geometry::MultiPolygon(MultiPolygon::new(polygons)))
            }
            other => Err(GeometryError::UnsupportedType(other)),
        }
    }

    fn coord(&mut self, little: bool, extra_dims: usize) -> Result<Coord<f64>, GeometryError> {
        let x = self.f64(little)?;
        let y = self.f64(little)?;
        for _ in 0..extra_dims {
            self.f64(little)?;
        }
        Ok(Coord { x, y })
    }

    fn point(&mut self, little: bool, extra_dims: usize) -> Result<Point<f64>, GeometryError> {
        Ok(Point(self.coord(little, extra_dims)?))
    }

    fn line_string(
        &mut self,
        little: bool,
        extra_dims: usize,
    ) -> Result<LineString<f64>, GeometryError> {
        let n = self.count(little, 8 * (2 + extra_dims))?;
        let mut coords = Vec::with_capacity(n);
        for _ in 0..n {
            coords.push(self.coord(little, extra_dims)?);
        }
        Ok(LineString::new(coords))
    }

    fn polygon(&mut self, little: bool, extra_dims: usize) -> Result<Polygon<f64>, GeometryError> {
        // every ring carries at least its own point count
        let rings = self.count(little, 4)?;
        if rings == 0 {
            return Ok(Polygon::new(LineString::new(vec![]), vec![]));
        }
        let exterior = self.line_string(little, extra_dims)?;
        let mut interiors = Vec::with_capacity(rings - 1);
        for _ in 1..rings {
            interiors.push(self.line_string(little, extra_dims)?);
        }
        Ok(Polygon::new(exterior, interiors))
    }
}
