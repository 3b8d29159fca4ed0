//! Field geometry handling: GeoJSON/WKT input, WKT output for coverage
//! queries, and conversion to GeoJSON for zone layers.

use geo::{Coord, Geometry, LineString, Polygon};
use geojson::GeoJson;
use wkt::{ToWkt, TryFromWkt};

use crate::error::{GeosysError, Result};

/// Bounding box in WGS84 degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64, // min longitude
    pub min_y: f64, // min latitude
    pub max_x: f64, // max longitude
    pub max_y: f64, // max latitude
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Parses `min_x,min_y,max_x,max_y`.
    pub fn parse(text: &str) -> Result<Self> {
        let values: Vec<f64> = text
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| GeosysError::Geometry(format!("invalid bounding box {}: {}", text, e)))?;
        match values.as_slice() {
            [min_x, min_y, max_x, max_y] if min_x < max_x && min_y < max_y => {
                Ok(BoundingBox::new(*min_x, *min_y, *max_x, *max_y))
            }
            _ => Err(GeosysError::Geometry(format!(
                "invalid bounding box {}",
                text
            ))),
        }
    }

    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                Coord {
                    x: self.min_x,
                    y: self.min_y,
                },
                Coord {
                    x: self.max_x,
                    y: self.min_y,
                },
                Coord {
                    x: self.max_x,
                    y: self.max_y,
                },
                Coord {
                    x: self.min_x,
                    y: self.max_y,
                },
                Coord {
                    x: self.min_x,
                    y: self.min_y,
                },
            ]),
            vec![],
        )
    }
}

/// Field boundary sent with coverage searches.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldGeometry {
    geometry: Geometry<f64>,
}

impl FieldGeometry {
    pub fn from_bbox(bbox: BoundingBox) -> Self {
        Self {
            geometry: Geometry::Polygon(bbox.to_polygon()),
        }
    }

    /// Reads a GeoJSON geometry, feature or the first feature of a
    /// collection.
    pub fn from_geojson_str(text: &str) -> Result<Self> {
        let geojson: GeoJson = text
            .parse()
            .map_err(|e| GeosysError::Geometry(format!("invalid GeoJSON: {}", e)))?;
        let geometry = match geojson {
            GeoJson::Geometry(g) => Some(g),
            GeoJson::Feature(f) => f.geometry,
            GeoJson::FeatureCollection(fc) => fc.features.into_iter().find_map(|f| f.geometry),
        }
        .ok_or_else(|| GeosysError::Geometry("GeoJSON has no geometry".to_string()))?;
        Self::from_geometry(geojson_to_geo(geometry)?)
    }

    pub fn from_wkt(text: &str) -> Result<Self> {
        Self::from_geometry(parse_wkt(text)?)
    }

    fn from_geometry(geometry: Geometry<f64>) -> Result<Self> {
        match geometry {
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) => Ok(Self { geometry }),
            _ => Err(GeosysError::Geometry(
                "field geometry must be a polygon or multipolygon".to_string(),
            )),
        }
    }

    pub fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    pub fn to_wkt(&self) -> String {
        write_wkt(&self.geometry)
    }
}

pub fn geojson_to_geo(geometry: geojson::Geometry) -> Result<Geometry<f64>> {
    Geometry::<f64>::try_from(geometry)
        .map_err(|e| GeosysError::Geometry(format!("unsupported GeoJSON geometry: {}", e)))
}

pub fn geo_to_geojson(geometry: &Geometry<f64>) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::from(geometry))
}

/// WKT of `geometry`, as sent in coverage queries.
pub fn write_wkt(geometry: &Geometry<f64>) -> String {
    geometry.wkt_string()
}

/// Reads a WKT geometry. An EWKT `SRID=...;` prefix is dropped.
pub fn parse_wkt(text: &str) -> Result<Geometry<f64>> {
    let text = text.rsplit(';').next().unwrap_or(text).trim();
    Geometry::<f64>::try_from_wkt_str(text)
        .map_err(|e| GeosysError::Geometry(format!("invalid WKT {}: {}", text, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    fn parse_back(wkt: &str) -> Geometry<f64> {
        parse_wkt(wkt).unwrap()
    }

    #[test]
    fn test_bounding_box() {
        let bbox: BoundingBox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(bbox.min_x, 0.0);
        assert_eq!(bbox.max_x, 1.0);
        let field = FieldGeometry::from_bbox(bbox);
        assert!(field.to_wkt().starts_with("POLYGON"));
        assert_eq!(parse_back(&field.to_wkt()), Geometry::Polygon(bbox.to_polygon()));
    }

    #[test]
    fn test_bounding_box_parse() {
        let bbox = BoundingBox::parse("-0.5, 46.1, -0.4, 46.2").unwrap();
        assert_eq!(bbox, BoundingBox::new(-0.5, 46.1, -0.4, 46.2));
        assert!(BoundingBox::parse("1,2,3").is_err());
        assert!(BoundingBox::parse("1,2,0,3").is_err());
    }

    #[test]
    fn test_wkt_polygon_with_hole() {
        let wkt = "POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0), (2 2, 3 2, 3 3, 2 2))";
        let geometry = parse_wkt(wkt).unwrap();
        match &geometry {
            Geometry::Polygon(p) => assert_eq!(p.interiors().len(), 1),
            other => panic!("unexpected geometry {:?}", other),
        }
        assert_eq!(parse_back(&write_wkt(&geometry)), geometry);
    }

    #[test]
    fn test_parse_point_and_multipolygon() {
        assert_eq!(
            parse_wkt("POINT(-93.5 41.25)").unwrap(),
            Geometry::Point(Point::new(-93.5, 41.25))
        );
        let mp = parse_wkt("SRID=4326;MULTIPOLYGON(((0 0,1 0,1 1,0 0)),((5 5,6 5,6 6,5 5)))")
            .unwrap();
        match mp {
            Geometry::MultiPolygon(mp) => assert_eq!(mp.0.len(), 2),
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_parse_multipoint_and_three_dimensional_point() {
        match parse_wkt("MULTIPOINT((1 2),(3 4))").unwrap() {
            Geometry::MultiPoint(points) => assert_eq!(points.0.len(), 2),
            other => panic!("unexpected geometry {:?}", other),
        }
        assert_eq!(
            parse_wkt("POINT Z (1 2 3)").unwrap(),
            Geometry::Point(Point::new(1.0, 2.0))
        );
    }

    #[test]
    fn test_parse_invalid_wkt() {
        assert!(parse_wkt("POLYGON ((0 0, 1 x))").is_err());
        assert!(parse_wkt("CIRCLE (0 0)").is_err());
        assert!(parse_wkt("POLYGON ((0 0, 1 0").is_err());
    }

    #[test]
    fn test_field_geometry_from_geojson_feature() {
        let text = r#"{"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}}"#;
        let field = FieldGeometry::from_geojson_str(text).unwrap();
        assert_eq!(
            field.geometry(),
            &parse_back("POLYGON ((0 0, 1 0, 1 1, 0 0))")
        );
    }

    #[test]
    fn test_field_geometry_rejects_points() {
        assert!(FieldGeometry::from_wkt("POINT (1 2)").is_err());
    }
}
