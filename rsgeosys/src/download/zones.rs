//! Zone and hotspot layers of a management-zone map.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::collect::global_variables::SELF_LINK;
use crate::collect::http::{status_message, HttpClient};
use crate::collect::session::SessionContext;
use crate::commons::basic_functions::{append_query, unique_file_name};
use crate::error::{GeosysError, Result};
use crate::geo_core::{geo_to_geojson, geojson_to_geo, parse_wkt};
use crate::products::types::{FieldMapResult, ZoningParams};

/// On-disk format of zone and hotspot layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerFormat {
    GeoJson,
    #[default]
    Shapefile,
}

impl LayerFormat {
    pub fn extension(self) -> &'static str {
        match self {
            LayerFormat::GeoJson => "geojson",
            LayerFormat::Shapefile => "shp",
        }
    }
}

impl fmt::Display for LayerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerFormat::GeoJson => f.write_str("geojson"),
            LayerFormat::Shapefile => f.write_str("shapefile"),
        }
    }
}

impl FromStr for LayerFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "geojson" => Ok(LayerFormat::GeoJson),
            "shapefile" | "shp" => Ok(LayerFormat::Shapefile),
            other => Err(format!("unknown layer format: {}", other)),
        }
    }
}

/// Id fields a hotspot may carry; more than one can be present.
#[derive(Debug, Deserialize)]
struct HotspotWire {
    geometry: Value,
    #[serde(rename = "segmentId", default)]
    segment_id: Option<Value>,
    #[serde(rename = "segment_id", default)]
    segment_id_snake: Option<Value>,
    #[serde(rename = "zoneId", default)]
    zone_id: Option<Value>,
}

impl HotspotWire {
    fn segment(&mut self) -> Value {
        [
            self.segment_id.take(),
            self.segment_id_snake.take(),
            self.zone_id.take(),
        ]
        .into_iter()
        .flatten()
        .find(|id| !id.is_null())
        .unwrap_or(Value::Null)
    }
}

#[derive(Debug, Deserialize)]
struct ZoneWire {
    geometry: Value,
    #[serde(rename = "zoneId", default)]
    zone_id: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    mean: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    area: Option<f64>,
    #[serde(default)]
    std: Option<f64>,
}

impl ZoneWire {
    fn zone(&mut self) -> Value {
        [self.zone_id.take(), self.id.take()]
            .into_iter()
            .flatten()
            .find(|id| !id.is_null())
            .unwrap_or(Value::Null)
    }
}

/// Hotspot points and zone polygons; each layer is independently optional.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ZoneLayers {
    pub hotspots: Option<FeatureCollection>,
    pub zones: Option<FeatureCollection>,
}

impl ZoneLayers {
    pub fn is_empty(&self) -> bool {
        self.hotspots.is_none() && self.zones.is_none()
    }
}

/// Zone query for the map at `self_link`, or `None` unless both zoning
/// and hotspots were requested.
pub fn zone_query_url(self_link: &str, zoning: &ZoningParams) -> Option<String> {
    if !(zoning.zoning && zoning.hotspot) {
        return None;
    }
    let mut query = format!("zoning=true&zoneCount={}&hotspot=true", zoning.zone_count);
    if zoning.zoning_segmentation {
        query.push_str("&zoningSegmentation=polygon");
    }
    if let Some(position) = zoning.position.as_deref().filter(|p| !p.is_empty()) {
        query.push_str(&format!("&hotSpotPosition={}", urlencoding::encode(position)));
    }
    if let Some(filter) = zoning.filter.as_deref().filter(|f| !f.is_empty()) {
        query.push_str(&format!("&hotSpotFilter={}", urlencoding::encode(filter)));
    }
    Some(append_query(self_link, &query))
}

/// Geometry given either as WKT text or as a GeoJSON object.
fn read_geometry(value: &Value) -> Result<geojson::Geometry> {
    let geometry = match value {
        Value::String(wkt) => parse_wkt(wkt)?,
        Value::Object(_) => {
            let geometry: geojson::Geometry = serde_json::from_value(value.clone())
                .map_err(|e| GeosysError::Geometry(format!("invalid GeoJSON geometry: {}", e)))?;
            geojson_to_geo(geometry)?
        }
        other => {
            return Err(GeosysError::Geometry(format!(
                "unexpected geometry value: {}",
                other
            )))
        }
    };
    Ok(geo_to_geojson(&geometry))
}

fn optional_number(value: Option<f64>) -> Value {
    value.map_or(Value::Null, Value::from)
}

fn feature(geometry: geojson::Geometry, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn collection(features: Vec<Feature>) -> Option<FeatureCollection> {
    (!features.is_empty()).then_some(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

fn hotspot_feature(value: Value) -> Result<Feature> {
    let mut hotspot: HotspotWire = serde_json::from_value(value)
        .map_err(|e| GeosysError::InvalidResponse(format!("hotspot: {}", e)))?;
    let mut properties = JsonObject::new();
    properties.insert("segment_id".to_string(), hotspot.segment());
    Ok(feature(read_geometry(&hotspot.geometry)?, properties))
}

fn zone_feature(value: Value) -> Result<Feature> {
    let mut zone: ZoneWire = serde_json::from_value(value)
        .map_err(|e| GeosysError::InvalidResponse(format!("zone: {}", e)))?;
    let mut properties = JsonObject::new();
    properties.insert("zone_id".to_string(), zone.zone());
    properties.insert("mean".to_string(), optional_number(zone.mean));
    properties.insert("max".to_string(), optional_number(zone.max));
    properties.insert("min".to_string(), optional_number(zone.min));
    properties.insert("area".to_string(), optional_number(zone.area));
    properties.insert("std".to_string(), optional_number(zone.std));
    Ok(feature(read_geometry(&zone.geometry)?, properties))
}

/// Features of the array at the first present key. Unreadable entries are
/// skipped so that one bad feature never drops the rest of its layer or
/// the other layer.
fn layer_features(
    body: &Value,
    keys: &[&str],
    layer: &str,
    read: fn(Value) -> Result<Feature>,
) -> Vec<Feature> {
    let Some(items) = keys.iter().find_map(|key| body.get(*key)) else {
        return Vec::new();
    };
    let Some(items) = items.as_array() else {
        warn!(layer, "Layer is not an array, skipped");
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match read(item.clone()) {
            Ok(feature) => Some(feature),
            Err(e) => {
                warn!(layer, index, error = %e, "Skipping unreadable feature");
                None
            }
        })
        .collect()
}

/// Converts a zone query response into layers. A `null` standard
/// deviation stays `null` in the layer attributes.
pub fn parse_zone_layers(body: &Value) -> Result<ZoneLayers> {
    if !body.is_object() {
        return Err(GeosysError::InvalidResponse(
            "zone response: expected an object".to_string(),
        ));
    }
    let hotspots = layer_features(body, &["hotSpots", "hotspots"], "hotspots", hotspot_feature);
    let zones = layer_features(body, &["zones"], "zones", zone_feature);
    Ok(ZoneLayers {
        hotspots: collection(hotspots),
        zones: collection(zones),
    })
}

/// Queries the zones and hotspots of a management-zone map.
///
/// Returns empty layers without any call unless zoning and hotspots were
/// both requested.
pub fn extract_zones<C: HttpClient + ?Sized>(
    client: &C,
    session: &SessionContext,
    result: &FieldMapResult,
    zoning: &ZoningParams,
) -> Result<ZoneLayers> {
    let self_link = result
        .links
        .get(SELF_LINK)
        .ok_or_else(|| GeosysError::MissingOutputFormat(SELF_LINK.to_string()))?;
    let Some(url) = zone_query_url(self_link, zoning) else {
        return Ok(ZoneLayers::default());
    };

    info!(url = %url, "Querying zones and hotspots");
    let authorization = session.authorization();
    let response = client.get(&url, &[("Authorization", authorization.as_str())], &[])?;
    if !response.is_success() {
        return Err(GeosysError::Http(status_message(response.status)));
    }
    let layers = parse_zone_layers(&response.json())?;
    debug!(
        hotspots = layers.hotspots.as_ref().map_or(0, |c| c.features.len()),
        zones = layers.zones.as_ref().map_or(0, |c| c.features.len()),
        "Zone layers parsed"
    );
    Ok(layers)
}

/// Base layer names: hotspots first, zones second.
pub fn layer_names(result: &FieldMapResult, zoning: &ZoningParams) -> (String, String) {
    let season_field_id = result.season_field_id.as_deref().unwrap_or("unknown");
    let date = result
        .image_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "undated".to_string());
    let hotspot_kind = if zoning.zoning_segmentation {
        "HotspotsPerPolygon"
    } else {
        "HotspotsPerField"
    };
    (
        format!("{}_{}_{}", hotspot_kind, season_field_id, date),
        format!("Zones_{}_{}", season_field_id, date),
    )
}

/// Writes `layer` as `<output_dir>/<name>[_n].<ext>`, picking the first
/// suffix that does not collide with an existing file.
pub fn write_layer(
    layer: &FeatureCollection,
    output_dir: &Path,
    name: &str,
    format: LayerFormat,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let file_name = unique_file_name(output_dir, name, format.extension());
    let path = output_dir.join(format!("{}.{}", file_name, format.extension()));
    let geojson = GeoJson::FeatureCollection(layer.clone()).to_string();

    match format {
        LayerFormat::GeoJson => fs::write(&path, geojson)?,
        LayerFormat::Shapefile => export_shapefile(&geojson, &path)?,
    }
    info!(path = %path.display(), features = layer.features.len(), "Layer saved");
    Ok(path)
}

/// Writes the non-empty layers of `layers` and returns their paths.
pub fn write_zone_layers(
    layers: &ZoneLayers,
    result: &FieldMapResult,
    zoning: &ZoningParams,
    output_dir: &Path,
    format: LayerFormat,
) -> Result<Vec<PathBuf>> {
    let (hotspot_name, zone_name) = layer_names(result, zoning);
    let mut written = Vec::new();
    if let Some(hotspots) = &layers.hotspots {
        written.push(write_layer(hotspots, output_dir, &hotspot_name, format)?);
    }
    if let Some(zones) = &layers.zones {
        written.push(write_layer(zones, output_dir, &zone_name, format)?);
    }
    Ok(written)
}

/// Converts GeoJSON text to an ESRI Shapefile with ogr2ogr.
#[cfg(feature = "shapefile-export")]
fn export_shapefile(geojson: &str, path: &Path) -> Result<()> {
    use std::io::Write;
    use std::process::Command;

    let mut temp = tempfile::Builder::new()
        .suffix(".geojson")
        .tempfile()?;
    temp.write_all(geojson.as_bytes())?;
    temp.flush()?;

    let status = Command::new("ogr2ogr")
        .arg("-f")
        .arg("ESRI Shapefile")
        .arg("-t_srs")
        .arg("EPSG:4326")
        .arg(path)
        .arg(temp.path())
        .status()
        .map_err(|e| {
            GeosysError::LayerExport(format!(
                "failed to execute ogr2ogr ({}). Make sure GDAL is installed and ogr2ogr is in PATH",
                e
            ))
        })?;

    if !status.success() {
        return Err(GeosysError::LayerExport(
            "ogr2ogr failed to convert GeoJSON to shapefile".to_string(),
        ));
    }
    Ok(())
}

#[cfg(not(feature = "shapefile-export"))]
fn export_shapefile(_geojson: &str, _path: &Path) -> Result<()> {
    Err(GeosysError::LayerExport(
        "shapefile export is disabled in this build".to_string(),
    ))
}
