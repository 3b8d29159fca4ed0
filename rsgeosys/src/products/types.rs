use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use crate::error::{GeosysError, Result};

/// Map family. Each family owns one REST path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapFamily {
    BaseReference,
    Model,
    YieldGoal,
    YieldVariability,
    ManagementZones,
    OrganicMatter,
    Topology,
    Soil,
    Reflectance,
    Difference,
}

impl MapFamily {
    pub fn path_segment(self) -> &'static str {
        match self {
            MapFamily::BaseReference => "base-reference-map",
            MapFamily::Model => "model-map",
            MapFamily::YieldGoal => "yield-goal-map",
            MapFamily::YieldVariability => "yield-variability-map",
            MapFamily::ManagementZones => "management-zones-map",
            MapFamily::OrganicMatter => "organic-matter-map",
            MapFamily::Topology => "topology-map",
            MapFamily::Soil => "soil-map",
            MapFamily::Reflectance => "reflectance-map",
            MapFamily::Difference => "difference-map",
        }
    }
}

/// The outbound call a product needs when a field map is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape {
    /// GET `season-fields/{id}/coverage/{image}/{family}/{key}`
    CoverageImage,
    /// Coverage image path followed by `n-planned/{value}`
    Nitrogen,
    /// Coverage image path followed by `historical-yield-average/{value}`
    YieldVariability,
    /// Coverage image path followed by the three yield-goal segments
    YieldGoal,
    /// GET `season-fields/{id}/management-zones-map/{key}`
    ManagementZones,
    /// POST `maps/{family}/{key}` with the fixed provider body
    Soil,
    /// POST `maps/{family}/{key}` with the request serialized as body
    Default,
}

/// Which search endpoint lists images for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Coverage,
    CatalogImagery,
}

/// How the preview link of a search result is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailRule {
    /// `thumbnail` link of the matching coverage entry
    FromLinks,
    /// NDVI thumbnail keyed by season field and image date
    NdviByDate,
    /// Product thumbnail keyed by season field and image id
    ByImageId,
    /// Model thumbnail embedding the planned nitrogen
    Nitrogen,
}

/// Static description of one map product.
#[derive(Debug, Clone, PartialEq)]
pub struct MapProductDefinition {
    pub key: &'static str,
    pub family: MapFamily,
    pub display_name: &'static str,
    pub description: &'static str,
    pub difference_product_key: Option<&'static str>,
    pub request_shape: RequestShape,
    pub search: SearchKind,
    /// Product key used for the coverage search instead of `key`
    pub search_product_key: Option<&'static str>,
    pub thumbnail: ThumbnailRule,
    /// Coverage entries for this product are not reliably typed
    pub untyped_coverage: bool,
    pub has_legend: bool,
}

impl MapProductDefinition {
    pub fn path_segment(&self) -> &'static str {
        self.family.path_segment()
    }
}

/// Date filter of a coverage search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    Between(NaiveDate, NaiveDate),
    Until(NaiveDate),
}

impl DateRange {
    pub fn from_bounds(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<Self> {
        match (start, end) {
            (Some(start), Some(end)) => Some(DateRange::Between(start, end)),
            (None, Some(end)) => Some(DateRange::Until(end)),
            _ => None,
        }
    }

    /// Renders the `Image.Date` filter value.
    pub fn filter_value(&self) -> String {
        match self {
            DateRange::Between(start, end) => format!("$between:{}|{}", start, end),
            DateRange::Until(end) => format!("$lte:{}", end),
        }
    }
}

/// Parameters of one coverage or catalog-imagery search.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageQuery {
    /// Field boundary as a WKT polygon
    pub geometry: String,
    pub crop: String,
    pub sowing_date: NaiveDate,
    pub map_product: Option<String>,
    pub sensor: Option<String>,
    pub date_range: Option<DateRange>,
}

/// Coverage classification reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoverageType {
    Clear,
    Cloudy,
    Partial,
    #[serde(other)]
    Unknown,
}

impl Default for CoverageType {
    fn default() -> Self {
        CoverageType::Unknown
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CoverageImage {
    #[serde(deserialize_with = "lenient_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub sensor: String,
}

/// One derived map offered for a coverage.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AvailableMap {
    #[serde(rename = "type", default)]
    pub map_type: String,
    #[serde(rename = "_links", default, deserialize_with = "string_links")]
    pub links: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct IdRef {
    #[serde(alias = "Id")]
    id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct CoverageResultWire {
    #[serde(rename = "seasonField")]
    season_field: IdRef,
    image: CoverageImage,
    #[serde(default)]
    maps: Vec<AvailableMap>,
    #[serde(rename = "coverageType", default)]
    coverage_type: CoverageType,
}

/// One image acquisition and its derived-map offerings for a season field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "CoverageResultWire")]
pub struct CoverageResult {
    pub season_field_id: String,
    pub image: CoverageImage,
    pub available_maps: Vec<AvailableMap>,
    pub coverage_type: CoverageType,
}

impl From<CoverageResultWire> for CoverageResult {
    fn from(wire: CoverageResultWire) -> Self {
        CoverageResult {
            season_field_id: wire.season_field.id,
            image: wire.image,
            available_maps: wire.maps,
            coverage_type: wire.coverage_type,
        }
    }
}

/// Management-zone post-processing options.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoningParams {
    pub zone_count: u32,
    pub zoning: bool,
    pub hotspot: bool,
    pub zoning_segmentation: bool,
    pub position: Option<String>,
    pub filter: Option<String>,
}

impl ZoningParams {
    pub fn zones(zone_count: u32) -> Self {
        Self {
            zone_count,
            zoning: true,
            hotspot: false,
            zoning_segmentation: false,
            position: None,
            filter: None,
        }
    }
}

/// Caller intent for one field map.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapRequest {
    pub product_key: String,
    pub season_field_id: String,
    pub image_date: NaiveDate,
    pub image_id: Option<String>,
    pub n_planned: Option<f64>,
    pub yield_average: Option<f64>,
    pub min_yield: Option<f64>,
    pub max_yield: Option<f64>,
    pub zoning: Option<ZoningParams>,
    /// Additional body fields for POST-shaped requests
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FieldMapRequest {
    pub fn new(
        product_key: impl Into<String>,
        season_field_id: impl Into<String>,
        image_date: NaiveDate,
    ) -> Self {
        Self {
            product_key: product_key.into(),
            season_field_id: season_field_id.into(),
            image_date,
            image_id: None,
            n_planned: None,
            yield_average: None,
            min_yield: None,
            max_yield: None,
            zoning: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Builds a request for the map of `product_key` on a search result.
    pub fn for_coverage(product_key: impl Into<String>, coverage: &CoverageResult) -> Self {
        let mut request = Self::new(
            product_key,
            coverage.season_field_id.clone(),
            coverage.image.date,
        );
        request.image_id = coverage.image.id.clone();
        request
    }
}

#[derive(Debug, Deserialize)]
struct FieldMapResponseWire {
    #[serde(rename = "seasonField", default)]
    season_field: Option<IdRef>,
    #[serde(rename = "_links", default, deserialize_with = "string_links")]
    links: BTreeMap<String, String>,
    #[serde(default)]
    message: Option<String>,
}

/// Outcome of a field map request.
///
/// A missing `season_field_id` marks a failed request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldMapResult {
    pub season_field_id: Option<String>,
    pub links: BTreeMap<String, String>,
    pub error_message: Option<String>,
    /// Product the map was requested for (not part of the response)
    pub product_key: String,
    pub image_date: Option<NaiveDate>,
    pub image_id: Option<String>,
}

impl FieldMapResult {
    /// Interprets a service response body. Never fails: an unparseable
    /// body yields a result without season field.
    pub fn from_response(body: &serde_json::Value) -> Self {
        match FieldMapResponseWire::deserialize(body) {
            Ok(wire) => FieldMapResult {
                season_field_id: wire.season_field.map(|sf| sf.id),
                links: wire.links,
                error_message: wire.message,
                ..Default::default()
            },
            Err(_) => FieldMapResult {
                error_message: body
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string),
                ..Default::default()
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.season_field_id.is_some()
    }

    /// Converts a failed result into the "field map request failed" error.
    pub fn into_checked(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(GeosysError::field_map_failed(self.error_message.as_deref()))
        }
    }
}

/// Output formats offered by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Png,
    ZippedTiff,
    ZippedShp,
    Kmz,
    PngKmz,
    WorldFile,
    Legend,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 7] = [
        OutputFormat::Png,
        OutputFormat::ZippedTiff,
        OutputFormat::ZippedShp,
        OutputFormat::Kmz,
        OutputFormat::PngKmz,
        OutputFormat::WorldFile,
        OutputFormat::Legend,
    ];

    /// Key of the format inside a response's `_links`.
    pub fn api_key(self) -> &'static str {
        match self {
            OutputFormat::Png => "image:image/png",
            OutputFormat::ZippedTiff => "image:image/tiff+zip",
            OutputFormat::ZippedShp => "image:application/shp+zip",
            OutputFormat::Kmz => "image:application/vnd.google-earth.kmz",
            OutputFormat::PngKmz => "image:application/vnd.google-earth.kmz+png",
            OutputFormat::WorldFile => "worldFile",
            OutputFormat::Legend => "legend",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::ZippedTiff => "tiff",
            OutputFormat::ZippedShp => "shp",
            OutputFormat::Kmz => "kmz",
            OutputFormat::PngKmz => "kmz",
            OutputFormat::WorldFile => "pgw",
            OutputFormat::Legend => "legend.png",
        }
    }

    pub fn is_zipped(self) -> bool {
        matches!(self, OutputFormat::ZippedTiff | OutputFormat::ZippedShp)
    }

    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::ZippedTiff => "tiff",
            OutputFormat::ZippedShp => "shp",
            OutputFormat::Kmz => "kmz",
            OutputFormat::PngKmz => "png-kmz",
            OutputFormat::WorldFile => "world-file",
            OutputFormat::Legend => "legend",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        OutputFormat::ALL
            .iter()
            .copied()
            .find(|format| format.name() == s || format.api_key() == s)
            .ok_or_else(|| format!("unknown output format: {}", s))
    }
}

/// Accepts `2021-06-01` as well as timestamps starting with a date.
fn lenient_date<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let date_part = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(serde::de::Error::custom)
}

/// Keeps string links (or HAL `{"href": ...}` objects) and drops the rest.
fn string_links<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::String(url) => Some((key, url)),
            serde_json::Value::Object(obj) => obj
                .get("href")
                .and_then(|href| href.as_str())
                .map(|href| (key, href.to_string())),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_coverage_result_from_service_json() {
        let body = json!({
            "seasonField": {"id": "zgzmbrm", "customerExternalId": "x"},
            "image": {"date": "2018-10-18T00:00:00", "sensor": "SENTINEL_2", "id": "img-1"},
            "maps": [
                {"type": "INSEASON_NDVI", "_links": {
                    "thumbnail": "https://t/1.png",
                    "self": {"href": "https://s/1"},
                    "templated": true
                }}
            ],
            "coverageType": "CLEAR"
        });
        let result: CoverageResult = serde_json::from_value(body).unwrap();
        assert_eq!(result.season_field_id, "zgzmbrm");
        assert_eq!(result.image.date, date("2018-10-18"));
        assert_eq!(result.image.id.as_deref(), Some("img-1"));
        assert_eq!(result.coverage_type, CoverageType::Clear);
        let links = &result.available_maps[0].links;
        assert_eq!(links.get("thumbnail").unwrap(), "https://t/1.png");
        assert_eq!(links.get("self").unwrap(), "https://s/1");
        assert!(!links.contains_key("templated"));
    }

    #[test]
    fn test_unknown_coverage_type() {
        let body = json!({
            "seasonField": {"id": "a"},
            "image": {"date": "2020-01-01"},
            "coverageType": "SOMETHING_NEW"
        });
        let result: CoverageResult = serde_json::from_value(body).unwrap();
        assert_eq!(result.coverage_type, CoverageType::Unknown);
        assert!(result.available_maps.is_empty());
    }

    #[test]
    fn test_field_map_result_success() {
        let result = FieldMapResult::from_response(&json!({
            "seasonField": {"id": "f1"},
            "_links": {"image:image/png": "https://x/map.png"}
        }));
        assert!(result.is_success());
        assert_eq!(result.season_field_id.as_deref(), Some("f1"));
        assert!(result.into_checked().is_ok());
    }

    #[test]
    fn test_field_map_result_failure_keeps_message() {
        let result = FieldMapResult::from_response(&json!({"message": "No image"}));
        assert!(!result.is_success());
        let err = result.into_checked().unwrap_err();
        assert_eq!(err.to_string(), "Field map request failed. No image");
    }

    #[test]
    fn test_field_map_result_from_garbage() {
        let result = FieldMapResult::from_response(&json!([1, 2, 3]));
        assert!(!result.is_success());
        assert!(result.error_message.is_none());
    }

    #[test]
    fn test_date_range_filter() {
        let range = DateRange::from_bounds(Some(date("2020-01-01")), Some(date("2020-12-31")));
        assert_eq!(
            range.unwrap().filter_value(),
            "$between:2020-01-01|2020-12-31"
        );
        let until = DateRange::from_bounds(None, Some(date("2020-12-31")));
        assert_eq!(until.unwrap().filter_value(), "$lte:2020-12-31");
        assert!(DateRange::from_bounds(Some(date("2020-01-01")), None).is_none());
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("tiff".parse::<OutputFormat>(), Ok(OutputFormat::ZippedTiff));
        assert_eq!(
            "image:application/shp+zip".parse::<OutputFormat>(),
            Ok(OutputFormat::ZippedShp)
        );
        assert!("gif".parse::<OutputFormat>().is_err());
        assert!(OutputFormat::ZippedShp.is_zipped());
        assert!(!OutputFormat::Png.is_zipped());
    }
}
