//! Translation of map requests into concrete Bridge API calls.
//!
//! Shape selection is a single match over [`RequestShape`]; the per-product
//! tag lives in the catalog. Path-positional parameters (nitrogen, yield)
//! are formatted with [`format_path_number`] and never defaulted here.

use chrono::NaiveDate;
use serde_json::{json, Map, Value};

use crate::collect::global_variables::{
    IMAGE_DATE, IMAGE_SENSOR, MAPS_TYPE, SOIL_ASSET, SOIL_PROVIDER,
};
use crate::collect::session::SessionContext;
use crate::commons::basic_functions::{format_path_number, ordered_dates};
use crate::error::{GeosysError, Result};
use crate::products::catalog::{self, SAMZ};
use crate::products::thumbnail::search_product_key;
use crate::products::types::{
    CoverageQuery, FieldMapRequest, MapFamily, MapProductDefinition, RequestShape, SearchKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A fully built outbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl OutboundRequest {
    fn get(url: String) -> Self {
        Self {
            method: Method::Get,
            url,
            params: Vec::new(),
            body: None,
        }
    }

    fn post(url: String, body: Value) -> Self {
        Self {
            method: Method::Post,
            url,
            params: Vec::new(),
            body: Some(body),
        }
    }

    pub fn param_pairs(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

fn missing(definition: &MapProductDefinition, param: &'static str) -> GeosysError {
    GeosysError::MissingParameter {
        product: definition.key.to_string(),
        param,
    }
}

fn unexpected(definition: &MapProductDefinition, param: &'static str) -> GeosysError {
    GeosysError::UnexpectedParameter {
        product: definition.key.to_string(),
        param,
    }
}

/// Nitrogen fields belong to model products, yield fields to yield maps.
/// All of them end up in the URL path and must be finite.
fn validate_parameters(definition: &MapProductDefinition, request: &FieldMapRequest) -> Result<()> {
    for (param, value) in [
        ("n_planned", request.n_planned),
        ("yield_average", request.yield_average),
        ("min_yield", request.min_yield),
        ("max_yield", request.max_yield),
    ] {
        if let Some(value) = value.filter(|v| !v.is_finite()) {
            return Err(GeosysError::InvalidParameter {
                product: definition.key.to_string(),
                param,
                value,
            });
        }
    }
    if request.n_planned.is_some() && definition.family != MapFamily::Model {
        return Err(unexpected(definition, "n_planned"));
    }
    let is_yield = matches!(
        definition.family,
        MapFamily::YieldGoal | MapFamily::YieldVariability
    );
    if !is_yield {
        if request.yield_average.is_some() {
            return Err(unexpected(definition, "yield_average"));
        }
        if request.min_yield.is_some() || request.max_yield.is_some() {
            return Err(unexpected(definition, "min_yield/max_yield"));
        }
    }
    Ok(())
}

fn coverage_image_segments(
    definition: &MapProductDefinition,
    request: &FieldMapRequest,
) -> Result<Vec<String>> {
    let image_id = request
        .image_id
        .as_deref()
        .ok_or_else(|| missing(definition, "image_id"))?;
    Ok(vec![
        "season-fields".to_string(),
        request.season_field_id.clone(),
        "coverage".to_string(),
        image_id.to_string(),
        definition.path_segment().to_string(),
        definition.key.to_string(),
    ])
}

fn with_extra(mut body: Map<String, Value>, extra: &Map<String, Value>) -> Value {
    for (key, value) in extra {
        body.entry(key.clone()).or_insert_with(|| value.clone());
    }
    Value::Object(body)
}

fn season_field(id: &str) -> Value {
    json!({ "Id": id })
}

fn image_date(date: NaiveDate) -> Value {
    json!({ "Date": date.to_string() })
}

/// Builds the call creating the field map described by `request`.
pub fn route_field_map(
    session: &SessionContext,
    request: &FieldMapRequest,
) -> Result<OutboundRequest> {
    let definition = catalog::lookup(&request.product_key)?;
    validate_parameters(definition, request)?;

    if definition.family == MapFamily::Difference {
        return Err(missing(definition, "latest image date"));
    }

    let outbound = match definition.request_shape {
        RequestShape::CoverageImage => {
            OutboundRequest::get(session.full_url(&coverage_image_segments(definition, request)?))
        }
        RequestShape::Nitrogen => {
            let n_planned = request
                .n_planned
                .ok_or_else(|| missing(definition, "n_planned"))?;
            let mut segments = coverage_image_segments(definition, request)?;
            segments.push("n-planned".to_string());
            segments.push(format_path_number(n_planned));
            OutboundRequest::get(session.full_url(&segments))
        }
        RequestShape::YieldVariability => {
            let average = request
                .yield_average
                .ok_or_else(|| missing(definition, "yield_average"))?;
            let mut segments = coverage_image_segments(definition, request)?;
            segments.push("historical-yield-average".to_string());
            segments.push(format_path_number(average));
            OutboundRequest::get(session.full_url(&segments))
        }
        RequestShape::YieldGoal => {
            let average = request
                .yield_average
                .ok_or_else(|| missing(definition, "yield_average"))?;
            let max_yield = request
                .max_yield
                .ok_or_else(|| missing(definition, "max_yield"))?;
            let min_yield = request
                .min_yield
                .ok_or_else(|| missing(definition, "min_yield"))?;
            let mut segments = coverage_image_segments(definition, request)?;
            segments.extend([
                "historical-yield-average".to_string(),
                format_path_number(average),
                "max-yield-Goal".to_string(),
                format_path_number(max_yield),
                "min-yield-Goal".to_string(),
                format_path_number(min_yield),
            ]);
            OutboundRequest::get(session.full_url(&segments))
        }
        RequestShape::ManagementZones => OutboundRequest::get(session.full_url(&[
            "season-fields",
            request.season_field_id.as_str(),
            "management-zones-map",
            definition.key,
        ])),
        RequestShape::Soil => {
            // The provider only serves soil maps from its shared asset, so
            // geometry, date and extra fields are dropped.
            let body = json!({
                "provider": SOIL_PROVIDER,
                "asset": SOIL_ASSET,
                "seasonField": { "id": request.season_field_id },
            });
            OutboundRequest::post(
                session.full_url(&["maps", definition.path_segment(), definition.key]),
                body,
            )
        }
        RequestShape::Default => {
            let mut body = Map::new();
            body.insert(
                "SeasonField".to_string(),
                season_field(&request.season_field_id),
            );
            body.insert("Image".to_string(), image_date(request.image_date));
            OutboundRequest::post(
                session.full_url(&["maps", definition.path_segment(), definition.key]),
                with_extra(body, &request.extra),
            )
        }
    };
    Ok(outbound)
}

/// Builds the difference map call for `product_key` between two dates.
///
/// Dates are reordered so that `EarliestImage` is never after
/// `LatestImage`, and the product's registered difference map is used as
/// the outbound key.
pub fn route_difference_map(
    session: &SessionContext,
    product_key: &str,
    season_field_id: &str,
    earliest: NaiveDate,
    latest: NaiveDate,
    extra: &Map<String, Value>,
) -> Result<OutboundRequest> {
    let difference = catalog::difference_of(product_key)?;
    let (earliest, latest) = ordered_dates(earliest, latest);

    let mut body = Map::new();
    body.insert("SeasonField".to_string(), season_field(season_field_id));
    body.insert("EarliestImage".to_string(), image_date(earliest));
    body.insert("LatestImage".to_string(), image_date(latest));

    Ok(OutboundRequest::post(
        session.full_url(&["maps", difference.path_segment(), difference.key]),
        with_extra(body, extra),
    ))
}

/// Builds the management-zone map call over several image dates.
pub fn route_management_zone_map(
    session: &SessionContext,
    season_field_id: &str,
    image_dates: &[NaiveDate],
    extra: &Map<String, Value>,
) -> Result<OutboundRequest> {
    let definition = catalog::lookup(SAMZ)?;
    if image_dates.is_empty() {
        return Err(missing(definition, "image_dates"));
    }

    let mut body = Map::new();
    body.insert("SeasonField".to_string(), season_field(season_field_id));
    body.insert(
        "Images".to_string(),
        Value::Array(image_dates.iter().map(|d| image_date(*d)).collect()),
    );

    Ok(OutboundRequest::post(
        session.full_url(&["maps", definition.path_segment(), definition.key]),
        with_extra(body, extra),
    ))
}

/// Builds the coverage or catalog-imagery search call.
pub fn coverage_search_request(
    session: &SessionContext,
    query: &CoverageQuery,
    kind: SearchKind,
) -> Result<OutboundRequest> {
    let endpoint = match kind {
        SearchKind::Coverage => "coverage",
        SearchKind::CatalogImagery => "catalog-imagery",
    };

    let body = json!({
        "Geometry": query.geometry,
        "Crop": { "Id": query.crop },
        "SowingDate": query.sowing_date.to_string(),
    });
    let mut request = OutboundRequest::post(session.full_url(&["season-fields", endpoint]), body);

    if let Some(product) = query.map_product.as_deref() {
        let definition = catalog::lookup(product)?;
        request.params.push((
            MAPS_TYPE.to_string(),
            search_product_key(definition).to_string(),
        ));
    }
    if let Some(sensor) = query.sensor.as_deref().filter(|s| !s.is_empty()) {
        request
            .params
            .push((IMAGE_SENSOR.to_string(), sensor.to_string()));
    }
    if let Some(range) = query.date_range {
        request
            .params
            .push((IMAGE_DATE.to_string(), range.filter_value()));
    }
    Ok(request)
}
