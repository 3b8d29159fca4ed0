use std::path::Path;

use chrono::NaiveDate;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::collect::http::{status_message, HttpClient, HttpResponse};
use crate::collect::session::SessionContext;
use crate::download::downloader::{self, DownloadOutcome};
use crate::error::{GeosysError, Result};
use crate::products::catalog;
use crate::products::router::{self, Method, OutboundRequest};
use crate::products::types::{
    CoverageQuery, CoverageResult, FieldMapRequest, FieldMapResult, OutputFormat, SearchKind,
    ZoningParams,
};

/// Client for the Bridge field-level-maps API.
///
/// Holds the transport and the read-only session of one pipeline run.
/// Requests are built by [`router`]; this type only executes them and
/// interprets the responses.
pub struct BridgeCollect<C: HttpClient> {
    client: C,
    session: SessionContext,
}

impl<C: HttpClient> BridgeCollect<C> {
    pub fn new(client: C, session: SessionContext) -> Self {
        Self { client, session }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn execute(&self, request: &OutboundRequest) -> Result<HttpResponse> {
        let authorization = self.session.authorization();
        let headers = [
            ("Authorization", authorization.as_str()),
            ("Accept", "application/json"),
        ];
        let params = request.param_pairs();
        match request.method {
            Method::Post => {
                let body = request.body.as_ref().unwrap_or(&Value::Null);
                self.client.post_json(&request.url, &headers, &params, body)
            }
            Method::Get => self.client.get(&request.url, &headers, &params),
        }
    }

    fn search(&self, query: &CoverageQuery, kind: SearchKind) -> Result<Vec<CoverageResult>> {
        let request = router::coverage_search_request(&self.session, query, kind)?;
        info!(url = %request.url, "Searching coverage");
        let response = self.execute(&request)?;
        let body = response.json();

        if let Some(message) = body.get("message").and_then(Value::as_str) {
            return Err(GeosysError::Remote(message.to_string()));
        }
        if !response.is_success() {
            return Err(GeosysError::Http(status_message(response.status)));
        }
        let results: Vec<CoverageResult> = serde_json::from_value(body)
            .map_err(|e| GeosysError::InvalidResponse(format!("coverage list: {}", e)))?;
        debug!(count = results.len(), "Coverage search finished");
        Ok(results)
    }

    /// Lists coverages of the field geometry through the coverage endpoint.
    pub fn search_coverage(&self, query: &CoverageQuery) -> Result<Vec<CoverageResult>> {
        self.search(query, SearchKind::Coverage)
    }

    /// Lists coverages through the imagery catalog (reflectance, red edge).
    pub fn search_catalog_imagery(&self, query: &CoverageQuery) -> Result<Vec<CoverageResult>> {
        self.search(query, SearchKind::CatalogImagery)
    }

    /// Searches through the endpoint registered for the query's product.
    pub fn search_for_product(&self, query: &CoverageQuery) -> Result<Vec<CoverageResult>> {
        let kind = match query.map_product.as_deref() {
            Some(key) => catalog::lookup(key)?.search,
            None => SearchKind::Coverage,
        };
        self.search(query, kind)
    }

    fn field_map(&self, request: &OutboundRequest) -> Result<FieldMapResult> {
        info!(url = %request.url, "Requesting field map");
        let response = self.execute(request)?;
        let body = response.json();
        if !response.is_success() && body.is_null() {
            return Err(GeosysError::Http(status_message(response.status)));
        }
        let result = FieldMapResult::from_response(&body);
        if !result.is_success() {
            warn!(
                status = response.status,
                reason = result.error_message.as_deref().unwrap_or(""),
                "Field map request failed"
            );
        }
        Ok(result)
    }

    /// Creates the map described by `request`.
    ///
    /// A service-side failure is returned as an unsuccessful
    /// [`FieldMapResult`]; only configuration and transport problems are
    /// errors.
    pub fn request_field_map(&self, request: &FieldMapRequest) -> Result<FieldMapResult> {
        let outbound = router::route_field_map(&self.session, request)?;
        let mut result = self.field_map(&outbound)?;
        result.product_key = request.product_key.clone();
        result.image_date = Some(request.image_date);
        result.image_id = request.image_id.clone();
        Ok(result)
    }

    pub fn request_difference_map(
        &self,
        product_key: &str,
        season_field_id: &str,
        earliest: NaiveDate,
        latest: NaiveDate,
        extra: &Map<String, Value>,
    ) -> Result<FieldMapResult> {
        let outbound = router::route_difference_map(
            &self.session,
            product_key,
            season_field_id,
            earliest,
            latest,
            extra,
        )?;
        let mut result = self.field_map(&outbound)?;
        result.product_key = catalog::difference_of(product_key)?.key.to_string();
        result.image_date = Some(earliest.max(latest));
        Ok(result)
    }

    pub fn request_management_zone_map(
        &self,
        season_field_id: &str,
        image_dates: &[NaiveDate],
        extra: &Map<String, Value>,
    ) -> Result<FieldMapResult> {
        let outbound =
            router::route_management_zone_map(&self.session, season_field_id, image_dates, extra)?;
        let mut result = self.field_map(&outbound)?;
        result.product_key = catalog::SAMZ.to_string();
        result.image_date = image_dates.iter().max().copied();
        Ok(result)
    }

    /// Downloads the preview image at `url`.
    pub fn fetch_thumbnail(&self, url: &str) -> Result<Vec<u8>> {
        let authorization = self.session.authorization();
        self.client
            .fetch_bytes(url, &[("Authorization", authorization.as_str())])
    }

    pub fn download_artifact(
        &self,
        result: &FieldMapResult,
        format: OutputFormat,
        destination_base: &Path,
        zoning: Option<&ZoningParams>,
    ) -> DownloadOutcome {
        downloader::download_artifact(
            &self.client,
            &self.session,
            result,
            format,
            destination_base,
            zoning,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::http::tests::MockHttpClient;
    use serde_json::json;

    const BASE: &str = "https://bridge.test/field-level-maps/v4";

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn bridge(mock: MockHttpClient) -> BridgeCollect<MockHttpClient> {
        BridgeCollect::new(mock, SessionContext::new("token", "https://bridge.test"))
    }

    fn query(product: Option<&str>) -> CoverageQuery {
        CoverageQuery {
            geometry: "POLYGON((0 0,1 0,1 1,0 0))".to_string(),
            crop: "CORN".to_string(),
            sowing_date: date("2021-04-01"),
            map_product: product.map(str::to_string),
            sensor: None,
            date_range: None,
        }
    }

    #[test]
    fn test_search_coverage_parses_list() {
        let mock = MockHttpClient::new().with_json(
            &format!("{}/season-fields/coverage", BASE),
            json!([
                {"seasonField": {"id": "sf1"}, "image": {"date": "2021-06-01", "sensor": "SENTINEL_2"},
                 "maps": [{"type": "INSEASON_NDVI", "_links": {"thumbnail": "https://t/1.png"}}],
                 "coverageType": "CLEAR"},
                {"seasonField": {"id": "sf1"}, "image": {"date": "2021-06-11", "sensor": "LANDSAT_8"},
                 "coverageType": "CLOUDY"}
            ]),
        );
        let bridge = bridge(mock);
        let results = bridge.search_coverage(&query(Some("INSEASON_NDVI"))).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].image.sensor, "LANDSAT_8");

        let recorded = bridge.client().recorded();
        assert_eq!(recorded[0].method, "POST");
        assert_eq!(
            recorded[0].params,
            vec![("Maps.Type".to_string(), "INSEASON_NDVI".to_string())]
        );
    }

    #[test]
    fn test_search_message_is_remote_error() {
        let mock = MockHttpClient::new().with_json(
            &format!("{}/season-fields/catalog-imagery", BASE),
            json!({"message": "Geometry is invalid"}),
        );
        let err = bridge(mock)
            .search_catalog_imagery(&query(None))
            .unwrap_err();
        assert_eq!(err.to_string(), "Geometry is invalid");
    }

    #[test]
    fn test_search_for_product_uses_catalog_endpoint() {
        let mock = MockHttpClient::new()
            .with_json(&format!("{}/season-fields/catalog-imagery", BASE), json!([]));
        let bridge = bridge(mock);
        assert!(bridge
            .search_for_product(&query(Some("REFLECTANCE")))
            .unwrap()
            .is_empty());
        let recorded = bridge.client().recorded();
        assert_eq!(recorded[0].params[0].1, "INSEASON_NDVI");
    }

    #[test]
    fn test_unknown_product_makes_no_call() {
        let bridge = bridge(MockHttpClient::new());
        let request = FieldMapRequest::new("UNKNOWN", "sf1", date("2021-06-01"));
        assert!(bridge.request_field_map(&request).is_err());
        assert!(bridge.client().recorded().is_empty());
    }

    #[test]
    fn test_request_field_map_success() {
        let mock = MockHttpClient::new().with_json(
            &format!("{}/maps/base-reference-map/INSEASON_NDVI", BASE),
            json!({
                "seasonField": {"id": "sf1"},
                "_links": {"image:image/png": "https://x/map.png"}
            }),
        );
        let bridge = bridge(mock);
        let request = FieldMapRequest::new("INSEASON_NDVI", "sf1", date("2021-06-01"));
        let result = bridge.request_field_map(&request).unwrap();
        assert!(result.is_success());
        assert_eq!(result.product_key, "INSEASON_NDVI");
        assert_eq!(result.links["image:image/png"], "https://x/map.png");
    }

    #[test]
    fn test_request_field_map_failure_keeps_message() {
        let mock = MockHttpClient::new().with(
            &format!("{}/maps/base-reference-map/INSEASON_NDVI", BASE),
            400,
            json!({"message": "No image for this date"}).to_string(),
        );
        let request = FieldMapRequest::new("INSEASON_NDVI", "sf1", date("2021-06-01"));
        let result = bridge(mock).request_field_map(&request).unwrap();
        assert!(!result.is_success());
        assert_eq!(
            result.into_checked().unwrap_err().to_string(),
            "Field map request failed. No image for this date"
        );
    }

    #[test]
    fn test_request_field_map_transport_failure() {
        let request = FieldMapRequest::new("INSEASON_NDVI", "sf1", date("2021-06-01"));
        let err = bridge(MockHttpClient::new())
            .request_field_map(&request)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transport);
    }

    #[test]
    fn test_request_difference_map() {
        let mock = MockHttpClient::new().with_json(
            &format!("{}/maps/difference-map/DIFFERENCE_INSEASON_NDVI", BASE),
            json!({"seasonField": {"id": "sf1"}, "_links": {}}),
        );
        let bridge = bridge(mock);
        let result = bridge
            .request_difference_map(
                "INSEASON_NDVI",
                "sf1",
                date("2021-11-30"),
                date("2021-09-18"),
                &Map::new(),
            )
            .unwrap();
        assert_eq!(result.product_key, "DIFFERENCE_INSEASON_NDVI");
        assert_eq!(result.image_date, Some(date("2021-11-30")));
        let body = bridge.client().recorded()[0].body.clone().unwrap();
        assert_eq!(body["EarliestImage"]["Date"], "2021-09-18");
    }

    #[test]
    fn test_request_management_zone_map() {
        let mock = MockHttpClient::new().with_json(
            &format!("{}/maps/management-zones-map/SAMZ", BASE),
            json!({"seasonField": {"id": "sf1"}, "_links": {"self": "https://x/samz"}}),
        );
        let result = bridge(mock)
            .request_management_zone_map(
                "sf1",
                &[date("2021-06-01"), date("2021-07-01")],
                &Map::new(),
            )
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.image_date, Some(date("2021-07-01")));
    }

    #[test]
    fn test_fetch_thumbnail() {
        let mock = MockHttpClient::new().with("https://t/1.png", 200, vec![0x89, 0x50]);
        assert_eq!(
            bridge(mock).fetch_thumbnail("https://t/1.png").unwrap(),
            vec![0x89, 0x50]
        );
    }
}
