//! Preview URL resolution for coverage search results.
//!
//! Several products come back with unusable thumbnail links; for those the
//! URL is synthesized from a template (see [`ThumbnailRule`]).

use crate::collect::global_variables::{
    fill_template, IMAGE_ID_THUMBNAIL_TEMPLATE, NDVI_DATE_THUMBNAIL_TEMPLATE,
    NITROGEN_THUMBNAIL_TEMPLATE, THUMBNAIL,
};
use crate::collect::session::SessionContext;
use crate::commons::basic_functions::format_path_number;
use crate::products::types::{AvailableMap, CoverageResult, MapProductDefinition, ThumbnailRule};

/// Product key to search coverage with. Soil and reflectance reuse NDVI.
pub fn search_product_key(definition: &MapProductDefinition) -> &'static str {
    definition.search_product_key.unwrap_or(definition.key)
}

/// First available map typed as the product, or the first map at all when
/// the product's coverage entries are untyped (elevation).
pub fn select_map<'a>(
    coverage: &'a CoverageResult,
    definition: &MapProductDefinition,
) -> Option<&'a AvailableMap> {
    if definition.untyped_coverage {
        return coverage.available_maps.first();
    }
    let key = search_product_key(definition);
    coverage
        .available_maps
        .iter()
        .find(|map| map.map_type == key)
}

fn linked_thumbnail(coverage: &CoverageResult, definition: &MapProductDefinition) -> Option<String> {
    select_map(coverage, definition)
        .and_then(|map| map.links.get(THUMBNAIL))
        .cloned()
}

/// Preview URL for `coverage`, `None` when nothing usable exists.
///
/// `n_planned` only matters for nitrogen products, whose preview embeds
/// the exact value the map would be requested with.
pub fn resolve_thumbnail_url(
    coverage: &CoverageResult,
    definition: &MapProductDefinition,
    session: &SessionContext,
    n_planned: f64,
) -> Option<String> {
    let image_date = coverage.image.date.to_string();
    let root = session.field_level_maps_url();
    match definition.thumbnail {
        ThumbnailRule::FromLinks => linked_thumbnail(coverage, definition),
        ThumbnailRule::NdviByDate => Some(fill_template(
            NDVI_DATE_THUMBNAIL_TEMPLATE,
            &[
                ("root", &root),
                ("season_field_id", &coverage.season_field_id),
                ("image_date", &image_date),
            ],
        )),
        ThumbnailRule::ByImageId => match coverage.image.id.as_deref() {
            Some(image_id) => Some(fill_template(
                IMAGE_ID_THUMBNAIL_TEMPLATE,
                &[
                    ("root", &root),
                    ("season_field_id", &coverage.season_field_id),
                    ("image_id", image_id),
                    ("product", definition.key),
                ],
            )),
            None => linked_thumbnail(coverage, definition),
        },
        ThumbnailRule::Nitrogen => match coverage.image.id.as_deref() {
            Some(image_id) if n_planned.is_finite() => Some(fill_template(
                NITROGEN_THUMBNAIL_TEMPLATE,
                &[
                    ("root", &root),
                    ("season_field_id", &coverage.season_field_id),
                    ("image_id", image_id),
                    ("product", definition.key),
                    ("n_planned", &format_path_number(n_planned)),
                ],
            )),
            _ => linked_thumbnail(coverage, definition),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::catalog::lookup;
    use serde_json::json;

    fn session() -> SessionContext {
        SessionContext::new("token", "https://bridge.test")
    }

    fn coverage(maps: serde_json::Value, image_id: Option<&str>) -> CoverageResult {
        serde_json::from_value(json!({
            "seasonField": {"id": "sf1"},
            "image": {"date": "2021-06-01", "sensor": "SENTINEL_2", "id": image_id},
            "maps": maps,
            "coverageType": "CLEAR"
        }))
        .unwrap()
    }

    #[test]
    fn test_default_rule_uses_matching_entry() {
        let cov = coverage(
            json!([
                {"type": "INSEASON_EVI", "_links": {"thumbnail": "https://t/evi.png"}},
                {"type": "INSEASON_NDVI", "_links": {"thumbnail": "https://t/ndvi.png"}}
            ]),
            None,
        );
        let definition = lookup("INSEASON_NDVI").unwrap();
        assert_eq!(
            resolve_thumbnail_url(&cov, definition, &session(), 1.0).as_deref(),
            Some("https://t/ndvi.png")
        );
    }

    #[test]
    fn test_no_match_yields_empty_preview() {
        let cov = coverage(
            json!([{"type": "INSEASON_EVI", "_links": {"thumbnail": "https://t/evi.png"}}]),
            None,
        );
        let definition = lookup("INSEASON_GNDVI").unwrap();
        assert!(resolve_thumbnail_url(&cov, definition, &session(), 1.0).is_none());
    }

    #[test]
    fn test_elevation_takes_first_entry() {
        let cov = coverage(
            json!([
                {"type": "", "_links": {"thumbnail": "https://t/elev.png"}},
                {"type": "SLOPE", "_links": {"thumbnail": "https://t/slope.png"}}
            ]),
            None,
        );
        let definition = lookup("ELEVATION").unwrap();
        assert_eq!(
            select_map(&cov, definition).unwrap().links["thumbnail"],
            "https://t/elev.png"
        );
    }

    #[test]
    fn test_soil_and_reflectance_use_ndvi_template() {
        let cov = coverage(json!([]), Some("img9"));
        for key in ["SOILMAP", "REFLECTANCE"] {
            let definition = lookup(key).unwrap();
            assert_eq!(search_product_key(definition), "INSEASON_NDVI");
            assert_eq!(
                resolve_thumbnail_url(&cov, definition, &session(), 1.0).unwrap(),
                "https://bridge.test/field-level-maps/v4/season-fields/sf1/coverage/2021-06-01/base-reference-map/INSEASON_NDVI/thumbnail.png"
            );
        }
    }

    #[test]
    fn test_red_edge_uses_image_id() {
        let cov = coverage(json!([]), Some("img9"));
        let definition = lookup("INSEASON_S2REP").unwrap();
        assert_eq!(
            resolve_thumbnail_url(&cov, definition, &session(), 1.0).unwrap(),
            "https://bridge.test/field-level-maps/v4/season-fields/sf1/coverage/img9/base-reference-map/INSEASON_S2REP/thumbnail.png"
        );
    }

    #[test]
    fn test_nitrogen_thumbnail_embeds_value() {
        let cov = coverage(json!([]), Some("img9"));
        let definition = lookup("INSEASONFIELD_AVERAGE_LAI").unwrap();
        assert_eq!(
            resolve_thumbnail_url(&cov, definition, &session(), 1.0).unwrap(),
            "https://bridge.test/field-level-maps/v4/season-fields/sf1/coverage/img9/model-map/INSEASONFIELD_AVERAGE_LAI/n-planned/1.0/thumbnail.png"
        );
    }

    #[test]
    fn test_image_id_rule_without_id_falls_back_to_links() {
        let cov = coverage(
            json!([{"type": "INSEASON_CVIN", "_links": {"thumbnail": "https://t/cvin.png"}}]),
            None,
        );
        let definition = lookup("INSEASON_CVIN").unwrap();
        assert_eq!(
            resolve_thumbnail_url(&cov, definition, &session(), 1.0).as_deref(),
            Some("https://t/cvin.png")
        );
    }

    #[test]
    fn test_templates_follow_api_root() {
        let cov = coverage(json!([]), Some("img9"));
        let session = SessionContext::new("token", "https://other.test/");
        for key in ["SOILMAP", "INSEASON_S2REP", "INSEASONFIELD_AVERAGE_LAI"] {
            let url = resolve_thumbnail_url(&cov, lookup(key).unwrap(), &session, 1.0).unwrap();
            assert!(url.starts_with(&format!("{}/season-fields/", session.field_level_maps_url())));
        }
        for template in [
            NDVI_DATE_THUMBNAIL_TEMPLATE,
            IMAGE_ID_THUMBNAIL_TEMPLATE,
            NITROGEN_THUMBNAIL_TEMPLATE,
        ] {
            assert!(template.starts_with("{root}/") && !template.contains("field-level-maps"));
        }
    }

    #[test]
    fn test_nitrogen_non_finite_value_falls_back_to_links() {
        let cov = coverage(
            json!([{"type": "INSEASONFIELD_AVERAGE_LAI", "_links": {"thumbnail": "https://t/lai.png"}}]),
            Some("img9"),
        );
        let definition = lookup("INSEASONFIELD_AVERAGE_LAI").unwrap();
        for n_planned in [f64::NAN, f64::INFINITY] {
            assert_eq!(
                resolve_thumbnail_url(&cov, definition, &session(), n_planned).as_deref(),
                Some("https://t/lai.png")
            );
        }
    }
}
