/// Version of the field-level-maps API this crate speaks.
pub const FIELD_LEVEL_MAPS_VERSION: u32 = 4;

/// Identity server origins, indexed by region then environment.
pub const IDENTITY_URLS: [(&str, &str, &str); 2] = [
    (
        "na",
        "https://identity.preprod.geosys-na.com",
        "https://identity.geosys-na.com",
    ),
    (
        "eu",
        "https://identity.preprod.geosys-eu.com",
        "https://identity.geosys-eu.com",
    ),
];

/// Bridge server origins, indexed by region then environment.
pub const BRIDGE_URLS: [(&str, &str, &str); 2] = [
    (
        "na",
        "https://bridge.preprod.geosys-na.com",
        "https://bridge.geosys-na.com",
    ),
    (
        "eu",
        "https://bridge.preprod.geosys-eu.com",
        "https://bridge.geosys-eu.com",
    ),
];

pub const IDENTITY_API_VERSION: &str = "2.1";
pub const GRANT_TYPE: &str = "password";
pub const SCOPE: &str = "openid offline_access";

// Coverage filters (query parameter names)
pub const IMAGE_DATE: &str = "Image.Date";
pub const IMAGE_SENSOR: &str = "Image.Sensor";
pub const MAPS_TYPE: &str = "Maps.Type";

// Link keys found in `_links` besides the output formats
pub const SELF_LINK: &str = "self";
pub const THUMBNAIL: &str = "thumbnail";

// Fixed body of the soil map request (provider-side workaround)
pub const SOIL_PROVIDER: &str = "Shared";
pub const SOIL_ASSET: &str = "USA";

// Thumbnail templates. `{root}` is the versioned field-level-maps root
// of the session.

/// Thumbnail for products whose coverage entry is looked up through NDVI
/// (reflectance, soil). Keyed by season field and image date.
pub const NDVI_DATE_THUMBNAIL_TEMPLATE: &str = "{root}/season-fields/{season_field_id}/coverage/{image_date}/base-reference-map/INSEASON_NDVI/thumbnail.png";

/// Thumbnail for index products whose links are not populated. Keyed by
/// season field and image id.
pub const IMAGE_ID_THUMBNAIL_TEMPLATE: &str = "{root}/season-fields/{season_field_id}/coverage/{image_id}/base-reference-map/{product}/thumbnail.png";

/// Thumbnail for nitrogen model products, embedding the planned nitrogen.
pub const NITROGEN_THUMBNAIL_TEMPLATE: &str = "{root}/season-fields/{season_field_id}/coverage/{image_id}/model-map/{product}/n-planned/{n_planned}/thumbnail.png";

/// Looks up the origin for `region` in one of the URL tables.
pub fn server_url(
    table: &[(&'static str, &'static str, &'static str)],
    region: &str,
    use_testing_service: bool,
) -> Option<&'static str> {
    table
        .iter()
        .find(|(key, _, _)| *key == region)
        .map(|(_, test, prod)| if use_testing_service { *test } else { *prod })
}

/// Fills `{name}` placeholders of a URL template.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{}}}", name), value)
    })
}
