//! Static registry of map products, crops, sensors and regions.
//!
//! The table is immutable: every product carries the request shape, search
//! endpoint and thumbnail rule it needs, so callers dispatch on those tags
//! instead of comparing keys.

use crate::error::{GeosysError, Result};
use crate::products::types::{
    MapFamily, MapProductDefinition, RequestShape, SearchKind, ThumbnailRule,
};

pub const INSEASON_NDVI: &str = "INSEASON_NDVI";
pub const REFLECTANCE: &str = "REFLECTANCE";
pub const SAMZ: &str = "SAMZ";
pub const COLOR_COMPOSITION: &str = "COLORCOMPOSITION";
pub const ELEVATION: &str = "ELEVATION";

const fn product(
    key: &'static str,
    family: MapFamily,
    description: &'static str,
) -> MapProductDefinition {
    MapProductDefinition {
        key,
        family,
        display_name: key,
        description,
        difference_product_key: None,
        request_shape: RequestShape::Default,
        search: SearchKind::Coverage,
        search_product_key: None,
        thumbnail: ThumbnailRule::FromLinks,
        untyped_coverage: false,
        has_legend: true,
    }
}

const fn nitrogen(key: &'static str) -> MapProductDefinition {
    MapProductDefinition {
        request_shape: RequestShape::Nitrogen,
        thumbnail: ThumbnailRule::Nitrogen,
        ..product(
            key,
            MapFamily::Model,
            "Nitrogen model map parameterized by the planned nitrogen.",
        )
    }
}

static PRODUCTS: [MapProductDefinition; 30] = [
    // Difference maps
    product(
        "DIFFERENCE_INSEASON_NDVI",
        MapFamily::Difference,
        "Change of the in-season NDVI between two images.",
    ),
    product(
        "DIFFERENCE_INSEASON_EVI",
        MapFamily::Difference,
        "Change of the in-season EVI between two images.",
    ),
    // NDVI
    product("NDVI", MapFamily::BaseReference, ""),
    MapProductDefinition {
        difference_product_key: Some("DIFFERENCE_INSEASON_NDVI"),
        ..product(
            INSEASON_NDVI,
            MapFamily::BaseReference,
            "Provides the in-season Normalized Difference Vegetation Index.",
        )
    },
    product("INSEASONPARTIAL_NDVI", MapFamily::BaseReference, ""),
    nitrogen("INSEASONFIELD_AVERAGE_NDVI"),
    nitrogen("INSEASONFIELD_AVERAGE_REVERSE_NDVI"),
    // EVI
    product("EVI", MapFamily::BaseReference, ""),
    MapProductDefinition {
        difference_product_key: Some("DIFFERENCE_INSEASON_EVI"),
        ..product(
            "INSEASON_EVI",
            MapFamily::BaseReference,
            "Provides the in-season Enhanced Vegetation Index.",
        )
    },
    product("INSEASONPARTIAL_EVI", MapFamily::BaseReference, ""),
    // CVI
    product("CVI", MapFamily::BaseReference, ""),
    product(
        "INSEASON_CVI",
        MapFamily::BaseReference,
        "Provides the in-season Chlorophyll Vegetation Index. It is used as an \
         indicator of photosynthetic energy conversion.",
    ),
    MapProductDefinition {
        request_shape: RequestShape::CoverageImage,
        thumbnail: ThumbnailRule::ByImageId,
        ..product(
            "INSEASON_CVIN",
            MapFamily::BaseReference,
            "Provides the in-season normalized Chlorophyll Vegetation Index.",
        )
    },
    // GNDVI
    product("GNDVI", MapFamily::BaseReference, ""),
    product(
        "INSEASON_GNDVI",
        MapFamily::BaseReference,
        "Provides the in-season Green Normalized Difference Vegetation Index.",
    ),
    // Red edge
    MapProductDefinition {
        request_shape: RequestShape::CoverageImage,
        search: SearchKind::CatalogImagery,
        thumbnail: ThumbnailRule::ByImageId,
        ..product(
            "INSEASON_S2REP",
            MapFamily::BaseReference,
            "Provides the in-season Sentinel-2 Red-Edge Position index.",
        )
    },
    // LAI
    product(
        "INSEASON_LAI",
        MapFamily::BaseReference,
        "Provides the in-season Leaf Area Index. The LAI is a dimensionless \
         value ranging from 0 (bare ground) to over 10 (dense conifer forests).",
    ),
    product("INSEASONCANOPY_N_REVERSE_LAI", MapFamily::Model, ""),
    nitrogen("INSEASONFIELD_AVERAGE_LAI"),
    nitrogen("INSEASONFIELD_AVERAGE_REVERSE_LAI"),
    // Organic matter
    product("OM", MapFamily::OrganicMatter, ""),
    // Yield
    MapProductDefinition {
        request_shape: RequestShape::YieldGoal,
        ..product("YGM", MapFamily::YieldGoal, "")
    },
    MapProductDefinition {
        request_shape: RequestShape::YieldVariability,
        ..product("YPM", MapFamily::YieldVariability, "")
    },
    // Management zones
    MapProductDefinition {
        request_shape: RequestShape::ManagementZones,
        ..product(SAMZ, MapFamily::ManagementZones, "")
    },
    // Color composition has no legend
    MapProductDefinition {
        has_legend: false,
        ..product(COLOR_COMPOSITION, MapFamily::BaseReference, "")
    },
    // Topology
    MapProductDefinition {
        untyped_coverage: true,
        ..product(ELEVATION, MapFamily::Topology, "")
    },
    product("EROSION", MapFamily::Topology, ""),
    product("SLOPE", MapFamily::Topology, ""),
    // Soil and reflectance search through the NDVI coverage
    MapProductDefinition {
        request_shape: RequestShape::Soil,
        search_product_key: Some(INSEASON_NDVI),
        thumbnail: ThumbnailRule::NdviByDate,
        ..product("SOILMAP", MapFamily::Soil, "Soil map from the shared USA asset.")
    },
    MapProductDefinition {
        request_shape: RequestShape::CoverageImage,
        search: SearchKind::CatalogImagery,
        search_product_key: Some(INSEASON_NDVI),
        thumbnail: ThumbnailRule::NdviByDate,
        ..product(
            REFLECTANCE,
            MapFamily::Reflectance,
            "Surface reflectance bands of the image.",
        )
    },
];

pub const ARCHIVE_MAP_PRODUCTS: &[&str] = &[
    "INSEASON_NDVI",
    "INSEASON_GNDVI",
    "INSEASON_EVI",
    "INSEASON_CVI",
    "INSEASONPARTIAL_NDVI",
    "INSEASONPARTIAL_EVI",
    "COLORCOMPOSITION",
    "ELEVATION",
    "OM",
    "YGM",
    "YPM",
    "SAMZ",
    "NDVI",
];

pub const BASIC_INSEASON_MAP_PRODUCTS: &[&str] = &[
    "INSEASON_NDVI",
    "INSEASON_EVI",
    "INSEASON_CVI",
    "INSEASON_GNDVI",
    "INSEASON_LAI",
];

pub const INSEASON_MAP_PRODUCTS: &[&str] = &[
    "INSEASON_NDVI",
    "INSEASON_EVI",
    "INSEASON_CVI",
    "INSEASON_GNDVI",
    "INSEASON_LAI",
    "INSEASONFIELD_AVERAGE_NDVI",
    "INSEASONFIELD_AVERAGE_REVERSE_NDVI",
    "INSEASONPARTIAL_NDVI",
    "INSEASONPARTIAL_EVI",
];

pub const DIFFERENCE_MAPS: &[&str] = &["DIFFERENCE_INSEASON_NDVI", "DIFFERENCE_INSEASON_EVI"];

/// Crop display name and service key.
pub const CROPS: &[(&str, &str)] = &[
    ("corn", "CORN"),
    ("cotton", "COTTON"),
    ("grapes", "GRAPES"),
    ("millet", "MILLET"),
    ("orange", "ORANGE"),
    ("others", "OTHERS"),
    ("peanut", "PEANUT"),
    ("rice", "RICE"),
    ("sugarcane", "SUGARCANE"),
    ("sunflower", "SUNFLOWER"),
    ("sorghum", "SORGHUM"),
    ("soybeans", "SOYBEANS"),
];

/// Sensor key and description.
pub const SENSORS: &[(&str, &str)] = &[
    ("DEIMOS", "Commercial data at 0.75 metre resolution."),
    (
        "DMC",
        "Images comparable to Landsat in resolution but with higher image intervals.",
    ),
    (
        "LANDSAT_8",
        "Providing moderate-resolution imagery, from 15 meters to 100 meters.",
    ),
    (
        "RESOURCESAT2",
        "LISS-III sensor at 23.5 meter and LISS-IV camera at 5.8 meter spatial resolution.",
    ),
    (
        "SENTINEL_2",
        "Spatial resolution of 10 m, 20 m and 60 m, revisiting every 5 days.",
    ),
];

/// Region key and description.
pub const REGIONS: &[(&str, &str)] = &[
    (
        "na",
        "US Platform - Fields located in USA, Canada, and Australia.",
    ),
    (
        "eu",
        "European Platform - Fields located in Europe, South America and South Africa.",
    ),
];

/// Every registered product, in table order.
pub fn all_products() -> &'static [MapProductDefinition] {
    &PRODUCTS
}

/// Case-sensitive exact lookup of a product key.
pub fn lookup(key: &str) -> Result<&'static MapProductDefinition> {
    PRODUCTS
        .iter()
        .find(|definition| definition.key == key)
        .ok_or_else(|| GeosysError::UnknownProduct(key.to_string()))
}

/// Resolves the difference map registered for `key`. A difference
/// product resolves to itself.
pub fn difference_of(key: &str) -> Result<&'static MapProductDefinition> {
    let definition = lookup(key)?;
    if definition.family == MapFamily::Difference {
        return Ok(definition);
    }
    let difference_key = definition
        .difference_product_key
        .ok_or_else(|| GeosysError::NoDifferenceMap {
            product: key.to_string(),
        })?;
    lookup(difference_key)
}

pub fn crop_key(name: &str) -> Option<&'static str> {
    CROPS
        .iter()
        .find(|(display, key)| display.eq_ignore_ascii_case(name) || *key == name)
        .map(|(_, key)| *key)
}
