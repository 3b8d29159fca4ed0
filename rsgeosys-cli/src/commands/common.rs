//! Arguments and helpers shared across CLI commands.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use chrono::NaiveDate;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use rsgeosys::collect::bridge::identity::request_access_token;
use rsgeosys::collect::http::ReqwestClient;
use rsgeosys::config::Settings;
use rsgeosys::download::zones::{self, LayerFormat};
use rsgeosys::geo_core::{BoundingBox, FieldGeometry};
use rsgeosys::products::catalog;
use rsgeosys::products::types::{FieldMapResult, OutputFormat, ZoningParams};
use rsgeosys::{BridgeCollect, SessionContext};
use serde_json::{Map, Value};
use tracing::{debug, info};

pub type Bridge = BridgeCollect<ReqwestClient>;

/// Flags accepted by every command.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: ~/.rsgeosys/config.ini)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Use this access token instead of authenticating with the credentials
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Bridge server origin overriding the configured region
    #[arg(long, global = true, value_name = "URL")]
    pub server: Option<String>,
}

/// Where the field is and what grows on it.
#[derive(Debug, Args)]
pub struct FieldArgs {
    /// Field geometry file (GeoJSON or WKT)
    #[arg(long, value_name = "FILE", conflicts_with_all = ["wkt", "bbox"])]
    pub geometry: Option<PathBuf>,

    /// Field geometry as WKT text
    #[arg(long, conflicts_with = "bbox")]
    pub wkt: Option<String>,

    /// Field bounding box as min_lon,min_lat,max_lon,max_lat
    #[arg(long, allow_hyphen_values = true)]
    pub bbox: Option<String>,

    /// Crop name or key (e.g. corn, SOYBEANS)
    #[arg(long)]
    pub crop: String,

    /// Sowing date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub sowing_date: NaiveDate,
}

impl FieldArgs {
    /// The field geometry as WKT.
    pub fn geometry_wkt(&self) -> anyhow::Result<String> {
        let geometry = if let Some(path) = &self.geometry {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read geometry file {}", path.display()))?;
            if text.trim_start().starts_with('{') {
                FieldGeometry::from_geojson_str(&text)?
            } else {
                FieldGeometry::from_wkt(&text)?
            }
        } else if let Some(wkt) = &self.wkt {
            FieldGeometry::from_wkt(wkt)?
        } else if let Some(bbox) = &self.bbox {
            FieldGeometry::from_bbox(BoundingBox::parse(bbox)?)
        } else {
            bail!("One of --geometry, --wkt or --bbox is required");
        };
        Ok(geometry.to_wkt())
    }

    pub fn crop_key(&self) -> anyhow::Result<&'static str> {
        catalog::crop_key(&self.crop).ok_or_else(|| {
            let known: Vec<&str> = catalog::CROPS.iter().map(|(name, _)| *name).collect();
            anyhow!("Unknown crop '{}', expected one of: {}", self.crop, known.join(", "))
        })
    }
}

/// Zoning and hotspot options of vector artifacts.
#[derive(Debug, Args)]
pub struct ZoningArgs {
    /// Ask the service to split the map into zones
    #[arg(long)]
    pub zoning: bool,

    /// Number of zones (default from config)
    #[arg(long, value_name = "N")]
    pub zone_count: Option<u32>,

    /// Also compute hotspots
    #[arg(long)]
    pub hotspot: bool,

    /// Compute hotspots per polygon instead of per field
    #[arg(long)]
    pub segmentation: bool,

    /// Hotspot position (e.g. PointOnSurface)
    #[arg(long, value_name = "POSITION")]
    pub hotspot_position: Option<String>,

    /// Hotspot filter (e.g. Min, Max)
    #[arg(long, value_name = "FILTER")]
    pub hotspot_filter: Option<String>,
}

impl ZoningArgs {
    /// None unless zoning or hotspots were asked for.
    pub fn to_params(&self, default_zone_count: u32) -> Option<ZoningParams> {
        if !self.zoning && !self.hotspot {
            return None;
        }
        Some(ZoningParams {
            zone_count: self.zone_count.unwrap_or(default_zone_count),
            zoning: self.zoning,
            hotspot: self.hotspot,
            zoning_segmentation: self.segmentation,
            position: self.hotspot_position.clone(),
            filter: self.hotspot_filter.clone(),
        })
    }
}

/// Artifact download options.
#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Artifact formats to download (repeatable)
    #[arg(long = "format", value_parser = parse_output_format, default_value = "png")]
    pub formats: Vec<OutputFormat>,

    /// Directory receiving the artifacts
    #[arg(long, short, default_value = ".")]
    pub output: PathBuf,

    /// Format of zone and hotspot layers (default from config)
    #[arg(long, value_parser = parse_layer_format)]
    pub layer_format: Option<LayerFormat>,

    /// Additional request body field as KEY=VALUE (repeatable)
    #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
    pub fields: Vec<(String, Value)>,
}

impl OutputArgs {
    pub fn extra(&self) -> Map<String, Value> {
        self.fields.iter().cloned().collect()
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("invalid date '{}': {}", s, e))
}

fn parse_output_format(s: &str) -> Result<OutputFormat, String> {
    s.parse()
}

fn parse_layer_format(s: &str) -> Result<LayerFormat, String> {
    s.parse()
}

/// `KEY=VALUE`, where VALUE is kept as JSON when it parses as JSON.
fn parse_field(s: &str) -> Result<(String, Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let settings = Settings::load_from(path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    debug!(path = %path.display(), region = %settings.bridge.region, "Settings loaded");
    Ok(settings)
}

/// Builds an authenticated bridge client routed through the configured
/// proxy.
pub fn connect(global: &GlobalArgs, settings: &Settings) -> anyhow::Result<Bridge> {
    let proxy = settings.proxy.is_enabled().then_some(&settings.proxy);
    let (identity_server, bridge_server) = settings.session_urls()?;

    let token = match &global.token {
        Some(token) => token.clone(),
        None => {
            let client = ReqwestClient::new(proxy).context("Failed to create HTTP client")?;
            request_access_token(&client, identity_server, &settings.bridge.credentials)
                .context("Could not obtain an access token")?
        }
    };
    let base_url = global
        .server
        .clone()
        .unwrap_or_else(|| bridge_server.to_string());

    let mut session = SessionContext::new(token, base_url);
    if let Some(proxy) = proxy {
        session = session.with_proxy(proxy.clone());
    }
    let client = ReqwestClient::for_session(&session).context("Failed to create HTTP client")?;
    info!(server = %session.base_url, proxy = session.proxy.is_some(), "Connected");
    Ok(BridgeCollect::new(client, session))
}

pub fn spinner(message: impl Into<Cow<'static, str>>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("[{elapsed_precise}] {spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Downloads every requested format of `result` under `<output>/<name>`.
pub fn download_formats(
    bridge: &Bridge,
    result: &FieldMapResult,
    formats: &[OutputFormat],
    output: &Path,
    name: &str,
    zoning: Option<&ZoningParams>,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let base = output.join(name);

    let mut failures = Vec::new();
    for format in formats {
        let pb = spinner(format!("Downloading {}", format));
        let outcome = bridge.download_artifact(result, *format, &base, zoning);
        pb.finish_and_clear();
        if outcome.success {
            println!("{}: {}", format, outcome.message);
            for file in &outcome.files {
                println!("  {}", file.display());
            }
        } else {
            failures.push(format!("{}: {}", format, outcome.message));
        }
    }
    if !failures.is_empty() {
        bail!("Download failed\n{}", failures.join("\n"));
    }
    Ok(())
}

/// Extracts zone and hotspot layers when both were requested.
pub fn write_layers(
    bridge: &Bridge,
    result: &FieldMapResult,
    zoning: Option<&ZoningParams>,
    settings: &Settings,
    layer_format: Option<LayerFormat>,
) -> anyhow::Result<()> {
    let Some(zoning) = zoning.filter(|z| z.zoning && z.hotspot) else {
        return Ok(());
    };
    let layers = zones::extract_zones(bridge.client(), bridge.session(), result, zoning)
        .context("Failed to extract zones")?;
    if layers.is_empty() {
        println!("No zone layers returned");
        return Ok(());
    }
    let format = layer_format.unwrap_or(settings.output.layer_format);
    let written =
        zones::write_zone_layers(&layers, result, zoning, &settings.output.directory, format)?;
    for path in written {
        println!("Layer: {}", path.display());
    }
    Ok(())
}

/// Fails with the service message of an unsuccessful map request.
pub fn checked(result: FieldMapResult) -> anyhow::Result<FieldMapResult> {
    Ok(result.into_checked()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_field() {
        assert_eq!(
            parse_field("Image.Date=2021-06-01").unwrap(),
            ("Image.Date".to_string(), json!("2021-06-01"))
        );
        assert_eq!(parse_field("count=3").unwrap(), ("count".to_string(), json!(3)));
        assert!(parse_field("novalue").is_err());
    }

    #[test]
    fn test_zoning_params() {
        let args = ZoningArgs {
            zoning: true,
            zone_count: None,
            hotspot: true,
            segmentation: false,
            hotspot_position: None,
            hotspot_filter: Some("Max".to_string()),
        };
        let params = args.to_params(5).unwrap();
        assert_eq!(params.zone_count, 5);
        assert!(params.hotspot);
        assert_eq!(params.filter.as_deref(), Some("Max"));

        let none = ZoningArgs {
            zoning: false,
            hotspot: false,
            ..args
        };
        assert!(none.to_params(5).is_none());
    }

    #[test]
    fn test_field_geometry_from_bbox() {
        let args = FieldArgs {
            geometry: None,
            wkt: None,
            bbox: Some("0,0,1,1".to_string()),
            crop: "corn".to_string(),
            sowing_date: parse_date("2021-04-01").unwrap(),
        };
        assert!(args.geometry_wkt().unwrap().starts_with("POLYGON"));
        assert_eq!(args.crop_key().unwrap(), "CORN");
    }
}
