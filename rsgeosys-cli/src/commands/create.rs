//! Field map creation.

use std::path::Path;

use chrono::NaiveDate;
use clap::Args;
use rsgeosys::products::catalog;
use rsgeosys::products::types::{FieldMapRequest, RequestShape};
use tracing::debug;

use super::common::{self, parse_date, GlobalArgs, OutputArgs, ZoningArgs};

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Map product key (see `rsgeosys products`)
    #[arg(long)]
    pub product: String,

    /// Season field id
    #[arg(long)]
    pub season_field: String,

    /// Image date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub date: NaiveDate,

    /// Image id, required by coverage-image products
    #[arg(long)]
    pub image_id: Option<String>,

    /// Planned nitrogen for nitrogen products (default from config)
    #[arg(long)]
    pub n_planned: Option<f64>,

    /// Historical yield average (yield products)
    #[arg(long)]
    pub yield_average: Option<f64>,

    /// Minimum yield goal
    #[arg(long)]
    pub min_yield: Option<f64>,

    /// Maximum yield goal
    #[arg(long)]
    pub max_yield: Option<f64>,

    #[command(flatten)]
    pub zoning: ZoningArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

pub fn run(global: &GlobalArgs, config: &Path, args: CreateArgs) -> anyhow::Result<()> {
    let settings = common::load_settings(config)?;
    let definition = catalog::lookup(&args.product)?;
    let zoning = args.zoning.to_params(settings.defaults.zone_count);

    let mut request = FieldMapRequest::new(definition.key, &args.season_field, args.date);
    request.image_id = args.image_id.clone();
    request.n_planned = match (args.n_planned, definition.request_shape) {
        (None, RequestShape::Nitrogen) => Some(settings.defaults.n_planned),
        (n_planned, _) => n_planned,
    };
    request.yield_average = args.yield_average;
    request.min_yield = args.min_yield;
    request.max_yield = args.max_yield;
    request.zoning = zoning.clone();
    request.extra = args.output.extra();
    debug!(?request, "Field map request");

    let bridge = common::connect(global, &settings)?;
    let pb = common::spinner(format!("Creating {} map", definition.key));
    let result = bridge.request_field_map(&request);
    pb.finish_and_clear();
    let result = common::checked(result?)?;

    let name = format!("{}_{}_{}", definition.key, args.season_field, args.date);
    common::download_formats(
        &bridge,
        &result,
        &args.output.formats,
        &args.output.output,
        &name,
        zoning.as_ref(),
    )?;
    common::write_layers(
        &bridge,
        &result,
        zoning.as_ref(),
        &settings,
        args.output.layer_format,
    )
}
