//! Management-zone map built from several image dates.

use std::path::Path;

use anyhow::bail;
use chrono::NaiveDate;
use clap::Args;
use rsgeosys::products::catalog;

use super::common::{self, parse_date, GlobalArgs, OutputArgs, ZoningArgs};

#[derive(Debug, Args)]
pub struct ZonesArgs {
    /// Season field id
    #[arg(long)]
    pub season_field: String,

    /// Image date to include (YYYY-MM-DD, repeatable)
    #[arg(long = "date", value_parser = parse_date, required = true)]
    pub dates: Vec<NaiveDate>,

    #[command(flatten)]
    pub zoning: ZoningArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

pub fn run(global: &GlobalArgs, config: &Path, args: ZonesArgs) -> anyhow::Result<()> {
    if args.dates.is_empty() {
        bail!("At least one --date is required");
    }
    let settings = common::load_settings(config)?;
    let zoning = args.zoning.to_params(settings.defaults.zone_count);
    let bridge = common::connect(global, &settings)?;

    let pb = common::spinner(format!("Creating {} map", catalog::SAMZ));
    let result =
        bridge.request_management_zone_map(&args.season_field, &args.dates, &args.output.extra());
    pb.finish_and_clear();
    let result = common::checked(result?)?;

    let latest = args.dates.iter().max().map(|d| d.to_string()).unwrap_or_default();
    let name = format!("{}_{}_{}", catalog::SAMZ, args.season_field, latest);
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
