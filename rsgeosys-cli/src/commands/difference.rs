//! Difference map between two image dates.

use std::path::Path;

use chrono::NaiveDate;
use clap::Args;
use rsgeosys::commons::basic_functions::ordered_dates;
use rsgeosys::products::catalog;

use super::common::{self, parse_date, GlobalArgs, OutputArgs};

#[derive(Debug, Args)]
pub struct DifferenceArgs {
    /// Base product (e.g. INSEASON_NDVI) or difference product key
    #[arg(long, default_value = catalog::INSEASON_NDVI)]
    pub product: String,

    /// Season field id
    #[arg(long)]
    pub season_field: String,

    /// First image date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub earliest: NaiveDate,

    /// Second image date (YYYY-MM-DD); the two dates may come in any order
    #[arg(long, value_parser = parse_date)]
    pub latest: NaiveDate,

    #[command(flatten)]
    pub output: OutputArgs,
}

pub fn run(global: &GlobalArgs, config: &Path, args: DifferenceArgs) -> anyhow::Result<()> {
    let settings = common::load_settings(config)?;
    let difference = catalog::difference_of(&args.product)?;
    let bridge = common::connect(global, &settings)?;

    let pb = common::spinner(format!("Creating {} map", difference.key));
    let result = bridge.request_difference_map(
        &args.product,
        &args.season_field,
        args.earliest,
        args.latest,
        &args.output.extra(),
    );
    pb.finish_and_clear();
    let result = common::checked(result?)?;

    let (earliest, latest) = ordered_dates(args.earliest, args.latest);
    let name = format!("{}_{}_{}_{}", difference.key, args.season_field, earliest, latest);
    common::download_formats(
        &bridge,
        &result,
        &args.output.formats,
        &args.output.output,
        &name,
        None,
    )
}
