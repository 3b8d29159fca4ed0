//! Coverage search command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::Args;
use rsgeosys::products::types::{CoverageQuery, DateRange};
use rsgeosys::search::{CoverageSearch, SearchEvent, SearchLock, SearchRequest};
use tracing::warn;

use super::common::{self, parse_date, FieldArgs, GlobalArgs};

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[command(flatten)]
    pub field: FieldArgs,

    /// Map product key (see `rsgeosys products`)
    #[arg(long, default_value = "INSEASON_NDVI")]
    pub product: String,

    /// Restrict to one sensor (e.g. SENTINEL_2)
    #[arg(long)]
    pub sensor: Option<String>,

    /// Earliest image date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub from: Option<NaiveDate>,

    /// Latest image date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub to: Option<NaiveDate>,

    /// Planned nitrogen shown in nitrogen product previews (default from config)
    #[arg(long)]
    pub n_planned: Option<f64>,

    /// Write thumbnails into this directory
    #[arg(long, value_name = "DIR")]
    pub thumbnails: Option<PathBuf>,
}

fn save_thumbnail(dir: &Path, name: &str, bytes: &[u8]) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(format!("{}.png", name));
    std::fs::write(&path, bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub fn run(global: &GlobalArgs, config: &Path, args: SearchArgs) -> anyhow::Result<()> {
    let settings = common::load_settings(config)?;
    let query = CoverageQuery {
        geometry: args.field.geometry_wkt()?,
        crop: args.field.crop_key()?.to_string(),
        sowing_date: args.field.sowing_date,
        map_product: None,
        sensor: args.sensor.clone(),
        date_range: DateRange::from_bounds(args.from, args.to),
    };
    let bridge = Arc::new(common::connect(global, &settings)?);

    let pb = common::spinner(format!("Searching {} coverage", args.product));
    let (search, events) = CoverageSearch::spawn(
        Arc::clone(&bridge),
        SearchLock::default(),
        SearchRequest {
            query,
            product_key: args.product.clone(),
            n_planned: args.n_planned.unwrap_or(settings.defaults.n_planned),
        },
    );

    let mut failure = None;
    for event in events.iter() {
        match event {
            SearchEvent::Started => {}
            SearchEvent::Result {
                coverage,
                thumbnail,
                ..
            } => {
                pb.suspend(|| {
                    println!(
                        "{}  {}  {:<12} {:?}  image={}",
                        coverage.season_field_id,
                        coverage.image.date,
                        coverage.image.sensor,
                        coverage.coverage_type,
                        coverage.image.id.as_deref().unwrap_or("-"),
                    )
                });
                if let (Some(dir), false) = (&args.thumbnails, thumbnail.is_empty()) {
                    let name = format!(
                        "{}_{}_{}",
                        args.product, coverage.season_field_id, coverage.image.date
                    );
                    if let Err(e) = save_thumbnail(dir, &name, &thumbnail) {
                        warn!(error = %e, "Thumbnail not saved");
                    }
                }
            }
            SearchEvent::Finished { emitted, stopped } => {
                pb.finish_with_message(if stopped {
                    format!("Stopped after {} result(s)", emitted)
                } else {
                    format!("{} result(s)", emitted)
                });
            }
            SearchEvent::Error(message) => {
                pb.finish_and_clear();
                failure = Some(message);
            }
        }
    }
    search.join();

    if let Some(message) = failure {
        bail!("Coverage search failed: {}", message);
    }
    Ok(())
}
