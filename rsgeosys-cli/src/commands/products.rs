//! Catalog listing.

use clap::{Args, ValueEnum};
use rsgeosys::products::catalog;
use rsgeosys::products::types::MapProductDefinition;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProductGroup {
    /// Every registered map product
    All,
    /// Products available for archive imagery
    Archive,
    /// Basic in-season products
    BasicInseason,
    /// All in-season products
    Inseason,
    /// Difference maps
    Difference,
    /// Supported crops
    Crops,
    /// Supported sensors
    Sensors,
    /// Service regions
    Regions,
}

#[derive(Debug, Args)]
pub struct ProductsArgs {
    /// What to list
    #[arg(value_enum, default_value = "all")]
    pub group: ProductGroup,
}

fn print_products<'a>(products: impl IntoIterator<Item = &'a MapProductDefinition>) {
    for definition in products {
        println!("{:<38} {}", definition.display_name, definition.description);
    }
}

fn print_group(keys: &[&str]) -> anyhow::Result<()> {
    let products = keys
        .iter()
        .map(|key| catalog::lookup(key))
        .collect::<rsgeosys::Result<Vec<_>>>()?;
    print_products(products);
    Ok(())
}

fn print_pairs(pairs: &[(&str, &str)]) {
    for (key, description) in pairs {
        println!("{:<12} {}", key, description);
    }
}

pub fn run(args: ProductsArgs) -> anyhow::Result<()> {
    match args.group {
        ProductGroup::All => print_products(catalog::all_products()),
        ProductGroup::Archive => print_group(catalog::ARCHIVE_MAP_PRODUCTS)?,
        ProductGroup::BasicInseason => print_group(catalog::BASIC_INSEASON_MAP_PRODUCTS)?,
        ProductGroup::Inseason => print_group(catalog::INSEASON_MAP_PRODUCTS)?,
        ProductGroup::Difference => print_group(catalog::DIFFERENCE_MAPS)?,
        ProductGroup::Crops => print_pairs(catalog::CROPS),
        ProductGroup::Sensors => print_pairs(catalog::SENSORS),
        ProductGroup::Regions => print_pairs(catalog::REGIONS),
    }
    Ok(())
}
