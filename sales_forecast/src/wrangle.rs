//! Join and clean: order lines enriched with product and shop attributes
//!
//! The join is left-preserving: every order line yields exactly one joined
//! row, in input order, with `None` where a product or shop is unmatched.
//! Cleaning derives the category, frame material, city, state and line total
//! columns, then projects onto [`KEEP_COLUMNS`].

use crate::error::{ForecastError, Result};
use crate::schema::{OrderLine, Product, Shop};
use crate::utils::date_parser::{parse_date, to_epoch_days};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use tracing::{debug, info, warn};

/// Separator between description segments
pub const DESCRIPTION_SEPARATOR: &str = " - ";
/// Separator between city and state
pub const LOCATION_SEPARATOR: &str = ", ";

/// Columns kept after cleaning, in output order
pub const KEEP_COLUMNS: [&str; 14] = [
    "order.id",
    "order.line",
    "order.date",
    "model",
    "quantity",
    "price",
    "total.price",
    "bikeshop.name",
    "location",
    "category.1",
    "category.2",
    "frame.material",
    "city",
    "state",
];

/// Replace dots with underscores, as done for every kept column
pub fn normalize_column_name(name: &str) -> String {
    name.replace('.', "_")
}

/// An order line with its product and shop, if they exist
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow<'a> {
    pub order: &'a OrderLine,
    pub product: Option<&'a Product>,
    pub shop: Option<&'a Shop>,
}

impl JoinedRow<'_> {
    /// Unit price from the order line, falling back to the product list price
    pub fn unit_price(&self) -> Option<f64> {
        self.order
            .price
            .or_else(|| self.product.and_then(|p| p.price))
    }
}

fn index_unique<'a, T, F>(table: &str, items: &'a [T], key: F) -> Result<HashMap<i64, &'a T>>
where
    F: Fn(&T) -> i64,
{
    let mut index = HashMap::with_capacity(items.len());
    for item in items {
        let k = key(item);
        if index.insert(k, item).is_some() {
            return Err(ForecastError::SchemaError(format!(
                "Duplicate key {} in reference table '{}'",
                k, table
            )));
        }
    }
    Ok(index)
}

/// Left-join order lines to products (`product.id = bike.id`) and then shops
/// (`customer.id = bikeshop.id`).
///
/// Duplicate reference keys are rejected because they would fan out order lines.
pub fn join_orderlines<'a>(
    orders: &'a [OrderLine],
    products: &'a [Product],
    shops: &'a [Shop],
) -> Result<Vec<JoinedRow<'a>>> {
    let product_index = index_unique("bikes", products, |p| p.bike_id)?;
    let shop_index = index_unique("bikeshops", shops, |s| s.bikeshop_id)?;

    let joined: Vec<JoinedRow<'a>> = orders
        .iter()
        .map(|order| JoinedRow {
            order,
            product: product_index.get(&order.product_id).copied(),
            shop: shop_index.get(&order.customer_id).copied(),
        })
        .collect();

    let unmatched_products = joined.iter().filter(|r| r.product.is_none()).count();
    let unmatched_shops = joined.iter().filter(|r| r.shop.is_none()).count();
    if unmatched_products > 0 || unmatched_shops > 0 {
        warn!(
            unmatched_products,
            unmatched_shops, "Order lines without a matching product or shop"
        );
    }
    info!(rows = joined.len(), "Joined order lines");
    Ok(joined)
}

/// How to treat strings that do not split into the expected segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParsePolicy {
    /// Fill missing segments with null and keep going
    #[default]
    Lenient,
    /// Fail with a parse error
    Strict,
}

/// The three positional parts of a product description
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DescriptionParts {
    pub category_1: Option<String>,
    pub category_2: Option<String>,
    pub frame_material: Option<String>,
    /// Number of segments found in the description
    pub segments: usize,
}

impl DescriptionParts {
    /// Whether the description had exactly three segments
    pub fn is_exact(&self) -> bool {
        self.segments == 3
    }
}

/// Split `"Category 1 - Category 2 - Frame"` into its parts.
///
/// Under [`ParsePolicy::Lenient`], missing segments become `None` and extra
/// segments are ignored. Under [`ParsePolicy::Strict`] anything other than
/// three segments is a [`ForecastError::ParseError`].
pub fn split_description(description: &str, policy: ParsePolicy) -> Result<DescriptionParts> {
    let parts: Vec<&str> = description.split(DESCRIPTION_SEPARATOR).collect();
    if parts.len() != 3 && policy == ParsePolicy::Strict {
        return Err(ForecastError::ParseError(format!(
            "Description '{}' has {} segments, expected 3",
            description,
            parts.len()
        )));
    }
    let segment = |i: usize| parts.get(i).map(|s| s.to_string());
    Ok(DescriptionParts {
        category_1: segment(0),
        category_2: segment(1),
        frame_material: segment(2),
        segments: parts.len(),
    })
}

/// City and state parsed from a location
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocationParts {
    pub city: Option<String>,
    pub state: Option<String>,
}

/// Split `"City, State"` on the first separator
pub fn split_location(location: &str, policy: ParsePolicy) -> Result<LocationParts> {
    match location.split_once(LOCATION_SEPARATOR) {
        Some((city, state)) => Ok(LocationParts {
            city: Some(city.to_string()),
            state: Some(state.to_string()),
        }),
        None if policy == ParsePolicy::Strict => Err(ForecastError::ParseError(format!(
            "Location '{}' has no '{}' separator",
            location, LOCATION_SEPARATOR
        ))),
        None => Ok(LocationParts {
            city: Some(location.to_string()),
            state: None,
        }),
    }
}

/// Line total; null when the price is unknown
pub fn total_price(quantity: i64, price: Option<f64>) -> Option<f64> {
    price.map(|p| quantity as f64 * p)
}

/// Parsing behaviour while cleaning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanOptions {
    pub description_policy: ParsePolicy,
    pub location_policy: ParsePolicy,
}

/// A cleaned record with exactly the kept columns
#[derive(Debug, Clone, PartialEq)]
pub struct SalesRecord {
    pub order_id: i64,
    pub order_line: i64,
    pub order_date: NaiveDate,
    pub model: Option<String>,
    pub quantity: i64,
    pub price: Option<f64>,
    pub total_price: Option<f64>,
    pub bikeshop_name: Option<String>,
    pub location: Option<String>,
    pub category_1: Option<String>,
    pub category_2: Option<String>,
    pub frame_material: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

/// Derive, project and type the joined rows.
///
/// Dates are parsed here so that malformed dates fail before aggregation.
pub fn clean(joined: &[JoinedRow<'_>], options: &CleanOptions) -> Result<Vec<SalesRecord>> {
    let mut description_mismatches = 0usize;
    let mut location_mismatches = 0usize;
    let mut records = Vec::with_capacity(joined.len());

    for row in joined {
        let order = row.order;
        let order_date = parse_date(&order.order_date).map_err(|e| {
            ForecastError::ParseError(format!(
                "Order {} line {}: {}",
                order.order_id, order.order_line, e
            ))
        })?;

        let description = match row.product.and_then(|p| p.description.as_deref()) {
            Some(text) => {
                let parts = split_description(text, options.description_policy)?;
                if !parts.is_exact() {
                    description_mismatches += 1;
                    debug!(
                        order_id = order.order_id,
                        segments = parts.segments,
                        description = text,
                        "Description does not have three segments"
                    );
                }
                parts
            }
            None => DescriptionParts::default(),
        };

        let location_text = row.shop.and_then(|s| s.location.clone());
        let location = match location_text.as_deref() {
            Some(text) => {
                let parts = split_location(text, options.location_policy)?;
                if parts.state.is_none() {
                    location_mismatches += 1;
                    debug!(order_id = order.order_id, location = text, "Location without state");
                }
                parts
            }
            None => LocationParts::default(),
        };

        let price = row.unit_price();
        records.push(SalesRecord {
            order_id: order.order_id,
            order_line: order.order_line,
            order_date,
            model: row.product.and_then(|p| p.model.clone()),
            quantity: order.quantity,
            price,
            total_price: total_price(order.quantity, price),
            bikeshop_name: row.shop.and_then(|s| s.name.clone()),
            location: location_text,
            category_1: description.category_1,
            category_2: description.category_2,
            frame_material: description.frame_material,
            city: location.city,
            state: location.state,
        });
    }

    if description_mismatches > 0 {
        warn!(
            rows = description_mismatches,
            "Descriptions not in 'A - B - C' form; missing parts left null"
        );
    }
    if location_mismatches > 0 {
        warn!(
            rows = location_mismatches,
            "Locations not in 'City, State' form; state left null"
        );
    }
    info!(rows = records.len(), "Cleaned sales records");
    Ok(records)
}

/// Cleaned records as a dataframe with underscore column names and a `Date`
/// typed `order_date`
pub fn records_to_dataframe(records: &[SalesRecord]) -> Result<DataFrame> {
    fn text<F>(records: &[SalesRecord], f: F) -> Vec<Option<&str>>
    where
        F: Fn(&SalesRecord) -> &Option<String>,
    {
        records.iter().map(|r| f(r).as_deref()).collect()
    }

    let names: Vec<String> = KEEP_COLUMNS.iter().map(|c| normalize_column_name(c)).collect();

    let dates: Vec<i32> = records.iter().map(|r| to_epoch_days(r.order_date)).collect();
    let columns = vec![
        Series::new(&names[0], records.iter().map(|r| r.order_id).collect::<Vec<_>>()),
        Series::new(&names[1], records.iter().map(|r| r.order_line).collect::<Vec<_>>()),
        Series::new(&names[2], dates).cast(&DataType::Date)?,
        Series::new(&names[3], text(records, |r| &r.model)),
        Series::new(&names[4], records.iter().map(|r| r.quantity).collect::<Vec<_>>()),
        Series::new(&names[5], records.iter().map(|r| r.price).collect::<Vec<_>>()),
        Series::new(&names[6], records.iter().map(|r| r.total_price).collect::<Vec<_>>()),
        Series::new(&names[7], text(records, |r| &r.bikeshop_name)),
        Series::new(&names[8], text(records, |r| &r.location)),
        Series::new(&names[9], text(records, |r| &r.category_1)),
        Series::new(&names[10], text(records, |r| &r.category_2)),
        Series::new(&names[11], text(records, |r| &r.frame_material)),
        Series::new(&names[12], text(records, |r| &r.city)),
        Series::new(&names[13], text(records, |r| &r.state)),
    ];
    Ok(DataFrame::new(columns)?)
}

/// Column-per-line overview of a dataframe: name, dtype and leading values
pub fn glimpse(df: &DataFrame) -> String {
    const PREVIEW: usize = 5;
    let mut out = String::new();
    let _ = writeln!(out, "Rows: {}", df.height());
    let _ = writeln!(out, "Columns: {}", df.width());
    let width = df
        .get_column_names()
        .iter()
        .map(|n| n.len())
        .max()
        .unwrap_or(0);
    for column in df.get_columns() {
        let preview: Vec<String> = (0..column.len().min(PREVIEW))
            .filter_map(|i| column.get(i).ok())
            .map(|v| v.to_string())
            .collect();
        let _ = writeln!(
            out,
            "$ {:<width$} <{}> {}",
            column.name(),
            column.dtype(),
            preview.join(", "),
            width = width
        );
    }
    out
}
