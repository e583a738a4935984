//! Typed records for the three source tables
//!
//! Each `from_table` constructor converts dynamic rows into records and
//! reports the table, column and row of the first value that does not fit.

use crate::error::{ForecastError, Result};
use crate::source::{RawTable, Value};

pub const BIKE_ID: &str = "bike.id";
pub const MODEL: &str = "model";
pub const DESCRIPTION: &str = "description";
pub const PRICE: &str = "price";
pub const BIKESHOP_ID: &str = "bikeshop.id";
pub const BIKESHOP_NAME: &str = "bikeshop.name";
pub const LOCATION: &str = "location";
pub const ORDER_ID: &str = "order.id";
pub const ORDER_LINE: &str = "order.line";
pub const ORDER_DATE: &str = "order.date";
pub const CUSTOMER_ID: &str = "customer.id";
pub const PRODUCT_ID: &str = "product.id";
pub const QUANTITY: &str = "quantity";

/// A bike from the `bikes` table
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub bike_id: i64,
    pub model: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
}

/// A shop from the `bikeshops` table
#[derive(Debug, Clone, PartialEq)]
pub struct Shop {
    pub bikeshop_id: i64,
    pub name: Option<String>,
    pub location: Option<String>,
}

/// One line of an order from the `orderlines` table
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub order_id: i64,
    pub order_line: i64,
    /// Raw date text; parsed while cleaning
    pub order_date: String,
    pub customer_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// Unit price, only when the order table carries one
    pub price: Option<f64>,
}

/// Cell accessor that knows where it is for error messages
struct Cell<'a> {
    table: &'a str,
    column: &'a str,
    row: usize,
    value: &'a Value,
}

impl<'a> Cell<'a> {
    fn error(&self, expected: &str) -> ForecastError {
        ForecastError::SchemaError(format!(
            "Table '{}' column '{}' row {}: expected {}, found {} '{}'",
            self.table,
            self.column,
            self.row,
            expected,
            self.value.kind(),
            self.value
        ))
    }

    fn optional_integer(&self) -> Result<Option<i64>> {
        match self.value {
            Value::Null => Ok(None),
            Value::Integer(v) => Ok(Some(*v)),
            Value::Real(v) if v.fract() == 0.0 && v.is_finite() => Ok(Some(*v as i64)),
            Value::Text(text) => text
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| self.error("an integer")),
            _ => Err(self.error("an integer")),
        }
    }

    fn integer(&self) -> Result<i64> {
        self.optional_integer()?.ok_or_else(|| self.error("an integer"))
    }

    fn optional_real(&self) -> Result<Option<f64>> {
        match self.value {
            Value::Null => Ok(None),
            Value::Integer(v) => Ok(Some(*v as f64)),
            Value::Real(v) => Ok(Some(*v)),
            Value::Text(text) => text
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| self.error("a number")),
        }
    }

    fn optional_text(&self) -> Option<String> {
        match self.value {
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    fn text(&self) -> Result<String> {
        self.optional_text().ok_or_else(|| self.error("text"))
    }

    fn non_negative(&self, value: f64) -> Result<()> {
        if !value.is_finite() {
            Err(ForecastError::SchemaError(format!(
                "Table '{}' column '{}' row {}: non-finite value {}",
                self.table, self.column, self.row, value
            )))
        } else if value < 0.0 {
            Err(ForecastError::SchemaError(format!(
                "Table '{}' column '{}' row {}: negative value {}",
                self.table, self.column, self.row, value
            )))
        } else {
            Ok(())
        }
    }
}

/// Column lookup for a table, resolved once
struct Columns<'a> {
    table: &'a RawTable,
}

impl<'a> Columns<'a> {
    fn required(&self, column: &'static str) -> Result<(usize, &'static str)> {
        Ok((self.table.require_column(column)?, column))
    }

    fn optional(&self, column: &'static str) -> Option<(usize, &'static str)> {
        self.table.column_index(column).map(|index| (index, column))
    }

    fn cell(&self, row: usize, (index, column): (usize, &'a str)) -> Cell<'a> {
        Cell {
            table: &self.table.name,
            column,
            row,
            value: &self.table.rows[row][index],
        }
    }
}

impl Product {
    pub fn from_table(table: &RawTable) -> Result<Vec<Self>> {
        let cols = Columns { table };
        let id = cols.required(BIKE_ID)?;
        let model = cols.required(MODEL)?;
        let description = cols.required(DESCRIPTION)?;
        let price = cols.required(PRICE)?;

        (0..table.len())
            .map(|row| {
                let price_cell = cols.cell(row, price);
                let price = price_cell.optional_real()?;
                if let Some(p) = price {
                    price_cell.non_negative(p)?;
                }
                Ok(Product {
                    bike_id: cols.cell(row, id).integer()?,
                    model: cols.cell(row, model).optional_text(),
                    description: cols.cell(row, description).optional_text(),
                    price,
                })
            })
            .collect()
    }
}

impl Shop {
    pub fn from_table(table: &RawTable) -> Result<Vec<Self>> {
        let cols = Columns { table };
        let id = cols.required(BIKESHOP_ID)?;
        let name = cols.required(BIKESHOP_NAME)?;
        let location = cols.required(LOCATION)?;

        (0..table.len())
            .map(|row| {
                Ok(Shop {
                    bikeshop_id: cols.cell(row, id).integer()?,
                    name: cols.cell(row, name).optional_text(),
                    location: cols.cell(row, location).optional_text(),
                })
            })
            .collect()
    }
}

impl OrderLine {
    pub fn from_table(table: &RawTable) -> Result<Vec<Self>> {
        let cols = Columns { table };
        let order_id = cols.required(ORDER_ID)?;
        let order_line = cols.required(ORDER_LINE)?;
        let order_date = cols.required(ORDER_DATE)?;
        let customer_id = cols.required(CUSTOMER_ID)?;
        let product_id = cols.required(PRODUCT_ID)?;
        let quantity = cols.required(QUANTITY)?;
        let price = cols.optional(PRICE);

        (0..table.len())
            .map(|row| {
                let quantity_cell = cols.cell(row, quantity);
                let quantity = quantity_cell.integer()?;
                quantity_cell.non_negative(quantity as f64)?;

                let price = match price {
                    Some(column) => {
                        let cell = cols.cell(row, column);
                        let value = cell.optional_real()?;
                        if let Some(p) = value {
                            cell.non_negative(p)?;
                        }
                        value
                    }
                    None => None,
                };

                Ok(OrderLine {
                    order_id: cols.cell(row, order_id).integer()?,
                    order_line: cols.cell(row, order_line).integer()?,
                    order_date: cols.cell(row, order_date).text()?,
                    customer_id: cols.cell(row, customer_id).integer()?,
                    product_id: cols.cell(row, product_id).integer()?,
                    quantity,
                    price,
                })
            })
            .collect()
    }
}
