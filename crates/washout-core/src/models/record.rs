//! Reference table records.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

/// One row of the washout reference table.
///
/// Column headers are the ones used by the source spreadsheet:
/// `商品名` (product name), `一般名` (generic name), `休薬期間` (withdrawal period).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DrugRecord {
    /// Brand / product name
    #[serde(rename = "商品名", default, deserialize_with = "text_cell")]
    pub product_name: String,
    /// Generic (non-proprietary) name
    #[serde(rename = "一般名", default, deserialize_with = "text_cell")]
    pub generic_name: String,
    /// Required withdrawal period; `None` means no restriction
    #[serde(rename = "休薬期間", default, deserialize_with = "period_cell")]
    pub withdrawal_period: Option<String>,
}

impl DrugRecord {
    /// Create a record.
    pub fn new(
        product_name: impl Into<String>,
        generic_name: impl Into<String>,
        withdrawal_period: Option<&str>,
    ) -> Self {
        Self {
            product_name: product_name.into(),
            generic_name: generic_name.into(),
            withdrawal_period: withdrawal_period.map(str::to_string),
        }
    }

    /// Whether this record requires a washout at all.
    pub fn is_restricted(&self) -> bool {
        self.withdrawal_period.is_some()
    }
}

/// Name cells: missing or null load as an empty string.
fn text_cell<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserializer.deserialize_any(CellVisitor)?.unwrap_or_default())
}

/// Period cells: blank, whitespace-only or null mean "no restriction".
fn period_cell<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserializer
        .deserialize_any(CellVisitor)?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// Accepts whatever a spreadsheet export puts in a cell and renders it as text.
struct CellVisitor;

impl<'de> Visitor<'de> for CellVisitor {
    type Value = Option<String>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a string, number or empty cell")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
            Ok(Some(format!("{}", v as i64)))
        } else {
            Ok(Some(v.to_string()))
        }
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(CellVisitor)
    }
}
