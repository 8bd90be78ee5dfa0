// src/aggregate/mod.rs
use serde::Serialize;
use std::{collections::BTreeSet, fmt, str::FromStr};
use thiserror::Error;

use crate::dataset::DatasetDescriptor;
use crate::record::StoredRecord;

/// Which records a summary covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YearFilter {
    #[default]
    All,
    Year(i32),
}

impl YearFilter {
    pub fn matches(&self, year: i32) -> bool {
        match self {
            YearFilter::All => true,
            YearFilter::Year(y) => *y == year,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("`{0}` is neither \"All\" nor a year")]
pub struct YearFilterError(String);

impl FromStr for YearFilter {
    type Err = YearFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(YearFilter::All);
        }
        s.parse::<i32>()
            .map(YearFilter::Year)
            .map_err(|_| YearFilterError(s.to_string()))
    }
}

impl fmt::Display for YearFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearFilter::All => f.write_str("All"),
            YearFilter::Year(y) => write!(f, "{}", y),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub key: String,
    pub label: String,
    pub total: u64,
    /// Share of the grand total, one decimal; 0 when the grand total is 0.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub filter: String,
    pub records: usize,
    pub grand_total: u64,
    pub categories: Vec<CategoryTotal>,
}

impl Summary {
    pub fn total(&self, key: &str) -> u64 {
        self.categories
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.total)
            .unwrap_or(0)
    }

    pub fn percentage(&self, key: &str) -> f64 {
        self.categories
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.percentage)
            .unwrap_or(0.0)
    }
}

/// Counts from a store are not bounded by the importer, so sums saturate
/// instead of overflowing.
fn saturating_sum(values: impl Iterator<Item = u64>) -> u64 {
    values.fold(0, u64::saturating_add)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Share of `total` in `grand_total`, rounded to one decimal.
pub fn percentage(total: u64, grand_total: u64) -> f64 {
    if grand_total == 0 {
        return 0.0;
    }
    round1(total as f64 / grand_total as f64 * 100.0)
}

/// Per-category totals, grand total and shares over the selected records.
pub fn summarize(
    records: &[StoredRecord],
    descriptor: &DatasetDescriptor,
    filter: YearFilter,
) -> Summary {
    let selected: Vec<&StoredRecord> = records
        .iter()
        .filter(|r| filter.matches(r.year()))
        .collect();

    let totals: Vec<u64> = descriptor
        .categories
        .iter()
        .map(|c| saturating_sum(selected.iter().map(|r| r.count(&c.key))))
        .collect();
    let grand_total = saturating_sum(totals.iter().copied());

    let categories = descriptor
        .categories
        .iter()
        .zip(totals)
        .map(|(c, total)| CategoryTotal {
            key: c.key.clone(),
            label: c.label.clone(),
            total,
            percentage: percentage(total, grand_total),
        })
        .collect();

    Summary {
        filter: filter.to_string(),
        records: selected.len(),
        grand_total,
        categories,
    }
}

/// Distinct years across all records, ascending, ignoring any filter.
pub fn years(records: &[StoredRecord]) -> Vec<i32> {
    records
        .iter()
        .map(|r| r.year())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// One point of a per-year time series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearPoint {
    pub year: i32,
    /// Sums in descriptor category order.
    pub values: Vec<u64>,
    pub total: u64,
}

/// Per-year sums for line/area charts; records sharing a year are added together.
pub fn yearly_series(records: &[StoredRecord], descriptor: &DatasetDescriptor) -> Vec<YearPoint> {
    years(records)
        .into_iter()
        .map(|year| {
            let values: Vec<u64> = descriptor
                .categories
                .iter()
                .map(|c| {
                    saturating_sum(
                        records
                            .iter()
                            .filter(|r| r.year() == year)
                            .map(|r| r.count(&c.key)),
                    )
                })
                .collect();
            let total = saturating_sum(values.iter().copied());
            YearPoint {
                year,
                values,
                total,
            }
        })
        .collect()
}
