//! Filter/sort pipeline shared by the design and respondent views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The columns a projection row exposes to filtering and sorting.
pub trait ProjectionRow {
    fn name(&self) -> &str;
    fn avg_quality(&self) -> f64;
    fn avg_purchase(&self) -> f64;
    fn total_ratings(&self) -> usize;
    /// Upload time for designs, representative submission time for respondents.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Optional row filters. Unset fields accept every row.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RowFilter {
    /// Case-insensitive substring of the row name.
    pub name: Option<String>,
    /// A row passes when either average reaches this value.
    pub min_rating: Option<f64>,
}

impl RowFilter {
    pub fn matches<R: ProjectionRow>(&self, row: &R) -> bool {
        let name_ok = match self.name.as_deref().filter(|n| !n.is_empty()) {
            Some(needle) => row
                .name()
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            None => true,
        };

        let rating_ok = match self.min_rating.filter(|t| t.is_finite()) {
            Some(threshold) => row.avg_quality() >= threshold || row.avg_purchase() >= threshold,
            None => true,
        };

        name_ok && rating_ok
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Name,
    AvgQuality,
    AvgPurchase,
    TotalRatings,
    Timestamp,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Highest quality first.
    pub fn designs_default() -> Self {
        Self {
            key: SortKey::AvgQuality,
            direction: SortDirection::Desc,
        }
    }

    /// Most recent submission first.
    pub fn respondents_default() -> Self {
        Self {
            key: SortKey::Timestamp,
            direction: SortDirection::Desc,
        }
    }

    /// Column-header click: the active key flips direction, a new key starts ascending.
    pub fn toggle(self, key: SortKey) -> Self {
        let direction = if self.key == key {
            self.direction.flipped()
        } else {
            SortDirection::Asc
        };
        Self { key, direction }
    }

    pub fn compare<R: ProjectionRow>(&self, a: &R, b: &R) -> Ordering {
        let ordering = match self.key {
            SortKey::Name => a.name().cmp(b.name()),
            SortKey::AvgQuality => cmp_f64(a.avg_quality(), b.avg_quality()),
            SortKey::AvgPurchase => cmp_f64(a.avg_purchase(), b.avg_purchase()),
            SortKey::TotalRatings => a.total_ratings().cmp(&b.total_ratings()),
            SortKey::Timestamp => a.timestamp().cmp(&b.timestamp()),
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Keep the rows that pass `filter`, ordered by `sort`.
pub fn apply<R: ProjectionRow>(rows: Vec<R>, filter: &RowFilter, sort: &SortSpec) -> Vec<R> {
    let mut rows: Vec<R> = rows.into_iter().filter(|row| filter.matches(row)).collect();
    rows.sort_by(|a, b| sort.compare(a, b));
    rows
}
