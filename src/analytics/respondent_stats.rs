//! Per-respondent grouping and the respondent analytics projection.

use super::{
    mean_one_decimal,
    pipeline::{self, ProjectionRow, RowFilter, SortSpec},
};
use crate::models::response::{RespondentAttributes, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Display name used for responses submitted without a name.
pub const ANONYMOUS: &str = "Anonymous";

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct RespondentStats {
    pub avg_quality: f64,
    pub avg_purchase: f64,
    pub total_ratings: usize,
}

/// Averages over a single response's ratings, including ratings of designs
/// that no longer exist.
pub fn respondent_stats(response: &Response) -> RespondentStats {
    let total_ratings = response.ratings.len();
    let (quality_sum, purchase_sum) =
        response
            .ratings
            .values()
            .fold((0u64, 0u64), |(quality, purchase), rating| {
                (
                    quality + u64::from(rating.design_quality.get()),
                    purchase + u64::from(rating.buy_intention.get()),
                )
            });

    RespondentStats {
        avg_quality: mean_one_decimal(quality_sum, total_ratings),
        avg_purchase: mean_one_decimal(purchase_sum, total_ratings),
        total_ratings,
    }
}

/// One row of the respondent analytics table.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct RespondentRow {
    pub display_name: String,
    /// Attributes of the representative response.
    pub user_data: RespondentAttributes,
    pub stats: RespondentStats,
    pub submitted_at: DateTime<Utc>,
    /// Distinct non-empty contacts in the group. More than one usually means
    /// different people typed the same name.
    pub distinct_contacts: usize,
    pub responses: Vec<Response>,
}

impl ProjectionRow for RespondentRow {
    fn name(&self) -> &str {
        &self.display_name
    }

    fn avg_quality(&self) -> f64 {
        self.stats.avg_quality
    }

    fn avg_purchase(&self) -> f64 {
        self.stats.avg_purchase
    }

    fn total_ratings(&self) -> usize {
        self.stats.total_ratings
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

fn display_name(response: &Response) -> &str {
    if response.user_data.name.is_empty() {
        ANONYMOUS
    } else {
        &response.user_data.name
    }
}

/// Group responses by display name.
///
/// Groups keep first-seen order and the first response of each group (in
/// input order) is its representative. The input is not re-sorted: callers
/// pass responses newest first so the representative is the latest one.
pub fn group_respondents(responses: &[Response]) -> Vec<RespondentRow> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&Response>)> = Vec::new();

    for response in responses {
        let name = display_name(response);
        match index.get(name) {
            Some(&slot) => groups[slot].1.push(response),
            None => {
                index.insert(name, groups.len());
                groups.push((name, vec![response]));
            }
        }
    }

    groups
        .into_iter()
        .map(|(name, members)| {
            let representative = members[0];
            let distinct_contacts = members
                .iter()
                .filter_map(|r| r.user_data.contact.as_deref())
                .filter(|c| !c.is_empty())
                .collect::<HashSet<_>>()
                .len();

            RespondentRow {
                display_name: name.to_string(),
                user_data: representative.user_data.clone(),
                stats: respondent_stats(representative),
                submitted_at: representative.submitted_at,
                distinct_contacts,
                responses: members.into_iter().cloned().collect(),
            }
        })
        .collect()
}

/// Build the respondent analytics rows for a snapshot, then filter and sort them.
pub fn project_respondents(
    responses: &[Response],
    filter: &RowFilter,
    sort: &SortSpec,
) -> Vec<RespondentRow> {
    pipeline::apply(group_respondents(responses), filter, sort)
}
