//! Aggregation engine for the admin analytics views.
//!
//! Everything here is a pure function of a snapshot of responses and designs:
//! per-design statistics, per-respondent grouping, a shared filter/sort
//! pipeline, and HTML report rendering. Nothing is cached; callers re-project
//! from the snapshot whenever the filter or sort selection changes.

pub mod design_stats;
pub mod export;
pub mod pipeline;
pub mod respondent_stats;

pub use design_stats::{DesignRow, project_designs};
pub use export::{ReportKind, render_design_report, render_respondent_report};
pub use pipeline::{RowFilter, SortDirection, SortKey, SortSpec};
pub use respondent_stats::{RespondentRow, project_respondents};

/// Mean of `count` scores summing to `sum`, rounded to one decimal place.
///
/// The empty set yields 0.0.
pub(crate) fn mean_one_decimal(sum: u64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    round_one_decimal(sum as f64 / count as f64)
}

pub(crate) fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::{
        design::Design,
        response::{Gender, Rating, RespondentAttributes, Response, Score},
    };
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::collections::HashMap;
    use uuid::Uuid;

    pub fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 25, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    pub fn design(name: &str, minutes: i64) -> Design {
        let key = format!("designs/{}_{}.png", minutes, name.replace(' ', "_"));
        Design {
            id: Uuid::new_v4(),
            name: name.into(),
            image_ref: format!("/blobs/{}", key),
            storage_key: key,
            uploaded_at: at(minutes),
        }
    }

    pub fn rating(quality: i64, purchase: i64) -> Rating {
        Rating {
            design_quality: Score::try_from(quality).unwrap(),
            buy_intention: Score::try_from(purchase).unwrap(),
        }
    }

    pub fn response(name: &str, minutes: i64, ratings: &[(Uuid, Rating)]) -> Response {
        Response {
            id: Uuid::new_v4(),
            user_data: RespondentAttributes {
                name: name.into(),
                age: 30,
                gender: Gender::Other,
                contact: None,
            },
            ratings: ratings.iter().copied().collect::<HashMap<_, _>>(),
            submitted_at: at(minutes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0, 0.0)]
    #[case(15, 3, 5.0)]
    #[case(7, 3, 2.3)]
    #[case(11, 3, 3.7)]
    #[case(6, 2, 3.0)]
    fn mean_is_rounded_to_one_decimal(#[case] sum: u64, #[case] count: usize, #[case] want: f64) {
        assert_eq!(mean_one_decimal(sum, count), want);
    }
}
