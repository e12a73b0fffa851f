//! Per-design statistics and the design analytics projection.

use super::{
    mean_one_decimal,
    pipeline::{self, ProjectionRow, RowFilter, SortSpec},
};
use crate::models::{
    design::Design,
    response::{Rating, Response, Score},
};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// Count of ratings per star value. Slot `i` holds the count for `i + 1` stars.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Distribution([u32; 5]);

impl Distribution {
    fn record(&mut self, score: Score) {
        self.0[usize::from(score.get() - Score::MIN)] += 1;
    }

    /// `(stars, count)` pairs for every star value, ascending.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        (Score::MIN..=Score::MAX).zip(self.0.iter().copied())
    }
}

impl Serialize for Distribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter().map(|(stars, count)| (stars.to_string(), count)))
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct DesignStats {
    pub avg_quality: f64,
    pub avg_purchase: f64,
    pub total_ratings: usize,
    pub quality_distribution: Distribution,
    pub purchase_distribution: Distribution,
}

/// Aggregate every rating of `design_id` found across `responses`.
///
/// Responses that never rated the design contribute nothing; a design nobody
/// rated gets zero averages and empty distributions.
pub fn design_stats(design_id: Uuid, responses: &[Response]) -> DesignStats {
    let ratings: Vec<&Rating> = responses
        .iter()
        .filter_map(|response| response.ratings.get(&design_id))
        .collect();

    let mut quality_distribution = Distribution::default();
    let mut purchase_distribution = Distribution::default();
    let mut quality_sum = 0u64;
    let mut purchase_sum = 0u64;
    for rating in &ratings {
        quality_distribution.record(rating.design_quality);
        purchase_distribution.record(rating.buy_intention);
        quality_sum += u64::from(rating.design_quality.get());
        purchase_sum += u64::from(rating.buy_intention.get());
    }

    DesignStats {
        avg_quality: mean_one_decimal(quality_sum, ratings.len()),
        avg_purchase: mean_one_decimal(purchase_sum, ratings.len()),
        total_ratings: ratings.len(),
        quality_distribution,
        purchase_distribution,
    }
}

/// One row of the design analytics table.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct DesignRow {
    #[serde(flatten)]
    pub design: Design,
    pub stats: DesignStats,
}

impl ProjectionRow for DesignRow {
    fn name(&self) -> &str {
        &self.design.name
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
        self.design.uploaded_at
    }
}

/// Build the design analytics rows for a snapshot, then filter and sort them.
pub fn project_designs(
    responses: &[Response],
    designs: &[Design],
    filter: &RowFilter,
    sort: &SortSpec,
) -> Vec<DesignRow> {
    let rows = designs
        .iter()
        .map(|design| DesignRow {
            design: design.clone(),
            stats: design_stats(design.id, responses),
        })
        .collect();
    pipeline::apply(rows, filter, sort)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{
        fixtures::{design, rating, response},
        pipeline::{SortDirection, SortKey},
    };

    #[test]
    fn no_responses_yield_zeroed_stats() {
        let stats = design_stats(Uuid::new_v4(), &[]);
        assert_eq!(stats.avg_quality, 0.0);
        assert_eq!(stats.avg_purchase, 0.0);
        assert_eq!(stats.total_ratings, 0);
        assert_eq!(stats.quality_distribution, Distribution::default());
        assert_eq!(stats.purchase_distribution, Distribution::default());
    }

    #[test]
    fn two_opposite_ratings_average_to_three() {
        let a = design("A", 0);
        let b = design("B", 1);
        let c = design("C", 2);
        let responses = vec![
            response(
                "first",
                10,
                &[(a.id, rating(5, 4)), (b.id, rating(5, 4)), (c.id, rating(5, 4))],
            ),
            response(
                "second",
                5,
                &[(a.id, rating(1, 2)), (b.id, rating(1, 2)), (c.id, rating(1, 2))],
            ),
        ];

        let stats = design_stats(a.id, &responses);
        assert_eq!(stats.avg_quality, 3.0);
        assert_eq!(stats.avg_purchase, 3.0);
        assert_eq!(stats.total_ratings, 2);
        let quality: Vec<_> = stats.quality_distribution.iter().collect();
        assert_eq!(quality, vec![(1, 1), (2, 0), (3, 0), (4, 0), (5, 1)]);
    }

    #[test]
    fn distribution_sums_to_total_and_averages_stay_in_range() {
        let a = design("A", 0);
        let responses: Vec<_> = (1..=5)
            .flat_map(|q| (1..=5).map(move |p| (q, p)))
            .enumerate()
            .map(|(i, (q, p))| response("r", i as i64, &[(a.id, rating(q, p))]))
            .collect();

        let stats = design_stats(a.id, &responses);
        assert_eq!(stats.total_ratings, 25);
        let sum = |d: &Distribution| d.iter().map(|(_, count)| count).sum::<u32>();
        assert_eq!(sum(&stats.quality_distribution), 25);
        assert_eq!(sum(&stats.purchase_distribution), 25);
        assert!((1.0..=5.0).contains(&stats.avg_quality));
        assert!((1.0..=5.0).contains(&stats.avg_purchase));
    }

    #[test]
    fn stats_ignore_response_order() {
        let a = design("A", 0);
        let mut responses = vec![
            response("x", 1, &[(a.id, rating(2, 5))]),
            response("y", 2, &[(a.id, rating(4, 1))]),
            response("z", 3, &[(a.id, rating(5, 3))]),
        ];
        let forward = design_stats(a.id, &responses);
        responses.reverse();
        assert_eq!(design_stats(a.id, &responses), forward);
    }

    #[test]
    fn orphaned_ratings_are_ignored() {
        let live = design("Live", 0);
        let deleted = Uuid::new_v4();
        let responses = vec![response(
            "x",
            1,
            &[(live.id, rating(4, 4)), (deleted, rating(1, 1))],
        )];

        let rows = project_designs(
            &responses,
            &[live.clone()],
            &RowFilter::default(),
            &SortSpec::designs_default(),
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].stats.avg_quality, 4.0);
        assert_eq!(rows[0].stats.total_ratings, 1);
    }

    #[test]
    fn distribution_serializes_all_five_keys() {
        let json = serde_json::to_value(design_stats(Uuid::new_v4(), &[])).unwrap();
        let keys: Vec<_> = json["quality_distribution"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn projection_does_not_touch_snapshot() {
        let a = design("Alpha One", 0);
        let b = design("Beta", 1);
        let designs = vec![a.clone(), b.clone()];
        let responses = vec![response("x", 1, &[(a.id, rating(3, 3)), (b.id, rating(5, 5))])];
        let before = (designs.clone(), responses.clone());

        let sort = SortSpec {
            key: SortKey::AvgQuality,
            direction: SortDirection::Desc,
        };
        let rows = project_designs(&responses, &designs, &RowFilter::default(), &sort);

        assert_eq!(rows[0].design.name, "Beta");
        assert_eq!(rows[1].design.name, "Alpha One");
        assert_eq!((designs, responses), before);
    }
}
