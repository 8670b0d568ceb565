use super::domain::Track;
use super::score_table::{ScoreRankPoint, ScoreRankTable};
use serde::Serialize;
use tracing::warn;

/// Rank returned when no distribution exists for any track.
pub const NEUTRAL_RANK: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EstimateError {
    #[error("no score distribution available for track '{track}'")]
    DataUnavailable { track: String },
}

/// How an estimate departed from a straight table lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateFallback {
    /// The requested track had no data; the default track was used instead.
    DefaultTrack,
    /// No track had data; a fixed default value was returned.
    FixedDefault,
}

/// Rank resolved for a score, including which table produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankEstimate {
    pub rank: u32,
    pub track: Track,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<EstimateFallback>,
}

/// Piecewise-linear interpolation over the score-rank table.
#[derive(Debug, Clone, Default)]
pub struct RankEstimator {
    table: ScoreRankTable,
}

impl RankEstimator {
    pub fn new(table: ScoreRankTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &ScoreRankTable {
        &self.table
    }

    pub fn rank_for_score(&self, score: i32, track: &str) -> Result<u32, EstimateError> {
        let points = self.points(track)?;
        Ok(interpolate_rank(points, score))
    }

    pub fn score_for_rank(&self, rank: u32, track: &str) -> Result<i32, EstimateError> {
        let points = self.points(track)?;
        Ok(interpolate_score(points, rank))
    }

    /// Rank for a score with the documented recovery: an unusable track falls
    /// back to physics, and an empty physics table yields [`NEUTRAL_RANK`].
    pub fn estimate_rank(&self, score: i32, track: &str) -> RankEstimate {
        match (Track::from_label(track), self.rank_for_score(score, track)) {
            (Some(resolved), Ok(rank)) => {
                return RankEstimate {
                    rank,
                    track: resolved,
                    fallback: None,
                }
            }
            (_, Err(err)) => {
                warn!(error = %err, fallback = %Track::FALLBACK, "rank estimate falling back to default track");
            }
            (None, Ok(_)) => {}
        }

        match self.rank_for_score(score, Track::FALLBACK.label()) {
            Ok(rank) => RankEstimate {
                rank,
                track: Track::FALLBACK,
                fallback: Some(EstimateFallback::DefaultTrack),
            },
            Err(err) => {
                warn!(error = %err, rank = NEUTRAL_RANK, "no distribution data; returning neutral rank");
                RankEstimate {
                    rank: NEUTRAL_RANK,
                    track: Track::FALLBACK,
                    fallback: Some(EstimateFallback::FixedDefault),
                }
            }
        }
    }

    fn points(&self, track: &str) -> Result<&[ScoreRankPoint], EstimateError> {
        let points = self.table.points_for_track(track);
        if points.is_empty() {
            return Err(EstimateError::DataUnavailable {
                track: track.to_string(),
            });
        }
        Ok(points)
    }
}

/// `points` must be non-empty and sorted by score descending.
pub(crate) fn interpolate_rank(points: &[ScoreRankPoint], score: i32) -> u32 {
    let best = points[0];
    let worst = points[points.len() - 1];

    if score >= best.score {
        return best.rank;
    }
    if score <= worst.score {
        return worst.rank;
    }

    for pair in points.windows(2) {
        let (upper, lower) = (pair[0], pair[1]);
        if lower.score <= score && score <= upper.score {
            let score_span = i64::from(upper.score - lower.score);
            if score_span == 0 {
                return upper.rank;
            }
            let rank_span = i64::from(lower.rank) - i64::from(upper.rank);
            let above_lower = i64::from(score - lower.score);
            // Integer division truncates the improvement, leaving the worse rank.
            let rank = i64::from(lower.rank) - rank_span * above_lower / score_span;
            return clamp_rank(rank);
        }
    }

    let midpoint = points[points.len() / 2];
    warn!(score, midpoint_rank = midpoint.rank, "estimation anomaly: no bracketing interval for score");
    midpoint.rank
}

/// `points` must be non-empty and sorted by score descending.
pub(crate) fn interpolate_score(points: &[ScoreRankPoint], rank: u32) -> i32 {
    let best = points[0];
    let worst = points[points.len() - 1];

    if rank <= best.rank {
        return best.score;
    }
    if rank >= worst.rank {
        return worst.score;
    }

    // Several scores can share a cumulative rank; the lowest one is the safe answer.
    if let Some(exact) = points.iter().rev().find(|point| point.rank == rank) {
        return exact.score;
    }

    for pair in points.windows(2) {
        let (upper, lower) = (pair[0], pair[1]);
        if upper.rank < rank && rank < lower.rank {
            let rank_span = i64::from(lower.rank) - i64::from(upper.rank);
            let score_span = i64::from(upper.score - lower.score);
            let below_worse = i64::from(lower.rank) - i64::from(rank);
            let score = i64::from(lower.score) + score_span * below_worse / rank_span;
            return score as i32;
        }
    }

    let nearest = [best, worst]
        .into_iter()
        .min_by_key(|point| (i64::from(point.rank) - i64::from(rank)).abs())
        .unwrap_or(best);
    warn!(rank, nearest_score = nearest.score, "estimation anomaly: no bracketing interval for rank");
    nearest.score
}

fn clamp_rank(rank: i64) -> u32 {
    if rank < 1 {
        1
    } else {
        u32::try_from(rank).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admissions::score_table::DistributionEntry;
    use proptest::prelude::*;

    fn entry(score: i32, cumulative: u32) -> DistributionEntry {
        DistributionEntry {
            score_label: score.to_string(),
            count: 0,
            cumulative_count: cumulative,
        }
    }

    fn estimator() -> RankEstimator {
        let table = ScoreRankTable::builder()
            .track(
                Track::Physics,
                vec![
                    entry(700, 100),
                    entry(650, 2_000),
                    entry(600, 12_000),
                    entry(550, 35_000),
                    entry(500, 70_000),
                    entry(450, 110_000),
                ],
            )
            .build();
        RankEstimator::new(table)
    }

    #[test]
    fn clamps_at_table_boundaries() {
        let estimator = estimator();
        assert_eq!(estimator.rank_for_score(700, "physics"), Ok(100));
        assert_eq!(estimator.rank_for_score(750, "physics"), Ok(100));
        assert_eq!(estimator.rank_for_score(450, "physics"), Ok(110_000));
        assert_eq!(estimator.rank_for_score(0, "physics"), Ok(110_000));
    }

    #[test]
    fn interpolates_toward_the_worse_rank() {
        let estimator = estimator();
        // 650 -> 2000, 600 -> 12000; 633 sits 33/50 of the way up.
        // 12000 - 10000 * 33 / 50 = 12000 - 6600 = 5400
        assert_eq!(estimator.rank_for_score(633, "物理"), Ok(5_400));
        // 10000 * 1 / 3 truncates to 3333, leaving the worse rank 8667.
        let points = [
            ScoreRankPoint { score: 603, rank: 2_000 },
            ScoreRankPoint { score: 600, rank: 12_000 },
        ];
        assert_eq!(interpolate_rank(&points, 601), 8_667);
    }

    #[test]
    fn interpolated_rank_never_drops_below_one() {
        let points = [
            ScoreRankPoint { score: 700, rank: 0 },
            ScoreRankPoint { score: 690, rank: 0 },
            ScoreRankPoint { score: 680, rank: 5 },
        ];
        assert_eq!(interpolate_rank(&points, 695), 1);
    }

    #[test]
    fn score_for_rank_interpolates_and_clamps() {
        let estimator = estimator();
        assert_eq!(estimator.score_for_rank(1, "physics"), Ok(700));
        assert_eq!(estimator.score_for_rank(500_000, "physics"), Ok(450));
        assert_eq!(estimator.score_for_rank(12_000, "physics"), Ok(600));
        // 600 + 50 * (12000 - 7000) / 10000 = 625
        assert_eq!(estimator.score_for_rank(7_000, "physics"), Ok(625));
    }

    #[test]
    fn shared_rank_resolves_to_lowest_score() {
        let points = [
            ScoreRankPoint { score: 700, rank: 10 },
            ScoreRankPoint { score: 699, rank: 20 },
            ScoreRankPoint { score: 698, rank: 20 },
            ScoreRankPoint { score: 697, rank: 30 },
        ];
        assert_eq!(interpolate_score(&points, 20), 698);
    }

    #[test]
    fn missing_track_reports_data_unavailable() {
        let estimator = estimator();
        assert_eq!(
            estimator.rank_for_score(600, "history"),
            Err(EstimateError::DataUnavailable {
                track: "history".to_string()
            })
        );
        assert!(estimator.score_for_rank(100, "art").is_err());
    }

    #[test]
    fn estimate_rank_falls_back_to_physics_then_neutral() {
        let estimator = estimator();
        let estimate = estimator.estimate_rank(600, "art");
        assert_eq!(estimate.rank, 12_000);
        assert_eq!(estimate.track, Track::Physics);
        assert_eq!(estimate.fallback, Some(EstimateFallback::DefaultTrack));

        let empty = RankEstimator::default();
        let estimate = empty.estimate_rank(600, "physics");
        assert_eq!(estimate.rank, NEUTRAL_RANK);
        assert_eq!(estimate.fallback, Some(EstimateFallback::FixedDefault));
    }

    proptest! {
        #[test]
        fn rank_is_monotonic_in_score(a in 300..800i32, b in 300..800i32) {
            let estimator = estimator();
            let (high, low) = if a >= b { (a, b) } else { (b, a) };
            let high_rank = estimator.rank_for_score(high, "physics").unwrap();
            let low_rank = estimator.rank_for_score(low, "physics").unwrap();
            prop_assert!(high_rank <= low_rank);
            prop_assert!(high_rank >= 1);
        }

        #[test]
        fn round_trip_stays_within_bracket(score in 451..700i32) {
            let estimator = estimator();
            let points = estimator.table().points(Track::Physics);
            let pair = points
                .windows(2)
                .find(|pair| pair[1].score <= score && score <= pair[0].score)
                .unwrap();
            let rank = estimator.rank_for_score(score, "physics").unwrap();
            let back = estimator.score_for_rank(rank, "physics").unwrap();
            prop_assert!(pair[1].score <= back && back <= pair[0].score);
        }
    }
}
