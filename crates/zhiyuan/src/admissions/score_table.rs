use super::domain::Track;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

/// One point of the one-point-one-segment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreRankPoint {
    pub score: i32,
    pub rank: u32,
}

/// Raw entry of a published distribution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DistributionEntry {
    /// A single score (`"560"`) or a range label (`"695-750"`).
    #[serde(rename = "score")]
    pub score_label: String,
    #[serde(rename = "num", default)]
    pub count: u32,
    #[serde(rename = "accumulate")]
    pub cumulative_count: u32,
}

#[derive(Debug, Deserialize)]
struct DistributionDocument {
    data: Vec<DistributionEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum DistributionError {
    #[error("failed to read distribution: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid distribution document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Immutable per-track score→rank lookup, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct ScoreRankTable {
    tracks: BTreeMap<Track, Vec<ScoreRankPoint>>,
}

impl ScoreRankTable {
    pub fn builder() -> ScoreRankTableBuilder {
        ScoreRankTableBuilder::default()
    }

    /// Load both tracks from JSON files. A missing or malformed file leaves
    /// that track empty; estimation for it then reports `DataUnavailable`.
    pub fn load(physics: &Path, history: &Path) -> Self {
        let mut builder = Self::builder();
        for (track, path) in [(Track::Physics, physics), (Track::History, history)] {
            match read_distribution_file(path) {
                Ok(entries) => {
                    info!(%track, path = %path.display(), entries = entries.len(), "loaded score distribution");
                    builder = builder.track(track, entries);
                }
                Err(err) => {
                    warn!(%track, path = %path.display(), error = %err, "score distribution unavailable");
                }
            }
        }
        builder.build()
    }

    /// Points for a track label; empty when the label is unrecognized or the
    /// source data was unavailable.
    pub fn points_for_track(&self, track: &str) -> &[ScoreRankPoint] {
        match Track::from_label(track) {
            Some(track) => self.points(track),
            None => &[],
        }
    }

    pub fn points(&self, track: Track) -> &[ScoreRankPoint] {
        self.tracks.get(&track).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.values().all(Vec::is_empty)
    }
}

#[derive(Debug, Default)]
pub struct ScoreRankTableBuilder {
    tracks: BTreeMap<Track, Vec<ScoreRankPoint>>,
}

impl ScoreRankTableBuilder {
    pub fn track<I>(mut self, track: Track, entries: I) -> Self
    where
        I: IntoIterator<Item = DistributionEntry>,
    {
        let points = normalize_points(track, entries);
        self.tracks.insert(track, points);
        self
    }

    pub fn build(self) -> ScoreRankTable {
        ScoreRankTable {
            tracks: self.tracks,
        }
    }
}

pub fn read_distribution<R: Read>(reader: R) -> Result<Vec<DistributionEntry>, DistributionError> {
    let document: DistributionDocument = serde_json::from_reader(reader)?;
    Ok(document.data)
}

pub fn read_distribution_file(path: &Path) -> Result<Vec<DistributionEntry>, DistributionError> {
    let file = File::open(path)?;
    read_distribution(BufReader::new(file))
}

/// Lower bound of a range label, or the score itself.
pub(crate) fn representative_score(label: &str) -> Option<i32> {
    let label = label.trim();
    match label.split_once('-') {
        Some((low, high)) => {
            let low = low.trim().parse::<i32>().ok()?;
            let high = high.trim().parse::<i32>().ok()?;
            Some(low.min(high))
        }
        None => label.parse::<i32>().ok(),
    }
}

fn normalize_points<I>(track: Track, entries: I) -> Vec<ScoreRankPoint>
where
    I: IntoIterator<Item = DistributionEntry>,
{
    // Same score twice keeps the worse (larger) cumulative rank.
    let mut by_score: BTreeMap<i32, u32> = BTreeMap::new();
    for entry in entries {
        let Some(score) = representative_score(&entry.score_label) else {
            warn!(%track, label = %entry.score_label, "skipping unparsable distribution entry");
            continue;
        };
        let rank = by_score.entry(score).or_insert(entry.cumulative_count);
        *rank = (*rank).max(entry.cumulative_count);
    }

    let mut points = Vec::with_capacity(by_score.len());
    let mut worst_so_far = 0u32;
    for (score, rank) in by_score.into_iter().rev() {
        let rank = if rank < worst_so_far {
            warn!(%track, score, rank, expected_at_least = worst_so_far, "distribution rank decreased; clamping");
            worst_so_far
        } else {
            rank
        };
        worst_so_far = rank;
        points.push(ScoreRankPoint { score, rank });
    }
    points
}
