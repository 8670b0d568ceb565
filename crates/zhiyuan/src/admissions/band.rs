use serde::{Deserialize, Serialize};

/// Reach / match / safe selector, or the blended range spanning all three.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    Blended,
    Reach,
    Match,
    Safe,
}

impl Strategy {
    /// Unknown selectors resolve to [`Strategy::Blended`].
    pub fn from_selector(selector: &str) -> Self {
        match selector.trim().to_ascii_lowercase().as_str() {
            "1" | "reach" | "冲" => Strategy::Reach,
            "2" | "match" | "稳" => Strategy::Match,
            "3" | "safe" | "保" => Strategy::Safe,
            _ => Strategy::Blended,
        }
    }
}

/// Signed offsets applied to a reference score; `min <= max` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BandOffsets {
    min: i32,
    max: i32,
}

impl BandOffsets {
    pub fn new(min: i32, max: i32) -> Option<Self> {
        (min <= max).then_some(Self { min, max })
    }

    const fn fixed(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }
}

/// Inclusive score window matched against an admission line's minimum score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreWindow {
    pub lower_score: i32,
    pub upper_score: i32,
}

impl ScoreWindow {
    pub fn contains(&self, score: i32) -> bool {
        self.lower_score <= score && score <= self.upper_score
    }
}

/// Per-strategy offsets. Defaults: blended −20..+20, reach +10..+20,
/// match −10..+10, safe −20..−10.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandTable {
    blended: BandOffsets,
    reach: BandOffsets,
    matched: BandOffsets,
    safe: BandOffsets,
}

impl Default for BandTable {
    fn default() -> Self {
        Self {
            blended: BandOffsets::fixed(-20, 20),
            reach: BandOffsets::fixed(10, 20),
            matched: BandOffsets::fixed(-10, 10),
            safe: BandOffsets::fixed(-20, -10),
        }
    }
}

impl BandTable {
    pub fn with_offsets(mut self, strategy: Strategy, offsets: BandOffsets) -> Self {
        *self.slot(strategy) = offsets;
        self
    }

    pub fn offsets(&self, strategy: Strategy) -> BandOffsets {
        match strategy {
            Strategy::Blended => self.blended,
            Strategy::Reach => self.reach,
            Strategy::Match => self.matched,
            Strategy::Safe => self.safe,
        }
    }

    /// Each bound is floored at zero on its own so a low reference score
    /// narrows the window instead of collapsing it.
    pub fn band_for(&self, reference_score: i32, strategy: Strategy) -> ScoreWindow {
        let offsets = self.offsets(strategy);
        let lower_score = reference_score.saturating_add(offsets.min).max(0);
        let upper_score = reference_score.saturating_add(offsets.max).max(0);
        ScoreWindow {
            lower_score,
            upper_score,
        }
    }

    fn slot(&mut self, strategy: Strategy) -> &mut BandOffsets {
        match strategy {
            Strategy::Blended => &mut self.blended,
            Strategy::Reach => &mut self.reach,
            Strategy::Match => &mut self.matched,
            Strategy::Safe => &mut self.safe,
        }
    }
}
