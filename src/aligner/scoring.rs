use serde::{Deserialize, Serialize};

/// Linear gap scoring scheme. Scores are maximized.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapLinear {
    pub match_score: i32,
    pub mismatch_score: i32,
    pub gap_score: i32,
}

impl GapLinear {
    pub fn new(match_score: i32, mismatch_score: i32, gap_score: i32) -> Self {
        Self { match_score, mismatch_score, gap_score }
    }

    #[inline(always)]
    pub fn substitution(&self, a: u8, b: u8) -> i32 {
        if a == b { self.match_score } else { self.mismatch_score }
    }

    #[inline(always)]
    pub fn gap(&self) -> i32 {
        self.gap_score
    }

    pub fn gap_cost(&self, length: usize) -> i32 {
        length as i32 * self.gap_score
    }
}

impl Default for GapLinear {
    fn default() -> Self {
        Self::new(8, -6, -8)
    }
}
