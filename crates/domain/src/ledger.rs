//! Experience points, levels and rewards

/// Experience needed per level
pub const XP_PER_LEVEL: u64 = 1000;

/// `floor(xp / 1000) + 1`
pub fn level(xp: u64) -> u64 {
    xp / XP_PER_LEVEL + 1
}

/// Fraction of the current level already earned, in `[0, 1)`
pub fn progress(xp: u64) -> f64 {
    (xp % XP_PER_LEVEL) as f64 / XP_PER_LEVEL as f64
}

/// Experience granted per action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpRewards {
    pub question: u32,
    pub answer: u32,
    pub best_answer: u32,
}

impl Default for XpRewards {
    fn default() -> Self {
        Self {
            question: 50,
            answer: 10,
            best_answer: 25,
        }
    }
}
