//! 胜利时评估的成就规则。每条规则互相独立，一旦解锁永不重复。

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::deck::Difficulty;
use super::state::STARTING_LIVES;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Achievement {
    EcoMaster,
    SpeedMatcher,
    MemoryExpert,
    ComboKing,
    HardModeChampion,
    ExpertModeChampion,
    PerfectGame,
}

impl Achievement {
    pub const ALL: [Achievement; 7] = [
        Achievement::EcoMaster,
        Achievement::SpeedMatcher,
        Achievement::MemoryExpert,
        Achievement::ComboKing,
        Achievement::HardModeChampion,
        Achievement::ExpertModeChampion,
        Achievement::PerfectGame,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Achievement::EcoMaster => "Eco Master",
            Achievement::SpeedMatcher => "Speed Matcher",
            Achievement::MemoryExpert => "Memory Expert",
            Achievement::ComboKing => "Combo King",
            Achievement::HardModeChampion => "Hard Mode Champion",
            Achievement::ExpertModeChampion => "Expert Mode Champion",
            Achievement::PerfectGame => "Perfect Game",
        }
    }

    fn is_earned(self, summary: &WinSummary) -> bool {
        match self {
            Achievement::EcoMaster => summary.total_score >= 200,
            Achievement::SpeedMatcher => summary.elapsed_seconds < 60,
            // moves <= pairs * 1.5, kept in integers
            Achievement::MemoryExpert => {
                summary.move_count as usize * 2 <= summary.difficulty.tier().pair_count * 3
            }
            Achievement::ComboKing => summary.max_combo >= 5,
            Achievement::HardModeChampion => summary.difficulty == Difficulty::Hard,
            Achievement::ExpertModeChampion => summary.difficulty == Difficulty::Expert,
            Achievement::PerfectGame => summary.lives == STARTING_LIVES,
        }
    }
}

impl fmt::Display for Achievement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// 胜利结算时交给评估器的数据。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WinSummary {
    pub total_score: u32,
    pub elapsed_seconds: u32,
    pub move_count: u32,
    pub difficulty: Difficulty,
    pub max_combo: u32,
    pub lives: u8,
}

/// 返回本次新解锁的成就（不含已解锁的）。
pub fn evaluate(
    summary: &WinSummary,
    already_unlocked: &BTreeSet<Achievement>,
) -> BTreeSet<Achievement> {
    Achievement::ALL
        .into_iter()
        .filter(|achievement| !already_unlocked.contains(achievement))
        .filter(|achievement| achievement.is_earned(summary))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> WinSummary {
        WinSummary {
            total_score: 150,
            elapsed_seconds: 120,
            move_count: 20,
            difficulty: Difficulty::Medium,
            max_combo: 2,
            lives: 1,
        }
    }

    #[test]
    fn modest_win_unlocks_nothing() {
        assert!(evaluate(&summary(), &BTreeSet::new()).is_empty());
    }

    #[test]
    fn each_rule_fires_on_its_own_condition() {
        let cases = [
            (WinSummary { total_score: 200, ..summary() }, Achievement::EcoMaster),
            (WinSummary { elapsed_seconds: 59, ..summary() }, Achievement::SpeedMatcher),
            (WinSummary { move_count: 12, ..summary() }, Achievement::MemoryExpert),
            (WinSummary { max_combo: 5, ..summary() }, Achievement::ComboKing),
            (
                WinSummary { difficulty: Difficulty::Hard, move_count: 30, ..summary() },
                Achievement::HardModeChampion,
            ),
            (
                WinSummary { difficulty: Difficulty::Expert, move_count: 30, ..summary() },
                Achievement::ExpertModeChampion,
            ),
            (WinSummary { lives: 3, ..summary() }, Achievement::PerfectGame),
        ];

        for (input, expected) in cases {
            let unlocked = evaluate(&input, &BTreeSet::new());
            assert_eq!(unlocked, BTreeSet::from([expected]), "{expected:?}");
        }
    }

    #[test]
    fn boundaries_are_exclusive_where_the_rule_says_so() {
        let at_sixty = WinSummary { elapsed_seconds: 60, ..summary() };
        assert!(!evaluate(&at_sixty, &BTreeSet::new()).contains(&Achievement::SpeedMatcher));

        let thirteen_moves = WinSummary { move_count: 13, ..summary() };
        assert!(!evaluate(&thirteen_moves, &BTreeSet::new()).contains(&Achievement::MemoryExpert));
    }

    #[test]
    fn unlocked_achievements_never_fire_again() {
        let perfect = WinSummary { lives: 3, ..summary() };
        let unlocked = BTreeSet::from([Achievement::PerfectGame]);
        assert!(evaluate(&perfect, &unlocked).is_empty());
    }
}
