use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::achievements::Achievement;
use super::deck::Difficulty;
use super::state::ScoreBreakdown;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    /// 毫秒时间戳（Unix epoch）。
    pub timestamp: u64,
    pub difficulty: Difficulty,
    pub score: u32,
    pub elapsed_seconds: u32,
    pub move_count: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BestRecords {
    pub best_score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_time: Option<u32>,
}

impl BestRecords {
    /// 仅在成绩更好时更新，返回是否有变化。
    pub fn record_win(&mut self, total_score: u32, elapsed_seconds: u32) -> bool {
        let mut changed = false;
        if total_score > self.best_score {
            self.best_score = total_score;
            changed = true;
        }
        if self.best_time.map_or(true, |best| elapsed_seconds < best) {
            self.best_time = Some(elapsed_seconds);
            changed = true;
        }
        changed
    }
}

/// 跨局共享的玩家档案：成就、最佳记录与最近对局。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileStore {
    #[serde(default)]
    pub achievements: BTreeSet<Achievement>,
    #[serde(default)]
    pub best: BestRecords,
    #[serde(default)]
    pub history: VecDeque<HistoryEntry>,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl ProfileStore {
    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            achievements: BTreeSet::new(),
            best: BestRecords::default(),
            history: VecDeque::with_capacity(history_limit),
            history_limit,
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let mut store: ProfileStore = serde_json::from_str(json)?;
        store.truncate_history();
        Ok(store)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.history.push_front(entry);
        self.truncate_history();
    }

    fn truncate_history(&mut self) {
        self.history.truncate(self.history_limit);
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.iter().cloned().collect()
    }

    pub fn unlock(&mut self, unlocked: &BTreeSet<Achievement>) {
        self.achievements.extend(unlocked.iter().copied());
    }

    pub fn stats(&self) -> Stats {
        Stats {
            best_score: self.best.best_score,
            best_time: self.best.best_time,
            best_time_label: format_best_time(self.best.best_time),
            games_played: self.history.len(),
            achievements: self.achievements.iter().copied().collect(),
            recent_games: self.history(),
        }
    }
}

/// 统计面板所需的数据。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stats {
    pub best_score: u32,
    pub best_time: Option<u32>,
    pub best_time_label: String,
    pub games_played: usize,
    pub achievements: Vec<Achievement>,
    pub recent_games: Vec<HistoryEntry>,
}

pub fn history_entry(timestamp: u64, difficulty: Difficulty, breakdown: &ScoreBreakdown) -> HistoryEntry {
    HistoryEntry {
        timestamp,
        difficulty,
        score: breakdown.total_score,
        elapsed_seconds: breakdown.elapsed_seconds,
        move_count: breakdown.move_count,
    }
}

/// 把秒数格式化为 `MM:SS`。
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

pub fn format_best_time(best_time: Option<u32>) -> String {
    best_time.map_or_else(|| "--:--".to_string(), format_clock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(score: u32) -> HistoryEntry {
        HistoryEntry {
            timestamp: u64::from(score),
            difficulty: Difficulty::Easy,
            score,
            elapsed_seconds: 30,
            move_count: 9,
        }
    }

    #[test]
    fn history_keeps_the_newest_ten_first() {
        let mut store = ProfileStore::default();
        for score in 0..13 {
            store.push_history(entry(score));
        }
        let scores: Vec<u32> = store.history.iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![12, 11, 10, 9, 8, 7, 6, 5, 4, 3]);
    }

    #[test]
    fn best_records_only_improve() {
        let mut best = BestRecords::default();
        assert!(best.record_win(300, 80));
        assert!(!best.record_win(250, 90));
        assert!(best.record_win(250, 70));
        assert_eq!(best, BestRecords { best_score: 300, best_time: Some(70) });
    }

    #[test]
    fn clock_formats_minutes_and_seconds() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(75), "01:15");
        assert_eq!(format_clock(600), "10:00");
        assert_eq!(format_best_time(None), "--:--");
    }

    #[test]
    fn store_round_trips_through_json_and_reapplies_the_limit() {
        let json = r#"{"achievements":["PerfectGame"],"best":{"best_score":10},"history_limit":1,
            "history":[{"timestamp":2,"difficulty":"hard","score":5,"elapsed_seconds":1,"move_count":2},
                       {"timestamp":1,"difficulty":"easy","score":4,"elapsed_seconds":1,"move_count":2}]}"#;
        let store = ProfileStore::from_json(json).expect("valid profile");
        assert_eq!(store.history.len(), 1);
        assert_eq!(store.history[0].difficulty, Difficulty::Hard);
        assert!(store.achievements.contains(&Achievement::PerfectGame));

        let stats = store.stats();
        assert_eq!(stats.games_played, 1);
        assert_eq!(stats.best_time_label, "--:--");
    }
}
