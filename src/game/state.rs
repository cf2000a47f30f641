use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::achievements::Achievement;
use super::deck::{Difficulty, DifficultyTier};
use super::records::{BestRecords, HistoryEntry};
use crate::error::RejectedReason;

pub const STARTING_LIVES: u8 = 3;
pub const WELCOME_FACT: &str = "Match cards to learn interesting environmental facts!";

/// 牌在本局中的稳定下标。
pub type CardId = u32;
/// 对局代数，每次开新局递增，用于丢弃过期的延迟回调。
pub type Generation = u64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub symbol: String,
    #[serde(default)]
    pub is_flipped: bool,
    #[serde(default)]
    pub is_matched: bool,
}

impl Card {
    pub fn new(id: CardId, symbol: impl Into<String>) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            is_flipped: false,
            is_matched: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum GameStatus {
    #[default]
    Idle,
    Running,
    Won,
    Lost,
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, GameStatus::Won | GameStatus::Lost)
    }
}

/// Running 状态内部的翻牌子循环。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TurnPhase {
    WaitingForFirstFlip,
    WaitingForSecondFlip,
    Resolving,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SoundKind {
    Flip,
    Match,
    NoMatch,
    GameStart,
    Victory,
    GameOver,
}

/// 胜利结算明细。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub base_score: u32,
    pub time_bonus: u32,
    pub life_bonus: u32,
    pub hint_penalty: i32,
    pub total_score: u32,
    pub elapsed_seconds: u32,
    pub move_count: u32,
}

impl ScoreBreakdown {
    pub const TIME_LIMIT_SECONDS: u32 = 300;
    pub const TIME_BONUS_PER_SECOND: u32 = 2;
    pub const LIFE_BONUS: u32 = 25;
    pub const HINT_PENALTY: i32 = -50;

    pub fn compute(
        base_score: u32,
        elapsed_seconds: u32,
        lives: u8,
        hint_used: bool,
        move_count: u32,
    ) -> Self {
        let time_bonus = Self::TIME_LIMIT_SECONDS.saturating_sub(elapsed_seconds)
            * Self::TIME_BONUS_PER_SECOND;
        let life_bonus = u32::from(lives) * Self::LIFE_BONUS;
        let hint_penalty = if hint_used { Self::HINT_PENALTY } else { 0 };
        let total_score = (base_score + time_bonus + life_bonus)
            .saturating_sub(hint_penalty.unsigned_abs());
        Self {
            base_score,
            time_bonus,
            life_bonus,
            hint_penalty,
            total_score,
            elapsed_seconds,
            move_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum SessionOutcome {
    Won { breakdown: ScoreBreakdown },
    Lost { score: u32 },
}

/// 对外发出的事件流，UI 负责渲染与播放音效。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    GameStarted {
        difficulty: Difficulty,
        generation: Generation,
        card_count: usize,
    },
    CardFlipped {
        card_id: CardId,
    },
    PairMatched {
        first: CardId,
        second: CardId,
        points: u32,
        combo: u32,
    },
    PairMismatched {
        first: CardId,
        second: CardId,
        lives_remaining: u8,
    },
    CardsHidden {
        card_ids: Vec<CardId>,
    },
    HintRevealed {
        card_ids: Vec<CardId>,
    },
    HintHidden,
    ClockTicked {
        elapsed_seconds: u32,
    },
    FactDispensed {
        text: String,
    },
    SoundCue {
        kind: SoundKind,
    },
    GameWon {
        breakdown: ScoreBreakdown,
    },
    GameLost {
        score: u32,
    },
    AchievementsUnlocked {
        ids: Vec<Achievement>,
    },
    HistoryUpdated {
        entries: Vec<HistoryEntry>,
    },
    BestRecordsUpdated {
        records: BestRecords,
    },
    SaveRequested {
        state: Box<SessionState>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    NonContiguousIds { position: usize, card_id: CardId },
    SymbolCount { symbol: String, count: usize },
    QueueOverflow { length: usize },
    QueuedCardMissing { card_id: CardId },
    MatchedCountMismatch { matched_pairs: usize, matched_cards: usize },
    LivesOutOfRange { lives: u8 },
    StatusMismatch { expected: GameStatus, actual: GameStatus },
}

/// 单局状态：牌面、翻牌队列与计分。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionState {
    pub generation: Generation,
    pub difficulty: Difficulty,
    pub tier: DifficultyTier,
    #[serde(default)]
    pub cards: Vec<Card>,
    #[serde(default)]
    pub flipped_queue: Vec<CardId>,
    pub matched_pair_count: usize,
    pub score: u32,
    pub move_count: u32,
    pub elapsed_seconds: u32,
    pub lives: u8,
    pub combo_streak: u32,
    pub max_combo: u32,
    pub hint_used: bool,
    #[serde(default)]
    pub hint_active: bool,
    pub status: GameStatus,
    pub current_fact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SessionOutcome>,
}

impl SessionState {
    pub fn new(generation: Generation, difficulty: Difficulty, cards: Vec<Card>) -> Self {
        Self {
            generation,
            difficulty,
            tier: difficulty.tier(),
            cards,
            flipped_queue: Vec::with_capacity(2),
            matched_pair_count: 0,
            score: 0,
            move_count: 0,
            elapsed_seconds: 0,
            lives: STARTING_LIVES,
            combo_streak: 0,
            max_combo: 0,
            hint_used: false,
            hint_active: false,
            status: GameStatus::Running,
            current_fact: WELCOME_FACT.to_string(),
            outcome: None,
        }
    }

    /// 尚未开局时的空状态。
    pub fn idle(difficulty: Difficulty) -> Self {
        Self {
            status: GameStatus::Idle,
            ..Self::new(0, difficulty, Vec::new())
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == GameStatus::Running
    }

    pub fn turn_phase(&self) -> Option<TurnPhase> {
        if !self.is_running() {
            return None;
        }
        Some(match self.flipped_queue.len() {
            0 => TurnPhase::WaitingForFirstFlip,
            1 => TurnPhase::WaitingForSecondFlip,
            _ => TurnPhase::Resolving,
        })
    }

    pub fn card(&self, card_id: CardId) -> Option<&Card> {
        self.cards.get(card_id as usize)
    }

    fn card_mut(&mut self, card_id: CardId) -> Option<&mut Card> {
        self.cards.get_mut(card_id as usize)
    }

    pub fn all_pairs_matched(&self) -> bool {
        self.matched_pair_count == self.tier.pair_count
    }

    /// 翻开一张牌；拒绝时不修改任何状态。
    pub fn flip(&mut self, card_id: CardId) -> Result<(), RejectedReason> {
        if !self.is_running() {
            return Err(RejectedReason::NotRunning {
                status: self.status,
            });
        }
        if self.flipped_queue.len() >= 2 {
            return Err(RejectedReason::PairPending);
        }
        if self.flipped_queue.contains(&card_id) {
            return Err(RejectedReason::AlreadyFlipped { card_id });
        }

        let card = self
            .card_mut(card_id)
            .ok_or(RejectedReason::UnknownCard { card_id })?;
        if card.is_matched {
            return Err(RejectedReason::AlreadyMatched { card_id });
        }

        card.is_flipped = true;
        self.flipped_queue.push(card_id);
        Ok(())
    }

    /// 盖回指定的牌，已配对的牌保持不动，并把它们移出翻牌队列。
    pub fn unflip(&mut self, card_ids: &[CardId]) -> Vec<CardId> {
        let mut hidden = Vec::with_capacity(card_ids.len());
        for &card_id in card_ids {
            if let Some(card) = self.card_mut(card_id) {
                if !card.is_matched && card.is_flipped {
                    card.is_flipped = false;
                    hidden.push(card_id);
                }
            }
        }
        self.flipped_queue.retain(|id| !card_ids.contains(id));
        hidden
    }

    pub fn mark_matched(&mut self, card_ids: &[CardId]) {
        for &card_id in card_ids {
            if let Some(card) = self.card_mut(card_id) {
                card.is_flipped = true;
                card.is_matched = true;
            }
        }
    }

    pub fn reveal_unmatched(&mut self) -> Vec<CardId> {
        self.cards
            .iter_mut()
            .filter(|card| !card.is_matched)
            .map(|card| {
                card.is_flipped = true;
                card.id
            })
            .collect()
    }

    pub fn hide_unmatched(&mut self) -> Vec<CardId> {
        let hidden = self
            .cards
            .iter_mut()
            .filter(|card| !card.is_matched && card.is_flipped)
            .map(|card| {
                card.is_flipped = false;
                card.id
            })
            .collect();
        self.flipped_queue.clear();
        hidden
    }

    pub fn lose_life(&mut self) -> u8 {
        self.lives = self.lives.saturating_sub(1);
        self.lives
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        let mut symbols: HashMap<&str, usize> = HashMap::new();
        let mut matched_cards = 0;
        for (position, card) in self.cards.iter().enumerate() {
            if card.id as usize != position {
                return Err(IntegrityError::NonContiguousIds {
                    position,
                    card_id: card.id,
                });
            }
            *symbols.entry(card.symbol.as_str()).or_default() += 1;
            if card.is_matched {
                matched_cards += 1;
            }
        }
        if let Some((symbol, count)) = symbols.into_iter().find(|(_, count)| *count != 2) {
            return Err(IntegrityError::SymbolCount {
                symbol: symbol.to_string(),
                count,
            });
        }

        if self.flipped_queue.len() > 2 {
            return Err(IntegrityError::QueueOverflow {
                length: self.flipped_queue.len(),
            });
        }
        if let Some(&card_id) = self
            .flipped_queue
            .iter()
            .find(|id| self.card(**id).is_none())
        {
            return Err(IntegrityError::QueuedCardMissing { card_id });
        }

        if self.matched_pair_count * 2 != matched_cards {
            return Err(IntegrityError::MatchedCountMismatch {
                matched_pairs: self.matched_pair_count,
                matched_cards,
            });
        }
        if self.lives > STARTING_LIVES {
            return Err(IntegrityError::LivesOutOfRange { lives: self.lives });
        }
        if self.lives == 0 && self.status != GameStatus::Lost {
            return Err(IntegrityError::StatusMismatch {
                expected: GameStatus::Lost,
                actual: self.status,
            });
        }
        if self.all_pairs_matched() && self.status != GameStatus::Won {
            return Err(IntegrityError::StatusMismatch {
                expected: GameStatus::Won,
                actual: self.status,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> SessionState {
        let cards = ["🌱", "💧", "🌱", "💧"]
            .iter()
            .enumerate()
            .map(|(id, symbol)| Card::new(id as CardId, *symbol))
            .collect();
        let mut state = SessionState::new(1, Difficulty::Easy, cards);
        state.tier = DifficultyTier::new(2, 2);
        state
    }

    #[test]
    fn flip_rejections_leave_state_untouched() {
        let mut state = sample_session();
        state.flip(0).expect("first flip");

        let before = state.clone();
        assert_eq!(state.flip(0), Err(RejectedReason::AlreadyFlipped { card_id: 0 }));
        assert_eq!(state.flip(9), Err(RejectedReason::UnknownCard { card_id: 9 }));
        assert_eq!(state, before);

        state.flip(1).expect("second flip");
        assert_eq!(state.flip(2), Err(RejectedReason::PairPending));
        assert_eq!(state.flipped_queue, vec![0, 1]);
        assert_eq!(state.turn_phase(), Some(TurnPhase::Resolving));
    }

    #[test]
    fn matched_cards_cannot_be_flipped_or_unflipped() {
        let mut state = sample_session();
        state.mark_matched(&[0, 2]);
        state.matched_pair_count = 1;
        assert_eq!(state.flip(2), Err(RejectedReason::AlreadyMatched { card_id: 2 }));
        assert!(state.unflip(&[0, 2]).is_empty());
        assert!(state.card(0).unwrap().is_flipped);
        assert!(state.integrity_check().is_ok());
    }

    #[test]
    fn idle_session_rejects_flips() {
        let mut state = sample_session();
        state.status = GameStatus::Idle;
        assert_eq!(
            state.flip(0),
            Err(RejectedReason::NotRunning {
                status: GameStatus::Idle
            })
        );
        assert_eq!(state.turn_phase(), None);
    }

    #[test]
    fn unflip_only_drops_its_own_ids_from_the_queue() {
        let mut state = sample_session();
        state.flip(0).unwrap();
        state.flip(1).unwrap();
        state.flipped_queue = vec![3];
        state.cards[3].is_flipped = true;
        assert_eq!(state.unflip(&[0, 1]), vec![0, 1]);
        assert_eq!(state.flipped_queue, vec![3]);
    }

    #[test]
    fn integrity_check_catches_broken_invariants() {
        let mut state = sample_session();
        state.lives = 0;
        assert!(matches!(
            state.integrity_check(),
            Err(IntegrityError::StatusMismatch { .. })
        ));

        let mut state = sample_session();
        state.cards[1].symbol = "🌱".into();
        assert!(matches!(
            state.integrity_check(),
            Err(IntegrityError::SymbolCount { .. })
        ));
    }

    #[test]
    fn breakdown_applies_bonuses_and_penalty() {
        let breakdown = ScoreBreakdown::compute(100, 50, 3, false, 9);
        assert_eq!(breakdown.time_bonus, 500);
        assert_eq!(breakdown.life_bonus, 75);
        assert_eq!(breakdown.total_score, 675);

        let late = ScoreBreakdown::compute(100, 400, 1, true, 20);
        assert_eq!(late.time_bonus, 0);
        assert_eq!(late.hint_penalty, -50);
        assert_eq!(late.total_score, 75);
    }
}
