//! 配对游戏核心逻辑（牌组、状态机、计分与档案）。

pub mod achievements;
pub mod deck;
pub mod facts;
pub mod records;
pub mod rules;
pub mod schedule;
pub mod state;

pub use achievements::{evaluate as evaluate_achievements, Achievement, WinSummary};
pub use deck::{build_deck, Difficulty, DifficultyTier, ECO_SYMBOLS};
pub use facts::{next_fact, ECO_FACTS};
pub use records::{format_clock, BestRecords, HistoryEntry, ProfileStore, Stats};
pub use rules::{Resolution, RuleEngine};
pub use schedule::{DeferredAction, FixedClock, SystemClock, Ticket, TimerState, WallClock};
pub use state::{
    Card,
    CardId,
    GameEvent,
    GameStatus,
    Generation,
    IntegrityError,
    ScoreBreakdown,
    SessionOutcome,
    SessionState,
    SoundKind,
    TurnPhase,
    STARTING_LIVES,
    WELCOME_FACT,
};
