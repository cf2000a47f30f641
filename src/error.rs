//! 引擎与 wasm 桥共用的错误类型。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::{CardId, GameStatus};

/// 无法开局的难度档位、符号池或引擎配置。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum ConfigurationError {
    #[error("a tier needs at least one pair")]
    EmptyTier,
    #[error("tier wants {requested} pairs but only {available} distinct symbols exist")]
    NotEnoughSymbols { requested: usize, available: usize },
    #[error("symbol pool contains {symbol:?} more than once")]
    DuplicateSymbol { symbol: String },
    #[error("unknown difficulty {value:?}")]
    UnknownDifficulty { value: String },
    #[error("{field} must be greater than zero")]
    ZeroSetting { field: String },
}

/// 翻牌或提示请求被拒绝的原因；拒绝不会改变状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum RejectedReason {
    #[error("session is {status:?}, not running")]
    NotRunning { status: GameStatus },
    #[error("card {card_id} does not exist")]
    UnknownCard { card_id: CardId },
    #[error("card {card_id} is already face up")]
    AlreadyFlipped { card_id: CardId },
    #[error("card {card_id} is already matched")]
    AlreadyMatched { card_id: CardId },
    #[error("two cards are waiting to be resolved")]
    PairPending,
    #[error("the hint was already used this session")]
    HintAlreadyUsed,
}

/// JSON 与 wasm 边界上的错误。
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
