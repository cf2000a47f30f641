use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::state::{Card, CardId};
use crate::error::ConfigurationError;

/// 默认的环保符号池。
pub static ECO_SYMBOLS: Lazy<Vec<String>> = Lazy::new(|| {
    [
        "🌱", "🌿", "🌳", "🌺", "🌻", "♻️", "💧", "🌍", "🦋", "🐝", "🌞", "🌈", "🍃", "🌊", "🌵",
        "🦔",
    ]
    .iter()
    .map(|symbol| symbol.to_string())
    .collect()
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Expert,
    ];

    pub fn tier(self) -> DifficultyTier {
        match self {
            Difficulty::Easy => DifficultyTier::new(6, 3),
            Difficulty::Medium => DifficultyTier::new(8, 4),
            Difficulty::Hard => DifficultyTier::new(12, 4),
            Difficulty::Expert => DifficultyTier::new(15, 5),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" | "normal" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            "expert" => Ok(Difficulty::Expert),
            _ => Err(ConfigurationError::UnknownDifficulty {
                value: s.to_string(),
            }),
        }
    }
}

/// 难度对应的牌面配置（对数与列数）。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DifficultyTier {
    pub pair_count: usize,
    pub grid_columns: usize,
}

impl DifficultyTier {
    pub const fn new(pair_count: usize, grid_columns: usize) -> Self {
        Self {
            pair_count,
            grid_columns,
        }
    }

    pub fn card_count(&self) -> usize {
        self.pair_count * 2
    }

    pub fn grid_rows(&self) -> usize {
        if self.grid_columns == 0 {
            return 0;
        }
        self.card_count().div_ceil(self.grid_columns)
    }
}

fn validate_pool(tier: &DifficultyTier, symbols: &[String]) -> Result<(), ConfigurationError> {
    if tier.pair_count == 0 {
        return Err(ConfigurationError::EmptyTier);
    }

    let mut seen = HashSet::new();
    for symbol in symbols {
        if !seen.insert(symbol.as_str()) {
            return Err(ConfigurationError::DuplicateSymbol {
                symbol: symbol.clone(),
            });
        }
    }

    if tier.pair_count > symbols.len() {
        return Err(ConfigurationError::NotEnoughSymbols {
            requested: tier.pair_count,
            available: symbols.len(),
        });
    }
    Ok(())
}

/// 洗牌生成成对的牌组：先无放回抽取符号，再复制成对并做 Fisher–Yates 洗牌。
pub fn build_deck<R: Rng + ?Sized>(
    tier: &DifficultyTier,
    symbols: &[String],
    rng: &mut R,
) -> Result<Vec<Card>, ConfigurationError> {
    validate_pool(tier, symbols)?;

    let chosen: Vec<&String> = symbols.choose_multiple(rng, tier.pair_count).collect();
    let mut pairs: Vec<String> = chosen
        .iter()
        .chain(chosen.iter())
        .map(|symbol| (*symbol).clone())
        .collect();
    pairs.shuffle(rng);

    Ok(pairs
        .into_iter()
        .enumerate()
        .map(|(index, symbol)| Card::new(index as CardId, symbol))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn every_tier_builds_a_paired_contiguous_deck() {
        let mut rng = SmallRng::seed_from_u64(7);
        for difficulty in Difficulty::ALL {
            let tier = difficulty.tier();
            let deck = build_deck(&tier, &ECO_SYMBOLS, &mut rng).expect("tier should fit the pool");

            assert_eq!(deck.len(), tier.pair_count * 2);
            for (index, card) in deck.iter().enumerate() {
                assert_eq!(card.id as usize, index);
                assert!(!card.is_flipped && !card.is_matched);
            }

            let mut counts: HashMap<&str, usize> = HashMap::new();
            for card in &deck {
                *counts.entry(card.symbol.as_str()).or_default() += 1;
            }
            assert_eq!(counts.len(), tier.pair_count);
            assert!(counts.values().all(|count| *count == 2));
        }
    }

    #[test]
    fn oversized_tier_is_a_configuration_error() {
        let mut rng = SmallRng::seed_from_u64(1);
        let tier = DifficultyTier::new(17, 5);
        let err = build_deck(&tier, &ECO_SYMBOLS, &mut rng).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::NotEnoughSymbols {
                requested: 17,
                available: 16
            }
        );
    }

    #[test]
    fn duplicate_symbols_and_empty_tiers_are_rejected() {
        let mut rng = SmallRng::seed_from_u64(1);
        let pool = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        assert!(matches!(
            build_deck(&DifficultyTier::new(2, 2), &pool, &mut rng),
            Err(ConfigurationError::DuplicateSymbol { .. })
        ));
        assert_eq!(
            build_deck(&DifficultyTier::new(0, 2), &ECO_SYMBOLS, &mut rng).unwrap_err(),
            ConfigurationError::EmptyTier
        );
    }

    #[test]
    fn shuffle_varies_with_the_seed() {
        let tier = Difficulty::Expert.tier();
        let first = build_deck(&tier, &ECO_SYMBOLS, &mut SmallRng::seed_from_u64(1)).unwrap();
        let second = build_deck(&tier, &ECO_SYMBOLS, &mut SmallRng::seed_from_u64(2)).unwrap();
        let symbols = |deck: &[Card]| deck.iter().map(|c| c.symbol.clone()).collect::<Vec<_>>();
        assert_ne!(symbols(&first), symbols(&second));
    }

    #[test]
    fn difficulty_names_parse_loosely() {
        assert_eq!("Normal".parse::<Difficulty>().unwrap(), Difficulty::Medium);
        assert_eq!(" EXPERT ".parse::<Difficulty>().unwrap(), Difficulty::Expert);
        assert!("impossible".parse::<Difficulty>().is_err());
        assert_eq!(Difficulty::Hard.tier().grid_rows(), 6);
        assert_eq!(Difficulty::Expert.tier().grid_rows(), 6);
    }
}
