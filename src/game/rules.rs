use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::{
    achievements::{self, WinSummary},
    deck::{build_deck, Difficulty},
    facts::next_fact,
    records::{history_entry, ProfileStore, Stats},
    schedule::{DeferredAction, Schedule, SystemClock, Ticket, TimerState, WallClock},
    state::{
        CardId, GameEvent, GameStatus, Generation, ScoreBreakdown, SessionOutcome, SessionState,
        SoundKind,
    },
};
use crate::config::EngineConfig;
use crate::error::{ConfigurationError, RejectedReason};

/// 一次命令的结果：最新快照、事件流以及新排期的延迟动作。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub state: SessionState,
    pub events: Vec<GameEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scheduled: Vec<Ticket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer: Option<TimerState>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.scheduled.is_empty()
    }
}

struct Outbox {
    sound_enabled: bool,
    events: Vec<GameEvent>,
    scheduled: Vec<Ticket>,
}

impl Outbox {
    fn new(sound_enabled: bool) -> Self {
        Self {
            sound_enabled,
            events: Vec::new(),
            scheduled: Vec::new(),
        }
    }

    fn push(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    fn sound(&mut self, kind: SoundKind) {
        if self.sound_enabled {
            self.events.push(GameEvent::SoundCue { kind });
        }
    }
}

/// 配对游戏的规则引擎：持有当前对局、玩家档案与延迟动作表。
pub struct RuleEngine {
    config: EngineConfig,
    session: SessionState,
    profile: ProfileStore,
    schedule: Schedule,
    rng: SmallRng,
    clock: Box<dyn WallClock>,
    generation: Generation,
}

impl RuleEngine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Ok(Self {
            session: SessionState::idle(config.difficulty),
            profile: ProfileStore::with_history_limit(config.history_limit),
            schedule: Schedule::default(),
            rng,
            clock: Box::new(SystemClock),
            generation: 0,
            config,
        })
    }

    pub fn with_profile(mut self, mut profile: ProfileStore) -> Self {
        profile.history_limit = self.config.history_limit;
        profile.history.truncate(profile.history_limit);
        self.profile = profile;
        self
    }

    pub fn with_clock(mut self, clock: impl WallClock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.session
    }

    pub fn profile(&self) -> &ProfileStore {
        &self.profile
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> Stats {
        self.profile.stats()
    }

    pub fn live_tickets(&self) -> &[Ticket] {
        self.schedule.live()
    }

    pub fn is_ticket_live(&self, ticket: &Ticket) -> bool {
        ticket.generation == self.generation && self.schedule.is_live(ticket.id)
    }

    pub fn timer(&self) -> Option<TimerState> {
        self.schedule.timer()
    }

    pub fn sound_enabled(&self) -> bool {
        self.config.sound_enabled
    }

    pub fn set_sound_enabled(&mut self, enabled: bool) -> bool {
        self.config.sound_enabled = enabled;
        enabled
    }

    pub fn toggle_sound(&mut self) -> bool {
        self.set_sound_enabled(!self.config.sound_enabled)
    }

    fn outbox(&self) -> Outbox {
        Outbox::new(self.config.sound_enabled)
    }

    fn resolution(&self, outbox: Outbox) -> Resolution {
        Resolution {
            state: self.session.clone(),
            events: outbox.events,
            scheduled: outbox.scheduled,
            timer: self.schedule.timer(),
        }
    }

    /// 开始新对局；旧对局的计时器与延迟动作全部作废。
    pub fn start_game(&mut self, difficulty: Difficulty) -> Result<Resolution, ConfigurationError> {
        let tier = difficulty.tier();
        let cards = build_deck(&tier, self.config.symbols(), &mut self.rng).map_err(|error| {
            log::warn!("cannot start {difficulty} game: {error}");
            error
        })?;

        self.config.difficulty = difficulty;
        self.generation += 1;
        self.schedule.cancel_all();
        self.schedule
            .start_timer(self.generation, self.config.tick_interval_ms);
        self.session = SessionState::new(self.generation, difficulty, cards);
        log::info!(
            "game {} started on {difficulty} with {} cards",
            self.generation,
            tier.card_count()
        );

        let mut outbox = self.outbox();
        outbox.push(GameEvent::GameStarted {
            difficulty,
            generation: self.generation,
            card_count: tier.card_count(),
        });
        outbox.sound(SoundKind::GameStart);
        Ok(self.resolution(outbox))
    }

    /// 按当前对局（或配置）的难度重新开局。
    pub fn reset_game(&mut self) -> Result<Resolution, ConfigurationError> {
        self.start_game(self.config.difficulty)
    }

    pub fn change_difficulty(
        &mut self,
        difficulty: Difficulty,
    ) -> Result<Resolution, ConfigurationError> {
        self.start_game(difficulty)
    }

    pub fn flip(&mut self, card_id: CardId) -> Result<Resolution, RejectedReason> {
        self.session.flip(card_id).map_err(|reason| {
            log::debug!("flip {card_id} rejected: {reason}");
            reason
        })?;

        let mut outbox = self.outbox();
        outbox.sound(SoundKind::Flip);
        outbox.push(GameEvent::CardFlipped { card_id });

        if self.session.flipped_queue.len() == 2 {
            let (first, second) = (self.session.flipped_queue[0], self.session.flipped_queue[1]);
            self.resolve_pair(first, second, &mut outbox);
        }

        Ok(self.resolution(outbox))
    }

    fn resolve_pair(&mut self, first: CardId, second: CardId, outbox: &mut Outbox) {
        let symbols_match = match (self.session.card(first), self.session.card(second)) {
            (Some(a), Some(b)) => a.symbol == b.symbol,
            _ => false,
        };
        self.session.move_count += 1;

        if symbols_match {
            self.apply_match(first, second, outbox);
        } else {
            self.apply_mismatch(first, second, outbox);
        }
    }

    fn apply_match(&mut self, first: CardId, second: CardId, outbox: &mut Outbox) {
        let session = &mut self.session;
        // bonus uses the streak before this match
        let points = 10 + 5 * session.combo_streak;
        session.score += points;
        session.combo_streak += 1;
        session.max_combo = session.max_combo.max(session.combo_streak);
        session.matched_pair_count += 1;
        session.mark_matched(&[first, second]);
        session.flipped_queue.clear();

        let fact = next_fact(&mut self.rng);
        self.session.current_fact = fact.to_string();
        log::debug!(
            "pair {first}/{second} matched for {points} points, combo {}",
            self.session.combo_streak
        );

        outbox.push(GameEvent::PairMatched {
            first,
            second,
            points,
            combo: self.session.combo_streak,
        });
        outbox.sound(SoundKind::Match);
        outbox.push(GameEvent::FactDispensed {
            text: fact.to_string(),
        });

        if self.session.all_pairs_matched() {
            self.finalize_win(outbox);
        }
    }

    fn apply_mismatch(&mut self, first: CardId, second: CardId, outbox: &mut Outbox) {
        self.session.combo_streak = 0;
        let lives_remaining = self.session.lose_life();
        let ticket = self.schedule.defer(
            self.generation,
            self.config.mismatch_delay_ms,
            DeferredAction::Unflip {
                card_ids: [first, second],
            },
        );
        log::debug!("pair {first}/{second} mismatched, {lives_remaining} lives left");

        outbox.push(GameEvent::PairMismatched {
            first,
            second,
            lives_remaining,
        });
        outbox.sound(SoundKind::NoMatch);
        outbox.scheduled.push(ticket);

        if lives_remaining == 0 {
            self.finalize_loss(outbox);
        }
    }

    fn finalize_win(&mut self, outbox: &mut Outbox) {
        self.schedule.stop_timer();
        self.schedule.cancel_all();

        let session = &mut self.session;
        session.status = GameStatus::Won;
        session.hint_active = false;
        let breakdown = ScoreBreakdown::compute(
            session.score,
            session.elapsed_seconds,
            session.lives,
            session.hint_used,
            session.move_count,
        );
        session.outcome = Some(SessionOutcome::Won { breakdown });
        log::info!(
            "game {} won: {} points in {}s",
            self.generation,
            breakdown.total_score,
            breakdown.elapsed_seconds
        );

        outbox.push(GameEvent::GameWon { breakdown });
        outbox.sound(SoundKind::Victory);

        if self
            .profile
            .best
            .record_win(breakdown.total_score, breakdown.elapsed_seconds)
        {
            outbox.push(GameEvent::BestRecordsUpdated {
                records: self.profile.best,
            });
        }

        let entry = history_entry(self.clock.now_millis(), session.difficulty, &breakdown);
        self.profile.push_history(entry);
        outbox.push(GameEvent::HistoryUpdated {
            entries: self.profile.history(),
        });

        let summary = WinSummary {
            total_score: breakdown.total_score,
            elapsed_seconds: breakdown.elapsed_seconds,
            move_count: breakdown.move_count,
            difficulty: self.session.difficulty,
            max_combo: self.session.max_combo,
            lives: self.session.lives,
        };
        let unlocked = achievements::evaluate(&summary, &self.profile.achievements);
        if !unlocked.is_empty() {
            log::info!("achievements unlocked: {unlocked:?}");
            self.profile.unlock(&unlocked);
            outbox.push(GameEvent::AchievementsUnlocked {
                ids: unlocked.into_iter().collect(),
            });
        }
    }

    fn finalize_loss(&mut self, outbox: &mut Outbox) {
        // pending unflip/hint-hide tickets stay live so the board settles face-down
        self.schedule.stop_timer();
        self.session.status = GameStatus::Lost;
        let score = self.session.score;
        self.session.outcome = Some(SessionOutcome::Lost { score });
        log::info!("game {} lost with {score} points", self.generation);

        outbox.push(GameEvent::GameLost { score });
        outbox.sound(SoundKind::GameOver);
    }

    pub fn use_hint(&mut self) -> Result<Resolution, RejectedReason> {
        if !self.session.is_running() {
            return Err(RejectedReason::NotRunning {
                status: self.session.status,
            });
        }
        if self.session.hint_used {
            return Err(RejectedReason::HintAlreadyUsed);
        }

        let revealed = self.session.reveal_unmatched();
        self.session.hint_used = true;
        self.session.hint_active = true;
        let ticket = self.schedule.defer(
            self.generation,
            self.config.hint_duration_ms,
            DeferredAction::HideHint,
        );
        log::debug!("hint revealed {} cards", revealed.len());

        let mut outbox = self.outbox();
        outbox.push(GameEvent::HintRevealed { card_ids: revealed });
        outbox.scheduled.push(ticket);
        Ok(self.resolution(outbox))
    }

    /// 执行到期的延迟动作；过期或已取消的票据不产生任何变化。
    pub fn fire(&mut self, ticket: &Ticket) -> Resolution {
        let mut outbox = self.outbox();
        let Some(ticket) = self.schedule.redeem(ticket, self.generation) else {
            log::debug!("ignoring stale ticket {}", ticket.id);
            return self.resolution(outbox);
        };

        match ticket.action {
            DeferredAction::Unflip { card_ids } => {
                if self.session.hint_active {
                    self.session.flipped_queue.retain(|id| !card_ids.contains(id));
                } else {
                    let hidden = self.session.unflip(&card_ids);
                    if !hidden.is_empty() {
                        outbox.push(GameEvent::CardsHidden { card_ids: hidden });
                    }
                }
            }
            DeferredAction::HideHint => {
                self.session.hint_active = false;
                self.schedule
                    .retain(|live| !matches!(live.action, DeferredAction::Unflip { .. }));
                let hidden = self.session.hide_unmatched();
                outbox.push(GameEvent::HintHidden);
                if !hidden.is_empty() {
                    outbox.push(GameEvent::CardsHidden { card_ids: hidden });
                }
            }
        }
        self.resolution(outbox)
    }

    /// 计时器每秒调用一次；代数不符或对局已结束时忽略。
    pub fn tick(&mut self, generation: Generation) -> Resolution {
        let mut outbox = self.outbox();
        if self.schedule.timer_matches(generation) && self.session.is_running() {
            self.session.elapsed_seconds += 1;
            outbox.push(GameEvent::ClockTicked {
                elapsed_seconds: self.session.elapsed_seconds,
            });
        }
        self.resolution(outbox)
    }

    pub fn save_game(&self) -> Resolution {
        let mut outbox = self.outbox();
        outbox.push(GameEvent::SaveRequested {
            state: Box::new(self.session.clone()),
        });
        self.resolution(outbox)
    }
}
