pub mod config;
pub mod error;
pub mod game;
pub mod logging;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::rc::{Rc, Weak};
use std::str::FromStr;

use gloo_timers::callback::{Interval, Timeout};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use web_sys::js_sys::Function;

pub use config::EngineConfig;
pub use error::{ConfigurationError, EngineError, RejectedReason};
pub use game::{
    build_deck, evaluate_achievements, format_clock, Achievement, BestRecords, Card, CardId,
    DeferredAction, Difficulty, DifficultyTier, FixedClock, GameEvent, GameStatus, Generation,
    HistoryEntry, IntegrityError, ProfileStore, Resolution, RuleEngine, ScoreBreakdown,
    SessionOutcome, SessionState, SoundKind, Stats, SystemClock, Ticket, TimerState, TurnPhase,
    WallClock, WinSummary,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
    logging::init(log::LevelFilter::Info);
}

fn to_js_error<E: Serialize + Display>(error: E) -> JsValue {
    to_value(&error).unwrap_or_else(|_| JsValue::from_str(&error.to_string()))
}

fn serde_to_js_error<E: Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn engine_to_js_error(error: EngineError) -> JsValue {
    match error {
        EngineError::Configuration(error) => to_js_error(error),
        EngineError::Json(error) => serde_to_js_error(error),
    }
}

fn resolution_json(resolution: &Resolution) -> Result<String, JsValue> {
    serde_json::to_string(resolution).map_err(serde_to_js_error)
}

/// 持有规则引擎与浏览器计时器；延迟动作到期后通过监听回调推送结果。
struct Driver {
    rules: RuleEngine,
    listener: Option<Function>,
    timeouts: HashMap<u64, Timeout>,
    interval: Option<(Generation, Interval)>,
}

impl Driver {
    fn sync_timers(inner: &Rc<RefCell<Driver>>, scheduled: &[Ticket]) {
        let weak = Rc::downgrade(inner);
        let mut driver = inner.borrow_mut();

        for ticket in scheduled {
            let weak = weak.clone();
            let pending = ticket.clone();
            let handle = Timeout::new(ticket.delay_ms, move || Driver::on_ticket(&weak, &pending));
            driver.timeouts.insert(ticket.id, handle);
        }

        // dropping a gloo timer cancels it
        let live: HashSet<u64> = driver.rules.live_tickets().iter().map(|t| t.id).collect();
        driver.timeouts.retain(|id, _| live.contains(id));

        match driver.rules.timer() {
            Some(timer) => {
                let current = driver.interval.as_ref().map(|(generation, _)| *generation);
                if current != Some(timer.generation) {
                    let weak = weak.clone();
                    let generation = timer.generation;
                    let interval = Interval::new(timer.interval_ms, move || {
                        Driver::on_tick(&weak, generation)
                    });
                    driver.interval = Some((generation, interval));
                }
            }
            None => driver.interval = None,
        }
    }

    fn on_ticket(weak: &Weak<RefCell<Driver>>, ticket: &Ticket) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let resolution = {
            let mut driver = inner.borrow_mut();
            driver.timeouts.remove(&ticket.id);
            driver.rules.fire(ticket)
        };
        Driver::sync_timers(&inner, &resolution.scheduled);
        Driver::notify(&inner, &resolution);
    }

    fn on_tick(weak: &Weak<RefCell<Driver>>, generation: Generation) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let resolution = inner.borrow_mut().rules.tick(generation);
        if !resolution.events.is_empty() {
            Driver::notify(&inner, &resolution);
        }
    }

    fn notify(inner: &Rc<RefCell<Driver>>, resolution: &Resolution) {
        let listener = inner.borrow().listener.clone();
        let Some(listener) = listener else {
            return;
        };
        match resolution_json(resolution) {
            Ok(json) => {
                if let Err(error) = listener.call1(&JsValue::NULL, &JsValue::from_str(&json)) {
                    log::warn!("event listener threw: {error:?}");
                }
            }
            Err(error) => log::error!("cannot serialize resolution: {error:?}"),
        }
    }
}

#[wasm_bindgen]
pub struct GameEngine {
    inner: Rc<RefCell<Driver>>,
}

impl GameEngine {
    fn run<E, F>(&self, command: F, to_error: fn(E) -> JsValue) -> Result<String, JsValue>
    where
        F: FnOnce(&mut RuleEngine) -> Result<Resolution, E>,
    {
        let resolution = command(&mut self.inner.borrow_mut().rules).map_err(to_error)?;
        Driver::sync_timers(&self.inner, &resolution.scheduled);
        resolution_json(&resolution)
    }
}

#[wasm_bindgen]
impl GameEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(
        config_json: Option<String>,
        profile_json: Option<String>,
    ) -> Result<GameEngine, JsValue> {
        let config = match config_json {
            Some(json) => EngineConfig::from_json(&json).map_err(engine_to_js_error)?,
            None => EngineConfig::default(),
        };
        let mut rules = RuleEngine::new(config).map_err(to_js_error)?;
        if let Some(json) = profile_json {
            let profile = ProfileStore::from_json(&json).map_err(serde_to_js_error)?;
            rules = rules.with_profile(profile);
        }
        Ok(GameEngine {
            inner: Rc::new(RefCell::new(Driver {
                rules,
                listener: None,
                timeouts: HashMap::new(),
                interval: None,
            })),
        })
    }

    /// 注册事件回调，参数为 JSON 字符串形式的 Resolution。
    #[wasm_bindgen(js_name = "onEvent")]
    pub fn on_event(&self, callback: Option<Function>) {
        self.inner.borrow_mut().listener = callback;
    }

    #[wasm_bindgen(js_name = "startGame")]
    pub fn start_game(&self, difficulty: Option<String>) -> Result<String, JsValue> {
        let difficulty = match difficulty.as_deref() {
            Some(value) => Difficulty::from_str(value).map_err(to_js_error)?,
            None => self.inner.borrow().rules.config().difficulty,
        };
        self.run(|rules| rules.start_game(difficulty), to_js_error)
    }

    #[wasm_bindgen(js_name = "resetGame")]
    pub fn reset_game(&self) -> Result<String, JsValue> {
        self.run(RuleEngine::reset_game, to_js_error)
    }

    #[wasm_bindgen(js_name = "changeDifficulty")]
    pub fn change_difficulty(&self, difficulty: &str) -> Result<String, JsValue> {
        let difficulty = Difficulty::from_str(difficulty).map_err(to_js_error)?;
        self.run(|rules| rules.change_difficulty(difficulty), to_js_error)
    }

    pub fn flip(&self, card_id: CardId) -> Result<String, JsValue> {
        self.run(|rules| rules.flip(card_id), to_js_error)
    }

    #[wasm_bindgen(js_name = "useHint")]
    pub fn use_hint(&self) -> Result<String, JsValue> {
        self.run(RuleEngine::use_hint, to_js_error)
    }

    #[wasm_bindgen(js_name = "saveGame")]
    pub fn save_game(&self) -> Result<String, JsValue> {
        resolution_json(&self.inner.borrow().rules.save_game())
    }

    #[wasm_bindgen(js_name = "setSound")]
    pub fn set_sound(&self, enabled: bool) -> bool {
        self.inner.borrow_mut().rules.set_sound_enabled(enabled)
    }

    #[wasm_bindgen(js_name = "toggleSound")]
    pub fn toggle_sound(&self) -> bool {
        self.inner.borrow_mut().rules.toggle_sound()
    }

    #[wasm_bindgen(js_name = "stateJson")]
    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.inner.borrow().rules.state()).map_err(serde_to_js_error)
    }

    #[wasm_bindgen(js_name = "profileJson")]
    pub fn profile_json(&self) -> Result<String, JsValue> {
        self.inner
            .borrow()
            .rules
            .profile()
            .to_json()
            .map_err(serde_to_js_error)
    }

    #[wasm_bindgen(js_name = "statsJson")]
    pub fn stats_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner.borrow().rules.stats()).map_err(serde_to_js_error)
    }
}

/// 按难度生成一副洗好的牌，主要供前端调试。
#[wasm_bindgen(js_name = "buildDeck")]
pub fn build_deck_js(difficulty: &str, seed: Option<u64>) -> Result<JsValue, JsValue> {
    let difficulty = Difficulty::from_str(difficulty).map_err(to_js_error)?;
    let mut rng = match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };
    let deck = build_deck(&difficulty.tier(), &game::ECO_SYMBOLS, &mut rng).map_err(to_js_error)?;
    to_value(&deck).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "difficultyTiers")]
pub fn difficulty_tiers() -> Result<JsValue, JsValue> {
    let tiers: Vec<(Difficulty, DifficultyTier)> = Difficulty::ALL
        .into_iter()
        .map(|difficulty| (difficulty, difficulty.tier()))
        .collect();
    to_value(&tiers).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "evaluateAchievements")]
pub fn evaluate_achievements_js(summary: JsValue, unlocked: JsValue) -> Result<JsValue, JsValue> {
    let summary: WinSummary = from_value(summary).map_err(JsValue::from)?;
    let unlocked: Vec<Achievement> = if unlocked.is_undefined() || unlocked.is_null() {
        Vec::new()
    } else {
        from_value(unlocked).map_err(JsValue::from)?
    };
    let newly = evaluate_achievements(&summary, &unlocked.into_iter().collect());
    to_value(&newly).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "formatClock")]
pub fn format_clock_js(seconds: u32) -> String {
    format_clock(seconds)
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: SessionState = from_value(state).map_err(JsValue::from)?;
    state.integrity_check().map_err(to_js_error_plain)
}

fn to_js_error_plain<E: Serialize + std::fmt::Debug>(error: E) -> JsValue {
    to_value(&error).unwrap_or_else(|_| JsValue::from_str(&format!("{error:?}")))
}

#[wasm_bindgen(js_name = "setLogLevel")]
pub fn set_log_level(level: &str) {
    logging::init(logging::parse_level(level));
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}
