//! 延迟动作与计时器。所有延迟回调都带有对局代数，过期的回调直接忽略。

use serde::{Deserialize, Serialize};

use super::state::{CardId, Generation};

pub type TicketId = u64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum DeferredAction {
    /// 未配对的两张牌延迟盖回。
    Unflip { card_ids: [CardId; 2] },
    /// 提示结束，盖回所有未配对的牌。
    HideHint,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ticket {
    pub id: TicketId,
    pub generation: Generation,
    pub delay_ms: u32,
    pub action: DeferredAction,
}

/// 当前对局的计时器状态；驱动方按 `interval_ms` 调用 `tick`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerState {
    pub generation: Generation,
    pub interval_ms: u32,
}

#[derive(Debug, Default)]
pub struct Schedule {
    next_id: TicketId,
    live: Vec<Ticket>,
    timer: Option<TimerState>,
}

impl Schedule {
    pub fn defer(&mut self, generation: Generation, delay_ms: u32, action: DeferredAction) -> Ticket {
        self.next_id += 1;
        let ticket = Ticket {
            id: self.next_id,
            generation,
            delay_ms,
            action,
        };
        self.live.push(ticket.clone());
        ticket
    }

    /// 取走一张仍然有效且属于当前代的票据；否则返回 None。
    pub fn redeem(&mut self, ticket: &Ticket, current: Generation) -> Option<Ticket> {
        if ticket.generation != current {
            return None;
        }
        let pos = self.live.iter().position(|live| live.id == ticket.id)?;
        Some(self.live.remove(pos))
    }

    pub fn is_live(&self, id: TicketId) -> bool {
        self.live.iter().any(|ticket| ticket.id == id)
    }

    pub fn live(&self) -> &[Ticket] {
        &self.live
    }

    pub fn cancel_all(&mut self) {
        self.live.clear();
    }

    pub fn retain(&mut self, keep: impl Fn(&Ticket) -> bool) {
        self.live.retain(keep);
    }

    pub fn start_timer(&mut self, generation: Generation, interval_ms: u32) {
        self.timer = Some(TimerState {
            generation,
            interval_ms,
        });
    }

    pub fn stop_timer(&mut self) {
        self.timer = None;
    }

    pub fn timer(&self) -> Option<TimerState> {
        self.timer
    }

    pub fn timer_matches(&self, generation: Generation) -> bool {
        self.timer
            .map(|timer| timer.generation == generation)
            .unwrap_or(false)
    }
}

/// 墙钟来源，用于历史记录的时间戳。
pub trait WallClock {
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    #[cfg(target_arch = "wasm32")]
    fn now_millis(&self) -> u64 {
        web_sys::js_sys::Date::now() as u64
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl WallClock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.0
    }
}
