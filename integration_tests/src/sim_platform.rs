//! Simulated platform services
//!
//! The millisecond clock is a process wide static, so that it can also be handed to a
//! [`Registry`](canode::Registry) as a plain `fn() -> u32`. Tests which use it must be `#[serial]`.
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use canode::Platform;

static SIM_CLOCK: AtomicU32 = AtomicU32::new(0);

/// Read the simulated millisecond tick
pub fn sim_millis() -> u32 {
    SIM_CLOCK.load(Ordering::Relaxed)
}

/// Advance the simulated clock, wrapping like a hardware tick counter
pub fn advance_ms(ms: u32) {
    let now = SIM_CLOCK.load(Ordering::Relaxed);
    SIM_CLOCK.store(now.wrapping_add(ms), Ordering::Relaxed);
}

pub fn set_ms(ms: u32) {
    SIM_CLOCK.store(ms, Ordering::Relaxed);
}

/// Platform which counts timer starts and device resets
#[derive(Debug, Clone, Default)]
pub struct SimPlatform {
    timer_starts: Arc<AtomicUsize>,
    resets: Arc<AtomicUsize>,
}

impl SimPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timer_starts(&self) -> usize {
        self.timer_starts.load(Ordering::Relaxed)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::Relaxed)
    }
}

impl Platform for SimPlatform {
    fn now_ms(&self) -> u32 {
        sim_millis()
    }

    fn start_tick_timer(&mut self) {
        self.timer_starts.fetch_add(1, Ordering::Relaxed);
    }

    fn system_reset(&mut self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }
}
