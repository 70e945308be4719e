use std::time::Duration;

const TIMER_DEC_PER_SECOND: u64 = 60;

pub const TICK: Duration = Duration::from_nanos(1_000_000_000 / TIMER_DEC_PER_SECOND);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timer {
    pub count: u8,
}

impl Timer {
    pub fn new(init_count: u8) -> Self {
        Self { count: init_count }
    }

    pub fn set(&mut self, value: u8) {
        self.count = value;
    }

    pub fn tick(&mut self) {
        self.count = self.count.saturating_sub(1);
    }
}

/// Turns wall-clock deltas into timer ticks.
///
/// Time accumulates across calls and at most one tick is released per call,
/// with the remainder carried into the next one.
#[derive(Debug, Default)]
pub struct TickClock {
    accumulated: Duration,
}

impl TickClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, elapsed: Duration) -> bool {
        self.accumulated += elapsed;
        if self.accumulated > TICK {
            self.accumulated -= TICK;
            true
        } else {
            false
        }
    }
}

/// Caps how many instructions run for a given slice of wall-clock time.
///
/// A rate of 0 leaves execution uncapped, one instruction per call. A single
/// call never releases more than one tick's worth of instructions; time lost
/// to a host stall is dropped rather than caught up.
#[derive(Debug, Default)]
pub struct InstructionBudget {
    per_second: u32,
    carry: f64,
}

impl InstructionBudget {
    pub fn new(per_second: u32) -> Self {
        Self {
            per_second,
            carry: 0.0,
        }
    }

    pub fn steps(&mut self, elapsed: Duration) -> u32 {
        if self.per_second == 0 {
            return 1;
        }
        self.carry += elapsed.as_secs_f64() * self.per_second as f64;
        let whole = self.carry.floor();
        self.carry -= whole;

        let max = self.max_per_call();
        if whole >= max as f64 {
            self.carry = 0.0;
            return max;
        }
        whole as u32
    }

    fn max_per_call(&self) -> u32 {
        ((self.per_second as u64 + TIMER_DEC_PER_SECOND - 1) / TIMER_DEC_PER_SECOND) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_floors_at_zero() {
        let mut timer = Timer::new(2);
        timer.tick();
        timer.tick();
        assert_eq!(timer.count, 0);
        timer.tick();
        assert_eq!(timer.count, 0);
    }

    #[test]
    fn test_clock_accumulates_small_deltas() {
        let mut clock = TickClock::new();
        let step = Duration::from_millis(5);
        assert!(!clock.advance(step));
        assert!(!clock.advance(step));
        assert!(!clock.advance(step));
        assert!(clock.advance(step));
        // 20ms in, 16.67ms consumed
        assert!(!clock.advance(step));
    }

    #[test]
    fn test_clock_releases_one_tick_per_call() {
        let mut clock = TickClock::new();
        assert!(clock.advance(Duration::from_millis(40)));
        assert!(clock.advance(Duration::ZERO));
        assert!(!clock.advance(Duration::ZERO));
    }

    #[test]
    fn test_budget_carries_fractions() {
        let mut budget = InstructionBudget::new(700);
        // 700 * 1ms = 0.7 instructions
        assert_eq!(budget.steps(Duration::from_millis(1)), 0);
        assert_eq!(budget.steps(Duration::from_millis(1)), 1);
        assert_eq!(budget.steps(Duration::from_millis(10)), 7);
    }

    #[test]
    fn test_budget_drops_time_after_stall() {
        let mut budget = InstructionBudget::new(700);
        assert_eq!(budget.steps(Duration::from_secs(2)), 12);
        assert_eq!(budget.steps(Duration::ZERO), 0);
        assert_eq!(budget.steps(Duration::from_millis(16)), 11);
    }

    #[test]
    fn test_uncapped_budget_runs_one_per_call() {
        let mut budget = InstructionBudget::new(0);
        assert_eq!(budget.steps(Duration::ZERO), 1);
        assert_eq!(budget.steps(Duration::from_secs(1)), 1);
    }
}
