use std::time::Duration;

const TIMER_EPSILON: f32 = 1e-4;

/// Fires once per elapsed period of simulated time.
///
/// A tick that spans several periods fires once; the backlog is dropped rather than
/// replayed, matching how the loop runner drops simulation backlog.
#[derive(Debug, Clone)]
pub struct RepeatingTimer {
    period_seconds: f32,
    elapsed_seconds: f32,
}

impl RepeatingTimer {
    pub fn new(period: Duration) -> Self {
        let period_seconds = period.as_secs_f32();
        Self {
            period_seconds: if period_seconds > 0.0 {
                period_seconds
            } else {
                1.0
            },
            elapsed_seconds: 0.0,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f32(self.period_seconds)
    }

    pub fn reset(&mut self) {
        self.elapsed_seconds = 0.0;
    }

    pub fn tick(&mut self, dt_seconds: f32) -> bool {
        if !dt_seconds.is_finite() || dt_seconds <= 0.0 {
            return false;
        }
        self.elapsed_seconds += dt_seconds;
        if self.elapsed_seconds + TIMER_EPSILON < self.period_seconds {
            return false;
        }
        self.elapsed_seconds =
            (self.elapsed_seconds - self.period_seconds).max(0.0) % self.period_seconds;
        true
    }
}

/// A chain of delays run back to back; completes exactly once.
#[derive(Debug, Clone)]
pub struct StagedDelay {
    remaining_stages: Vec<f32>,
    stage_elapsed: f32,
    finished: bool,
}

impl StagedDelay {
    pub fn new(stages: &[Duration]) -> Self {
        Self {
            remaining_stages: stages.iter().rev().map(Duration::as_secs_f32).collect(),
            stage_elapsed: 0.0,
            finished: false,
        }
    }

    pub fn stages_left(&self) -> usize {
        self.remaining_stages.len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns true on the single tick in which the last stage elapses.
    pub fn tick(&mut self, dt_seconds: f32) -> bool {
        if self.finished {
            return false;
        }
        let mut budget = if dt_seconds.is_finite() {
            dt_seconds.max(0.0)
        } else {
            0.0
        };
        while let Some(stage) = self.remaining_stages.last().copied() {
            let left = stage - self.stage_elapsed;
            if budget + TIMER_EPSILON < left {
                self.stage_elapsed += budget;
                return false;
            }
            budget = (budget - left).max(0.0);
            self.stage_elapsed = 0.0;
            self.remaining_stages.pop();
        }
        self.finished = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeating_timer_fires_once_per_period() {
        let mut timer = RepeatingTimer::new(Duration::from_secs(1));
        let fired = (0..120).filter(|_| timer.tick(1.0 / 60.0)).count();
        assert_eq!(fired, 2);
    }

    #[test]
    fn repeating_timer_drops_backlog_from_long_tick() {
        let mut timer = RepeatingTimer::new(Duration::from_secs(1));
        assert!(timer.tick(3.5));
        assert!(!timer.tick(0.4));
        assert!(timer.tick(0.1));
    }

    #[test]
    fn zero_period_falls_back_to_one_second() {
        let timer = RepeatingTimer::new(Duration::ZERO);
        assert_eq!(timer.period(), Duration::from_secs(1));
    }

    #[test]
    fn staged_delay_completes_after_all_stages_exactly_once() {
        let mut delay =
            StagedDelay::new(&[Duration::from_millis(1000), Duration::from_millis(100)]);
        assert!(!delay.tick(0.9));
        assert_eq!(delay.stages_left(), 2);
        assert!(!delay.tick(0.15));
        assert_eq!(delay.stages_left(), 1);
        assert!(delay.tick(0.1));
        assert!(delay.is_finished());
        assert!(!delay.tick(1.0));
    }

    #[test]
    fn staged_delay_can_finish_within_one_long_tick() {
        let mut delay =
            StagedDelay::new(&[Duration::from_millis(1000), Duration::from_millis(100)]);
        assert!(delay.tick(2.0));
    }
}
