use std::{collections::VecDeque, time::Instant};

const CACHED_DELTA_TIMES_COUNT: usize = 20;

/// Per-frame timing. `current_time` is the number of seconds since the clock was created,
/// `delta_time` the difference to the previous frame and never negative.
#[derive(Debug)]
pub struct FrameClock {
    start_time: Instant,
    current_time: f64,
    previous_time: f64,
    delta_time: f64,
    frame_count: usize,
    delta_times: VecDeque<f64>,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        FrameClock {
            start_time: Instant::now(),
            current_time: 0.0,
            previous_time: 0.0,
            delta_time: 0.0,
            frame_count: 0,
            delta_times: VecDeque::with_capacity(CACHED_DELTA_TIMES_COUNT),
        }
    }

    /// Advances the clock to the wall time elapsed since creation.
    pub fn update(&mut self) {
        let now = self.start_time.elapsed().as_secs_f64();
        self.advance_to(now);
    }

    /// Advances the clock to `current_time`. A time before the previous frame yields a delta of zero.
    pub fn advance_to(&mut self, current_time: f64) {
        self.previous_time = self.current_time;
        self.current_time = current_time.max(self.previous_time);
        self.delta_time = self.current_time - self.previous_time;
        self.frame_count += 1;

        if self.delta_times.len() >= CACHED_DELTA_TIMES_COUNT {
            self.delta_times.pop_back();
        }
        self.delta_times.push_front(self.delta_time);
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn delta_secs(&self) -> f32 {
        self.delta_time as f32
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Average frame time over the last few frames, in milliseconds.
    pub fn avg_delta_ms(&self) -> f64 {
        if self.delta_times.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.delta_times.iter().sum();
        sum / self.delta_times.len() as f64 * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::FrameClock;

    #[test]
    fn delta_is_difference_to_previous_frame() {
        let mut clock = FrameClock::new();
        clock.advance_to(0.5);
        clock.advance_to(0.75);
        assert_eq!(clock.current_time(), 0.75);
        assert_eq!(clock.delta_secs(), 0.25);
        assert_eq!(clock.frame_count(), 2);
    }

    #[test]
    fn delta_never_negative() {
        let mut clock = FrameClock::new();
        clock.advance_to(2.0);
        clock.advance_to(1.0);
        assert_eq!(clock.delta_secs(), 0.0);
        assert_eq!(clock.current_time(), 2.0);
    }

    #[test]
    fn average_frame_time() {
        let mut clock = FrameClock::new();
        clock.advance_to(0.01);
        clock.advance_to(0.03);
        assert!((clock.avg_delta_ms() - 15.0).abs() < 1e-9);
    }
}
