use std::collections::VecDeque;

/// Frame rate over a sliding window of frame timestamps.
#[derive(Debug, Default)]
pub struct FrameStats {
    /// Milliseconds, oldest first.
    stamps: VecDeque<f64>,
}

impl FrameStats {
    const WINDOW_MS: f64 = 1000.0;

    /// Record a frame presented at `now_ms`.
    pub fn frame(&mut self, now_ms: f64) {
        if let Some(last) = self.stamps.back() {
            // Clock went backwards (tab restore, new time origin).
            if now_ms < *last {
                self.stamps.clear();
            }
        }
        self.stamps.push_back(now_ms);
        while let Some(first) = self.stamps.front() {
            if now_ms - *first > Self::WINDOW_MS {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Frames per second, rounded. Zero until two frames were seen.
    pub fn fps(&self) -> u32 {
        match (self.stamps.front(), self.stamps.back()) {
            (Some(first), Some(last)) if self.stamps.len() > 1 && last > first => {
                ((self.stamps.len() - 1) as f64 * 1000.0 / (last - first)).round() as u32
            }
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_sixty_hertz() {
        let mut stats = FrameStats::default();
        for i in 0..120 {
            stats.frame(i as f64 * 1000.0 / 60.0);
        }
        assert_eq!(stats.fps(), 60);
    }

    #[test]
    fn needs_two_frames() {
        let mut stats = FrameStats::default();
        assert_eq!(stats.fps(), 0);
        stats.frame(5.0);
        assert_eq!(stats.fps(), 0);
        stats.frame(105.0);
        assert_eq!(stats.fps(), 10);
    }

    #[test]
    fn old_frames_leave_the_window() {
        let mut stats = FrameStats::default();
        for i in 0..10 {
            stats.frame(i as f64 * 10.0);
        }
        stats.frame(5000.0);
        stats.frame(5500.0);
        assert_eq!(stats.fps(), 2);
    }

    #[test]
    fn backwards_clock_starts_over() {
        let mut stats = FrameStats::default();
        stats.frame(1000.0);
        stats.frame(1010.0);
        stats.frame(10.0);
        assert_eq!(stats.fps(), 0);
    }
}
