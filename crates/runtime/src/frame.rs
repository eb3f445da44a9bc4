use foundation::time::Time;

/// Deterministic frame metadata.
///
/// This is the only timebase the engine sees. It is intentionally small and
/// pure so a run can be recorded and replayed.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Fixed delta time (milliseconds).
    pub dt_ms: f64,
    /// Clock time at the end of the frame (milliseconds).
    pub time: Time,
}

impl Frame {
    /// 60 Hz.
    pub const DEFAULT_DT_MS: f64 = 1000.0 / 60.0;

    pub fn new(index: u64, dt_ms: f64) -> Self {
        Self {
            index,
            dt_ms,
            time: Time(index as f64 * dt_ms),
        }
    }

    pub fn next(self) -> Self {
        Self::new(self.index + 1, self.dt_ms)
    }

    /// Frames needed to cover `duration_ms`, rounding up.
    pub fn count_for(duration_ms: f64, dt_ms: f64) -> u64 {
        if duration_ms <= 0.0 || dt_ms <= 0.0 {
            return 0;
        }
        (duration_ms / dt_ms).ceil() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::Frame;
    use foundation::time::Time;

    #[test]
    fn frame_time_is_deterministic() {
        let a = Frame::new(10, 20.0);
        let b = Frame::new(10, 20.0);
        assert_eq!(a, b);
        assert_eq!(a.time, Time(200.0));
    }

    #[test]
    fn next_advances_index_and_time() {
        let f1 = Frame::new(0, 0.5).next();
        assert_eq!(f1.index, 1);
        assert_eq!(f1.time, Time(0.5));
    }

    #[test]
    fn count_rounds_up() {
        assert_eq!(Frame::count_for(1000.0, 16.0), 63);
        assert_eq!(Frame::count_for(0.0, 16.0), 0);
    }
}
