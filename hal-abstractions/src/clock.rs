//! Monotonic time source

/// Free-running microsecond counter that never goes backwards.
///
/// Boards back this with a hardware timer (e.g. embassy-time's driver on
/// TIM2). The counter starts at an arbitrary point, usually boot.
pub trait MonotonicClock {
    /// Microseconds since an arbitrary, fixed origin
    fn now_micros(&self) -> u64;

    /// Milliseconds elapsed since `earlier_micros`, saturating at zero
    fn millis_since(&self, earlier_micros: u64) -> u64 {
        self.now_micros().saturating_sub(earlier_micros) / 1_000
    }
}

impl<T: MonotonicClock + ?Sized> MonotonicClock for &T {
    fn now_micros(&self) -> u64 {
        (**self).now_micros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct Fixed(Cell<u64>);

    impl MonotonicClock for Fixed {
        fn now_micros(&self) -> u64 {
            self.0.get()
        }
    }

    #[test]
    fn test_millis_since() {
        let clock = Fixed(Cell::new(5_500_000));
        assert_eq!(clock.millis_since(2_000_000), 3_500);
    }

    #[test]
    fn test_millis_since_saturates() {
        let clock = Fixed(Cell::new(1_000));
        assert_eq!(clock.millis_since(9_000), 0);
    }

    #[test]
    fn test_reference_forwarding() {
        let clock = Fixed(Cell::new(42));
        let by_ref = &clock;
        assert_eq!(by_ref.now_micros(), 42);
    }
}
