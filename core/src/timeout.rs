//! Bounding peripheral and network futures with a deadline

use core::future::Future;

use embassy_futures::select::{select, Either};
use embedded_hal_async::delay::DelayNs;

/// The deadline passed before the future completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimedOut;

/// Race `fut` against `delay`. The losing future is dropped.
pub async fn with_timeout<D, F>(delay: &mut D, timeout_ms: u32, fut: F) -> Result<F::Output, TimedOut>
where
    D: DelayNs,
    F: Future,
{
    match select(fut, delay.delay_ms(timeout_ms)).await {
        Either::First(output) => Ok(output),
        Either::Second(()) => Err(TimedOut),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use core::future::pending;
    use embassy_futures::block_on;

    /// Delay that completes immediately and records what was asked of it
    #[derive(Default)]
    pub(crate) struct InstantDelay {
        pub total_ms: u64,
        pub calls: std::vec::Vec<u32>,
    }

    impl DelayNs for InstantDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.calls.push(ns / 1_000_000);
            self.total_ms += u64::from(ns / 1_000_000);
        }

        async fn delay_ms(&mut self, ms: u32) {
            self.calls.push(ms);
            self.total_ms += u64::from(ms);
        }
    }

    /// Delay that never completes
    pub(crate) struct NeverDelay;

    impl DelayNs for NeverDelay {
        async fn delay_ns(&mut self, _ns: u32) {
            pending::<()>().await
        }
    }

    #[test]
    fn test_ready_future_wins() {
        let mut delay = NeverDelay;
        let out = block_on(with_timeout(&mut delay, 10, async { 7 }));
        assert_eq!(out, Ok(7));
    }

    #[test]
    fn test_stalled_future_times_out() {
        let mut delay = InstantDelay::default();
        let out = block_on(with_timeout(&mut delay, 5000, pending::<u8>()));
        assert_eq!(out, Err(TimedOut));
        assert_eq!(delay.calls, [5000]);
    }
}
