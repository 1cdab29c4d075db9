//! TIM2-backed monotonic time for the core crate

use hal_abstractions::MonotonicClock;
use rtic_monotonics::Monotonic;

use crate::Mono;

/// Microseconds since `Mono::start`, straight from the 1 MHz TIM2 monotonic
#[derive(Clone, Copy, Default)]
pub struct MonoClock;

impl MonotonicClock for MonoClock {
    fn now_micros(&self) -> u64 {
        Mono::now().ticks()
    }
}
