//! Status screen over RTT
//!
//! The Feather has no panel attached, so the screen is logged line by line.
//! Unchanged screens are skipped to keep the log readable.

use airq_core::{Screen, StatusDisplay};
use defmt::info;

#[derive(Default)]
pub struct RttDisplay {
    shown: Option<Screen>,
}

impl StatusDisplay for RttDisplay {
    fn show(&mut self, screen: &Screen) {
        if self.shown.as_ref() == Some(screen) {
            return;
        }
        for (row, line) in screen.lines.iter().enumerate() {
            if !line.text.is_empty() {
                info!("[{}] #{:06x} {}", row, line.color.0, line.text.as_str());
            }
        }
        self.shown = Some(screen.clone());
    }
}
