//! Wall-clock night-mode window.

use serde::{Deserialize, Serialize};

/// Minute-resolution wall-clock time. The application owns the RTC; the core
/// only ever receives this value, it never reads a clock itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    pub const fn new(hour: u8, minute: u8) -> Self {
        Self { hour, minute }
    }

    pub const fn is_valid(self) -> bool {
        self.hour < 24 && self.minute < 60
    }

    pub const fn minutes_from_midnight(self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }
}

/// Half-open `[start, end)` window that may wrap past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightWindow {
    start: TimeOfDay,
    end: TimeOfDay,
}

impl NightWindow {
    pub const fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    /// `start == end` means the window is empty, not all-day.
    pub fn contains(&self, t: TimeOfDay) -> bool {
        let t = t.minutes_from_midnight();
        let start = self.start.minutes_from_midnight();
        let end = self.end.minutes_from_midnight();

        if start == end {
            false
        } else if start < end {
            t >= start && t < end
        } else {
            // Wraps past midnight, e.g. 22:00–06:00.
            t >= start || t < end
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_window_covers_both_sides_of_midnight() {
        let night = NightWindow::new(TimeOfDay::new(22, 0), TimeOfDay::new(6, 0));
        assert!(night.contains(TimeOfDay::new(23, 30)));
        assert!(night.contains(TimeOfDay::new(5, 30)));
        assert!(!night.contains(TimeOfDay::new(12, 0)));
    }

    #[test]
    fn window_boundaries_are_half_open() {
        let night = NightWindow::new(TimeOfDay::new(22, 0), TimeOfDay::new(6, 0));
        assert!(night.contains(TimeOfDay::new(22, 0)));
        assert!(!night.contains(TimeOfDay::new(6, 0)));
    }

    #[test]
    fn non_wrapping_window() {
        let siesta = NightWindow::new(TimeOfDay::new(13, 0), TimeOfDay::new(15, 0));
        assert!(siesta.contains(TimeOfDay::new(14, 0)));
        assert!(!siesta.contains(TimeOfDay::new(12, 59)));
        assert!(!siesta.contains(TimeOfDay::new(15, 0)));
    }

    #[test]
    fn empty_window_matches_nothing() {
        let empty = NightWindow::new(TimeOfDay::new(8, 0), TimeOfDay::new(8, 0));
        assert!(!empty.contains(TimeOfDay::new(8, 0)));
        assert!(!empty.contains(TimeOfDay::new(20, 0)));
    }
}
