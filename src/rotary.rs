use serde::{Deserialize, Serialize};
use std::fmt;

use crate::gpio::Level;

/// Something that happened on the encoder.
///
/// `None` only exists inside the decoder, it is never sent to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    None,
    Clockwise,
    CounterClockwise,
    ButtonPressed,
    ButtonReleased,
}

impl Action {
    pub fn is_none(&self) -> bool {
        *self == Action::None
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::None => "none",
            Action::Clockwise => "clockwise",
            Action::CounterClockwise => "counterClockwise",
            Action::ButtonPressed => "buttonPressed",
            Action::ButtonReleased => "buttonReleased",
        })
    }
}

// Four 2-bit samples, oldest in the high bits. Each set holds the four
// cyclic rotations of one direction's Gray code sequence.
pub const CLOCKWISE: [u8; 4] = [0x1e, 0xe1, 0x78, 0x87];
pub const COUNTER_CLOCKWISE: [u8; 4] = [0xb4, 0x4b, 0x2d, 0xd2];

impl From<u8> for Action {
    fn from(s: u8) -> Self {
        if CLOCKWISE.contains(&s) {
            Action::Clockwise
        } else if COUNTER_CLOCKWISE.contains(&s) {
            Action::CounterClockwise
        } else {
            Action::None
        }
    }
}

/// Which channel occupies the high bit of a sample.
///
/// Flipping this reverses the reported direction for a given wiring, so it
/// has to be calibrated against the real encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    AHigh,
    BHigh,
}

/// Which button level counts as pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonPolarity {
    /// Pulled up, the switch shorts the pin to ground when pressed.
    #[default]
    ActiveLow,
    ActiveHigh,
}

impl ButtonPolarity {
    pub fn action(&self, level: Level) -> Action {
        match (self, level) {
            (ButtonPolarity::ActiveLow, Level::Low) | (ButtonPolarity::ActiveHigh, Level::High) => {
                Action::ButtonPressed
            }
            _ => Action::ButtonReleased,
        }
    }
}

/// Quadrature decoder state.
///
/// Only ever touched by one watcher at a time, the encoder wraps it in a
/// mutex that both channel watchers share.
#[derive(Debug, Default)]
pub struct Rotary {
    state: u8,
    order: ChannelOrder,
}

impl Rotary {
    pub fn new(order: ChannelOrder) -> Self {
        Self { state: 0u8, order }
    }

    /// Feed the current levels of both channels and get the action for this
    /// transition, if any.
    ///
    /// A sample equal to the previous one is noise (or the second watcher
    /// reporting the same edge) and leaves the state untouched. A completed
    /// detent resets the state so the same click cannot fire twice.
    pub fn update(&mut self, a: Level, b: Level) -> Action {
        let s = self.sample(a, b);
        if s == self.state & 0b11 {
            return Action::None;
        }

        // move in the new sample, the oldest one falls off the top
        let next = (self.state << 2) | s;
        let action = Action::from(next);
        self.state = if action.is_none() { next } else { 0 };

        action
    }

    pub fn state(&self) -> u8 {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = 0;
    }

    fn sample(&self, a: Level, b: Level) -> u8 {
        let (high, low) = match self.order {
            ChannelOrder::AHigh => (a, b),
            ChannelOrder::BHigh => (b, a),
        };
        (u8::from(high) << 1) | u8::from(low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Level::{High, Low};

    fn feed(rotary: &mut Rotary, levels: &[(Level, Level)]) -> Vec<Action> {
        levels
            .iter()
            .map(|&(a, b)| rotary.update(a, b))
            .filter(|action| !action.is_none())
            .collect()
    }

    #[test]
    fn every_clockwise_phase_fires_once() {
        // (A, B) cycles through 00 -> 01 -> 11 -> 10 when A is the high bit
        let cycle = [(Low, Low), (Low, High), (High, High), (High, Low)];
        for start in 0..4 {
            let mut rotary = Rotary::new(ChannelOrder::AHigh);
            let mut actions = Vec::new();
            for step in 0..4 {
                let (a, b) = cycle[(start + step) % 4];
                actions.push(rotary.update(a, b));
            }
            let fired: Vec<_> = actions.into_iter().filter(|a| !a.is_none()).collect();
            assert_eq!(fired, vec![Action::Clockwise], "start phase {}", start);
            assert_eq!(rotary.state(), 0);
        }
    }

    #[test]
    fn every_counter_clockwise_phase_fires_once() {
        let cycle = [(Low, Low), (High, Low), (High, High), (Low, High)];
        for start in 0..4 {
            let mut rotary = Rotary::new(ChannelOrder::AHigh);
            let mut fired = Vec::new();
            for step in 0..4 {
                let (a, b) = cycle[(start + step) % 4];
                let action = rotary.update(a, b);
                if !action.is_none() {
                    fired.push(action);
                }
            }
            assert_eq!(fired, vec![Action::CounterClockwise], "start phase {}", start);
            assert_eq!(rotary.state(), 0);
        }
    }

    #[test]
    fn matches_the_register_tables() {
        for value in CLOCKWISE.iter() {
            assert_eq!(Action::from(*value), Action::Clockwise);
        }
        for value in COUNTER_CLOCKWISE.iter() {
            assert_eq!(Action::from(*value), Action::CounterClockwise);
        }
        assert_eq!(Action::from(0x00), Action::None);
        assert_eq!(Action::from(0x0b), Action::None);
    }

    #[test]
    fn direction_sets_are_disjoint_and_closed_under_rotation() {
        for value in CLOCKWISE.iter() {
            assert!(!COUNTER_CLOCKWISE.contains(value));
            assert!(CLOCKWISE.contains(&value.rotate_left(2)));
            assert!(!COUNTER_CLOCKWISE.contains(&value.rotate_left(2)));
        }
        for value in COUNTER_CLOCKWISE.iter() {
            assert!(COUNTER_CLOCKWISE.contains(&value.rotate_left(2)));
            assert!(!CLOCKWISE.contains(&value.rotate_left(2)));
        }
    }

    #[test]
    fn duplicate_samples_do_not_advance() {
        let mut rotary = Rotary::new(ChannelOrder::AHigh);
        assert_eq!(rotary.update(Low, High), Action::None);
        assert_eq!(rotary.state(), 0x01);
        assert_eq!(rotary.update(Low, High), Action::None);
        assert_eq!(rotary.state(), 0x01);

        // initial state already reads as 00
        let mut rotary = Rotary::new(ChannelOrder::AHigh);
        assert_eq!(rotary.update(Low, Low), Action::None);
        assert_eq!(rotary.state(), 0);
    }

    #[test]
    fn noise_between_steps_keeps_the_detent() {
        let mut rotary = Rotary::new(ChannelOrder::AHigh);
        let fired = feed(
            &mut rotary,
            &[(Low, High), (Low, High), (High, High), (High, High), (High, Low)],
        );
        assert_eq!(fired, vec![Action::Clockwise]);
    }

    #[test]
    fn second_watcher_reporting_the_final_edge_is_ignored() {
        // both watchers evaluate after the last edge, in either order
        let mut rotary = Rotary::new(ChannelOrder::AHigh);
        let fired = feed(&mut rotary, &[(Low, High), (High, High), (High, Low), (High, Low)]);
        assert_eq!(fired, vec![Action::Clockwise]);
    }

    #[test]
    fn consecutive_detents_fire_separately() {
        let mut rotary = Rotary::new(ChannelOrder::AHigh);
        let turn = [(Low, High), (High, High), (High, Low), (Low, Low)];
        let mut fired = feed(&mut rotary, &turn);
        fired.extend(feed(&mut rotary, &turn));
        assert_eq!(fired, vec![Action::Clockwise, Action::Clockwise]);
    }

    #[test]
    fn swapping_channels_reverses_direction() {
        let sequence = [(Low, High), (High, High), (High, Low)];
        let mut a_high = Rotary::new(ChannelOrder::AHigh);
        let mut b_high = Rotary::new(ChannelOrder::BHigh);
        assert_eq!(feed(&mut a_high, &sequence), vec![Action::Clockwise]);
        assert_eq!(feed(&mut b_high, &sequence), vec![Action::CounterClockwise]);
    }

    #[test]
    fn idle_high_encoder_with_b_as_high_bit() {
        // pins resting high, A leading: A low, B low, A high, B high
        let mut rotary = Rotary::new(ChannelOrder::BHigh);
        let fired = feed(&mut rotary, &[(Low, High), (Low, Low), (High, Low), (High, High)]);
        assert_eq!(fired, vec![Action::Clockwise]);
        assert_eq!(rotary.state(), 0);

        // B leading: B low, A low, B high, A high
        let fired = feed(&mut rotary, &[(High, Low), (Low, Low), (Low, High), (High, High)]);
        assert_eq!(fired, vec![Action::CounterClockwise]);
    }

    #[test]
    fn reset_clears_partial_progress() {
        let mut rotary = Rotary::new(ChannelOrder::AHigh);
        rotary.update(Low, High);
        rotary.update(High, High);
        rotary.reset();
        assert_eq!(rotary.state(), 0);
        assert_eq!(rotary.update(High, Low), Action::None);
    }

    #[test]
    fn button_polarity() {
        assert_eq!(ButtonPolarity::ActiveLow.action(Low), Action::ButtonPressed);
        assert_eq!(ButtonPolarity::ActiveLow.action(High), Action::ButtonReleased);
        assert_eq!(ButtonPolarity::ActiveHigh.action(High), Action::ButtonPressed);
        assert_eq!(ButtonPolarity::ActiveHigh.action(Low), Action::ButtonReleased);
    }
}
