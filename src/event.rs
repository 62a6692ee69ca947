//! Input events delivered to effects.
//!
//! Hosts queue events on the driver at any time; they are handed to the
//! effect on the rendering thread just before the next draw. Pointer
//! coordinates are window coordinates, already rotated when the effect
//! ignores device rotation.
//!
//! # Main Types
//!
//! - [`MouseButton`]: Represents mouse buttons (left, middle, right) and wheel steps.
//! - [`Modifiers`]: Keyboard modifiers (Shift, Control, Alt, Meta).
//! - [`Key`]: A key, either a character or a named key.
//! - [`Event`]: Button, motion and key events.

use crate::geometry::Point;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};

/// Represents a mouse button that can be pressed or released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    /// Left mouse button pressed (or depressed)
    Left,
    /// Middle mouse button pressed (or depressed)
    Middle,
    /// Right mouse button pressed (or depressed)
    Right,
    WheelUp,
    WheelDown,
}

impl MouseButton {
    /// Classic button number (1 = left, 4/5 = wheel).
    pub fn number(self) -> u8 {
        match self {
            MouseButton::Left => 1,
            MouseButton::Middle => 2,
            MouseButton::Right => 3,
            MouseButton::WheelUp => 4,
            MouseButton::WheelDown => 5,
        }
    }
}

impl Display for MouseButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MouseButton::Left => write!(f, "Left"),
            MouseButton::Middle => write!(f, "Middle"),
            MouseButton::Right => write!(f, "Right"),
            MouseButton::WheelUp => write!(f, "WheelUp"),
            MouseButton::WheelDown => write!(f, "WheelDown"),
        }
    }
}

bitflags! {
    #[derive(Default)]
    pub struct Modifiers: u8 {
        const SHIFT   = 0b0001;
        const CONTROL = 0b0010;
        const ALT     = 0b0100;
        const META    = 0b1000;
    }
}

impl Display for Modifiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();

        if self.contains(Modifiers::SHIFT) {
            parts.push("Shift");
        }
        if self.contains(Modifiers::CONTROL) {
            parts.push("Control");
        }
        if self.contains(Modifiers::ALT) {
            parts.push("Alt");
        }
        if self.contains(Modifiers::META) {
            parts.push("Meta");
        }

        if parts.is_empty() {
            write!(f, "None")
        } else {
            write!(f, "{}", parts.join("+"))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Char(char),
    Named(String),
}

impl Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{c}"),
            Key::Named(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ButtonPress { x: i32, y: i32, button: MouseButton, modifiers: Modifiers },
    ButtonRelease { x: i32, y: i32, button: MouseButton, modifiers: Modifiers },
    Motion { x: i32, y: i32, modifiers: Modifiers },
    KeyPress { key: Key, modifiers: Modifiers },
    KeyRelease { key: Key, modifiers: Modifiers },
}

impl Event {
    /// Pointer position carried by the event, if any.
    pub fn position(&self) -> Option<Point> {
        match self {
            Event::ButtonPress { x, y, .. } | Event::ButtonRelease { x, y, .. } | Event::Motion { x, y, .. } => {
                Some(Point::new(*x, *y))
            }
            Event::KeyPress { .. } | Event::KeyRelease { .. } => None,
        }
    }

    /// Same event at another position. Key events are returned unchanged.
    pub fn with_position(mut self, p: Point) -> Self {
        match &mut self {
            Event::ButtonPress { x, y, .. } | Event::ButtonRelease { x, y, .. } | Event::Motion { x, y, .. } => {
                *x = p.x;
                *y = p.y;
            }
            Event::KeyPress { .. } | Event::KeyRelease { .. } => {}
        }
        self
    }

    pub fn modifiers(&self) -> Modifiers {
        match self {
            Event::ButtonPress { modifiers, .. }
            | Event::ButtonRelease { modifiers, .. }
            | Event::Motion { modifiers, .. }
            | Event::KeyPress { modifiers, .. }
            | Event::KeyRelease { modifiers, .. } => *modifiers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mousebutton_display() {
        assert_eq!(MouseButton::Left.to_string(), "Left");
        assert_eq!(MouseButton::Middle.to_string(), "Middle");
        assert_eq!(MouseButton::Right.to_string(), "Right");
        assert_eq!(MouseButton::WheelDown.number(), 5);
    }

    #[test]
    fn modifiers_display_empty_is_none() {
        let m = Modifiers::empty();
        assert_eq!(m.to_string(), "None");
        assert!(!m.contains(Modifiers::SHIFT));
        assert!(!m.contains(Modifiers::META));
    }

    #[test]
    fn modifiers_display_combo_in_order() {
        let all = Modifiers::SHIFT | Modifiers::CONTROL | Modifiers::ALT | Modifiers::META;
        assert_eq!(all.to_string(), "Shift+Control+Alt+Meta");

        let some = Modifiers::SHIFT | Modifiers::ALT;
        assert_eq!(some.to_string(), "Shift+Alt");
    }

    #[test]
    fn positions_are_rewritten_only_for_pointer_events() {
        let press = Event::ButtonPress { x: 1, y: 2, button: MouseButton::Left, modifiers: Modifiers::SHIFT };
        let moved = press.clone().with_position(Point::new(7, 8));
        assert_eq!(moved.position(), Some(Point::new(7, 8)));
        assert_eq!(moved.modifiers(), Modifiers::SHIFT);

        let key = Event::KeyPress { key: Key::Char('q'), modifiers: Modifiers::empty() };
        assert_eq!(key.clone().with_position(Point::new(1, 1)), key);
        assert_eq!(key.position(), None);
    }
}
