//! Raw input vocabulary shared by every widget
//!
//! The collaborator translates platform input into these types before handing
//! it to a controller's event mapper.

/// Keys the runtime reacts to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    // Arrow keys
    Left,
    Right,
    Up,
    Down,

    // Special keys
    Home,
    End,
    PageUp,
    PageDown,
    Enter,
    Space,
    Escape,
    Tab,
    Backspace,

    // Character input (typeahead)
    Char(char),
}

impl Key {
    /// The printable character for typeahead, if any
    ///
    /// Space only counts when a search is already under way, so a lone space
    /// still activates the focused item.
    pub fn typeahead_char(&self, searching: bool) -> Option<char> {
        match *self {
            Key::Char(c) if !c.is_control() => Some(c),
            Key::Space if searching => Some(' '),
            _ => None,
        }
    }

    /// Map an arrow/Home/End key to a navigation direction for an orientation
    pub fn direction(&self, orientation: Orientation) -> Option<Direction> {
        match (orientation, *self) {
            (Orientation::Horizontal, Key::Right) | (Orientation::Vertical, Key::Down) => {
                Some(Direction::Next)
            }
            (Orientation::Horizontal, Key::Left) | (Orientation::Vertical, Key::Up) => {
                Some(Direction::Previous)
            }
            (_, Key::Home) => Some(Direction::First),
            (_, Key::End) => Some(Direction::Last),
            _ => None,
        }
    }
}

/// Modifier key state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Check if no modifiers are held
    pub fn is_empty(&self) -> bool {
        !self.shift && !self.ctrl && !self.alt && !self.meta
    }

    /// Whether a shortcut modifier is held (typeahead ignores these keys)
    pub fn has_command(&self) -> bool {
        self.ctrl || self.alt || self.meta
    }
}

/// A key press with its modifiers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyPress {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_modifiers(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }
}

impl From<Key> for KeyPress {
    fn from(key: Key) -> Self {
        Self::new(key)
    }
}

/// Layout axis of a collection, decides which arrows navigate
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Orientation {
    #[default]
    Horizontal,
    Vertical,
}

/// Relative or absolute move inside an ordered collection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Next,
    Previous,
    First,
    Last,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_follows_orientation() {
        assert_eq!(
            Key::Right.direction(Orientation::Horizontal),
            Some(Direction::Next)
        );
        assert_eq!(Key::Right.direction(Orientation::Vertical), None);
        assert_eq!(
            Key::Up.direction(Orientation::Vertical),
            Some(Direction::Previous)
        );
        assert_eq!(Key::End.direction(Orientation::Vertical), Some(Direction::Last));
    }

    #[test]
    fn test_typeahead_char() {
        assert_eq!(Key::Char('b').typeahead_char(false), Some('b'));
        assert_eq!(Key::Space.typeahead_char(false), None);
        assert_eq!(Key::Space.typeahead_char(true), Some(' '));
        assert_eq!(Key::Enter.typeahead_char(true), None);
    }
}
