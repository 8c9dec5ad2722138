//! Capabilities supplied by the rendering collaborator
//!
//! The runtime never walks an element tree and never owns an element. It
//! only needs a handful of primitives, bundled in [`ElementHost`] and passed
//! explicitly to every registry and controller that needs them.

use std::cmp::Ordering;
use std::rc::Rc;

/// A 2D point in the collaborator's coordinate space
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Measured bounds of an element
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

/// Element primitives the runtime consumes
///
/// `H` is the collaborator's opaque element handle. The runtime stores
/// handles as weak references: it compares, focuses and measures them but
/// never creates or destroys the element behind one.
pub trait ElementHost<H> {
    /// Does `a` precede `b` in the rendered document?
    ///
    /// Returns `None` when either handle has no position yet (not mounted).
    fn compare_document_position(&self, a: &H, b: &H) -> Option<Ordering>;

    /// Move keyboard focus to an element
    fn focus(&self, handle: &H);

    /// Whether `target` is `container` or one of its descendants
    fn contains(&self, _container: &H, _target: &H) -> bool {
        false
    }

    /// Current bounds of an element, if it is laid out
    fn measure(&self, _handle: &H) -> Option<Rect> {
        None
    }
}

/// Shared host handle
pub type SharedHost<H> = Rc<dyn ElementHost<H>>;

pub mod testing {
    //! An in-memory host for tests and headless drivers

    use std::cell::RefCell;
    use std::cmp::Ordering;

    use rustc_hash::FxHashMap;

    use super::{ElementHost, Rect};

    /// Host over `u64` handles with explicit document positions
    ///
    /// Handles are "mounted" at a position; two mounted handles compare by
    /// position. Every `focus` call is recorded.
    #[derive(Debug, Default)]
    pub struct RecordingHost {
        positions: RefCell<FxHashMap<u64, u64>>,
        parents: RefCell<FxHashMap<u64, u64>>,
        rects: RefCell<FxHashMap<u64, Rect>>,
        focused: RefCell<Vec<u64>>,
    }

    impl RecordingHost {
        pub fn new() -> Self {
            Self::default()
        }

        /// Give a handle a document position
        pub fn mount(&self, handle: u64, position: u64) {
            self.positions.borrow_mut().insert(handle, position);
        }

        pub fn unmount(&self, handle: u64) {
            self.positions.borrow_mut().remove(&handle);
        }

        pub fn set_parent(&self, child: u64, parent: u64) {
            self.parents.borrow_mut().insert(child, parent);
        }

        pub fn set_rect(&self, handle: u64, rect: Rect) {
            self.rects.borrow_mut().insert(handle, rect);
        }

        /// Every handle focused so far, oldest first
        pub fn focus_log(&self) -> Vec<u64> {
            self.focused.borrow().clone()
        }

        pub fn last_focused(&self) -> Option<u64> {
            self.focused.borrow().last().copied()
        }
    }

    impl ElementHost<u64> for RecordingHost {
        fn compare_document_position(&self, a: &u64, b: &u64) -> Option<Ordering> {
            let positions = self.positions.borrow();
            Some(positions.get(a)?.cmp(positions.get(b)?))
        }

        fn focus(&self, handle: &u64) {
            self.focused.borrow_mut().push(*handle);
        }

        fn contains(&self, container: &u64, target: &u64) -> bool {
            let parents = self.parents.borrow();
            let mut current = Some(*target);
            while let Some(node) = current {
                if node == *container {
                    return true;
                }
                current = parents.get(&node).copied();
            }
            false
        }

        fn measure(&self, handle: &u64) -> Option<Rect> {
            self.rects.borrow().get(handle).copied()
        }
    }
}
