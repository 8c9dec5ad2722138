//! Ordered descendant registry
//!
//! Gives every item of one logical collection (the options of a listbox, the
//! tabs of a tab list) a stable index that follows document order, without
//! walking the element tree and without requiring items to be direct
//! children of anything.
//!
//! Items register when they mount and deregister when they unmount, in
//! whatever order the renderer happens to run them. Each registration is
//! placed by comparing its handle against existing handles with the host's
//! [`compare_document_position`](crate::host::ElementHost::compare_document_position).
//! A handle that has no position yet is appended and re-placed on a later
//! pass.
//!
//! Indices are computed lazily: mutations only mark the registry dirty and
//! the next read rebuilds the layout.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use tessel_core::host::testing::RecordingHost;
//! use tessel_core::registry::{DescendantRegistry, ItemMeta};
//!
//! let host = Rc::new(RecordingHost::new());
//! host.mount(1, 20);
//! host.mount(2, 10);
//!
//! let mut registry = DescendantRegistry::new(host.clone());
//! let late = registry.register(1, false, ItemMeta::new("late"), None).unwrap();
//! let early = registry.register(2, false, ItemMeta::new("early"), None).unwrap();
//!
//! assert_eq!(registry.index_of(early), Some(0));
//! assert_eq!(registry.index_of(late), Some(1));
//! ```

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};

use crate::error::RegistryError;
use crate::host::SharedHost;
use crate::input::Direction;

new_key_type! {
    /// Identifier of a registered descendant
    pub struct DescendantId;
}

/// Metadata that can be searched by typeahead
pub trait Labeled {
    fn label(&self) -> &str;
}

impl Labeled for String {
    fn label(&self) -> &str {
        self
    }
}

impl<'a> Labeled for &'a str {
    fn label(&self) -> &str {
        self
    }
}

/// Default descendant metadata: a value and an optional display label
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemMeta {
    pub value: String,
    pub label: Option<String>,
}

impl ItemMeta {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    /// Metadata whose displayed text differs from its value
    pub fn labeled(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: Some(label.into()),
        }
    }
}

impl Labeled for ItemMeta {
    fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.value)
    }
}

/// Read-only snapshot of one registered record
#[derive(Clone, Debug, PartialEq)]
pub struct Descendant<H, M> {
    pub id: DescendantId,
    pub handle: H,
    pub index: usize,
    pub disabled: bool,
    pub meta: M,
    /// False while the record's document position is still unknown; its
    /// index is provisional until a later pass places it
    pub resolved: bool,
}

struct Entry<H, M> {
    handle: H,
    disabled: bool,
    meta: M,
    fixed_index: Option<usize>,
    resolved: Cell<bool>,
}

/// Registry shared between a widget controller and its machine actions
pub type SharedRegistry<H, M> = Rc<RefCell<DescendantRegistry<H, M>>>;

/// Live, document-ordered list of descendants for one collection
pub struct DescendantRegistry<H, M> {
    host: SharedHost<H>,
    entries: SlotMap<DescendantId, Entry<H, M>>,
    /// Records without a fixed index, in known document order
    flow: RefCell<Vec<DescendantId>>,
    /// Final index order, valid while `dirty` is false
    layout: RefCell<Vec<DescendantId>>,
    dirty: Cell<bool>,
}

impl<H, M> DescendantRegistry<H, M> {
    pub fn new(host: SharedHost<H>) -> Self {
        Self {
            host,
            entries: SlotMap::with_key(),
            flow: RefCell::new(Vec::new()),
            layout: RefCell::new(Vec::new()),
            dirty: Cell::new(false),
        }
    }

    /// Create a registry already wrapped for sharing with machine actions
    pub fn shared(host: SharedHost<H>) -> SharedRegistry<H, M> {
        Rc::new(RefCell::new(Self::new(host)))
    }

    /// Register a descendant
    ///
    /// With `fixed_index` the record sits at that index regardless of document
    /// order. Otherwise it is placed by document position, or appended if its
    /// handle has no position yet.
    pub fn register(
        &mut self,
        handle: H,
        disabled: bool,
        meta: M,
        fixed_index: Option<usize>,
    ) -> Result<DescendantId, RegistryError> {
        if let Some(index) = fixed_index {
            if self.entries.values().any(|e| e.fixed_index == Some(index)) {
                tracing::warn!(index, "descendant registered with an explicit index already in use");
                return Err(RegistryError::DuplicateIndex { index });
            }
        }

        let resolved = fixed_index.is_some() || self.is_mounted(&handle);
        let id = self.entries.insert(Entry {
            handle,
            disabled,
            meta,
            fixed_index,
            resolved: Cell::new(resolved),
        });

        if fixed_index.is_none() {
            let mut flow = self.flow.borrow_mut();
            self.place(&mut flow, id);
        }
        self.dirty.set(true);

        tracing::trace!(?id, resolved, "descendant registered");
        Ok(id)
    }

    /// Remove a descendant
    ///
    /// Removing an unknown or already removed id is a no-op and returns false;
    /// mount/unmount races during fast re-renders hit this routinely.
    pub fn deregister(&mut self, id: DescendantId) -> bool {
        if self.entries.remove(id).is_none() {
            tracing::trace!(?id, "deregister of unknown descendant ignored");
            return false;
        }
        self.flow.get_mut().retain(|other| *other != id);
        self.dirty.set(true);
        true
    }

    /// Update a record's disabled flag and metadata in place
    pub fn update(&mut self, id: DescendantId, disabled: bool, meta: M) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.disabled = disabled;
                entry.meta = meta;
                true
            }
            None => false,
        }
    }

    pub fn set_disabled(&mut self, id: DescendantId, disabled: bool) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.disabled = disabled;
                true
            }
            None => false,
        }
    }

    /// Forget every known position and re-place all records on the next read
    ///
    /// The collaborator calls this after it reorders mounted items in place.
    pub fn invalidate(&self) {
        for entry in self.entries.values() {
            if entry.fixed_index.is_none() {
                entry.resolved.set(false);
            }
        }
        self.dirty.set(true);
    }

    /// Index of a record, `None` if it is not registered
    pub fn index_of(&self, id: DescendantId) -> Option<usize> {
        if !self.entries.contains_key(id) {
            return None;
        }
        self.ensure_layout();
        self.layout.borrow().iter().position(|other| *other == id)
    }

    pub fn contains(&self, id: DescendantId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether every record has a known document position
    pub fn is_resolved(&self) -> bool {
        self.entries.values().all(|e| e.resolved.get())
    }

    fn is_mounted(&self, handle: &H) -> bool {
        self.host.compare_document_position(handle, handle).is_some()
    }

    /// Insert `id` into `flow` before the first record it precedes
    fn place(&self, flow: &mut Vec<DescendantId>, id: DescendantId) {
        let handle = &self.entries[id].handle;
        let position = flow.iter().position(|other| {
            matches!(
                self.host
                    .compare_document_position(handle, &self.entries[*other].handle),
                Some(Ordering::Less)
            )
        });
        match position {
            Some(at) => flow.insert(at, id),
            None => flow.push(id),
        }
    }

    fn ensure_layout(&self) {
        if !self.dirty.get() {
            return;
        }

        let mut flow = self.flow.borrow_mut();
        let pending: Vec<DescendantId> = flow
            .iter()
            .copied()
            .filter(|id| !self.entries[*id].resolved.get())
            .collect();
        if !pending.is_empty() {
            flow.retain(|id| self.entries[*id].resolved.get());
            for id in pending {
                self.place(&mut flow, id);
                let entry = &self.entries[id];
                entry.resolved.set(self.is_mounted(&entry.handle));
            }
        }

        let mut fixed: Vec<(usize, DescendantId)> = self
            .entries
            .iter()
            .filter_map(|(id, e)| e.fixed_index.map(|index| (index, id)))
            .collect();
        fixed.sort_by_key(|(index, _)| *index);

        let mut layout = flow.clone();
        for (index, id) in fixed {
            let at = index.min(layout.len());
            layout.insert(at, id);
        }
        *self.layout.borrow_mut() = layout;

        // Unplaced records keep the registry dirty so every read retries them
        self.dirty.set(!self.is_resolved());
    }
}

impl<H: Clone, M: Clone> DescendantRegistry<H, M> {
    fn snapshot(&self, id: DescendantId, index: usize) -> Descendant<H, M> {
        let entry = &self.entries[id];
        Descendant {
            id,
            handle: entry.handle.clone(),
            index,
            disabled: entry.disabled,
            meta: entry.meta.clone(),
            resolved: entry.resolved.get(),
        }
    }

    /// Every record in index order
    ///
    /// The returned vector is a copy, safe to hold while the registry keeps
    /// changing.
    pub fn all(&self) -> Vec<Descendant<H, M>> {
        self.ensure_layout();
        self.layout
            .borrow()
            .iter()
            .enumerate()
            .map(|(index, id)| self.snapshot(*id, index))
            .collect()
    }

    /// Records that keyboard navigation may land on
    ///
    /// Disabled records keep their index; they are only skipped here.
    pub fn enabled_only(&self) -> Vec<Descendant<H, M>> {
        self.all().into_iter().filter(|d| !d.disabled).collect()
    }

    pub fn get(&self, id: DescendantId) -> Option<Descendant<H, M>> {
        let index = self.index_of(id)?;
        Some(self.snapshot(id, index))
    }

    pub fn at(&self, index: usize) -> Option<Descendant<H, M>> {
        self.ensure_layout();
        let id = *self.layout.borrow().get(index)?;
        Some(self.snapshot(id, index))
    }

    /// First record whose metadata satisfies `predicate`
    pub fn find_by(&self, predicate: impl Fn(&M) -> bool) -> Option<Descendant<H, M>> {
        self.all().into_iter().find(|d| predicate(&d.meta))
    }

    pub fn first_enabled(&self) -> Option<Descendant<H, M>> {
        self.all().into_iter().find(|d| !d.disabled)
    }

    pub fn last_enabled(&self) -> Option<Descendant<H, M>> {
        self.all().into_iter().rev().find(|d| !d.disabled)
    }

    /// Next enabled record after `from`, wrapping to the start when `rotate`
    pub fn next_enabled(&self, from: usize, rotate: bool) -> Option<Descendant<H, M>> {
        let all = self.all();
        let after = all.iter().skip(from + 1).find(|d| !d.disabled).cloned();
        match after {
            Some(d) => Some(d),
            None if rotate => all.into_iter().take(from).find(|d| !d.disabled),
            None => None,
        }
    }

    /// Previous enabled record before `from`, wrapping to the end when `rotate`
    pub fn previous_enabled(&self, from: usize, rotate: bool) -> Option<Descendant<H, M>> {
        let all = self.all();
        let before = all.iter().take(from).rev().find(|d| !d.disabled).cloned();
        match before {
            Some(d) => Some(d),
            None if rotate => all.into_iter().skip(from + 1).rev().find(|d| !d.disabled),
            None => None,
        }
    }

    /// Resolve a keyboard move from the record at `from`
    ///
    /// Returns `None` when there is nowhere to go (empty registry, or the end
    /// of the list without rotation); callers keep their current position.
    pub fn navigate(
        &self,
        from: Option<usize>,
        direction: Direction,
        rotate: bool,
    ) -> Option<Descendant<H, M>> {
        match (direction, from) {
            (Direction::First, _) | (Direction::Next, None) => self.first_enabled(),
            (Direction::Last, _) | (Direction::Previous, None) => self.last_enabled(),
            (Direction::Next, Some(index)) => self.next_enabled(index, rotate),
            (Direction::Previous, Some(index)) => self.previous_enabled(index, rotate),
        }
    }
}
