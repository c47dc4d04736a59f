//! # Entity Views
//!
//! Read-only views over engine-owned entity arrays. A view is *live*: the
//! engine keeps mutating the backing array, and the view always reflects the
//! current contents. It is immutable only in the sense that it offers no way
//! to modify the array through its own API.

use std::cell::RefCell;
use std::rc::Rc;

use super::entity::Entity;

/// A live, read-only view of an entity array owned by the engine.
///
/// Cloning a view is cheap and yields a handle onto the same array. Indexed
/// access reads the array as it is *now*; [`EntityView::iter`] snapshots the
/// contents first, so iterating stays well-defined even when entities are
/// removed mid-loop.
#[derive(Clone)]
pub struct EntityView {
    entities: Rc<RefCell<Vec<Entity>>>,
}

impl EntityView {
    /// Wraps a shared entity array.
    pub(crate) fn new(entities: Rc<RefCell<Vec<Entity>>>) -> Self {
        Self { entities }
    }

    /// Returns the current number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.borrow().len()
    }

    /// Returns whether the view is currently empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.borrow().is_empty()
    }

    /// Returns the entity at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Entity> {
        self.entities.borrow().get(index).cloned()
    }

    /// Returns the first entity, if any.
    #[must_use]
    pub fn first(&self) -> Option<Entity> {
        self.entities.borrow().first().cloned()
    }

    /// Returns whether `entity` is currently in the view.
    #[must_use]
    pub fn contains(&self, entity: &Entity) -> bool {
        self.entities.borrow().iter().any(|candidate| candidate == entity)
    }

    /// Iterates over a snapshot of the current contents.
    pub fn iter(&self) -> impl Iterator<Item = Entity> {
        self.to_vec().into_iter()
    }

    /// Copies the current contents into a vector of handles.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Entity> {
        self.entities.borrow().clone()
    }
}
