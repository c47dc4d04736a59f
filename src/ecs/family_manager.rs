//! # Family Manager
//!
//! Keeps one cached entity array per registered family and fires
//! family-scoped add/remove events whenever an entity crosses a membership
//! boundary. Membership refresh walks families in ascending family-index
//! order, so event ordering is deterministic across ticks.
//!
//! Dispatch is reentrant-safe: listener lists are snapshotted at dispatch
//! entry, and a notifying depth counter makes every mutation requested from
//! inside a listener defer to the next drain.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use super::entity::Entity;
use super::family::Family;
use super::view::EntityView;

/// Receiver of family-scoped membership events.
///
/// Listeners run synchronously on the engine thread. They may freely call
/// back into the engine; mutations requested during a dispatch are deferred
/// and applied at the next drain.
pub trait EntityListener {
    /// An entity entered the observed family (or the engine, for the empty
    /// family).
    fn entity_added(&mut self, entity: &Entity);

    /// An entity left the observed family. For removals from the engine the
    /// entity still owns its components when this fires.
    fn entity_removed(&mut self, entity: &Entity);
}

/// A registered listener with its dispatch ordering key.
struct ListenerBinding {
    priority: i32,
    /// Registration sequence; breaks priority ties, keeping dispatch stable.
    seq: u64,
    listener: Rc<RefCell<dyn EntityListener>>,
}

/// Per-family runtime state.
struct FamilyEntry {
    family: Family,
    /// Cached members in arrival order. Shared with the public view.
    entities: Rc<RefCell<Vec<Entity>>>,
    view: EntityView,
    /// Bindings sorted ascending by (priority, seq).
    listeners: Vec<ListenerBinding>,
}

/// Decrements the notifying depth when a dispatch scope ends, even on
/// unwind.
struct NotifyingGuard<'a>(&'a Cell<u32>);

impl Drop for NotifyingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

pub(crate) struct FamilyManager {
    /// Entries keyed by family index; iteration order is index order.
    entries: RefCell<BTreeMap<usize, FamilyEntry>>,
    /// Depth of in-flight listener dispatches.
    notifying: Cell<u32>,
    /// Next listener registration sequence.
    next_seq: Cell<u64>,
}

impl FamilyManager {
    pub(crate) fn new() -> Self {
        Self {
            entries: RefCell::new(BTreeMap::new()),
            notifying: Cell::new(0),
            next_seq: Cell::new(0),
        }
    }

    /// True while any listener dispatch is in progress on the stack.
    pub(crate) fn notifying(&self) -> bool {
        self.notifying.get() > 0
    }

    /// Returns the live view for `family`, registering it on first use.
    ///
    /// Registration performs a one-time scan over the master array in
    /// insertion order to backfill the cache and the entities' family bits.
    pub(crate) fn entities_for(&self, family: &Family, master: &EntityView) -> EntityView {
        if let Some(entry) = self.entries.borrow().get(&family.index()) {
            return entry.view.clone();
        }

        let entities = Rc::new(RefCell::new(Vec::new()));
        for entity in master.iter() {
            if family.matches(&entity) && !entity.removing() {
                entity.set_family_bit(family.index());
                entities.borrow_mut().push(entity);
            }
        }

        let view = EntityView::new(Rc::clone(&entities));
        self.entries.borrow_mut().insert(
            family.index(),
            FamilyEntry {
                family: family.clone(),
                entities,
                view: view.clone(),
                listeners: Vec::new(),
            },
        );
        view
    }

    /// Registers a listener on `family`, ordered by ascending priority and
    /// stable on ties.
    pub(crate) fn add_entity_listener(
        &self,
        family: &Family,
        priority: i32,
        listener: Rc<RefCell<dyn EntityListener>>,
        master: &EntityView,
    ) {
        let _ = self.entities_for(family, master);

        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);

        let mut entries = self.entries.borrow_mut();
        if let Some(entry) = entries.get_mut(&family.index()) {
            let position = entry
                .listeners
                .partition_point(|binding| binding.priority <= priority);
            entry.listeners.insert(
                position,
                ListenerBinding {
                    priority,
                    seq,
                    listener,
                },
            );
        }
    }

    /// Unregisters a listener from every family it is bound to.
    ///
    /// A dispatch already in flight completes over its snapshot.
    pub(crate) fn remove_entity_listener(&self, listener: &Rc<RefCell<dyn EntityListener>>) {
        for entry in self.entries.borrow_mut().values_mut() {
            entry
                .listeners
                .retain(|binding| !Rc::ptr_eq(&binding.listener, listener));
        }
    }

    /// Re-evaluates `entity` against every registered family and fires
    /// add/remove events for each boundary crossed.
    ///
    /// An entity inside its removal window matches nothing, so it leaves
    /// every family while still owning its components.
    pub(crate) fn update_family_membership(&self, entity: &Entity) {
        let indices: Vec<usize> = self.entries.borrow().keys().copied().collect();

        for index in indices {
            let transition = {
                let entries = self.entries.borrow();
                let Some(entry) = entries.get(&index) else {
                    continue;
                };

                let belonged = entity.family_bit(index);
                let matches = entry.family.matches(entity) && !entity.removing();
                if matches == belonged {
                    continue;
                }

                let listeners: Vec<Rc<RefCell<dyn EntityListener>>> = entry
                    .listeners
                    .iter()
                    .map(|binding| Rc::clone(&binding.listener))
                    .collect();
                (matches, Rc::clone(&entry.entities), listeners)
            };
            let (joined, members, listeners) = transition;

            if joined {
                members.borrow_mut().push(entity.clone());
                entity.set_family_bit(index);

                self.notifying.set(self.notifying.get() + 1);
                let _guard = NotifyingGuard(&self.notifying);
                for listener in &listeners {
                    listener.borrow_mut().entity_added(entity);
                }
            } else {
                {
                    let mut members = members.borrow_mut();
                    if let Some(position) =
                        members.iter().position(|candidate| candidate == entity)
                    {
                        // order-preserving removal
                        members.remove(position);
                    }
                }
                entity.clear_family_bit(index);

                self.notifying.set(self.notifying.get() + 1);
                let _guard = NotifyingGuard(&self.notifying);
                for listener in &listeners {
                    listener.borrow_mut().entity_removed(entity);
                }
            }
        }
    }
}
