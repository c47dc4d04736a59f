//! # Entities
//!
//! An entity is an identity plus a dynamic component set. Handles are cheap
//! clones of one shared record; equality and hashing go by identity, never
//! by id, which is what makes duplicate registration checks exact even
//! while ids are reassigned.
//!
//! Component mutations route through the engine's operation handler whenever
//! one is attached and the engine is updating or dispatching; otherwise they
//! apply in place. Either way the `component_added`/`component_removed`
//! signals fire only after the component map and mask reflect the change.

use std::any::Any;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use super::bits::Bits;
use super::component::{Component, ComponentType};
use super::component_operation::ComponentOperationHandler;
use super::signal::{Signal, SignalConnection};

/// Shared record behind every [`Entity`] handle.
struct EntityRecord {
    /// Engine-assigned id; 0 while detached.
    id: Cell<u64>,
    /// Free-form application flags; never interpreted by the engine.
    flags: Cell<u32>,
    /// Components present, keyed by component type index.
    components: RefCell<HashMap<usize, Box<dyn Any>>>,
    /// Mask of component type indices present. Always mirrors `components`.
    component_bits: RefCell<Bits>,
    /// Mask of family indices this entity currently belongs to.
    family_bits: RefCell<Bits>,
    /// Set while a delayed removal is queued.
    scheduled_for_removal: Cell<bool>,
    /// Set for the duration of the removal notification window.
    removing: Cell<bool>,
    /// Fires after a component lands in the map.
    component_added: Signal<Entity>,
    /// Fires after a component leaves the map.
    component_removed: Signal<Entity>,
    /// Back-reference to the owning engine's operation handler, if managed.
    operation_handler: RefCell<Option<Weak<ComponentOperationHandler>>>,
    /// Engine subscriptions on the two signals, removed on detach.
    engine_hooks: Cell<Option<(SignalConnection, SignalConnection)>>,
}

/// A handle to one entity.
///
/// Clones are handles to the same entity; `==` and hashing are by identity.
#[derive(Clone)]
pub struct Entity {
    record: Rc<EntityRecord>,
}

impl Entity {
    /// Creates a detached entity with the given id.
    pub(crate) fn new(id: u64) -> Self {
        Self {
            record: Rc::new(EntityRecord {
                id: Cell::new(id),
                flags: Cell::new(0),
                components: RefCell::new(HashMap::new()),
                component_bits: RefCell::new(Bits::new()),
                family_bits: RefCell::new(Bits::new()),
                scheduled_for_removal: Cell::new(false),
                removing: Cell::new(false),
                component_added: Signal::new(),
                component_removed: Signal::new(),
                operation_handler: RefCell::new(None),
                engine_hooks: Cell::new(None),
            }),
        }
    }

    /// The entity's engine-assigned id.
    ///
    /// 0 means detached: either never added to an engine, or removal has
    /// completed.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.record.id.get()
    }

    /// Free-form application flags.
    #[inline]
    #[must_use]
    pub fn flags(&self) -> u32 {
        self.record.flags.get()
    }

    /// Sets the free-form application flags.
    #[inline]
    pub fn set_flags(&self, flags: u32) {
        self.record.flags.set(flags);
    }

    /// Attaches a component, replacing any existing component of the same
    /// type.
    ///
    /// Applies immediately when detached or when the engine is idle;
    /// otherwise the mutation is queued and applied at the next drain.
    /// Returns `self` for chaining.
    pub fn add<C: Component>(&self, component: C) -> &Self {
        let index = ComponentType::of::<C>().index();
        self.add_by_index(index, Box::new(component));
        self
    }

    /// Removes the component of type `C`.
    ///
    /// Routed exactly like [`add`](Entity::add): queued while a tick or
    /// dispatch is in flight, so an add followed by a remove lands in
    /// request order at the next drain. Removing an absent component is a
    /// no-op at application time. Returns `self` for chaining.
    pub fn remove<C: Component>(&self) -> &Self {
        let index = ComponentType::of::<C>().index();
        self.remove_by_index(index);
        self
    }

    /// Removes every component, one removal event per component.
    ///
    /// Removals are issued in ascending component type index order.
    pub fn remove_all(&self) {
        let indices: Vec<usize> = self.record.component_bits.borrow().ones().collect();
        for index in indices {
            self.remove_by_index(index);
        }
    }

    /// Returns the component of type `C`, if present.
    ///
    /// The returned guard borrows the component map; drop it before
    /// mutating this entity's components.
    #[must_use]
    pub fn get<C: Component>(&self) -> Option<Ref<'_, C>> {
        let index = ComponentType::of::<C>().index();
        Ref::filter_map(self.record.components.borrow(), |components| {
            components.get(&index).and_then(|c| c.downcast_ref::<C>())
        })
        .ok()
    }

    /// Returns the component of type `C` mutably, if present.
    #[must_use]
    pub fn get_mut<C: Component>(&self) -> Option<RefMut<'_, C>> {
        let index = ComponentType::of::<C>().index();
        RefMut::filter_map(self.record.components.borrow_mut(), |components| {
            components.get_mut(&index).and_then(|c| c.downcast_mut::<C>())
        })
        .ok()
    }

    /// Returns whether a component of type `C` is present.
    #[must_use]
    pub fn has<C: Component>(&self) -> bool {
        self.record
            .component_bits
            .borrow()
            .get(ComponentType::of::<C>().index())
    }

    /// Returns whether every component type in `bits` is present.
    #[must_use]
    pub fn has_all(&self, bits: &Bits) -> bool {
        self.record.component_bits.borrow().contains_all(bits)
    }

    /// Returns whether any component type in `bits` is present.
    #[must_use]
    pub fn has_any(&self, bits: &Bits) -> bool {
        self.record.component_bits.borrow().intersects(bits)
    }

    /// The component types currently present, ascending by index.
    #[must_use]
    pub fn component_types(&self) -> Vec<ComponentType> {
        self.record
            .component_bits
            .borrow()
            .ones()
            .map(ComponentType::from_index)
            .collect()
    }

    /// The mask of component type indices present.
    #[must_use]
    pub fn component_bits(&self) -> Ref<'_, Bits> {
        self.record.component_bits.borrow()
    }

    /// The mask of family indices this entity currently belongs to.
    #[must_use]
    pub fn family_bits(&self) -> Ref<'_, Bits> {
        self.record.family_bits.borrow()
    }

    /// Whether a delayed removal has been queued for this entity.
    #[inline]
    #[must_use]
    pub fn scheduled_for_removal(&self) -> bool {
        self.record.scheduled_for_removal.get()
    }

    /// Whether the entity is inside its removal notification window.
    #[inline]
    #[must_use]
    pub fn removing(&self) -> bool {
        self.record.removing.get()
    }

    /// Signal fired after a component is attached.
    #[must_use]
    pub fn component_added(&self) -> &Signal<Entity> {
        &self.record.component_added
    }

    /// Signal fired after a component is removed.
    #[must_use]
    pub fn component_removed(&self) -> &Signal<Entity> {
        &self.record.component_removed
    }

    // --- internal paths -----------------------------------------------------

    /// Routes an addition through the operation handler when attached.
    pub(crate) fn add_by_index(&self, index: usize, component: Box<dyn Any>) {
        if let Some(handler) = self.operation_handler() {
            handler.add(self, index, component);
        } else {
            self.apply_add(index, component);
        }
    }

    /// Routes a removal through the operation handler when attached.
    pub(crate) fn remove_by_index(&self, index: usize) {
        if let Some(handler) = self.operation_handler() {
            handler.remove(self, index);
        } else {
            self.apply_remove(index);
        }
    }

    /// Installs a component and fires `component_added`.
    pub(crate) fn apply_add(&self, index: usize, component: Box<dyn Any>) {
        self.record.components.borrow_mut().insert(index, component);
        self.record.component_bits.borrow_mut().set(index);
        self.record.component_added.dispatch(self);
    }

    /// Drops a component and fires `component_removed`; no-op when absent.
    pub(crate) fn apply_remove(&self, index: usize) {
        let removed = self.record.components.borrow_mut().remove(&index).is_some();
        if removed {
            self.record.component_bits.borrow_mut().clear(index);
            self.record.component_removed.dispatch(self);
        }
    }

    fn operation_handler(&self) -> Option<Rc<ComponentOperationHandler>> {
        self.record
            .operation_handler
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
    }

    pub(crate) fn set_operation_handler(&self, handler: Option<Weak<ComponentOperationHandler>>) {
        *self.record.operation_handler.borrow_mut() = handler;
    }

    pub(crate) fn set_engine_hooks(&self, hooks: Option<(SignalConnection, SignalConnection)>) {
        self.record.engine_hooks.set(hooks);
    }

    pub(crate) fn take_engine_hooks(&self) -> Option<(SignalConnection, SignalConnection)> {
        self.record.engine_hooks.take()
    }

    pub(crate) fn set_id(&self, id: u64) {
        self.record.id.set(id);
    }

    pub(crate) fn set_scheduled_for_removal(&self, scheduled: bool) {
        self.record.scheduled_for_removal.set(scheduled);
    }

    pub(crate) fn set_removing(&self, removing: bool) {
        self.record.removing.set(removing);
    }

    pub(crate) fn family_bit(&self, index: usize) -> bool {
        self.record.family_bits.borrow().get(index)
    }

    pub(crate) fn set_family_bit(&self, index: usize) {
        self.record.family_bits.borrow_mut().set(index);
    }

    pub(crate) fn clear_family_bit(&self, index: usize) {
        self.record.family_bits.borrow_mut().clear(index);
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.record, &other.record)
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.record) as usize).hash(state);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id())
            .field("components", &self.record.components.borrow().len())
            .finish()
    }
}
