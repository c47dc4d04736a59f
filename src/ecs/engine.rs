//! # Engine
//!
//! The facade that owns everything: the canonical entity set, the family
//! index, the listener registry, and the system registry. One call to
//! [`Engine::update`] is one tick.
//!
//! The engine is single-threaded cooperative. Two flags gate every mutation:
//! `updating` (a tick is in flight) and `notifying` (a listener dispatch is
//! in flight). While either is set, entity and component mutations are
//! queued; the queues are drained to a fixpoint after each system and at
//! explicit drain requests. Entity removal can synthesize component events
//! and component changes can trigger listener-driven entity operations, so
//! the drain alternates between both queues until both are empty.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;
use tracing::debug;

use super::component::Component;
use super::component_operation::ComponentOperationHandler;
use super::entity::Entity;
use super::entity_manager::EntityManager;
use super::family::Family;
use super::family_manager::{EntityListener, FamilyManager};
use super::system::{EntitySystem, SystemManager};
use super::view::EntityView;
use crate::error::{EngineError, EngineResult};

/// Process-wide entity id source, shared by every engine.
static ENTITY_IDS: AtomicU64 = AtomicU64::new(1);

/// Draws the next entity id. Atomic so stray cross-thread creation cannot
/// mint duplicates; this does not make the engine itself thread-safe.
pub(crate) fn next_entity_id() -> u64 {
    ENTITY_IDS.fetch_add(1, Ordering::Relaxed)
}

/// Construction parameters for an [`Engine`].
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Expected number of entities, used to pre-size the id lookup.
    /// 0 means implementation default.
    pub initial_entity_capacity: usize,
    /// Target load factor for the id lookup. 0 means implementation
    /// default.
    pub load_factor: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_entity_capacity: 0,
            load_factor: 0.0,
        }
    }
}

/// Clears the updating flag when a tick scope ends, even on unwind.
struct UpdatingGuard<'a>(&'a Cell<bool>);

impl Drop for UpdatingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

type ComponentFactory = Rc<dyn Fn() -> Option<Box<dyn Any>>>;

pub(crate) struct EngineCore {
    /// Self-reference for the closures wired into entities.
    weak: Weak<EngineCore>,
    entities: EntityManager,
    families: FamilyManager,
    systems: SystemManager,
    operations: Rc<ComponentOperationHandler>,
    factories: RefCell<FxHashMap<TypeId, ComponentFactory>>,
    /// True for the duration of an `update` call.
    updating: Cell<bool>,
}

impl EngineCore {
    /// Whether mutations requested right now must be deferred.
    pub(crate) fn deferred(&self) -> bool {
        self.updating.get() || self.families.notifying()
    }

    /// Wires a freshly registered entity into the engine: the family
    /// refresh hooks on its component signals, the operation handler
    /// back-reference, and its initial family memberships.
    pub(crate) fn entity_added_internal(&self, entity: &Entity) {
        let refresh = self.weak.clone();
        let added = entity.component_added().connect(move |changed: &Entity| {
            if let Some(core) = refresh.upgrade() {
                core.families.update_family_membership(changed);
            }
        });

        let refresh = self.weak.clone();
        let removed = entity.component_removed().connect(move |changed: &Entity| {
            if let Some(core) = refresh.upgrade() {
                core.families.update_family_membership(changed);
            }
        });

        entity.set_engine_hooks(Some((added, removed)));
        entity.set_operation_handler(Some(Rc::downgrade(&self.operations)));

        self.families.update_family_membership(entity);
    }

    /// Unwires an entity leaving the engine. Family listeners fire first,
    /// while the entity still owns its components.
    pub(crate) fn entity_removed_internal(&self, entity: &Entity) {
        self.families.update_family_membership(entity);

        if let Some((added, removed)) = entity.take_engine_hooks() {
            entity.component_added().disconnect(added);
            entity.component_removed().disconnect(removed);
        }
        entity.set_operation_handler(None);
    }

    /// Drains both operation queues to a fixpoint.
    ///
    /// A no-op while a listener dispatch is in flight: the enclosing drain
    /// picks the operations up once the dispatch window closes.
    pub(crate) fn process_pending_operations(&self) -> EngineResult<()> {
        if self.families.notifying() {
            return Ok(());
        }
        while self.operations.has_operations() || self.entities.has_pending() {
            self.operations.process_operations();
            self.entities.process_pending_operations(self)?;
        }
        Ok(())
    }
}

/// The heart of the framework: owns entities, families, listeners, and
/// systems, and drives one tick per [`update`](Engine::update) call.
///
/// `Engine` is a cheap-clone handle; clones refer to the same engine, so
/// systems and listeners may retain one and call back in. The engine is
/// single-threaded: handles must stay on the thread that created them.
#[derive(Clone)]
pub struct Engine {
    core: Rc<EngineCore>,
}

impl Engine {
    /// Creates an engine with default sizing.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an engine with explicit sizing parameters.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        let core = Rc::new_cyclic(|weak: &Weak<EngineCore>| {
            let informer = weak.clone();
            let operations = ComponentOperationHandler::new(Box::new(move || {
                informer.upgrade().is_some_and(|core| core.deferred())
            }));

            EngineCore {
                weak: weak.clone(),
                entities: EntityManager::new(&config),
                families: FamilyManager::new(),
                systems: SystemManager::new(),
                operations: Rc::new(operations),
                factories: RefCell::new(FxHashMap::default()),
                updating: Cell::new(false),
            }
        });
        Self { core }
    }

    // --- entities -----------------------------------------------------------

    /// Creates a detached entity with a fresh id.
    ///
    /// The entity joins the engine only once passed to
    /// [`add_entity`](Engine::add_entity).
    #[must_use]
    pub fn create_entity(&self) -> Entity {
        Entity::new(next_entity_id())
    }

    /// Adds an entity to this engine.
    ///
    /// Deferred while a tick or dispatch is in flight. Adding an entity
    /// already registered here fails with
    /// [`EngineError::AlreadyRegistered`]; for a deferred add the error
    /// surfaces from the drain that applies it.
    pub fn add_entity(&self, entity: &Entity) -> EngineResult<()> {
        let delayed = self.core.deferred();
        self.core.entities.add_entity(entity, delayed, &self.core)
    }

    /// Removes an entity from this engine.
    ///
    /// Deferred while a tick or dispatch is in flight; double-scheduling
    /// the same entity is idempotent. Removing an unregistered entity is a
    /// no-op.
    pub fn remove_entity(&self, entity: &Entity) {
        let delayed = self.core.deferred();
        self.core.entities.remove_entity(entity, delayed, &self.core);
    }

    /// Removes the entity with the given id, if registered.
    pub fn remove_entity_by_id(&self, id: u64) {
        if let Some(entity) = self.entity(id) {
            self.remove_entity(&entity);
        }
    }

    /// Removes every entity registered with this engine.
    pub fn remove_all_entities(&self) {
        let delayed = self.core.deferred();
        let view = self.core.entities.entities_view();
        self.core.entities.remove_all_entities(&view, delayed, &self.core);
    }

    /// Removes every entity currently matching `family`.
    ///
    /// The delayed form captures the live family view: what gets removed is
    /// whatever matches at drain time.
    pub fn remove_all_entities_in(&self, family: &Family) {
        let delayed = self.core.deferred();
        let view = self.entities_for(family);
        self.core.entities.remove_all_entities(&view, delayed, &self.core);
    }

    /// Looks up a registered entity by id.
    #[must_use]
    pub fn entity(&self, id: u64) -> Option<Entity> {
        self.core.entities.entity_by_id(id)
    }

    /// The live view of all registered entities, in registration order.
    #[must_use]
    pub fn entities(&self) -> EntityView {
        self.core.entities.entities_view()
    }

    // --- components ---------------------------------------------------------

    /// Registers a fallible factory for component type `C`.
    pub fn register_component_factory<C: Component>(
        &self,
        factory: impl Fn() -> Option<C> + 'static,
    ) {
        self.core.factories.borrow_mut().insert(
            TypeId::of::<C>(),
            Rc::new(move || factory().map(|component| Box::new(component) as Box<dyn Any>)),
        );
    }

    /// Builds a component through the registered factory for `C`.
    ///
    /// Returns `None` when no factory is registered or the factory fails.
    #[must_use]
    pub fn create_component<C: Component>(&self) -> Option<C> {
        let factory = self.core.factories.borrow().get(&TypeId::of::<C>()).cloned()?;
        let boxed = factory()?;
        boxed.downcast::<C>().ok().map(|component| *component)
    }

    // --- families and listeners --------------------------------------------

    /// The live view of entities matching `family`.
    ///
    /// Returns the same underlying view for the same family every time; the
    /// first call registers the family and backfills from the current
    /// entity set.
    #[must_use]
    pub fn entities_for(&self, family: &Family) -> EntityView {
        self.core
            .families
            .entities_for(family, &self.core.entities.entities_view())
    }

    /// Registers a listener for every entity entering or leaving the
    /// engine, at the given priority (lower fires first).
    pub fn add_entity_listener(&self, priority: i32, listener: Rc<RefCell<dyn EntityListener>>) {
        self.add_family_listener(&Family::all::<()>().get(), priority, listener);
    }

    /// Registers a listener on a specific family, at the given priority
    /// (lower fires first; ties fire in registration order).
    pub fn add_family_listener(
        &self,
        family: &Family,
        priority: i32,
        listener: Rc<RefCell<dyn EntityListener>>,
    ) {
        self.core.families.add_entity_listener(
            family,
            priority,
            listener,
            &self.core.entities.entities_view(),
        );
    }

    /// Unregisters a listener from every family it was bound to.
    pub fn remove_entity_listener(&self, listener: &Rc<RefCell<dyn EntityListener>>) {
        self.core.families.remove_entity_listener(listener);
    }

    // --- systems ------------------------------------------------------------

    /// Registers a system, replacing any existing system of the same
    /// concrete type.
    pub fn add_system<S: EntitySystem>(&self, system: S) {
        let (replaced, added) = self.core.systems.add(system);
        if let Some(old) = replaced {
            old.borrow_mut().removed_from_engine(self);
        }
        added.borrow_mut().added_to_engine(self);
        debug!(system = std::any::type_name::<S>(), "system added");
    }

    /// Unregisters the system of concrete type `S`.
    ///
    /// Returns whether such a system was registered.
    pub fn remove_system<S: EntitySystem>(&self) -> bool {
        match self.core.systems.remove::<S>() {
            Some(system) => {
                system.borrow_mut().removed_from_engine(self);
                debug!(system = std::any::type_name::<S>(), "system removed");
                true
            }
            None => false,
        }
    }

    /// Unregisters every system.
    pub fn remove_all_systems(&self) {
        for system in self.core.systems.remove_all() {
            system.borrow_mut().removed_from_engine(self);
        }
    }

    /// Typed retrieval of a registered system.
    #[must_use]
    pub fn system<S: EntitySystem>(&self) -> Option<Rc<RefCell<S>>> {
        self.core.systems.get::<S>()
    }

    /// The registered systems in current execution order.
    #[must_use]
    pub fn systems(&self) -> Vec<Rc<RefCell<dyn EntitySystem>>> {
        self.core.systems.snapshot()
    }

    // --- tick ---------------------------------------------------------------

    /// Runs one tick: every processing system in priority order, draining
    /// pending operations after each one.
    ///
    /// Fails with [`EngineError::ReentrantUpdate`] when called from within
    /// a tick. The updating flag is cleared on every exit path, including
    /// errors surfaced from a drain and listener panics.
    pub fn update(&self, delta_time: f32) -> EngineResult<()> {
        if self.core.updating.get() {
            return Err(EngineError::ReentrantUpdate);
        }
        self.core.updating.set(true);
        let _guard = UpdatingGuard(&self.core.updating);

        for system in self.core.systems.snapshot() {
            let processing = system.borrow().check_processing();
            if processing {
                system.borrow_mut().update(self, delta_time);
            }
            self.core.process_pending_operations()?;
        }
        Ok(())
    }

    /// Drains all pending component and entity operations to a fixpoint.
    ///
    /// Component operations are applied first, then entity operations, then
    /// both queues are re-checked: applying either kind may enqueue more of
    /// the other.
    pub fn process_pending_operations(&self) -> EngineResult<()> {
        self.core.process_pending_operations()
    }

    /// Whether a tick is currently in flight.
    #[must_use]
    pub fn is_updating(&self) -> bool {
        self.core.updating.get()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;
    impl Component for Marker {}

    #[test]
    fn test_create_entity_assigns_monotonic_ids() {
        let engine = Engine::new();
        let first = engine.create_entity();
        let second = engine.create_entity();
        assert!(first.id() > 0);
        assert!(second.id() > first.id());
    }

    #[test]
    fn test_immediate_add_and_lookup() {
        let engine = Engine::new();
        let entity = engine.create_entity();
        engine.add_entity(&entity).unwrap();

        assert_eq!(engine.entities().len(), 1);
        assert_eq!(engine.entity(entity.id()), Some(entity));
    }

    #[test]
    fn test_duplicate_add_is_rejected() {
        let engine = Engine::new();
        let entity = engine.create_entity();
        engine.add_entity(&entity).unwrap();

        let result = engine.add_entity(&entity);
        assert_eq!(
            result,
            Err(EngineError::AlreadyRegistered { id: entity.id() })
        );
    }

    #[test]
    fn test_remove_clears_id_and_lookup() {
        let engine = Engine::new();
        let entity = engine.create_entity();
        let id = entity.id();
        engine.add_entity(&entity).unwrap();

        engine.remove_entity(&entity);
        assert_eq!(entity.id(), 0);
        assert!(engine.entity(id).is_none());
        assert!(engine.entities().is_empty());
    }

    #[test]
    fn test_readding_removed_entity_gets_fresh_id() {
        let engine = Engine::new();
        let entity = engine.create_entity();
        let original = entity.id();
        engine.add_entity(&entity).unwrap();
        engine.remove_entity(&entity);

        engine.add_entity(&entity).unwrap();
        assert_ne!(entity.id(), 0);
        assert_ne!(entity.id(), original);
        assert_eq!(engine.entity(entity.id()), Some(entity));
    }

    #[test]
    fn test_component_factory_hook() {
        let engine = Engine::new();
        assert!(engine.create_component::<Marker>().is_none());

        engine.register_component_factory::<Marker>(|| Some(Marker));
        assert!(engine.create_component::<Marker>().is_some());

        engine.register_component_factory::<Marker>(|| None);
        assert!(engine.create_component::<Marker>().is_none());
    }
}
