//! # Entity Systems
//!
//! Systems are the per-tick logic units. The registry keeps them sorted
//! ascending by priority (stable on ties, by registration order), replaces
//! on re-registration of the same concrete type, and offers typed
//! retrieval.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::engine::Engine;

/// A unit of per-tick logic driven by the engine.
///
/// Systems run in ascending priority order; lower values run first. The
/// engine passed to the callbacks is a handle to the owning engine and may
/// be retained.
pub trait EntitySystem: Any {
    /// Called once per tick while [`check_processing`](Self::check_processing)
    /// returns true.
    fn update(&mut self, engine: &Engine, delta_time: f32);

    /// Execution priority; lower runs earlier. Read once, at registration.
    fn priority(&self) -> i32 {
        0
    }

    /// Whether this system should process the current tick.
    fn check_processing(&self) -> bool {
        true
    }

    /// Called after the system is registered with an engine.
    fn added_to_engine(&mut self, engine: &Engine) {
        let _ = engine;
    }

    /// Called after the system is unregistered from an engine.
    fn removed_from_engine(&mut self, engine: &Engine) {
        let _ = engine;
    }
}

struct SystemEntry {
    priority: i32,
    /// Registration sequence; breaks priority ties.
    seq: u64,
    type_id: TypeId,
    system: Rc<RefCell<dyn EntitySystem>>,
}

pub(crate) struct SystemManager {
    /// Systems sorted ascending by (priority, seq).
    systems: RefCell<Vec<SystemEntry>>,
    /// Concrete-type lookup for typed retrieval.
    by_type: RefCell<FxHashMap<TypeId, Rc<dyn Any>>>,
    next_seq: Cell<u64>,
}

impl SystemManager {
    pub(crate) fn new() -> Self {
        Self {
            systems: RefCell::new(Vec::new()),
            by_type: RefCell::new(FxHashMap::default()),
            next_seq: Cell::new(0),
        }
    }

    /// Registers `system`, replacing any existing system of the same
    /// concrete type.
    ///
    /// Returns the replaced system (if any) and the handle of the newly
    /// registered one, so the engine can run the lifecycle callbacks.
    pub(crate) fn add<S: EntitySystem>(
        &self,
        system: S,
    ) -> (
        Option<Rc<RefCell<dyn EntitySystem>>>,
        Rc<RefCell<dyn EntitySystem>>,
    ) {
        let type_id = TypeId::of::<S>();
        let replaced = self.remove_by_type_id(type_id);

        let concrete = Rc::new(RefCell::new(system));
        let handle: Rc<RefCell<dyn EntitySystem>> = concrete.clone();
        let priority = handle.borrow().priority();

        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);

        let mut systems = self.systems.borrow_mut();
        let position = systems.partition_point(|entry| entry.priority <= priority);
        systems.insert(
            position,
            SystemEntry {
                priority,
                seq,
                type_id,
                system: handle.clone(),
            },
        );
        self.by_type.borrow_mut().insert(type_id, concrete);

        (replaced, handle)
    }

    /// Unregisters the system of concrete type `S`.
    pub(crate) fn remove<S: EntitySystem>(&self) -> Option<Rc<RefCell<dyn EntitySystem>>> {
        self.remove_by_type_id(TypeId::of::<S>())
    }

    fn remove_by_type_id(&self, type_id: TypeId) -> Option<Rc<RefCell<dyn EntitySystem>>> {
        self.by_type.borrow_mut().remove(&type_id)?;
        let mut systems = self.systems.borrow_mut();
        let position = systems.iter().position(|entry| entry.type_id == type_id)?;
        Some(systems.remove(position).system)
    }

    /// Unregisters every system, returning them in execution order.
    pub(crate) fn remove_all(&self) -> Vec<Rc<RefCell<dyn EntitySystem>>> {
        self.by_type.borrow_mut().clear();
        self.systems
            .borrow_mut()
            .drain(..)
            .map(|entry| entry.system)
            .collect()
    }

    /// Typed retrieval of a registered system.
    pub(crate) fn get<S: EntitySystem>(&self) -> Option<Rc<RefCell<S>>> {
        let any = self.by_type.borrow().get(&TypeId::of::<S>()).cloned()?;
        any.downcast::<RefCell<S>>().ok()
    }

    /// The systems in current execution order.
    pub(crate) fn snapshot(&self) -> Vec<Rc<RefCell<dyn EntitySystem>>> {
        self.systems
            .borrow()
            .iter()
            .map(|entry| Rc::clone(&entry.system))
            .collect()
    }
}
