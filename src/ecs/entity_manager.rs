//! # Entity Manager
//!
//! Owns the canonical entity set: the master insertion-ordered array, the id
//! lookup, and the identity set used for duplicate detection. Add and remove
//! requests either apply immediately or are queued as pooled operation
//! records and applied at the next drain, in request order.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use tracing::trace;

use super::engine::{next_entity_id, EngineConfig, EngineCore};
use super::entity::Entity;
use super::view::EntityView;
use crate::error::{EngineError, EngineResult};
use crate::memory::{Poolable, Recycler};

/// Kind of a queued entity operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum EntityOperationKind {
    #[default]
    Add,
    Remove,
    RemoveAll,
}

/// A pooled entity operation record.
///
/// `reset` drops the held entity and view so a recycled record never pins
/// entities the engine has already released.
#[derive(Default)]
struct EntityOperation {
    kind: EntityOperationKind,
    entity: Option<Entity>,
    view: Option<EntityView>,
}

impl Poolable for EntityOperation {
    fn reset(&mut self) {
        self.entity = None;
        self.view = None;
    }
}

pub(crate) struct EntityManager {
    /// Master array, in insertion order. Shared with the public view.
    entities: Rc<RefCell<Vec<Entity>>>,
    /// The live view handed out by `getEntities`.
    view: EntityView,
    /// Identity set for duplicate registration checks.
    entity_set: RefCell<HashSet<Entity>>,
    /// Lookup by engine-assigned id.
    by_id: RefCell<HashMap<u64, Entity>>,
    /// Queued operations in request order.
    pending: RefCell<VecDeque<EntityOperation>>,
    /// Recycler for operation records.
    pool: RefCell<Recycler<EntityOperation>>,
}

impl EntityManager {
    pub(crate) fn new(config: &EngineConfig) -> Self {
        let by_id = if config.initial_entity_capacity > 0 && config.load_factor > 0.0 {
            let slots = (config.initial_entity_capacity as f32 / config.load_factor).ceil();
            HashMap::with_capacity(slots as usize)
        } else {
            HashMap::new()
        };

        let entities = Rc::new(RefCell::new(Vec::new()));
        let view = EntityView::new(Rc::clone(&entities));
        Self {
            entities,
            view,
            entity_set: RefCell::new(HashSet::new()),
            by_id: RefCell::new(by_id),
            pending: RefCell::new(VecDeque::new()),
            pool: RefCell::new(Recycler::new()),
        }
    }

    /// The live view over the master array.
    pub(crate) fn entities_view(&self) -> EntityView {
        self.view.clone()
    }

    pub(crate) fn entity_by_id(&self, id: u64) -> Option<Entity> {
        self.by_id.borrow().get(&id).cloned()
    }

    pub(crate) fn add_entity(
        &self,
        entity: &Entity,
        delayed: bool,
        core: &EngineCore,
    ) -> EngineResult<()> {
        entity.set_scheduled_for_removal(false);

        if delayed {
            let mut operation = self.pool.borrow_mut().obtain();
            operation.kind = EntityOperationKind::Add;
            operation.entity = Some(entity.clone());
            self.pending.borrow_mut().push_back(operation);
            Ok(())
        } else {
            self.add_internal(entity, core)
        }
    }

    pub(crate) fn remove_entity(&self, entity: &Entity, delayed: bool, core: &EngineCore) {
        if delayed {
            // double-scheduling is idempotent
            if entity.scheduled_for_removal() {
                return;
            }
            entity.set_scheduled_for_removal(true);
            let mut operation = self.pool.borrow_mut().obtain();
            operation.kind = EntityOperationKind::Remove;
            operation.entity = Some(entity.clone());
            self.pending.borrow_mut().push_back(operation);
        } else {
            self.remove_internal(entity, core);
        }
    }

    /// Removes every entity of a live view.
    ///
    /// The delayed form flags the current members and captures the view
    /// itself; what actually gets removed is whatever the view contains at
    /// drain time.
    pub(crate) fn remove_all_entities(&self, view: &EntityView, delayed: bool, core: &EngineCore) {
        if delayed {
            for entity in view.iter() {
                entity.set_scheduled_for_removal(true);
            }
            let mut operation = self.pool.borrow_mut().obtain();
            operation.kind = EntityOperationKind::RemoveAll;
            operation.view = Some(view.clone());
            self.pending.borrow_mut().push_back(operation);
        } else {
            // the view is live and shrinks as removals land
            while let Some(first) = view.first() {
                self.remove_internal(&first, core);
            }
        }
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.borrow().is_empty()
    }

    /// Applies queued operations in FIFO order, releasing each record back
    /// to the pool. Operations queued while draining are applied in the
    /// same pass.
    pub(crate) fn process_pending_operations(&self, core: &EngineCore) -> EngineResult<()> {
        loop {
            let operation = self.pending.borrow_mut().pop_front();
            let Some(mut operation) = operation else {
                return Ok(());
            };

            let outcome = match operation.kind {
                EntityOperationKind::Add => match operation.entity.take() {
                    Some(entity) => self.add_internal(&entity, core),
                    None => Ok(()),
                },
                EntityOperationKind::Remove => {
                    if let Some(entity) = operation.entity.take() {
                        self.remove_internal(&entity, core);
                    }
                    Ok(())
                }
                EntityOperationKind::RemoveAll => {
                    if let Some(view) = operation.view.take() {
                        while let Some(first) = view.first() {
                            self.remove_internal(&first, core);
                        }
                    }
                    Ok(())
                }
            };

            self.pool.borrow_mut().release(operation);
            outcome?;
        }
    }

    pub(crate) fn add_internal(&self, entity: &Entity, core: &EngineCore) -> EngineResult<()> {
        if self.entity_set.borrow().contains(entity) {
            return Err(EngineError::AlreadyRegistered { id: entity.id() });
        }

        // an entity whose id was cleared by a previous removal gets a fresh one
        if entity.id() == 0 {
            entity.set_id(next_entity_id());
        }

        self.entities.borrow_mut().push(entity.clone());
        self.entity_set.borrow_mut().insert(entity.clone());
        self.by_id.borrow_mut().insert(entity.id(), entity.clone());
        trace!(id = entity.id(), "entity registered");

        core.entity_added_internal(entity);
        Ok(())
    }

    pub(crate) fn remove_internal(&self, entity: &Entity, core: &EngineCore) {
        // unknown entities are ignored
        if !self.entity_set.borrow_mut().remove(entity) {
            return;
        }

        entity.set_scheduled_for_removal(false);
        entity.set_removing(true);

        {
            let mut entities = self.entities.borrow_mut();
            if let Some(position) = entities.iter().position(|candidate| candidate == entity) {
                entities.remove(position);
            }
        }

        // listeners observe the entity with its components still present
        core.entity_removed_internal(entity);

        entity.set_removing(false);

        let mut by_id = self.by_id.borrow_mut();
        let still_mapped = by_id
            .get(&entity.id())
            .is_some_and(|mapped| mapped == entity);
        if still_mapped {
            by_id.remove(&entity.id());
            entity.set_id(0);
        }
        trace!("entity removed");
    }
}
