//! # Component Operation Queue
//!
//! While a tick or a listener dispatch is in flight, component mutations
//! must not reshape family caches mid-iteration. This queue holds them until
//! the next drain. The deferral decision is delegated to a predicate owned
//! by the engine, evaluated at the moment of each request.

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;

use super::entity::Entity;

/// A queued component mutation.
enum ComponentOperation {
    /// Attach `component` under `type_index`.
    Add {
        entity: Entity,
        type_index: usize,
        component: Box<dyn Any>,
    },
    /// Detach the component under `type_index`.
    Remove { entity: Entity, type_index: usize },
}

/// Routes component mutations: direct application when the engine is idle,
/// FIFO queueing while it is updating or dispatching.
pub(crate) struct ComponentOperationHandler {
    /// Pending operations in request order.
    operations: RefCell<VecDeque<ComponentOperation>>,
    /// Answers "is deferral currently required?".
    deferred: Box<dyn Fn() -> bool>,
}

impl ComponentOperationHandler {
    pub(crate) fn new(deferred: Box<dyn Fn() -> bool>) -> Self {
        Self {
            operations: RefCell::new(VecDeque::new()),
            deferred,
        }
    }

    /// Queues or directly applies a component addition.
    pub(crate) fn add(&self, entity: &Entity, type_index: usize, component: Box<dyn Any>) {
        if (self.deferred)() {
            self.operations.borrow_mut().push_back(ComponentOperation::Add {
                entity: entity.clone(),
                type_index,
                component,
            });
        } else {
            entity.apply_add(type_index, component);
        }
    }

    /// Queues or directly applies a component removal.
    pub(crate) fn remove(&self, entity: &Entity, type_index: usize) {
        if (self.deferred)() {
            self.operations
                .borrow_mut()
                .push_back(ComponentOperation::Remove {
                    entity: entity.clone(),
                    type_index,
                });
        } else {
            entity.apply_remove(type_index);
        }
    }

    pub(crate) fn has_operations(&self) -> bool {
        !self.operations.borrow().is_empty()
    }

    /// Applies queued operations in FIFO order.
    ///
    /// Applying an operation dispatches signals, which may enqueue further
    /// operations; those are applied in the same pass. The queue borrow is
    /// released around each application so reentrant enqueues are safe.
    pub(crate) fn process_operations(&self) {
        loop {
            let operation = self.operations.borrow_mut().pop_front();
            match operation {
                Some(ComponentOperation::Add {
                    entity,
                    type_index,
                    component,
                }) => entity.apply_add(type_index, component),
                Some(ComponentOperation::Remove { entity, type_index }) => {
                    entity.apply_remove(type_index);
                }
                None => break,
            }
        }
    }
}
