//! # KINDRED
//!
//! A single-threaded entity-component-system runtime built around three
//! guarantees:
//!
//! 1. **Cached family queries** - membership of every registered family is
//!    maintained incrementally as components change; queries never rescan.
//! 2. **Safe mid-tick mutation** - entities and components may be added or
//!    removed freely from systems and listeners; mutations requested while
//!    a tick or dispatch is in flight are queued and applied at the next
//!    drain, in request order.
//! 3. **Deterministic ordering** - systems run in stable priority order,
//!    listeners fire in stable priority order, and family events follow
//!    family-index order, every tick.
//!
//! ## Example
//!
//! ```rust,ignore
//! use kindred::{Component, Engine, Family};
//!
//! struct Position { x: f32, y: f32 }
//! impl Component for Position {}
//!
//! let engine = Engine::new();
//! let entity = engine.create_entity();
//! entity.add(Position { x: 0.0, y: 0.0 });
//! engine.add_entity(&entity)?;
//!
//! let movers = Family::all::<(Position,)>().get();
//! assert_eq!(engine.entities_for(&movers).len(), 1);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod ecs;
pub mod error;
pub mod memory;

pub use ecs::{
    Bits, Component, ComponentSet, ComponentType, Engine, EngineConfig, Entity, EntityListener,
    EntitySystem, EntityView, Family, FamilyBuilder, Signal, SignalConnection,
};
pub use error::{EngineError, EngineResult};
pub use memory::{Poolable, Recycler};
