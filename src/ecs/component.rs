//! # Component Types
//!
//! Components are opaque user values tagged by their Rust type. The engine
//! only ever needs one thing from a component type: a dense small-integer
//! index, assigned on first use and stable for the lifetime of the process.
//! Those indices are the bit positions in every component mask and family
//! predicate.

use std::any::{Any, TypeId};
use std::sync::LazyLock;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::bits::Bits;

/// Marker trait for values attachable to entities.
///
/// Implement it for plain data types:
///
/// ```rust,ignore
/// struct Position { x: f32, y: f32 }
/// impl Component for Position {}
/// ```
///
/// The engine never interprets component contents; it tracks presence by
/// type index and hands values back through typed lookups.
pub trait Component: Any {}

/// Process-wide registry of component type indices.
///
/// Indices are dense and monotonic starting at 0, in first-query order.
static COMPONENT_INDICES: LazyLock<Mutex<FxHashMap<TypeId, usize>>> =
    LazyLock::new(|| Mutex::new(FxHashMap::default()));

/// A component type's dense index.
///
/// Obtained with [`ComponentType::of`]; structurally equal for the same Rust
/// type in every engine of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentType {
    index: usize,
}

impl ComponentType {
    /// Returns the canonical type record for `C`, registering it on first use.
    #[must_use]
    pub fn of<C: Component>() -> Self {
        let mut indices = COMPONENT_INDICES.lock();
        let next = indices.len();
        let index = *indices.entry(TypeId::of::<C>()).or_insert(next);
        Self { index }
    }

    /// The dense index assigned to this component type.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }

    /// Reconstructs a record from a raw index.
    #[inline]
    #[must_use]
    pub(crate) const fn from_index(index: usize) -> Self {
        Self { index }
    }
}

/// A set of component types usable in a family descriptor.
///
/// Implemented for tuples of components, including the empty tuple:
/// `Family::all::<(Position, Velocity)>()`.
pub trait ComponentSet {
    /// Sets the bit of every component type in the set.
    fn fill(bits: &mut Bits);

    /// Collects the set into a fresh bitset.
    #[must_use]
    fn bits() -> Bits {
        let mut bits = Bits::new();
        Self::fill(&mut bits);
        bits
    }
}

impl ComponentSet for () {
    fn fill(_bits: &mut Bits) {}
}

macro_rules! impl_component_set {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentSet for ($($name,)+) {
            fn fill(bits: &mut Bits) {
                $(bits.set(ComponentType::of::<$name>().index());)+
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);
