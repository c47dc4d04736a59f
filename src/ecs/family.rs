//! # Families
//!
//! A family is an immutable predicate over component presence: entities must
//! have *all* of one set, at least *one* of another, and *none* of a third.
//! Structurally equal descriptors canonicalize to the same family index, and
//! that index is the bit position used in every entity's family mask.

use std::sync::LazyLock;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::bits::Bits;
use super::component::ComponentSet;
use super::entity::Entity;

/// Process-wide canonicalization of family descriptors to dense indices.
static FAMILY_INDICES: LazyLock<Mutex<FxHashMap<(Bits, Bits, Bits), usize>>> =
    LazyLock::new(|| Mutex::new(FxHashMap::default()));

/// An immutable component-set predicate with canonical identity.
///
/// Built through the descriptor grammar:
///
/// ```rust,ignore
/// let family = Family::all::<(Position, Velocity)>()
///     .exclude::<(Frozen,)>()
///     .get();
/// ```
///
/// Any part may be omitted; `Family::all::<()>().get()` is the empty family,
/// which matches every entity. Two structurally equal descriptors yield
/// equal families with the same index.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Family {
    all: Bits,
    one: Bits,
    exclude: Bits,
    index: usize,
}

impl Family {
    /// Starts a descriptor requiring every component in `S`.
    #[must_use]
    pub fn all<S: ComponentSet>() -> FamilyBuilder {
        FamilyBuilder::default().all::<S>()
    }

    /// Starts a descriptor requiring at least one component in `S`.
    #[must_use]
    pub fn one<S: ComponentSet>() -> FamilyBuilder {
        FamilyBuilder::default().one::<S>()
    }

    /// Starts a descriptor rejecting every component in `S`.
    #[must_use]
    pub fn exclude<S: ComponentSet>() -> FamilyBuilder {
        FamilyBuilder::default().exclude::<S>()
    }

    /// The dense index assigned to this family.
    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Evaluates the predicate against an entity's current components.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        let bits = entity.component_bits();
        bits.contains_all(&self.all)
            && (self.one.is_empty() || bits.intersects(&self.one))
            && !bits.intersects(&self.exclude)
    }
}

/// Accumulates `all`/`one`/`exclude` sets for a [`Family`].
#[derive(Default)]
pub struct FamilyBuilder {
    all: Bits,
    one: Bits,
    exclude: Bits,
}

impl FamilyBuilder {
    /// Adds components that entities must all have.
    #[must_use]
    pub fn all<S: ComponentSet>(mut self) -> Self {
        S::fill(&mut self.all);
        self
    }

    /// Adds components of which entities must have at least one.
    #[must_use]
    pub fn one<S: ComponentSet>(mut self) -> Self {
        S::fill(&mut self.one);
        self
    }

    /// Adds components that entities must not have.
    #[must_use]
    pub fn exclude<S: ComponentSet>(mut self) -> Self {
        S::fill(&mut self.exclude);
        self
    }

    /// Resolves the canonical family for the accumulated descriptor.
    #[must_use]
    pub fn get(self) -> Family {
        let mut indices = FAMILY_INDICES.lock();
        let next = indices.len();
        let index = *indices
            .entry((self.all.clone(), self.one.clone(), self.exclude.clone()))
            .or_insert(next);
        Family {
            all: self.all,
            one: self.one,
            exclude: self.exclude,
            index,
        }
    }
}
