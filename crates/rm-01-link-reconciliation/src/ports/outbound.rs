//! # Outbound Ports (Driven Ports)
//!
//! Dependencies required by the reconciliation service.
//!
//! Production: a relational backend mapping one association table and one
//! sub-entity table per family.
//! Testing: `InMemoryRecordStore` (adapters/memory_store.rs)

use shared_types::{ActorId, LinkId, ParentRecord, ParentRef, SubEntityId, Timestamp};

use crate::domain::entities::{AssociationLink, PersistedLink, SubEntity};
use crate::domain::errors::{ReconcileError, StoreError};
use crate::domain::policy::{Addresses, Contacts, Documents, LinkPolicy};

/// Mutable link fields. `None` leaves the column untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkChanges<P: LinkPolicy> {
    pub category: Option<P::Category>,
    pub principal: Option<bool>,
    /// Re-point the link to another existing sub-entity.
    pub sub_entity_id: Option<SubEntityId>,
}

impl<P: LinkPolicy> Default for LinkChanges<P> {
    fn default() -> Self {
        Self {
            category: None,
            principal: None,
            sub_entity_id: None,
        }
    }
}

/// Parent rows as seen from inside a transaction.
pub trait ParentTransaction {
    fn get_parent(&self, parent: &ParentRef) -> Result<Option<ParentRecord>, StoreError>;

    fn mark_parent_deleted(
        &mut self,
        parent: &ParentRef,
        actor: &ActorId,
        at: Timestamp,
    ) -> Result<(), StoreError>;

    fn mark_parent_restored(
        &mut self,
        parent: &ParentRef,
        actor: &ActorId,
        at: Timestamp,
    ) -> Result<(), StoreError>;
}

/// Association and sub-entity rows of one family, inside a transaction.
pub trait LinkTransaction<P: LinkPolicy> {
    /// Live links of the parent joined with their sub-entities.
    fn live_links(&self, parent: &ParentRef) -> Result<Vec<PersistedLink<P>>, StoreError>;

    /// Any link by id, live or deleted, of any parent.
    fn get_link(&self, id: LinkId) -> Result<Option<AssociationLink<P>>, StoreError>;

    /// Deleted links of the parent whose deletion time lies in `[from, to]`.
    fn links_deleted_between(
        &self,
        parent: &ParentRef,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<AssociationLink<P>>, StoreError>;

    /// Live links referencing the sub-entity, across every parent kind.
    ///
    /// Takes `&mut self` so the backend can register the read for commit-time
    /// validation; the answer must not go stale before the transaction commits.
    fn count_live_links_for_sub_entity(
        &mut self,
        sub_entity_id: SubEntityId,
    ) -> Result<usize, StoreError>;

    fn get_sub_entity(&self, id: SubEntityId) -> Result<Option<SubEntity<P>>, StoreError>;

    fn insert_sub_entity(&mut self, sub_entity: SubEntity<P>) -> Result<(), StoreError>;

    fn update_sub_entity_content(
        &mut self,
        id: SubEntityId,
        content: P::Content,
        at: Timestamp,
    ) -> Result<(), StoreError>;

    /// Returns false if the sub-entity was already deleted.
    fn soft_delete_sub_entity(&mut self, id: SubEntityId, at: Timestamp)
        -> Result<bool, StoreError>;

    /// Returns false if the sub-entity was live.
    fn restore_sub_entity(&mut self, id: SubEntityId, at: Timestamp) -> Result<bool, StoreError>;

    /// Insert a new link. The referenced sub-entity must exist.
    fn insert_link(&mut self, link: AssociationLink<P>) -> Result<(), StoreError>;

    /// Apply `changes`. A new sub-entity reference must exist.
    fn update_link(
        &mut self,
        id: LinkId,
        changes: LinkChanges<P>,
        actor: &ActorId,
        at: Timestamp,
    ) -> Result<(), StoreError>;

    /// Unflag principal on every listed link in one statement.
    fn clear_principal(
        &mut self,
        ids: &[LinkId],
        actor: &ActorId,
        at: Timestamp,
    ) -> Result<(), StoreError>;

    /// Returns false if the link was already deleted.
    fn soft_delete_link(
        &mut self,
        id: LinkId,
        actor: &ActorId,
        at: Timestamp,
    ) -> Result<bool, StoreError>;

    /// Clear the deletion mark and set the principal flag it comes back with.
    fn restore_link(
        &mut self,
        id: LinkId,
        principal: bool,
        actor: &ActorId,
        at: Timestamp,
    ) -> Result<bool, StoreError>;
}

/// Everything one unit of work can touch.
pub trait StoreTransaction:
    ParentTransaction
    + LinkTransaction<Addresses>
    + LinkTransaction<Contacts>
    + LinkTransaction<Documents>
{
}

impl<T> StoreTransaction for T where
    T: ParentTransaction
        + LinkTransaction<Addresses>
        + LinkTransaction<Contacts>
        + LinkTransaction<Documents>
{
}

/// Transactional storage collaborator.
pub trait RecordStore: Send + Sync {
    type Tx: StoreTransaction;

    /// Run `work` in one transaction scoped to `parent`.
    ///
    /// Concurrent transactions on the same parent are serialized. The
    /// transaction commits only if `work` returns `Ok`; on commit, any row
    /// read for orphan checks or written by `work` that changed in the
    /// meantime fails the commit with `StoreError::Conflict` and nothing is
    /// applied.
    fn transaction<T, F>(&self, parent: &ParentRef, work: F) -> Result<T, ReconcileError>
    where
        F: FnOnce(&mut Self::Tx) -> Result<T, ReconcileError>;
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Timestamp;
}
