//! In-memory implementation of `RecordStore`
//!
//! Every transaction works on a private copy of the committed tables. Rows
//! carry a revision; the transaction remembers the revision of each row it
//! wrote or read for an orphan check, and commit refuses to apply if any of
//! them moved in the meantime. Transactions on the same parent are also
//! serialized by a per-parent lock.

use parking_lot::{Mutex, RwLock};
use shared_types::{
    ActorId, LinkId, ParentRecord, ParentRef, SubEntityId, SubEntityKind, Timestamp,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::domain::entities::{AssociationLink, PersistedLink, SubEntity};
use crate::domain::errors::{ReconcileError, StoreError};
use crate::domain::policy::{Addresses, Contacts, Documents, LinkPolicy};
use crate::ports::outbound::{LinkChanges, LinkTransaction, ParentTransaction, RecordStore};

#[derive(Clone, Debug)]
struct Versioned<T> {
    revision: u64,
    row: T,
}

impl<T> Versioned<T> {
    /// Row created inside an uncommitted transaction.
    fn pending(row: T) -> Self {
        Self { revision: 0, row }
    }
}

/// Association and sub-entity tables of one family.
#[derive(Clone, Debug)]
pub struct FamilyTables<P: LinkPolicy> {
    links: BTreeMap<LinkId, Versioned<AssociationLink<P>>>,
    sub_entities: BTreeMap<SubEntityId, Versioned<SubEntity<P>>>,
}

impl<P: LinkPolicy> Default for FamilyTables<P> {
    fn default() -> Self {
        Self {
            links: BTreeMap::new(),
            sub_entities: BTreeMap::new(),
        }
    }
}

impl<P: LinkPolicy> FamilyTables<P> {
    fn copy_link(&mut self, from: &Self, id: &LinkId, revision: u64) {
        if let Some(versioned) = from.links.get(id) {
            self.links.insert(
                *id,
                Versioned {
                    revision,
                    row: versioned.row.clone(),
                },
            );
        }
    }

    fn copy_sub_entity(&mut self, from: &Self, id: &SubEntityId, revision: u64) {
        if let Some(versioned) = from.sub_entities.get(id) {
            self.sub_entities.insert(
                *id,
                Versioned {
                    revision,
                    row: versioned.row.clone(),
                },
            );
        }
    }
}

/// All tables.
#[derive(Clone, Debug, Default)]
pub struct StoreState {
    parents: BTreeMap<ParentRef, Versioned<ParentRecord>>,
    addresses: FamilyTables<Addresses>,
    contacts: FamilyTables<Contacts>,
    documents: FamilyTables<Documents>,
}

/// Static dispatch from a family marker to its tables.
pub trait FamilyAccess<P: LinkPolicy> {
    fn family(&self) -> &FamilyTables<P>;
    fn family_mut(&mut self) -> &mut FamilyTables<P>;
}

impl FamilyAccess<Addresses> for StoreState {
    fn family(&self) -> &FamilyTables<Addresses> {
        &self.addresses
    }
    fn family_mut(&mut self) -> &mut FamilyTables<Addresses> {
        &mut self.addresses
    }
}

impl FamilyAccess<Contacts> for StoreState {
    fn family(&self) -> &FamilyTables<Contacts> {
        &self.contacts
    }
    fn family_mut(&mut self) -> &mut FamilyTables<Contacts> {
        &mut self.contacts
    }
}

impl FamilyAccess<Documents> for StoreState {
    fn family(&self) -> &FamilyTables<Documents> {
        &self.documents
    }
    fn family_mut(&mut self) -> &mut FamilyTables<Documents> {
        &mut self.documents
    }
}

/// Identity of one row, for revision tracking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum RowKey {
    Parent(ParentRef),
    Link(SubEntityKind, LinkId),
    SubEntity(SubEntityKind, SubEntityId),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parent(parent) => write!(f, "parent {parent}"),
            Self::Link(kind, id) => write!(f, "{kind} link {id}"),
            Self::SubEntity(kind, id) => write!(f, "{kind} sub-entity {id}"),
        }
    }
}

impl StoreState {
    fn tables<P: LinkPolicy>(&self) -> &FamilyTables<P>
    where
        Self: FamilyAccess<P>,
    {
        FamilyAccess::<P>::family(self)
    }

    fn tables_mut<P: LinkPolicy>(&mut self) -> &mut FamilyTables<P>
    where
        Self: FamilyAccess<P>,
    {
        FamilyAccess::<P>::family_mut(self)
    }

    fn revision_of(&self, key: &RowKey) -> Option<u64> {
        match key {
            RowKey::Parent(parent) => self.parents.get(parent).map(|v| v.revision),
            RowKey::Link(kind, id) => match kind {
                SubEntityKind::Address => self.addresses.links.get(id).map(|v| v.revision),
                SubEntityKind::Contact => self.contacts.links.get(id).map(|v| v.revision),
                SubEntityKind::Document => self.documents.links.get(id).map(|v| v.revision),
            },
            RowKey::SubEntity(kind, id) => match kind {
                SubEntityKind::Address => self.addresses.sub_entities.get(id).map(|v| v.revision),
                SubEntityKind::Contact => self.contacts.sub_entities.get(id).map(|v| v.revision),
                SubEntityKind::Document => self.documents.sub_entities.get(id).map(|v| v.revision),
            },
        }
    }

    fn copy_row(&mut self, from: &StoreState, key: &RowKey, revision: u64) {
        match key {
            RowKey::Parent(parent) => {
                if let Some(versioned) = from.parents.get(parent) {
                    self.parents.insert(
                        *parent,
                        Versioned {
                            revision,
                            row: versioned.row.clone(),
                        },
                    );
                }
            }
            RowKey::Link(kind, id) => match kind {
                SubEntityKind::Address => self.addresses.copy_link(&from.addresses, id, revision),
                SubEntityKind::Contact => self.contacts.copy_link(&from.contacts, id, revision),
                SubEntityKind::Document => self.documents.copy_link(&from.documents, id, revision),
            },
            RowKey::SubEntity(kind, id) => match kind {
                SubEntityKind::Address => {
                    self.addresses
                        .copy_sub_entity(&from.addresses, id, revision)
                }
                SubEntityKind::Contact => {
                    self.contacts.copy_sub_entity(&from.contacts, id, revision)
                }
                SubEntityKind::Document => {
                    self.documents
                        .copy_sub_entity(&from.documents, id, revision)
                }
            },
        }
    }
}

struct Committed {
    state: StoreState,
    last_revision: u64,
}

impl Committed {
    fn next_revision(&mut self) -> u64 {
        self.last_revision += 1;
        self.last_revision
    }
}

/// Thread-safe in-memory record store for tests and the runtime.
pub struct InMemoryRecordStore {
    committed: RwLock<Committed>,
    parent_locks: Mutex<HashMap<ParentRef, Arc<Mutex<()>>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            committed: RwLock::new(Committed {
                state: StoreState::default(),
                last_revision: 0,
            }),
            parent_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create a live parent row. Returns false if the parent already exists.
    pub fn register_parent(&self, parent: ParentRef) -> bool {
        let mut committed = self.committed.write();
        if committed.state.parents.contains_key(&parent) {
            return false;
        }
        let revision = committed.next_revision();
        committed.state.parents.insert(
            parent,
            Versioned {
                revision,
                row: ParentRecord::new(parent),
            },
        );
        true
    }

    /// Committed parent row.
    pub fn parent(&self, parent: &ParentRef) -> Option<ParentRecord> {
        let committed = self.committed.read();
        committed.state.parents.get(parent).map(|v| v.row.clone())
    }

    /// Committed sub-entity row, live or deleted.
    pub fn sub_entity<P: LinkPolicy>(&self, id: SubEntityId) -> Option<SubEntity<P>>
    where
        StoreState: FamilyAccess<P>,
    {
        let committed = self.committed.read();
        committed
            .state
            .tables::<P>()
            .sub_entities
            .get(&id)
            .map(|v| v.row.clone())
    }

    /// Committed link row, live or deleted.
    pub fn link<P: LinkPolicy>(&self, id: LinkId) -> Option<AssociationLink<P>>
    where
        StoreState: FamilyAccess<P>,
    {
        let committed = self.committed.read();
        committed
            .state
            .tables::<P>()
            .links
            .get(&id)
            .map(|v| v.row.clone())
    }

    /// Start a transaction without taking the parent lock.
    ///
    /// `transaction` is the normal entry point; this exists so callers can
    /// interleave two transactions explicitly.
    pub fn begin(&self) -> MemoryTransaction {
        let committed = self.committed.read();
        MemoryTransaction {
            snapshot: committed.state.clone(),
            observed: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// Validate and apply a transaction's writes atomically.
    pub fn commit(&self, tx: MemoryTransaction) -> Result<(), StoreError> {
        let mut committed = self.committed.write();

        for (key, base) in &tx.observed {
            if committed.state.revision_of(key) != *base {
                debug!(row = %key, "Commit rejected, row changed since snapshot");
                return Err(StoreError::Conflict {
                    row: key.to_string(),
                });
            }
        }

        for key in &tx.dirty {
            let revision = committed.next_revision();
            committed.state.copy_row(&tx.snapshot, key, revision);
        }

        debug!(rows = tx.dirty.len(), "Transaction committed");
        Ok(())
    }

    fn parent_lock(&self, parent: &ParentRef) -> Arc<Mutex<()>> {
        let mut locks = self.parent_locks.lock();
        Arc::clone(locks.entry(*parent).or_default())
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    type Tx = MemoryTransaction;

    fn transaction<T, F>(&self, parent: &ParentRef, work: F) -> Result<T, ReconcileError>
    where
        F: FnOnce(&mut MemoryTransaction) -> Result<T, ReconcileError>,
    {
        let lock = self.parent_lock(parent);
        let _guard = lock.lock();

        let mut tx = self.begin();
        let value = work(&mut tx)?;
        self.commit(tx)?;
        Ok(value)
    }
}

/// One unit of work over a private copy of the tables.
pub struct MemoryTransaction {
    snapshot: StoreState,
    /// Revision each tracked row had when first touched (`None`: did not exist).
    observed: BTreeMap<RowKey, Option<u64>>,
    dirty: BTreeSet<RowKey>,
}

impl MemoryTransaction {
    fn observe(&mut self, key: RowKey) {
        let revision = self.snapshot.revision_of(&key);
        self.observed.entry(key).or_insert(revision);
    }

    fn mark_dirty(&mut self, key: RowKey) {
        self.observe(key);
        self.dirty.insert(key);
    }

    fn parent_row_mut(&mut self, parent: &ParentRef) -> Result<&mut ParentRecord, StoreError> {
        self.mark_dirty(RowKey::Parent(*parent));
        self.snapshot
            .parents
            .get_mut(parent)
            .map(|v| &mut v.row)
            .ok_or_else(|| StoreError::MissingRow(format!("parent {parent}")))
    }

    fn link_row_mut<P: LinkPolicy>(
        &mut self,
        id: LinkId,
    ) -> Result<&mut AssociationLink<P>, StoreError>
    where
        StoreState: FamilyAccess<P>,
    {
        self.mark_dirty(RowKey::Link(P::KIND, id));
        self.snapshot
            .tables_mut::<P>()
            .links
            .get_mut(&id)
            .map(|v| &mut v.row)
            .ok_or_else(|| StoreError::MissingRow(format!("{} link {id}", P::KIND)))
    }

    fn sub_entity_row_mut<P: LinkPolicy>(
        &mut self,
        id: SubEntityId,
    ) -> Result<&mut SubEntity<P>, StoreError>
    where
        StoreState: FamilyAccess<P>,
    {
        self.mark_dirty(RowKey::SubEntity(P::KIND, id));
        self.snapshot
            .tables_mut::<P>()
            .sub_entities
            .get_mut(&id)
            .map(|v| &mut v.row)
            .ok_or_else(|| StoreError::MissingRow(format!("{} sub-entity {id}", P::KIND)))
    }
}

impl ParentTransaction for MemoryTransaction {
    fn get_parent(&self, parent: &ParentRef) -> Result<Option<ParentRecord>, StoreError> {
        Ok(self.snapshot.parents.get(parent).map(|v| v.row.clone()))
    }

    fn mark_parent_deleted(
        &mut self,
        parent: &ParentRef,
        actor: &ActorId,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        let row = self.parent_row_mut(parent)?;
        row.deleted_at = Some(at);
        row.updated_by = Some(actor.clone());
        Ok(())
    }

    fn mark_parent_restored(
        &mut self,
        parent: &ParentRef,
        actor: &ActorId,
        _at: Timestamp,
    ) -> Result<(), StoreError> {
        let row = self.parent_row_mut(parent)?;
        row.deleted_at = None;
        row.updated_by = Some(actor.clone());
        Ok(())
    }
}

impl<P: LinkPolicy> LinkTransaction<P> for MemoryTransaction
where
    StoreState: FamilyAccess<P>,
{
    fn live_links(&self, parent: &ParentRef) -> Result<Vec<PersistedLink<P>>, StoreError> {
        let tables = self.snapshot.tables::<P>();
        let mut links = tables
            .links
            .values()
            .filter(|v| v.row.parent == *parent && v.row.is_live())
            .map(|v| -> Result<PersistedLink<P>, StoreError> {
                let sub_entity = tables
                    .sub_entities
                    .get(&v.row.sub_entity_id)
                    .ok_or_else(|| {
                        StoreError::MissingRow(format!(
                            "{} sub-entity {}",
                            P::KIND,
                            v.row.sub_entity_id
                        ))
                    })?;
                Ok(PersistedLink::new(v.row.clone(), sub_entity.row.clone()))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;
        links.sort_by_key(|persisted| (persisted.link.created_at, persisted.link.id));
        Ok(links)
    }

    fn get_link(&self, id: LinkId) -> Result<Option<AssociationLink<P>>, StoreError> {
        Ok(self
            .snapshot
            .tables::<P>()
            .links
            .get(&id)
            .map(|v| v.row.clone()))
    }

    fn links_deleted_between(
        &self,
        parent: &ParentRef,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<AssociationLink<P>>, StoreError> {
        Ok(self
            .snapshot
            .tables::<P>()
            .links
            .values()
            .filter(|v| v.row.parent == *parent)
            .filter(|v| matches!(v.row.deleted_at, Some(at) if from <= at && at <= to))
            .map(|v| v.row.clone())
            .collect())
    }

    fn count_live_links_for_sub_entity(
        &mut self,
        sub_entity_id: SubEntityId,
    ) -> Result<usize, StoreError> {
        let referencing: Vec<(LinkId, bool)> = self
            .snapshot
            .tables::<P>()
            .links
            .values()
            .filter(|v| v.row.sub_entity_id == sub_entity_id)
            .map(|v| (v.row.id, v.row.is_live()))
            .collect();

        // New links always write the sub-entity row, so observing it covers
        // links inserted after this snapshot.
        self.observe(RowKey::SubEntity(P::KIND, sub_entity_id));
        for (id, _) in &referencing {
            self.observe(RowKey::Link(P::KIND, *id));
        }

        Ok(referencing.iter().filter(|(_, live)| *live).count())
    }

    fn get_sub_entity(&self, id: SubEntityId) -> Result<Option<SubEntity<P>>, StoreError> {
        Ok(self
            .snapshot
            .tables::<P>()
            .sub_entities
            .get(&id)
            .map(|v| v.row.clone()))
    }

    fn insert_sub_entity(&mut self, sub_entity: SubEntity<P>) -> Result<(), StoreError> {
        let key = RowKey::SubEntity(P::KIND, sub_entity.id);
        if self.snapshot.revision_of(&key).is_some() {
            return Err(StoreError::Conflict {
                row: key.to_string(),
            });
        }
        self.mark_dirty(key);
        self.snapshot
            .tables_mut::<P>()
            .sub_entities
            .insert(sub_entity.id, Versioned::pending(sub_entity));
        Ok(())
    }

    fn update_sub_entity_content(
        &mut self,
        id: SubEntityId,
        content: P::Content,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        let row = self.sub_entity_row_mut::<P>(id)?;
        row.content = content;
        row.updated_at = at;
        Ok(())
    }

    fn soft_delete_sub_entity(
        &mut self,
        id: SubEntityId,
        at: Timestamp,
    ) -> Result<bool, StoreError> {
        Ok(self.sub_entity_row_mut::<P>(id)?.soft_delete(at))
    }

    fn restore_sub_entity(&mut self, id: SubEntityId, at: Timestamp) -> Result<bool, StoreError> {
        Ok(self.sub_entity_row_mut::<P>(id)?.restore(at))
    }

    fn insert_link(&mut self, link: AssociationLink<P>) -> Result<(), StoreError> {
        let key = RowKey::Link(P::KIND, link.id);
        if self.snapshot.revision_of(&key).is_some() {
            return Err(StoreError::Conflict {
                row: key.to_string(),
            });
        }

        // Touch the referenced sub-entity so a concurrent orphan check on it
        // fails at commit.
        let sub_entity = self.sub_entity_row_mut::<P>(link.sub_entity_id)?;
        sub_entity.updated_at = sub_entity.updated_at.max(link.created_at);

        self.mark_dirty(key);
        self.snapshot
            .tables_mut::<P>()
            .links
            .insert(link.id, Versioned::pending(link));
        Ok(())
    }

    fn update_link(
        &mut self,
        id: LinkId,
        changes: LinkChanges<P>,
        actor: &ActorId,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        if let Some(sub_entity_id) = changes.sub_entity_id {
            let sub_entity = self.sub_entity_row_mut::<P>(sub_entity_id)?;
            sub_entity.updated_at = sub_entity.updated_at.max(at);
        }

        let row = self.link_row_mut::<P>(id)?;
        if let Some(sub_entity_id) = changes.sub_entity_id {
            row.sub_entity_id = sub_entity_id;
        }
        if let Some(category) = changes.category {
            row.category = category;
        }
        if let Some(principal) = changes.principal {
            row.principal = principal;
        }
        row.touch(actor, at);
        Ok(())
    }

    fn clear_principal(
        &mut self,
        ids: &[LinkId],
        actor: &ActorId,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        for id in ids {
            let row = self.link_row_mut::<P>(*id)?;
            row.principal = false;
            row.touch(actor, at);
        }
        Ok(())
    }

    fn soft_delete_link(
        &mut self,
        id: LinkId,
        actor: &ActorId,
        at: Timestamp,
    ) -> Result<bool, StoreError> {
        Ok(self.link_row_mut::<P>(id)?.soft_delete(actor, at))
    }

    fn restore_link(
        &mut self,
        id: LinkId,
        principal: bool,
        actor: &ActorId,
        at: Timestamp,
    ) -> Result<bool, StoreError> {
        let row = self.link_row_mut::<P>(id)?;
        if !row.restore(actor, at) {
            return Ok(false);
        }
        row.principal = principal;
        Ok(true)
    }
}
