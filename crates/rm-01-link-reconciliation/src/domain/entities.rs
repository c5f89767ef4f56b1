//! Core entities for linked-entity reconciliation

use serde::{Deserialize, Serialize};
use shared_types::{ActorId, LinkId, ParentRef, SubEntityId, Timestamp};

use super::policy::LinkPolicy;
use super::value_objects::{PartitionKey, Signature};

/// Join record between one parent and one shared sub-entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct AssociationLink<P: LinkPolicy> {
    pub id: LinkId,
    pub parent: ParentRef,
    pub sub_entity_id: SubEntityId,
    pub category: P::Category,
    pub principal: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
    pub created_by: ActorId,
    pub updated_by: ActorId,
    pub deleted_by: Option<ActorId>,
}

impl<P: LinkPolicy> AssociationLink<P> {
    pub fn new(
        id: LinkId,
        parent: ParentRef,
        sub_entity_id: SubEntityId,
        category: P::Category,
        principal: bool,
        actor: &ActorId,
        at: Timestamp,
    ) -> Self {
        Self {
            id,
            parent,
            sub_entity_id,
            category,
            principal,
            created_at: at,
            updated_at: at,
            deleted_at: None,
            created_by: actor.clone(),
            updated_by: actor.clone(),
            deleted_by: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn touch(&mut self, actor: &ActorId, at: Timestamp) {
        self.updated_by = actor.clone();
        self.updated_at = at;
    }

    /// Mark deleted. Returns false if it already was.
    pub fn soft_delete(&mut self, actor: &ActorId, at: Timestamp) -> bool {
        if !self.is_live() {
            return false;
        }
        self.deleted_at = Some(at);
        self.deleted_by = Some(actor.clone());
        self.touch(actor, at);
        true
    }

    /// Clear the deletion mark. Returns false if the link was live.
    pub fn restore(&mut self, actor: &ActorId, at: Timestamp) -> bool {
        if self.is_live() {
            return false;
        }
        self.deleted_at = None;
        self.deleted_by = None;
        self.touch(actor, at);
        true
    }
}

/// A standalone address, contact or document that any number of parents may link to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct SubEntity<P: LinkPolicy> {
    pub id: SubEntityId,
    pub content: P::Content,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl<P: LinkPolicy> SubEntity<P> {
    pub fn new(content: P::Content, at: Timestamp) -> Self {
        Self {
            id: SubEntityId::new(),
            content,
            created_at: at,
            updated_at: at,
            deleted_at: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn soft_delete(&mut self, at: Timestamp) -> bool {
        if !self.is_live() {
            return false;
        }
        self.deleted_at = Some(at);
        self.updated_at = at;
        true
    }

    pub fn restore(&mut self, at: Timestamp) -> bool {
        if self.is_live() {
            return false;
        }
        self.deleted_at = None;
        self.updated_at = at;
        true
    }
}

/// A persisted link joined with its sub-entity, with derived keys precomputed.
#[derive(Clone, Debug)]
pub struct PersistedLink<P: LinkPolicy> {
    pub link: AssociationLink<P>,
    pub sub_entity: SubEntity<P>,
    pub signature: Signature,
    pub partition: PartitionKey,
}

impl<P: LinkPolicy> PersistedLink<P> {
    pub fn new(link: AssociationLink<P>, sub_entity: SubEntity<P>) -> Self {
        let signature = P::signature(link.category, &sub_entity.content);
        let partition = P::partition(link.category, &sub_entity.content);
        Self {
            link,
            sub_entity,
            signature,
            partition,
        }
    }

    pub fn id(&self) -> LinkId {
        self.link.id
    }

    pub fn view(&self) -> LinkView<P> {
        LinkView {
            id: self.link.id,
            sub_entity_id: self.sub_entity.id,
            category: self.link.category,
            principal: self.link.principal,
            content: self.sub_entity.content.clone(),
            created_at: self.link.created_at,
            updated_at: self.link.updated_at,
            created_by: self.link.created_by.clone(),
            updated_by: self.link.updated_by.clone(),
        }
    }
}

/// One element of a client-submitted list.
///
/// The sub-entity content travels inline, next to the link fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct SubmittedItem<P: LinkPolicy> {
    /// Existing link id, when the client is updating a link it already has.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<LinkId>,
    /// Existing shared sub-entity to link instead of creating a new one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_entity_id: Option<SubEntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<bool>,
    pub category: P::Category,
    #[serde(flatten)]
    pub content: P::Content,
}

impl<P: LinkPolicy> SubmittedItem<P> {
    /// A new item with no id.
    pub fn new(category: P::Category, content: P::Content) -> Self {
        Self {
            id: None,
            sub_entity_id: None,
            principal: None,
            category,
            content,
        }
    }

    pub fn with_id(mut self, id: LinkId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_principal(mut self, principal: bool) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn linking(mut self, sub_entity_id: SubEntityId) -> Self {
        self.sub_entity_id = Some(sub_entity_id);
        self
    }
}

/// A submitted item after normalization, with its derived keys.
#[derive(Clone, Debug)]
pub struct PreparedItem<P: LinkPolicy> {
    /// Position in the submitted list (0-based).
    pub index: usize,
    pub id: Option<LinkId>,
    pub sub_entity_id: Option<SubEntityId>,
    pub principal: Option<bool>,
    pub category: P::Category,
    pub content: P::Content,
    pub signature: Signature,
    pub partition: PartitionKey,
}

impl<P: LinkPolicy> PreparedItem<P> {
    pub fn new(index: usize, item: SubmittedItem<P>, content: P::Content) -> Self {
        let signature = P::signature(item.category, &content);
        let partition = P::partition(item.category, &content);
        Self {
            index,
            id: item.id,
            sub_entity_id: item.sub_entity_id,
            principal: item.principal,
            category: item.category,
            content,
            signature,
            partition,
        }
    }
}

/// A live link with its sub-entity content embedded, as returned to the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct LinkView<P: LinkPolicy> {
    pub id: LinkId,
    pub sub_entity_id: SubEntityId,
    pub category: P::Category,
    pub principal: bool,
    #[serde(flatten)]
    pub content: P::Content,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub created_by: ActorId,
    pub updated_by: ActorId,
}

/// Result of one reconciliation call.
#[derive(Clone, Debug, Serialize)]
#[serde(bound = "")]
pub struct ReconcileOutcome<P: LinkPolicy> {
    /// Live links after the call.
    pub links: Vec<LinkView<P>>,
    pub created: Vec<LinkId>,
    pub updated: Vec<LinkId>,
    pub deleted: Vec<LinkId>,
    pub unchanged: usize,
    pub orphans_collected: Vec<SubEntityId>,
}

impl<P: LinkPolicy> ReconcileOutcome<P> {
    /// True when the call wrote nothing.
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// What cascade restore did for one family.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FamilyRestore {
    pub links_restored: Vec<LinkId>,
    pub sub_entities_restored: Vec<SubEntityId>,
    /// Window matches left deleted because restoring them would break an invariant.
    pub skipped: Vec<LinkId>,
}

/// Result of restoring a parent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub parent: ParentRef,
    pub addresses: FamilyRestore,
    pub contacts: FamilyRestore,
    pub documents: FamilyRestore,
}

impl RestoreReport {
    pub fn links_restored(&self) -> usize {
        self.addresses.links_restored.len()
            + self.contacts.links_restored.len()
            + self.documents.links_restored.len()
    }
}

/// What a parent deletion cascaded into for one family.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FamilyDeletion {
    pub links_deleted: Vec<LinkId>,
    pub orphans_collected: Vec<SubEntityId>,
}

/// Result of soft-deleting a parent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub parent: ParentRef,
    pub deleted_at: Timestamp,
    pub addresses: FamilyDeletion,
    pub contacts: FamilyDeletion,
    pub documents: FamilyDeletion,
}
