//! Inbound Ports (Driving Ports / API)

use crate::domain::entities::{
    DeletionReport, LinkView, ReconcileOutcome, RestoreReport, SubmittedItem,
};
use crate::domain::errors::ReconcileError;
use crate::domain::policy::LinkPolicy;
use async_trait::async_trait;
use shared_types::{ActorId, LinkId, ParentRef};

/// Primary reconciliation API, one instantiation per sub-entity family.
#[async_trait]
pub trait LinkReconciliationApi<P: LinkPolicy>: Send + Sync {
    /// Reconcile the full desired list of one family against the parent's live links.
    ///
    /// This is the main entry point. It:
    /// 1. Loads the live links of the parent
    /// 2. Validates the submission against them (all-or-nothing)
    /// 3. Applies the minimal create/update/delete set in one transaction
    /// 4. Soft-deletes sub-entities left without any live link
    async fn reconcile(
        &self,
        parent: ParentRef,
        actor: ActorId,
        items: Vec<SubmittedItem<P>>,
    ) -> Result<ReconcileOutcome<P>, ReconcileError>;

    /// Live links of the parent with their content, oldest first.
    async fn list_links(&self, parent: ParentRef) -> Result<Vec<LinkView<P>>, ReconcileError>;

    /// Explicitly restore one soft-deleted link of the parent.
    async fn restore_link(
        &self,
        parent: ParentRef,
        link_id: LinkId,
        actor: ActorId,
    ) -> Result<LinkView<P>, ReconcileError>;
}

/// Parent soft-delete and cascade restore across all families.
#[async_trait]
pub trait ParentLifecycleApi: Send + Sync {
    /// Soft-delete the parent and every live link it owns.
    async fn delete_parent(
        &self,
        parent: ParentRef,
        actor: ActorId,
    ) -> Result<DeletionReport, ReconcileError>;

    /// Restore the parent and the links deleted alongside it.
    async fn restore_parent(
        &self,
        parent: ParentRef,
        actor: ActorId,
    ) -> Result<RestoreReport, ReconcileError>;
}
