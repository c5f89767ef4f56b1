//! Reconciliation Service
//!
//! Main service implementing `LinkReconciliationApi` for every family and
//! `ParentLifecycleApi`.

use async_trait::async_trait;
use shared_types::{ActorId, LinkId, ParentRef, Timestamp};
use std::sync::Arc;
use tracing::{info, warn};

use super::cascade_restore::{delete_parent_cascade, restore_parent_cascade};
use super::reconciler::{list_views, reconcile_family, require_live_parent, restore_single_link};
use crate::config::ReconcilerConfig;
use crate::domain::entities::{
    DeletionReport, LinkView, ReconcileOutcome, RestoreReport, SubmittedItem,
};
use crate::domain::errors::{ReconcileError, ValidationError, Violation};
use crate::domain::policy::LinkPolicy;
use crate::ports::inbound::{LinkReconciliationApi, ParentLifecycleApi};
use crate::ports::outbound::{LinkTransaction, RecordStore, TimeSource};

/// Reconciliation Service
///
/// Orchestrates one request:
/// 1. Bound-check the submission
/// 2. Open a transaction scoped to the parent
/// 3. Validate, plan and apply inside it
/// 4. Retry once if the commit hit a concurrent modification
pub struct ReconciliationService<S: RecordStore> {
    store: Arc<S>,
    clock: Arc<dyn TimeSource>,
    config: ReconcilerConfig,
}

impl<S: RecordStore> ReconciliationService<S> {
    /// Create a new service with default config
    pub fn new(store: Arc<S>, clock: Arc<dyn TimeSource>) -> Self {
        Self::with_config(store, clock, ReconcilerConfig::default())
    }

    /// Create a new service with custom config
    pub fn with_config(
        store: Arc<S>,
        clock: Arc<dyn TimeSource>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run `work` in a transaction, once more on conflict if configured.
    ///
    /// The clock is read per attempt so a retry stamps its own time.
    fn run<T, F>(
        &self,
        parent: &ParentRef,
        operation: &'static str,
        work: F,
    ) -> Result<T, ReconcileError>
    where
        F: Fn(&mut S::Tx, Timestamp) -> Result<T, ReconcileError>,
    {
        let attempt = || {
            let now = self.clock.now();
            self.store.transaction(parent, |tx| work(tx, now))
        };

        match attempt() {
            Err(err) if err.is_conflict() && self.config.retry_on_conflict => {
                warn!(parent = %parent, operation, "Concurrent modification, retrying once");
                attempt().map_err(|err| {
                    if err.is_conflict() {
                        warn!(parent = %parent, operation, "Conflict persisted after retry");
                    }
                    err
                })
            }
            other => other,
        }
    }

    fn check_size<P: LinkPolicy>(&self, items: &[SubmittedItem<P>]) -> Result<(), ReconcileError> {
        if items.len() > self.config.max_items_per_request {
            return Err(ValidationError::single(
                P::field_key(),
                Violation::TooManyItems {
                    count: items.len(),
                    max: self.config.max_items_per_request,
                },
            )
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl<S, P> LinkReconciliationApi<P> for ReconciliationService<S>
where
    S: RecordStore + 'static,
    S::Tx: LinkTransaction<P>,
    P: LinkPolicy,
{
    async fn reconcile(
        &self,
        parent: ParentRef,
        actor: ActorId,
        items: Vec<SubmittedItem<P>>,
    ) -> Result<ReconcileOutcome<P>, ReconcileError> {
        self.check_size(&items)?;

        info!(
            parent = %parent,
            family = P::field_key(),
            items = items.len(),
            "Reconciling linked entities"
        );

        let outcome = self.run(&parent, "reconcile", |tx, now| {
            reconcile_family::<P, _>(tx, &parent, &actor, &items, now)
        })?;

        info!(
            parent = %parent,
            family = P::field_key(),
            created = outcome.created.len(),
            updated = outcome.updated.len(),
            deleted = outcome.deleted.len(),
            unchanged = outcome.unchanged,
            orphans = outcome.orphans_collected.len(),
            "Reconciliation complete"
        );
        Ok(outcome)
    }

    async fn list_links(&self, parent: ParentRef) -> Result<Vec<LinkView<P>>, ReconcileError> {
        self.store.transaction(&parent, |tx| {
            require_live_parent(tx, &parent)?;
            list_views::<P, _>(tx, &parent)
        })
    }

    async fn restore_link(
        &self,
        parent: ParentRef,
        link_id: LinkId,
        actor: ActorId,
    ) -> Result<LinkView<P>, ReconcileError> {
        let view = self.run(&parent, "restore_link", |tx, now| {
            restore_single_link::<P, _>(tx, &parent, link_id, &actor, now)
        })?;
        info!(parent = %parent, family = P::field_key(), link = %link_id, "Link restored");
        Ok(view)
    }
}

#[async_trait]
impl<S> ParentLifecycleApi for ReconciliationService<S>
where
    S: RecordStore + 'static,
{
    async fn delete_parent(
        &self,
        parent: ParentRef,
        actor: ActorId,
    ) -> Result<DeletionReport, ReconcileError> {
        let report = self.run(&parent, "delete_parent", |tx, now| {
            delete_parent_cascade(tx, &parent, &actor, now)
        })?;
        info!(
            parent = %parent,
            addresses = report.addresses.links_deleted.len(),
            contacts = report.contacts.links_deleted.len(),
            documents = report.documents.links_deleted.len(),
            "Parent soft-deleted"
        );
        Ok(report)
    }

    async fn restore_parent(
        &self,
        parent: ParentRef,
        actor: ActorId,
    ) -> Result<RestoreReport, ReconcileError> {
        let margin = self.config.restore_window();
        self.run(&parent, "restore_parent", |tx, now| {
            restore_parent_cascade(tx, &parent, &actor, now, margin)
        })
    }
}
