//! Cascade Restore Correlator
//!
//! Parent deletion cascades a soft-delete to every live link of the parent at
//! the same instant. Restoring the parent brings back the links (and their
//! sub-entities) whose deletion time lies within the restore window of the
//! parent's own deletion time.
//!
//! The window is a heuristic: unrelated deletions inside it are restored too,
//! and cascaded deletions that landed outside it are missed. Restored links
//! never break the live-set invariants; a link whose content is already live
//! again is skipped, and a principal collision restores it as non-principal.
//! Links that were principal when deleted are admitted first, so a partition
//! comes back with the principal it had.

use chrono::Duration;
use shared_types::{ActorId, ParentRef, Timestamp};
use tracing::{info, warn};

use super::orphan_collector::collect_orphans;
use crate::algorithms::restore_window::RestoreWindow;
use crate::domain::entities::{
    DeletionReport, FamilyDeletion, FamilyRestore, PersistedLink, RestoreReport,
};
use crate::domain::errors::{ReconcileError, StoreError};
use crate::domain::invariants::admit_restored;
use crate::domain::policy::{Addresses, Contacts, Documents, LinkPolicy};
use crate::ports::outbound::{LinkTransaction, StoreTransaction};

/// Soft-delete the parent and cascade to its links in every family.
pub fn delete_parent_cascade<T>(
    tx: &mut T,
    parent: &ParentRef,
    actor: &ActorId,
    now: Timestamp,
) -> Result<DeletionReport, ReconcileError>
where
    T: StoreTransaction + ?Sized,
{
    match tx.get_parent(parent)? {
        Some(record) if record.is_live() => {}
        _ => return Err(ReconcileError::ParentNotFound(*parent)),
    }

    tx.mark_parent_deleted(parent, actor, now)?;
    Ok(DeletionReport {
        parent: *parent,
        deleted_at: now,
        addresses: delete_family::<Addresses, T>(tx, parent, actor, now)?,
        contacts: delete_family::<Contacts, T>(tx, parent, actor, now)?,
        documents: delete_family::<Documents, T>(tx, parent, actor, now)?,
    })
}

fn delete_family<P, T>(
    tx: &mut T,
    parent: &ParentRef,
    actor: &ActorId,
    now: Timestamp,
) -> Result<FamilyDeletion, StoreError>
where
    P: LinkPolicy,
    T: LinkTransaction<P> + ?Sized,
{
    let live = tx.live_links(parent)?;
    let mut report = FamilyDeletion::default();
    let mut detached = Vec::with_capacity(live.len());

    for persisted in &live {
        if tx.soft_delete_link(persisted.id(), actor, now)? {
            report.links_deleted.push(persisted.id());
            detached.push(persisted.link.sub_entity_id);
        }
    }
    report.orphans_collected = collect_orphans::<P, T>(tx, &detached, now)?;
    Ok(report)
}

/// Restore a soft-deleted parent and the links correlated with its deletion.
pub fn restore_parent_cascade<T>(
    tx: &mut T,
    parent: &ParentRef,
    actor: &ActorId,
    now: Timestamp,
    margin: Duration,
) -> Result<RestoreReport, ReconcileError>
where
    T: StoreTransaction + ?Sized,
{
    let record = tx
        .get_parent(parent)?
        .ok_or(ReconcileError::ParentNotFound(*parent))?;
    let Some(deleted_at) = record.deleted_at else {
        return Err(ReconcileError::InvalidState(format!(
            "parent {parent} is not deleted"
        )));
    };

    let window = RestoreWindow::new(deleted_at, margin);
    tx.mark_parent_restored(parent, actor, now)?;

    let report = RestoreReport {
        parent: *parent,
        addresses: restore_family::<Addresses, T>(tx, parent, &window, actor, now)?,
        contacts: restore_family::<Contacts, T>(tx, parent, &window, actor, now)?,
        documents: restore_family::<Documents, T>(tx, parent, &window, actor, now)?,
    };

    info!(
        parent = %parent,
        links_restored = report.links_restored(),
        window_start = %window.start(),
        window_end = %window.end(),
        "Parent restored"
    );
    Ok(report)
}

fn restore_family<P, T>(
    tx: &mut T,
    parent: &ParentRef,
    window: &RestoreWindow,
    actor: &ActorId,
    now: Timestamp,
) -> Result<FamilyRestore, StoreError>
where
    P: LinkPolicy,
    T: LinkTransaction<P> + ?Sized,
{
    let candidates = tx.links_deleted_between(parent, window.start(), window.end())?;
    let mut ranked = window.rank(candidates, |link| link.deleted_at);
    // Former principals first, each group still closest first.
    ranked.sort_by_key(|link| !link.principal);

    let mut live = tx.live_links(parent)?;
    let mut report = FamilyRestore::default();

    for link in ranked {
        let link_id = link.id;
        let mut sub_entity = tx.get_sub_entity(link.sub_entity_id)?.ok_or_else(|| {
            StoreError::MissingRow(format!("{} sub-entity {}", P::KIND, link.sub_entity_id))
        })?;

        let sub_entity_in_window = match sub_entity.deleted_at {
            None => false,
            Some(at) if window.contains(at) => true,
            Some(at) => {
                warn!(
                    link = %link_id,
                    sub_entity = %sub_entity.id,
                    sub_entity_deleted_at = %at,
                    "Sub-entity deleted outside the restore window, link left deleted"
                );
                report.skipped.push(link_id);
                continue;
            }
        };

        let mut candidate = PersistedLink::new(link, sub_entity.clone());
        let principal = match admit_restored(&live, &candidate) {
            Ok(principal) => principal,
            Err(violation) => {
                warn!(link = %link_id, %violation, "Correlated link not restored");
                report.skipped.push(link_id);
                continue;
            }
        };

        tx.restore_link(link_id, principal, actor, now)?;
        report.links_restored.push(link_id);
        if sub_entity_in_window && tx.restore_sub_entity(sub_entity.id, now)? {
            report.sub_entities_restored.push(sub_entity.id);
            sub_entity.restore(now);
        }

        info!(kind = %P::KIND, link = %link_id, principal, "Link restored by cascade");
        candidate.link.restore(actor, now);
        candidate.link.principal = principal;
        candidate.sub_entity = sub_entity;
        live.push(candidate);
    }

    Ok(report)
}
