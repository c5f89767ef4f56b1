//! Reconciler
//!
//! Transaction-scoped steps of a reconciliation and an explicit link restore.
//! The service wraps each of them in `RecordStore::transaction`.

use shared_types::{ActorId, LinkId, ParentRecord, ParentRef, SubEntityId, Timestamp};
use tracing::{debug, warn};

use super::orphan_collector::collect_orphans;
use crate::algorithms::diff::{plan_reconciliation, PlanStep, SubEntitySource};
use crate::domain::entities::{
    AssociationLink, LinkView, PersistedLink, ReconcileOutcome, SubEntity, SubmittedItem,
};
use crate::domain::errors::{ReconcileError, StoreError, ValidationError};
use crate::domain::invariants::{admit_restored, check_submission, LinkedSubEntities, LiveLinks};
use crate::domain::policy::LinkPolicy;
use crate::ports::outbound::{LinkChanges, LinkTransaction, ParentTransaction};

/// The parent row, if it exists and is not soft-deleted.
pub fn require_live_parent<T>(tx: &T, parent: &ParentRef) -> Result<ParentRecord, ReconcileError>
where
    T: ParentTransaction + ?Sized,
{
    match tx.get_parent(parent)? {
        Some(record) if record.is_live() => Ok(record),
        _ => Err(ReconcileError::ParentNotFound(*parent)),
    }
}

/// Live links of the parent as client views, oldest first.
pub fn list_views<P, T>(tx: &T, parent: &ParentRef) -> Result<Vec<LinkView<P>>, ReconcileError>
where
    P: LinkPolicy,
    T: LinkTransaction<P> + ?Sized,
{
    Ok(tx
        .live_links(parent)?
        .iter()
        .map(PersistedLink::view)
        .collect())
}

/// Load, validate, plan and apply one submitted list.
pub fn reconcile_family<P, T>(
    tx: &mut T,
    parent: &ParentRef,
    actor: &ActorId,
    items: &[SubmittedItem<P>],
    now: Timestamp,
) -> Result<ReconcileOutcome<P>, ReconcileError>
where
    P: LinkPolicy,
    T: ParentTransaction + LinkTransaction<P> + ?Sized,
{
    require_live_parent(tx, parent)?;

    let before: LiveLinks<P> = tx
        .live_links(parent)?
        .into_iter()
        .map(|persisted| (persisted.id(), persisted))
        .collect();

    check_references(tx, &before, items)?;
    let linked = load_linked_sub_entities(tx, items)?;

    let prepared = check_submission(&before, items.to_vec(), &linked).map_err(|err| {
        warn!(
            parent = %parent,
            family = P::field_key(),
            violations = err.violations.len(),
            "Submission rejected"
        );
        err
    })?;

    let plan = plan_reconciliation(&before, &prepared);
    debug!(
        parent = %parent,
        family = P::field_key(),
        steps = plan.steps.len(),
        "Reconciliation planned"
    );

    let mut detached: Vec<SubEntityId> = Vec::new();
    for step in plan.steps {
        match step {
            PlanStep::Delete(id) => {
                tx.soft_delete_link(id, actor, now)?;
                if let Some(persisted) = before.get(&id) {
                    detached.push(persisted.link.sub_entity_id);
                }
            }
            PlanStep::ClearPrincipal(ids) => tx.clear_principal(&ids, actor, now)?,
            PlanStep::Update(update) => {
                let mut changes = LinkChanges {
                    category: update.category,
                    principal: update.principal,
                    sub_entity_id: None,
                };
                if let Some(content) = update.content {
                    if tx.count_live_links_for_sub_entity(update.sub_entity_id)? > 1 {
                        // Other links keep the stored content; this one moves to a copy.
                        let copy = SubEntity::<P>::new(content, now);
                        debug!(
                            link = %update.id,
                            shared = %update.sub_entity_id,
                            copy = %copy.id,
                            "Shared sub-entity edited, link re-pointed to a copy"
                        );
                        changes.sub_entity_id = Some(copy.id);
                        tx.insert_sub_entity(copy)?;
                        detached.push(update.sub_entity_id);
                    } else {
                        tx.update_sub_entity_content(update.sub_entity_id, content, now)?;
                    }
                }
                tx.update_link(update.id, changes, actor, now)?;
            }
            PlanStep::Create(create) => {
                let sub_entity_id = match create.source {
                    SubEntitySource::New(content) => {
                        let sub_entity = SubEntity::<P>::new(content, now);
                        let id = sub_entity.id;
                        tx.insert_sub_entity(sub_entity)?;
                        id
                    }
                    SubEntitySource::Existing(id) => id,
                };
                tx.insert_link(AssociationLink::new(
                    create.id,
                    *parent,
                    sub_entity_id,
                    create.category,
                    create.principal,
                    actor,
                    now,
                ))?;
            }
        }
    }

    // After every step, so a sub-entity re-linked in the same call survives.
    let orphans_collected = collect_orphans::<P, T>(tx, &detached, now)?;

    Ok(ReconcileOutcome {
        links: list_views(tx, parent)?,
        created: plan.created,
        updated: plan.updated,
        deleted: plan.deleted,
        unchanged: plan.unchanged,
        orphans_collected,
    })
}

/// Ids outside the before-set must name a live link of another parent, which
/// the validator then reports. Anything else is not found.
fn check_references<P, T>(
    tx: &T,
    before: &LiveLinks<P>,
    items: &[SubmittedItem<P>],
) -> Result<(), ReconcileError>
where
    P: LinkPolicy,
    T: LinkTransaction<P> + ?Sized,
{
    for id in items.iter().filter_map(|item| item.id) {
        if before.contains_key(&id) {
            continue;
        }
        match tx.get_link(id)? {
            Some(link) if link.is_live() => {}
            _ => return Err(ReconcileError::LinkNotFound(id)),
        }
    }
    Ok(())
}

/// Sub-entities referenced by items that create a new link to them.
fn load_linked_sub_entities<P, T>(
    tx: &T,
    items: &[SubmittedItem<P>],
) -> Result<LinkedSubEntities<P>, ReconcileError>
where
    P: LinkPolicy,
    T: LinkTransaction<P> + ?Sized,
{
    let mut linked = LinkedSubEntities::new();
    for item in items.iter().filter(|item| item.id.is_none()) {
        let Some(sub_entity_id) = item.sub_entity_id else {
            continue;
        };
        match tx.get_sub_entity(sub_entity_id)? {
            Some(sub_entity) if sub_entity.is_live() => {
                linked.insert(sub_entity_id, sub_entity);
            }
            _ => return Err(ReconcileError::SubEntityNotFound(sub_entity_id)),
        }
    }
    Ok(linked)
}

/// Bring one soft-deleted link of the parent back, with its sub-entity.
pub fn restore_single_link<P, T>(
    tx: &mut T,
    parent: &ParentRef,
    link_id: LinkId,
    actor: &ActorId,
    now: Timestamp,
) -> Result<LinkView<P>, ReconcileError>
where
    P: LinkPolicy,
    T: ParentTransaction + LinkTransaction<P> + ?Sized,
{
    require_live_parent(tx, parent)?;

    let link = match tx.get_link(link_id)? {
        Some(link) if link.parent == *parent => link,
        _ => return Err(ReconcileError::LinkNotFound(link_id)),
    };
    if link.is_live() {
        return Err(ReconcileError::InvalidState(format!(
            "link {link_id} is not deleted"
        )));
    }

    let sub_entity = tx
        .get_sub_entity(link.sub_entity_id)?
        .ok_or_else(|| {
            StoreError::MissingRow(format!("{} sub-entity {}", P::KIND, link.sub_entity_id))
        })?;
    let sub_entity_id = sub_entity.id;
    let sub_entity_deleted = !sub_entity.is_live();

    let live = tx.live_links(parent)?;
    let candidate = PersistedLink::new(link, sub_entity);
    let principal = admit_restored(&live, &candidate)
        .map_err(|violation| ValidationError::single(P::field_key(), violation))?;

    tx.restore_link(link_id, principal, actor, now)?;
    if sub_entity_deleted {
        tx.restore_sub_entity(sub_entity_id, now)?;
    }

    tx.live_links(parent)?
        .iter()
        .find(|persisted| persisted.id() == link_id)
        .map(PersistedLink::view)
        .ok_or_else(|| StoreError::MissingRow(format!("{} link {link_id}", P::KIND)).into())
}
