//! Orphan Collector
//!
//! A shared sub-entity with no live link from any parent is soft-deleted, never
//! removed, so the cascade restore correlator can bring it back later.

use shared_types::{SubEntityId, Timestamp};
use tracing::{debug, info};

use crate::domain::errors::StoreError;
use crate::domain::policy::LinkPolicy;
use crate::ports::outbound::LinkTransaction;

/// Soft-delete the sub-entity if no live link references it any more.
///
/// Returns true when this call collected it. Already-deleted sub-entities are
/// left as they are.
pub fn collect_orphan<P, T>(
    tx: &mut T,
    sub_entity_id: SubEntityId,
    at: Timestamp,
) -> Result<bool, StoreError>
where
    P: LinkPolicy,
    T: LinkTransaction<P> + ?Sized,
{
    let remaining = tx.count_live_links_for_sub_entity(sub_entity_id)?;
    if remaining > 0 {
        debug!(
            kind = %P::KIND,
            sub_entity = %sub_entity_id,
            remaining,
            "Sub-entity still linked, keeping it"
        );
        return Ok(false);
    }

    let collected = tx.soft_delete_sub_entity(sub_entity_id, at)?;
    if collected {
        info!(kind = %P::KIND, sub_entity = %sub_entity_id, "Orphaned sub-entity soft-deleted");
    }
    Ok(collected)
}

/// Run the collector over every detached sub-entity, deduplicated, in order.
pub fn collect_orphans<P, T>(
    tx: &mut T,
    detached: &[SubEntityId],
    at: Timestamp,
) -> Result<Vec<SubEntityId>, StoreError>
where
    P: LinkPolicy,
    T: LinkTransaction<P> + ?Sized,
{
    let mut collected = Vec::new();
    for (position, sub_entity_id) in detached.iter().enumerate() {
        if detached[..position].contains(sub_entity_id) {
            continue;
        }
        if collect_orphan::<P, T>(tx, *sub_entity_id, at)? {
            collected.push(*sub_entity_id);
        }
    }
    Ok(collected)
}
