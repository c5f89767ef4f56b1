//! Invariant validator
//!
//! Checks a submitted list against the parent's live links before anything is
//! written. Every rule is evaluated and all violations are reported together;
//! a non-empty result means the whole batch is rejected.

use shared_types::{LinkId, SubEntityId};
use std::collections::{BTreeMap, HashMap, HashSet};

use super::entities::{PersistedLink, PreparedItem, SubEntity, SubmittedItem};
use super::errors::{ValidationError, Violation};
use super::policy::{LinkPolicy, PrincipalRule};
use super::value_objects::{PartitionKey, Signature};

/// Live links of one parent and family, keyed by link id.
pub type LiveLinks<P> = BTreeMap<LinkId, PersistedLink<P>>;

/// Existing live sub-entities that new items link through `sub_entity_id`.
pub type LinkedSubEntities<P> = BTreeMap<SubEntityId, SubEntity<P>>;

/// Normalize every submitted item, collecting content violations.
pub fn prepare_items<P: LinkPolicy>(
    items: Vec<SubmittedItem<P>>,
) -> (Vec<PreparedItem<P>>, Vec<Violation>) {
    let mut prepared = Vec::with_capacity(items.len());
    let mut violations = Vec::new();

    for (index, item) in items.into_iter().enumerate() {
        match P::normalize(item.category, item.content.clone()) {
            Ok(content) => prepared.push(PreparedItem::new(index, item, content)),
            Err(source) => violations.push(Violation::InvalidContent { index, source }),
        }
    }

    (prepared, violations)
}

/// Run every structural rule over already-normalized items.
pub fn validate_submission<P: LinkPolicy>(
    before: &LiveLinks<P>,
    items: &[PreparedItem<P>],
    linked: &LinkedSubEntities<P>,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    // Ids: unique, owned by this parent, not re-pointed.
    let mut seen_ids = HashSet::new();
    let mut reported_ids = HashSet::new();
    for item in items {
        let Some(id) = item.id else { continue };
        if !seen_ids.insert(id) {
            if reported_ids.insert(id) {
                violations.push(Violation::DuplicateId(id));
            }
            continue;
        }
        match before.get(&id) {
            None => violations.push(Violation::ForeignLink(id)),
            Some(persisted) => {
                if let Some(sub_entity_id) = item.sub_entity_id {
                    if sub_entity_id != persisted.link.sub_entity_id {
                        violations.push(Violation::SubEntityMismatch {
                            index: item.index,
                            link_id: id,
                        });
                    }
                }
            }
        }
    }

    violations.extend(check_linked_sub_entities(before, items, linked));

    // Signatures: no collision with a persisted link unless it is that link,
    // no repetition inside the payload.
    let persisted_signatures: HashMap<&Signature, LinkId> = before
        .values()
        .map(|persisted| (&persisted.signature, persisted.id()))
        .collect();
    let mut first_seen: HashMap<&Signature, usize> = HashMap::new();

    for item in items {
        if let Some(&owner) = persisted_signatures.get(&item.signature) {
            if item.id != Some(owner) {
                violations.push(Violation::AlreadyRegistered {
                    index: item.index,
                    existing: owner,
                });
            }
        }
        match first_seen.get(&item.signature) {
            Some(&first) => violations.push(Violation::DuplicateEntry {
                index: item.index,
                first,
            }),
            None => {
                first_seen.insert(&item.signature, item.index);
            }
        }
    }

    violations.extend(check_principals(before, items));
    violations
}

/// New links to existing sub-entities: the stored content is authoritative, and
/// a sub-entity is linked at most once per parent.
fn check_linked_sub_entities<P: LinkPolicy>(
    before: &LiveLinks<P>,
    items: &[PreparedItem<P>],
    linked: &LinkedSubEntities<P>,
) -> Vec<Violation> {
    let kept: HashSet<LinkId> = items.iter().filter_map(|item| item.id).collect();
    // Links omitted from the list are deleted first, so only kept ones count.
    let owners: HashMap<SubEntityId, LinkId> = before
        .values()
        .filter(|persisted| kept.contains(&persisted.id()))
        .map(|persisted| (persisted.link.sub_entity_id, persisted.id()))
        .collect();

    let mut violations = Vec::new();
    let mut first_seen: HashMap<SubEntityId, usize> = HashMap::new();

    for item in items.iter().filter(|item| item.id.is_none()) {
        let Some(sub_entity_id) = item.sub_entity_id else {
            continue;
        };
        if let Some(&existing) = owners.get(&sub_entity_id) {
            violations.push(Violation::SubEntityAlreadyLinked {
                index: item.index,
                sub_entity_id,
                existing,
            });
        }
        match first_seen.get(&sub_entity_id) {
            Some(&first) => violations.push(Violation::DuplicateSubEntity {
                index: item.index,
                first,
            }),
            None => {
                first_seen.insert(sub_entity_id, item.index);
            }
        }
        if let Some(stored) = linked.get(&sub_entity_id) {
            if stored.content != item.content {
                violations.push(Violation::LinkedContentMismatch {
                    index: item.index,
                    sub_entity_id,
                });
            }
        }
    }

    violations
}

/// Count effective principals per partition and apply the family's rule.
fn check_principals<P: LinkPolicy>(
    before: &LiveLinks<P>,
    items: &[PreparedItem<P>],
) -> Vec<Violation> {
    let mut principals: BTreeMap<PartitionKey, usize> = BTreeMap::new();

    for item in items {
        let count = principals.entry(item.partition).or_insert(0);
        if effective_principal(before, item) {
            *count += 1;
        }
    }

    principals
        .into_iter()
        .filter_map(|(partition, count)| match (P::PRINCIPAL_RULE, count) {
            (_, count) if count > 1 => Some(Violation::MultiplePrincipal { partition, count }),
            (PrincipalRule::ExactlyOne, 0) => Some(Violation::PrincipalRequired { partition }),
            _ => None,
        })
        .collect()
}

/// Submitted flag if present, else the persisted one, else false.
pub fn effective_principal<P: LinkPolicy>(before: &LiveLinks<P>, item: &PreparedItem<P>) -> bool {
    item.principal
        .or_else(|| {
            item.id
                .and_then(|id| before.get(&id))
                .map(|persisted| persisted.link.principal)
        })
        .unwrap_or(false)
}

/// Normalize and validate a submitted list in one step.
///
/// Content violations are reported alone: structural rules over a partially
/// normalized list would produce misleading principal counts.
pub fn check_submission<P: LinkPolicy>(
    before: &LiveLinks<P>,
    items: Vec<SubmittedItem<P>>,
    linked: &LinkedSubEntities<P>,
) -> Result<Vec<PreparedItem<P>>, ValidationError> {
    let (prepared, content_violations) = prepare_items(items);
    if !content_violations.is_empty() {
        return Err(ValidationError::new(P::field_key(), content_violations));
    }

    let violations = validate_submission(before, &prepared, linked);
    if !violations.is_empty() {
        return Err(ValidationError::new(P::field_key(), violations));
    }

    Ok(prepared)
}

/// Decide whether a soft-deleted link can come back next to `live`, and with
/// which principal flag.
///
/// A signature collision is a hard refusal. A principal collision demotes the
/// restored link; an empty exactly-one partition promotes it.
pub fn admit_restored<P: LinkPolicy>(
    live: &[PersistedLink<P>],
    candidate: &PersistedLink<P>,
) -> Result<bool, Violation> {
    if let Some(existing) = live
        .iter()
        .find(|persisted| persisted.signature == candidate.signature)
    {
        return Err(Violation::SignatureTaken {
            link_id: candidate.id(),
            existing: existing.id(),
        });
    }

    let mut in_partition = live
        .iter()
        .filter(|persisted| persisted.partition == candidate.partition)
        .peekable();
    let partition_empty = in_partition.peek().is_none();
    let has_principal = in_partition.any(|persisted| persisted.link.principal);

    let principal = if has_principal {
        false
    } else if partition_empty && P::PRINCIPAL_RULE == PrincipalRule::ExactlyOne {
        true
    } else {
        candidate.link.principal
    };
    Ok(principal)
}
