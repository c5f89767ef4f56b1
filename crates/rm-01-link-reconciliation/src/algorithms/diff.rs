//! Diff Planner
//!
//! Turns the validated submission into the minimal ordered list of mutations.
//! Planning is pure; the reconciler applies the steps inside one transaction.
//!
//! Step order:
//! 1. Deletes for before-set links missing from the submission
//! 2. Updates and creates, in submission order. Whenever a link becomes
//!    principal in a partition, a `ClearPrincipal` step for the other
//!    principals of that partition is emitted immediately before it.

use shared_types::{LinkId, SubEntityId};
use std::collections::{BTreeMap, HashSet};

use crate::domain::entities::PreparedItem;
use crate::domain::invariants::LiveLinks;
use crate::domain::policy::LinkPolicy;
use crate::domain::value_objects::PartitionKey;

/// Where a new link's sub-entity comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum SubEntitySource<P: LinkPolicy> {
    /// Create a fresh sub-entity with this content.
    New(P::Content),
    /// Link an existing live sub-entity as stored.
    Existing(SubEntityId),
}

/// In-place change of an existing link. `None` fields are left alone.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkUpdate<P: LinkPolicy> {
    pub id: LinkId,
    pub sub_entity_id: SubEntityId,
    pub category: Option<P::Category>,
    pub principal: Option<bool>,
    pub content: Option<P::Content>,
}

impl<P: LinkPolicy> LinkUpdate<P> {
    pub fn touches_link(&self) -> bool {
        self.category.is_some() || self.principal.is_some()
    }
}

/// New link for a submitted item without an id.
#[derive(Clone, Debug, PartialEq)]
pub struct LinkCreate<P: LinkPolicy> {
    /// Position of the item in the submitted list.
    pub index: usize,
    pub id: LinkId,
    pub source: SubEntitySource<P>,
    pub category: P::Category,
    pub principal: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlanStep<P: LinkPolicy> {
    Delete(LinkId),
    ClearPrincipal(Vec<LinkId>),
    Update(LinkUpdate<P>),
    Create(LinkCreate<P>),
}

/// Ordered mutations plus the bookkeeping reported back to the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconcilePlan<P: LinkPolicy> {
    pub steps: Vec<PlanStep<P>>,
    pub created: Vec<LinkId>,
    pub updated: Vec<LinkId>,
    pub deleted: Vec<LinkId>,
    pub unchanged: usize,
}

impl<P: LinkPolicy> ReconcilePlan<P> {
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Simulated live state of the parent's links while steps are planned.
struct LiveState {
    links: BTreeMap<LinkId, (PartitionKey, bool)>,
}

impl LiveState {
    /// Unflag every principal of `partition` except `keep`, returning their ids.
    fn demote_others(&mut self, partition: PartitionKey, keep: LinkId) -> Vec<LinkId> {
        let mut demoted = Vec::new();
        for (id, (link_partition, principal)) in self.links.iter_mut() {
            if *id != keep && *link_partition == partition && *principal {
                *principal = false;
                demoted.push(*id);
            }
        }
        demoted
    }
}

/// Plan the mutations that turn `before` into the submitted list.
///
/// `items` must already have passed the invariant validator against `before`.
pub fn plan_reconciliation<P: LinkPolicy>(
    before: &LiveLinks<P>,
    items: &[PreparedItem<P>],
) -> ReconcilePlan<P> {
    let mut plan = ReconcilePlan {
        steps: Vec::new(),
        created: Vec::new(),
        updated: Vec::new(),
        deleted: Vec::new(),
        unchanged: 0,
    };
    let mut state = LiveState {
        links: before
            .iter()
            .map(|(id, persisted)| (*id, (persisted.partition, persisted.link.principal)))
            .collect(),
    };

    let kept: HashSet<LinkId> = items.iter().filter_map(|item| item.id).collect();
    for id in before.keys().filter(|id| !kept.contains(id)) {
        plan.steps.push(PlanStep::Delete(*id));
        plan.deleted.push(*id);
        state.links.remove(id);
    }

    for item in items {
        match item.id.and_then(|id| before.get(&id)) {
            Some(persisted) => {
                let id = persisted.id();
                let target_principal = item.principal.unwrap_or(persisted.link.principal);
                let (current_partition, current_principal) = state
                    .links
                    .get(&id)
                    .copied()
                    .unwrap_or((persisted.partition, persisted.link.principal));

                if target_principal && (!current_principal || current_partition != item.partition)
                {
                    let demoted = state.demote_others(item.partition, id);
                    if !demoted.is_empty() {
                        plan.steps.push(PlanStep::ClearPrincipal(demoted));
                    }
                }
                state.links.insert(id, (item.partition, target_principal));

                let update = LinkUpdate {
                    id,
                    sub_entity_id: persisted.link.sub_entity_id,
                    category: (item.category != persisted.link.category).then_some(item.category),
                    principal: (target_principal != current_principal).then_some(target_principal),
                    content: (item.content != persisted.sub_entity.content)
                        .then(|| item.content.clone()),
                };
                let changed = update.category.is_some()
                    || update.content.is_some()
                    || target_principal != persisted.link.principal;

                if update.touches_link() || update.content.is_some() {
                    plan.steps.push(PlanStep::Update(update));
                }
                if changed {
                    plan.updated.push(id);
                } else {
                    plan.unchanged += 1;
                }
            }
            None => {
                let id = LinkId::new();
                let principal = item.principal.unwrap_or(false);
                if principal {
                    let demoted = state.demote_others(item.partition, id);
                    if !demoted.is_empty() {
                        plan.steps.push(PlanStep::ClearPrincipal(demoted));
                    }
                }
                state.links.insert(id, (item.partition, principal));

                let source = match item.sub_entity_id {
                    Some(sub_entity_id) => SubEntitySource::Existing(sub_entity_id),
                    None => SubEntitySource::New(item.content.clone()),
                };
                plan.steps.push(PlanStep::Create(LinkCreate {
                    index: item.index,
                    id,
                    source,
                    category: item.category,
                    principal,
                }));
                plan.created.push(id);
            }
        }
    }

    plan
}
