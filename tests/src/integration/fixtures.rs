//! Shared setup for the integration suites.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rm_01_link_reconciliation::{
    AddressFields, AddressUse, Addresses, ContactFields, ContactKind, Contacts, InMemoryRecordStore,
    LinkPolicy, LinkReconciliationApi, LinkView, ManualClock, ReconcileError, ReconcileOutcome,
    ReconcilerConfig, ReconciliationService, SubmittedItem,
};
use shared_types::{ActorId, ParentRef, Timestamp};
use uuid::Uuid;

pub type Service = ReconciliationService<InMemoryRecordStore>;

pub fn at(secs: i64) -> Timestamp {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn address(street: &str) -> AddressFields {
    AddressFields::new(street, "100", "Recife", "PE", "50000000")
}

pub fn residential(street: &str, principal: bool) -> SubmittedItem<Addresses> {
    SubmittedItem::new(AddressUse::Residential, address(street)).with_principal(principal)
}

pub fn email(value: &str, principal: bool) -> SubmittedItem<Contacts> {
    SubmittedItem::new(ContactKind::Email, ContactFields::new(value)).with_principal(principal)
}

/// Echo a live link back as a submitted item, the way a client resubmits it.
pub fn echo<P: LinkPolicy>(view: &LinkView<P>) -> SubmittedItem<P> {
    SubmittedItem::new(view.category, view.content.clone())
        .with_id(view.id)
        .with_principal(view.principal)
}

pub struct Harness {
    pub store: Arc<InMemoryRecordStore>,
    pub clock: Arc<ManualClock>,
    pub service: Arc<Service>,
    pub actor: ActorId,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ReconcilerConfig::default())
    }

    pub fn with_config(config: ReconcilerConfig) -> Self {
        let store = Arc::new(InMemoryRecordStore::new());
        let clock = Arc::new(ManualClock::new(at(1_000)));
        let service = Arc::new(ReconciliationService::with_config(
            store.clone(),
            clock.clone(),
            config,
        ));
        Self {
            store,
            clock,
            service,
            actor: ActorId::from("integration"),
        }
    }

    /// Register a fresh person parent.
    pub fn parent(&self) -> ParentRef {
        let parent = ParentRef::person(Uuid::new_v4());
        self.store.register_parent(parent);
        parent
    }

    pub async fn submit<P>(
        &self,
        parent: ParentRef,
        items: Vec<SubmittedItem<P>>,
    ) -> Result<ReconcileOutcome<P>, ReconcileError>
    where
        P: LinkPolicy,
        Service: LinkReconciliationApi<P>,
    {
        let actor = self.actor.clone();
        LinkReconciliationApi::<P>::reconcile(self.service.as_ref(), parent, actor, items).await
    }

    pub async fn live<P>(&self, parent: ParentRef) -> Vec<LinkView<P>>
    where
        P: LinkPolicy,
        Service: LinkReconciliationApi<P>,
    {
        LinkReconciliationApi::<P>::list_links(self.service.as_ref(), parent)
            .await
            .unwrap()
    }
}
