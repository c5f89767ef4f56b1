//! # Cascade Delete and Restore
//!
//! Parent deletion soft-deletes every live link; restoring the parent brings
//! back the links whose deletion time falls within the restore window around
//! the parent's own deletion time.
//!
//! Skewed cascades are simulated by soft-deleting links directly through a
//! store transaction before the parent itself is deleted.

#[cfg(test)]
mod tests {
    use rm_01_link_reconciliation::application::orphan_collector::collect_orphan;
    use rm_01_link_reconciliation::{
        AddressUse, Addresses, Contacts, InMemoryRecordStore, LinkReconciliationApi,
        LinkTransaction, ParentLifecycleApi, ReconcileError, ReconcilerConfig, RecordStore,
        SubmittedItem,
    };
    use shared_types::{ActorId, LinkId, ParentRef, SubEntityId};

    use super::super::fixtures::{address, at, email, residential, Harness};

    /// Soft-delete one address link (and collect its sub-entity) at `secs`.
    fn delete_address_link_at(
        store: &InMemoryRecordStore,
        parent: &ParentRef,
        link: LinkId,
        sub_entity: SubEntityId,
        actor: &ActorId,
        secs: i64,
    ) {
        store
            .transaction(parent, |tx| {
                LinkTransaction::<Addresses>::soft_delete_link(tx, link, actor, at(secs))?;
                collect_orphan::<Addresses, _>(tx, sub_entity, at(secs))?;
                Ok(())
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_restore_includes_link_deleted_one_second_late() {
        let h = Harness::new();
        let parent = h.parent();
        h.clock.set(at(90));
        let created = h.submit(parent, vec![residential("Rua A", true)]).await.unwrap();
        let link = created.created[0];
        let sub_entity = created.links[0].sub_entity_id;

        delete_address_link_at(&h.store, &parent, link, sub_entity, &h.actor, 101);
        h.clock.set(at(100));
        let deletion = h.service.delete_parent(parent, h.actor.clone()).await.unwrap();
        assert!(deletion.addresses.links_deleted.is_empty());

        h.clock.set(at(500));
        let report = h.service.restore_parent(parent, h.actor.clone()).await.unwrap();

        assert_eq!(report.addresses.links_restored, vec![link]);
        assert_eq!(report.addresses.sub_entities_restored, vec![sub_entity]);
        assert!(h.store.sub_entity::<Addresses>(sub_entity).unwrap().is_live());
        let live = h.live::<Addresses>(parent).await;
        assert_eq!(live.len(), 1);
        assert!(live[0].principal);
        assert_eq!(live[0].updated_at, at(500));
    }

    #[tokio::test]
    async fn test_deletion_outside_window_stays_deleted() {
        let h = Harness::new();
        let parent = h.parent();
        h.clock.set(at(90));
        let created = h
            .submit(
                parent,
                vec![
                    residential("Rua A", true),
                    SubmittedItem::new(AddressUse::Commercial, address("Rua B"))
                        .with_principal(true),
                ],
            )
            .await
            .unwrap();
        let commercial = created
            .links
            .iter()
            .find(|view| view.category == AddressUse::Commercial)
            .unwrap();
        let residential_id = created
            .links
            .iter()
            .find(|view| view.category == AddressUse::Residential)
            .unwrap()
            .id;

        delete_address_link_at(
            &h.store,
            &parent,
            commercial.id,
            commercial.sub_entity_id,
            &h.actor,
            110,
        );
        h.clock.set(at(100));
        h.service.delete_parent(parent, h.actor.clone()).await.unwrap();

        h.clock.set(at(200));
        let report = h.service.restore_parent(parent, h.actor.clone()).await.unwrap();
        assert_eq!(report.addresses.links_restored, vec![residential_id]);
        assert!(h.store.link::<Addresses>(commercial.id).unwrap().deleted_at.is_some());

        // An explicit restore still brings it back; its partition is empty, so it
        // becomes the principal.
        let view = LinkReconciliationApi::<Addresses>::restore_link(
            h.service.as_ref(),
            parent,
            commercial.id,
            h.actor.clone(),
        )
        .await
        .unwrap();
        assert!(view.principal);
        assert_eq!(h.live::<Addresses>(parent).await.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_margin_misses_skewed_cascade() {
        let h = Harness::with_config(ReconcilerConfig {
            restore_window_secs: 0,
            ..Default::default()
        });
        let parent = h.parent();
        h.clock.set(at(90));
        let created = h.submit(parent, vec![residential("Rua A", true)]).await.unwrap();

        delete_address_link_at(
            &h.store,
            &parent,
            created.created[0],
            created.links[0].sub_entity_id,
            &h.actor,
            101,
        );
        h.clock.set(at(100));
        h.service.delete_parent(parent, h.actor.clone()).await.unwrap();
        h.clock.set(at(200));
        let report = h.service.restore_parent(parent, h.actor.clone()).await.unwrap();

        assert_eq!(report.links_restored(), 0);
        assert!(h.live::<Addresses>(parent).await.is_empty());
    }

    #[tokio::test]
    async fn test_co_restored_link_never_duplicates_content() {
        let h = Harness::new();
        let parent = h.parent();

        // Removed by the user three seconds before the parent was deleted, then
        // re-added with the same content under a new link.
        h.clock.set(at(97));
        let old = h.submit(parent, vec![email("ana@example.com", true)]).await.unwrap();
        h.submit(parent, Vec::<SubmittedItem<Contacts>>::new()).await.unwrap();
        h.clock.set(at(98));
        let new = h.submit(parent, vec![email("ana@example.com", true)]).await.unwrap();

        h.clock.set(at(100));
        h.service.delete_parent(parent, h.actor.clone()).await.unwrap();
        h.clock.set(at(300));
        let report = h.service.restore_parent(parent, h.actor.clone()).await.unwrap();

        assert_eq!(report.contacts.links_restored, new.created);
        assert_eq!(report.contacts.skipped, old.created);
        assert_eq!(h.live::<Contacts>(parent).await.len(), 1);
    }

    #[tokio::test]
    async fn test_co_restored_link_demoted_when_partition_has_principal() {
        let h = Harness::new();
        let parent = h.parent();

        // At 97 the principal residential address was replaced.
        h.clock.set(at(90));
        let old = h.submit(parent, vec![residential("Rua X", true)]).await.unwrap();
        h.clock.set(at(97));
        let new = h.submit(parent, vec![residential("Rua A", true)]).await.unwrap();

        h.clock.set(at(100));
        h.service.delete_parent(parent, h.actor.clone()).await.unwrap();
        h.clock.set(at(300));
        let report = h.service.restore_parent(parent, h.actor.clone()).await.unwrap();

        // Closest deletion first: the cascaded link keeps the principal flag.
        assert_eq!(
            report.addresses.links_restored,
            vec![new.created[0], old.created[0]]
        );
        let live = h.live::<Addresses>(parent).await;
        assert_eq!(live.len(), 2);
        let principals: Vec<_> = live.iter().filter(|view| view.principal).collect();
        assert_eq!(principals.len(), 1);
        assert_eq!(principals[0].id, new.created[0]);
    }

    #[tokio::test]
    async fn test_restore_keeps_principal_of_shared_deletion_instant() {
        let h = Harness::new();

        // Links deleted at the same instant come back in link-id order, which
        // is random, so repeat over fresh parents.
        for round in 0..16 {
            let parent = h.parent();
            h.clock.set(at(100));
            let created = h
                .submit(parent, vec![residential("Rua A", false), residential("Rua B", true)])
                .await
                .unwrap();
            let principal = created.links.iter().find(|view| view.principal).unwrap().id;

            h.service.delete_parent(parent, h.actor.clone()).await.unwrap();
            h.clock.set(at(3_700));
            let report = h.service.restore_parent(parent, h.actor.clone()).await.unwrap();

            assert_eq!(report.addresses.links_restored.len(), 2);
            assert_eq!(report.addresses.links_restored[0], principal, "round {round}");
            let live = h.live::<Addresses>(parent).await;
            let principals: Vec<_> = live
                .iter()
                .filter(|view| view.principal)
                .map(|view| view.id)
                .collect();
            assert_eq!(principals, vec![principal], "round {round}");
        }
    }

    #[tokio::test]
    async fn test_lifecycle_state_errors() {
        let h = Harness::new();
        let parent = h.parent();

        let live_restore = h.service.restore_parent(parent, h.actor.clone()).await;
        assert!(matches!(live_restore, Err(ReconcileError::InvalidState(_))));

        h.service.delete_parent(parent, h.actor.clone()).await.unwrap();
        let again = h.service.delete_parent(parent, h.actor.clone()).await;
        assert!(matches!(again, Err(ReconcileError::ParentNotFound(p)) if p == parent));

        let submit = h.submit(parent, vec![residential("Rua A", true)]).await;
        assert!(matches!(submit, Err(ReconcileError::ParentNotFound(_))));
    }
}
