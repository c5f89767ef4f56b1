//! # Reconciliation Flows
//!
//! End-to-end scenarios through `LinkReconciliationApi` over the in-memory
//! store: resubmission, principal handling, duplicate rejection, atomicity and
//! orphan cleanup across parents.

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rm_01_link_reconciliation::api::ErrorPayload;
    use rm_01_link_reconciliation::{
        AddressUse, Addresses, ContactFields, ContactKind, Contacts, DocumentFields, DocumentType,
        Documents, ReconcileError, SubmittedItem, Violation,
    };

    use super::super::fixtures::{address, echo, email, residential, Harness};

    // =============================================================================
    // RESUBMISSION
    // =============================================================================

    #[tokio::test]
    async fn test_resubmitting_same_list_is_noop() {
        let h = Harness::new();
        let parent = h.parent();
        let first = h
            .submit(
                parent,
                vec![
                    residential("Rua A", true),
                    SubmittedItem::new(AddressUse::Commercial, address("Av. Boa Viagem"))
                        .with_principal(true),
                ],
            )
            .await
            .unwrap();

        h.clock.advance(Duration::minutes(5));
        let resubmitted: Vec<_> = first.links.iter().map(echo).collect();
        let second = h.submit(parent, resubmitted).await.unwrap();

        assert!(second.is_noop());
        assert_eq!(second.unchanged, 2);
        assert_eq!(second.links, first.links);
    }

    // =============================================================================
    // ADDRESS SCENARIOS
    // =============================================================================

    #[tokio::test]
    async fn test_keep_existing_and_add_second_address() {
        let h = Harness::new();
        let parent = h.parent();
        let created = h.submit(parent, vec![residential("Rua A", true)]).await.unwrap();
        let l1 = created.created[0];

        let outcome = h
            .submit(
                parent,
                vec![
                    residential("Rua A", true).with_id(l1),
                    residential("Rua B", false),
                ],
            )
            .await
            .unwrap();

        assert_eq!(outcome.unchanged, 1);
        assert_eq!(outcome.created.len(), 1);
        assert!(outcome.updated.is_empty());
        assert!(outcome.deleted.is_empty());
        assert_eq!(outcome.links.len(), 2);
        let principals: Vec<_> = outcome.links.iter().filter(|l| l.principal).collect();
        assert_eq!(principals.len(), 1);
        assert_eq!(principals[0].id, l1);
    }

    #[tokio::test]
    async fn test_duplicate_entry_rejected_without_writes() {
        let h = Harness::new();
        let parent = h.parent();

        let result = h
            .submit(parent, vec![residential("Rua A", true), residential("Rua A", false)])
            .await;

        match result {
            Err(ReconcileError::Validation(err)) => {
                assert_eq!(err.field_key, "enderecos");
                assert!(err
                    .violations
                    .contains(&Violation::DuplicateEntry { index: 1, first: 0 }));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(h.live::<Addresses>(parent).await.is_empty());
    }

    #[tokio::test]
    async fn test_signature_match_differs_only_in_case_and_spacing() {
        let h = Harness::new();
        let parent = h.parent();
        h.submit(parent, vec![residential("Rua A", true)]).await.unwrap();

        let result = h.submit(parent, vec![residential("  RUA a ", true)]).await;

        match result {
            Err(ReconcileError::Validation(err)) => assert!(matches!(
                &err.violations[..],
                [Violation::AlreadyRegistered { index: 0, .. }]
            )),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failing_third_item_leaves_live_set_untouched() {
        let h = Harness::new();
        let parent = h.parent();
        let before = h.submit(parent, vec![residential("Rua A", true)]).await.unwrap();

        let mut broken = residential("Rua C", false);
        broken.content.postal_code = "123".to_string();
        let result = h
            .submit(
                parent,
                vec![
                    echo(&before.links[0]),
                    residential("Rua B", false),
                    broken,
                ],
            )
            .await;

        match result {
            Err(ReconcileError::Validation(err)) => {
                assert!(matches!(
                    &err.violations[..],
                    [Violation::InvalidContent { index: 2, .. }]
                ));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(h.live::<Addresses>(parent).await, before.links);
    }

    #[tokio::test]
    async fn test_principal_moves_within_partition() {
        let h = Harness::new();
        let parent = h.parent();
        let created = h
            .submit(parent, vec![residential("Rua A", true), residential("Rua B", false)])
            .await
            .unwrap();

        let swapped: Vec<_> = created
            .links
            .iter()
            .map(|view| echo(view).with_principal(!view.principal))
            .collect();
        let outcome = h.submit(parent, swapped).await.unwrap();

        assert_eq!(outcome.updated.len(), 2);
        let principal = outcome.links.iter().find(|l| l.principal).unwrap();
        assert_eq!(principal.content.street, "Rua B");
        assert_eq!(outcome.links.iter().filter(|l| l.principal).count(), 1);
    }

    #[tokio::test]
    async fn test_address_partition_needs_a_principal() {
        let h = Harness::new();
        let parent = h.parent();

        let err = h
            .submit(parent, vec![residential("Rua A", false)])
            .await
            .unwrap_err();

        let payload = ErrorPayload::from(&err);
        assert_eq!(payload.status, 400);
        assert_eq!(
            payload.messages("enderecos"),
            ["principal required (residential)".to_string()]
        );
    }

    // =============================================================================
    // CONTACTS AND DOCUMENTS
    // =============================================================================

    #[tokio::test]
    async fn test_contacts_allow_no_principal() {
        let h = Harness::new();
        let parent = h.parent();

        let outcome = h
            .submit(
                parent,
                vec![
                    email("ana@example.com", false),
                    SubmittedItem::<Contacts>::new(
                        ContactKind::Mobile,
                        ContactFields::new("81999990000"),
                    ),
                ],
            )
            .await
            .unwrap();

        assert_eq!(outcome.links.len(), 2);
        assert!(outcome.links.iter().all(|l| !l.principal));
    }

    #[tokio::test]
    async fn test_documents_dedupe_by_type() {
        let h = Harness::new();
        let parent = h.parent();

        let result = h
            .submit(
                parent,
                vec![
                    SubmittedItem::<Documents>::new(
                        DocumentType::Cpf,
                        DocumentFields::new("11111111111"),
                    )
                    .with_principal(true),
                    SubmittedItem::new(DocumentType::Cpf, DocumentFields::new("22222222222")),
                ],
            )
            .await;

        assert!(matches!(result, Err(ReconcileError::Validation(_))));
        assert!(h.live::<Documents>(parent).await.is_empty());
    }

    // =============================================================================
    // OWNERSHIP
    // =============================================================================

    #[tokio::test]
    async fn test_foreign_link_reference_rejected() {
        let h = Harness::new();
        let a = h.parent();
        let b = h.parent();
        let owned = h.submit(a, vec![email("ana@example.com", true)]).await.unwrap();

        let result = h
            .submit(b, vec![email("ana@example.com", true).with_id(owned.created[0])])
            .await;

        match result {
            Err(ReconcileError::Validation(err)) => {
                assert!(err.violations.contains(&Violation::ForeignLink(owned.created[0])));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    // =============================================================================
    // ORPHAN CLEANUP
    // =============================================================================

    #[tokio::test]
    async fn test_removed_link_orphans_unshared_sub_entity() {
        let h = Harness::new();
        let parent = h.parent();
        let created = h.submit(parent, vec![residential("Rua A", true)]).await.unwrap();
        let sub_entity_id = created.links[0].sub_entity_id;

        let emptied = h.submit(parent, Vec::<SubmittedItem<Addresses>>::new()).await.unwrap();

        assert_eq!(emptied.deleted, created.created);
        assert_eq!(emptied.orphans_collected, vec![sub_entity_id]);
        let sub_entity = h.store.sub_entity::<Addresses>(sub_entity_id).unwrap();
        assert!(sub_entity.deleted_at.is_some());
        assert!(h.store.link::<Addresses>(created.created[0]).unwrap().deleted_at.is_some());
    }

    #[tokio::test]
    async fn test_shared_sub_entity_survives_until_last_link() {
        let h = Harness::new();
        let person = h.parent();
        let company = h.parent();

        let created = h
            .submit(person, vec![email("shared@example.com", true)])
            .await
            .unwrap();
        let shared = created.links[0].sub_entity_id;
        let linked = h
            .submit(company, vec![email("shared@example.com", true).linking(shared)])
            .await
            .unwrap();
        assert_eq!(linked.links[0].sub_entity_id, shared);

        let dropped = h.submit(person, Vec::<SubmittedItem<Contacts>>::new()).await.unwrap();
        assert!(dropped.orphans_collected.is_empty());
        assert!(h.store.sub_entity::<Contacts>(shared).unwrap().is_live());

        let dropped = h.submit(company, Vec::<SubmittedItem<Contacts>>::new()).await.unwrap();
        assert_eq!(dropped.orphans_collected, vec![shared]);
        assert!(!h.store.sub_entity::<Contacts>(shared).unwrap().is_live());
    }

    #[tokio::test]
    async fn test_linked_sub_entity_keeps_stored_content() {
        let h = Harness::new();
        let person = h.parent();
        let company = h.parent();
        let created = h
            .submit(person, vec![email("shared@example.com", true)])
            .await
            .unwrap();
        let shared = created.links[0].sub_entity_id;

        let result = h
            .submit(company, vec![email("other@example.com", true).linking(shared)])
            .await;

        match result {
            Err(ReconcileError::Validation(err)) => {
                assert_eq!(err.field_key, "contatos");
                assert_eq!(
                    err.violations,
                    vec![Violation::LinkedContentMismatch {
                        index: 0,
                        sub_entity_id: shared
                    }]
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(h.live::<Contacts>(company).await.is_empty());
        let stored = h.store.sub_entity::<Contacts>(shared).unwrap();
        assert_eq!(stored.content.value, "shared@example.com");
    }

    #[tokio::test]
    async fn test_sub_entity_linked_once_per_parent() {
        let h = Harness::new();
        let parent = h.parent();
        let created = h.submit(parent, vec![residential("Rua A", true)]).await.unwrap();
        let l1 = created.links[0].clone();

        let result = h
            .submit(
                parent,
                vec![
                    echo(&l1),
                    SubmittedItem::new(AddressUse::Commercial, address("Rua Z"))
                        .linking(l1.sub_entity_id)
                        .with_principal(true),
                ],
            )
            .await;

        match result {
            Err(ReconcileError::Validation(err)) => {
                assert!(err.violations.contains(&Violation::SubEntityAlreadyLinked {
                    index: 1,
                    sub_entity_id: l1.sub_entity_id,
                    existing: l1.id
                }));
                assert!(err.violations.contains(&Violation::LinkedContentMismatch {
                    index: 1,
                    sub_entity_id: l1.sub_entity_id
                }));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        let live = h.live::<Addresses>(parent).await;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].content.street, "Rua A");
    }

    #[tokio::test]
    async fn test_editing_shared_content_leaves_other_parent_intact() {
        let h = Harness::new();
        let a = h.parent();
        let b = h.parent();

        let b_links = h
            .submit(
                b,
                vec![
                    residential("Rua A", true),
                    SubmittedItem::new(AddressUse::Commercial, address("Rua B"))
                        .with_principal(true),
                ],
            )
            .await
            .unwrap();
        let shared = b_links
            .links
            .iter()
            .find(|view| view.content.street == "Rua A")
            .unwrap()
            .sub_entity_id;
        let linked = h
            .submit(a, vec![residential("Rua A", true).linking(shared)])
            .await
            .unwrap();
        let a_link = linked.links[0].clone();
        assert_eq!(a_link.sub_entity_id, shared);

        let mut edited = echo(&a_link);
        edited.content = address("Rua B");
        let outcome = h.submit(a, vec![edited]).await.unwrap();

        assert_eq!(outcome.updated, vec![a_link.id]);
        assert!(outcome.orphans_collected.is_empty());
        assert_eq!(outcome.links[0].id, a_link.id);
        assert_eq!(outcome.links[0].content.street, "Rua B");
        assert_ne!(outcome.links[0].sub_entity_id, shared);

        let mut streets: Vec<_> = h
            .live::<Addresses>(b)
            .await
            .into_iter()
            .map(|view| view.content.street)
            .collect();
        streets.sort();
        assert_eq!(streets, vec!["Rua A", "Rua B"]);
        assert_eq!(
            h.store.sub_entity::<Addresses>(shared).unwrap().content.street,
            "Rua A"
        );
    }

    #[tokio::test]
    async fn test_editing_unshared_content_updates_in_place() {
        let h = Harness::new();
        let parent = h.parent();
        let created = h.submit(parent, vec![residential("Rua A", true)]).await.unwrap();
        let link = created.links[0].clone();

        let mut edited = echo(&link);
        edited.content = address("Rua A Nova");
        let outcome = h.submit(parent, vec![edited]).await.unwrap();

        assert_eq!(outcome.links[0].sub_entity_id, link.sub_entity_id);
        assert_eq!(outcome.links[0].content.street, "Rua A Nova");
    }

    #[tokio::test]
    async fn test_replacing_content_collects_old_sub_entity() {
        let h = Harness::new();
        let parent = h.parent();
        let created = h.submit(parent, vec![residential("Rua A", true)]).await.unwrap();
        let old_sub = created.links[0].sub_entity_id;

        let outcome = h.submit(parent, vec![residential("Rua Nova", true)]).await.unwrap();

        assert_eq!(outcome.deleted, created.created);
        assert_eq!(outcome.created.len(), 1);
        assert_eq!(outcome.orphans_collected, vec![old_sub]);
        assert_ne!(outcome.links[0].sub_entity_id, old_sub);
    }
}
