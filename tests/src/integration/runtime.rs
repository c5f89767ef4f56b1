//! # Runtime Command Loop
//!
//! Drives the runtime's JSON command processor the way the binary does, one
//! line at a time, and checks the response envelopes.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use records_runtime::CommandProcessor;
    use rm_01_link_reconciliation::{ManualClock, ReconcilerConfig};
    use serde_json::{json, Value};
    use uuid::Uuid;

    use super::super::fixtures::at;

    fn processor() -> (CommandProcessor, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(at(100)));
        (
            CommandProcessor::with_clock(ReconcilerConfig::default(), clock.clone()),
            clock,
        )
    }

    async fn send(processor: &CommandProcessor, command: Value) -> Value {
        let response = processor.handle_line(&command.to_string()).await;
        serde_json::to_value(response).unwrap()
    }

    fn address(street: &str, principal: bool) -> Value {
        json!({
            "category": "residential",
            "principal": principal,
            "street": street,
            "number": "100",
            "city": "Recife",
            "state": "PE",
            "postal_code": "50000000"
        })
    }

    #[tokio::test]
    async fn test_address_session_over_json_lines() {
        let (processor, _clock) = processor();
        let parent = json!({"kind": "organization", "id": Uuid::new_v4()});

        let registered = send(&processor, json!({"op": "register_parent", "parent": parent})).await;
        assert_eq!(registered["ok"], true);
        assert_eq!(registered["result"]["registered"], true);

        let first = send(
            &processor,
            json!({
                "op": "reconcile", "family": "enderecos", "parent": parent, "actor": "ana",
                "items": [address("Rua A", true)]
            }),
        )
        .await;
        assert_eq!(first["ok"], true);
        let l1 = first["result"]["links"][0]["id"].clone();

        let mut kept = address("Rua A", true);
        kept["id"] = l1.clone();
        let second = send(
            &processor,
            json!({
                "op": "reconcile", "family": "enderecos", "parent": parent, "actor": "ana",
                "items": [kept, address("Rua B", false)]
            }),
        )
        .await;

        assert_eq!(second["ok"], true);
        let result = &second["result"];
        assert_eq!(result["unchanged"], 1);
        assert_eq!(result["created"].as_array().unwrap().len(), 1);
        let links = result["links"].as_array().unwrap();
        assert_eq!(links.len(), 2);
        let principals: Vec<_> = links.iter().filter(|l| l["principal"] == true).collect();
        assert_eq!(principals.len(), 1);
        assert_eq!(principals[0]["id"], l1);
    }

    #[tokio::test]
    async fn test_errors_come_back_field_grouped() {
        let (processor, _clock) = processor();
        let parent = json!({"kind": "person", "id": Uuid::new_v4()});
        send(&processor, json!({"op": "register_parent", "parent": parent})).await;

        let duplicate = send(
            &processor,
            json!({
                "op": "reconcile", "family": "enderecos", "parent": parent, "actor": "ana",
                "items": [address("Rua A", true), address("Rua A", false)]
            }),
        )
        .await;
        assert_eq!(duplicate["ok"], false);
        assert_eq!(duplicate["error"]["status"], 400);
        assert!(duplicate["error"]["errors"]["enderecos"].is_array());

        let missing = send(
            &processor,
            json!({
                "op": "restore_link", "family": "contatos", "parent": parent,
                "link_id": Uuid::new_v4(), "actor": "ana"
            }),
        )
        .await;
        assert_eq!(missing["error"]["status"], 404);
        assert!(missing["error"]["errors"]["non_field_errors"].is_array());
    }

    #[tokio::test]
    async fn test_cascade_over_json_lines() {
        let (processor, clock) = processor();
        let parent = json!({"kind": "branch", "id": Uuid::new_v4()});
        send(&processor, json!({"op": "register_parent", "parent": parent})).await;
        send(
            &processor,
            json!({
                "op": "reconcile", "family": "documentos", "parent": parent, "actor": "ana",
                "items": [{"category": "cnpj", "principal": true, "number": "11222333000181"}]
            }),
        )
        .await;

        let delete = json!({"op": "delete_parent", "parent": parent, "actor": "ana"});
        let deleted = send(&processor, delete).await;
        assert_eq!(deleted["ok"], true);

        clock.set(at(10_000));
        let restore = json!({"op": "restore_parent", "parent": parent, "actor": "ana"});
        let restored = send(&processor, restore).await;
        assert_eq!(restored["ok"], true);
        let links_restored = restored["result"]["documents"]["links_restored"].as_array();
        assert_eq!(links_restored.unwrap().len(), 1);

        let list = json!({"op": "list", "family": "documentos", "parent": parent});
        let listed = send(&processor, list).await;
        assert_eq!(listed["result"][0]["number"], "11222333000181");
        assert_eq!(listed["result"][0]["principal"], true);
    }
}
