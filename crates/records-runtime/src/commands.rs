//! # Command Dispatcher
//!
//! Decodes one JSON command, routes it to the reconciliation service for the
//! addressed family and encodes the answer.
//!
//! ```text
//! {"op":"reconcile","family":"enderecos","parent":{...},"actor":"ana","items":[...]}
//!     -> {"ok":true,"result":{"links":[...],"created":[...],...}}
//!     -> {"ok":false,"error":{"status":400,"class":"bad_request","errors":{...}}}
//! ```

use std::sync::Arc;

use rm_01_link_reconciliation::api::{
    ErrorPayload, ReconcileRequest, ReconcileResponse, RestoreLinkRequest,
};
use rm_01_link_reconciliation::{
    Addresses, Contacts, Documents, InMemoryRecordStore, LinkPolicy, LinkReconciliationApi,
    ParentLifecycleApi, ReconcilerConfig, ReconciliationService, SystemTimeSource, TimeSource,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{ActorId, ParentRef, SubEntityKind};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Service type driven by the runtime.
pub type MemoryService = ReconciliationService<InMemoryRecordStore>;

/// Operations understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    RegisterParent,
    Reconcile,
    List,
    DeleteParent,
    RestoreParent,
    RestoreLink,
}

/// Routing fields common to every command.
#[derive(Debug, Deserialize)]
struct Envelope {
    op: Operation,
    #[serde(default)]
    family: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ParentCommand {
    parent: ParentRef,
}

#[derive(Debug, Deserialize)]
struct LifecycleCommand {
    parent: ParentRef,
    actor: ActorId,
}

/// Failures raised by the dispatcher itself, before or after the engine runs.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("malformed command: {0}")]
    Malformed(String),

    #[error("command requires a family")]
    MissingFamily,

    #[error("unknown family '{0}'")]
    UnknownFamily(String),

    #[error("could not encode result: {0}")]
    Encode(String),
}

impl From<CommandError> for ErrorPayload {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Encode(_) => ErrorPayload::internal(err.to_string()),
            other => ErrorPayload::bad_request(other.to_string()),
        }
    }
}

/// One line of output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl CommandResponse {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: ErrorPayload) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(error),
        }
    }
}

/// Command processor over an in-memory store.
pub struct CommandProcessor {
    service: MemoryService,
}

impl CommandProcessor {
    /// Processor stamping writes with the system clock.
    pub fn new(config: ReconcilerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemTimeSource))
    }

    /// Processor with an injected clock.
    pub fn with_clock(config: ReconcilerConfig, clock: Arc<dyn TimeSource>) -> Self {
        let store = Arc::new(InMemoryRecordStore::new());
        Self {
            service: ReconciliationService::with_config(store, clock, config),
        }
    }

    pub fn service(&self) -> &MemoryService {
        &self.service
    }

    /// Decode, execute and encode one input line.
    pub async fn handle_line(&self, line: &str) -> CommandResponse {
        let outcome = match serde_json::from_str::<Value>(line) {
            Ok(command) => self.execute(command).await,
            Err(e) => Err(CommandError::Malformed(e.to_string()).into()),
        };

        match outcome {
            Ok(result) => CommandResponse::success(result),
            Err(error) => {
                warn!(status = error.status, class = %error.class, "Command failed");
                CommandResponse::failure(error)
            }
        }
    }

    /// Execute one decoded command.
    pub async fn execute(&self, command: Value) -> Result<Value, ErrorPayload> {
        let envelope: Envelope = decode(&command)?;
        debug!(op = ?envelope.op, family = ?envelope.family, "Command received");

        match envelope.op {
            Operation::RegisterParent => {
                let body: ParentCommand = decode(&command)?;
                let registered = self.service.store().register_parent(body.parent);
                if registered {
                    info!(parent = %body.parent, "Parent registered");
                }
                encode(&serde_json::json!({
                    "parent": body.parent,
                    "registered": registered,
                }))
            }
            Operation::DeleteParent => {
                let body: LifecycleCommand = decode(&command)?;
                let report = self.service.delete_parent(body.parent, body.actor).await?;
                encode(&report)
            }
            Operation::RestoreParent => {
                let body: LifecycleCommand = decode(&command)?;
                let report = self.service.restore_parent(body.parent, body.actor).await?;
                encode(&report)
            }
            Operation::Reconcile | Operation::List | Operation::RestoreLink => {
                let op = envelope.op;
                match family_of(&envelope)? {
                    SubEntityKind::Address => self.family_command::<Addresses>(op, command).await,
                    SubEntityKind::Contact => self.family_command::<Contacts>(op, command).await,
                    SubEntityKind::Document => self.family_command::<Documents>(op, command).await,
                }
            }
        }
    }

    async fn family_command<P>(&self, op: Operation, command: Value) -> Result<Value, ErrorPayload>
    where
        P: LinkPolicy,
        MemoryService: LinkReconciliationApi<P>,
    {
        match op {
            Operation::Reconcile => {
                let request: ReconcileRequest<P> = serde_json::from_value(command)
                    .map_err(|e| invalid_items(P::field_key(), e))?;
                let outcome = LinkReconciliationApi::<P>::reconcile(
                    &self.service,
                    request.parent,
                    request.actor,
                    request.items,
                )
                .await?;
                encode(&ReconcileResponse::from(outcome))
            }
            Operation::List => {
                let body: ParentCommand = decode(&command)?;
                let links =
                    LinkReconciliationApi::<P>::list_links(&self.service, body.parent).await?;
                encode(&links)
            }
            Operation::RestoreLink => {
                let request: RestoreLinkRequest = decode(&command)?;
                let view = LinkReconciliationApi::<P>::restore_link(
                    &self.service,
                    request.parent,
                    request.link_id,
                    request.actor,
                )
                .await?;
                encode(&view)
            }
            other => {
                let message = format!("{other:?} is not a family command");
                Err(CommandError::Malformed(message).into())
            }
        }
    }
}

fn family_of(envelope: &Envelope) -> Result<SubEntityKind, CommandError> {
    let key = envelope.family.as_deref().ok_or(CommandError::MissingFamily)?;
    SubEntityKind::from_field_key(key).ok_or_else(|| CommandError::UnknownFamily(key.to_string()))
}

fn decode<T: DeserializeOwned>(command: &Value) -> Result<T, CommandError> {
    T::deserialize(command).map_err(|e| CommandError::Malformed(e.to_string()))
}

fn encode<T: Serialize>(value: &T) -> Result<Value, ErrorPayload> {
    serde_json::to_value(value).map_err(|e| CommandError::Encode(e.to_string()).into())
}

/// Undecodable submissions are reported under the family's field key.
fn invalid_items(field_key: &str, err: serde_json::Error) -> ErrorPayload {
    let mut payload = ErrorPayload::bad_request(err.to_string());
    if let Some(messages) = payload.errors.remove(rm_01_link_reconciliation::NON_FIELD_ERRORS) {
        payload.errors.insert(field_key.to_string(), messages);
    }
    payload
}
