//! Domain models and strongly-typed identifiers.
//!
//! Defines integrations, credential records, webhook tasks, and newtype ID
//! wrappers so identifiers cannot be mixed up at call sites. Also carries
//! the sqlx encode/decode plumbing and the per-integration settings blob.

use std::{collections::HashMap, fmt};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

type PgDb = sqlx::Postgres;
type PgValueRef<'r> = sqlx::postgres::PgValueRef<'r>;
type PgTypeInfo = sqlx::postgres::PgTypeInfo;
type PgArgumentBuffer = sqlx::postgres::PgArgumentBuffer;
type EncodeResult =
    Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync + 'static>>;
type BoxDynError = sqlx::error::BoxDynError;

/// Strongly-typed workspace identifier.
///
/// Every integration, credential, and session is scoped to a workspace.
/// Carried in the OAuth `state` parameter during the callback flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceId(pub Uuid);

impl WorkspaceId {
    /// Creates a new random workspace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkspaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for WorkspaceId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl sqlx::Type<PgDb> for WorkspaceId {
    fn type_info() -> PgTypeInfo {
        <Uuid as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for WorkspaceId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let uuid = <Uuid as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(uuid))
    }
}

impl sqlx::Encode<'_, PgDb> for WorkspaceId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <Uuid as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// Strongly-typed user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Creates a new random user ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UserId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl sqlx::Type<PgDb> for UserId {
    fn type_info() -> PgTypeInfo {
        <Uuid as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for UserId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let uuid = <Uuid as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(uuid))
    }
}

impl sqlx::Encode<'_, PgDb> for UserId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <Uuid as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// Strongly-typed integration identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntegrationId(pub Uuid);

impl IntegrationId {
    /// Creates a new random integration ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for IntegrationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IntegrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for IntegrationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl sqlx::Type<PgDb> for IntegrationId {
    fn type_info() -> PgTypeInfo {
        <Uuid as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for IntegrationId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let uuid = <Uuid as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(uuid))
    }
}

impl sqlx::Encode<'_, PgDb> for IntegrationId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <Uuid as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// Strongly-typed authentication record identifier.
///
/// An integration's `authentication_id` always resolves to exactly one
/// authentication record owned by the same user and workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthenticationId(pub Uuid);

impl AuthenticationId {
    /// Creates a new random authentication ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AuthenticationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AuthenticationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AuthenticationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl sqlx::Type<PgDb> for AuthenticationId {
    fn type_info() -> PgTypeInfo {
        <Uuid as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for AuthenticationId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let uuid = <Uuid as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(uuid))
    }
}

impl sqlx::Encode<'_, PgDb> for AuthenticationId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <Uuid as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// Strongly-typed webhook task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Creates a new random task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for TaskId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl sqlx::Type<PgDb> for TaskId {
    fn type_info() -> PgTypeInfo {
        <Uuid as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for TaskId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let uuid = <Uuid as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(uuid))
    }
}

impl sqlx::Encode<'_, PgDb> for TaskId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <Uuid as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// External platform an integration links to.
///
/// Only one platform is supported today; the variant exists so records carry
/// an explicit service tag and new providers slot in without a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationService {
    /// GitHub App installations.
    Github,
}

impl fmt::Display for IntegrationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Github => write!(f, "github"),
        }
    }
}

impl sqlx::Type<PgDb> for IntegrationService {
    fn type_info() -> PgTypeInfo {
        <str as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for IntegrationService {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <&str as sqlx::Decode<PgDb>>::decode(value)?;
        match s {
            "github" => Ok(Self::Github),
            _ => Err(format!("invalid integration service: {s}").into()),
        }
    }
}

impl sqlx::Encode<'_, PgDb> for IntegrationService {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <String as sqlx::Encode<PgDb>>::encode_by_ref(&self.to_string(), buf)
    }
}

/// Capability class of an integration.
///
/// Immutable after creation, like the service tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationType {
    /// Embed-capable: renders linked resources inline.
    Embed,
    /// Action-capable: executes commands against the platform.
    Command,
}

impl fmt::Display for IntegrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embed => write!(f, "embed"),
            Self::Command => write!(f, "command"),
        }
    }
}

impl sqlx::Type<PgDb> for IntegrationType {
    fn type_info() -> PgTypeInfo {
        <str as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for IntegrationType {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <&str as sqlx::Decode<PgDb>>::decode(value)?;
        match s {
            "embed" => Ok(Self::Embed),
            "command" => Ok(Self::Command),
            _ => Err(format!("invalid integration type: {s}").into()),
        }
    }
}

impl sqlx::Encode<'_, PgDb> for IntegrationType {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <String as sqlx::Encode<PgDb>>::encode_by_ref(&self.to_string(), buf)
    }
}

/// A workspace registered with the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Workspace {
    /// Unique identifier, carried in the OAuth `state` parameter.
    pub id: WorkspaceId,

    /// Human-readable workspace name.
    pub name: String,

    /// Base URL of the workspace host.
    ///
    /// Anonymous callbacks are redirected here so the workspace-local
    /// session can complete the flow.
    pub url: String,

    /// When this workspace was created.
    pub created_at: DateTime<Utc>,
}

/// Authenticated principal attached to a callback request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    /// User performing the link.
    pub user_id: UserId,
    /// Workspace the session belongs to.
    pub workspace_id: WorkspaceId,
}

/// Account summary stored inside integration settings.
///
/// Serialized with camelCase keys to match the persisted settings shape:
/// `{ installation: { id, account: { id, name, avatarUrl } } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    /// Platform-assigned account identifier.
    pub id: Option<i64>,
    /// Account login or display name.
    pub name: Option<String>,
    /// Avatar image URL.
    pub avatar_url: Option<String>,
}

/// Installation summary persisted with an integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationSummary {
    /// Platform installation identifier, stored as the string received in
    /// the callback query.
    pub id: String,
    /// Linked account behind the installation.
    pub account: AccountSummary,
}

/// Provider-specific settings blob attached to an integration.
///
/// Replaced wholesale on re-authorization; service and type never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationSettings {
    /// The selected installation at authorization time.
    pub installation: InstallationSummary,
}

/// A workspace's link to an externally installed App.
///
/// Created exactly once per successful authorization. Service and type are
/// immutable after creation; only the settings blob may be updated.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Integration {
    /// Unique identifier for this integration.
    pub id: IntegrationId,

    /// External platform this integration links to.
    pub service: IntegrationService,

    /// Capability class.
    pub integration_type: IntegrationType,

    /// Workspace that owns this integration.
    pub workspace_id: WorkspaceId,

    /// User who performed the authorization.
    pub user_id: UserId,

    /// Credential record backing this integration.
    pub authentication_id: AuthenticationId,

    /// Provider-specific settings.
    pub settings: sqlx::types::Json<IntegrationSettings>,

    /// When this integration was created.
    pub created_at: DateTime<Utc>,

    /// When settings were last replaced.
    pub updated_at: DateTime<Utc>,
}

impl Integration {
    /// Settings as a plain reference.
    pub fn settings(&self) -> &IntegrationSettings {
        &self.settings.0
    }
}

/// Credential material backing an integration.
///
/// Owned exclusively by its integration; deleting the integration removes
/// this record in the same transaction so no orphan references live
/// credentials.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IntegrationAuthentication {
    /// Unique identifier for this credential record.
    pub id: AuthenticationId,

    /// External platform the scopes apply to.
    pub service: IntegrationService,

    /// User who granted the scopes.
    pub user_id: UserId,

    /// Workspace the credentials are scoped to.
    pub workspace_id: WorkspaceId,

    /// Granted scopes, each formatted `resource:permission`.
    ///
    /// Entries are unique; ordering carries no meaning.
    pub scopes: Vec<String>,

    /// When this record was created.
    pub created_at: DateTime<Utc>,
}

/// Input for creating an authentication record.
#[derive(Debug, Clone)]
pub struct NewAuthentication {
    /// External platform the scopes apply to.
    pub service: IntegrationService,
    /// User who granted the scopes.
    pub user_id: UserId,
    /// Workspace the credentials are scoped to.
    pub workspace_id: WorkspaceId,
    /// Granted scopes in `resource:permission` format.
    pub scopes: Vec<String>,
}

/// Input for creating an integration.
///
/// The backing `authentication_id` is assigned by the store when the pair
/// is written in one transaction.
#[derive(Debug, Clone)]
pub struct NewIntegration {
    /// External platform this integration links to.
    pub service: IntegrationService,
    /// Capability class.
    pub integration_type: IntegrationType,
    /// Workspace that owns the integration.
    pub workspace_id: WorkspaceId,
    /// User who performed the authorization.
    pub user_id: UserId,
    /// Provider-specific settings.
    pub settings: IntegrationSettings,
}

/// Webhook task lifecycle status.
///
/// ```text
/// Pending -> Running -> Completed
///                    -> Pending (transient failure, retry scheduled)
///                    -> Failed (permanent failure, no retry)
///                    -> DeadLetter (retry budget exhausted)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Queued and waiting for a worker, or scheduled for retry.
    Pending,

    /// A worker has claimed the task.
    ///
    /// Prevents two executions of the same task instance running
    /// concurrently.
    Running,

    /// Processed successfully, or skipped as a duplicate delivery.
    Completed,

    /// Permanently failed; the payload could not be interpreted.
    Failed,

    /// Retry budget exhausted; held for manual inspection.
    DeadLetter,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::DeadLetter => write!(f, "dead_letter"),
        }
    }
}

impl sqlx::Type<PgDb> for TaskStatus {
    fn type_info() -> PgTypeInfo {
        <str as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for TaskStatus {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <&str as sqlx::Decode<PgDb>>::decode(value)?;
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "dead_letter" => Ok(Self::DeadLetter),
            _ => Err(format!("invalid task status: {s}").into()),
        }
    }
}

impl sqlx::Encode<'_, PgDb> for TaskStatus {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <String as sqlx::Encode<PgDb>>::encode_by_ref(&self.to_string(), buf)
    }
}

/// An immutable unit of webhook work.
///
/// Carries the raw request body and headers at the moment of receipt. No
/// fields of the payload are mutated after creation; provider redelivery
/// produces a new task with the same delivery id, so processing is
/// idempotent on that id.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WebhookTask {
    /// Unique identifier for this task instance.
    pub id: TaskId,

    /// Current lifecycle status.
    pub status: TaskStatus,

    /// Original HTTP headers from ingestion, lowercased names.
    pub headers: sqlx::types::Json<HashMap<String, String>>,

    /// Raw webhook payload bytes, exactly as signed by the sender.
    pub body: Vec<u8>,

    /// Size of the payload in bytes.
    pub payload_size: i32,

    /// Number of failed processing attempts so far.
    pub failure_count: i32,

    /// When the webhook was received.
    pub received_at: DateTime<Utc>,

    /// Timestamp of the most recent processing attempt.
    pub last_attempt_at: Option<DateTime<Utc>>,

    /// When to retry next after a transient failure.
    pub next_retry_at: Option<DateTime<Utc>>,

    /// When the task reached the completed state.
    pub completed_at: Option<DateTime<Utc>>,

    /// When the task reached a terminal failure state.
    pub failed_at: Option<DateTime<Utc>>,

    /// Most recent processing error, if any.
    pub last_error: Option<String>,
}

impl WebhookTask {
    /// Headers as a plain map.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers.0
    }

    /// Body as `Bytes` for zero-copy hand-off.
    pub fn body_bytes(&self) -> Bytes {
        Bytes::from(self.body.clone())
    }

    /// Looks up a header by its lowercased name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.0.get(name).map(String::as_str)
    }
}

/// Input for enqueueing a webhook task.
///
/// Built by the ingress endpoint after signature validation; the store
/// assigns the task id and received timestamp handling.
#[derive(Debug, Clone)]
pub struct NewWebhookTask {
    /// HTTP headers captured at receipt, lowercased names.
    pub headers: HashMap<String, String>,
    /// Raw body bytes exactly as received.
    pub body: Bytes,
    /// When the webhook was received.
    pub received_at: DateTime<Utc>,
}

impl NewWebhookTask {
    /// Creates a task input from captured request parts.
    pub fn new(headers: HashMap<String, String>, body: Bytes, received_at: DateTime<Utc>) -> Self {
        Self { headers, body, received_at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_display_matches_database_format() {
        assert_eq!(TaskStatus::Pending.to_string(), "pending");
        assert_eq!(TaskStatus::Running.to_string(), "running");
        assert_eq!(TaskStatus::Completed.to_string(), "completed");
        assert_eq!(TaskStatus::Failed.to_string(), "failed");
        assert_eq!(TaskStatus::DeadLetter.to_string(), "dead_letter");
    }

    #[test]
    fn settings_serialize_with_camel_case_account_keys() {
        let settings = IntegrationSettings {
            installation: InstallationSummary {
                id: "42".to_string(),
                account: AccountSummary {
                    id: Some(7),
                    name: Some("octocat".to_string()),
                    avatar_url: Some("https://example.com/a.png".to_string()),
                },
            },
        };

        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["installation"]["id"], "42");
        assert_eq!(json["installation"]["account"]["avatarUrl"], "https://example.com/a.png");
        assert_eq!(json["installation"]["account"]["name"], "octocat");
    }

    #[test]
    fn ids_do_not_collide() {
        assert_ne!(TaskId::new(), TaskId::new());
        assert_ne!(IntegrationId::new(), IntegrationId::new());
    }
}
