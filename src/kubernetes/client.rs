// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use anyhow::{Context as _, Result};
use async_stream::stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::Event as CoreEvent;
use kube::api::{WatchEvent, WatchParams};
use kube::core::ErrorResponse;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::WatchError;
use crate::events::{EventSource, RawEvent, RawEventStream};
use crate::versions::VersionSource;

/// Timeout for connecting to K8s API
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The API server rejects watch timeouts of 295s and above
const MAX_SERVER_WATCH_TIMEOUT_SECS: u32 = 290;

/// Read timeout for one-shot version queries
const VERSION_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Kubeconfig contexts, discovered once at startup.
///
/// Context names are shown in their short form (text before the first `.`),
/// de-duplicated in kubeconfig order.
pub struct KubeContexts {
    kubeconfig: Kubeconfig,
    short_names: Vec<String>,
}

impl KubeContexts {
    pub fn discover() -> Result<Self> {
        let kubeconfig = Kubeconfig::read().context("Failed to read kubeconfig")?;
        Ok(Self::from_kubeconfig(kubeconfig))
    }

    pub fn from_kubeconfig(kubeconfig: Kubeconfig) -> Self {
        let mut short_names: Vec<String> = Vec::new();
        for ctx in &kubeconfig.contexts {
            let short = short_context_name(&ctx.name);
            if !short_names.iter().any(|s| s == short) {
                short_names.push(short.to_string());
            }
        }
        Self {
            kubeconfig,
            short_names,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.short_names
    }

    /// Short name of kubeconfig's current-context
    pub fn current(&self) -> Option<String> {
        self.kubeconfig
            .current_context
            .as_deref()
            .map(|c| short_context_name(c).to_string())
    }

    /// Kubeconfig context behind a short (or full) name
    pub fn full_name(&self, name: &str) -> Option<&str> {
        let contexts = &self.kubeconfig.contexts;
        contexts
            .iter()
            .find(|c| c.name == name)
            .or_else(|| contexts.iter().find(|c| short_context_name(&c.name) == name))
            .map(|c| c.name.as_str())
    }

    async fn client(&self, name: &str, read_timeout: Duration) -> Result<Client, WatchError> {
        let full = self
            .full_name(name)
            .ok_or_else(|| WatchError::setup(name, "context not found in kubeconfig"))?;

        let mut config = Config::from_custom_kubeconfig(
            self.kubeconfig.clone(),
            &KubeConfigOptions {
                context: Some(full.to_string()),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| WatchError::setup(name, format!("failed to load kubeconfig: {}", e)))?;

        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(read_timeout);

        debug!(context = %name, kubeconfig_context = %full, cluster_url = %config.cluster_url, "Creating client");

        Client::try_from(config)
            .map_err(|e| WatchError::setup(name, format!("failed to create client: {}", e)))
    }

    /// Session for watching events on one context.
    ///
    /// The client read timeout matches the watch liveness bound so an idle
    /// connection is torn down rather than hanging.
    pub async fn event_session(&self, name: &str, watch_timeout: Duration) -> Result<KubeEventSource, WatchError> {
        let client = self.client(name, watch_timeout).await?;
        Ok(KubeEventSource {
            client,
            context: name.to_string(),
        })
    }
}

#[async_trait]
impl VersionSource for KubeContexts {
    async fn server_version(&self, context: &str) -> Result<String> {
        let client = self.client(context, VERSION_READ_TIMEOUT).await?;
        let info = client
            .apiserver_version()
            .await
            .with_context(|| format!("Failed to query version of '{}'", context))?;
        Ok(info.git_version)
    }
}

pub fn short_context_name(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// Events in all namespaces of one cluster
pub struct KubeEventSource {
    client: Client,
    context: String,
}

#[async_trait]
impl EventSource for KubeEventSource {
    fn context(&self) -> &str {
        &self.context
    }

    async fn open_watch(
        &self,
        timeout: Duration,
        resume_from: Option<&str>,
    ) -> Result<RawEventStream, WatchError> {
        let api: Api<CoreEvent> = Api::all(self.client.clone());
        let secs = u32::try_from(timeout.as_secs())
            .unwrap_or(u32::MAX)
            .clamp(1, MAX_SERVER_WATCH_TIMEOUT_SECS);
        let params = WatchParams::default().timeout(secs);

        // "0": start from the server's cache; repeats are removed by dedup
        let version = resume_from.unwrap_or("0");
        let events = api.watch(&params, version).await.map_err(|e| match e {
            kube::Error::Api(status) => classify_status(&self.context, &status),
            other => WatchError::setup(&self.context, other),
        })?;

        debug!(context = %self.context, timeout_secs = secs, resume_from = %version, "Watch connection open");

        Ok(adapt_watch(events, self.context.clone()))
    }
}

/// Turn kube watch notifications into raw events.
///
/// The first error ends the stream. The HTTP status of the watch request is
/// not checked by the client, so a rejected watch shows up here as an
/// `Api` error item.
fn adapt_watch<S>(events: S, context: String) -> RawEventStream
where
    S: Stream<Item = kube::Result<WatchEvent<CoreEvent>>> + Send + 'static,
{
    let raw = stream! {
        let mut events = Box::pin(events);
        while let Some(item) = events.next().await {
            match item {
                Ok(WatchEvent::Added(ev))
                | Ok(WatchEvent::Modified(ev))
                | Ok(WatchEvent::Deleted(ev)) => yield Ok(raw_event(&ev)),
                Ok(WatchEvent::Bookmark(_)) => trace!("Watch bookmark"),
                Ok(WatchEvent::Error(status)) | Err(kube::Error::Api(status)) => {
                    yield Err(classify_status(&context, &status));
                    break;
                }
                Err(e) => {
                    yield Err(WatchError::Transport(e.to_string()));
                    break;
                }
            }
        }
    };
    raw.boxed()
}

/// Auth and missing-resource answers mean the watch cannot work at all; 410
/// means the resume point is gone; anything else is worth a reconnect
fn classify_status(context: &str, status: &ErrorResponse) -> WatchError {
    let detail = format!("{} ({}: {})", status.message, status.code, status.reason);
    match status.code {
        401 | 403 | 404 => WatchError::setup(context, detail),
        410 => WatchError::Expired(detail),
        _ => WatchError::Transport(detail),
    }
}

fn raw_event(ev: &CoreEvent) -> RawEvent {
    RawEvent {
        uid: ev.metadata.uid.clone(),
        resource_version: ev.metadata.resource_version.clone(),
        created_at: ev.metadata.creation_timestamp.as_ref().map(|t| t.0),
        namespace: ev.metadata.namespace.clone(),
        name: ev.metadata.name.clone(),
        involved_kind: ev.involved_object.kind.clone(),
        event_type: ev.type_.clone(),
        reason: ev.reason.clone(),
        message: ev.message.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
    use futures::stream;
    use k8s_openapi::api::core::v1::ObjectReference;
    use serde_json::json;

    const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
current-context: staging.eu-west-1.example.com
clusters:
- name: c1
  cluster:
    server: https://127.0.0.1:6443
users:
- name: u1
  user:
    token: abc
contexts:
- name: prod.us-east-1.example.com
  context: {cluster: c1, user: u1}
- name: staging.eu-west-1.example.com
  context: {cluster: c1, user: u1}
- name: prod.us-west-2.example.com
  context: {cluster: c1, user: u1}
- name: dev
  context: {cluster: c1, user: u1}
"#;

    fn contexts() -> KubeContexts {
        KubeContexts::from_kubeconfig(Kubeconfig::from_yaml(KUBECONFIG).unwrap())
    }

    #[test]
    fn test_short_names_deduplicated_in_order() {
        let ctx = contexts();
        assert_eq!(ctx.names(), &["prod", "staging", "dev"]);
    }

    #[test]
    fn test_current_context_is_short() {
        assert_eq!(contexts().current().as_deref(), Some("staging"));
    }

    #[test]
    fn test_full_name_resolution() {
        let ctx = contexts();
        assert_eq!(ctx.full_name("prod"), Some("prod.us-east-1.example.com"));
        assert_eq!(
            ctx.full_name("prod.us-west-2.example.com"),
            Some("prod.us-west-2.example.com")
        );
        assert_eq!(ctx.full_name("dev"), Some("dev"));
        assert_eq!(ctx.full_name("qa"), None);
    }

    #[tokio::test]
    async fn test_unknown_context_is_setup_error() {
        let ctx = contexts();
        let err = ctx.event_session("qa", Duration::from_secs(300)).await.err().unwrap();
        assert!(matches!(err, WatchError::ConnectionSetup { .. }));
    }

    #[test]
    fn test_raw_event_from_core_event() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap();
        let ev = CoreEvent {
            metadata: ObjectMeta {
                name: Some("pod-a-123.17b8c0f1a2".to_string()),
                namespace: Some("default".to_string()),
                uid: Some("u-1".to_string()),
                creation_timestamp: Some(Time(ts)),
                ..Default::default()
            },
            involved_object: ObjectReference {
                kind: Some("Pod".to_string()),
                ..Default::default()
            },
            type_: Some("Warning".to_string()),
            reason: Some("OOMKilling".to_string()),
            message: Some("(oom) killed".to_string()),
            ..Default::default()
        };

        let raw = raw_event(&ev);
        assert_eq!(raw.created_at, Some(ts));
        assert_eq!(raw.involved_kind.as_deref(), Some("Pod"));
        assert_eq!(raw.name.as_deref(), Some("pod-a-123.17b8c0f1a2"));
        assert_eq!(raw.event_type.as_deref(), Some("Warning"));
        assert_eq!(raw.uid.as_deref(), Some("u-1"));
    }

    fn notification(kind: &str, object: serde_json::Value) -> kube::Result<WatchEvent<CoreEvent>> {
        Ok(serde_json::from_value(json!({ "type": kind, "object": object })).unwrap())
    }

    fn event_object(name: &str, version: &str) -> serde_json::Value {
        json!({
            "apiVersion": "v1",
            "kind": "Event",
            "metadata": {
                "name": format!("{}.17b8c0f1a2", name),
                "namespace": "default",
                "resourceVersion": version,
                "creationTimestamp": "2024-03-01T12:30:45Z"
            },
            "involvedObject": { "kind": "Pod" },
            "type": "Warning",
            "reason": "BackOff",
            "message": "Back-off restarting failed container"
        })
    }

    fn status(code: u16, reason: &str, message: &str) -> ErrorResponse {
        ErrorResponse {
            status: "Failure".to_string(),
            message: message.to_string(),
            reason: reason.to_string(),
            code,
        }
    }

    async fn adapt(
        items: Vec<kube::Result<WatchEvent<CoreEvent>>>,
    ) -> Vec<Result<RawEvent, WatchError>> {
        adapt_watch(stream::iter(items), "staging".to_string())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_adapter_maps_notifications_and_skips_bookmarks() {
        let bookmark = json!({
            "apiVersion": "v1",
            "kind": "Event",
            "metadata": { "resourceVersion": "41" }
        });
        let items = adapt(vec![
            notification("BOOKMARK", bookmark),
            notification("ADDED", event_object("pod-a", "42")),
            notification("MODIFIED", event_object("pod-b", "43")),
            notification("DELETED", event_object("pod-c", "44")),
        ])
        .await;

        let versions: Vec<String> = items
            .into_iter()
            .map(|item| item.unwrap().resource_version.unwrap())
            .collect();
        assert_eq!(versions, vec!["42", "43", "44"]);
    }

    #[tokio::test]
    async fn test_adapter_in_stream_gone_is_expired_and_ends_connection() {
        let gone = json!({
            "status": "Failure",
            "message": "too old resource version: 12 (40)",
            "reason": "Expired",
            "code": 410
        });
        let items = adapt(vec![
            notification("ADDED", event_object("pod-a", "42")),
            notification("ERROR", gone),
            notification("ADDED", event_object("pod-b", "43")),
        ])
        .await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(&items[1], Err(WatchError::Expired(d)) if d.contains("410")));
    }

    #[tokio::test]
    async fn test_adapter_rejection_is_setup_class() {
        let items = adapt(vec![
            Err(kube::Error::Api(status(401, "Unauthorized", "Unauthorized"))),
            notification("ADDED", event_object("pod-a", "42")),
        ])
        .await;

        assert_eq!(items.len(), 1);
        match &items[0] {
            Err(WatchError::ConnectionSetup { context, reason }) => {
                assert_eq!(context, "staging");
                assert!(reason.contains("401"));
            }
            other => panic!("expected setup error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_adapter_stream_error_is_transport_and_ends_connection() {
        let items = adapt(vec![
            notification("ADDED", event_object("pod-a", "42")),
            Err(kube::Error::Service(Box::new(std::io::Error::other(
                "connection reset by peer",
            )))),
            notification("ADDED", event_object("pod-b", "43")),
        ])
        .await;

        assert_eq!(items.len(), 2);
        assert!(matches!(&items[1], Err(WatchError::Transport(m)) if m.contains("connection reset")));
    }

    #[test]
    fn test_status_classification() {
        for code in [401, 403, 404] {
            assert!(matches!(
                classify_status("prod", &status(code, "Forbidden", "denied")),
                WatchError::ConnectionSetup { .. }
            ));
        }
        assert!(matches!(
            classify_status("prod", &status(410, "Expired", "gone")),
            WatchError::Expired(_)
        ));
        assert!(matches!(
            classify_status("prod", &status(500, "InternalError", "etcd timeout")),
            WatchError::Transport(_)
        ));
    }
}
