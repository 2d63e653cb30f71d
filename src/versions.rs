// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! API server version poll across contexts
//!
//! Every context is queried concurrently with its own timeout. Results are
//! grouped by environment using the mapping file; contexts the mapping does
//! not mention land in `none`, failures in `unreachable`.

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::EnvironmentMap;
use crate::progress::PollProgress;

/// Default per-context query timeout
pub const DEFAULT_VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Section for contexts no environment lists
const UNCLASSIFIED: &str = "none";

const CONTEXT_WIDTH: usize = 25;

#[async_trait]
pub trait VersionSource: Send + Sync {
    /// Server `gitVersion` of one context
    async fn server_version(&self, context: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionOutcome {
    Version(String),
    Unreachable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextVersion {
    pub context: String,
    pub outcome: VersionOutcome,
}

/// Query every context concurrently; results keep the order of `contexts`
pub async fn poll_versions<S: VersionSource + ?Sized>(
    source: &S,
    contexts: &[String],
    timeout: Duration,
    progress: &PollProgress,
) -> Vec<ContextVersion> {
    let queries = contexts.iter().map(|context| async move {
        let outcome = match tokio::time::timeout(timeout, source.server_version(context)).await {
            Ok(Ok(version)) => {
                debug!(context = %context, version = %version, "Version received");
                VersionOutcome::Version(version)
            }
            Ok(Err(e)) => {
                warn!(context = %context, error = %format!("{:#}", e), "Version query failed");
                VersionOutcome::Unreachable(format!("{:#}", e))
            }
            Err(_) => {
                warn!(context = %context, timeout_secs = timeout.as_secs(), "Version query timed out");
                VersionOutcome::Unreachable(format!("timed out after {}s", timeout.as_secs()))
            }
        };
        progress.context_done(context);
        ContextVersion {
            context: context.clone(),
            outcome,
        }
    });

    join_all(queries).await
}

/// Poll results grouped by environment
#[derive(Debug, Default)]
pub struct VersionReport {
    unclassified: Vec<(String, String)>,
    environments: BTreeMap<String, Vec<(String, String)>>,
    unreachable: Vec<(String, String)>,
}

impl VersionReport {
    pub fn build(results: Vec<ContextVersion>, envs: &EnvironmentMap) -> Self {
        let mut report = Self::default();
        for result in results {
            match result.outcome {
                VersionOutcome::Version(version) => match envs.environment_for(&result.context) {
                    Some(env) => report
                        .environments
                        .entry(env.to_string())
                        .or_default()
                        .push((result.context, version)),
                    None => report.unclassified.push((result.context, version)),
                },
                VersionOutcome::Unreachable(reason) => {
                    report.unreachable.push((result.context, reason))
                }
            }
        }
        report
    }

    pub fn unreachable_count(&self) -> usize {
        self.unreachable.len()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        let sections = (!self.unclassified.is_empty())
            .then_some((UNCLASSIFIED, &self.unclassified))
            .into_iter()
            .chain(self.environments.iter().map(|(env, rows)| (env.as_str(), rows)));

        for (env, rows) in sections {
            out.push_str(&format!("--- environment: {} ---\n", env));
            for (context, version) in rows {
                out.push_str(&format!(
                    "cluster : {:width$} version : {}\n",
                    context,
                    version,
                    width = CONTEXT_WIDTH
                ));
            }
        }

        if !self.unreachable.is_empty() {
            out.push_str("--- unreachable ---\n");
            for (context, reason) in &self.unreachable {
                out.push_str(&format!(
                    "cluster : {:width$} error : {}\n",
                    context,
                    reason,
                    width = CONTEXT_WIDTH
                ));
            }
        }

        out
    }
}
