//! Background delivery of registry side effects
//!
//! A single task subscribes to the event bus and performs notification
//! delivery and redirect rule publishing. Failures are logged; they never
//! reach the request that produced the event.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vocab_common::config::SiteConfig;
use vocab_common::events::{EventBus, VocabEvent};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Notification delivery failed: {0}")]
    Notification(#[from] reqwest::Error),

    #[error("Notification rejected with status {0}")]
    NotificationStatus(reqwest::StatusCode),

    #[error("Failed to update {path}: {source}")]
    Rules {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Payload posted to the notification webhook
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub kind: &'static str,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted: Option<bool>,
}

pub struct TaskRunner {
    client: reqwest::Client,
    webhook: Option<String>,
    rules_file: PathBuf,
}

impl TaskRunner {
    pub fn new(webhook: Option<String>, rules_file: PathBuf) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook,
            rules_file,
        }
    }

    pub fn from_config(config: &SiteConfig) -> Self {
        Self::new(
            config.notification_webhook.clone(),
            config.redirect.rules_file.clone(),
        )
    }

    /// Subscribe now and consume events on a background task
    ///
    /// Events dispatched after this returns are guaranteed to be seen.
    pub fn spawn(self, event_bus: &EventBus) -> JoinHandle<()> {
        let rx = event_bus.subscribe();
        tokio::spawn(self.run(rx))
    }

    async fn run(self, mut rx: broadcast::Receiver<VocabEvent>) {
        debug!("Task runner started");

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let event_type = event.event_type();
                    if let Err(e) = self.handle(event).await {
                        error!(event_type, "Side effect failed: {}", e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Task runner lagged, {} events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, task runner stopping");
                    break;
                }
            }
        }
    }

    pub async fn handle(&self, event: VocabEvent) -> Result<(), TaskError> {
        match event {
            VocabEvent::IriCreated { address, .. } => {
                self.notify(Notification {
                    kind: "iri_created",
                    address,
                    recipient: None,
                    accepted: None,
                })
                .await
            }
            VocabEvent::ReviewDecided {
                address,
                recipient_email,
                accepted,
                ..
            } => {
                self.notify(Notification {
                    kind: "review_decided",
                    address,
                    recipient: recipient_email,
                    accepted: Some(accepted),
                })
                .await
            }
            VocabEvent::RedirectRequested {
                title,
                vocabulary_path,
                jsonld_target,
                html_target,
                ..
            } => {
                let rule = redirect_rule(&title, &vocabulary_path, &jsonld_target, &html_target);
                if append_rule_once(&self.rules_file, &vocabulary_path, &rule).await? {
                    info!(vocabulary_path = %vocabulary_path, "Redirect rule published");
                } else {
                    debug!(vocabulary_path = %vocabulary_path, "Redirect rule already present");
                }
                Ok(())
            }
        }
    }

    async fn notify(&self, notification: Notification) -> Result<(), TaskError> {
        let Some(webhook) = &self.webhook else {
            info!(
                kind = notification.kind,
                address = %notification.address,
                recipient = ?notification.recipient,
                accepted = ?notification.accepted,
                "Notification (no webhook configured)"
            );
            return Ok(());
        };

        let response = self.client.post(webhook).json(&notification).send().await?;
        if !response.status().is_success() {
            return Err(TaskError::NotificationStatus(response.status()));
        }

        debug!(kind = notification.kind, address = %notification.address, "Notification delivered");
        Ok(())
    }
}

fn rule_marker(vocabulary_path: &str) -> String {
    format!("# vocab: {}", vocabulary_path)
}

/// Apache rewrite block sending JSON-LD and HTML requests for a vocabulary
/// to their targets
pub fn redirect_rule(title: &str, vocabulary_path: &str, jsonld_target: &str, html_target: &str) -> String {
    format!(
        "{marker}\n\
         # {title}\n\
         RewriteCond %{{HTTP_ACCEPT}} application/ld\\+json\n\
         RewriteRule ^{path}(/.*)?$ {jsonld} [R=303,L]\n\
         RewriteCond %{{HTTP_ACCEPT}} text/html\n\
         RewriteRule ^{path}(/.*)?$ {html} [R=303,L]\n",
        marker = rule_marker(vocabulary_path),
        title = title,
        path = vocabulary_path,
        jsonld = jsonld_target,
        html = html_target,
    )
}

/// Append the rule unless the file already holds one for this path
///
/// Returns whether anything was written.
pub async fn append_rule_once(path: &Path, vocabulary_path: &str, rule: &str) -> Result<bool, TaskError> {
    let rules_error = |source| TaskError::Rules {
        path: path.to_path_buf(),
        source,
    };

    let existing = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(rules_error(e)),
    };

    let marker = rule_marker(vocabulary_path);
    if existing.lines().any(|line| line == marker) {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(rules_error)?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(rules_error)?;

    let mut block = String::new();
    if !existing.is_empty() && !existing.ends_with('\n') {
        block.push('\n');
    }
    block.push_str(rule);

    file.write_all(block.as_bytes()).await.map_err(rules_error)?;
    file.flush().await.map_err(rules_error)?;

    Ok(true)
}
