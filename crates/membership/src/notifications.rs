//! Account notifications
//!
//! The reconciler only decides *that* an account must be told about a
//! change. Rendering and delivery belong to the notification service, which
//! receives a template key plus variables.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{EnforcementError, EnforcementResult};

/// Template sent after an account is moved from PREMIUM to BASIC
pub const DOWNGRADE_CONFIRMATION_TEMPLATE: &str = "downgrade-confirmation";

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

pub type TemplateVariables = BTreeMap<String, String>;

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(
        &self,
        account_id: Uuid,
        template_key: &str,
        variables: &TemplateVariables,
    ) -> EnforcementResult<()>;
}

/// Variables for the downgrade confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DowngradeNotice {
    pub email: String,
    pub display_name: Option<String>,
    pub studio_name: Option<String>,
}

impl DowngradeNotice {
    /// Optional fields are only present in the map when set
    pub fn variables(&self) -> TemplateVariables {
        let mut vars = TemplateVariables::new();
        vars.insert("email".to_string(), self.email.clone());
        if let Some(name) = &self.display_name {
            vars.insert("display_name".to_string(), name.clone());
        }
        if let Some(studio) = &self.studio_name {
            vars.insert("studio_name".to_string(), studio.clone());
        }
        vars
    }
}

#[derive(Serialize)]
struct NotificationPayload<'a> {
    account_id: Uuid,
    template: &'a str,
    variables: &'a TemplateVariables,
}

/// Posts notifications as JSON to the notification service
#[derive(Clone)]
pub struct WebhookNotificationSender {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl WebhookNotificationSender {
    pub fn new(url: impl Into<String>, token: Option<String>) -> EnforcementResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| EnforcementError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            token,
        })
    }
}

#[async_trait]
impl NotificationSender for WebhookNotificationSender {
    async fn send(
        &self,
        account_id: Uuid,
        template_key: &str,
        variables: &TemplateVariables,
    ) -> EnforcementResult<()> {
        let payload = NotificationPayload {
            account_id,
            template: template_key,
            variables,
        };

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        request.send().await?.error_for_status()?;

        tracing::debug!(
            account_id = %account_id,
            template = template_key,
            "Notification delivered"
        );
        Ok(())
    }
}

/// Logs instead of sending; used when no notification service is configured
#[derive(Debug, Clone, Default)]
pub struct LogNotificationSender;

#[async_trait]
impl NotificationSender for LogNotificationSender {
    async fn send(
        &self,
        account_id: Uuid,
        template_key: &str,
        variables: &TemplateVariables,
    ) -> EnforcementResult<()> {
        tracing::info!(
            account_id = %account_id,
            template = template_key,
            variables = ?variables,
            "Notification not sent (no notification service configured)"
        );
        Ok(())
    }
}
