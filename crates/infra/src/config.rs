//! Configuration consumed by the access workflow.

use accessgate_access::NotificationSettings;
use accessgate_core::Email;

pub const DEFAULT_APP_URL: &str = "http://localhost:3000";
pub const DEFAULT_MAIL_FROM: &str = "Access Gate <onboarding@localhost>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessConfig {
    /// Lower-cased domains allowed to submit requests. Empty allows all.
    pub allowed_email_domains: Vec<String>,
    pub admin_notify_email: Option<Email>,
    /// Base URL for links, without trailing slash.
    pub app_url: String,
    pub mail_from: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            allowed_email_domains: Vec::new(),
            admin_notify_email: None,
            app_url: DEFAULT_APP_URL.to_string(),
            mail_from: DEFAULT_MAIL_FROM.to_string(),
        }
    }
}

impl AccessConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let allowed_email_domains = get("ACCESS_REQUEST_ALLOWED_EMAIL_DOMAINS")
            .map(|raw| parse_domain_list(&raw))
            .unwrap_or_default();

        let admin_notify_email = get("ADMIN_NOTIFY_EMAIL").and_then(|raw| match Email::parse(&raw) {
            Ok(email) => Some(email),
            Err(e) => {
                tracing::warn!(error = %e, "ADMIN_NOTIFY_EMAIL is invalid; admin alerts disabled");
                None
            }
        });

        let app_url = get("APP_URL")
            .or_else(|| get("NEXTAUTH_URL"))
            .unwrap_or_else(|| {
                tracing::warn!("APP_URL not set; using {DEFAULT_APP_URL} for links");
                DEFAULT_APP_URL.to_string()
            })
            .trim_end_matches('/')
            .to_string();

        let mail_from = get("MAIL_FROM").unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string());

        Self {
            allowed_email_domains,
            admin_notify_email,
            app_url,
            mail_from,
        }
    }

    pub fn notification_settings(&self) -> NotificationSettings {
        NotificationSettings::new(self.app_url.clone(), self.admin_notify_email.clone())
    }
}

fn parse_domain_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}
