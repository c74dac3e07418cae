//! Configuration for receipts
//!
//! CLI arguments and environment variables via clap. A `.env` file is loaded
//! first by `main`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use clap::{Parser, ValueEnum};

use crate::access_code;
use crate::calendar::Calendar;
use crate::notify::EmailJsConfig;
use crate::store::nats::NatsKvConfig;

/// Administrative secret used when dev mode is on and none is set
const DEV_ADMIN_SECRET: &str = "dev-only-setup";

/// Where the shared document lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// NATS JetStream key-value bucket
    Nats,
    /// In-process only; lost on restart
    Memory,
}

/// receipts - birthday-gated reflections for a small circle of friends
#[derive(Parser, Debug, Clone)]
#[command(name = "receipts")]
#[command(about = "Birthday-gated reflections for a small circle of friends")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (fallback admin secret, memory store allowed)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Shared administrative secret (required in production)
    #[arg(long, env = "ADMIN_SECRET")]
    pub admin_secret: Option<String>,

    /// IANA timezone that decides what "today" is for everyone
    #[arg(long, env = "CLUB_TIMEZONE", default_value = "UTC")]
    pub club_timezone: String,

    /// Public URL included in every email
    #[arg(long, env = "SITE_URL", default_value = "http://localhost:8080")]
    pub site_url: String,

    /// Document store backend
    #[arg(long, env = "STORE_BACKEND", value_enum, default_value = "nats")]
    pub store_backend: StoreBackend,

    /// Seconds between reminder checks
    #[arg(long, env = "REMINDER_INTERVAL_SECS", default_value = "3600")]
    pub reminder_interval_secs: u64,

    /// Seconds a login stays valid
    #[arg(long, env = "SESSION_TTL_SECS", default_value = "86400")]
    pub session_ttl_secs: u64,

    /// Directory of static files served at `/`
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// NATS configuration
    #[command(flatten)]
    pub nats: NatsArgs,

    /// EmailJS configuration
    #[command(flatten)]
    pub email: EmailArgs,
}

#[derive(clap::Args, Debug, Clone)]
pub struct NatsArgs {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// NATS username (optional)
    #[arg(long, env = "NATS_USER")]
    pub nats_user: Option<String>,

    /// NATS password (optional)
    #[arg(long, env = "NATS_PASSWORD")]
    pub nats_password: Option<String>,

    /// Key-value bucket holding the shared document
    #[arg(long, env = "NATS_BUCKET", default_value = "club-data")]
    pub nats_bucket: String,

    /// Key of the shared document within the bucket
    #[arg(long, env = "NATS_KEY", default_value = "main")]
    pub nats_key: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct EmailArgs {
    /// EmailJS API base URL
    #[arg(long, env = "EMAILJS_URL", default_value = "https://api.emailjs.com")]
    pub emailjs_url: String,

    /// EmailJS public key
    #[arg(long, env = "EMAILJS_PUBLIC_KEY")]
    pub emailjs_public_key: Option<String>,

    /// EmailJS private key (optional, for strict mode accounts)
    #[arg(long, env = "EMAILJS_PRIVATE_KEY")]
    pub emailjs_private_key: Option<String>,

    /// EmailJS service id
    #[arg(long, env = "EMAILJS_SERVICE_ID")]
    pub emailjs_service_id: Option<String>,

    /// Template for anniversary reminders
    #[arg(long, env = "EMAILJS_REMINDER_TEMPLATE", default_value = "birthday_reminder")]
    pub emailjs_reminder_template: String,

    /// Template for new reflection notices
    #[arg(long, env = "EMAILJS_NEW_REFLECTION_TEMPLATE", default_value = "new_reflection")]
    pub emailjs_new_reflection_template: String,

    /// Request timeout in milliseconds
    #[arg(long, env = "EMAILJS_TIMEOUT_MS", default_value = "10000")]
    pub emailjs_timeout_ms: u64,
}

impl Args {
    /// Effective admin secret (uses a default in dev mode)
    pub fn admin_secret(&self) -> Option<String> {
        match (&self.admin_secret, self.dev_mode) {
            (Some(secret), _) => Some(secret.clone()),
            (None, true) => Some(DEV_ADMIN_SECRET.to_string()),
            (None, false) => None,
        }
    }

    pub fn timezone(&self) -> Result<Tz, String> {
        self.club_timezone
            .parse::<Tz>()
            .map_err(|e| format!("CLUB_TIMEZONE is not a known timezone: {}", e))
    }

    pub fn calendar(&self) -> Result<Calendar, String> {
        self.timezone().map(Calendar::new)
    }

    pub fn reminder_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_interval_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn nats_config(&self) -> NatsKvConfig {
        NatsKvConfig {
            url: self.nats.nats_url.clone(),
            user: self.nats.nats_user.clone(),
            password: self.nats.nats_password.clone(),
            bucket: self.nats.nats_bucket.clone(),
            key: self.nats.nats_key.clone(),
        }
    }

    /// EmailJS settings, if a service id and public key are both set
    pub fn emailjs_config(&self) -> Option<EmailJsConfig> {
        let email = &self.email;
        match (&email.emailjs_service_id, &email.emailjs_public_key) {
            (Some(service_id), Some(public_key)) => Some(EmailJsConfig {
                base_url: email.emailjs_url.clone(),
                service_id: service_id.clone(),
                public_key: public_key.clone(),
                private_key: email.emailjs_private_key.clone(),
                reminder_template: email.emailjs_reminder_template.clone(),
                new_reflection_template: email.emailjs_new_reflection_template.clone(),
                timeout: Duration::from_millis(email.emailjs_timeout_ms),
            }),
            _ => None,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        match self.admin_secret() {
            None => return Err("ADMIN_SECRET is required in production mode".to_string()),
            Some(secret) if access_code::canonical(&secret).is_empty() => {
                return Err("ADMIN_SECRET must not be blank".to_string());
            }
            Some(_) => {}
        }

        self.timezone()?;

        if self.reminder_interval_secs == 0 {
            return Err("REMINDER_INTERVAL_SECS must be greater than zero".to_string());
        }

        if self.session_ttl_secs == 0 {
            return Err("SESSION_TTL_SECS must be greater than zero".to_string());
        }

        if self.email.emailjs_service_id.is_some() != self.email.emailjs_public_key.is_some() {
            return Err(
                "EMAILJS_SERVICE_ID and EMAILJS_PUBLIC_KEY must be set together".to_string(),
            );
        }

        if !self.dev_mode && self.store_backend == StoreBackend::Memory {
            return Err("STORE_BACKEND=memory is only allowed in dev mode".to_string());
        }

        Ok(())
    }
}
