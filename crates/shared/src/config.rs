//! Application configuration management.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtSettings,
    /// Outbound email configuration.
    #[serde(default)]
    pub email: EmailConfig,
    /// Approval path rules.
    #[serde(default)]
    pub approval: ApprovalConfig,
    /// SLA enforcement scheduling.
    #[serde(default)]
    pub sla: SlaConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// JWT settings as read from configuration sources.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key for verifying tokens.
    pub secret: String,
    /// Access token expiration in seconds.
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

/// SMTP settings for approval notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// When false, notifications are logged instead of sent.
    #[serde(default)]
    pub enabled: bool,
    /// SMTP relay host.
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    /// SMTP relay port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP username.
    #[serde(default)]
    pub smtp_username: String,
    /// SMTP password.
    #[serde(default)]
    pub smtp_password: String,
    /// Sender address.
    #[serde(default = "default_from_email")]
    pub from_email: String,
    /// Sender display name.
    #[serde(default = "default_from_name")]
    pub from_name: String,
    /// Base URL of the web app, used for deep links in messages.
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    1025
}

fn default_from_email() -> String {
    "approvals@quoteflow.local".to_string()
}

fn default_from_name() -> String {
    "Quoteflow Approvals".to_string()
}

fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_email: default_from_email(),
            from_name: default_from_name(),
            frontend_url: default_frontend_url(),
        }
    }
}

/// Thresholds and SLA durations that shape an approval path.
///
/// Level 1 (sales) is always required. Procurement and management levels
/// are added when a pricing run crosses the thresholds below.
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalConfig {
    /// Total price at or above which procurement must approve.
    #[serde(default = "default_procurement_threshold")]
    pub procurement_value_threshold: Decimal,
    /// Total price at or above which management must approve.
    #[serde(default = "default_management_threshold")]
    pub management_value_threshold: Decimal,
    /// Margin (fraction, 0.10 = 10%) below which management must approve.
    #[serde(default = "default_minimum_margin")]
    pub minimum_margin: Decimal,
    /// Project types that always require procurement.
    #[serde(default = "default_procurement_project_types")]
    pub procurement_project_types: Vec<String>,
    /// Project types that always require management.
    #[serde(default = "default_management_project_types")]
    pub management_project_types: Vec<String>,
    /// SLA for the sales level, in hours.
    #[serde(default = "default_sales_sla_hours")]
    pub sales_sla_hours: i64,
    /// SLA for the procurement level, in hours.
    #[serde(default = "default_procurement_sla_hours")]
    pub procurement_sla_hours: i64,
    /// SLA for the management level, in hours.
    #[serde(default = "default_management_sla_hours")]
    pub management_sla_hours: i64,
    /// Roles notified when a sales level misses its SLA.
    #[serde(default = "default_manager_escalation")]
    pub sales_escalation_roles: Vec<String>,
    /// Roles notified when a procurement level misses its SLA.
    #[serde(default = "default_manager_escalation")]
    pub procurement_escalation_roles: Vec<String>,
    /// Roles notified when a management level misses its SLA.
    #[serde(default = "default_admin_escalation")]
    pub management_escalation_roles: Vec<String>,
}

fn default_procurement_threshold() -> Decimal {
    Decimal::new(50_000, 0)
}

fn default_management_threshold() -> Decimal {
    Decimal::new(250_000, 0)
}

fn default_minimum_margin() -> Decimal {
    Decimal::new(10, 2)
}

fn default_procurement_project_types() -> Vec<String> {
    vec!["turnkey".to_string(), "framework".to_string()]
}

fn default_management_project_types() -> Vec<String> {
    vec!["strategic".to_string()]
}

fn default_sales_sla_hours() -> i64 {
    24
}

fn default_procurement_sla_hours() -> i64 {
    48
}

fn default_management_sla_hours() -> i64 {
    72
}

fn default_manager_escalation() -> Vec<String> {
    vec!["manager".to_string()]
}

fn default_admin_escalation() -> Vec<String> {
    vec!["admin".to_string()]
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            procurement_value_threshold: default_procurement_threshold(),
            management_value_threshold: default_management_threshold(),
            minimum_margin: default_minimum_margin(),
            procurement_project_types: default_procurement_project_types(),
            management_project_types: default_management_project_types(),
            sales_sla_hours: default_sales_sla_hours(),
            procurement_sla_hours: default_procurement_sla_hours(),
            management_sla_hours: default_management_sla_hours(),
            sales_escalation_roles: default_manager_escalation(),
            procurement_escalation_roles: default_manager_escalation(),
            management_escalation_roles: default_admin_escalation(),
        }
    }
}

/// SLA enforcement scheduling.
#[derive(Debug, Clone, Deserialize)]
pub struct SlaConfig {
    /// Whether the server runs the periodic sweep.
    #[serde(default = "default_sla_enabled")]
    pub enabled: bool,
    /// Minutes between sweeps.
    #[serde(default = "default_sla_interval_minutes")]
    pub interval_minutes: u64,
    /// Hours granted to a backup approver. `None` reuses the level SLA.
    #[serde(default)]
    pub backup_extension_hours: Option<i64>,
}

fn default_sla_enabled() -> bool {
    true
}

fn default_sla_interval_minutes() -> u64 {
    60
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            enabled: default_sla_enabled(),
            interval_minutes: default_sla_interval_minutes(),
            backup_extension_hours: None,
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("QUOTEFLOW")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("approval.procurement_project_types")
                    .with_list_parse_key("approval.management_project_types")
                    .with_list_parse_key("approval.sales_escalation_roles")
                    .with_list_parse_key("approval.procurement_escalation_roles")
                    .with_list_parse_key("approval.management_escalation_roles")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
