//! Quoteflow API Server
//!
//! Main entry point for the quote-approval backend service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quoteflow_api::notifications::EmailDispatcher;
use quoteflow_api::{AppState, create_router, jobs};
use quoteflow_core::approval::rules::backup_extension_hours;
use quoteflow_core::approval::{
    ApprovalPolicy, ApprovalRulesConfig, ApprovalRulesEngine, ApprovalService, ApprovalStore,
    ChannelOutbox, LogDispatcher, NotificationDispatcher, NotificationSink, SlaEnforcer,
};
use quoteflow_db::{SeaOrmApprovalStore, connect};
use quoteflow_shared::{AppConfig, EmailService, JwtConfig, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quoteflow=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let db = connect(&config.database.url)
        .await
        .context("failed to connect to database")?;
    info!("Connected to database");
    let store: Arc<dyn ApprovalStore> = Arc::new(SeaOrmApprovalStore::new(db));

    let rules_config = ApprovalRulesConfig::try_from(&config.approval)
        .context("invalid approval rules configuration")?;
    let rules = ApprovalRulesEngine::new(rules_config, ApprovalPolicy::default());

    // Notifications are delivered by a background worker
    let dispatcher: Arc<dyn NotificationDispatcher> = if config.email.enabled {
        info!(
            smtp_host = %config.email.smtp_host,
            smtp_port = %config.email.smtp_port,
            "Email notifications enabled"
        );
        Arc::new(EmailDispatcher::new(EmailService::new(config.email.clone())))
    } else {
        info!("Email disabled; notifications are logged only");
        Arc::new(LogDispatcher)
    };
    let (outbox, worker) = ChannelOutbox::channel(dispatcher);
    let _outbox_worker = worker.spawn();
    let outbox: Arc<dyn NotificationSink> = Arc::new(outbox);

    let approvals = ApprovalService::new(store.clone(), outbox.clone(), rules.clone());
    let backup_extension = backup_extension_hours(config.sla.backup_extension_hours)
        .context("invalid sla.backup_extension_hours")?;
    let sla = SlaEnforcer::new(store, outbox, rules, backup_extension);

    let _sla_job = if config.sla.enabled {
        let every = Duration::from_secs(config.sla.interval_minutes.max(1) * 60);
        Some(jobs::sla::spawn(sla.clone(), every))
    } else {
        info!("SLA enforcement job disabled");
        None
    };

    let jwt_service = JwtService::new(JwtConfig {
        secret: config.jwt.secret.clone(),
        access_token_expires_minutes: i64::try_from(config.jwt.access_token_expiry_secs / 60)
            .unwrap_or(i64::MAX),
    });

    let state = AppState {
        approvals,
        sla,
        jwt_service: Arc::new(jwt_service),
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
