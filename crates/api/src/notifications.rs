//! Email delivery of approval notifications.
//!
//! Messages are plain text. Rendering is kept separate from sending so the
//! wording can be tested without an SMTP server.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quoteflow_core::approval::{
    DispatchOutcome, LevelSummary, NotificationDispatcher, Recipient, RunSummary,
};
use quoteflow_shared::EmailService;
use tracing::warn;

/// A rendered email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Sends approval notifications over SMTP.
#[derive(Clone)]
pub struct EmailDispatcher {
    email: EmailService,
    frontend_url: String,
}

impl EmailDispatcher {
    /// Creates a dispatcher; deep links point at the configured frontend.
    #[must_use]
    pub fn new(email: EmailService) -> Self {
        let frontend_url = email.config().frontend_url.trim_end_matches('/').to_string();
        Self {
            email,
            frontend_url,
        }
    }

    async fn deliver(&self, kind: &str, to: &Recipient, message: RenderedEmail) -> DispatchOutcome {
        match self
            .email
            .send_email(&to.email, &message.subject, &message.body)
            .await
        {
            Ok(message_id) => DispatchOutcome::delivered(message_id),
            Err(e) => {
                warn!(kind, recipient = %to.email, error = %e, "notification email failed");
                DispatchOutcome::failed(e.to_string())
            }
        }
    }
}

#[async_trait]
impl NotificationDispatcher for EmailDispatcher {
    async fn approval_requested(
        &self,
        to: &Recipient,
        run: &RunSummary,
        level: &LevelSummary,
    ) -> DispatchOutcome {
        let message = render_approval_requested(&self.frontend_url, to, run, level);
        self.deliver("approval_requested", to, message).await
    }

    async fn level_approved(
        &self,
        to: &Recipient,
        run: &RunSummary,
        approved_by: &str,
        next: &LevelSummary,
    ) -> DispatchOutcome {
        let message = render_level_approved(&self.frontend_url, to, run, approved_by, next);
        self.deliver("level_approved", to, message).await
    }

    async fn approved(
        &self,
        to: &Recipient,
        run: &RunSummary,
        approved_by: &str,
    ) -> DispatchOutcome {
        let message = render_approved(&self.frontend_url, to, run, approved_by);
        self.deliver("approved", to, message).await
    }

    async fn rejected(
        &self,
        to: &Recipient,
        run: &RunSummary,
        rejected_by: &str,
        reason: &str,
    ) -> DispatchOutcome {
        let message = render_rejected(&self.frontend_url, to, run, rejected_by, reason);
        self.deliver("rejected", to, message).await
    }

    async fn sent(&self, to: &Recipient, run: &RunSummary, sent_by: &str) -> DispatchOutcome {
        let message = render_sent(&self.frontend_url, to, run, sent_by);
        self.deliver("sent", to, message).await
    }

    async fn backup_assigned(
        &self,
        to: &Recipient,
        run: &RunSummary,
        primary_name: &str,
        level: &LevelSummary,
    ) -> DispatchOutcome {
        let message = render_backup_assigned(&self.frontend_url, to, run, primary_name, level);
        self.deliver("backup_assigned", to, message).await
    }

    async fn escalated(
        &self,
        to: &Recipient,
        run: &RunSummary,
        level: &LevelSummary,
    ) -> DispatchOutcome {
        let message = render_escalated(&self.frontend_url, to, run, level);
        self.deliver("escalated", to, message).await
    }
}

// ============================================================================
// Templates
// ============================================================================

fn run_link(frontend_url: &str, run: &RunSummary) -> String {
    format!("{frontend_url}/pricing-runs/{}", run.run_id)
}

fn amount(run: &RunSummary) -> String {
    format!("{:.2} {}", run.total_price, run.currency)
}

fn deadline(level: &LevelSummary) -> String {
    level
        .sla_deadline
        .map_or_else(|| "no deadline".to_string(), |d: DateTime<Utc>| {
            d.format("%Y-%m-%d %H:%M UTC").to_string()
        })
}

fn render_approval_requested(
    frontend_url: &str,
    to: &Recipient,
    run: &RunSummary,
    level: &LevelSummary,
) -> RenderedEmail {
    RenderedEmail {
        subject: format!("Approval required: {} quote for {}", level.stage.display_name(), amount(run)),
        body: format!(
            r"Hi {name},

A {project} pricing run totalling {amount} is waiting for your {stage} approval (level {level}).

Please review it before {deadline}:

{link}

Best regards,
Quoteflow",
            name = to.name,
            project = run.project_type,
            amount = amount(run),
            stage = level.stage.display_name(),
            level = level.level,
            deadline = deadline(level),
            link = run_link(frontend_url, run),
        ),
    }
}

fn render_level_approved(
    frontend_url: &str,
    to: &Recipient,
    run: &RunSummary,
    approved_by: &str,
    next: &LevelSummary,
) -> RenderedEmail {
    RenderedEmail {
        subject: format!("Approval required: {} quote for {}", next.stage.display_name(), amount(run)),
        body: format!(
            r"Hi {name},

{approved_by} approved the previous level of a pricing run totalling {amount}. It now needs your {stage} approval (level {level}).

Please review it before {deadline}:

{link}

Best regards,
Quoteflow",
            name = to.name,
            amount = amount(run),
            stage = next.stage.display_name(),
            level = next.level,
            deadline = deadline(next),
            link = run_link(frontend_url, run),
        ),
    }
}

fn render_approved(
    frontend_url: &str,
    to: &Recipient,
    run: &RunSummary,
    approved_by: &str,
) -> RenderedEmail {
    RenderedEmail {
        subject: format!("Quote approved: {}", amount(run)),
        body: format!(
            r"Hi {name},

Your pricing run totalling {amount} has been fully approved. Final approval by {approved_by}.

The quote is ready to send to the client:

{link}

Best regards,
Quoteflow",
            name = to.name,
            amount = amount(run),
            link = run_link(frontend_url, run),
        ),
    }
}

fn render_rejected(
    frontend_url: &str,
    to: &Recipient,
    run: &RunSummary,
    rejected_by: &str,
    reason: &str,
) -> RenderedEmail {
    RenderedEmail {
        subject: format!("Quote rejected: {}", amount(run)),
        body: format!(
            r"Hi {name},

{rejected_by} rejected your pricing run totalling {amount}.

Reason: {reason}

{link}

Best regards,
Quoteflow",
            name = to.name,
            amount = amount(run),
            link = run_link(frontend_url, run),
        ),
    }
}

fn render_sent(frontend_url: &str, to: &Recipient, run: &RunSummary, sent_by: &str) -> RenderedEmail {
    RenderedEmail {
        subject: format!("Quote sent to client: {}", amount(run)),
        body: format!(
            r"Hi {name},

{sent_by} sent the quote for your pricing run totalling {amount} to the client.

{link}

Best regards,
Quoteflow",
            name = to.name,
            amount = amount(run),
            link = run_link(frontend_url, run),
        ),
    }
}

fn render_backup_assigned(
    frontend_url: &str,
    to: &Recipient,
    run: &RunSummary,
    primary_name: &str,
    level: &LevelSummary,
) -> RenderedEmail {
    RenderedEmail {
        subject: format!("Backup approval required: {} quote for {}", level.stage.display_name(), amount(run)),
        body: format!(
            r"Hi {name},

{primary_name} did not act on a pricing run totalling {amount} in time. You have been assigned as backup approver for the {stage} level (level {level}).

Please review it before {deadline}:

{link}

Best regards,
Quoteflow",
            name = to.name,
            amount = amount(run),
            stage = level.stage.display_name(),
            level = level.level,
            deadline = deadline(level),
            link = run_link(frontend_url, run),
        ),
    }
}

fn render_escalated(
    frontend_url: &str,
    to: &Recipient,
    run: &RunSummary,
    level: &LevelSummary,
) -> RenderedEmail {
    RenderedEmail {
        subject: format!("Escalation: overdue {} approval for {}", level.stage.display_name(), amount(run)),
        body: format!(
            r"Hi {name},

The {stage} approval (level {level}) of a pricing run totalling {amount} missed its deadline and has been escalated to you.

New deadline: {deadline}

{link}

Best regards,
Quoteflow",
            name = to.name,
            amount = amount(run),
            stage = level.stage.display_name(),
            level = level.level,
            deadline = deadline(level),
            link = run_link(frontend_url, run),
        ),
    }
}
