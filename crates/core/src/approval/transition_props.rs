//! Property-based tests for ApprovalTransitions.
//!
//! Random operation sequences are applied to a run; every accepted plan must
//! follow the status DAG and leave level and revision consistent.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use quoteflow_shared::types::{PricingRunId, RfqId, TenantId, UserId};
use rust_decimal::Decimal;

use crate::approval::error::ApprovalError;
use crate::approval::rules::ApprovalRulesEngine;
use crate::approval::transition::{ApprovalTransitions, TransitionPlan};
use crate::approval::types::{
    ApprovalStatus, Approver, PricingRun, PricingSnapshot, UserRole, WorkflowState,
};

#[derive(Debug, Clone)]
enum Op {
    Submit,
    Approve,
    Reject(String),
    Send,
    Escalate,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Submit),
        Just(Op::Approve),
        "[ a-z]{0,12}".prop_map(Op::Reject),
        Just(Op::Send),
        Just(Op::Escalate),
    ]
}

fn arb_status() -> impl Strategy<Value = ApprovalStatus> {
    prop_oneof![
        Just(ApprovalStatus::Draft),
        Just(ApprovalStatus::PendingApproval),
        Just(ApprovalStatus::Approved),
        Just(ApprovalStatus::Rejected),
        Just(ApprovalStatus::SentToClient),
    ]
}

fn actor() -> Approver {
    Approver {
        id: UserId::new(),
        tenant_id: TenantId::new(),
        name: "Prop Actor".to_string(),
        email: "prop@example.com".to_string(),
        role: UserRole::Admin,
        can_approve: true,
        is_active: true,
        backup_user_id: None,
    }
}

fn run(total_cents: i64) -> PricingRun {
    let now = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
    PricingRun {
        id: PricingRunId::new(),
        tenant_id: TenantId::new(),
        rfq_id: RfqId::new(),
        snapshot: PricingSnapshot {
            total_price: Decimal::new(total_cents, 2),
            currency: "USD".to_string(),
            project_type: "standard".to_string(),
            items: vec![],
        },
        workflow: WorkflowState::draft(),
        created_at: now,
        updated_at: now,
    }
}

fn plan(run: &PricingRun, op: &Op, rules: &ApprovalRulesEngine) -> Result<TransitionPlan, ApprovalError> {
    let who = actor();
    let now = run.updated_at + Duration::hours(1);
    match op {
        Op::Submit => ApprovalTransitions::submit(run, &who, rules, now),
        Op::Approve => ApprovalTransitions::approve(run, &who, None, rules, now),
        Op::Reject(reason) => ApprovalTransitions::reject(run, &who, reason, None, now),
        Op::Send => ApprovalTransitions::mark_sent(run, &who, None, now),
        Op::Escalate => ApprovalTransitions::escalate(run, now),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Accepted plans follow the DAG; level never decreases while pending;
    /// revision grows by one per accepted plan.
    #[test]
    fn prop_sequences_respect_state_machine(
        total_cents in 1i64..50_000_000i64,
        ops in prop::collection::vec(arb_op(), 1..20),
    ) {
        let rules = ApprovalRulesEngine::default();
        let mut run = run(total_cents);

        for op in &ops {
            let before = run.workflow.clone();
            match plan(&run, op, &rules) {
                Ok(plan) => {
                    prop_assert_eq!(plan.guard.status, before.status);
                    prop_assert_eq!(plan.guard.revision, before.revision);
                    prop_assert_eq!(plan.next.revision, before.revision + 1);
                    prop_assert_eq!(plan.entry.previous_status, before.status);
                    prop_assert_eq!(plan.entry.new_status, plan.next.status);

                    if plan.next.status != before.status {
                        prop_assert!(ApprovalTransitions::is_valid_transition(
                            before.status,
                            plan.next.status
                        ));
                    }
                    if before.status == ApprovalStatus::PendingApproval {
                        prop_assert!(plan.next.level >= before.level);
                    }

                    run.workflow = plan.next;
                    run.updated_at = plan.entry.created_at;
                }
                Err(err) => {
                    let expected = matches!(
                        err,
                        ApprovalError::InvalidTransition { .. }
                            | ApprovalError::RejectionReasonRequired
                    );
                    prop_assert!(expected, "unexpected error {:?}", err);
                }
            }
        }
    }

    /// Terminal statuses refuse every operation.
    #[test]
    fn prop_terminal_statuses_refuse_everything(
        op in arb_op(),
        terminal in prop_oneof![Just(ApprovalStatus::Rejected), Just(ApprovalStatus::SentToClient)],
    ) {
        let rules = ApprovalRulesEngine::default();
        let mut run = run(100_000);
        run.workflow.status = terminal;
        prop_assert!(plan(&run, &op, &rules).is_err());
    }

    /// The DAG has exactly four edges.
    #[test]
    fn prop_dag_edges(from in arb_status(), to in arb_status()) {
        let expected = matches!(
            (from, to),
            (ApprovalStatus::Draft, ApprovalStatus::PendingApproval)
                | (ApprovalStatus::PendingApproval, ApprovalStatus::Approved)
                | (ApprovalStatus::PendingApproval, ApprovalStatus::Rejected)
                | (ApprovalStatus::Approved, ApprovalStatus::SentToClient)
        );
        prop_assert_eq!(ApprovalTransitions::is_valid_transition(from, to), expected);
    }
}
