//! Core business logic for Quoteflow.
//!
//! This crate contains the quote approval workflow with ZERO web or database
//! dependencies. Storage and notification delivery are reached through the
//! `ApprovalStore` and `NotificationSink` traits.
//!
//! # Modules
//!
//! - `approval` - Rules engine, state machine and SLA enforcement

pub mod approval;
