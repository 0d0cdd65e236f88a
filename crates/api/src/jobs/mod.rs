//! Background jobs started by the server binary.

pub mod sla;
