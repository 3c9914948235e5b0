//! csr-approver: decision core for certificate signing request approval.
//!
//! Requests run through an ordered pipeline of named inspectors and then an
//! approver; approvals and denials are persisted with an optimistic-
//! concurrency retry loop against a [`store::CsrStore`].

pub mod approvers;
pub mod config;
pub mod decider;
pub mod errors;
pub mod inspectors;
pub mod metrics;
pub mod models;
pub mod registry;
pub mod retry;
pub mod runner;
pub mod store;
