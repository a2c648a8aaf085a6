//! # Domain Module
//!
//! Business logic for family collaboration: who belongs to which family,
//! who may invite whom, and which member may touch which shared resource.
//!
//! ## Module Organization
//!
//! - **family_service**: family lifecycle, membership roles, the composite
//!   family overview read
//! - **invitation_service**: the invitation state machine (pending →
//!   accepted/declined, lazy expiry)
//! - **list_service**: shared shopping lists and their items, behind the
//!   per-member permission flags
//! - **budget_service**: family budgets and expenses with derived spend
//!   totals
//! - **authorization**: the single membership/capability check every
//!   gateway operation funnels through
//! - **commands**: command and result structs forming the service API
//! - **errors**: the crate-wide error taxonomy
//!
//! ## Business Rules
//!
//! - A family always keeps at least one admin
//! - A user holds at most one active membership at a time
//! - Invitations expire 7 days after issuance, checked at read time
//! - An item's completion triple is set and cleared atomically
//! - Budget spend totals are re-derived from expenses, never incremented

pub mod authorization;
pub mod budget_service;
pub mod commands;
pub mod errors;
pub mod family_service;
pub mod invitation_service;
pub mod list_service;

pub use budget_service::BudgetService;
pub use errors::{DomainError, DomainResult};
pub use family_service::FamilyService;
pub use invitation_service::InvitationService;
pub use list_service::ListService;
