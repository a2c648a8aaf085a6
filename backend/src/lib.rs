//! Family collaboration core for the grocery-share application.
//!
//! Owns the entity graph behind family groups, membership roles, time-boxed
//! invitations, and the authorization boundary around shared shopping lists
//! and family budgets. Presentation and price-lookup concerns live outside
//! this crate and consume it through the domain services.

pub mod domain;
pub mod storage;
