//! SQLite storage backend.

pub mod connection;
pub mod repositories;

pub use connection::DbConnection;
pub use repositories::{BudgetRepository, FamilyRepository, InvitationRepository, ListRepository};
