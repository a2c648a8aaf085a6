//! Storage layer: abstraction traits plus the SQLite implementation.

pub mod sqlite;
pub mod traits;

pub use traits::{BudgetStorage, FamilyStorage, InvitationStorage, ListStorage};
