pub mod budget_repository;
pub mod family_repository;
pub mod invitation_repository;
pub mod list_repository;

pub use budget_repository::BudgetRepository;
pub use family_repository::FamilyRepository;
pub use invitation_repository::InvitationRepository;
pub use list_repository::ListRepository;
