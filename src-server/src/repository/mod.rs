//! Repository Layer
//!
//! Data access abstractions and their SQLite implementations.

mod db;
mod group_repo;
mod migrations;
mod preference_repo;
mod task_repo;
mod template_repo;
mod ticket_repo;
mod traits;

#[cfg(test)]
mod tests;

pub use db::{init_db, DbState, SharedConnection};
pub use group_repo::GroupRepository;
pub use migrations::{run_migrations, schema_version, target_version, MIGRATIONS};
pub use preference_repo::PreferenceRepository;
pub use task_repo::TaskRepository;
pub use template_repo::TemplateRepository;
pub use ticket_repo::{TicketFilter, TicketRepository};
pub use traits::{Repository, UserScopedRepository};
