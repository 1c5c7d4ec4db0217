//! Database entities.

pub mod user_task;

pub use user_task::Entity as UserTask;
