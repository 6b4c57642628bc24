pub mod commits;
pub mod database;
pub mod error;
pub mod projects;
pub mod repositories;
pub mod row_helpers;
pub mod schema;

pub use database::Database;
pub use error::StoreError;
