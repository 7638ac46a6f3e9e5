pub mod admin_user;
pub mod lead;
pub mod postgres_repository;
