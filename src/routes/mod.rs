pub mod admin_auth;
pub mod error;
pub mod health;
pub mod items;
pub mod leads;
pub mod stats;
