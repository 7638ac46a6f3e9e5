pub mod admin_user;
pub mod content;
pub mod health;
pub mod lead;
