pub mod admin;
pub mod auth;
pub mod catalog;
pub mod events;
pub mod health;
pub mod me;
pub mod orders;
