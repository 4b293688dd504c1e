pub mod access;
pub mod audit;
pub mod auth;
pub mod health;
