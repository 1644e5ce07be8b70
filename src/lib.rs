pub mod auction;
pub mod bidding;
pub mod bot;
pub mod config;
pub mod database;
pub mod error;
pub mod lifecycle;
pub mod query;
pub mod scheduler;
pub mod store;
