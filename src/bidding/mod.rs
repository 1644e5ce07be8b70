pub mod commands;
pub mod ledger;
pub mod model;
