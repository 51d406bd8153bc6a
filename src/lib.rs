pub mod account;
pub mod auth;
pub mod billing;
pub mod config;
pub mod error;
pub mod extractor;
pub mod generate;
pub mod identity;
pub mod openai;
pub mod plans;
pub mod quota;
pub mod routes;
pub mod store;
