pub mod config;
pub mod error;
pub mod interest;
pub mod invalidation;
pub mod locks;
pub mod notify;
pub mod queries;
pub mod refresh;
pub mod scraper;
pub mod service;
pub mod upsert;
