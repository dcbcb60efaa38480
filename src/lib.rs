pub mod alphavantage;
pub mod analytics;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod history;
pub mod model;
pub mod refresh;
pub mod simulator;
