pub mod config;
pub mod connection;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod game;
pub mod http;
pub mod metrics;
pub mod protocol;
pub mod ws;
