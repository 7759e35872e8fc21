pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod routes;
pub mod state;
pub mod storage;
pub mod templates;
pub mod workflow;
