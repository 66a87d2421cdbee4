//! Bid policy service: validated rule trees, SQLite document storage and a
//! cache-aside read path behind a small RPC API.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod repository;
pub mod routes;
pub mod service;
pub mod validation;
