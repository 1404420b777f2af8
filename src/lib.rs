// Library exports for Once
// Integration tests drive the router through these modules

pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod extractors;
pub mod feed;
pub mod media;
pub mod routes;
pub mod state;
