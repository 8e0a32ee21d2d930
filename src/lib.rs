//! DevStudio - marketing site and back-office for a software studio
//!
//! This library provides the public pages, the lead-capture forms and the
//! admin REST API the binary serves.

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod web;
