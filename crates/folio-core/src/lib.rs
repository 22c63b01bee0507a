//! folio-core: session client for the portfolio content API.
//!
//! This crate holds everything the admin client needs apart from the
//! terminal surface: the API client, credential storage backends, and the
//! session lifecycle (verify, refresh, redirect, login lockout, logout),
//! plus the content operations of the admin panel.

pub mod api;
pub mod auth;
pub mod config;
pub mod content;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use config::Config;
pub use services::{Services, ServicesBuilder};
