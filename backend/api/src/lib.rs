//! FoodAid backend — REST API for a surplus-food donation marketplace.
//!
//! A thin orchestration layer: business data lives in SQLite (`sqlx`),
//! identity and push delivery are delegated to managed provider REST APIs,
//! geocoding to a mapping API, and payments to PayPal. The one piece of
//! logic the server owns is the food-post lifecycle, whose transitions are
//! enforced with conditional UPDATEs (see [`db`]).

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod geo;
pub mod models;
pub mod payments;
pub mod push;
pub mod sweep;
