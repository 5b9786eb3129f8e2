//! Tutorbase - booking and payment backend for a tutoring marketplace
//!
//! This library provides the core functionality for the Tutorbase service:
//! database operations, JWT auth, the payment gateway client, the webhook
//! reconciler, and the API handlers.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod models;
pub mod notify;
pub mod payments;
pub mod reconcile;
