//! # Donation payment server
//! This crate hosts the HTTP server for the donation engine. It is responsible for:
//! * Taking donations through the hosted checkout, UPI QR and manual entry channels.
//! * Listening for signed Razorpay webhooks and answering donors' status polls, both of which confirm donations.
//! * Serving leaderboards and batch statistics.
//! * Giving administrators status overrides, edits, deletes and batch total audits.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhook/razorpay`: Razorpay webhook deliveries. Guarded by the HMAC middleware.
//! * `/api/...`: Donation, leaderboard, staff and admin routes. Staff and admin routes require a bearer token. See
//!   [routes](routes/index.html).

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod stale_pending_worker;

#[cfg(test)]
mod endpoint_tests;
