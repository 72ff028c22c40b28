//! Hotel booking lifecycle and financial consistency engine.
//!
//! Decides whether a room can be booked, computes the authoritative price,
//! commits bookings atomically with their payment rows and coupon usage, and
//! reverses money movement on cancellation through a wallet ledger that stays
//! exact under concurrent updates.
//!
//! Entry points live in [`services`]; every operation takes an
//! [`engine::Engine`] and runs against a [`store::Store`].

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod integrations;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;

pub use engine::{Engine, EngineSettings};
pub use error::AppError;
