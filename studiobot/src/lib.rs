//! `StudioBot` — studio task notification bot library.

pub mod bot;
pub mod commands;
pub mod config;
pub mod detector;
pub mod format;
pub mod notifier;
pub mod scheduler;
pub mod store;
