// src/lib.rs

//! Announcement Notifier Library

pub mod channels;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
