//! Core domain types shared by all modules

pub mod error;
