#![forbid(unsafe_code)]

pub mod bank_dir;
pub mod error;
pub mod routes;
pub mod tools;
