pub mod api;
pub mod checkout;
pub mod chrono_util;
pub mod config;
pub mod parser;
pub mod schema;
