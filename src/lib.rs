pub mod aggregate;
pub mod aqi;
pub mod cache;
pub mod config;
pub mod fetch;
pub mod fields;
pub mod output;
pub mod sensor;
