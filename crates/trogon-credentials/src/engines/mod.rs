//! Engine variants, one module per backend.

pub mod consul;
pub mod database;
pub mod password;
pub mod postgres;
pub mod rabbitmq;
