pub mod connection;
pub mod driver;
