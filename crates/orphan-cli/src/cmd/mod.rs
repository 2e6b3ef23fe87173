pub mod parse_ca_log;
pub mod parse_der;
mod setup;
