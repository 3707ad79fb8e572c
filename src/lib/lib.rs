pub mod adapters;
pub mod config;
pub mod crypto;
pub mod delegate;
pub mod domain;
pub mod issuer;
pub mod membership;
pub mod oracle;
pub mod ports;
