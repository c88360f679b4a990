#[cfg(test)]
pub mod common;

pub mod expiration_and_cache;
