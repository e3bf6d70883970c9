pub mod access;
pub mod authorize;
