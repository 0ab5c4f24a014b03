pub mod cleanup;
pub mod error;
pub mod formula;
pub mod http;
pub mod install;
pub mod platform;
pub mod runtime;
