//! Pure domain types. No I/O, no imports from `crate::infra` or
//! `crate::commands`.

pub mod error;
pub mod session;
pub mod settings;
