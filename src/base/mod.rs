//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): Error codes numbered after Chromium's `net_error_list.h`
//! - [`IoResultExt`](context::IoResultExt): Context helpers for IO errors

pub mod context;
pub mod neterror;
