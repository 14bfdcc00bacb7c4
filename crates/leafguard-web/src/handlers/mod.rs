//! HTTP 핸들러.

pub mod master;
pub mod slave;
