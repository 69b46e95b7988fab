#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

pub mod encode;
pub mod ranking;
pub mod rescale;
pub mod types;
