//! Wire and domain types shared by the dashboard client and its front ends.

pub mod domain;
pub mod error;
pub mod protocol;
