//! Integration tests for workhall
//!
//! Each test boots its own runtime on a free loopback port and talks to it
//! over real sockets with reqwest.
//!
//! Run with: cargo test --test integration

mod helpers;

mod http_basic;
mod jobs;
mod lifecycle;
mod uploads;
