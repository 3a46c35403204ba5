//! Platform abstraction layer for process introspection.
//!
//! This module provides a platform abstraction that allows switching between
//! real process introspection (using the `sysinfo` package) and fake
//! implementations for testing purposes.

mod abstractions;
mod facade;
#[cfg(test)]
mod fake;
mod real;

pub(crate) use abstractions::Platform;
pub(crate) use facade::PlatformFacade;
#[cfg(test)]
pub(crate) use fake::{FAKE_SELF_PID, FakePlatform};
pub(crate) use real::RealPlatform;
