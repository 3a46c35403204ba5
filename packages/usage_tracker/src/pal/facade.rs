//! Facade over the real and fake platform implementations.

use std::sync::Arc;

#[cfg(test)]
use crate::pal::FakePlatform;
use crate::pal::{Platform, RealPlatform};
use crate::stats::{IoReading, ProcessId, StatSample};

/// Enum-based dispatch between the real platform and the fake used in tests.
///
/// Clones share the same underlying platform state, so every component of a
/// session observes the same world.
#[derive(Clone, Debug)]
pub(crate) enum PlatformFacade {
    /// Real process introspection backed by operating system facilities.
    Real(Arc<RealPlatform>),

    /// Fake platform with scripted readings, for testing.
    #[cfg(test)]
    Fake(FakePlatform),
}

impl PlatformFacade {
    /// Creates a facade over the real platform.
    pub(crate) fn real() -> Self {
        Self::Real(Arc::new(RealPlatform::new()))
    }

    /// Creates a facade over a fake platform instance.
    #[cfg(test)]
    pub(crate) fn fake(fake: FakePlatform) -> Self {
        Self::Fake(fake)
    }
}

impl Platform for PlatformFacade {
    fn current_pid(&self) -> ProcessId {
        match self {
            Self::Real(real) => real.current_pid(),
            #[cfg(test)]
            Self::Fake(fake) => fake.current_pid(),
        }
    }

    fn exists(&self, pid: ProcessId) -> bool {
        match self {
            Self::Real(real) => real.exists(pid),
            #[cfg(test)]
            Self::Fake(fake) => fake.exists(pid),
        }
    }

    fn stat(&self, pid: ProcessId) -> Option<StatSample> {
        match self {
            Self::Real(real) => real.stat(pid),
            #[cfg(test)]
            Self::Fake(fake) => fake.stat(pid),
        }
    }

    fn io_counters(&self, pid: ProcessId) -> Option<IoReading> {
        match self {
            Self::Real(real) => real.io_counters(pid),
            #[cfg(test)]
            Self::Fake(fake) => fake.io_counters(pid),
        }
    }

    fn children(&self, pid: ProcessId) -> Vec<ProcessId> {
        match self {
            Self::Real(real) => real.children(pid),
            #[cfg(test)]
            Self::Fake(fake) => fake.children(pid),
        }
    }

    fn supports_io_counters(&self) -> bool {
        match self {
            Self::Real(real) => real.supports_io_counters(),
            #[cfg(test)]
            Self::Fake(fake) => fake.supports_io_counters(),
        }
    }
}

impl From<RealPlatform> for PlatformFacade {
    fn from(value: RealPlatform) -> Self {
        Self::Real(Arc::new(value))
    }
}

#[cfg(test)]
impl From<FakePlatform> for PlatformFacade {
    fn from(value: FakePlatform) -> Self {
        Self::Fake(value)
    }
}
