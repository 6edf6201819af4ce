#![forbid(unsafe_code)]

//! Platform capability flags.
//!
//! The embedder probes its environment once, builds a
//! [`PlatformCapabilities`] value, and hands it to the engine at
//! construction. Nothing in the engine re-detects capabilities
//! mid-session; every quirk-dependent branch reads these flags.

use bitflags::bitflags;

bitflags! {
    /// What the underlying navigation primitive can be trusted to do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PlatformCapabilities: u8 {
        /// The primitive can assign full locations directly
        /// (push/replace of an arbitrary same-origin URL).
        const NATIVE_PUSH = 1 << 0;
        /// Fragment-bearing targets may be pushed or replaced. Without
        /// this, a fragment push is rejected as unsupported.
        const FRAGMENT_PUSH = 1 << 1;
        /// Relative moves (step back/forward) always produce a change
        /// notification. Without this, the retry watchdog arms on every
        /// relative move.
        const RELIABLE_MOVE_NOTIFY = 1 << 2;
        /// The teardown signal fires reliably. Without this, registry
        /// persistence also runs on a fixed interval as a fallback.
        const RELIABLE_TEARDOWN = 1 << 3;
    }
}

impl PlatformCapabilities {
    /// A fully capable native environment.
    #[must_use]
    pub fn native() -> Self {
        Self::all()
    }

    /// An emulated environment: no trusted primitive behavior at all.
    #[must_use]
    pub fn emulated() -> Self {
        Self::empty()
    }

    /// Whether two distinct states may not share one visible location.
    ///
    /// True when navigation is emulated or move notifications are
    /// unreliable: in both cases the location string is the only thing
    /// the engine can correlate a notification against, so a colliding
    /// state must fall back to its `hashed_url`.
    #[must_use]
    pub fn needs_distinct_locations(&self) -> bool {
        !self.contains(Self::NATIVE_PUSH) || !self.contains(Self::RELIABLE_MOVE_NOTIFY)
    }
}

impl Default for PlatformCapabilities {
    fn default() -> Self {
        Self::native()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_has_every_flag() {
        let caps = PlatformCapabilities::native();
        assert!(caps.contains(PlatformCapabilities::NATIVE_PUSH));
        assert!(caps.contains(PlatformCapabilities::FRAGMENT_PUSH));
        assert!(caps.contains(PlatformCapabilities::RELIABLE_MOVE_NOTIFY));
        assert!(caps.contains(PlatformCapabilities::RELIABLE_TEARDOWN));
        assert!(!caps.needs_distinct_locations());
    }

    #[test]
    fn emulated_needs_distinct_locations() {
        assert!(PlatformCapabilities::emulated().needs_distinct_locations());
    }

    #[test]
    fn unreliable_notify_needs_distinct_locations() {
        let caps = PlatformCapabilities::native() - PlatformCapabilities::RELIABLE_MOVE_NOTIFY;
        assert!(caps.needs_distinct_locations());
    }

    #[test]
    fn flag_composition() {
        let caps = PlatformCapabilities::NATIVE_PUSH | PlatformCapabilities::FRAGMENT_PUSH;
        assert!(caps.contains(PlatformCapabilities::NATIVE_PUSH));
        assert!(!caps.contains(PlatformCapabilities::RELIABLE_TEARDOWN));
    }
}
