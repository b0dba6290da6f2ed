//! Controller Transport Traits
//!
//! Traits for the text-message connection to the controller and for the
//! monotonic time source used by the scheduler.

/// Trait for sending text messages to the controller
///
/// Connection management and reconnection belong to the implementation;
/// the bridge only hears about it through connect/disconnect events.
pub trait Transport {
    /// Error type for send operations
    type Error: core::fmt::Debug;

    /// Queue one text message (must not block)
    fn send_text(&mut self, text: &str) -> Result<(), Self::Error>;
}

/// Monotonic millisecond clock
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin
    fn now_ms(&self) -> u64;
}
