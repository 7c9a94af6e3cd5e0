//! Services the lifecycle controller needs from the platform

/// Platform collaborator
///
/// Implemented by the application on top of its HAL.
pub trait Platform {
    /// Read the monotonic millisecond tick
    ///
    /// The value is allowed to wrap.
    fn now_ms(&self) -> u32;

    /// Start the periodic timer interrupt which calls
    /// [`NodeInstance::periodic_tick`](crate::NodeInstance::periodic_tick)
    ///
    /// Called on every communication reset. Starting an already running timer must be harmless.
    fn start_tick_timer(&mut self);

    /// Restart the device
    ///
    /// On hardware this does not return. Host implementations may return, after which the node
    /// stays halted.
    fn system_reset(&mut self);
}
