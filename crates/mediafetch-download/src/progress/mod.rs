//! Progress rate-limiting.
//!
//! Workers report every chunk; only a throttled subset reaches the notifier.

mod throttle;

pub use throttle::ProgressThrottle;
