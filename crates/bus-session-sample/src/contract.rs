//! The sample interface contract.

use bus_session_core::InterfaceContract;

/// Interface name on the bus.
pub const INTERFACE_NAME: &str = "com.my.sample.SampleInterface";

pub const PING: &str = "Ping";
pub const CONCATENATE: &str = "Concatenate";
pub const FIBONACCI: &str = "Fibonacci";
pub const PI: &str = "Pi";

/// Contract shared by `SampleService` and `SampleProxy`.
#[must_use]
pub fn sample_interface() -> InterfaceContract {
    InterfaceContract::new(INTERFACE_NAME)
        .method(PING, 1)
        .method(CONCATENATE, 2)
        .method(FIBONACCI, 1)
        .long_running(PI, 1)
}
