//! Built-in demo services registered by the `apikit-server` binary.

pub mod echo;
pub mod hello;
pub mod work;

pub use echo::EchoService;
pub use hello::HelloService;
pub use work::WorkService;
