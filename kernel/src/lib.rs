//! kernel — dependency injection, component scanning, a typed event bus,
//! and declarative HTTP routing behind one dependency.
//!
//! ```ignore
//! use kernel::prelude::*;
//!
//! #[derive(Component)]
//! struct Greeter;
//!
//! fn main() {
//!     let app = Bootstrap::run(Scanner::new().component::<Greeter>(), "my_app").unwrap();
//!     // ...
//! }
//! ```
//!
//! This crate only re-exports [`kernel_core`] and [`kernel_macros`] — all
//! behavior lives there. `kernel-macros`'s generated code resolves whether
//! a downstream crate depends on `kernel` or `kernel-core` directly via
//! `proc-macro-crate`, so either dependency works.

pub extern crate kernel_core;
pub extern crate kernel_macros;

pub use kernel_macros::{routes, Component, Service};

pub mod prelude {
    //! Re-exports the types and macros most applications reach for.
    pub use kernel_core::prelude::*;
    pub use kernel_macros::{routes, Component, Service};
}
