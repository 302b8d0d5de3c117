//! Interfaces to environments and demonstrators.
mod env;
mod policy;
pub use env::{BoxSpace, Env, EnvSpaces, Step};
pub use policy::DemoPolicy;
