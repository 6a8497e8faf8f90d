//! `luaguard` core: transformation profiles, request resolution, and invocation outcomes.
//!
//! This crate performs no I/O. The server crate owns workspaces, processes,
//! and HTTP.

pub mod outcome;
pub mod profile;
pub mod request;

pub use outcome::TransformOutcome;
pub use profile::{Profile, UnknownProfile};
pub use request::{
    resolve, InputError, InputLimits, RequestBody, TransformRequest, DEFAULT_MAX_SOURCE_BYTES,
};

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
