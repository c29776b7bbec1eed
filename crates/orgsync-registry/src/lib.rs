//! orgsync registry contract.
//!
//! [`RegistryClient`] is the only way the engine talks to the remote
//! organisational registry. Errors are classified transient or permanent
//! through [`RegistryError::is_transient`].
//!
//! Enable the `test-utils` feature for [`fake::FakeRegistry`].

pub mod client;
pub mod error;

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

pub use client::{RegistryClient, WriteOutcome};
pub use error::{RegistryError, RegistryResult};

#[cfg(any(test, feature = "test-utils"))]
pub use fake::FakeRegistry;
