//! orgsync directory contract.
//!
//! A [`DirectorySource`] exposes a cursor-based change feed plus a full
//! listing. Records arrive as raw [`AttributeSet`]s; the [`ad`] module holds
//! the Active Directory specific decoding (objectGUID, userAccountControl,
//! DNs).
//!
//! Enable the `test-utils` feature for [`memory::InMemoryDirectory`].

pub mod ad;
pub mod attributes;
pub mod error;
pub mod record;
pub mod source;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use attributes::{AttributeSet, AttributeValue};
pub use error::{DirectoryError, DirectoryResult};
pub use record::{ChangePage, DirectoryRecord};
pub use source::DirectorySource;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::InMemoryDirectory;
