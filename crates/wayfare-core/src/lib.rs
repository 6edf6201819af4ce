#![forbid(unsafe_code)]

//! Wayfare Core
//!
//! Value types and pure logic for the Wayfare navigation engine: state
//! records with content-addressed identity, the three-index registry
//! with its persisted overlay, the constructed/confirmed timeline, URL
//! canonicalization, and the platform capability flags.
//!
//! # Role in Wayfare
//! `wayfare-core` owns everything that can be computed without touching
//! a collaborator: no I/O, no clocks, no notification channel. The
//! runtime crate drives these types; the backend crate defines the
//! collaborator boundary they are driven against.

pub mod capabilities;
pub mod codec;
pub mod error;
pub mod registry;
pub mod state;
pub mod timeline;
pub mod url_resolve;

pub use capabilities::PlatformCapabilities;
pub use codec::StateCodec;
pub use error::{NavError, Result};
pub use registry::{RegistrySnapshot, StateRegistry};
pub use state::{State, StateId, StateSeed, data_is_empty, fingerprint_of};
pub use timeline::Timeline;
pub use url_resolve::UrlContext;
