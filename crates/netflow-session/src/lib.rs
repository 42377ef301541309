//! Session and template cache for NetFlow v9 / IPFIX decoders.
//!
//! Data records reference templates that exporters announce out of band.
//! This crate remembers those templates per exporter and observation domain:
//! - [`SessionMap`] maps a [`SessionKey`] to a [`Session`], creating it on
//!   the first packet
//! - [`Session`] holds the domain's templates and last sequence number, and
//!   drops every template when the sequence jumps out of tolerance
//! - [`spawn_cleanup`] runs a periodic second-chance sweep that evicts
//!   templates and sessions idle for two consecutive intervals
//!
//! # Example
//!
//! ```rust,ignore
//! use netflow_session::{SessionConfig, SessionMap, spawn_cleanup};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = SessionConfig::default().with_shared_templates(false);
//! let sessions: SessionMap<Template> = SessionMap::new(config.clone());
//! let cleanup = spawn_cleanup(sessions.clone(), config.cleanup_interval(), CancellationToken::new());
//!
//! let session = sessions.get_or_create(&sessions.key_for(peer, header.source_id));
//! if session.check_reset(header.sequence).reset {
//!     // templates were dropped, wait for the exporter to resend them
//! }
//! ```

mod cleanup;
mod config;
mod error;
mod key;
mod metric;
mod registry;
mod sequence;
mod session;
mod template;

pub use cleanup::{CleanupHandle, MIN_CLEANUP_INTERVAL, cleanup_loop, spawn_cleanup};
pub use config::{DEFAULT_CLEANUP_INTERVAL_SECS, SessionConfig};
pub use error::{Error, Result};
pub use key::{SessionKey, TemplateId};
pub use metric::{ActiveSessionsMetric, NoopMetric, SessionGauge};
pub use registry::{CleanupStats, RegistryStats, SessionMap};
pub use sequence::{MAX_SEQUENCE_DIFFERENCE, is_valid_sequence};
pub use session::{ExpireStats, SequenceCheck, Session};
pub use template::{RecencyMarker, TemplateSlot};
