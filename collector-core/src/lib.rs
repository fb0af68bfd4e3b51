//! Core library for the weather telemetry collector.
//!
//! This crate defines:
//! - Configuration (broker, cadence, location, condition table)
//! - The observation source abstraction and the Open-Meteo implementation
//! - Normalization of raw observations into canonical events
//! - The broker connection lifecycle and the collection run loop
//!
//! It is used by `collector-service`, but can also be reused by other
//! binaries or services.

pub mod broker;
pub mod config;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod service;

pub use broker::{BrokerError, QueuePublisher};
pub use config::{Config, ConditionTable, Location};
pub use model::NormalizedEvent;
pub use normalize::normalize;
pub use provider::{FetchError, ObservationSource, open_meteo::OpenMeteoSource};
pub use service::{CollectorService, CycleOutcome};
