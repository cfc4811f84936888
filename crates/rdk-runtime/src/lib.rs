//! `rdk-runtime` – frame driving and process telemetry.
//!
//! # Modules
//!
//! - [`frame_loop`] – [`FrameDriver`][frame_loop::FrameDriver]: runs every
//!   registered backend's `update(dt)` and then resolves the world anchors,
//!   once per frame.  [`FrameDriver::run`][frame_loop::FrameDriver::run]
//!   paces the tick on the Tokio timer until a shutdown flag is raised.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export
//!   to Jaeger, Grafana Tempo, or any OTLP-compatible collector.

pub mod frame_loop;
pub mod telemetry;

pub use frame_loop::{FrameDriver, FrameReport};
pub use telemetry::{TracerProviderGuard, init_tracing};
