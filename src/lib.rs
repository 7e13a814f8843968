//! Container lifecycle client for edge-device workloads.
//!
//! `edged` mediates between an edge-device daemon and its container runtime
//! engine. It owns the engine connection, scopes every operation to a
//! namespace, and applies a defensive posture throughout: per-operation
//! deadlines, reconnect-on-next-use after any failure, and status queries
//! that degrade to an explicit unknown rather than erroring.
//!
//! # Architecture
//!
//! The lifecycle client ([`engine::RuntimeClient`]) is written against an
//! abstract engine surface so the engine RPC details stay at the edge of the
//! crate. A cached, namespace-scoped connection is reused across operations
//! and discarded on the first sign of trouble; the next operation
//! transparently reconnects.
//!
//! # Modules
//!
//! - [`config`]: Configuration system with layered precedence (CLI > env > file > defaults)
//! - [`engine`]: Engine connection management and the container lifecycle client
//! - [`error`]: Semantic error types for the application
//! - [`model`]: Pod and container descriptors and their label mapping

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
