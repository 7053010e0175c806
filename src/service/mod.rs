//! Node operation set
//!
//! This module exposes the operations a transport calls on a node:
//! submitting and receiving transactions and blocks, mining, queries,
//! peer management and conflict resolution.

pub mod node_service;

pub use node_service::NodeService;
