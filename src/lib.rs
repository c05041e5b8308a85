#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

//! # Floodgate
//!
//! Floodgate takes "flow" as its breakthrough point and works on multiple
//! fields including **flow control**, **traffic shaping** and
//! **circuit breaking**, to guarantee reliability and resilience for
//! services under unstable traffic.
//!
//! Floodgate adopts the Chain-of-Responsibility pattern. The user-defined
//! rules are automatically checked via slots in `base::SlotChain`.
//! Generally, there are several steps when using Floodgate:
//! 1. Add the dependency and initialize the global configuration.
//! 2. Define a resource to be protected and build a Floodgate entry.
//! 3. Load the rules defined for each resource.
//! 4. Write the codes at the entry and exit points.
//!
//! ## Resource Definition
//!
//! A snippet of code is regarded as a resource, which can be protected by
//! defining its entries. By constructing an `EntryBuilder` and calling its
//! `build()` method, we create an entry. If the call is blocked, `build()`
//! returns an error:
//!
//! ```rust
//! use floodgate::base;
//! use floodgate::api::EntryBuilder;
//! let res_name = String::from("protected_resource");
//! let entry_builder = EntryBuilder::new(res_name.clone())
//!     .with_traffic_type(base::TrafficType::Inbound);
//! if let Ok(entry) = entry_builder.build() {
//!     // The request is allowed to be processed.
//!     // After finishing the logic, exit the entry.
//!     entry.exit().unwrap();
//! } else {
//!     // The request is blocked. `exit()` must not be called now.
//! }
//! ```
//!
//! ## Load Rules
//!
//! The method `load_rules()` replaces all of the rules defined before:
//!
//! ```rust
//! use std::sync::Arc;
//! use floodgate::flow;
//! flow::load_rules(vec![Arc::new(flow::Rule {
//!     resource: "protected_resource".into(),
//!     threshold: 10.0,
//!     calculate_strategy: flow::CalculateStrategy::Direct,
//!     control_strategy: flow::ControlStrategy::Reject,
//!     ..Default::default()
//! })]);
//! ```

// This module is not intended to be part of the public API. In general, any
// `doc(hidden)` code is not part of the public and stable API.
#[macro_use]
#[doc(hidden)]
pub mod macros;

/// Floodgate API
pub mod api;
/// Core implementations, including the statistic structures, such as the
/// sliding window and its underlying LeapArray, the call-tree node graph,
/// the rule managers for flow control, circuit breaking, authority and the
/// system guard, and the cluster token service contracts.
pub mod core;
/// Adapters for different logging crates.
pub mod logging;
/// Utility functions.
pub mod utils;

// re-export preludes
pub use crate::core::*;
pub use api::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
