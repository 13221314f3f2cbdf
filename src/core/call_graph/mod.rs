// src/core/call_graph/mod.rs
//! Cross-module call resolution.
//!
//! Runs after every module has been scanned: call sites are collected per file
//! with their enclosing definition, then mapped to `(module, symbol)` targets
//! through import aliases, longest-prefix module matching and package
//! re-exports.

mod call_sites;
mod reexports;
mod resolver;

pub use call_sites::{collect_call_sites, CallSite, Callee};
pub use reexports::{ReexportMap, ReexportTracker, MAX_REEXPORT_HOPS};
pub use resolver::{CallResolver, Target};
