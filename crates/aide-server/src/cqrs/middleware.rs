//! Marker traits separating write requests from read requests.
//!
//! Commands change the image registry (or the files behind it); queries only
//! read. Every request sent through the mediator implements exactly one.

/// A request that modifies project state.
pub trait Command {}

/// A read-only request.
pub trait Query {}
