//! Flutter-facing bindings for the Duiyou core.

pub mod api;
