//! Query pipeline: builder → immutable specification → executor
//!
//! A query is assembled fluently ([`builder::Query`]), materialized into an
//! immutable record ([`spec::QuerySpec`]) whose shape encodes a strict
//! precedence over mutually exclusive key bounds, and executed as a single
//! ordered-range scan ([`executor`]).

pub mod builder;
pub mod executor;
pub mod spec;
