//! HTTP API layer: thin handlers translating verbs into store operations,
//! wrapped in the uniform `{success, data, error, message}` envelope.

pub mod envelope;
pub mod executions;
pub mod tasks;
