//! End-to-end scenarios for the coordination primitives, run against a
//! shared in-memory store. See the `tests/` directory.
