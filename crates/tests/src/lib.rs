//! Cross-crate integration tests for the filtered chat pipeline and its HTTP surface live under `tests/`.
