//! Workspace-hack crate. Intentionally empty; see Cargo.toml.
