//! # statekeep-core
//!
//! Core types, traits, and abstractions for the statekeep persistence engine.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the codec and engine crates depend on: the error taxonomy, version
//! handling, the checksum service, schema registry and validator, the storage
//! primitive and the persisted envelope formats.

pub mod checksum;
pub mod defaults;
pub mod environment;
pub mod error;
pub mod logging;
pub mod models;
pub mod schema;
pub mod storage;
pub mod validation;
pub mod version;

// Re-export commonly used types at crate root
pub use checksum::{checksum_bytes, checksum_json, checksum_str, verify_checksum};
pub use environment::{Environment, StorageArea, StorageLayout};
pub use error::{Error, Result};
pub use models::*;
pub use schema::{FieldRule, FieldType, Schema, SchemaRegistry, StaticSchemaRegistry};
pub use storage::{is_reserved_key, JsonFileStorage, MemoryStorage, Storage};
pub use validation::{ValidationResult, Validator};
pub use version::{check_major_compatibility, is_valid_version, Version};
