//! Kubeplate Core - data types shared by the template engine and the CLI
//!
//! - `Value`: generic YAML/JSON/TOML value tree with arbitrary mapping keys
//! - `Values`: the values document rendered into templates
//! - `ResourceSpec`: one rendered manifest
//! - `ApiResources`: kind to resource collection table
//! - `Files`: sandboxed static asset access

pub mod discovery;
pub mod error;
pub mod files;
pub mod resource;
pub mod value;
pub mod values;

pub use discovery::{ApiResources, GroupVersionResource, ResourceDescriptor};
pub use error::{CoreError, Result};
pub use files::{FileEntry, FileProvider, Files, MockFileProvider, NoFileProvider, SandboxedFileProvider};
pub use resource::{GroupVersion, ResourceSpec};
pub use value::{Mapping, Number, Value};
pub use values::{NAMESPACE_KEY, Values, parse_set_values};
