//! Purpose: Define the stable public Rust API boundary for facetmap.
//! Exports: Core types and operations needed by the CLI and embedders.
//! Role: Public, additive-only surface; hides internal table layout.
//! Invariants: This module is the only public path to registry mutation.
//! Invariants: Read-only views never error; absence is the null sentinel.

mod view;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::addr::{ADDR_LEN, FacetAddr, SELECTOR_LEN, Selector, bytes_to_hex, hex_to_bytes};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::image::{Image, ImageLock};
pub use crate::core::instruction::{Instruction, decode_batch};
pub use crate::core::registry::{BootstrapSet, Registry, wellknown};
pub use view::{FacetEntry, RegistryReport, packed_entries, packed_facets, packed_owner, packed_selectors, report};
