// Core modules implementing the dispatch tables, wire framing, and error modeling.
pub mod addr;
pub mod error;
pub mod image;
pub mod instruction;
pub mod registry;
