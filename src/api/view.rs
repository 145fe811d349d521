//! Purpose: Read-only registry views in the packed wire convention, plus an audit report.
//! Exports: `packed_facets`, `packed_selectors`, `packed_owner`, `packed_entries`,
//! `RegistryReport`, `FacetEntry`, `report`.
//! Role: Shared contract for CLI output and embedders auditing a table.
//! Invariants: Views are pure reads; no query mutates or errors.
//! Invariants: Packed layouts are flat concatenations with no separators.

use serde::Serialize;

use crate::core::addr::{ADDR_LEN, FacetAddr, Selector, bytes_to_hex};
use crate::core::registry::Registry;

/// Concatenated facet addresses in first-introduction order.
pub fn packed_facets(registry: &Registry) -> Vec<u8> {
    let mut out = Vec::with_capacity(registry.facet_count() * ADDR_LEN);
    for facet in registry.facets() {
        out.extend_from_slice(facet.as_bytes());
    }
    out
}

/// Concatenated selectors owned by `facet`, in current post-compaction order.
/// Empty for a facet that owns nothing.
pub fn packed_selectors(registry: &Registry, facet: FacetAddr) -> Vec<u8> {
    let selectors = registry.selectors_of(facet);
    let mut out = Vec::with_capacity(selectors.len() * 4);
    for selector in selectors {
        out.extend_from_slice(selector.as_bytes());
    }
    out
}

/// The owning address, or the null sentinel for an unowned selector.
pub fn packed_owner(registry: &Registry, selector: Selector) -> [u8; ADDR_LEN] {
    *registry
        .owner_of(selector)
        .unwrap_or(FacetAddr::NULL)
        .as_bytes()
}

/// Per facet: the address followed immediately by its concatenated selectors.
pub fn packed_entries(registry: &Registry) -> Vec<Vec<u8>> {
    registry
        .entries()
        .into_iter()
        .map(|(facet, selectors)| {
            let mut record = Vec::with_capacity(ADDR_LEN + selectors.len() * 4);
            record.extend_from_slice(facet.as_bytes());
            for selector in selectors {
                record.extend_from_slice(selector.as_bytes());
            }
            record
        })
        .collect()
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FacetEntry {
    pub facet: String,
    pub selectors: Vec<String>,
    pub packed: String,
}

/// Serializable audit snapshot of the whole table.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RegistryReport {
    pub facet_count: usize,
    pub selector_count: usize,
    pub consistent: bool,
    pub facets: Vec<FacetEntry>,
}

pub fn report(registry: &Registry) -> RegistryReport {
    let facets = registry
        .entries()
        .into_iter()
        .map(|(facet, selectors)| {
            let mut record = facet.as_bytes().to_vec();
            for selector in selectors {
                record.extend_from_slice(selector.as_bytes());
            }
            FacetEntry {
                facet: facet.to_string(),
                selectors: selectors.iter().map(Selector::to_string).collect(),
                packed: format!("0x{}", bytes_to_hex(&record)),
            }
        })
        .collect();

    RegistryReport {
        facet_count: registry.facet_count(),
        selector_count: registry.selector_count(),
        consistent: registry.is_consistent(),
        facets,
    }
}
