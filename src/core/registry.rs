// Selector-ownership tables with swap-compaction removal and atomic batch apply.
use std::collections::HashMap;

use crate::core::addr::{FacetAddr, Selector};
use crate::core::error::{Error, ErrorKind};
use crate::core::instruction::Instruction;

/// Selectors of the facets installed at construction. These are dispatch keys
/// of the router's own surface: the batch-apply entry point, the four
/// read-only enumeration functions, and the capability probe.
pub mod wellknown {
    use crate::core::addr::Selector;

    pub const APPLY: Selector = Selector::from_bytes([0x99, 0xf5, 0xf5, 0x2e]);

    pub const SELECTORS_OF: Selector = Selector::from_bytes([0xad, 0xfc, 0xa1, 0x5e]);
    pub const ENTRIES: Selector = Selector::from_bytes([0x7a, 0x0e, 0xd6, 0x27]);
    pub const OWNER_OF: Selector = Selector::from_bytes([0xcd, 0xff, 0xac, 0xc6]);
    pub const FACET_LIST: Selector = Selector::from_bytes([0x52, 0xef, 0x6b, 0x2c]);

    pub const SUPPORTS_PROBE: Selector = Selector::from_bytes([0x01, 0xff, 0xc9, 0xa7]);

    /// Introspection selectors in their declared installation order.
    pub const INTROSPECT_SET: [Selector; 4] = [SELECTORS_OF, ENTRIES, OWNER_OF, FACET_LIST];
}

/// Addresses of the three facets installed when a registry is created.
/// Provisioning the facets themselves is the caller's concern.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BootstrapSet {
    pub admin: FacetAddr,
    pub introspect: FacetAddr,
    pub probe: FacetAddr,
}

/// The dispatch table. `selector_owner` and `facet_selectors` are inverse
/// views of one relation; `facet_list` preserves first-introduction order for
/// deterministic enumeration. All mutation funnels through `assign`/`remove`
/// so the views cannot diverge.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    selector_owner: HashMap<Selector, FacetAddr>,
    facet_selectors: HashMap<FacetAddr, Vec<Selector>>,
    facet_list: Vec<FacetAddr>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with the three bootstrap facets, using
    /// the same assign primitive as `apply` (no checks bypassed).
    pub fn bootstrap(set: BootstrapSet) -> Result<Self, Error> {
        let mut registry = Self::new();
        registry.assign(set.admin, wellknown::APPLY)?;
        for selector in wellknown::INTROSPECT_SET {
            registry.assign(set.introspect, selector)?;
        }
        registry.assign(set.probe, wellknown::SUPPORTS_PROBE)?;
        Ok(registry)
    }

    /// Apply a batch of update instructions atomically: either every selector
    /// of every instruction lands, or the registry is left untouched.
    pub fn apply(&mut self, batch: &[Instruction]) -> Result<(), Error> {
        let mut working = self.clone();
        for (index, instruction) in batch.iter().enumerate() {
            working
                .apply_one(instruction)
                .map_err(|err| err.with_record(index))?;
        }
        *self = working;
        Ok(())
    }

    fn apply_one(&mut self, instruction: &Instruction) -> Result<(), Error> {
        if instruction.selectors.is_empty() {
            return Err(Error::new(ErrorKind::Malformed)
                .with_message("instruction carries no selectors"));
        }
        for selector in &instruction.selectors {
            if instruction.is_remove() {
                self.remove(*selector)?;
            } else {
                self.assign(instruction.owner, *selector)?;
            }
        }
        Ok(())
    }

    fn assign(&mut self, owner: FacetAddr, selector: Selector) -> Result<(), Error> {
        if owner.is_null() {
            return Err(Error::new(ErrorKind::Internal)
                .with_message("assign called with the null facet address"));
        }
        match self.selector_owner.get(&selector) {
            // Reassignment to the current owner is an idempotent no-op and
            // leaves the selector's list position unchanged.
            Some(current) if *current == owner => Ok(()),
            Some(current) => Err(Error::new(ErrorKind::DuplicateOwner).with_message(format!(
                "selector {selector} is owned by {current}; remove it before assigning to {owner}"
            ))),
            None => {
                if !self.facet_selectors.contains_key(&owner) {
                    self.facet_list.push(owner);
                }
                self.facet_selectors.entry(owner).or_default().push(selector);
                self.selector_owner.insert(selector, owner);
                Ok(())
            }
        }
    }

    fn remove(&mut self, selector: Selector) -> Result<(), Error> {
        let Some(owner) = self.selector_owner.remove(&selector) else {
            return Err(Error::new(ErrorKind::Unregistered)
                .with_message(format!("selector {selector} has no owner")));
        };
        let selectors = self.facet_selectors.get_mut(&owner).ok_or_else(|| {
            Error::new(ErrorKind::Internal)
                .with_message(format!("owner {owner} missing its selector list"))
        })?;
        let position = selectors.iter().position(|s| *s == selector).ok_or_else(|| {
            Error::new(ErrorKind::Internal)
                .with_message(format!("selector {selector} missing from {owner}"))
        })?;
        // O(1) compaction: the last selector moves into the freed slot, so
        // order within a facet is not stable under removal.
        selectors.swap_remove(position);
        if selectors.is_empty() {
            self.facet_selectors.remove(&owner);
            self.facet_list.retain(|facet| *facet != owner);
        }
        Ok(())
    }

    pub fn facets(&self) -> &[FacetAddr] {
        &self.facet_list
    }

    pub fn selectors_of(&self, facet: FacetAddr) -> &[Selector] {
        self.facet_selectors
            .get(&facet)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn owner_of(&self, selector: Selector) -> Option<FacetAddr> {
        self.selector_owner.get(&selector).copied()
    }

    pub fn entries(&self) -> Vec<(FacetAddr, &[Selector])> {
        self.facet_list
            .iter()
            .map(|facet| (*facet, self.selectors_of(*facet)))
            .collect()
    }

    pub fn facet_count(&self) -> usize {
        self.facet_list.len()
    }

    pub fn selector_count(&self) -> usize {
        self.selector_owner.len()
    }

    /// Check that the two ownership views still describe the same relation.
    pub fn is_consistent(&self) -> bool {
        let forward_ok = self.selector_owner.iter().all(|(selector, owner)| {
            self.selectors_of(*owner).contains(selector)
        });
        let backward_ok = self.facet_selectors.iter().all(|(facet, selectors)| {
            selectors
                .iter()
                .all(|selector| self.selector_owner.get(selector) == Some(facet))
        });
        let list_ok = self.facet_list.len() == self.facet_selectors.len()
            && self
                .facet_list
                .iter()
                .all(|facet| self.facet_selectors.contains_key(facet));
        forward_ok && backward_ok && list_ok
    }
}
