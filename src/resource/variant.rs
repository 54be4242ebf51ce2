//! Per-generation request shaping.
//!
//! The three firewall generations share every operation contract. They only
//! differ in how the IP set is identified, how a change is expressed and where
//! the versioning token comes from.

use std::collections::HashSet;
use std::fmt;

use crate::address::Address;
use crate::config::{Generation, IpSetTarget};
use crate::token::TokenMode;
use crate::waf::{DescriptorUpdate, IpSetDescriptor, IpSetFilter, Mutation, UpdateAction};

pub trait IpSetVariant: Send + Sync + fmt::Debug {
    fn generation(&self) -> Generation;

    fn token_mode(&self) -> TokenMode;

    /// Whether building a mutation needs the current IP set contents
    fn needs_current_entries(&self) -> bool;

    fn filter(&self, target: &IpSetTarget) -> IpSetFilter;

    fn insert_mutation(&self, current: &[IpSetDescriptor], address: &Address) -> Mutation;

    fn delete_mutation(&self, current: &[IpSetDescriptor], removals: &[IpSetDescriptor]) -> Mutation;
}

/// WAF Classic (global)
#[derive(Debug, Clone, Copy, Default)]
pub struct Legacy;

/// WAF Classic Regional
#[derive(Debug, Clone, Copy, Default)]
pub struct Regional;

/// WAFv2
#[derive(Debug, Clone, Copy, Default)]
pub struct V2;

pub fn variant_for(generation: Generation) -> Box<dyn IpSetVariant> {
    match generation {
        Generation::Legacy => Box::new(Legacy),
        Generation::Regional => Box::new(Regional),
        Generation::V2 => Box::new(V2),
    }
}

fn id_filter(generation: Generation, target: &IpSetTarget) -> IpSetFilter {
    IpSetFilter {
        generation,
        id: target.id.clone(),
        name: None,
        scope: None,
    }
}

fn descriptor_updates<'a>(
    action: UpdateAction,
    descriptors: impl IntoIterator<Item = &'a IpSetDescriptor>,
) -> Mutation {
    Mutation::Descriptors(
        descriptors
            .into_iter()
            .map(|d| DescriptorUpdate {
                action,
                descriptor: d.clone(),
            })
            .collect(),
    )
}

fn classic_insert(address: &Address) -> Mutation {
    descriptor_updates(UpdateAction::Insert, [&IpSetDescriptor::from(address)])
}

impl IpSetVariant for Legacy {
    fn generation(&self) -> Generation {
        Generation::Legacy
    }

    fn token_mode(&self) -> TokenMode {
        TokenMode::Pull
    }

    fn needs_current_entries(&self) -> bool {
        false
    }

    fn filter(&self, target: &IpSetTarget) -> IpSetFilter {
        id_filter(Generation::Legacy, target)
    }

    fn insert_mutation(&self, _current: &[IpSetDescriptor], address: &Address) -> Mutation {
        classic_insert(address)
    }

    fn delete_mutation(&self, _current: &[IpSetDescriptor], removals: &[IpSetDescriptor]) -> Mutation {
        descriptor_updates(UpdateAction::Delete, removals)
    }
}

impl IpSetVariant for Regional {
    fn generation(&self) -> Generation {
        Generation::Regional
    }

    fn token_mode(&self) -> TokenMode {
        TokenMode::Pull
    }

    fn needs_current_entries(&self) -> bool {
        false
    }

    fn filter(&self, target: &IpSetTarget) -> IpSetFilter {
        id_filter(Generation::Regional, target)
    }

    fn insert_mutation(&self, _current: &[IpSetDescriptor], address: &Address) -> Mutation {
        classic_insert(address)
    }

    fn delete_mutation(&self, _current: &[IpSetDescriptor], removals: &[IpSetDescriptor]) -> Mutation {
        descriptor_updates(UpdateAction::Delete, removals)
    }
}

impl IpSetVariant for V2 {
    fn generation(&self) -> Generation {
        Generation::V2
    }

    fn token_mode(&self) -> TokenMode {
        TokenMode::Piggyback
    }

    fn needs_current_entries(&self) -> bool {
        true
    }

    fn filter(&self, target: &IpSetTarget) -> IpSetFilter {
        IpSetFilter {
            generation: Generation::V2,
            id: target.id.clone(),
            name: target.name.clone(),
            scope: Some(target.scope),
        }
    }

    /// Current addresses plus the new one, unless it is already there
    fn insert_mutation(&self, current: &[IpSetDescriptor], address: &Address) -> Mutation {
        let added = IpSetDescriptor::from(address);
        let mut addresses: Vec<String> = current.iter().map(|d| d.value.clone()).collect();
        if !current.iter().any(|d| d.same_entry(&added)) {
            addresses.push(added.value);
        }
        Mutation::Replace(addresses)
    }

    /// Complement of the removals within the current addresses
    fn delete_mutation(&self, current: &[IpSetDescriptor], removals: &[IpSetDescriptor]) -> Mutation {
        let values: HashSet<&str> = removals.iter().map(|r| r.value.as_str()).collect();
        let addresses: HashSet<Address> = removals.iter().filter_map(IpSetDescriptor::address).collect();
        Mutation::Replace(
            current
                .iter()
                .filter(|d| {
                    !values.contains(d.value.as_str())
                        && !d.address().is_some_and(|a| addresses.contains(&a))
                })
                .map(|d| d.value.clone())
                .collect(),
        )
    }
}
