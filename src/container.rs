//! Sequence containers and the type system that ties parameter types,
//! parameters, and containers together into one loaded document (component F).

use std::collections::HashMap;

use crate::criteria::MatchCriterion;
use crate::ptype::{Parameter, ParameterType};

/// One entry in a container's sequence: either a parameter reference or a
/// nested container inclusion (an "aggregate" reference, section 4.F).
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerEntry {
    Parameter(String),
    Container(String),
}

/// A container this one extends, plus the criterion that must hold for this
/// (more specific) container to be the one actually chosen (section 4.F).
#[derive(Debug, Clone, PartialEq)]
pub struct BaseContainer {
    pub base_name: String,
    pub restriction: Option<MatchCriterion>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceContainer {
    pub name: String,
    pub abstract_: bool,
    pub base: Option<BaseContainer>,
    pub entries: Vec<ContainerEntry>,
}

/// Name reserved for the synthetic container holding the CCSDS primary
/// header fields (section 4.F design note: every document gets one, whether
/// or not the XTCE source declares it explicitly).
pub const ROOT_CONTAINER_NAME: &str = "CCSDSSpacePacket";

/// The loaded, validated contents of one XTCE document: parameter types,
/// parameters, and the container inheritance DAG, all name-indexed.
#[derive(Debug, Clone, Default)]
pub struct TypeSystem {
    pub parameter_types: HashMap<String, ParameterType>,
    pub parameters: HashMap<String, Parameter>,
    pub containers: HashMap<String, SequenceContainer>,
    /// Declaration order of every container name as the loader encountered
    /// it, since `containers` itself is a `HashMap` and iteration over it is
    /// unordered. `direct_subtypes` walks this to break multiple-match ties
    /// deterministically (section 4.F, `ContainerAmbiguity`).
    pub container_order: Vec<String>,
    /// Declaration order of top-level (apid-eligible) container names: those
    /// whose base is the synthetic root container.
    pub root_containers: Vec<String>,
}

impl TypeSystem {
    pub fn container(&self, name: &str) -> Option<&SequenceContainer> {
        self.containers.get(name)
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    pub fn parameter_type(&self, name: &str) -> Option<&ParameterType> {
        self.parameter_types.get(name)
    }

    /// Containers that declare `base_name` as their direct base, in
    /// declaration order (section 4.F tie-break rule). Falls back to
    /// `containers`' own (unordered) iteration for any name missing from
    /// `container_order`, which only happens for containers built
    /// programmatically without going through the loader.
    pub fn direct_subtypes<'a>(&'a self, base_name: &'a str) -> impl Iterator<Item = &'a SequenceContainer> + 'a {
        let ordered: Vec<&'a SequenceContainer> = self
            .container_order
            .iter()
            .filter_map(|name| self.containers.get(name))
            .filter(move |c| c.base.as_ref().map(|b| b.base_name.as_str()) == Some(base_name))
            .collect();
        let seen: std::collections::HashSet<&str> = ordered.iter().map(|c| c.name.as_str()).collect();
        let unordered = self.containers.values().filter(move |c| {
            !seen.contains(c.name.as_str()) && c.base.as_ref().map(|b| b.base_name.as_str()) == Some(base_name)
        });
        ordered.into_iter().chain(unordered)
    }

    /// Walks this container's base chain outward-in (root-first), the order
    /// entries must be concatenated in when flattening an inheritance chain.
    pub fn base_chain(&self, name: &str) -> Vec<&SequenceContainer> {
        let mut chain = Vec::new();
        let mut current = self.containers.get(name);
        let mut seen = std::collections::HashSet::new();
        while let Some(container) = current {
            if !seen.insert(container.name.clone()) {
                break; // cycle; loader already rejects this at validation time
            }
            chain.push(container);
            current = container
                .base
                .as_ref()
                .and_then(|b| self.containers.get(b.base_name.as_str()));
        }
        chain.reverse();
        chain
    }
}
