use std::collections::HashSet;
use std::sync::Arc;

use moka::sync::Cache;
use tracing::{debug, warn};

use super::{CombineConverter, ConverterRef, FallbackConverter, builtin};
use crate::command::arguments::ArgKind;
use crate::command::errors::CommandRegistrationError;

/// Whether values of kind `from` are acceptable where `to` is expected, given extra declared
/// `(subtype, supertype)` relations on top of the built-in ones.
fn assignable(relations: &[(ArgKind, ArgKind)], from: ArgKind, to: ArgKind) -> bool {
    let mut pending = vec![from];
    let mut visited = HashSet::new();

    while let Some(kind) = pending.pop() {
        if kind == to {
            return true;
        }
        if !visited.insert(kind) {
            continue;
        }

        pending.extend(kind.builtin_supertypes());
        pending.extend(relations.iter().filter(|(sub, _)| *sub == kind).map(|(_, sup)| *sup));
    }

    false
}

/// Converters by the kind they produce.
///
/// A kind with no registered converter can still be resolved if converters exist for related
/// kinds: converters of subtypes are used as they are, and converters of supertypes are narrowed
/// so that they reject values of the wrong kind. Assembled converters are cached until the next
/// registration.
pub struct ConverterRegistry {
    converters: Vec<(ArgKind, ConverterRef)>,
    relations: Arc<Vec<(ArgKind, ArgKind)>>,
    assembled: Cache<ArgKind, ConverterRef>,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            converters: Vec::new(),
            relations: Arc::new(Vec::new()),
            assembled: Cache::new(64),
        }
    }

    /// A registry holding every stock converter.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.converters = builtin::defaults()
            .into_iter()
            .map(|converter| (converter.kind(), converter))
            .collect();
        registry
    }

    pub fn register(&mut self, converter: ConverterRef) -> Result<(), CommandRegistrationError> {
        let kind = converter.kind();
        if self.get(kind).is_some() {
            return Err(CommandRegistrationError::DuplicateConverter(kind));
        }

        self.converters.push((kind, converter));
        self.assembled.invalidate_all();
        Ok(())
    }

    /// Registers `converter`, replacing any converter already registered for its kind.
    pub fn replace(&mut self, converter: ConverterRef) -> Option<ConverterRef> {
        let kind = converter.kind();
        self.assembled.invalidate_all();

        match self.converters.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, existing)) => Some(std::mem::replace(existing, converter)),
            None => {
                self.converters.push((kind, converter));
                None
            },
        }
    }

    /// Declares `sub` a subtype of `sup`.
    pub fn declare_subtype(&mut self, sub: ArgKind, sup: ArgKind) {
        Arc::make_mut(&mut self.relations).push((sub, sup));
        self.assembled.invalidate_all();
    }

    pub fn is_assignable(&self, from: ArgKind, to: ArgKind) -> bool {
        assignable(&self.relations, from, to)
    }

    /// The converter registered for exactly `kind`.
    pub fn get(&self, kind: ArgKind) -> Option<ConverterRef> {
        self.converters
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, converter)| converter.clone())
    }

    /// A converter for `target`, assembling one from related kinds if none is registered.
    pub fn resolve(&self, target: ArgKind) -> Option<ConverterRef> {
        if let Some(exact) = self.get(target) {
            return Some(exact);
        }
        if let Some(cached) = self.assembled.get(&target) {
            debug!(
                "No converter is registered for {target}, reusing {} assembled from related kinds",
                cached.name()
            );
            return Some(cached);
        }

        let mut candidates = self
            .converters
            .iter()
            .filter_map(|(kind, converter)| {
                if self.is_assignable(*kind, target) {
                    Some(converter.clone())
                } else if self.is_assignable(target, *kind) {
                    Some(self.narrow(converter.clone(), target))
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();

        let assembled = match candidates.len() {
            0 => return None,
            1 => candidates.pop()?,
            _ => {
                let names = candidates.iter().map(|c| c.name().to_owned()).collect::<Vec<_>>();
                Arc::new(FallbackConverter::new(names.join("|"), target, candidates).ok()?) as ConverterRef
            },
        };

        warn!(
            "No converter is registered for {target}, using {} assembled from related kinds. Input of another kind \
             will be rejected",
            assembled.name()
        );
        self.assembled.insert(target, assembled.clone());
        Some(assembled)
    }

    /// Wraps a converter of a supertype of `target` so that only values assignable to `target`
    /// get through.
    fn narrow(&self, converter: ConverterRef, target: ArgKind) -> ConverterRef {
        let relations = self.relations.clone();
        let name = format!("{}->{target}", converter.name());

        Arc::new(CombineConverter::new(name, target, converter, move |value, _| {
            Ok(assignable(&relations, value.kind(), target).then_some(value))
        }))
    }
}
