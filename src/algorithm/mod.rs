// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Value-transform algorithms.
//!
//! An algorithm rewrites a field's value in place just before encoding (or
//! while publishing decoded values). Two shapes exist:
//! - unary: sees only the field's own value
//! - with references: also receives the current values of named sibling
//!   fields, written `"name:ref_a:ref_b"` in a schema
//!
//! # Registration discipline
//!
//! [`AlgorithmRegistry`] is built with `&mut self` registration calls and
//! then shared immutably. All registration must complete before any
//! concurrent encode/decode traffic begins; registering while traffic is
//! live is unsupported.

pub mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::core::{DcclError, Result, Value, ValueMap};

/// Transform of the field's own value.
pub type UnaryAlgorithm = Box<dyn Fn(&mut Value) + Send + Sync>;

/// Transform that also receives referenced sibling values, in reference order.
pub type ReferenceAlgorithm = Box<dyn Fn(&mut Value, &[Value]) + Send + Sync>;

enum Algorithm {
    Unary(UnaryAlgorithm),
    WithReferences(ReferenceAlgorithm),
}

/// One algorithm application parsed from `"name:ref1:ref2"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlgorithmCall {
    /// Registered algorithm name
    pub name: String,
    /// Referenced sibling field names
    pub refs: Vec<String>,
}

impl AlgorithmCall {
    /// Parse an algorithm string. Whitespace is ignored.
    pub fn parse(spec: &str) -> Result<Self> {
        let compact: String = spec.chars().filter(|c| !c.is_whitespace()).collect();
        let mut parts = compact.split(':');
        let name = parts.next().unwrap_or_default().to_string();
        if name.is_empty() {
            return Err(DcclError::parse(
                "algorithm",
                format!("empty algorithm name in '{spec}'"),
            ));
        }
        let refs: Vec<String> = parts.map(str::to_string).collect();
        if refs.iter().any(String::is_empty) {
            return Err(DcclError::parse(
                "algorithm",
                format!("empty field reference in '{spec}'"),
            ));
        }
        Ok(Self { name, refs })
    }
}

impl FromStr for AlgorithmCall {
    type Err = DcclError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for AlgorithmCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for r in &self.refs {
            write!(f, ":{r}")?;
        }
        Ok(())
    }
}

/// Name-keyed registry of algorithms.
#[derive(Default)]
pub struct AlgorithmRegistry {
    algorithms: HashMap<String, Algorithm>,
}

impl AlgorithmRegistry {
    /// Create an empty registry.
    ///
    /// An empty registry skips the unknown-name check at schema compile time,
    /// which lets tests compile schemas naming algorithms they never run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in algorithms.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Register a unary algorithm, replacing any algorithm of the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&mut Value) + Send + Sync + 'static,
    {
        self.algorithms
            .insert(name.into(), Algorithm::Unary(Box::new(f)));
    }

    /// Register an algorithm taking referenced sibling values.
    pub fn register_with_refs<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&mut Value, &[Value]) + Send + Sync + 'static,
    {
        self.algorithms
            .insert(name.into(), Algorithm::WithReferences(Box::new(f)));
    }

    /// Check if an algorithm is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.algorithms.contains_key(name)
    }

    /// Number of registered algorithms.
    pub fn len(&self) -> usize {
        self.algorithms.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.algorithms.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.algorithms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Validate a call against this registry and the schema's field names.
    ///
    /// The name check is skipped while the registry is empty; references
    /// are always checked.
    pub fn check(
        &self,
        schema: &str,
        call: &AlgorithmCall,
        is_field: impl Fn(&str) -> bool,
    ) -> Result<()> {
        if !self.is_empty() && !self.contains(&call.name) {
            return Err(DcclError::unknown_algorithm(schema, &call.name));
        }
        if let Some(missing) = call.refs.iter().find(|r| !is_field(r.as_str())) {
            return Err(DcclError::unknown_reference(schema, &call.name, missing));
        }
        Ok(())
    }

    /// Apply `call` to `value`, the element at `index` of its field.
    ///
    /// Absent values are left untouched. Each reference resolves to the
    /// referenced field's element at `index`, falling back to element 0.
    pub fn apply(&self, call: &AlgorithmCall, value: &mut Value, index: usize, values: &ValueMap) {
        if value.is_empty() {
            return;
        }
        match self.algorithms.get(&call.name) {
            Some(Algorithm::Unary(f)) => f(value),
            Some(Algorithm::WithReferences(f)) => {
                let refs: Vec<Value> = call
                    .refs
                    .iter()
                    .map(|r| reference_value(values, r, index))
                    .collect();
                f(value, &refs)
            }
            None => warn!(algorithm = %call.name, "algorithm not registered, skipping"),
        }
    }

    /// Apply every call in order.
    pub fn apply_all(
        &self,
        calls: &[AlgorithmCall],
        value: &mut Value,
        index: usize,
        values: &ValueMap,
    ) {
        for call in calls {
            self.apply(call, value, index, values);
        }
    }
}

impl fmt::Debug for AlgorithmRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmRegistry")
            .field("algorithms", &self.names())
            .finish()
    }
}

fn reference_value(values: &ValueMap, name: &str, index: usize) -> Value {
    values
        .get(name)
        .and_then(|v| v.get(index).or_else(|| v.first()))
        .cloned()
        .unwrap_or_default()
}
