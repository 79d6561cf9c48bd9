//! Named bit fields and the per-register field map.

use std::collections::BTreeMap;

use crate::access::AccessMode;
use crate::error::{RegisterError, Result};

/// Immutable description of a named bit range `[low, high]`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Field {
    low: usize,
    high: usize,
    description: String,
    mode: AccessMode,
}

impl Field {
    /// Lowest bit index covered by the field.
    #[must_use]
    pub const fn low(&self) -> usize {
        self.low
    }

    /// Highest bit index covered by the field.
    #[must_use]
    pub const fn high(&self) -> usize {
        self.high
    }

    /// Number of bits covered.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.high - self.low + 1
    }

    /// Free-form description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Access mode of the field.
    #[must_use]
    pub const fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Whether the field shares at least one bit with `[low, high]`.
    #[must_use]
    pub const fn overlaps(&self, low: usize, high: usize) -> bool {
        !(low > self.high || high < self.low)
    }
}

/// Name-ordered collection of fields with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    fields: BTreeMap<String, Field>,
}

impl FieldMap {
    /// Empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    /// Adds a field.
    ///
    /// Overlap with an existing field is allowed and only logged.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::InvalidFieldRange`] when `high < low` and
    /// [`RegisterError::DuplicateField`] when the name is taken.
    pub fn add(
        &mut self,
        name: &str,
        low: usize,
        high: usize,
        description: &str,
        mode: AccessMode,
    ) -> Result<()> {
        if high < low {
            return Err(RegisterError::InvalidFieldRange {
                name: name.to_owned(),
                low,
                high,
            });
        }
        if self.fields.contains_key(name) {
            return Err(RegisterError::DuplicateField {
                name: name.to_owned(),
            });
        }
        for (other, field) in &self.fields {
            if field.overlaps(low, high) {
                tracing::warn!(
                    "field `{name}` [{low}..={high}] overlaps field `{other}` [{}..={}]",
                    field.low,
                    field.high
                );
            }
        }
        self.fields.insert(
            name.to_owned(),
            Field {
                low,
                high,
                description: description.to_owned(),
                mode,
            },
        );
        Ok(())
    }

    /// Looks a field up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Finds the first field, in name order, spanning exactly `[low, high]`.
    #[must_use]
    pub fn find_by_range(&self, low: usize, high: usize) -> Option<(&str, &Field)> {
        self.iter()
            .find(|(_, field)| field.low == low && field.high == high)
    }

    /// Iterates fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field is defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields sorted by low index; ties keep name order.
    ///
    /// With `accept_overlap == false`, a field is dropped when its low index is
    /// at or below the highest bit of the fields kept so far. The result is a
    /// display view with one representative per bit range.
    #[must_use]
    pub fn sorted_by_index(&self, accept_overlap: bool) -> Vec<(&str, &Field)> {
        let mut sorted: Vec<_> = self.iter().collect();
        sorted.sort_by_key(|(_, field)| field.low);
        if accept_overlap {
            return sorted;
        }
        let mut kept = Vec::with_capacity(sorted.len());
        let mut covered: Option<usize> = None;
        for (name, field) in sorted {
            if covered.is_some_and(|high| field.low <= high) {
                continue;
            }
            covered = Some(covered.map_or(field.high, |high| high.max(field.high)));
            kept.push((name, field));
        }
        kept
    }
}
