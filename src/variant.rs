use std::collections::HashMap;

use crate::error::VariantError;

/// A record that names its own concrete type.
pub trait Discriminated {
    fn discriminant(&self) -> &str;
}

/// Maps the discriminant of an abstract record to the concrete type it is rendered as.
///
/// The mapping is fixed at construction and resolution looks only at the record itself. A record
/// whose discriminant is not mapped is an error; there is no fallback type.
#[derive(Debug, Clone)]
pub struct VariantResolver<T> {
    variants: HashMap<String, T>,
}

impl<T> VariantResolver<T> {
    /// Builds a resolver from `(discriminant, concrete type)` pairs. Mapping the same
    /// discriminant twice is rejected.
    pub fn new<I, S>(variants: I) -> Result<Self, VariantError>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
    {
        let mut map = HashMap::new();
        for (discriminant, concrete) in variants {
            let discriminant = discriminant.into();
            if map.contains_key(&discriminant) {
                return Err(VariantError::Duplicate { discriminant });
            }
            map.insert(discriminant, concrete);
        }
        Ok(Self { variants: map })
    }

    pub fn resolve<R>(&self, record: &R) -> Result<&T, VariantError>
    where
        R: Discriminated + ?Sized,
    {
        let discriminant = record.discriminant();
        self.variants
            .get(discriminant)
            .ok_or_else(|| VariantError::Unmatched { discriminant: discriminant.to_owned() })
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}
