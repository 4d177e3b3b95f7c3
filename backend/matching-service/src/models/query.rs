use crate::error::{MatchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A recommend request.
///
/// Built directly, deserialized, or parsed from the flat argument form:
///
/// ```text
/// cardinality
/// n_or   or_1 .. or_n
/// n_and  and_1 .. and_n
/// n_attr attr_1 .. attr_n
/// n_int  attr_1 weight_1 .. attr_n weight_n
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchQuery {
    /// Maximum number of matches returned
    pub cardinality: usize,
    /// Candidate pool: members holding any of these
    #[serde(default)]
    pub or_filters: Vec<String>,
    /// Hard gate: candidates must hold all of these
    #[serde(default)]
    pub and_filters: Vec<String>,
    /// Attributes of the querying member (others' interest in them)
    #[serde(default)]
    pub my_attributes: Vec<String>,
    /// Querying member's interest profile (their interest in others)
    #[serde(default)]
    pub my_interests: BTreeMap<String, f64>,
}

impl MatchQuery {
    pub fn new(cardinality: usize) -> Self {
        Self {
            cardinality,
            ..Default::default()
        }
    }

    pub fn with_or_filters<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.or_filters = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_and_filters<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.and_filters = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_my_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.my_attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_my_interests<I, S>(mut self, interests: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        self.my_interests = interests
            .into_iter()
            .map(|(attribute, weight)| (attribute.into(), weight))
            .collect();
        self
    }

    /// Parse the flat argument form. Every declared count must match the
    /// arguments that follow it and nothing may be left over.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let mut cursor = ArgCursor::new(args);

        let cardinality = cursor.count("cardinality")?;
        let or_filters = cursor.list("or_filters")?;
        let and_filters = cursor.list("and_filters")?;
        let my_attributes = cursor.list("my_attributes")?;

        let n_interests = cursor.count("my_interests count")?;
        let mut my_interests = BTreeMap::new();
        for _ in 0..n_interests {
            let attribute = cursor.next("my_interests attribute")?.to_string();
            let weight = cursor.weight(&attribute)?;
            if my_interests.contains_key(&attribute) {
                return Err(MatchError::InvalidQuery(format!(
                    "interest in {} given more than once",
                    attribute
                )));
            }
            my_interests.insert(attribute, weight);
        }

        cursor.finish()?;

        let query = Self {
            cardinality,
            or_filters,
            and_filters,
            my_attributes,
            my_interests,
        };
        query.validate()?;
        Ok(query)
    }

    /// Reject empty attribute names and weights that are negative or not finite.
    pub fn validate(&self) -> Result<()> {
        let attributes = self
            .or_filters
            .iter()
            .chain(&self.and_filters)
            .chain(&self.my_attributes)
            .chain(self.my_interests.keys());

        for attribute in attributes {
            if attribute.is_empty() {
                return Err(MatchError::InvalidQuery(
                    "attribute must not be empty".to_string(),
                ));
            }
        }

        for (attribute, weight) in &self.my_interests {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(MatchError::InvalidQuery(format!(
                    "interest weight for {} must be a finite non-negative number, got {}",
                    attribute, weight
                )));
            }
        }

        Ok(())
    }
}

struct ArgCursor<'a, S> {
    args: &'a [S],
    pos: usize,
}

impl<'a, S: AsRef<str>> ArgCursor<'a, S> {
    fn new(args: &'a [S]) -> Self {
        Self { args, pos: 0 }
    }

    fn next(&mut self, what: &str) -> Result<&'a str> {
        let arg = self.args.get(self.pos).ok_or_else(|| {
            MatchError::InvalidQuery(format!(
                "expected {} at argument {}, found end of input",
                what, self.pos
            ))
        })?;
        self.pos += 1;
        Ok(arg.as_ref())
    }

    fn count(&mut self, what: &str) -> Result<usize> {
        let raw = self.next(what)?;
        raw.trim().parse::<usize>().map_err(|_| {
            MatchError::InvalidQuery(format!("{} must be a non-negative integer, got {:?}", what, raw))
        })
    }

    fn list(&mut self, what: &str) -> Result<Vec<String>> {
        let n = self.count(&format!("{} count", what))?;
        let remaining = self.args.len() - self.pos;
        if n > remaining {
            return Err(MatchError::InvalidQuery(format!(
                "{} declares {} entries but only {} arguments remain",
                what, n, remaining
            )));
        }
        (0..n)
            .map(|_| self.next(what).map(str::to_string))
            .collect()
    }

    fn weight(&mut self, attribute: &str) -> Result<f64> {
        let raw = self.next("my_interests weight")?;
        raw.trim().parse::<f64>().map_err(|_| {
            MatchError::InvalidQuery(format!(
                "interest weight for {} is not a number: {:?}",
                attribute, raw
            ))
        })
    }

    fn finish(&self) -> Result<()> {
        if self.pos != self.args.len() {
            return Err(MatchError::InvalidQuery(format!(
                "{} unexpected trailing arguments",
                self.args.len() - self.pos
            )));
        }
        Ok(())
    }
}
