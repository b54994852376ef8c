//! Axes, activations, and the path-aware constraint state threaded through
//! planning (`spec.md` §3.3, §4.2.2).

use std::collections::BTreeSet;
use std::fmt;

use ahash::{HashMap, HashMapExt};

/// A named dimension with a finite, non-empty set of choices.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Axis {
    pub name: String,
    pub choices: BTreeSet<String>,
}

impl Axis {
    /// Build an axis. Panics if `choices` is empty — an axis with no
    /// choices can never be satisfied by any activation.
    pub fn new(name: impl Into<String>, choices: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let choices: BTreeSet<String> = choices.into_iter().map(Into::into).collect();
        assert!(!choices.is_empty(), "an Axis must have at least one choice");
        Self {
            name: name.into(),
            choices,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// `(axis, choice)` with `choice` validated to be one of `axis`'s choices.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct AxisPoint {
    pub axis: Axis,
    pub choice: String,
}

/// The error returned when an [`AxisPoint`] or [`Activation`] is built from
/// inconsistent data.
#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum AxisError {
    #[error("`{choice}` is not one of the choices declared for axis `{axis}`")]
    UnknownChoice { axis: String, choice: String },
    #[error("axis `{axis}` was given two different choices: `{first}` and `{second}`")]
    ConflictingPoints {
        axis: String,
        first: String,
        second: String,
    },
}

impl AxisPoint {
    pub fn new(axis: Axis, choice: impl Into<String>) -> Result<Self, AxisError> {
        let choice = choice.into();
        if !axis.choices.contains(&choice) {
            return Err(AxisError::UnknownChoice {
                axis: axis.name,
                choice,
            });
        }
        Ok(Self { axis, choice })
    }
}

/// A function `Axis -> choice`: the base activation supplied by the caller
/// of `produce`/`plan` for an entire call (`spec.md` §3.3).
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Activation {
    points: HashMap<String, AxisPoint>,
}

impl Activation {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an activation from a set of points. Fails if two points name
    /// the same axis with different choices.
    pub fn of(points: impl IntoIterator<Item = AxisPoint>) -> Result<Self, AxisError> {
        let mut map = HashMap::new();
        for point in points {
            if let Some(existing) = map.get(&point.axis.name) {
                let existing: &AxisPoint = existing;
                if existing.choice != point.choice {
                    return Err(AxisError::ConflictingPoints {
                        axis: point.axis.name.clone(),
                        first: existing.choice.clone(),
                        second: point.choice,
                    });
                }
            }
            map.insert(point.axis.name.clone(), point);
        }
        Ok(Self { points: map })
    }

    /// The choice selected for `axis`, if the activation constrains it.
    pub fn choice(&self, axis: &Axis) -> Option<&str> {
        self.points.get(&axis.name).map(|p| p.choice.as_str())
    }

    pub fn points(&self) -> impl Iterator<Item = &AxisPoint> {
        self.points.values()
    }
}

/// A map `Axis -> choice` attached to a binding (`spec.md` §3.3).
///
/// Empty tags mean "applies everywhere". Specificity is the tag set's
/// cardinality.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct BindingTags {
    tags: HashMap<String, AxisPoint>,
}

impl BindingTags {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn single(point: AxisPoint) -> Self {
        let mut tags = HashMap::new();
        tags.insert(point.axis.name.clone(), point);
        Self { tags }
    }

    pub fn with(mut self, point: AxisPoint) -> Self {
        self.tags.insert(point.axis.name.clone(), point);
        self
    }

    /// The number of tags in this set — higher specificity wins when two
    /// candidates both match (`spec.md` §4.2.3).
    pub fn specificity(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AxisPoint> {
        self.tags.values()
    }

    pub fn choice_on(&self, axis_name: &str) -> Option<&str> {
        self.tags.get(axis_name).map(|p| p.choice.as_str())
    }

    /// A tag set **matches** an activation iff every `(axis, choice)` pair in
    /// the tag set names the same choice the activation selects on that
    /// axis.
    pub fn matches_activation(&self, activation: &Activation) -> bool {
        self.tags.values().all(|point| {
            activation.choice(&point.axis) == Some(point.choice.as_str())
        })
    }
}

/// The `(required, forbidden)` axis-choice state accumulated along a
/// traversal path (`spec.md` §4.2.2, GLOSSARY).
#[derive(Debug, Clone, Default)]
pub struct PathActivation {
    required: HashMap<String, BTreeSet<String>>,
    forbidden: HashMap<String, BTreeSet<String>>,
}

impl PathActivation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in the tags of a binding that was just selected on the current
    /// path: its choice becomes required on that axis, every other choice of
    /// that axis becomes forbidden.
    pub fn constrained_by(&self, tags: &BindingTags) -> Self {
        let mut next = self.clone();
        for point in tags.iter() {
            next.required
                .entry(point.axis.name.clone())
                .or_default()
                .insert(point.choice.clone());
            let forbidden = next.forbidden.entry(point.axis.name.clone()).or_default();
            for other in point.axis.choices.iter().filter(|c| *c != &point.choice) {
                forbidden.insert(other.clone());
            }
        }
        next
    }

    fn required_choices(&self, axis_name: &str) -> Option<&BTreeSet<String>> {
        self.required.get(axis_name).filter(|s| !s.is_empty())
    }

    fn is_forbidden(&self, axis_name: &str, choice: &str) -> bool {
        self.forbidden
            .get(axis_name)
            .map(|s| s.contains(choice))
            .unwrap_or(false)
    }

    /// A candidate is valid under this path iff, for every axis it has a tag
    /// on that the path already constrains, its choice is among the
    /// required choices (when any are required) and not forbidden
    /// (`spec.md` §4.2.3 point 2).
    pub fn allows(&self, tags: &BindingTags) -> bool {
        tags.iter().all(|point| {
            let axis = &point.axis.name;
            if self.is_forbidden(axis, &point.choice) {
                return false;
            }
            match self.required_choices(axis) {
                Some(required) => required.contains(&point.choice),
                None => true,
            }
        })
    }

    /// A human-legible description of why `tags` fails this path's
    /// constraints, e.g. `"Env must be Test"` (`spec.md` §4.2.3's
    /// `AxisConflict` rendering).
    pub fn describe_conflict(&self, tags: &BindingTags) -> Option<String> {
        for point in tags.iter() {
            let axis = &point.axis.name;
            if self.is_forbidden(axis, &point.choice) {
                if let Some(required) = self.required_choices(axis) {
                    if let Some(choice) = required.iter().next() {
                        return Some(format!("{axis} must be {choice}"));
                    }
                }
                return Some(format!("{axis} must not be {}", point.choice));
            }
            if let Some(required) = self.required_choices(axis) {
                if !required.contains(&point.choice) {
                    if let Some(choice) = required.iter().next() {
                        return Some(format!("{axis} must be {choice}"));
                    }
                }
            }
        }
        None
    }
}
