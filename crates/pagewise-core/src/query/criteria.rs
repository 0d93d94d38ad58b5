use crate::query::SortDirection;

///
/// SearchCriteria
///
/// Raw, unvalidated search input exactly as a consumer collected it.
/// Blank values are dropped here; everything else is validated by
/// [`FilterSpec::from_criteria`](crate::query::FilterSpec::from_criteria).
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SearchCriteria {
    texts: Vec<(Option<String>, String)>,
    equals: Vec<(String, String)>,
    ranges: Vec<(String, String, bool)>,
    sort: Option<(String, SortDirection)>,
    owner: Option<String>,
}

impl SearchCriteria {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Substring search across every free-text field.
    #[must_use]
    pub fn text(mut self, needle: impl Into<String>) -> Self {
        let needle = needle.into();
        if !needle.trim().is_empty() {
            self.texts.push((None, needle));
        }
        self
    }

    /// Substring search across one named text group.
    #[must_use]
    pub fn text_in(mut self, group: impl Into<String>, needle: impl Into<String>) -> Self {
        let needle = needle.into();
        if !needle.trim().is_empty() {
            self.texts.push((Some(group.into()), needle));
        }
        self
    }

    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if !raw.trim().is_empty() {
            self.equals.push((field.into(), raw));
        }
        self
    }

    /// Inclusive lower bound.
    #[must_use]
    pub fn since(mut self, field: impl Into<String>, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if !raw.trim().is_empty() {
            self.ranges.push((field.into(), raw, false));
        }
        self
    }

    /// Inclusive upper bound; a bare date covers that whole day.
    #[must_use]
    pub fn until(mut self, field: impl Into<String>, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if !raw.trim().is_empty() {
            self.ranges.push((field.into(), raw, true));
        }
        self
    }

    #[must_use]
    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some((field.into(), direction));
        self
    }

    /// Restrict results to records owned by `owner`.
    #[must_use]
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        let owner = owner.into();
        let owner = owner.trim();
        self.owner = (!owner.is_empty()).then(|| owner.to_string());
        self
    }

    /// Whether the criteria ask for anything beyond the unfiltered baseline.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
            && self.equals.is_empty()
            && self.ranges.is_empty()
            && self.sort.is_none()
            && self.owner.is_none()
    }

    pub(crate) fn texts(&self) -> impl Iterator<Item = (Option<&str>, &str)> {
        self.texts
            .iter()
            .map(|(group, needle)| (group.as_deref(), needle.as_str()))
    }

    pub(crate) fn equals(&self) -> impl Iterator<Item = (&str, &str)> {
        self.equals
            .iter()
            .map(|(field, raw)| (field.as_str(), raw.as_str()))
    }

    /// `(field, raw, is_upper_bound)` in insertion order.
    pub(crate) fn ranges(&self) -> impl Iterator<Item = (&str, &str, bool)> {
        self.ranges
            .iter()
            .map(|(field, raw, upper)| (field.as_str(), raw.as_str(), *upper))
    }

    pub(crate) fn sort(&self) -> Option<(&str, SortDirection)> {
        self.sort
            .as_ref()
            .map(|(field, direction)| (field.as_str(), *direction))
    }

    pub(crate) fn owner_filter(&self) -> Option<&str> {
        self.owner.as_deref()
    }
}

///
/// TESTS
///
