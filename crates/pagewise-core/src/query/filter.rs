use crate::{
    error::AccessError,
    query::{ANY_TEXT_GROUP, FilterFingerprint, ListSchema, SearchCriteria},
    record::{FieldKind, ID_FIELD, RecordId},
    value::{Timestamp, Value, strict_order_cmp},
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

///
/// SortDirection
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Orient an ascending comparison result.
    #[must_use]
    pub const fn apply(self, ord: Ordering) -> Ordering {
        match self {
            Self::Asc => ord,
            Self::Desc => ord.reverse(),
        }
    }
}

///
/// SortSpec
///
/// Single explicit sort key. The record identifier is always the implicit
/// tie-break, in the same direction.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    #[must_use]
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    #[must_use]
    pub const fn is_range(self) -> bool {
        !matches!(self, Self::Eq)
    }

    /// Evaluate `left <op> right`; mismatched value families never match.
    #[must_use]
    pub fn eval(self, left: &Value, right: &Value) -> bool {
        if matches!(self, Self::Eq) {
            return left == right
                || strict_order_cmp(left, right).is_some_and(Ordering::is_eq);
        }

        strict_order_cmp(left, right).is_some_and(|ord| match self {
            Self::Eq => ord.is_eq(),
            Self::Lt => ord.is_lt(),
            Self::Lte => ord.is_le(),
            Self::Gt => ord.is_gt(),
            Self::Gte => ord.is_ge(),
        })
    }
}

///
/// ComparePredicate
///
/// Equality or range predicate on one indexed field; the store evaluates it.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ComparePredicate {
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}

impl ComparePredicate {
    #[must_use]
    pub fn new(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

///
/// TextPredicate
///
/// Case-insensitive substring match across a group of fields.
/// The store cannot evaluate it; the needle is stored already lower-cased.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TextPredicate {
    pub group: String,
    pub fields: Vec<String>,
    pub needle: String,
}

///
/// FilterSpec
///
/// Normalized query intent. The split between store predicates and
/// client predicates is decided at construction and never changes; scoping
/// produces a new spec rather than editing this one.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    store_predicates: Vec<ComparePredicate>,
    client_predicates: Vec<TextPredicate>,
    sort: SortSpec,
    owner_scope: Option<RecordId>,
}

impl FilterSpec {
    /// Unfiltered spec in the schema's baseline order.
    #[must_use]
    pub fn unfiltered(schema: &ListSchema) -> Self {
        Self {
            store_predicates: Vec::new(),
            client_predicates: Vec::new(),
            sort: schema.default_sort().clone(),
            owner_scope: None,
        }
    }

    /// Validate and normalize raw user criteria against `schema`.
    ///
    /// Nothing here touches the store; every failure is a synchronous
    /// `ValidationFailed` (or `QueryUnsupported` for shapes the store can
    /// never execute).
    pub fn from_criteria(schema: &ListSchema, criteria: &SearchCriteria) -> Result<Self, AccessError> {
        let normalizer = schema.normalizer();
        let mut spec = Self::unfiltered(schema);

        let mut owner = criteria.owner_filter().map(RecordId::from);
        for (field, raw) in criteria.equals() {
            if field == schema.owner_field() {
                let requested = RecordId::from(raw.trim());
                if owner.as_ref().is_some_and(|current| *current != requested) {
                    return Err(AccessError::criteria_invalid(
                        "two different owners were requested; pick one owner",
                    ));
                }
                owner = Some(requested);
                continue;
            }
            ensure_indexed(schema, field)?;
            let value = normalizer
                .criterion(field, raw)
                .map_err(|err| AccessError::criteria_invalid(err.to_string()))?;
            spec.store_predicates
                .push(ComparePredicate::new(field, CompareOp::Eq, value));
        }

        let mut range_field: Option<&str> = None;
        let mut lower: Option<Value> = None;
        let mut upper: Option<Value> = None;
        for (field, raw, is_upper) in criteria.ranges() {
            ensure_indexed(schema, field)?;
            if let Some(existing) = range_field.filter(|existing| *existing != field) {
                return Err(AccessError::criteria_unsupported(format!(
                    "range filters on both '{existing}' and '{field}' cannot run together; keep only one date or number range"
                )));
            }
            range_field = Some(field);

            let mut value = normalizer
                .criterion(field, raw)
                .map_err(|err| AccessError::criteria_invalid(err.to_string()))?;
            // a bare day as upper bound includes the whole day
            if is_upper
                && is_date_only(schema, field, raw)
                && let Value::Timestamp(ts) = value
            {
                value = Value::Timestamp(ts.end_of_day());
            }

            let op = if is_upper { CompareOp::Lte } else { CompareOp::Gte };
            if is_upper {
                upper = Some(value.clone());
            } else {
                lower = Some(value.clone());
            }
            spec.store_predicates.push(ComparePredicate::new(field, op, value));
        }

        if let (Some(lo), Some(hi)) = (&lower, &upper)
            && strict_order_cmp(lo, hi).is_some_and(Ordering::is_gt)
        {
            return Err(AccessError::criteria_invalid(
                "the start of the range is after its end; swap the two values",
            ));
        }

        for (group, needle) in criteria.texts() {
            let needle = needle.trim().to_lowercase();
            if needle.is_empty() {
                continue;
            }
            let group = group.unwrap_or(ANY_TEXT_GROUP);
            let fields = schema.text_group(group).ok_or_else(|| {
                AccessError::criteria_invalid(format!("unknown search group '{group}'"))
            })?;
            spec.client_predicates.push(TextPredicate {
                group: group.to_string(),
                fields: fields.to_vec(),
                needle,
            });
        }

        if let Some((field, direction)) = criteria.sort() {
            if !schema.is_indexed(field) {
                return Err(AccessError::criteria_invalid(format!(
                    "cannot sort by '{field}'; choose an indexed field"
                )));
            }
            spec.sort = SortSpec::new(field, direction);
        }

        if let Some(field) = range_field
            && field != spec.sort.field
        {
            return Err(AccessError::criteria_unsupported(format!(
                "a range on '{field}' needs the list sorted by '{field}'; sort by it or remove the range"
            )));
        }

        if let Some(owner) = owner {
            spec = spec.scoped_to(schema.owner_field(), &owner);
        }

        Ok(spec)
    }

    #[must_use]
    pub fn store_predicates(&self) -> &[ComparePredicate] {
        &self.store_predicates
    }

    #[must_use]
    pub fn client_predicates(&self) -> &[TextPredicate] {
        &self.client_predicates
    }

    #[must_use]
    pub const fn sort(&self) -> &SortSpec {
        &self.sort
    }

    #[must_use]
    pub const fn owner_scope(&self) -> Option<&RecordId> {
        self.owner_scope.as_ref()
    }

    /// Whether the spec needs client-side evaluation at all.
    #[must_use]
    pub const fn has_client_predicates(&self) -> bool {
        !self.client_predicates.is_empty()
    }

    /// Store predicates other than the one injected by owner scoping.
    pub fn unscoped_store_predicates(
        &self,
        owner_field: &str,
    ) -> impl Iterator<Item = &ComparePredicate> {
        let pinned = self
            .owner_scope
            .as_ref()
            .map(|owner| ComparePredicate::new(owner_field, CompareOp::Eq, owner.as_str()));

        self.store_predicates
            .iter()
            .filter(move |pred| pinned.as_ref() != Some(*pred))
    }

    /// Stable fingerprint for logs and metrics.
    #[must_use]
    pub fn fingerprint(&self) -> FilterFingerprint {
        FilterFingerprint::of(self)
    }

    /// New spec restricted to `owner`. Used only by the scope resolver.
    pub(crate) fn scoped_to(&self, owner_field: &str, owner: &RecordId) -> Self {
        let mut next = self.clone();
        let pinned = ComparePredicate::new(owner_field, CompareOp::Eq, owner.as_str());
        if !next.store_predicates.contains(&pinned) {
            next.store_predicates.insert(0, pinned);
        }
        next.owner_scope = Some(owner.clone());

        next
    }
}

fn ensure_indexed(schema: &ListSchema, field: &str) -> Result<(), AccessError> {
    if field == ID_FIELD || schema.is_indexed(field) {
        return Ok(());
    }
    if schema.field(field).is_some() {
        return Err(AccessError::criteria_invalid(format!(
            "'{field}' is searchable only through text search; use a text criterion instead"
        )));
    }

    Err(AccessError::criteria_invalid(format!(
        "unknown field '{field}'"
    )))
}

fn is_date_only(schema: &ListSchema, field: &str, raw: &str) -> bool {
    schema
        .field(field)
        .is_some_and(|def| def.kind == FieldKind::Timestamp)
        && Timestamp::parse_rfc3339(raw.trim()).is_none()
        && Timestamp::parse_date(raw.trim()).is_some()
}

///
/// TESTS
///
