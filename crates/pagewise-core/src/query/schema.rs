use crate::{
    error::AccessError,
    query::{SortDirection, SortSpec},
    record::{FieldKind, ID_FIELD, Normalizer},
};
use std::collections::BTreeMap;

/// Text group that searches every free-text field of a list.
pub const ANY_TEXT_GROUP: &str = "any";

///
/// FieldDef
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FieldDef {
    pub kind: FieldKind,
    pub indexed: bool,
}

///
/// ListSchema
///
/// Static description of one record list: which fields the store can
/// index, which fields are searched client-side, who owns a record, and the
/// baseline sort order.
///

#[derive(Clone, Debug)]
pub struct ListSchema {
    name: String,
    fields: BTreeMap<String, FieldDef>,
    text_groups: BTreeMap<String, Vec<String>>,
    owner_field: String,
    default_sort: SortSpec,
    status_field: Option<String>,
    amount_field: Option<String>,
}

impl ListSchema {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ListSchemaBuilder {
        ListSchemaBuilder {
            name: name.into(),
            fields: BTreeMap::new(),
            text_groups: BTreeMap::new(),
            owner_field: None,
            default_sort: None,
            status_field: None,
            amount_field: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<FieldDef> {
        self.fields.get(name).copied()
    }

    /// Whether the store can filter or sort on `name`.
    #[must_use]
    pub fn is_indexed(&self, name: &str) -> bool {
        name == ID_FIELD || self.field(name).is_some_and(|def| def.indexed)
    }

    #[must_use]
    pub fn text_group(&self, group: &str) -> Option<&[String]> {
        self.text_groups.get(group).map(Vec::as_slice)
    }

    pub fn text_groups(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.text_groups
            .iter()
            .map(|(group, fields)| (group.as_str(), fields.as_slice()))
    }

    #[must_use]
    pub fn owner_field(&self) -> &str {
        &self.owner_field
    }

    #[must_use]
    pub const fn default_sort(&self) -> &SortSpec {
        &self.default_sort
    }

    /// Field grouped by in list statistics, if any.
    #[must_use]
    pub fn status_field(&self) -> Option<&str> {
        self.status_field.as_deref()
    }

    /// Money field summed in list statistics, if any.
    #[must_use]
    pub fn amount_field(&self) -> Option<&str> {
        self.amount_field.as_deref()
    }

    /// Coercion rules for every declared field.
    #[must_use]
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(
            self.fields
                .iter()
                .map(|(name, def)| (name.clone(), def.kind)),
        )
    }
}

///
/// ListSchemaBuilder
///

#[derive(Debug)]
pub struct ListSchemaBuilder {
    name: String,
    fields: BTreeMap<String, FieldDef>,
    text_groups: BTreeMap<String, Vec<String>>,
    owner_field: Option<String>,
    default_sort: Option<SortSpec>,
    status_field: Option<String>,
    amount_field: Option<String>,
}

impl ListSchemaBuilder {
    /// Declare a field the store can filter and sort on.
    #[must_use]
    pub fn indexed(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.insert(
            name.into(),
            FieldDef {
                kind,
                indexed: true,
            },
        );
        self
    }

    /// Declare a field only evaluated client-side.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.insert(
            name.into(),
            FieldDef {
                kind,
                indexed: false,
            },
        );
        self
    }

    /// Declare a free-text field (client-side search only).
    #[must_use]
    pub fn text(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::Text)
    }

    /// Name a set of fields searched together by one text criterion.
    #[must_use]
    pub fn text_group<I, S>(mut self, group: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.text_groups
            .insert(group.into(), fields.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn owner(mut self, field: impl Into<String>) -> Self {
        self.owner_field = Some(field.into());
        self
    }

    #[must_use]
    pub fn default_sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.default_sort = Some(SortSpec::new(field, direction));
        self
    }

    #[must_use]
    pub fn status(mut self, field: impl Into<String>) -> Self {
        self.status_field = Some(field.into());
        self
    }

    #[must_use]
    pub fn amount(mut self, field: impl Into<String>) -> Self {
        self.amount_field = Some(field.into());
        self
    }

    pub fn build(mut self) -> Result<ListSchema, AccessError> {
        let owner_field = self
            .owner_field
            .take()
            .ok_or_else(|| schema_invalid(&self.name, "an owner field is required for scoping"))?;
        if !self.fields.get(&owner_field).is_some_and(|def| def.indexed) {
            return Err(schema_invalid(
                &self.name,
                format!("owner field '{owner_field}' must be declared as indexed"),
            ));
        }

        let default_sort = self
            .default_sort
            .take()
            .unwrap_or_else(|| SortSpec::new(ID_FIELD, SortDirection::Asc));
        let sort_indexed = default_sort.field == ID_FIELD
            || self
                .fields
                .get(&default_sort.field)
                .is_some_and(|def| def.indexed);
        if !sort_indexed {
            return Err(schema_invalid(
                &self.name,
                format!(
                    "default sort field '{}' must be declared as indexed",
                    default_sort.field
                ),
            ));
        }

        if let Some(status) = &self.status_field
            && !self.fields.contains_key(status)
        {
            return Err(schema_invalid(
                &self.name,
                format!("status field '{status}' is not declared"),
            ));
        }
        if let Some(amount) = &self.amount_field
            && self.fields.get(amount).map(|def| def.kind) != Some(FieldKind::Money)
        {
            return Err(schema_invalid(
                &self.name,
                format!("amount field '{amount}' must be declared as money"),
            ));
        }

        for (group, members) in &self.text_groups {
            if members.is_empty() {
                return Err(schema_invalid(
                    &self.name,
                    format!("text group '{group}' has no fields"),
                ));
            }
            if let Some(unknown) = members.iter().find(|m| !self.fields.contains_key(*m)) {
                return Err(schema_invalid(
                    &self.name,
                    format!("text group '{group}' references undeclared field '{unknown}'"),
                ));
            }
        }

        // money and timestamps are matched by range, never by substring
        if !self.text_groups.contains_key(ANY_TEXT_GROUP) {
            let searchable: Vec<String> = self
                .fields
                .iter()
                .filter(|(_, def)| !matches!(def.kind, FieldKind::Money | FieldKind::Timestamp))
                .map(|(name, _)| name.clone())
                .collect();
            self.text_groups
                .insert(ANY_TEXT_GROUP.to_string(), searchable);
        }

        Ok(ListSchema {
            name: self.name,
            fields: self.fields,
            text_groups: self.text_groups,
            owner_field,
            default_sort,
            status_field: self.status_field,
            amount_field: self.amount_field,
        })
    }
}

fn schema_invalid(name: &str, message: impl AsRef<str>) -> AccessError {
    AccessError::criteria_invalid(format!("list schema '{name}': {}", message.as_ref()))
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_group_defaults_to_non_range_fields() {
        let schema = ListSchema::builder("orders")
            .indexed("owner", FieldKind::Identifier)
            .indexed("created_at", FieldKind::Timestamp)
            .field("total", FieldKind::Money)
            .text("notes")
            .owner("owner")
            .build()
            .expect("schema should build");

        assert_eq!(
            schema.text_group(ANY_TEXT_GROUP),
            Some(["notes".to_string(), "owner".to_string()].as_slice())
        );
    }

    #[test]
    fn owner_field_must_be_indexed() {
        let err = ListSchema::builder("orders")
            .text("owner")
            .owner("owner")
            .build()
            .expect_err("non-indexed owner must be rejected");

        assert!(err.message.contains("must be declared as indexed"));
    }

    #[test]
    fn text_groups_must_reference_declared_fields() {
        let err = ListSchema::builder("orders")
            .indexed("owner", FieldKind::Identifier)
            .text_group("people", ["tech1"])
            .owner("owner")
            .build()
            .expect_err("unknown group member must be rejected");

        assert!(err.message.contains("undeclared field 'tech1'"));
    }

    #[test]
    fn amount_field_must_be_money() {
        let err = ListSchema::builder("orders")
            .indexed("owner", FieldKind::Identifier)
            .text("total")
            .amount("total")
            .owner("owner")
            .build()
            .expect_err("text amount must be rejected");

        assert!(err.message.contains("must be declared as money"));
    }

    #[test]
    fn default_sort_falls_back_to_identifier() {
        let schema = ListSchema::builder("orders")
            .indexed("owner", FieldKind::Identifier)
            .owner("owner")
            .build()
            .expect("schema should build");

        assert_eq!(schema.default_sort().field, ID_FIELD);
        assert!(schema.is_indexed(ID_FIELD));
    }
}
