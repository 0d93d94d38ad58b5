use crate::{error::AccessError, query::FilterSpec, record::RecordId};
use serde::{Deserialize, Serialize};

///
/// Visibility
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Visibility {
    /// Every record of the list.
    Broad,
    /// Only records owned by or assigned to the caller.
    Narrow,
}

///
/// Role
///
/// Permission class of a caller.
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Role {
    Administrative,
    Executive,
    Technician,
}

impl Role {
    /// Map a free-form employee type onto a role.
    ///
    /// Unknown types get the narrowest role.
    #[must_use]
    pub fn from_employee_type(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "director" | "manager" | "executive" => Self::Executive,
            "administrator" | "administrative" => Self::Administrative,
            _ => Self::Technician,
        }
    }

    #[must_use]
    pub const fn visibility(self) -> Visibility {
        match self {
            Self::Administrative | Self::Executive => Visibility::Broad,
            Self::Technician => Visibility::Narrow,
        }
    }
}

///
/// Caller
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Caller {
    pub id: RecordId,
    pub role: Role,
}

impl Caller {
    #[must_use]
    pub fn new(id: impl Into<RecordId>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

///
/// RoleScopeResolver
///
/// Narrows a filter to what the caller may see. Runs before any store
/// request, so a denied scope never costs a round-trip.
///

#[derive(Clone, Debug)]
pub struct RoleScopeResolver {
    owner_field: String,
}

impl RoleScopeResolver {
    #[must_use]
    pub fn new(owner_field: impl Into<String>) -> Self {
        Self {
            owner_field: owner_field.into(),
        }
    }

    #[must_use]
    pub fn owner_field(&self) -> &str {
        &self.owner_field
    }

    /// Return the filter the caller is allowed to run.
    ///
    /// Broad callers get `filter` back unchanged. Narrow callers get a new
    /// filter pinned to their own identifier; asking for someone else's
    /// records is denied.
    pub fn scope(&self, filter: &FilterSpec, caller: &Caller) -> Result<FilterSpec, AccessError> {
        match caller.role.visibility() {
            Visibility::Broad => Ok(filter.clone()),
            Visibility::Narrow => {
                if let Some(owner) = filter.owner_scope()
                    && *owner != caller.id
                {
                    return Err(AccessError::scope_denied(format!(
                        "records owned by {owner} are not visible to {}; search your own records instead",
                        caller.id
                    )));
                }

                Ok(filter.scoped_to(&self.owner_field, &caller.id))
            }
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        query::{CompareOp, ComparePredicate, SearchCriteria},
        test_support::work_orders,
    };

    #[test]
    fn employee_types_map_to_roles() {
        assert_eq!(Role::from_employee_type("Manager"), Role::Executive);
        assert_eq!(Role::from_employee_type(" administrative "), Role::Administrative);
        assert_eq!(Role::from_employee_type("operator"), Role::Technician);
        assert_eq!(Role::from_employee_type("intern"), Role::Technician);
    }

    #[test]
    fn broad_callers_pass_through() {
        let schema = work_orders();
        let filter = FilterSpec::unfiltered(&schema);
        let resolver = RoleScopeResolver::new(schema.owner_field());

        let scoped = resolver
            .scope(&filter, &Caller::new("boss", Role::Executive))
            .expect("scope should succeed");

        assert_eq!(scoped, filter);
    }

    #[test]
    fn narrow_callers_get_an_owner_predicate() {
        let schema = work_orders();
        let filter = FilterSpec::from_criteria(&schema, &SearchCriteria::new().eq("status", "open"))
            .expect("criteria should normalize");
        let resolver = RoleScopeResolver::new(schema.owner_field());

        let scoped = resolver
            .scope(&filter, &Caller::new("u-1", Role::Technician))
            .expect("scope should succeed");

        assert_eq!(scoped.owner_scope(), Some(&RecordId::from("u-1")));
        assert_eq!(
            scoped.store_predicates()[0],
            ComparePredicate::new("owner", CompareOp::Eq, "u-1")
        );
        assert_eq!(filter.owner_scope(), None, "input filter must be untouched");
    }

    #[test]
    fn narrow_callers_cannot_request_other_owners() {
        let schema = work_orders();
        let filter = FilterSpec::from_criteria(&schema, &SearchCriteria::new().owner("u-2"))
            .expect("criteria should normalize");
        let resolver = RoleScopeResolver::new(schema.owner_field());

        let err = resolver
            .scope(&filter, &Caller::new("u-1", Role::Technician))
            .expect_err("foreign owner must be denied");

        assert_eq!(err.kind, ErrorKind::PermissionDenied);
    }

    #[test]
    fn scoping_twice_does_not_duplicate_the_predicate() {
        let schema = work_orders();
        let resolver = RoleScopeResolver::new(schema.owner_field());
        let caller = Caller::new("u-1", Role::Technician);

        let once = resolver
            .scope(&FilterSpec::unfiltered(&schema), &caller)
            .expect("scope should succeed");
        let twice = resolver.scope(&once, &caller).expect("scope should succeed");

        assert_eq!(once, twice);
    }
}
