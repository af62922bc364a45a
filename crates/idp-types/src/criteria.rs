/// A scalar field the Document Store can filter on with equality.
///
/// Grounded on the `params[attr] = ...` assignments in
/// `controller.py::_get_query_parameters`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarField {
    V2,
    PubYear,
    Collab,
    Surnames,
    Volume,
    Number,
    Suppl,
    ElocationId,
    Fpage,
    FpageSeq,
    Lpage,
    PartialBody,
}

/// An embedded-list field that contributes a disjunctive (`OR`) subquery
/// when it carries more than one value.
///
/// Grounded on `mongo_db.py::_get_EmbeddedDocumentListField_query_params`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListField {
    IssnValue,
    DoiValue,
    ArticleTitleText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    UpdatedDesc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination { page: 1, per_page: 50 }
    }
}

/// The storage-engine-independent query a Dedup Resolver probe issues.
///
/// Scalar equalities are AND'd together; each `ListField` group degrades to
/// an equality when it carries one value, otherwise contributes an `OR`
/// subquery; different `ListField` groups are AND'd with each other and
/// with the scalar equalities (spec.md §4.3). The Document Store translates
/// this value into whatever native query language it uses (spec.md §9's
/// "abstract `Criteria` value" redesign note).
#[derive(Debug, Clone, Default)]
pub struct Criteria {
    pub equals: Vec<(ScalarField, String)>,
    pub or_groups: Vec<(ListField, Vec<String>)>,
    pub pagination: Pagination,
    pub order_by: Option<OrderBy>,
}

impl Criteria {
    pub fn new() -> Self {
        Criteria { order_by: Some(OrderBy::UpdatedDesc), ..Default::default() }
    }

    pub fn eq(mut self, field: ScalarField, value: impl Into<String>) -> Self {
        self.equals.push((field, value.into()));
        self
    }

    /// Skip the constraint entirely when `values` is empty; degrade to a
    /// plain equality when it carries exactly one value.
    pub fn or_values(mut self, field: ListField, values: Vec<String>) -> Self {
        if !values.is_empty() {
            self.or_groups.push((field, values));
        }
        self
    }

    pub fn paginate(mut self, page: u32, per_page: u32) -> Self {
        self.pagination = Pagination { page, per_page };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn or_values_skips_empty_lists() {
        let criteria = Criteria::new().or_values(ListField::IssnValue, vec![]);
        assert!(criteria.or_groups.is_empty());
    }

    #[test]
    fn builder_accumulates_constraints() {
        let criteria = Criteria::new()
            .eq(ScalarField::PubYear, "2022")
            .or_values(ListField::IssnValue, vec!["1234-9876".into()]);
        assert_eq!(criteria.equals.len(), 1);
        assert_eq!(criteria.or_groups.len(), 1);
    }
}
