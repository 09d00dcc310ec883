use serde::{Deserialize, Serialize};

/// One enumerated tracker field value: what the user sees and what the
/// tracker API expects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub display_name: String,
    pub raw_value: String,
}

impl FieldOption {
    pub fn new(display_name: impl Into<String>, raw_value: impl Into<String>) -> Self {
        Self { display_name: display_name.into(), raw_value: raw_value.into() }
    }
}

/// Snapshot of the tracker's enumerated field values.
///
/// Populated at most once per process lifetime and immutable afterwards;
/// staleness until restart is an accepted trade-off.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValueMap {
    pub issue_types: Vec<FieldOption>,
    pub priorities: Vec<FieldOption>,
    pub components: Vec<FieldOption>,
    pub brands: Vec<FieldOption>,
    pub environments: Vec<FieldOption>,
}

impl FieldValueMap {
    pub fn resolve_issue_type(&self, candidate: &str) -> Option<&FieldOption> {
        resolve(&self.issue_types, candidate)
    }

    pub fn resolve_priority(&self, candidate: &str) -> Option<&FieldOption> {
        resolve(&self.priorities, candidate)
    }

    pub fn resolve_component(&self, candidate: &str) -> Option<&FieldOption> {
        resolve(&self.components, candidate)
    }

    pub fn resolve_brand(&self, candidate: &str) -> Option<&FieldOption> {
        resolve(&self.brands, candidate)
    }

    pub fn resolve_environment(&self, candidate: &str) -> Option<&FieldOption> {
        resolve(&self.environments, candidate)
    }
}

/// Match a candidate against an option list by display name
/// (case-insensitive) or exact raw value.
pub fn resolve<'a>(options: &'a [FieldOption], candidate: &str) -> Option<&'a FieldOption> {
    let trimmed = candidate.trim();
    options.iter().find(|option| {
        option.raw_value == trimmed || option.display_name.eq_ignore_ascii_case(trimmed)
    })
}

#[cfg(test)]
mod tests {
    use super::{resolve, FieldOption, FieldValueMap};

    fn snapshot() -> FieldValueMap {
        FieldValueMap {
            issue_types: vec![FieldOption::new("Bug", "10004"), FieldOption::new("Task", "10001")],
            priorities: vec![FieldOption::new("Medium", "Medium-P2")],
            components: vec![FieldOption::new("Checkout", "comp-11")],
            brands: Vec::new(),
            environments: vec![FieldOption::new("Production", "prod")],
        }
    }

    #[test]
    fn resolves_by_display_name_case_insensitively() {
        let fields = snapshot();
        let resolved = fields.resolve_priority("medium").expect("should resolve");
        assert_eq!(resolved.raw_value, "Medium-P2");
    }

    #[test]
    fn resolves_by_exact_raw_value() {
        let fields = snapshot();
        assert!(fields.resolve_issue_type("10004").is_some());
    }

    #[test]
    fn unknown_values_do_not_resolve() {
        let fields = snapshot();
        assert!(fields.resolve_priority("Blocker").is_none());
        assert!(resolve(&fields.components, "Billing").is_none());
    }
}
