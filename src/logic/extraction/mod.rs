pub mod response;
pub mod rules;
pub mod treatments;

pub use response::ResponseExtractor;
pub use treatments::TreatmentExtractor;

/// One best-effort pattern for locating a field in a model reply.
pub trait FieldRule<T>: Send + Sync {
    /// Unique identifier for this rule
    fn id(&self) -> &'static str;

    /// Try to locate the field; `None` hands over to the next rule
    fn apply(&self, text: &str) -> Option<T>;
}

/// Ordered rules for one field. The first rule that matches wins.
pub struct FieldRules<T> {
    field: &'static str,
    rules: Vec<Box<dyn FieldRule<T>>>,
}

impl<T> FieldRules<T> {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            rules: Vec::new(),
        }
    }

    pub fn with(mut self, rule: impl FieldRule<T> + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn first_match(&self, text: &str) -> Option<T> {
        self.rules.iter().find_map(|rule| {
            let value = rule.apply(text)?;
            tracing::trace!(field = self.field, rule = rule.id(), "extraction rule matched");
            Some(value)
        })
    }

    /// Apply a single rule by id, for inspecting rules in isolation.
    pub fn apply_rule(&self, rule_id: &str, text: &str) -> Option<T> {
        self.rules
            .iter()
            .find(|r| r.id() == rule_id)
            .and_then(|rule| rule.apply(text))
    }

    pub fn list_rules(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.id()).collect()
    }
}
