use super::{Operator, RateLimit, RateRule};
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Member names a child id may not take, since children sit beside them in the JSON object.
const FIELD_NAMES: [&str; 5] = ["id", "parentId", "operator", "rates", "when"];

/// A hierarchy of rules registered in one request.
///
/// Children are keyed by id and serialized inline with their parent's fields:
///
/// ```json
/// { "id": "web", "operator": "NONE", "rates": [{ "rate": "99/s" }],
///   "login":  { "operator": "NONE", "rates": [{ "rate": "5/m" }] },
///   "search": { "operator": "NONE", "rates": [{ "rate": "20/s" }], "when": "web.session.id!=" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateTree {
    /// Root id. Children take their id from their key and leave this empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub operator: Operator,
    #[serde(default)]
    pub rates: Vec<RateLimit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(flatten)]
    pub children: BTreeMap<String, RateTree>,
}

impl RateTree {
    pub fn new(id: impl Into<String>, rates: Vec<RateLimit>) -> Self {
        Self { id: id.into(), rates, ..Self::default() }
    }

    /// Single-limit node from a rate expression.
    pub fn of(id: impl Into<String>, rate: impl Into<String>) -> Self {
        Self::new(id, vec![RateLimit::of(rate)])
    }

    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.operator = operator;
        self
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.when = Some(condition.into());
        self
    }

    /// Attach `tree` under `id`, replacing any child already there.
    pub fn child(mut self, id: impl Into<String>, mut tree: RateTree) -> Self {
        tree.id.clear();
        self.children.insert(id.into(), tree);
        self
    }

    /// Every node as a rule, each parent ahead of its children.
    pub fn rules(&self) -> Vec<RateRule> {
        let mut rules = Vec::new();
        self.collect(&self.id, None, &mut rules);
        rules
    }

    /// Validate every node as a [`RateRule`] and check that no child id clashes with a field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_node(&self.id, None)
    }

    fn validate_node(&self, id: &str, parent_id: Option<&str>) -> Result<(), ValidationError> {
        self.rule(id, parent_id).validate()?;
        for (key, child) in &self.children {
            if FIELD_NAMES.contains(&key.as_str()) {
                return Err(ValidationError::ReservedChildId(key.clone()));
            }
            child.validate_node(key, Some(id))?;
        }
        Ok(())
    }

    fn collect(&self, id: &str, parent_id: Option<&str>, out: &mut Vec<RateRule>) {
        out.push(self.rule(id, parent_id));
        for (key, child) in &self.children {
            child.collect(key, Some(id), out);
        }
    }

    fn rule(&self, id: &str, parent_id: Option<&str>) -> RateRule {
        RateRule {
            parent_id: parent_id.map(str::to_string),
            id: id.to_string(),
            operator: self.operator,
            rates: self.rates.clone(),
            when: self.when.clone(),
        }
    }
}
