use super::RateLimit;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// How multiple limits in one rule combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    /// Single limit; no combination.
    #[default]
    None,
    /// Limited only when every limit is exceeded.
    And,
    /// Limited when any limit is exceeded.
    Or,
}

/// A named rate rule as registered with the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateRule {
    /// Id of a previously registered group this rule belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub operator: Operator,
    #[serde(default)]
    pub rates: Vec<RateLimit>,
    /// Condition applied to the whole rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
}

impl RateRule {
    pub fn new(id: impl Into<String>, rates: Vec<RateLimit>) -> Self {
        Self { id: id.into(), rates, ..Self::default() }
    }

    /// Single-limit rule from a rate expression.
    pub fn of(id: impl Into<String>, rate: impl Into<String>) -> Self {
        Self::new(id, vec![RateLimit::of(rate)])
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.operator = operator;
        self
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.when = Some(condition.into());
        self
    }

    /// The rule-level condition, treating an empty string as absent.
    pub fn condition(&self) -> Option<&str> {
        self.when.as_deref().filter(|w| !w.is_empty())
    }

    /// Validate the rule and each of its limits.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if self.operator == Operator::None && self.rates.len() > 1 {
            return Err(ValidationError::OperatorRequired {
                id: self.id.clone(),
                count: self.rates.len(),
            });
        }
        if self.rates.is_empty() {
            return Err(ValidationError::NoRates { id: self.id.clone() });
        }
        self.rates.iter().try_for_each(RateLimit::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn single_rate_rule_is_valid() {
        assert_eq!(RateRule::of("login", "5/m").validate(), Ok(()));
    }

    #[test]
    fn empty_id_fails() {
        assert_eq!(RateRule::of("", "5/m").validate(), Err(ValidationError::EmptyId));
        assert_eq!(RateRule::of("   ", "5/m").validate(), Err(ValidationError::EmptyId));
    }

    #[test]
    fn multiple_rates_need_an_operator() {
        let rates = vec![RateLimit::of("5/s"), RateLimit::of("100/m")];
        let rule = RateRule::new("search", rates.clone());
        assert_eq!(
            rule.validate(),
            Err(ValidationError::OperatorRequired { id: "search".into(), count: 2 })
        );
        assert_eq!(RateRule::new("search", rates).with_operator(Operator::Or).validate(), Ok(()));
    }

    #[test]
    fn no_rates_fails() {
        assert_eq!(
            RateRule::new("empty", vec![]).validate(),
            Err(ValidationError::NoRates { id: "empty".into() })
        );
    }

    #[test]
    fn invalid_limit_fails_rule() {
        let rule = RateRule::new("bad", vec![RateLimit::default()]);
        assert_eq!(rule.validate(), Err(ValidationError::RateOrPermitsRequired));
    }

    #[test]
    fn serializes_wire_shape() {
        let rule = RateRule::new("search", vec![RateLimit::per(20, Duration::from_secs(1))])
            .with_parent("root")
            .when("web.request.header[X-Trigger] = true");
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["parentId"], "root");
        assert_eq!(json["operator"], "NONE");
        assert_eq!(json["rates"][0]["permits"], 20);
        assert_eq!(json["when"], "web.request.header[X-Trigger] = true");
    }

    #[test]
    fn deserializes_service_response() {
        let json = r#"{"id":"root","operator":"OR","rates":[{"rate":"3/s","duration":"PT1S"}],"parentId":null}"#;
        let rule: RateRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.id, "root");
        assert_eq!(rule.operator, Operator::Or);
        assert_eq!(rule.parent_id, None);
        assert_eq!(rule.rates[0].rate_expression(), Some("3/s"));
    }
}
