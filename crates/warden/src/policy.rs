//! Role-to-team authorization policy.
//!
//! The policy is an ordered list of rules. Evaluation is first-match-wins on
//! the team name, so rule order is significant and must come from the
//! configuration document as written.

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::WardenError;

/// A team that may only be occupied by members holding a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Role name the member must hold (matched case-sensitively).
    #[serde(alias = "credential", alias = "role")]
    pub required_credential: String,
    /// Team governed by this rule (matched case-insensitively).
    #[serde(alias = "team")]
    pub authorized_team: String,
}

impl PolicyRule {
    pub fn new(required_credential: impl Into<String>, authorized_team: impl Into<String>) -> Self {
        Self {
            required_credential: required_credential.into(),
            authorized_team: authorized_team.into(),
        }
    }

    pub fn governs(&self, team: &str) -> bool {
        self.authorized_team.eq_ignore_ascii_case(team)
    }
}

/// Ordered set of [`PolicyRule`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeamPolicy {
    rules: Vec<PolicyRule>,
}

impl TeamPolicy {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self { rules }
    }

    /// Parse the JSON configuration form.
    ///
    /// Accepts either an object mapping role name to team name (document
    /// order is kept) or an array of rule objects.
    pub fn from_json(raw: &str) -> Result<Self, WardenError> {
        serde_json::from_str(raw).map_err(|e| WardenError::InvalidConfig {
            reason: format!("invalid team policy: {e}"),
        })
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The first rule governing `team`. Later rules are never consulted.
    pub fn rule_for_team(&self, team: &str) -> Option<&PolicyRule> {
        self.rules.iter().find(|rule| rule.governs(team))
    }
}

impl<'de> Deserialize<'de> for TeamPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PolicyVisitor;

        impl<'de> Visitor<'de> for PolicyVisitor {
            type Value = TeamPolicy;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of role -> team or an array of rules")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut rules = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((role, team)) = map.next_entry::<String, String>()? {
                    if team.trim().is_empty() {
                        return Err(de::Error::custom(format!("role {role:?} maps to an empty team")));
                    }
                    rules.push(PolicyRule::new(role, team));
                }
                Ok(TeamPolicy { rules })
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut rules = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(rule) = seq.next_element::<PolicyRule>()? {
                    rules.push(rule);
                }
                Ok(TeamPolicy { rules })
            }
        }

        deserializer.deserialize_any(PolicyVisitor)
    }
}
