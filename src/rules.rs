use std::collections::HashMap;

use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::config::{ConfigError, RawRules};

/// Compiled require/reject patterns for one user.
#[derive(Debug, Default)]
pub struct RuleSet {
    require_all: Vec<Regex>,
    reject_any: Vec<Regex>,
}

/// Rule sets keyed by lower-cased user name. A user whose patterns fail to
/// compile keeps the error, so only that user's requests are affected.
#[derive(Debug, Default)]
pub struct RuleBook {
    users: HashMap<String, Result<RuleSet, ConfigError>>,
}

impl RuleSet {
    /// Every require pattern must match somewhere in `text` and no reject
    /// pattern may. Matching is case-insensitive.
    pub fn validate(&self, text: &str) -> bool {
        self.require_all.iter().all(|re| re.is_match(text))
            && !self.reject_any.iter().any(|re| re.is_match(text))
    }
}

impl RuleBook {
    pub fn compile(raw: HashMap<String, RawRules>) -> Self {
        let mut users = HashMap::with_capacity(raw.len());

        for (user, RawRules { positive, negative }) in raw {
            let user = user.to_lowercase();
            let set = compile_all(&user, &positive).and_then(|require_all| {
                Ok(RuleSet {
                    require_all,
                    reject_any: compile_all(&user, &negative)?,
                })
            });
            if let Err(e) = &set {
                warn!(%user, error = %e, "patterns failed to compile, user cannot be served");
            }
            users.insert(user, set);
        }

        Self { users }
    }

    /// `None` for unknown users, `Some(Err(..))` when the user's patterns
    /// did not compile.
    pub fn get(&self, user: &str) -> Option<Result<&RuleSet, &ConfigError>> {
        self.users.get(&user.to_lowercase()).map(Result::as_ref)
    }
}

fn compile_all(user: &str, patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| ConfigError::Pattern {
                    user: user.to_owned(),
                    pattern: pattern.clone(),
                    source,
                })
        })
        .collect()
}
