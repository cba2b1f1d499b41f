//! Token-to-entity resolution.

use serde::Serialize;

use crate::store::Entity;

/// Which rule matched a token to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    /// Case-insensitive equality.
    Exact,
    /// The entity name is the token plus "s".
    Plural,
    /// The entity name is the token without its last character.
    Truncated,
    /// The entity name and token share an English singular form.
    Inflected,
}

/// A resolved token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution<'e> {
    pub entity: &'e Entity,
    pub rule: MatchRule,
}

/// Maps the `<token>` of a `<token>_id` field to one of the candidate
/// entities.
///
/// Candidates arrive in the stable alphabetical order of the store.
/// Implementations return the first candidate they accept.
pub trait EntityResolver: Send + Sync {
    fn resolve<'e>(&self, token: &str, entities: &'e [Entity]) -> Option<Resolution<'e>>;

    /// Short name used in logs and configuration.
    fn name(&self) -> &'static str;
}

/// The default resolver.
///
/// Accepts the first entity whose lowercase name equals the lowercase token,
/// the token plus "s", or the token without its last character.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamingConventionResolver;

impl NamingConventionResolver {
    fn rule_for(token: &str, entity_name: &str) -> Option<MatchRule> {
        if entity_name == token {
            return Some(MatchRule::Exact);
        }

        if entity_name.len() == token.len() + 1
            && entity_name.starts_with(token)
            && entity_name.ends_with('s')
        {
            return Some(MatchRule::Plural);
        }

        let mut chars = token.chars();
        chars.next_back();
        let truncated = chars.as_str();
        if !truncated.is_empty() && entity_name == truncated {
            return Some(MatchRule::Truncated);
        }

        None
    }
}

impl EntityResolver for NamingConventionResolver {
    fn resolve<'e>(&self, token: &str, entities: &'e [Entity]) -> Option<Resolution<'e>> {
        let token = token.to_lowercase();
        entities.iter().find_map(|entity| {
            Self::rule_for(&token, &entity.name.to_lowercase())
                .map(|rule| Resolution { entity, rule })
        })
    }

    fn name(&self) -> &'static str {
        "naming"
    }
}
