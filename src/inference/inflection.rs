//! English inflection for entity name matching.
//!
//! Uses the `inflector` crate with additional handling for irregular plurals
//! that appear in data models.

use inflector::Inflector;

use super::resolver::{EntityResolver, MatchRule, Resolution};
use crate::store::Entity;

/// Irregular plurals that inflector doesn't handle well.
static IRREGULAR_PLURALS: &[(&str, &str)] = &[
    // People
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    // Animals
    ("goose", "geese"),
    ("mouse", "mice"),
    ("ox", "oxen"),
    // -f/-fe → -ves
    ("leaf", "leaves"),
    ("life", "lives"),
    ("knife", "knives"),
    ("wife", "wives"),
    ("half", "halves"),
    ("shelf", "shelves"),
    // -o → -oes
    ("hero", "heroes"),
    ("potato", "potatoes"),
    // Latin/Greek
    ("analysis", "analyses"),
    ("basis", "bases"),
    ("crisis", "crises"),
    ("thesis", "theses"),
    ("criterion", "criteria"),
    ("datum", "data"),
    ("medium", "media"),
    ("index", "indices"),
    ("appendix", "appendices"),
    ("matrix", "matrices"),
    ("vertex", "vertices"),
];

/// Singularize a word, handling irregulars first then falling back to inflector.
///
/// Always returns lowercase.
pub fn singularize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }

    let lower = word.to_lowercase();
    for (singular, plural) in IRREGULAR_PLURALS {
        if lower == *plural || lower == *singular {
            return singular.to_string();
        }
    }

    lower.to_singular()
}

/// Pluralize a word, handling irregulars first then falling back to inflector.
///
/// Always returns lowercase.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }

    let lower = word.to_lowercase();
    for (singular, plural) in IRREGULAR_PLURALS {
        if lower == *singular || lower == *plural {
            return plural.to_string();
        }
    }

    lower.to_plural()
}

/// Resolver that compares singular forms.
///
/// `person_id` resolves to `People`, `category_id` to `Categories`. Exact
/// case-insensitive matches are still reported as [`MatchRule::Exact`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InflectionResolver;

impl EntityResolver for InflectionResolver {
    fn resolve<'e>(&self, token: &str, entities: &'e [Entity]) -> Option<Resolution<'e>> {
        let token_lower = token.to_lowercase();
        let token_singular = singularize(&token_lower);

        entities.iter().find_map(|entity| {
            let name = entity.name.to_lowercase();
            if name == token_lower {
                Some(Resolution {
                    entity,
                    rule: MatchRule::Exact,
                })
            } else if singularize(&name) == token_singular {
                Some(Resolution {
                    entity,
                    rule: MatchRule::Inflected,
                })
            } else {
                None
            }
        })
    }

    fn name(&self) -> &'static str {
        "inflection"
    }
}
