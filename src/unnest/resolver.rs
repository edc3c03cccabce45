//! Player identity resolution
//!
//! Maps a player name seen in a document to one stable identifier for the
//! whole run. A document's own registry is authoritative; names without a
//! registry entry reuse whatever this run has already learned, and only
//! unseen names get a synthetic id minted under the reserved prefix.
//!
//! Resolution is order-dependent: a registry entry always overwrites the
//! learned mapping for its name, so when two documents disagree the later
//! one wins for every document processed after it.

use crate::unnest::accessor::Field;
use crate::unnest::types::{ExtractConfig, NameVariant, PlayerRow};
use std::collections::HashMap;
use tracing::warn;

/// A document's `name -> id` registry, in document order
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.index.get(name).map(|&pos| self.entries[pos].1.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(name, id)| (name.as_str(), id.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, name: String, id: String) {
        match self.index.get(&name) {
            Some(&pos) => self.entries[pos].1 = id,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, id));
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Identity {
    id: String,
    synthetic: bool,
    /// First-seen order
    variants: Vec<NameVariant>,
}

impl Identity {
    fn record(&mut self, name: &str) {
        match self.variants.iter_mut().find(|v| v.name == name) {
            Some(variant) => variant.occurrences += 1,
            None => self.variants.push(NameVariant {
                name: name.to_string(),
                occurrences: 1,
            }),
        }
    }

    fn to_row(&self) -> PlayerRow {
        let mut canonical = 0;
        for (pos, variant) in self.variants.iter().enumerate() {
            if variant.occurrences > self.variants[canonical].occurrences {
                canonical = pos;
            }
        }

        let mut alternates: Vec<NameVariant> = self
            .variants
            .iter()
            .enumerate()
            .filter(|&(pos, _)| pos != canonical)
            .map(|(_, v)| v.clone())
            .collect();
        // Stable: equal counts stay in first-seen order
        alternates.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));

        PlayerRow {
            player_id: self.id.clone(),
            player_name: self.variants[canonical].name.clone(),
            variant_count: alternates.len() + 1,
            name_variations: alternates,
            is_synthetic: self.synthetic,
        }
    }
}

/// Process-scoped identity state for one extraction run
#[derive(Debug, Clone)]
pub struct PlayerResolver {
    name_to_id: HashMap<String, String>,
    identities: Vec<Identity>,
    id_index: HashMap<String, usize>,
    prefix: String,
    next_synthetic: u64,
}

impl PlayerResolver {
    pub fn new(prefix: impl Into<String>, start: u64) -> Self {
        PlayerResolver {
            name_to_id: HashMap::new(),
            identities: Vec::new(),
            id_index: HashMap::new(),
            prefix: prefix.into(),
            next_synthetic: start,
        }
    }

    pub fn from_config(config: &ExtractConfig) -> Self {
        Self::new(config.synthetic_prefix.clone(), config.synthetic_start)
    }

    /// Build a registry from an `info.registry.people` object.
    ///
    /// Ids inside the reserved synthetic namespace are dropped so that minted
    /// ids can never collide with registry ids.
    pub fn registry(&self, people: Field<'_>) -> Registry {
        let mut registry = Registry::default();
        for (name, id) in people.entries() {
            let Some(id) = id.str() else {
                continue;
            };
            if name.is_empty() || id.is_empty() {
                continue;
            }
            if self.is_reserved(id) {
                warn!(player = %name, registry_id = %id, "registry id uses the reserved synthetic prefix; ignoring it");
                continue;
            }
            registry.insert(name.to_string(), id.to_string());
        }
        registry
    }

    /// Resolve a name against a document registry, learning as it goes.
    ///
    /// Returns `None` only for an empty name.
    pub fn resolve(&mut self, name: &str, registry: &Registry) -> Option<String> {
        if name.is_empty() {
            return None;
        }

        if let Some(id) = registry.get(name) {
            let id = id.to_string();
            self.record(&id, name, false);
            self.name_to_id.insert(name.to_string(), id.clone());
            return Some(id);
        }

        if let Some(id) = self.name_to_id.get(name).cloned() {
            self.record(&id, name, false);
            return Some(id);
        }

        let id = format!("{}{}", self.prefix, self.next_synthetic);
        self.next_synthetic += 1;
        self.record(&id, name, true);
        self.name_to_id.insert(name.to_string(), id.clone());
        Some(id)
    }

    /// `resolve` for optional names
    pub fn resolve_opt(&mut self, name: Option<&str>, registry: &Registry) -> Option<String> {
        name.and_then(|name| self.resolve(name, registry))
    }

    /// Fold every registry entry in as one sighting of that name
    pub fn observe_registry(&mut self, registry: &Registry) {
        for (name, id) in registry.iter() {
            self.record(id, name, false);
            self.name_to_id.insert(name.to_string(), id.to_string());
        }
    }

    /// Id currently learned for `name`
    pub fn id_for(&self, name: &str) -> Option<&str> {
        self.name_to_id.get(name).map(String::as_str)
    }

    pub fn is_reserved(&self, id: &str) -> bool {
        id.starts_with(&self.prefix)
    }

    pub fn player_count(&self) -> usize {
        self.identities.len()
    }

    pub fn synthetic_count(&self) -> usize {
        self.identities.iter().filter(|i| i.synthetic).count()
    }

    /// Materialize the Players table, one row per id in first-seen order
    pub fn players(&self) -> Vec<PlayerRow> {
        self.identities.iter().map(Identity::to_row).collect()
    }

    fn record(&mut self, id: &str, name: &str, synthetic: bool) {
        let pos = match self.id_index.get(id) {
            Some(&pos) => pos,
            None => {
                self.identities.push(Identity {
                    id: id.to_string(),
                    synthetic,
                    variants: Vec::new(),
                });
                self.id_index.insert(id.to_string(), self.identities.len() - 1);
                self.identities.len() - 1
            }
        };
        self.identities[pos].record(name);
    }
}

impl Default for PlayerResolver {
    fn default() -> Self {
        Self::from_config(&ExtractConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry_of(resolver: &PlayerResolver, people: serde_json::Value) -> Registry {
        resolver.registry(Field::new(&people))
    }

    #[test]
    fn test_empty_name_has_no_identity() {
        let mut resolver = PlayerResolver::default();
        assert_eq!(resolver.resolve("", &Registry::default()), None);
        assert_eq!(resolver.resolve_opt(None, &Registry::default()), None);
        assert_eq!(resolver.player_count(), 0);
    }

    #[test]
    fn test_registry_is_authoritative() {
        let mut resolver = PlayerResolver::default();
        let registry = registry_of(&resolver, json!({"V Kohli": "ba607b88"}));

        assert_eq!(resolver.resolve("V Kohli", &registry).as_deref(), Some("ba607b88"));
        // Learned for later documents without a registry
        assert_eq!(
            resolver.resolve("V Kohli", &Registry::default()).as_deref(),
            Some("ba607b88")
        );
        assert_eq!(resolver.synthetic_count(), 0);
    }

    #[test]
    fn test_synthetic_ids_are_minted_once_per_name() {
        let mut resolver = PlayerResolver::new("SYNTH_", 1_000_000);
        let empty = Registry::default();

        let a = resolver.resolve("A Batter", &empty);
        let b = resolver.resolve("B Bowler", &empty);
        let a_again = resolver.resolve("A Batter", &empty);

        assert_eq!(a.as_deref(), Some("SYNTH_1000000"));
        assert_eq!(b.as_deref(), Some("SYNTH_1000001"));
        assert_eq!(a, a_again);
        assert_eq!(resolver.synthetic_count(), 2);
    }

    #[test]
    fn test_registry_overrides_learned_mapping() {
        let mut resolver = PlayerResolver::default();
        let empty = Registry::default();

        let synthetic = resolver.resolve("R Sharma", &empty).unwrap();
        let first = registry_of(&resolver, json!({"R Sharma": "id-1"}));
        let second = registry_of(&resolver, json!({"R Sharma": "id-2"}));

        assert_eq!(resolver.resolve("R Sharma", &first).as_deref(), Some("id-1"));
        assert_eq!(resolver.resolve("R Sharma", &empty).as_deref(), Some("id-1"));
        assert_eq!(resolver.resolve("R Sharma", &second).as_deref(), Some("id-2"));
        // Last registry in processing order wins for later unregistered sightings
        assert_eq!(resolver.resolve("R Sharma", &empty).as_deref(), Some("id-2"));

        // The early synthetic identity still exists as its own player
        let ids: Vec<String> = resolver.players().into_iter().map(|p| p.player_id).collect();
        assert_eq!(ids, vec![synthetic, "id-1".to_string(), "id-2".to_string()]);
    }

    #[test]
    fn test_reserved_prefix_in_registry_is_ignored() {
        let mut resolver = PlayerResolver::new("SYNTH_", 1_000_000);
        let registry = registry_of(
            &resolver,
            json!({"Imposter": "SYNTH_1000000", "Real": "abc", "Bad": 12}),
        );

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("Real"), Some("abc"));

        let minted = resolver.resolve("Someone", &registry).unwrap();
        let imposter = resolver.resolve("Imposter", &registry).unwrap();
        assert_eq!(minted, "SYNTH_1000000");
        assert_ne!(imposter, minted);
    }

    #[test]
    fn test_canonical_name_is_most_frequent() {
        let mut resolver = PlayerResolver::default();
        let short = registry_of(&resolver, json!({"MS Dhoni": "p7"}));
        let long = registry_of(&resolver, json!({"Mahendra Singh Dhoni": "p7"}));

        resolver.resolve("Mahendra Singh Dhoni", &long);
        resolver.resolve("MS Dhoni", &short);
        resolver.resolve("MS Dhoni", &short);

        let players = resolver.players();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].player_name, "MS Dhoni");
        assert_eq!(players[0].variant_count, 2);
        assert_eq!(
            players[0].name_variations,
            vec![NameVariant {
                name: "Mahendra Singh Dhoni".to_string(),
                occurrences: 1
            }]
        );
    }

    #[test]
    fn test_canonical_ties_go_to_first_seen() {
        let mut resolver = PlayerResolver::default();
        let one = registry_of(&resolver, json!({"AB de Villiers": "p9"}));
        let two = registry_of(&resolver, json!({"A B de Villiers": "p9"}));

        resolver.resolve("AB de Villiers", &one);
        resolver.resolve("A B de Villiers", &two);

        assert_eq!(resolver.players()[0].player_name, "AB de Villiers");
    }

    #[test]
    fn test_observe_registry_counts_sightings() {
        let mut resolver = PlayerResolver::default();
        let registry = registry_of(&resolver, json!({"X": "p1", "Y": "p2"}));

        resolver.observe_registry(&registry);
        assert_eq!(resolver.id_for("Y"), Some("p2"));
        assert_eq!(resolver.player_count(), 2);
        assert_eq!(resolver.players()[0].name_variations.len(), 0);
    }
}
