//! Band alias resolution for a layer.
//!
//! Styles may refer to a band by its canonical identifier (e.g. `B04`) or by
//! any alias declared for it in the layer's band map (e.g. `red`). The
//! resolver is built once per layer and only answers lookups afterwards.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{OwsError, OwsResult};

/// Maps a layer's band identifiers and aliases to canonical band ids.
#[derive(Debug, Clone, Default)]
pub struct BandAliasResolver {
    /// Canonical id -> declared aliases, in declaration order
    bands: BTreeMap<String, Vec<String>>,
    /// Every accepted identifier -> canonical id
    lookup: HashMap<String, String>,
}

impl BandAliasResolver {
    /// Build a resolver from a canonical-band -> aliases map.
    ///
    /// Fails with [`OwsError::DuplicateAlias`] if one alias string is claimed
    /// by two different canonical bands, or if an alias shadows another
    /// band's canonical id.
    pub fn new<I, A>(band_map: I) -> OwsResult<Self>
    where
        I: IntoIterator<Item = (String, A)>,
        A: IntoIterator<Item = String>,
    {
        let mut bands = BTreeMap::new();
        let mut lookup: HashMap<String, String> = HashMap::new();

        let entries: Vec<(String, Vec<String>)> = band_map
            .into_iter()
            .map(|(band, aliases)| (band, aliases.into_iter().collect()))
            .collect();

        // Canonical ids first so that an alias can never shadow one.
        for (band, _) in &entries {
            lookup.insert(band.clone(), band.clone());
        }

        for (band, aliases) in entries {
            for alias in &aliases {
                match lookup.get(alias) {
                    Some(owner) if owner != &band => {
                        return Err(OwsError::DuplicateAlias {
                            alias: alias.clone(),
                            first: owner.clone(),
                            second: band,
                        });
                    }
                    _ => {
                        lookup.insert(alias.clone(), band.clone());
                    }
                }
            }
            bands.insert(band, aliases);
        }

        Ok(Self { bands, lookup })
    }

    /// Resolve a band id or alias to its canonical band id.
    pub fn resolve(&self, identifier: &str) -> OwsResult<&str> {
        self.lookup
            .get(identifier)
            .map(String::as_str)
            .ok_or_else(|| OwsError::UnknownBand(identifier.to_string()))
    }

    /// Resolve a list of identifiers, failing on the first unknown one.
    pub fn resolve_all<'a, I>(&self, identifiers: I) -> OwsResult<Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        identifiers
            .into_iter()
            .map(|id| self.resolve(id).map(str::to_string))
            .collect()
    }

    /// The layer's canonical band ids.
    pub fn canonical_set(&self) -> BTreeSet<&str> {
        self.bands.keys().map(String::as_str).collect()
    }

    /// Aliases declared for a canonical band.
    pub fn aliases(&self, canonical: &str) -> Option<&[String]> {
        self.bands.get(canonical).map(Vec::as_slice)
    }

    pub fn is_known(&self, identifier: &str) -> bool {
        self.lookup.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloudless() -> BandAliasResolver {
        BandAliasResolver::new(vec![
            ("B01".to_string(), vec!["red".to_string()]),
            ("B02".to_string(), vec!["green".to_string()]),
            ("B03".to_string(), vec!["blue".to_string()]),
            ("B04".to_string(), vec!["recentness".to_string()]),
        ])
        .unwrap()
    }

    #[test]
    fn test_resolve_alias_and_canonical() {
        let resolver = cloudless();
        assert_eq!(resolver.resolve("red").unwrap(), "B01");
        assert_eq!(resolver.resolve("B01").unwrap(), "B01");
        assert_eq!(resolver.resolve("recentness").unwrap(), "B04");
    }

    #[test]
    fn test_band_without_aliases_resolves_to_itself() {
        let resolver = BandAliasResolver::new(vec![("nbart_swir".to_string(), Vec::new())]).unwrap();
        assert_eq!(resolver.resolve("nbart_swir").unwrap(), "nbart_swir");
        assert_eq!(resolver.aliases("nbart_swir"), Some(&[][..]));
    }

    #[test]
    fn test_resolution_is_exact_and_case_sensitive() {
        let resolver = cloudless();
        assert!(matches!(resolver.resolve("Red"), Err(OwsError::UnknownBand(_))));
        assert!(matches!(resolver.resolve("b01"), Err(OwsError::UnknownBand(_))));
        assert!(matches!(resolver.resolve("re"), Err(OwsError::UnknownBand(_))));
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let err = BandAliasResolver::new(vec![
            ("B01".to_string(), vec!["red".to_string()]),
            ("B02".to_string(), vec!["red".to_string()]),
        ])
        .unwrap_err();
        match err {
            OwsError::DuplicateAlias { alias, first, second } => {
                assert_eq!(alias, "red");
                assert_eq!(first, "B01");
                assert_eq!(second, "B02");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_alias_shadowing_canonical_id_rejected() {
        let err = BandAliasResolver::new(vec![
            ("B01".to_string(), vec!["B02".to_string()]),
            ("B02".to_string(), vec![]),
        ])
        .unwrap_err();
        assert!(matches!(err, OwsError::DuplicateAlias { .. }));
    }

    #[test]
    fn test_canonical_set_and_resolve_all() {
        let resolver = cloudless();
        let set: Vec<&str> = resolver.canonical_set().into_iter().collect();
        assert_eq!(set, vec!["B01", "B02", "B03", "B04"]);

        let resolved = resolver.resolve_all(["blue", "B02"]).unwrap();
        assert_eq!(resolved, vec!["B03".to_string(), "B02".to_string()]);
        assert!(resolver.resolve_all(["blue", "nir"]).is_err());
    }
}
