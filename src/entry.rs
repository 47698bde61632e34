use std::collections::{BTreeMap, HashMap, HashSet};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ldap3::SearchEntry;
use serde::Serialize;

/// Kept through every projection so entries stay identifiable.
pub const IDENTITY_ATTRIBUTE: &str = "cn";

/// A search entry reduced to renderable text: binary values are
/// base64-encoded, attribute keys keep their server-supplied case.
/// The sorted map gives JSON output a stable key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrintableEntry {
    pub attributes: BTreeMap<String, Vec<String>>,
    pub dn: String,
}

impl PrintableEntry {
    pub fn from_search(entry: SearchEntry, requested: &HashSet<String>) -> Self {
        let mut attributes: BTreeMap<String, Vec<String>> = entry.attrs.into_iter().collect();
        for (name, values) in entry.bin_attrs {
            attributes
                .entry(name)
                .or_default()
                .extend(values.into_iter().map(|value| BASE64.encode(value)));
        }
        PrintableEntry {
            attributes: project_attributes(attributes, requested),
            dn: entry.dn,
        }
    }
}

/// Lowercases the user's attribute list into the set that drives
/// projection. A non-empty set always receives the identity attribute;
/// an empty set means "return everything" and disables projection.
pub fn requested_set(attributes: &[String]) -> HashSet<String> {
    let mut requested: HashSet<String> = attributes
        .iter()
        .map(|name| name.to_lowercase())
        .collect();
    if !requested.is_empty() {
        requested.insert(IDENTITY_ATTRIBUTE.to_string());
    }
    requested
}

/// Case-insensitive projection: keeps exactly the attributes named in
/// `requested` (matched on lowercase), preserving original-case keys.
/// An empty request passes the map through untouched.
pub fn project_attributes(
    mut attributes: BTreeMap<String, Vec<String>>,
    requested: &HashSet<String>,
) -> BTreeMap<String, Vec<String>> {
    if requested.is_empty() {
        return attributes;
    }

    let canonical: HashMap<String, String> = attributes
        .keys()
        .map(|name| (name.to_lowercase(), name.clone()))
        .collect();

    let mut projected = BTreeMap::new();
    for lower in requested {
        if let Some(name) = canonical.get(lower) {
            if let Some(values) = attributes.remove(name) {
                projected.insert(name.clone(), values);
            }
        }
    }
    projected
}
