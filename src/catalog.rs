use chrono::{DateTime, Duration, Utc};

use crate::args::SearchSelector;
use crate::error::Error;

// Offset between the directory epoch (1601-01-01) and the Unix epoch,
// in 100-nanosecond ticks.
const DIRECTORY_EPOCH_OFFSET_TICKS: i64 = 116_444_736_000_000_000;
const TICKS_PER_SECOND: i64 = 10_000_000;

// Computers with no logon inside this window are considered stale.
const STALE_COMPUTER_DAYS: i64 = 90;

/// One canned query: a filter plus the attributes shown by default.
pub struct CatalogEntry {
    pub filter: String,
    pub attributes: &'static [&'static str],
}

/// The canned query table, addressed by the 1-based CLI selector.
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

/// Converts a timestamp to 100-nanosecond ticks since 1601-01-01, the
/// unit `lastLogonTimestamp` and friends are stored in. Integer
/// arithmetic throughout; a float detour here would shift the filter
/// threshold.
pub fn directory_ticks(when: DateTime<Utc>) -> i64 {
    when.timestamp() * TICKS_PER_SECOND + DIRECTORY_EPOCH_OFFSET_TICKS
}

impl Catalog {
    /// Builds the table. `now` is injected so the stale-computer
    /// threshold is deterministic and testable.
    pub fn build(now: DateTime<Utc>) -> Self {
        let stale_threshold = directory_ticks(now - Duration::days(STALE_COMPUTER_DAYS));

        let entries = vec![
            CatalogEntry {
                filter: "(objectcategory=user)".to_string(),
                attributes: &["cn", "mail", "memberOf", "sAMAccountName"],
            },
            CatalogEntry {
                filter: "(objectclass=group)".to_string(),
                attributes: &["member"],
            },
            CatalogEntry {
                filter: "(objectCategory=printQueue)".to_string(),
                attributes: &[],
            },
            CatalogEntry {
                filter: format!(
                    "(&(objectCategory=computer)(lastLogonTimestamp>={}))",
                    stale_threshold
                ),
                attributes: &[
                    "dNSHostName",
                    "description",
                    "operatingSystem",
                    "operatingSystemServicePack",
                    "operatingSystemVersion",
                    "servicePrincipalName",
                    "lastLogonTimestamp",
                ],
            },
            CatalogEntry {
                filter: "(userAccountControl:1.2.840.113556.1.4.803:=524288)".to_string(),
                attributes: &["cn", "servicePrincipalName"],
            },
            CatalogEntry {
                filter: "(userAccountControl:1.2.840.113556.1.4.803:=4194304)".to_string(),
                attributes: &["cn", "distinguishedName"],
            },
            CatalogEntry {
                filter: "(&(objectcategory=user)(serviceprincipalname=*))".to_string(),
                attributes: &["userPrincipalName", "servicePrincipalName"],
            },
            CatalogEntry {
                filter: "(ms-Mcs-AdmPwd=*)".to_string(),
                attributes: &["ms-Mcs-AdmPwd", "ms-Mcs-AdmPwdExpirationTime"],
            },
            CatalogEntry {
                filter: "(defender-tokenData=*)".to_string(),
                attributes: &[],
            },
            CatalogEntry {
                filter: "(&(objectcategory=user)(orclCommonAttribute=*))".to_string(),
                attributes: &["cn", "memberOf", "sAMAccountName", "orclCommonAttribute"],
            },
            CatalogEntry {
                filter: "(&(objectcategory=user)(userPassword=*))".to_string(),
                attributes: &["cn", "memberOf", "sAMAccountName", "userPassword"],
            },
        ];

        Catalog { entries }
    }

    /// Looks up a canned query by its 1-based selector.
    pub fn get(&self, index: usize) -> Option<&CatalogEntry> {
        index.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A selector made concrete: the filter sent to the server and the
/// attribute list that seeds projection.
#[derive(Debug, PartialEq, Eq)]
pub struct ResolvedQuery {
    pub filter: String,
    pub attributes: Vec<String>,
}

/// Resolves the CLI selector against the catalog. User-supplied
/// attributes always win over catalog defaults; an out-of-range index
/// is fatal rather than being passed to the server as a filter.
pub fn resolve(
    selector: &SearchSelector,
    catalog: &Catalog,
    user_attributes: &[String],
) -> Result<ResolvedQuery, Error> {
    match selector {
        SearchSelector::Filter(filter) => Ok(ResolvedQuery {
            filter: filter.clone(),
            attributes: user_attributes.to_vec(),
        }),
        SearchSelector::Catalog(index) => {
            let entry = catalog
                .get(*index)
                .ok_or(Error::UnknownQuery(*index, catalog.len()))?;
            let attributes = if user_attributes.is_empty() {
                entry.attributes.iter().map(|a| (*a).to_string()).collect()
            } else {
                user_attributes.to_vec()
            };
            Ok(ResolvedQuery {
                filter: entry.filter.clone(),
                attributes,
            })
        }
    }
}
