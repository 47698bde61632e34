use std::convert::Infallible;
use std::str::FromStr;

use clap::Parser;

use crate::output::OutputFormat;

const CATALOG_EPILOG: &str = "\
Canned searches:
    1) Get all users
    2) Get all groups (and their members)
    3) Get all printers
    4) Get all computers (with a logon in the last 90 days)
    5) Search for unconstrained SPN delegations (potential priv-esc)
    6) Search for accounts where pre-auth is not required (ASREPROAST)
    7) All user SPNs (KERBEROAST)
    8) Show all LAPS LA passwords (that you can see)
    9) Show all Quest two-factor seeds (if you have access)
   10) Oracle \"orclCommonAttribute\" SSO password hash
   11) Oracle \"userPassword\" SSO password hash";

/// AD LDAP command line searching that doesn't suck.
#[derive(Parser, Debug)]
#[command(version, after_help = CATALOG_EPILOG)]
pub struct Args {
    /// Domain
    #[arg(short = 'D', long)]
    pub domain: String,

    /// Username
    #[arg(short = 'U', long)]
    pub user: String,

    /// Password
    #[arg(short = 'P', long)]
    pub password: String,

    /// DC IP or resolvable name (can be a comma-delimited list, tried in order)
    #[arg(short = 'S', long)]
    pub server: String,

    /// Base DN, typically "dc=" followed by the domain name with periods replaced by ",dc="
    #[arg(short = 'b', long)]
    pub basedn: String,

    /// LDAP search string, or a number selecting a canned search from the list below
    #[arg(short = 's', long)]
    pub search: SearchSelector,

    /// Maximum records to return, 0 means all
    #[arg(short = 'm', long, default_value_t = 100)]
    pub maxrecords: i64,

    /// Number of records to return on each pull; should be <= max records
    #[arg(short = 'p', long, default_value_t = 10)]
    pub pagesize: i64,

    /// Millisecond delay between paging requests
    #[arg(short = 'd', long, default_value_t = 0)]
    pub delay: u64,

    /// Format of output
    #[arg(short = 'f', long, value_enum, default_value = "plain")]
    pub format: OutputFormat,

    /// 3) connect to 636 TLS; 2) connect to 389 and attempt STARTTLS, falling back as needed; 1) connect to 389, force plaintext
    #[arg(short = 'n', long, value_parser = parse_encryption, default_value = "3")]
    pub encryption: Encryption,

    /// Attributes to return (defaults to all)
    #[arg(value_name = "attribute")]
    pub attributes: Vec<String>,
}

/// Either a raw LDAP filter or a 1-based index into the query catalog,
/// decided once at the parsing boundary: an all-digit argument selects
/// from the catalog, anything else is passed to the server as a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchSelector {
    Filter(String),
    Catalog(usize),
}

impl FromStr for SearchSelector {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = value.parse::<usize>() {
                return Ok(SearchSelector::Catalog(index));
            }
        }
        Ok(SearchSelector::Filter(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encryption {
    Plaintext,
    StartTls,
    Tls,
}

fn parse_encryption(value: &str) -> Result<Encryption, String> {
    match value {
        "1" => Ok(Encryption::Plaintext),
        "2" => Ok(Encryption::StartTls),
        "3" => Ok(Encryption::Tls),
        _ => Err("encryption must be 1, 2 or 3".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn digit_selectors_parse_as_catalog_indices() {
        assert_eq!(
            "7".parse::<SearchSelector>().unwrap(),
            SearchSelector::Catalog(7)
        );
        assert_eq!(
            "(cn=admin*)".parse::<SearchSelector>().unwrap(),
            SearchSelector::Filter("(cn=admin*)".to_string())
        );
        // Mixed digits and letters are a filter, not a selector.
        assert_eq!(
            "7a".parse::<SearchSelector>().unwrap(),
            SearchSelector::Filter("7a".to_string())
        );
    }

    #[test]
    fn encryption_accepts_only_the_three_modes() {
        assert_eq!(parse_encryption("1").unwrap(), Encryption::Plaintext);
        assert_eq!(parse_encryption("2").unwrap(), Encryption::StartTls);
        assert_eq!(parse_encryption("3").unwrap(), Encryption::Tls);
        assert!(parse_encryption("0").is_err());
        assert!(parse_encryption("tls").is_err());
    }
}
