use std::time::Duration;

use ldap3::controls::{Control, ControlType, PagedResults};
use ldap3::{LdapConn, LdapConnSettings, LdapError, Scope, SearchEntry};

use crate::args::Encryption;
use crate::error::Error;
use crate::paging::{Page, PagedSearch};

const CONNECTION_TIMEOUT_SECS: u64 = 30;
const LDAPS_PORT: u16 = 636;
const LDAP_PORT: u16 = 389;

/// Connection parameters for one run.
pub struct LdapConfig {
    pub username: String,
    pub password: String,
    pub domain: String,
    /// Comma-delimited host list, exactly as given on the command line.
    pub servers: String,
    pub encryption: Encryption,
}

/// Connects to the first reachable server in the list and binds as
/// `DOMAIN\user`. Bind rejection is fatal; no retry.
pub fn ldap_connect(config: &LdapConfig) -> Result<LdapConn, Error> {
    let urls = server_urls(&config.servers, config.encryption);
    if urls.is_empty() {
        return Err(Error::NoServers);
    }

    let mut ldap = connect_any(&urls, config.encryption)?;

    let bind_dn = format!("{}\\{}", config.domain, config.username);
    ldap.simple_bind(&bind_dn, &config.password)
        .map_err(Error::Bind)?
        .success()
        .map_err(Error::Bind)?;

    Ok(ldap)
}

fn connect_any(urls: &[String], encryption: Encryption) -> Result<LdapConn, Error> {
    let mut last_error = None;
    for url in urls {
        match connect_one(url, encryption) {
            Ok(ldap) => return Ok(ldap),
            Err(e) => {
                eprintln!("[!] WARNING: could not reach {}: {}", url, e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.map_or(Error::NoServers, Error::Ldap))
}

/// Mode 2 attempts a STARTTLS upgrade first and falls back to plaintext
/// with a warning when the server refuses it.
fn connect_one(url: &str, encryption: Encryption) -> Result<LdapConn, LdapError> {
    if encryption == Encryption::StartTls {
        match LdapConn::with_settings(base_settings().set_starttls(true), url) {
            Ok(ldap) => return Ok(ldap),
            Err(_) => {
                eprintln!("\n[!] WARNING: unable to use STARTTLS, continuing in plaintext\n");
            }
        }
    }
    LdapConn::with_settings(base_settings(), url)
}

fn base_settings() -> LdapConnSettings {
    LdapConnSettings::new()
        .set_conn_timeout(Duration::from_secs(CONNECTION_TIMEOUT_SECS))
        .set_no_tls_verify(true)
}

/// Splits the comma-delimited server list into URLs for the chosen
/// encryption mode, appending the default port when none is given.
fn server_urls(servers: &str, encryption: Encryption) -> Vec<String> {
    let (scheme, port) = match encryption {
        Encryption::Tls => ("ldaps", LDAPS_PORT),
        _ => ("ldap", LDAP_PORT),
    };
    servers
        .split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(|host| {
            if host.contains(':') {
                format!("{}://{}", scheme, host)
            } else {
                format!("{}://{}:{}", scheme, host, port)
            }
        })
        .collect()
}

/// A bound connection plus the fixed search parameters for one run.
/// Each call issues one subtree search carrying a paged-results control
/// and hands back the server's continuation cookie.
pub struct DirectorySession {
    conn: LdapConn,
    base_dn: String,
    filter: String,
}

impl DirectorySession {
    pub fn new(conn: LdapConn, base_dn: String, filter: String) -> Self {
        DirectorySession {
            conn,
            base_dn,
            filter,
        }
    }
}

impl PagedSearch for DirectorySession {
    fn next_page(&mut self, page_size: i32, cookie: &[u8]) -> Result<Page, LdapError> {
        self.conn.with_controls(PagedResults {
            size: page_size,
            cookie: cookie.to_vec(),
        });
        // All user and operational attributes; projection is client-side.
        let (entries, result) = self
            .conn
            .search(&self.base_dn, Scope::Subtree, &self.filter, vec!["*", "+"])?
            .success()?;

        let cookie = result
            .ctrls
            .iter()
            .find_map(|control| match control {
                Control(Some(ControlType::PagedResults), raw) => {
                    Some(raw.parse::<PagedResults>().cookie)
                }
                _ => None,
            })
            .unwrap_or_default();

        Ok(Page {
            entries: entries.into_iter().map(SearchEntry::construct).collect(),
            cookie,
        })
    }
}
