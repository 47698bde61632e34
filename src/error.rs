use thiserror::Error;

/// Everything that can abort a run.
#[derive(Debug, Error)]
pub enum Error {
    /// The search selector was numeric but names no canned query.
    #[error("no canned query {0}; valid selectors are 1-{1}")]
    UnknownQuery(usize, usize),

    /// The server list contained no usable hosts.
    #[error("server list contains no usable hosts")]
    NoServers,

    /// The bind was rejected after a connection was established.
    #[error("bind failed: {0}; if the servers are correct, your credentials are likely invalid")]
    Bind(#[source] ldap3::LdapError),

    /// Connection or search failure from the directory library.
    #[error(transparent)]
    Ldap(#[from] ldap3::LdapError),

    /// Output stream failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
