mod args;
mod catalog;
mod entry;
mod error;
mod ldap;
mod output;
mod paging;

use std::io;
use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;

use crate::args::Args;
use crate::catalog::Catalog;
use crate::entry::requested_set;
use crate::error::Error;
use crate::ldap::{ldap_connect, DirectorySession, LdapConfig};
use crate::output::Renderer;
use crate::paging::PagingOptions;

fn main() -> ExitCode {
    let args = Args::parse();

    match search(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\n[!] ERROR: {}\n", e);
            ExitCode::FAILURE
        }
    }
}

fn search(args: Args) -> Result<(), Error> {
    // The catalog is built once, from a single wall-clock reading, so
    // the time-derived filter stays fixed for the whole run.
    let catalog = Catalog::build(Utc::now());
    let query = catalog::resolve(&args.search, &catalog, &args.attributes)?;
    let requested = requested_set(&query.attributes);

    let config = LdapConfig {
        username: args.user,
        password: args.password,
        domain: args.domain,
        servers: args.server,
        encryption: args.encryption,
    };
    let conn = ldap_connect(&config)?;
    let mut session = DirectorySession::new(conn, args.basedn, query.filter);

    let options = PagingOptions::new(args.maxrecords, args.pagesize, args.delay);
    let mut renderer = Renderer::new(args.format, io::stdout().lock());
    paging::run(&mut session, &options, &requested, &mut renderer)?;

    Ok(())
}
