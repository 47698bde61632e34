use std::collections::HashSet;
use std::io::Write;
use std::thread;
use std::time::Duration;

use ldap3::{LdapError, SearchEntry};

use crate::entry::PrintableEntry;
use crate::error::Error;
use crate::output::Renderer;

const DEFAULT_PAGE_SIZE: i64 = 10;
const DEFAULT_MAX_RECORDS: i64 = 100;

/// One page of results plus the continuation cookie for the next call.
/// An empty cookie means the server has nothing further.
pub struct Page {
    pub entries: Vec<SearchEntry>,
    pub cookie: Vec<u8>,
}

/// The seam between the paging loop and the directory: fetch the next
/// page of at most `page_size` entries, continuing from `cookie`
/// (empty on the first call).
pub trait PagedSearch {
    fn next_page(&mut self, page_size: i32, cookie: &[u8]) -> Result<Page, LdapError>;
}

/// Paging limits, sanitized from the raw CLI values.
#[derive(Debug, Clone, Copy)]
pub struct PagingOptions {
    max_records: i64,
    page_size: i64,
    delay: Duration,
}

impl PagingOptions {
    /// `max_records == 0` means unlimited; a negative value falls back
    /// to the default cap, a non-positive page size to the default size.
    pub fn new(max_records: i64, page_size: i64, delay_ms: u64) -> Self {
        let max_records = if max_records < 0 {
            DEFAULT_MAX_RECORDS
        } else {
            max_records
        };
        let page_size = if page_size <= 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };
        PagingOptions {
            max_records,
            page_size,
            delay: Duration::from_millis(delay_ms),
        }
    }

    fn initial_page_size(&self) -> i64 {
        if self.unlimited() {
            self.page_size
        } else {
            self.page_size.min(self.max_records)
        }
    }

    fn unlimited(&self) -> bool {
        self.max_records == 0
    }
}

/// Drives paged searches to completion: projects and renders each entry,
/// stops at the record budget, shrinks the page size as the budget
/// drains, and bails out of the known AD malfunction where the server
/// re-serves the first page forever in spite of fresh cookies.
pub fn run<S: PagedSearch, W: Write>(
    session: &mut S,
    options: &PagingOptions,
    requested: &HashSet<String>,
    renderer: &mut Renderer<W>,
) -> Result<(), Error> {
    let mut emitted: i64 = 0;
    let mut page_size = options.initial_page_size();
    let mut cookie: Vec<u8> = Vec::new();
    let mut tracking_dn: Option<String> = None;

    'pages: loop {
        let page = session.next_page(clamp_page_size(page_size), &cookie)?;
        cookie = page.cookie;

        for entry in page.entries {
            let entry = PrintableEntry::from_search(entry, requested);

            // The first entry seen becomes the tracking DN; seeing it a
            // second time means the server is re-serving pages, so the
            // whole run is cut loose rather than looping forever. Exact
            // DN match is a heuristic: a result set that legitimately
            // restarts with the same entry would also trip it.
            match &tracking_dn {
                None => tracking_dn = Some(entry.dn.clone()),
                Some(dn) if *dn == entry.dn => break 'pages,
                Some(_) => {}
            }

            renderer.emit(&entry)?;
            emitted += 1;

            if !options.unlimited() && emitted >= options.max_records {
                eprintln!(
                    "\n[!] WARNING: search returned at least as many records as the maxrecords limit; you may be missing results\n"
                );
                break 'pages;
            }
        }

        if cookie.is_empty() {
            break;
        }
        if !options.delay.is_zero() {
            thread::sleep(options.delay);
        }
        if !options.unlimited() {
            page_size = page_size.min(options.max_records - emitted);
        }
    }

    renderer.finish()?;

    if emitted == 0 {
        eprintln!("\n[!] WARNING: no results were returned for your query\n");
    }

    Ok(())
}

fn clamp_page_size(page_size: i64) -> i32 {
    i32::try_from(page_size).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::Value;

    use super::*;
    use crate::output::OutputFormat;

    fn entry(dn: &str) -> SearchEntry {
        SearchEntry {
            dn: dn.to_string(),
            attrs: HashMap::new(),
            bin_attrs: HashMap::new(),
        }
    }

    fn page(dns: &[&str], more: bool) -> Page {
        Page {
            entries: dns.iter().map(|dn| entry(dn)).collect(),
            cookie: if more { b"next".to_vec() } else { Vec::new() },
        }
    }

    /// Serves a fixed sequence of pages, recording each requested size.
    struct ScriptedSession {
        pages: Vec<Page>,
        requested_sizes: Vec<i32>,
    }

    impl ScriptedSession {
        fn new(pages: Vec<Page>) -> Self {
            ScriptedSession {
                pages,
                requested_sizes: Vec::new(),
            }
        }
    }

    impl PagedSearch for ScriptedSession {
        fn next_page(&mut self, page_size: i32, _cookie: &[u8]) -> Result<Page, LdapError> {
            self.requested_sizes.push(page_size);
            assert!(!self.pages.is_empty(), "searched past the last page");
            Ok(self.pages.remove(0))
        }
    }

    /// A server exhibiting the paging malfunction: the same page with a
    /// fresh cookie, forever.
    struct RepeatingSession;

    impl PagedSearch for RepeatingSession {
        fn next_page(&mut self, _page_size: i32, _cookie: &[u8]) -> Result<Page, LdapError> {
            Ok(page(&["cn=a", "cn=b"], true))
        }
    }

    /// Runs the loop with a JSON renderer and parses what was printed.
    fn rendered_entries(
        session: &mut impl PagedSearch,
        options: &PagingOptions,
    ) -> Vec<Value> {
        let mut buf = Vec::new();
        let mut renderer = Renderer::new(OutputFormat::JsonTiny, &mut buf);
        run(session, options, &HashSet::new(), &mut renderer).unwrap();
        drop(renderer);

        if buf.is_empty() {
            return Vec::new();
        }
        serde_json::from_slice::<Value>(&buf)
            .unwrap()
            .as_array()
            .unwrap()
            .clone()
    }

    #[test]
    fn terminates_when_the_cookie_is_exhausted() {
        let mut session = ScriptedSession::new(vec![
            page(&["cn=1", "cn=2"], true),
            page(&["cn=3"], false),
        ]);
        let options = PagingOptions::new(100, 10, 0);

        let rendered = rendered_entries(&mut session, &options);
        assert_eq!(rendered.len(), 3);
        assert_eq!(session.requested_sizes.len(), 2);
    }

    #[test]
    fn repeating_server_trips_loop_detection_without_reemitting() {
        let options = PagingOptions::new(100, 10, 0);
        let rendered = rendered_entries(&mut RepeatingSession, &options);

        // The run terminated, the tracked DN went out exactly once.
        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[0]["dn"], "cn=a");
        assert_eq!(rendered[1]["dn"], "cn=b");
    }

    #[test]
    fn budget_truncates_mid_page_and_stops_the_run() {
        let mut session = ScriptedSession::new(vec![
            page(&["cn=1", "cn=2"], true),
            page(&["cn=3", "cn=4"], true),
            page(&["cn=5", "cn=6"], true),
        ]);
        let options = PagingOptions::new(5, 10, 0);

        let rendered = rendered_entries(&mut session, &options);
        assert_eq!(rendered.len(), 5);
        assert!(rendered.iter().all(|e| e["dn"] != "cn=6"));
        // Initial size is min(maxrecords, pagesize); later calls track the
        // remaining budget.
        assert_eq!(session.requested_sizes, [5, 3, 1]);
    }

    #[test]
    fn page_size_shrinks_with_the_remaining_budget() {
        let first: Vec<String> = (0..10).map(|i| format!("cn=a{}", i)).collect();
        let second: Vec<String> = (0..12).map(|i| format!("cn=b{}", i)).collect();
        let mut session = ScriptedSession::new(vec![
            page(&first.iter().map(String::as_str).collect::<Vec<_>>(), true),
            page(&second.iter().map(String::as_str).collect::<Vec<_>>(), true),
            page(&["cn=c0", "cn=c1", "cn=c2"], false),
        ]);
        let options = PagingOptions::new(25, 10, 0);

        let rendered = rendered_entries(&mut session, &options);
        // 10 emitted after page one keeps the size at 10; 22 emitted after
        // page two shrinks it to 3.
        assert_eq!(session.requested_sizes, [10, 10, 3]);
        assert_eq!(rendered.len(), 25);
    }

    #[test]
    fn unlimited_budget_never_shrinks_the_page_size() {
        let mut session = ScriptedSession::new(vec![
            page(&["cn=1", "cn=2"], true),
            page(&["cn=3", "cn=4"], false),
        ]);
        let options = PagingOptions::new(0, 7, 0);

        let rendered = rendered_entries(&mut session, &options);
        assert_eq!(session.requested_sizes, [7, 7]);
        assert_eq!(rendered.len(), 4);
    }

    #[test]
    fn zero_results_end_cleanly_with_no_output() {
        let mut session = ScriptedSession::new(vec![page(&[], false)]);
        let options = PagingOptions::new(100, 10, 0);

        let rendered = rendered_entries(&mut session, &options);
        assert!(rendered.is_empty());
    }

    #[test]
    fn raw_limits_are_sanitized() {
        let options = PagingOptions::new(-1, 0, 0);
        assert_eq!(options.max_records, 100);
        assert_eq!(options.page_size, 10);
        assert_eq!(options.initial_page_size(), 10);

        let capped = PagingOptions::new(3, 10, 0);
        assert_eq!(capped.initial_page_size(), 3);
    }
}
