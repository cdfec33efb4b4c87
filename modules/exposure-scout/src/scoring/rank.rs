use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{info, warn};

use crate::traits::RankLookup;

/// Site popularity ranks from a `rank,domain` CSV (Tranco/Alexa layout).
#[derive(Debug, Clone, Default)]
pub struct RankList {
    ranks: HashMap<String, u64>,
}

impl RankList {
    /// Load a list from disk. An unreadable file is not fatal: every lookup
    /// against the empty list is unknown, which scores as low.
    pub fn load(path: &Path) -> Self {
        match std::fs::File::open(path) {
            Ok(file) => {
                let list = Self::from_reader(BufReader::new(file));
                info!(path = %path.display(), domains = list.len(), "Rank list loaded");
                list
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Rank list unavailable, all ranks unknown");
                Self::default()
            }
        }
    }

    /// Parse `rank,domain` lines. Headers and malformed lines are skipped; a
    /// domain listed twice keeps its best rank.
    pub fn from_reader(reader: impl BufRead) -> Self {
        let mut ranks = HashMap::new();
        for line in reader.lines().map_while(Result::ok) {
            let Some((rank, domain)) = line.split_once(',') else {
                continue;
            };
            let Ok(rank) = rank.trim().parse::<u64>() else {
                continue;
            };
            let domain = normalize(domain);
            if domain.is_empty() {
                continue;
            }
            ranks
                .entry(domain)
                .and_modify(|r: &mut u64| *r = (*r).min(rank))
                .or_insert(rank);
        }
        Self { ranks }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, u64)>) -> Self {
        Self {
            ranks: pairs
                .into_iter()
                .map(|(domain, rank)| (normalize(domain), rank))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

impl RankLookup for RankList {
    /// Exact match first, then each parent domain down to two labels.
    fn rank(&self, identifier: &str) -> Option<u64> {
        let mut candidate = normalize(identifier);
        loop {
            if let Some(rank) = self.ranks.get(&candidate) {
                return Some(*rank);
            }
            let (_, parent) = candidate.split_once('.')?;
            if !parent.contains('.') {
                return None;
            }
            candidate = parent.to_string();
        }
    }
}

/// Bare host form: lower-cased, no scheme, path, port or leading `www.`.
fn normalize(identifier: &str) -> String {
    let s = identifier.trim().to_lowercase();
    let s = s.split_once("://").map(|(_, rest)| rest).unwrap_or(&s);
    let s = s.split(['/', '?', '#']).next().unwrap_or_default();
    let s = s.split(':').next().unwrap_or_default();
    let s = s.trim_end_matches('.');
    s.strip_prefix("www.").unwrap_or(s).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn parses_csv_and_skips_junk() {
        let csv = "rank,domain\n1,google.com\n2,Facebook.com\nnot,a-row\n\n3,google.com\n";
        let list = RankList::from_reader(Cursor::new(csv));
        assert_eq!(list.len(), 2);
        assert_eq!(list.rank("google.com"), Some(1));
        assert_eq!(list.rank("facebook.com"), Some(2));
    }

    #[test]
    fn identifiers_are_normalized_before_lookup() {
        let list = RankList::from_pairs([("adobe.com", 120)]);
        assert_eq!(list.rank("www.Adobe.com"), Some(120));
        assert_eq!(list.rank("https://adobe.com/login"), Some(120));
        assert_eq!(list.rank("adobe.com."), Some(120));
    }

    #[test]
    fn subdomains_fall_back_to_parent_domains() {
        let list = RankList::from_pairs([("example.co.uk", 40_000), ("github.com", 30)]);
        assert_eq!(list.rank("gist.github.com"), Some(30));
        assert_eq!(list.rank("a.b.example.co.uk"), Some(40_000));
        assert_eq!(list.rank("co.uk"), None);
        assert_eq!(list.rank("unknown.org"), None);
    }

    #[test]
    fn missing_file_is_an_empty_list() {
        let list = RankList::load(Path::new("/nonexistent/ranks.csv"));
        assert!(list.is_empty());
        assert_eq!(list.rank("google.com"), None);
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "10,example.com").unwrap();
        let list = RankList::load(file.path());
        assert_eq!(list.rank("example.com"), Some(10));
    }
}
