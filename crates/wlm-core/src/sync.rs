//! Whitelist entry synchronizer
//!
//! A whitelist is treated as a set of entry strings. [`sync`] removes the old
//! IP and adds the new one; it performs no I/O and is independent of the
//! provider the membership came from.

use std::collections::BTreeSet;
use std::net::IpAddr;

/// The set of entries currently authorized on one target
///
/// Entries are kept sorted, so [`Membership::to_list_string`] is a canonical
/// serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    entries: BTreeSet<String>,
}

impl Membership {
    /// Create an empty membership
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-separated entry list, ignoring blanks
    pub fn parse_list(list: &str) -> Self {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Whether the entry is present
    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains(entry)
    }

    /// Add an entry; adding a present entry is a no-op
    pub fn insert(&mut self, entry: impl Into<String>) {
        self.entries.insert(entry.into());
    }

    /// Remove an entry; removing an absent entry is a no-op
    pub fn remove(&mut self, entry: &str) {
        self.entries.remove(entry);
    }

    /// Whether an entry denotes `ip`, whatever its textual form
    pub fn contains_ip(&self, ip: IpAddr) -> bool {
        self.entries.iter().any(|entry| denotes(entry, ip))
    }

    /// Remove every entry that denotes `ip`
    pub fn remove_ip(&mut self, ip: IpAddr) {
        self.entries.retain(|entry| !denotes(entry, ip));
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Sorted comma-separated entry list
    pub fn to_list_string(&self) -> String {
        self.iter().collect::<Vec<_>>().join(",")
    }
}

impl<S: Into<String>> FromIterator<S> for Membership {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Compute the membership after moving from `old_ip` to `new_ip`
///
/// The old IP is removed first, then the new IP is added, so `old == new`
/// leaves the IP present and `(None, None)` is the identity. Entries are
/// matched by address value, so `2001:DB8::1` is the same IP as `2001:db8::1`.
pub fn sync(current: &Membership, old_ip: Option<IpAddr>, new_ip: Option<IpAddr>) -> Membership {
    let mut next = current.clone();
    if let Some(old) = old_ip {
        next.remove_ip(old);
    }
    if let Some(new) = new_ip
        && !next.contains_ip(new)
    {
        next.insert(new.to_string());
    }
    next
}

/// Entries that parse as an address compare by value; anything else (CIDR
/// ranges, hostnames) only matches its exact text.
fn denotes(entry: &str, ip: IpAddr) -> bool {
    entry.parse::<IpAddr>().is_ok_and(|parsed| parsed == ip)
}
