//! Typed header collection and receiving-chain extraction.
//!
//! Headers are modeled as name → ordered sequence of values from the
//! outset: a name may legitimately map to zero, one, or many values
//! (`Received` and `X-Received` repeat per relay hop). Values keep the
//! message's as-received order, which for `Received` means newest hop
//! first — relays prepend their line on the way in.

/// Ordered, multi-valued header collection. Names are stored lower-cased.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header value, preserving insertion order.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.entries.push((name.to_ascii_lowercase(), value.into()));
    }

    /// All values for `name`, in as-received order.
    pub fn all(&self, name: &str) -> Vec<&str> {
        let name = name.to_ascii_lowercase();
        self.entries
            .iter()
            .filter(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// First value for `name`, if any.
    pub fn first(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Build the chronological receiving chain from the `Received` headers.
    ///
    /// The collection holds them newest-hop-first, so the sequence is
    /// reversed to yield oldest-first send order. Blank entries are
    /// dropped. No `Received` headers → empty chain.
    pub fn receiving_chain(&self) -> Vec<String> {
        let mut chain: Vec<String> = self
            .all("received")
            .into_iter()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
            .collect();
        chain.reverse();
        chain
    }
}
