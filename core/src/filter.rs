//! Patterns that hide matching entries from views of the communication log.
//!
//! A pattern is made of hexadecimal digits and `*` wildcards, where each `*` stands for any
//! run of hexadecimal digits, including an empty one. A pattern must match the whole payload.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid filter pattern {0:?}: only hexadecimal digits and '*' are allowed")]
    InvalidPattern(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// An ordered set of filter patterns.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Filter {
    patterns: Vec<String>,
}

impl Filter {
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a filter from the patterns, skipping the invalid ones.
    pub fn from_patterns<I, P>(patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let mut filter = Self::new();
        filter.set_all(patterns);
        filter
    }

    /// Returns the active patterns in insertion order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Adds the pattern after normalising it to upper case.
    /// Adding a pattern which is already present has no effect.
    pub fn add(&mut self, pattern: &str) -> Result<()> {
        let pattern = normalize(pattern)?;
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }

        Ok(())
    }

    /// Removes the pattern. Returns whether it was present.
    pub fn remove(&mut self, pattern: &str) -> bool {
        let pattern = pattern.to_ascii_uppercase();
        let len = self.patterns.len();
        self.patterns.retain(|p| *p != pattern);

        self.patterns.len() != len
    }

    /// Replaces `old` with `new`. Nothing changes if `new` is invalid.
    pub fn replace(&mut self, old: &str, new: &str) -> Result<()> {
        let new = normalize(new)?;
        self.remove(old);
        if !self.patterns.contains(&new) {
            self.patterns.push(new);
        }

        Ok(())
    }

    /// Replaces every pattern with the valid ones among `patterns`.
    /// Returns how many patterns were kept.
    pub fn set_all<I, P>(&mut self, patterns: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        self.patterns.clear();
        for pattern in patterns {
            // Invalid patterns are skipped silently here.
            let _ = self.add(pattern.as_ref());
        }

        self.patterns.len()
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
    }

    /// Determines whether the log message should be hidden.
    /// Prefixes such as `REQ:` and spaces are stripped so only the payload is matched.
    pub fn should_hide(&self, message: &str) -> bool {
        let payload = match message.split_once(':') {
            Some((_, rest)) => rest,
            None => message,
        };
        let payload: String = payload
            .chars()
            .filter(|c| *c != ' ')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        self.patterns
            .iter()
            .any(|p| pattern_matches(p.as_bytes(), payload.as_bytes()))
    }
}

fn normalize(pattern: &str) -> Result<String> {
    let pattern = pattern.to_ascii_uppercase();
    let valid = !pattern.is_empty()
        && pattern
            .bytes()
            .all(|b| b == b'*' || is_hex_digit(b));

    match valid {
        true => Ok(pattern),
        _ => Err(Error::InvalidPattern(pattern)),
    }
}

fn is_hex_digit(b: u8) -> bool {
    matches!(b, b'0'..=b'9' | b'A'..=b'F')
}

/// Runs the pattern over the text as an NFA, tracking every reachable position.
fn pattern_matches(pattern: &[u8], text: &[u8]) -> bool {
    let mut states = vec![false; pattern.len() + 1];
    states[0] = true;
    close_over_stars(pattern, &mut states);

    for &c in text {
        let mut next = vec![false; pattern.len() + 1];
        for (i, _) in states.iter().enumerate().filter(|(_, s)| **s) {
            match pattern.get(i) {
                Some(b'*') => {
                    if is_hex_digit(c) {
                        next[i] = true;
                    }
                }
                Some(&p) if p == c => next[i + 1] = true,
                _ => {}
            }
        }

        close_over_stars(pattern, &mut next);
        if !next.contains(&true) {
            return false;
        }

        states = next;
    }

    states[pattern.len()]
}

/// A star may match nothing, so its successor is reachable whenever it is.
fn close_over_stars(pattern: &[u8], states: &mut [bool]) {
    for i in 0..pattern.len() {
        if states[i] && pattern[i] == b'*' {
            states[i + 1] = true;
        }
    }
}
