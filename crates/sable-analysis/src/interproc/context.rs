use std::fmt;

use sable_ir::CodeLocation;

/// How much of the call stack a context token remembers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSensitivity {
    /// One summary per CFG, whatever the callers.
    Insensitive,
    /// Remember the last `k` call sites.
    LastCallSites(usize),
    /// Remember the whole stack. Unbounded: recursion is only kept finite by
    /// the driver's call-depth limit.
    FullStack,
}

impl Default for ContextSensitivity {
    fn default() -> Self {
        ContextSensitivity::LastCallSites(1)
    }
}

impl ContextSensitivity {
    /// The usual k-limited sensitivity.
    pub fn last_call_sites(k: usize) -> Self {
        ContextSensitivity::LastCallSites(k)
    }
}

/// A finite abstraction of the call stack: the summary cache key.
///
/// The starting token is empty; every call pushes its site according to the
/// configured [`ContextSensitivity`]. Equality and hashing are over the
/// remembered sites only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ContextToken {
    sites: Vec<CodeLocation>,
}

impl ContextToken {
    /// The token marking a root entrypoint.
    pub fn starting() -> Self {
        Self::default()
    }

    pub fn sites(&self) -> &[CodeLocation] {
        &self.sites
    }

    pub fn push(&self, sensitivity: ContextSensitivity, site: CodeLocation) -> Self {
        match sensitivity {
            ContextSensitivity::Insensitive => self.clone(),
            ContextSensitivity::LastCallSites(k) => {
                let mut sites = self.sites.clone();
                sites.push(site);
                let excess = sites.len().saturating_sub(k);
                sites.drain(..excess);
                ContextToken { sites }
            }
            ContextSensitivity::FullStack => {
                let mut sites = self.sites.clone();
                sites.push(site);
                ContextToken { sites }
            }
        }
    }
}

impl fmt::Display for ContextToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sites.is_empty() {
            return f.write_str("<start>");
        }
        for (i, site) in self.sites.iter().enumerate() {
            if i > 0 {
                f.write_str("::")?;
            }
            write!(f, "{site}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn k_limited_tokens_keep_the_last_sites() {
        let sensitivity = ContextSensitivity::last_call_sites(2);
        let t = ContextToken::starting()
            .push(sensitivity, CodeLocation::line(1))
            .push(sensitivity, CodeLocation::line(2))
            .push(sensitivity, CodeLocation::line(3));
        assert_eq!(t.sites(), &[CodeLocation::line(2), CodeLocation::line(3)]);
        // k = 1 keys summaries by call site alone.
        let one = ContextSensitivity::last_call_sites(1);
        let a = ContextToken::starting().push(one, CodeLocation::line(7));
        let b = ContextToken::starting().push(one, CodeLocation::line(9));
        assert_ne!(a, b);
        assert_eq!(a, ContextToken::starting().push(one, CodeLocation::line(7)));
    }

    #[test]
    fn insensitive_tokens_never_change() {
        let t = ContextToken::starting().push(ContextSensitivity::Insensitive, CodeLocation::line(4));
        assert_eq!(t, ContextToken::starting());
    }

    #[test]
    fn k_limited_recursion_saturates() {
        // Pushing the same site repeatedly stabilizes, which is what makes
        // recursive calls revisit an already-active token.
        let one = ContextSensitivity::last_call_sites(1);
        let t1 = ContextToken::starting().push(one, CodeLocation::line(5));
        let t2 = t1.push(one, CodeLocation::line(5));
        assert_eq!(t1, t2);
    }
}
