//! Copy configuration
//!
//! A `CopyOptions` value is passed explicitly down every call of a copy; the
//! engine keeps no process-wide settings, so several copies with different
//! options can run in one process.

/// Options recognized by the copy engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyOptions {
    /// Replace a destination entry whose directory/non-directory type does
    /// not match the source, instead of failing with a type conflict
    pub force_rewrite: bool,

    /// Copy a symlink's referent as a regular file instead of recreating the
    /// link
    pub follow_symlinks: bool,
}

impl CopyOptions {
    /// Options with every policy off
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `force_rewrite`
    #[must_use]
    pub fn with_force_rewrite(mut self, force_rewrite: bool) -> Self {
        self.force_rewrite = force_rewrite;
        self
    }

    /// Set `follow_symlinks`
    #[must_use]
    pub fn with_follow_symlinks(mut self, follow_symlinks: bool) -> Self {
        self.follow_symlinks = follow_symlinks;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_conservative() {
        let options = CopyOptions::new();
        assert!(!options.force_rewrite);
        assert!(!options.follow_symlinks);
    }

    #[test]
    fn test_builders() {
        let options = CopyOptions::new()
            .with_force_rewrite(true)
            .with_follow_symlinks(true);
        assert_eq!(
            options,
            CopyOptions {
                force_rewrite: true,
                follow_symlinks: true
            }
        );
    }
}
