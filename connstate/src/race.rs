/// A race target on a single site: one release inside one section.
///
/// Trackers only ever compare race targets by identity, so two `SiteRace` values with
/// the same section and release are still different targets.
#[derive(Debug)]
pub struct SiteRace {
    section: String,
    release: String,
}

impl SiteRace {
    pub fn new(section: impl Into<String>, release: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            release: release.into(),
        }
    }
    pub fn section(&self) -> &str {
        &self.section
    }
    pub fn release(&self) -> &str {
        &self.release
    }
}

impl std::fmt::Display for SiteRace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.section, self.release)
    }
}
