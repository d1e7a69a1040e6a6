use std::fmt;

// ---------------------------------------------------------------------------
// Continent filter
// ---------------------------------------------------------------------------

/// Selector value meaning "no restriction". Never present in the source data.
pub const ALL_CONTINENTS: &str = "All Continents";

/// The continent restriction applied by the filtered queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ContinentFilter {
    #[default]
    All,
    Only(String),
}

impl ContinentFilter {
    /// Interpret a selector value. The sentinel and the empty string mean "all".
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value == ALL_CONTINENTS {
            ContinentFilter::All
        } else {
            ContinentFilter::Only(value.to_string())
        }
    }

    /// The continent to match on, `None` for no restriction.
    pub fn continent(&self) -> Option<&str> {
        match self {
            ContinentFilter::All => None,
            ContinentFilter::Only(c) => Some(c),
        }
    }

    /// Label shown in selectors.
    pub fn label(&self) -> &str {
        self.continent().unwrap_or(ALL_CONTINENTS)
    }
}

impl From<&str> for ContinentFilter {
    fn from(value: &str) -> Self {
        ContinentFilter::parse(value)
    }
}

impl fmt::Display for ContinentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Build the selector choices: sentinel first, then the known continents.
pub fn continent_options<I>(continents: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = vec![ALL_CONTINENTS.to_string()];
    for c in continents {
        let c = c.trim().to_string();
        if c.is_empty() || c == ALL_CONTINENTS || c.eq_ignore_ascii_case("nan") {
            continue;
        }
        if !options.contains(&c) {
            options.push(c);
        }
    }
    options
}
