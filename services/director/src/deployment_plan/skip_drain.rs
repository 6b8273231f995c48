//! Which instance groups skip draining on update.

use std::collections::BTreeSet;

/// Skip-drain selection from the deploy options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SkipDrain {
    /// Drain everything.
    #[default]
    None,
    /// Skip draining for every group.
    All,
    /// Skip draining only for these groups.
    Jobs(BTreeSet<String>),
}

impl SkipDrain {
    /// Parse the option value: `*` for all, otherwise a comma-separated list.
    pub fn parse(option: Option<&str>) -> Self {
        match option.map(str::trim) {
            None | Some("") => Self::None,
            Some("*") => Self::All,
            Some(list) => Self::Jobs(
                list.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
        }
    }

    pub fn for_job(&self, name: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::Jobs(jobs) => jobs.contains(name),
        }
    }
}
