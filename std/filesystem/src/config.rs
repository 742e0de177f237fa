//! Tool enablement configuration.

/// Which tools the server registers.
///
/// Disabled tools are removed from the router, so clients neither see nor
/// call them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ToolFilter {
    #[default]
    All,
    /// Exact tool names or glob wildcards such as `read_*`.
    Patterns(Vec<String>),
}

impl ToolFilter {
    /// Parse a comma-separated tool list. `all` or an empty string enables
    /// every tool.
    pub fn parse(list: &str) -> Self {
        let list = list.trim();
        if list.is_empty() || list == "all" {
            return Self::All;
        }
        Self::Patterns(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    pub fn is_enabled(&self, tool: &str) -> bool {
        match self {
            Self::All => true,
            Self::Patterns(patterns) => patterns.iter().any(|pattern| {
                pattern == tool
                    || glob::Pattern::new(pattern)
                        .map(|p| p.matches(tool))
                        .unwrap_or(false)
            }),
        }
    }
}

impl std::str::FromStr for ToolFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ToolFilter;

    fn patterns(list: &[&str]) -> ToolFilter {
        ToolFilter::Patterns(list.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn enable_all() {
        assert!(ToolFilter::All.is_enabled("read_file"));
        assert!(ToolFilter::default().is_enabled("delete_file"));
    }

    #[test]
    fn exact_match() {
        let filter = patterns(&["read_file", "write_file"]);
        assert!(filter.is_enabled("read_file"));
        assert!(!filter.is_enabled("delete_file"));
    }

    #[test]
    fn wildcard_match() {
        let filter = patterns(&["read_*", "write_*"]);
        assert!(filter.is_enabled("read_file"));
        assert!(filter.is_enabled("read_multiple_files"));
        assert!(!filter.is_enabled("delete_file"));

        let list = patterns(&["list_*"]);
        assert!(list.is_enabled("list_directory"));
        assert!(list.is_enabled("list_allowed_directories"));
    }

    #[test]
    fn mixed_exact_and_wildcard() {
        let filter = patterns(&["read_*", "tree", "write_*"]);
        assert!(filter.is_enabled("tree"));
        assert!(!filter.is_enabled("modify_file"));
    }

    #[test]
    fn parse_list() {
        assert_eq!(ToolFilter::parse("all"), ToolFilter::All);
        assert_eq!(ToolFilter::parse("  "), ToolFilter::All);
        assert_eq!(
            ToolFilter::parse(" read_file, ,list_* "),
            patterns(&["read_file", "list_*"])
        );
    }
}
