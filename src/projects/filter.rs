use crate::contracts::Project;

pub const DEFAULT_MAX_RESULTS: usize = 100;
pub const DEFAULT_MIN_QUERY_LENGTH: usize = 1;

#[derive(Debug, Clone, Copy)]
pub struct FilterOptions {
    pub max_results: usize,
    pub min_query_length: usize,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            min_query_length: DEFAULT_MIN_QUERY_LENGTH,
        }
    }
}

#[derive(Debug)]
pub struct FilterResult<'a> {
    pub items: Vec<&'a Project>,
    /// Number of matches before truncation.
    pub matched: usize,
}

impl FilterResult<'_> {
    pub fn is_empty(&self) -> bool {
        self.matched == 0
    }

    pub fn is_truncated(&self) -> bool {
        self.matched > self.items.len()
    }
}

/// Case-insensitive substring match on name or namespace path. Queries
/// shorter than `min_query_length` (after trimming) match everything.
pub fn filter_projects<'a>(
    projects: &'a [Project],
    query: &str,
    options: FilterOptions,
) -> FilterResult<'a> {
    let needle = query.trim().to_lowercase();
    let matches: Vec<&Project> = if needle.chars().count() >= options.min_query_length {
        projects
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle)
                    || p.path_with_namespace.to_lowercase().contains(&needle)
            })
            .collect()
    } else {
        projects.iter().collect()
    };

    let matched = matches.len();
    let items = matches.into_iter().take(options.max_results).collect();
    FilterResult { items, matched }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(id: i64, name: &str, path: &str) -> Project {
        Project {
            project_id: id,
            name: name.into(),
            path_with_namespace: path.into(),
            web_url: format!("https://gitlab.example.com/{path}"),
        }
    }

    fn sample() -> Vec<Project> {
        vec![
            project(1, "Frontend", "web/frontend"),
            project(2, "api", "platform/backend-api"),
            project(3, "Docs", "web/docs"),
        ]
    }

    #[test]
    fn empty_query_returns_everything() {
        let projects = sample();
        let result = filter_projects(&projects, "   ", FilterOptions::default());
        assert_eq!(result.items.len(), 3);
        assert!(!result.is_empty());
        assert!(!result.is_truncated());
    }

    #[test]
    fn matches_name_or_path_ignoring_case() {
        let projects = sample();
        let by_name = filter_projects(&projects, "FRONT", FilterOptions::default());
        assert_eq!(by_name.items.len(), 1);
        assert_eq!(by_name.items[0].project_id, 1);

        let by_path = filter_projects(&projects, "backend", FilterOptions::default());
        assert_eq!(by_path.items.len(), 1);
        assert_eq!(by_path.items[0].project_id, 2);
    }

    #[test]
    fn no_match_is_empty() {
        let projects = sample();
        let result = filter_projects(&projects, "mobile", FilterOptions::default());
        assert!(result.items.is_empty());
        assert!(result.is_empty());
    }

    #[test]
    fn results_over_limit_are_truncated() {
        let projects = sample();
        let options = FilterOptions {
            max_results: 2,
            ..FilterOptions::default()
        };
        let result = filter_projects(&projects, "", options);
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.matched, 3);
        assert!(result.is_truncated());
    }

    #[test]
    fn short_query_is_treated_as_empty() {
        let projects = sample();
        let options = FilterOptions {
            min_query_length: 3,
            ..FilterOptions::default()
        };
        let result = filter_projects(&projects, "we", options);
        assert_eq!(result.items.len(), 3);
    }
}
