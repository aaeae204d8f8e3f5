use crate::model::{Members, Repository};
use crate::report::BASE_COLUMNS;
use std::collections::HashSet;

const RESERVED_SUFFIX: &str = "(REPOSITORY)";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Aggregation {
    /// Repository column headings in traversal order, each listed once.
    pub columns: Vec<String>,
    /// Collaborator edges whose login is not an organization member.
    pub outside_edges: usize,
}

/// Writes each repository's collaborator permissions onto the matching members.
pub fn merge_permissions(members: &mut Members, repositories: &[Repository]) -> Aggregation {
    let mut aggregation = Aggregation::default();
    let mut seen = HashSet::new();

    for repo in repositories {
        let column = column_heading(repo);
        if seen.insert(column.clone()) {
            aggregation.columns.push(column.clone());
        } else {
            tracing::warn!(column = %column, "repository heading appears more than once; merging into one column");
        }

        for collaborator in &repo.collaborators {
            match members.get_mut(&collaborator.login) {
                Some(member) => {
                    member
                        .permissions
                        .insert(column.clone(), collaborator.permission.clone());
                }
                None => aggregation.outside_edges += 1,
            }
        }
    }

    aggregation
}

fn column_heading(repo: &Repository) -> String {
    let heading = repo.display_name();
    if BASE_COLUMNS
        .iter()
        .any(|base| base.eq_ignore_ascii_case(&heading))
    {
        tracing::warn!(repository = %repo.name, "repository name collides with a base column");
        format!("{heading}{RESERVED_SUFFIX}")
    } else {
        heading
    }
}

/// Case-insensitive sort key with a byte-order tie-break so output is stable.
pub fn sort_key(s: &str) -> (String, String) {
    (s.to_lowercase(), s.to_string())
}

pub fn sort_columns(columns: &mut [String]) {
    columns.sort_by_cached_key(|c| sort_key(c));
}
