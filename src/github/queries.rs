use crate::github::pagination::{EntryOutcome, PagedQuery};
use crate::model::{Collaborator, Member, Repository};
use serde::Deserialize;
use serde_json::Value;

/// Upper bound GitHub accepts for `first:` on a connection.
pub const COLLABORATORS_PER_REPO: u32 = 100;

pub struct MembersQuery;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberEdge {
    node: MemberNode,
    role: Option<String>,
    has_two_factor_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct MemberNode {
    login: String,
    name: Option<String>,
}

impl PagedQuery for MembersQuery {
    type Item = Member;

    const COLLECTION: &'static str = "members";
    const CONNECTION: &'static str = "membersWithRole";
    const QUERY: &'static str = r#"
query($organization: String!, $pageSize: Int!, $after: String) {
  organization(login: $organization) {
    membersWithRole(first: $pageSize, after: $after) {
      totalCount
      edges {
        hasTwoFactorEnabled
        role
        node {
          login
          name
        }
      }
      pageInfo {
        endCursor
        hasNextPage
      }
    }
  }
}
"#;

    fn validate(edge: Value) -> EntryOutcome<Member> {
        match serde_json::from_value::<MemberEdge>(edge) {
            Ok(edge) => EntryOutcome::Accept(Member {
                role: edge.role,
                two_factor_enabled: edge.has_two_factor_enabled,
                ..Member::new(edge.node.login, edge.node.name)
            }),
            Err(e) => EntryOutcome::Skip(format!("member entry is incomplete: {e}")),
        }
    }
}

pub struct RepositoriesQuery;

#[derive(Debug, Deserialize)]
struct RepositoryEdge {
    node: RepositoryNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    name: String,
    is_archived: bool,
    collaborators: Option<CollaboratorConnection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollaboratorConnection {
    total_count: Option<u64>,
    #[serde(default)]
    edges: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct CollaboratorEdge {
    permission: String,
    node: CollaboratorNode,
}

#[derive(Debug, Deserialize)]
struct CollaboratorNode {
    login: String,
}

impl PagedQuery for RepositoriesQuery {
    type Item = Repository;

    const COLLECTION: &'static str = "repositories";
    const CONNECTION: &'static str = "repositories";
    const QUERY: &'static str = r#"
query($organization: String!, $pageSize: Int!, $after: String) {
  organization(login: $organization) {
    repositories(first: $pageSize, after: $after) {
      totalCount
      edges {
        node {
          isArchived
          name
          collaborators(first: 100) {
            totalCount
            edges {
              permission
              node {
                login
              }
            }
          }
        }
      }
      pageInfo {
        endCursor
        hasNextPage
      }
    }
  }
}
"#;

    fn validate(edge: Value) -> EntryOutcome<Repository> {
        let node = match serde_json::from_value::<RepositoryEdge>(edge) {
            Ok(edge) => edge.node,
            Err(e) => return EntryOutcome::Skip(format!("repository entry is incomplete: {e}")),
        };

        let mut collaborators = Vec::new();
        if let Some(connection) = node.collaborators {
            for raw in connection.edges.unwrap_or_default() {
                match serde_json::from_value::<CollaboratorEdge>(raw) {
                    Ok(edge) => {
                        collaborators.push(Collaborator::new(edge.node.login, edge.permission))
                    }
                    Err(e) => {
                        tracing::debug!(repository = %node.name, error = %e, "dropping incomplete collaborator edge")
                    }
                }
            }
            if let Some(total) = connection.total_count {
                if total > collaborators.len() as u64 {
                    tracing::warn!(
                        repository = %node.name,
                        received = collaborators.len(),
                        total,
                        "collaborator list is truncated at {COLLABORATORS_PER_REPO} entries"
                    );
                }
            }
        } else {
            tracing::debug!(repository = %node.name, "collaborators not visible to this token");
        }

        EntryOutcome::Accept(Repository {
            name: node.name,
            is_archived: node.is_archived,
            collaborators,
        })
    }
}
