use crate::config::AuditConfig;
use crate::error::{AuditError, Result};
use crate::github::pagination::{ensure_complete, Accumulate, Connection, EntryOutcome, PagedQuery};
use octocrab::service::middleware::retry::RetryConfig;
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub struct GithubClient {
    octocrab: Octocrab,
    organization: String,
    page_size: u32,
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    path: Vec<Value>,
}

impl GithubClient {
    pub fn new(config: &AuditConfig) -> Result<Self> {
        let octocrab = Octocrab::builder()
            .base_uri(config.api_url.as_str())
            .map_err(|e| AuditError::Config(format!("Invalid API URL {}: {e}", config.api_url)))?
            .personal_token(config.token.clone())
            .add_retry_config(RetryConfig::None)
            .build()
            .map_err(|e| AuditError::GitHub(e.to_string()))?;
        Ok(Self {
            octocrab,
            organization: config.organization.clone(),
            page_size: config.page_size,
        })
    }

    /// Runs one GraphQL request and returns its `data` object.
    ///
    /// Errors reported next to usable data are logged and tolerated; GitHub
    /// returns those when parts of a page are hidden from the token.
    async fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let request = GraphQlRequest { query, variables };
        let raw: Value = self.octocrab.post("/graphql", Some(&request)).await?;
        tracing::debug!(response = %raw, "graphql response");

        let response: GraphQlResponse = serde_json::from_value(raw)?;
        match response.data {
            Some(data) if !data.is_null() => {
                for error in &response.errors {
                    tracing::warn!(
                        kind = error.kind.as_deref().unwrap_or("unknown"),
                        path = ?error.path,
                        "partial GraphQL result: {}",
                        error.message
                    );
                }
                Ok(data)
            }
            _ => {
                let messages: Vec<&str> =
                    response.errors.iter().map(|e| e.message.as_str()).collect();
                if messages.is_empty() {
                    Err(AuditError::GitHub("GraphQL response carried no data".into()))
                } else {
                    Err(AuditError::GitHub(messages.join("; ")))
                }
            }
        }
    }

    /// Walks every page of `Q`'s connection into `into`, then checks the
    /// accumulated count against GitHub's reported total.
    pub async fn fetch_all<Q, A>(&self, into: &mut A) -> Result<u64>
    where
        Q: PagedQuery,
        A: Accumulate<Q::Item>,
    {
        let mut after: Option<String> = None;
        let mut total_count: Option<u64> = None;
        let mut page = 0u32;

        loop {
            page += 1;
            let variables = json!({
                "organization": self.organization,
                "pageSize": self.page_size,
                "after": after,
            });
            let data = self.graphql(Q::QUERY, variables).await?;
            let connection = Connection::extract(data, &self.organization, Q::CONNECTION)?;

            if let Some(previous) = total_count {
                if previous != connection.total_count {
                    tracing::warn!(
                        collection = Q::COLLECTION,
                        previous,
                        current = connection.total_count,
                        "total count changed between pages"
                    );
                }
            }
            total_count = Some(connection.total_count);

            let edges = connection.edges.unwrap_or_default();
            tracing::debug!(
                collection = Q::COLLECTION,
                page,
                cursor = after.as_deref().unwrap_or("<start>"),
                edges = edges.len(),
                "fetched page"
            );

            for edge in edges {
                match Q::validate(edge) {
                    EntryOutcome::Accept(item) => into.accumulate(item),
                    EntryOutcome::Skip(reason) => {
                        tracing::warn!(collection = Q::COLLECTION, page, "skipping entry: {reason}")
                    }
                }
            }

            if !connection.page_info.has_next_page {
                break;
            }
            after = match connection.page_info.end_cursor {
                Some(cursor) => Some(cursor),
                None => {
                    return Err(AuditError::GitHub(format!(
                        "{} page {page} reports more pages but no end cursor",
                        Q::COLLECTION
                    )))
                }
            };
        }

        let total = total_count.unwrap_or(0);
        ensure_complete(Q::COLLECTION, into.accumulated(), total)?;
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{MembersQuery, RepositoriesQuery};
    use crate::model::{Members, Repository};
    use std::path::PathBuf;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, page_size: u32) -> GithubClient {
        let config = AuditConfig {
            organization: "acme".to_string(),
            token: "ghp_test".to_string(),
            api_url: server.uri(),
            page_size,
            output_dir: PathBuf::from("."),
            json: false,
        };
        GithubClient::new(&config).unwrap()
    }

    fn members_page(total: u64, logins: &[&str], cursor: Option<&str>) -> Value {
        let edges: Vec<Value> = logins
            .iter()
            .map(|l| json!({"role": "MEMBER", "hasTwoFactorEnabled": true, "node": {"login": l, "name": null}}))
            .collect();
        json!({
            "data": {
                "organization": {
                    "membersWithRole": {
                        "totalCount": total,
                        "edges": edges,
                        "pageInfo": {"endCursor": cursor, "hasNextPage": cursor.is_some()}
                    }
                }
            }
        })
    }

    fn repos_page(total: u64, edges: Vec<Value>, cursor: Option<&str>) -> Value {
        json!({
            "data": {
                "organization": {
                    "repositories": {
                        "totalCount": total,
                        "edges": edges,
                        "pageInfo": {"endCursor": cursor, "hasNextPage": cursor.is_some()}
                    }
                }
            }
        })
    }

    async fn mount_page(server: &MockServer, after: Option<&str>, body: Value) {
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_partial_json(json!({"variables": {"after": after}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn follows_cursor_until_last_page() {
        let server = MockServer::start().await;
        mount_page(&server, None, members_page(3, &["alice", "bob"], Some("c1"))).await;
        mount_page(&server, Some("c1"), members_page(3, &["carol"], None)).await;

        let client = client_for(&server, 2);
        let mut members = Members::new();
        let total = client
            .fetch_all::<MembersQuery, _>(&mut members)
            .await
            .unwrap();

        assert_eq!(total, 3);
        let logins: Vec<String> = members.into_vec().into_iter().map(|m| m.login).collect();
        assert_eq!(logins, vec!["alice", "bob", "carol"]);
    }

    #[tokio::test]
    async fn short_count_is_consistency_error() {
        let server = MockServer::start().await;
        let nine: Vec<Value> = (0..9)
            .map(|i| json!({"node": {"isArchived": false, "name": format!("repo{i}"), "collaborators": null}}))
            .collect();
        mount_page(&server, None, repos_page(10, nine, None)).await;

        let client = client_for(&server, 25);
        let mut repos: Vec<Repository> = Vec::new();
        let err = client
            .fetch_all::<RepositoriesQuery, _>(&mut repos)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AuditError::Consistency {
                accumulated: 9,
                total: 10,
                ..
            }
        ));
        assert!(err.to_string().contains('9'));
        assert!(err.to_string().contains("10"));
    }

    #[tokio::test]
    async fn incomplete_entries_are_skipped_not_fatal() {
        let server = MockServer::start().await;
        let edges = vec![
            json!({"node": {"isArchived": false, "name": "core", "collaborators": null}}),
            json!({"node": null}),
        ];
        mount_page(&server, None, repos_page(1, edges, None)).await;

        let client = client_for(&server, 25);
        let mut repos: Vec<Repository> = Vec::new();
        let total = client
            .fetch_all::<RepositoriesQuery, _>(&mut repos)
            .await
            .unwrap();

        assert_eq!(total, 1);
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, "core");
    }

    #[tokio::test]
    async fn partial_errors_with_data_are_tolerated() {
        let server = MockServer::start().await;
        let mut body = repos_page(
            1,
            vec![json!({"node": {"isArchived": false, "name": "core", "collaborators": null}})],
            None,
        );
        body["errors"] = json!([{
            "type": "FORBIDDEN",
            "path": ["organization", "repositories", "edges", 0, "node", "collaborators"],
            "message": "Must have push access to view repository collaborators."
        }]);
        mount_page(&server, None, body).await;

        let client = client_for(&server, 25);
        let mut repos: Vec<Repository> = Vec::new();
        assert_eq!(
            client
                .fetch_all::<RepositoriesQuery, _>(&mut repos)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn errors_without_data_abort() {
        let server = MockServer::start().await;
        let body = json!({"data": null, "errors": [{"message": "Something went wrong"}]});
        mount_page(&server, None, body).await;

        let client = client_for(&server, 25);
        let mut members = Members::new();
        let err = client
            .fetch_all::<MembersQuery, _>(&mut members)
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::GitHub(ref m) if m.contains("Something went wrong")));
    }

    #[tokio::test]
    async fn unknown_org_is_reported() {
        let server = MockServer::start().await;
        let body = json!({
            "data": {"organization": null},
            "errors": [{"type": "NOT_FOUND", "message": "Could not resolve to an Organization with the login of 'acme'."}]
        });
        mount_page(&server, None, body).await;

        let client = client_for(&server, 25);
        let mut members = Members::new();
        let err = client
            .fetch_all::<MembersQuery, _>(&mut members)
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::OrgNotFound(ref org) if org == "acme"));
    }

    #[tokio::test]
    async fn http_failure_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"message": "Bad credentials", "documentation_url": "https://docs.github.com/graphql"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, 25);
        let mut members = Members::new();
        let err = client
            .fetch_all::<MembersQuery, _>(&mut members)
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::GitHub(ref m) if m == "Bad credentials"));
        assert!(!err.to_string().contains("Found at"));
        assert!(members.is_empty());
    }

    #[tokio::test]
    async fn failure_on_a_later_page_aborts_the_traversal() {
        let server = MockServer::start().await;
        mount_page(&server, None, members_page(3, &["alice", "bob"], Some("c1"))).await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_partial_json(json!({"variables": {"after": "c1"}})))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, 2);
        let mut members = Members::new();
        let err = client
            .fetch_all::<MembersQuery, _>(&mut members)
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::GitHub(_)));
        assert!(!err.to_string().contains("Found at"));
    }

    #[tokio::test]
    async fn repositories_follow_cursor_across_pages() {
        let server = MockServer::start().await;
        let first = vec![json!({"node": {
            "isArchived": false,
            "name": "core",
            "collaborators": {"totalCount": 1, "edges": [{"permission": "ADMIN", "node": {"login": "alice"}}]}
        }})];
        let second = vec![json!({"node": {
            "isArchived": true,
            "name": "old",
            "collaborators": {"totalCount": 1, "edges": [{"permission": "READ", "node": {"login": "bob"}}]}
        }})];
        mount_page(&server, None, repos_page(2, first, Some("r1"))).await;
        mount_page(&server, Some("r1"), repos_page(2, second, None)).await;

        let client = client_for(&server, 1);
        let mut repos: Vec<Repository> = Vec::new();
        let total = client
            .fetch_all::<RepositoriesQuery, _>(&mut repos)
            .await
            .unwrap();

        assert_eq!(total, 2);
        let names: Vec<String> = repos.iter().map(Repository::display_name).collect();
        assert_eq!(names, vec!["core", "old(ARCHIVED)"]);
        assert_eq!(repos[1].collaborators[0].login, "bob");
    }

    #[tokio::test]
    async fn enterprise_base_path_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/graphql"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(members_page(1, &["alice"], None)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = AuditConfig {
            organization: "acme".to_string(),
            token: "ghp_test".to_string(),
            api_url: format!("{}/api", server.uri()),
            page_size: 25,
            output_dir: PathBuf::from("."),
            json: false,
        };
        let client = GithubClient::new(&config).unwrap();
        let mut members = Members::new();
        assert_eq!(
            client
                .fetch_all::<MembersQuery, _>(&mut members)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_a_one_line_error() {
        let config = AuditConfig {
            organization: "acme".to_string(),
            token: "ghp_test".to_string(),
            api_url: "http://127.0.0.1:9".to_string(),
            page_size: 25,
            output_dir: PathBuf::from("."),
            json: false,
        };
        let client = GithubClient::new(&config).unwrap();
        let mut members = Members::new();
        let err = client
            .fetch_all::<MembersQuery, _>(&mut members)
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, AuditError::GitHub(_)));
        assert!(!msg.contains("Found at"));
        assert_eq!(msg.lines().count(), 1);
    }

    #[tokio::test]
    async fn next_page_without_cursor_is_rejected() {
        let server = MockServer::start().await;
        let mut body = members_page(2, &["alice"], None);
        body["data"]["organization"]["membersWithRole"]["pageInfo"]["hasNextPage"] = json!(true);
        mount_page(&server, None, body).await;

        let client = client_for(&server, 1);
        let mut members = Members::new();
        let err = client
            .fetch_all::<MembersQuery, _>(&mut members)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no end cursor"));
    }
}
