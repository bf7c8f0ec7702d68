use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use super::types::{GitLabProject, GitLabUser, Pipeline, PipelineJob};
use crate::auth::Token;
use crate::error::{CIWatchError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

const PROJECT_PAGE_SIZE: usize = 100;
const PIPELINE_PAGE_SIZE: usize = 5;
const JOB_PAGE_SIZE: usize = 100;

/// GitLab REST v4 client.
///
/// One instance per set of credentials; the monitor replaces the whole client
/// on restart rather than mutating one that an in-flight cycle may be using.
pub struct GitLabClient {
    client: reqwest::Client,
    base_url: Url,
}

impl GitLabClient {
    /// Creates a client for the given instance URL and personal access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse or the HTTP client
    /// cannot be constructed.
    pub fn new(base_url: &str, token: &Token) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| CIWatchError::InvalidUrl(format!("{base_url}: {e}")))?;

        // Url::join drops the last path segment without a trailing slash.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let token_value = HeaderValue::from_str(token.as_str())
            .map_err(|_| CIWatchError::Config("Token contains invalid characters".to_string()))?;
        headers.insert("PRIVATE-TOKEN", token_value);

        let client = reqwest::Client::builder()
            .user_agent("ciwatch/0.3.0")
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| CIWatchError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url: base })
    }

    /// The identity the token authenticates as.
    pub async fn current_user(&self) -> Result<GitLabUser> {
        self.get("api/v4/user", &[]).await
    }

    /// Projects the user is a member of with activity after the cutoff,
    /// newest activity first. Follows pagination until a short page.
    pub async fn projects(&self, last_activity_after: DateTime<Utc>) -> Result<Vec<GitLabProject>> {
        let mut all = Vec::new();
        let mut page = 1;

        loop {
            let batch: Vec<GitLabProject> = self
                .get(
                    "api/v4/projects",
                    &[
                        ("membership", "true".to_string()),
                        ("simple", "true".to_string()),
                        ("per_page", PROJECT_PAGE_SIZE.to_string()),
                        ("page", page.to_string()),
                        ("order_by", "last_activity_at".to_string()),
                        ("sort", "desc".to_string()),
                        ("last_activity_after", iso8601(last_activity_after)),
                    ],
                )
                .await?;

            let batch_len = batch.len();
            all.extend(batch);

            if batch_len < PROJECT_PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    /// Recent pipelines in a project triggered by the given username and
    /// updated after the cutoff. Bounded to a single small page, newest first.
    pub async fn pipelines(
        &self,
        project_id: u64,
        username: &str,
        updated_after: DateTime<Utc>,
    ) -> Result<Vec<Pipeline>> {
        self.get(
            &format!("api/v4/projects/{project_id}/pipelines"),
            &[
                ("username", username.to_string()),
                ("per_page", PIPELINE_PAGE_SIZE.to_string()),
                ("order_by", "updated_at".to_string()),
                ("sort", "desc".to_string()),
                ("updated_after", iso8601(updated_after)),
            ],
        )
        .await
    }

    /// All jobs of a pipeline, single page, order irrelevant.
    pub async fn jobs(&self, project_id: u64, pipeline_id: u64) -> Result<Vec<PipelineJob>> {
        self.get(
            &format!("api/v4/projects/{project_id}/pipelines/{pipeline_id}/jobs"),
            &[("per_page", JOB_PAGE_SIZE.to_string())],
        )
        .await
    }

    /// The most recent pipeline on a ref, regardless of who triggered it.
    pub async fn latest_pipeline(&self, project_id: u64, ref_: &str) -> Result<Option<Pipeline>> {
        let pipelines: Vec<Pipeline> = self
            .get(
                &format!("api/v4/projects/{project_id}/pipelines"),
                &[
                    ("ref", ref_.to_string()),
                    ("per_page", "1".to_string()),
                    ("order_by", "id".to_string()),
                    ("sort", "desc".to_string()),
                ],
            )
            .await?;

        Ok(pipelines.into_iter().next())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| CIWatchError::InvalidUrl(format!("{path}: {e}")))?;

        debug!("GET {url}");

        let response = self.client.get(url).query(query).send().await?;

        match response.status().as_u16() {
            200..=299 => {}
            401 => return Err(CIWatchError::Unauthorized),
            403 => return Err(CIWatchError::Forbidden),
            404 => return Err(CIWatchError::NotFound),
            429 => return Err(CIWatchError::RateLimited),
            code => return Err(CIWatchError::Http(code)),
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| CIWatchError::InvalidResponse(format!("{path}: {e}")))
    }
}

fn iso8601(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitlab::types::PipelineStatus;
    use mockito::Matcher;

    fn client(server: &mockito::ServerGuard) -> GitLabClient {
        GitLabClient::new(&server.url(), &Token::from("glpat-test")).unwrap()
    }

    #[tokio::test]
    async fn test_current_user_sends_token_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v4/user")
            .match_header("PRIVATE-TOKEN", "glpat-test")
            .with_status(200)
            .with_body(r#"{"id": 7, "username": "jane", "name": "Jane Doe", "avatar_url": null}"#)
            .create_async()
            .await;

        let user = client(&server).current_user().await.unwrap();
        assert_eq!(user.username, "jane");
        assert_eq!(user.id, 7);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_projects_follow_pagination() {
        let mut server = mockito::Server::new_async().await;

        let full_page: Vec<String> = (1..=100)
            .map(|i| {
                format!(
                    r#"{{"id": {i}, "name": "p{i}", "name_with_namespace": "g / p{i}",
                        "path_with_namespace": "g/p{i}", "web_url": "https://x/p{i}",
                        "last_activity_at": "2025-01-15T10:00:00Z"}}"#
                )
            })
            .collect();

        let page1 = server
            .mock("GET", "/api/v4/projects")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .with_body(format!("[{}]", full_page.join(",")))
            .create_async()
            .await;
        let page2 = server
            .mock("GET", "/api/v4/projects")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_body(
                r#"[{"id": 101, "name": "last", "name_with_namespace": "g / last",
                     "path_with_namespace": "g/last", "web_url": "https://x/last",
                     "last_activity_at": null}]"#,
            )
            .create_async()
            .await;

        let projects = client(&server).projects(Utc::now()).await.unwrap();
        assert_eq!(projects.len(), 101);
        assert_eq!(projects[100].name, "last");
        page1.assert_async().await;
        page2.assert_async().await;
    }

    #[tokio::test]
    async fn test_pipelines_filters_by_username() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v4/projects/88/pipelines")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("username".into(), "jane".into()),
                Matcher::UrlEncoded("per_page".into(), "5".into()),
                Matcher::UrlEncoded("order_by".into(), "updated_at".into()),
            ]))
            .with_body(
                r#"[{"id": 4221, "status": "running", "ref": "main", "sha": "abc123",
                     "web_url": "https://x/-/pipelines/4221"}]"#,
            )
            .create_async()
            .await;

        let pipelines = client(&server)
            .pipelines(88, "jane", Utc::now())
            .await
            .unwrap();
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].status, PipelineStatus::Running);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_latest_pipeline_returns_none_for_empty_ref() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v4/projects/88/pipelines")
            .match_query(Matcher::UrlEncoded("ref".into(), "gone".into()))
            .with_body("[]")
            .create_async()
            .await;

        let latest = client(&server).latest_pipeline(88, "gone").await.unwrap();
        assert!(latest.is_none());
    }

    #[tokio::test]
    async fn test_http_error_classification() {
        let mut server = mockito::Server::new_async().await;
        for (status, path) in [(401, "a"), (403, "b"), (404, "c"), (429, "d"), (502, "e")] {
            server
                .mock("GET", format!("/api/v4/projects/1/pipelines/{path}/jobs").as_str())
                .match_query(Matcher::Any)
                .with_status(status)
                .create_async()
                .await;
        }

        async fn get(
            client: &GitLabClient,
            path: &str,
        ) -> Result<Vec<PipelineJob>> {
            client
                .get(&format!("api/v4/projects/1/pipelines/{path}/jobs"), &[])
                .await
        }

        let client = client(&server);
        assert!(matches!(get(&client, "a").await, Err(CIWatchError::Unauthorized)));
        assert!(matches!(get(&client, "b").await, Err(CIWatchError::Forbidden)));
        assert!(matches!(get(&client, "c").await, Err(CIWatchError::NotFound)));
        assert!(matches!(get(&client, "d").await, Err(CIWatchError::RateLimited)));
        assert!(matches!(get(&client, "e").await, Err(CIWatchError::Http(502))));
    }

    #[tokio::test]
    async fn test_decode_failure_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v4/user")
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let result = client(&server).current_user().await;
        assert!(matches!(result, Err(CIWatchError::InvalidResponse(_))));
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let result = GitLabClient::new("not a url", &Token::from("t"));
        assert!(matches!(result, Err(CIWatchError::InvalidUrl(_))));
    }
}
