//! Jira Cloud adapter for filing reviewed stories.
//!
//! Endpoint: POST {base}/rest/api/3/issue
//! Auth: Basic (account email + API token)

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{AdapterError, IssuePayload, IssueTracker};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Jira connection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraConfig {
    pub base_url: Option<String>,
    pub email: Option<String>,
    pub api_token: Option<String>,
    /// Default project for filed stories
    pub project_key: Option<String>,
    /// Custom field id that takes acceptance criteria (e.g. customfield_10035)
    pub acceptance_field: Option<String>,
}

/// Jira REST client
pub struct JiraTracker {
    config: JiraConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    key: String,
}

impl JiraTracker {
    pub fn new(config: JiraConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn project_key(&self) -> Option<&str> {
        self.config.project_key.as_deref()
    }

    fn credentials(&self) -> Result<(&str, &str, &str), AdapterError> {
        let missing = |what: &str| AdapterError::ConfigurationMissing(format!("Jira {}", what));
        let base = non_empty(&self.config.base_url).ok_or_else(|| missing("base URL"))?;
        let email = non_empty(&self.config.email).ok_or_else(|| missing("account email"))?;
        let token = non_empty(&self.config.api_token).ok_or_else(|| missing("API token"))?;
        Ok((base.trim_end_matches('/'), email, token))
    }

    fn issue_body(&self, issue: &IssuePayload) -> Value {
        let mut fields = json!({
            "project": { "key": issue.project_key },
            "summary": issue.summary,
            "description": adf_document(&issue.description),
            "issuetype": { "name": issue.issue_type.as_str() },
            "labels": issue.labels,
        });

        if let (Some(field), false) = (
            non_empty(&self.config.acceptance_field),
            issue.acceptance_criteria.is_empty(),
        ) {
            let text = issue
                .acceptance_criteria
                .iter()
                .map(|c| format!("- {}", c))
                .collect::<Vec<_>>()
                .join("\n");
            fields[field] = adf_document(&text);
        }

        json!({ "fields": fields })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Plain text as an Atlassian document, one paragraph per blank-line block
fn adf_document(text: &str) -> Value {
    let paragraphs: Vec<Value> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            json!({
                "type": "paragraph",
                "content": [{ "type": "text", "text": p }],
            })
        })
        .collect();

    json!({
        "type": "doc",
        "version": 1,
        "content": paragraphs,
    })
}

#[async_trait]
impl IssueTracker for JiraTracker {
    fn name(&self) -> &str {
        "jira"
    }

    async fn create_issue(&self, issue: &IssuePayload) -> Result<String, AdapterError> {
        let (base, email, token) = self.credentials()?;
        let url = format!("{}/rest/api/3/issue", base);

        let response = self
            .client
            .post(&url)
            .basic_auth(email, Some(token))
            .timeout(REQUEST_TIMEOUT)
            .json(&self.issue_body(issue))
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Rejected {
                service: "jira",
                status: status.as_u16(),
                body,
            });
        }

        let created: CreatedIssue = response
            .json()
            .await
            .map_err(|e| AdapterError::MalformedResponse(e.to_string()))?;
        Ok(created.key)
    }
}
