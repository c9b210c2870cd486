use reqwest::{RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use pulse_insights::aggregate::DashboardOverview;
use pulse_types::api::{
    FeedbackPage, LoginRequest, LoginResponse, NewFeedback, NewIssue, PasswordResetConfirm, PasswordResetRequest,
    RegisterRequest, RegisterResponse, TeamRoster, UpdateIssue, UpdateProfile, UsernameAvailability,
};
use pulse_types::models::{Feedback, Issue, User};
use pulse_types::query::FeedbackQuery;

use crate::error::ClientError;

pub type Result<T> = std::result::Result<T, ClientError>;

/// REST client bound to one server. Holds the session token once signed in.
#[derive(Debug, Clone)]
pub struct PulseClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl PulseClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token.as_deref().ok_or(ClientError::NotSignedIn)?;
        Ok(req.bearer_auth(token))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.authed(self.http.get(self.url(path)))?.send().await?;
        read_json(resp).await
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(&self, req: RequestBuilder, body: &B) -> Result<T> {
        let resp = self.authed(req)?.json(body).send().await?;
        read_json(resp).await
    }

    // -- Auth --

    pub async fn register(&mut self, email: &str, password: &str, username: &str) -> Result<RegisterResponse> {
        let body = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            username: username.to_string(),
        };
        let resp = self.http.post(self.url("/auth/register")).json(&body).send().await?;
        let registered: RegisterResponse = read_json(resp).await?;
        self.token = Some(registered.token.clone());
        Ok(registered)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<LoginResponse> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let resp = self.http.post(self.url("/auth/login")).json(&body).send().await?;
        let session: LoginResponse = read_json(resp).await?;
        self.token = Some(session.token.clone());
        Ok(session)
    }

    /// Tell the server, then forget the token whatever it answered.
    pub async fn logout(&mut self) -> Result<()> {
        let result = match self.authed(self.http.post(self.url("/auth/logout"))) {
            Ok(req) => expect_empty(req.send().await?).await,
            Err(e) => Err(e),
        };
        self.token = None;
        result
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let body = PasswordResetRequest { email: email.to_string() };
        let resp = self.http.post(self.url("/auth/reset-password")).json(&body).send().await?;
        expect_empty(resp).await
    }

    pub async fn confirm_password_reset(&self, token: &str, new_password: &str) -> Result<()> {
        let body = PasswordResetConfirm {
            token: token.to_string(),
            new_password: new_password.to_string(),
        };
        let resp = self
            .http
            .post(self.url("/auth/reset-password/confirm"))
            .json(&body)
            .send()
            .await?;
        expect_empty(resp).await
    }

    pub async fn username_available(&self, username: &str) -> Result<bool> {
        let resp = self
            .http
            .get(self.url("/auth/username-available"))
            .query(&[("username", username)])
            .send()
            .await?;
        let answer: UsernameAvailability = read_json(resp).await?;
        Ok(answer.available)
    }

    // -- Feedbacks --

    pub async fn insert_feedback(&self, feedback: &NewFeedback) -> Result<Feedback> {
        self.send_json(self.http.post(self.url("/feedbacks")), feedback).await
    }

    pub async fn query_feedbacks(&self, query: &FeedbackQuery) -> Result<FeedbackPage> {
        self.send_json(self.http.post(self.url("/feedbacks/query")), query).await
    }

    pub async fn mark_processed(&self, id: Uuid) -> Result<Feedback> {
        let resp = self
            .authed(self.http.post(self.url(&format!("/feedbacks/{}/processed", id))))?
            .send()
            .await?;
        read_json(resp).await
    }

    pub async fn delete_feedback(&self, id: Uuid) -> Result<()> {
        let resp = self
            .authed(self.http.delete(self.url(&format!("/feedbacks/{}", id))))?
            .send()
            .await?;
        expect_empty(resp).await
    }

    // -- Issues --

    pub async fn list_issues(&self, limit: u32) -> Result<Vec<Issue>> {
        self.get(&format!("/issues?limit={}", limit)).await
    }

    pub async fn create_issue(&self, title: &str) -> Result<Issue> {
        let body = NewIssue { issue_title: title.to_string() };
        self.send_json(self.http.post(self.url("/issues")), &body).await
    }

    pub async fn update_issue(&self, id: Uuid, title: &str) -> Result<Issue> {
        let body = UpdateIssue { issue_title: title.to_string() };
        self.send_json(self.http.patch(self.url(&format!("/issues/{}", id))), &body)
            .await
    }

    pub async fn delete_issue(&self, id: Uuid) -> Result<()> {
        let resp = self
            .authed(self.http.delete(self.url(&format!("/issues/{}", id))))?
            .send()
            .await?;
        expect_empty(resp).await
    }

    // -- Team & settings --

    pub async fn roster(&self) -> Result<Vec<User>> {
        let roster: TeamRoster = self.get("/team").await?;
        Ok(roster.members)
    }

    pub async fn profile(&self) -> Result<User> {
        self.get("/settings/profile").await
    }

    pub async fn update_profile(&self, update: &UpdateProfile) -> Result<User> {
        self.send_json(self.http.put(self.url("/settings/profile")), update).await
    }

    /// Overview computed server-side; `load_dashboard` is the local variant.
    pub async fn server_overview(&self, tz_offset_minutes: i32) -> Result<DashboardOverview> {
        self.get(&format!("/insights/overview?tz_offset_minutes={}", tz_offset_minutes))
            .await
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let status = resp.status();
    let bytes = resp.bytes().await?;
    if !status.is_success() {
        return Err(ClientError::Http {
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }
    Ok(serde_json::from_slice(&bytes)?)
}

async fn expect_empty(resp: Response) -> Result<()> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Http { status, body });
    }
    Ok(())
}
