use chrono::{DateTime, Utc};
use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

use crate::api::models::{
    Conversation, Membership, Message, NewMessage, NewProfile, Profile, ProfileFields, Session,
    SessionUser, SignUpOutcome,
};
use crate::error::ApiError;

const CHAT_SELECT: &str = "chat_id,chats(id,name,is_group,last_message,last_message_at,created_at,\
chat_labels(labels(id,name,color)),\
chat_participants(profiles(id,display_name,avatar_url,phone_number)))";
const MESSAGE_SELECT: &str = "*,sender:sender_id(id,display_name,avatar_url)";
const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Thin client over the hosted platform's auth and REST surfaces.
#[derive(Clone)]
pub struct ApiClient {
    http: HttpClient,
    base: Url,
    anon_key: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: SessionUser,
}

impl TokenResponse {
    fn into_session(self, now: i64) -> Session {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| now + self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub(crate) fn classify_error(status: u16, body: &str) -> ApiError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed
        .error_code
        .as_deref()
        .or(parsed.error.as_deref())
        .unwrap_or("")
        .to_string();
    let message = parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .unwrap_or_else(|| {
            if body.trim().is_empty() { "request failed".to_string() } else { body.trim().to_string() }
        });
    match code.as_str() {
        "invalid_credentials" | "invalid_grant" => ApiError::InvalidCredentials,
        "user_already_exists" | "email_exists" => ApiError::DuplicateAccount,
        _ if message.contains("already registered") => ApiError::DuplicateAccount,
        _ if message == "Invalid login credentials" => ApiError::InvalidCredentials,
        _ => ApiError::Status { status, message },
    }
}

async fn check(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(classify_error(status.as_u16(), &body))
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let bytes = check(resp).await?.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

impl ApiClient {
    pub fn new(backend_url: &str, anon_key: &str) -> Result<Self, ApiError> {
        let base = Url::parse(&crate::utils::normalize_url(backend_url))?;
        Ok(Self {
            http: HttpClient::new(),
            base,
            anon_key: anon_key.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base.as_str().trim_end_matches('/'), path)
    }

    fn rest(&self, table: &str) -> String {
        self.endpoint(&format!("rest/v1/{}", table))
    }

    fn auth(&self, path: &str) -> String {
        self.endpoint(&format!("auth/v1/{}", path))
    }

    /// Every request carries the anon key; the bearer is the user's token when signed in.
    fn with_auth(&self, req: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        let bearer = token.unwrap_or(self.anon_key.as_str());
        req.header("apikey", self.anon_key.as_str())
            .header("Authorization", format!("Bearer {}", bearer))
    }

    /// Websocket endpoint of the realtime service, e.g. `wss://host/realtime/v1/websocket?apikey=..&vsn=1.0.0`.
    pub fn realtime_url(&self) -> Result<Url, ApiError> {
        let scheme = if self.base.scheme() == "http" { "ws" } else { "wss" };
        let rest = &self.base.as_str()[self.base.scheme().len()..];
        let mut url = Url::parse(&format!(
            "{}{}/realtime/v1/websocket",
            scheme,
            rest.trim_end_matches('/')
        ))?;
        url.query_pairs_mut()
            .append_pair("apikey", &self.anon_key)
            .append_pair("vsn", "1.0.0");
        Ok(url)
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let req = self
            .http
            .post(self.auth("token"))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        let resp = self.with_auth(req, None).send().await?;
        let token: TokenResponse = decode(resp).await?;
        Ok(token.into_session(Utc::now().timestamp()))
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session, ApiError> {
        let req = self
            .http
            .post(self.auth("token"))
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }));
        let resp = self.with_auth(req, None).send().await?;
        let token: TokenResponse = decode(resp).await?;
        Ok(token.into_session(Utc::now().timestamp()))
    }

    /// Creates the auth user. The backend answers with a full session when auto-confirm is on,
    /// and with the bare user object when the address still needs confirming.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        fields: &ProfileFields,
    ) -> Result<SignUpOutcome, ApiError> {
        let req = self.http.post(self.auth("signup")).json(&json!({
            "email": email,
            "password": password,
            "data": fields,
        }));
        let resp = self.with_auth(req, None).send().await?;
        let body: Value = decode(resp).await?;
        if body.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(body)?;
            return Ok(SignUpOutcome::SignedIn(token.into_session(Utc::now().timestamp())));
        }
        let user_id = body
            .get("id")
            .or_else(|| body.get("user").and_then(|u| u.get("id")))
            .and_then(|v| v.as_str())
            .ok_or_else(|| ApiError::Decode("sign-up response carries no user id".into()))?;
        Ok(SignUpOutcome::ConfirmationRequired { user_id: user_id.to_string() })
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), ApiError> {
        let req = self.http.post(self.auth("logout"));
        let resp = self.with_auth(req, Some(access_token)).send().await?;
        check(resp).await?;
        Ok(())
    }

    pub async fn insert_profile(&self, token: Option<&str>, profile: &NewProfile) -> Result<(), ApiError> {
        let req = self
            .http
            .post(self.rest("profiles"))
            .header("Prefer", "return=minimal")
            .json(profile);
        let resp = self.with_auth(req, token).send().await?;
        check(resp).await?;
        Ok(())
    }

    pub async fn profile(&self, token: &str, user_id: &str) -> Result<Option<Profile>, ApiError> {
        let id_filter = format!("eq.{}", user_id);
        let req = self
            .http
            .get(self.rest("profiles"))
            .query(&[("select", "*"), ("id", id_filter.as_str())]);
        let resp = self.with_auth(req, Some(token)).send().await?;
        let rows: Vec<Profile> = decode(resp).await?;
        Ok(rows.into_iter().next())
    }

    /// Conversations the user takes part in, each expanded with labels and participant profiles.
    pub async fn conversations(&self, token: &str, user_id: &str) -> Result<Vec<Conversation>, ApiError> {
        let user_filter = format!("eq.{}", user_id);
        let req = self
            .http
            .get(self.rest("chat_participants"))
            .query(&[("select", CHAT_SELECT), ("user_id", user_filter.as_str())]);
        let resp = self.with_auth(req, Some(token)).send().await?;
        let rows: Vec<Membership> = decode(resp).await?;
        Ok(rows
            .into_iter()
            .filter_map(|m| {
                if m.chats.is_none() {
                    log::debug!("membership {} has no visible chat", m.chat_id);
                }
                m.chats
            })
            .collect())
    }

    /// All messages of one conversation, oldest first, with sender display fields.
    pub async fn messages(&self, token: &str, chat_id: &str) -> Result<Vec<Message>, ApiError> {
        let chat_filter = format!("eq.{}", chat_id);
        let req = self.http.get(self.rest("messages")).query(&[
            ("select", MESSAGE_SELECT),
            ("chat_id", chat_filter.as_str()),
            ("order", "created_at.asc"),
        ]);
        let resp = self.with_auth(req, Some(token)).send().await?;
        decode(resp).await
    }

    pub async fn insert_message(&self, token: &str, message: &NewMessage) -> Result<(), ApiError> {
        let req = self
            .http
            .post(self.rest("messages"))
            .header("Prefer", "return=minimal")
            .json(message);
        let resp = self.with_auth(req, Some(token)).send().await?;
        check(resp).await?;
        Ok(())
    }

    pub async fn update_chat_preview(
        &self,
        token: &str,
        chat_id: &str,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        let id_filter = format!("eq.{}", chat_id);
        let req = self
            .http
            .patch(self.rest("chats"))
            .query(&[("id", id_filter.as_str())])
            .header("Prefer", "return=minimal")
            .json(&json!({ "last_message": text, "last_message_at": at }));
        let resp = self.with_auth(req, Some(token)).send().await?;
        check(resp).await?;
        Ok(())
    }
}
