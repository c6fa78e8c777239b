use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use url::Url;

use crate::{
    client::{Actor, CommentApi},
    error::AppError,
    models::{
        comment::{RawComment, RawReply},
        moderation::{ModerationAction, ModerationFilters, ModerationQueueItem},
    },
};

/// JSON-over-HTTP client for the comment server.
///
/// Endpoints, relative to the base URL:
///
/// * `GET  lessons/{lesson_id}/comments`
/// * `POST lessons/{lesson_id}/comments`
/// * `POST comments/{comment_id}/replies`
/// * `POST comments/{comment_id}/moderation`
/// * `POST comments/{comment_id}/replies/{reply_id}/moderation`
/// * `GET  moderation/pending`
#[derive(Debug, Clone)]
pub struct HttpCommentApi {
    client: Client,
    base_url: Url,
    service_token: Option<String>,
}

impl HttpCommentApi {
    pub fn new(base_url: Url, service_token: Option<String>) -> Self {
        Self::with_client(Client::new(), base_url, service_token)
    }

    pub fn with_client(client: Client, base_url: Url, service_token: Option<String>) -> Self {
        Self {
            client,
            base_url,
            service_token,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                AppError::InternalServerError(format!(
                    "comment API URL cannot be a base: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// The caller's own token wins over the service token.
    fn authorize(&self, request: RequestBuilder, actor: Option<&Actor>) -> RequestBuilder {
        match actor.and_then(|a| a.token.as_deref()).or(self.service_token.as_deref()) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn post<B, T>(&self, actor: &Actor, url: Url, body: &B) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.authorize(self.client.post(url), Some(actor)).json(body);
        decode(request.send().await?).await
    }

    async fn get<Q, T>(&self, url: Url, query: &Q) -> Result<T, AppError>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.authorize(self.client.get(url), None).query(query);
        decode(request.send().await?).await
    }
}

/// Maps non-2xx responses onto the error taxonomy and decodes the rest.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let detail = response.text().await.unwrap_or_default();
    tracing::debug!(%status, detail = %detail, "comment server rejected request");
    Err(match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => AppError::BadRequest(detail),
        StatusCode::NOT_FOUND => AppError::NotFound(detail),
        StatusCode::CONFLICT => AppError::Conflict(detail),
        StatusCode::UNAUTHORIZED => AppError::AuthError(detail),
        StatusCode::FORBIDDEN => AppError::Forbidden(detail),
        _ => AppError::Upstream(format!("comment server returned {}: {}", status, detail)),
    })
}

#[async_trait]
impl CommentApi for HttpCommentApi {
    async fn create_comment(
        &self,
        actor: &Actor,
        lesson_id: &str,
        body: &str,
    ) -> Result<RawComment, AppError> {
        let url = self.endpoint(&["lessons", lesson_id, "comments"])?;
        self.post(actor, url, &json!({ "body": body })).await
    }

    async fn create_reply(
        &self,
        actor: &Actor,
        comment_id: &str,
        parent_reply_id: Option<&str>,
        body: &str,
    ) -> Result<RawReply, AppError> {
        let url = self.endpoint(&["comments", comment_id, "replies"])?;
        self.post(
            actor,
            url,
            &json!({ "body": body, "parentReplyId": parent_reply_id }),
        )
        .await
    }

    async fn list_comments(&self, lesson_id: &str) -> Result<Vec<RawComment>, AppError> {
        let url = self.endpoint(&["lessons", lesson_id, "comments"])?;
        self.get(url, &[] as &[(&str, &str)]).await
    }

    async fn moderate_comment(
        &self,
        actor: &Actor,
        comment_id: &str,
        action: ModerationAction,
    ) -> Result<RawComment, AppError> {
        let url = self.endpoint(&["comments", comment_id, "moderation"])?;
        self.post(actor, url, &json!({ "action": action })).await
    }

    async fn moderate_reply(
        &self,
        actor: &Actor,
        comment_id: &str,
        reply_id: &str,
        action: ModerationAction,
    ) -> Result<RawReply, AppError> {
        let url = self.endpoint(&["comments", comment_id, "replies", reply_id, "moderation"])?;
        self.post(actor, url, &json!({ "action": action })).await
    }

    async fn list_pending_moderation_items(
        &self,
        filters: &ModerationFilters,
    ) -> Result<Vec<ModerationQueueItem>, AppError> {
        let url = self.endpoint(&["moderation", "pending"])?;
        self.get(url, filters).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_escapes_ids_and_keeps_base_path() {
        let api = HttpCommentApi::new(Url::parse("http://comments.local/api/").unwrap(), None);
        let url = api.endpoint(&["lessons", "a/b c", "comments"]).unwrap();
        assert_eq!(url.as_str(), "http://comments.local/api/lessons/a%2Fb%20c/comments");
    }
}
