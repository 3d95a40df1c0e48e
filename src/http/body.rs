//! Request Body Decoder
//!
//! 读取请求体后立即放回，后续的读取者（其他 decoder、日志中间件）仍能看到完整的 body。
//! 读取失败（包括超过长度限制）时，已读出的部分与未读的剩余部分一起放回。

use axum::body::{Body, BodyDataStream, Bytes, HttpBody};
use futures_util::{stream, StreamExt};
use http::Request;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::error::ApplicationError;

/// Body 解码错误
#[derive(Debug, Error)]
pub enum BodyError {
    /// 请求完全没有 body（与存在但无法解析的 body 区分）
    #[error("no http body bytes to read")]
    NoBody,

    #[error("failed to read request body: {0}")]
    Read(#[source] axum::Error),

    /// 解析失败，原样透传 codec 错误
    #[error(transparent)]
    Parse(#[from] serde_json::Error),
}

impl From<BodyError> for ApplicationError {
    fn from(err: BodyError) -> Self {
        ApplicationError::bad_request().with_cause(err)
    }
}

/// 请求是否携带 body
///
/// 在读取之前就报告 end-of-stream 的 body 视为没有 body，
/// hyper 对 `Content-Length: 0` 的请求也是如此。
pub fn has_body<B: HttpBody>(request: &Request<B>) -> bool {
    !request.body().is_end_stream()
}

/// 读取全部 body 并放回请求
pub async fn read_body(request: &mut Request<Body>) -> Result<Bytes, BodyError> {
    read_body_with_limit(request, usize::MAX).await
}

/// 同 `read_body`，超过 `limit` 字节时返回 `BodyError::Read`，body 保持完整
pub async fn read_body_with_limit(
    request: &mut Request<Body>,
    limit: usize,
) -> Result<Bytes, BodyError> {
    if !has_body(request) {
        return Err(BodyError::NoBody);
    }

    let mut data = std::mem::take(request.body_mut()).into_data_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = data.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                restore_partial(request, buf, data);
                return Err(BodyError::Read(e));
            }
        };

        buf.extend_from_slice(&chunk);
        if buf.len() > limit {
            restore_partial(request, buf, data);
            return Err(BodyError::Read(axum::Error::new(format!(
                "length limit of {} bytes exceeded",
                limit
            ))));
        }
    }

    let bytes = Bytes::from(buf);
    *request.body_mut() = Body::from(bytes.clone());
    Ok(bytes)
}

/// 已读出的字节在前，未读的剩余数据在后，重新组装为请求 body
fn restore_partial(request: &mut Request<Body>, consumed: Vec<u8>, rest: BodyDataStream) {
    let head = stream::once(async move { Ok::<_, axum::Error>(Bytes::from(consumed)) });
    *request.body_mut() = Body::from_stream(head.chain(rest));
}

/// 将 JSON body 解码为 `T`，body 保持可重复读取
pub async fn decode_body<T: DeserializeOwned>(request: &mut Request<Body>) -> Result<T, BodyError> {
    decode_body_with_limit(request, usize::MAX).await
}

pub async fn decode_body_with_limit<T: DeserializeOwned>(
    request: &mut Request<Body>,
    limit: usize,
) -> Result<T, BodyError> {
    let bytes = read_body_with_limit(request, limit).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
