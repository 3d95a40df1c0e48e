//! Item Handlers

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequestParts, Path};
use http::Request;

use super::accepts_xml;
use crate::error::ApplicationError;
use crate::http::handler::HandlerResult;
use crate::http::response::ResponseWriter;
use crate::http::state::AppState;

/// GET /api/items/:id
///
/// XML 客户端的 not-found 直接以 XML 信封写出，其余错误交给 adapter
pub async fn get_item(state: Arc<AppState>, w: ResponseWriter, req: Request<Body>) -> HandlerResult {
    let wants_xml = accepts_xml(&req);
    let (mut parts, _body) = req.into_parts();

    let Path(raw_id) = Path::<String>::from_request_parts(&mut parts, &())
        .await
        .map_err(|e| ApplicationError::bad_request().with_cause(e.body_text()))?;

    let id: u64 = raw_id.parse().map_err(|e: std::num::ParseIntError| {
        ApplicationError::bad_request()
            .with_message("item id must be a positive integer")
            .with_field("id", raw_id.as_str())
            .with_cause(e)
    })?;

    match state.items.get(&id) {
        Some(item) if wants_xml => w.xml(item)?,
        Some(item) => w.json(item)?,
        None => {
            let err = ApplicationError::not_found().with_field("id", raw_id);
            if wants_xml {
                w.xml_err(&err)?;
            } else {
                return Err(err.into());
            }
        }
    }
    Ok(())
}
