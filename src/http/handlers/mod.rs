//! HTTP Handlers
//!
//! 参考服务的 handler，全部为 `async fn(..., ResponseWriter, Request) -> HandlerResult`

mod echo;
mod items;
mod ping;
mod session;
mod whoami;

pub use echo::echo;
pub use items::get_item;
pub use ping::ping;
pub use session::{clear_session, create_session, get_session, SESSION_COOKIE};
pub use whoami::whoami;

use http::{header, Request};

/// Accept 头是否要求 XML
fn accepts_xml<B>(request: &Request<B>) -> bool {
    request
        .headers()
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("xml"))
}
