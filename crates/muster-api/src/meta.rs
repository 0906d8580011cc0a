//! Transport-level request facts captured alongside a scan.

use std::{
  convert::Infallible,
  net::{IpAddr, SocketAddr},
};

use axum::{
  extract::{ConnectInfo, FromRequestParts},
  http::{HeaderMap, header, request::Parts},
};
use muster_core::{attendance::RequestMeta, store::AttendanceStore};

use crate::ApiState;

/// Client address and user-agent of the current request. Never rejects;
/// missing values are simply absent.
pub struct ClientMeta(pub RequestMeta);

/// First entry of `X-Forwarded-For`, if it parses as an address.
fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
  headers
    .get("x-forwarded-for")
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.split(',').next())
    .and_then(|first| first.trim().parse().ok())
}

pub fn request_meta(parts: &Parts, trust_forwarded_for: bool) -> RequestMeta {
  let peer = parts
    .extensions
    .get::<ConnectInfo<SocketAddr>>()
    .map(|ConnectInfo(addr)| addr.ip());

  let address = if trust_forwarded_for {
    forwarded_for(&parts.headers).or(peer)
  } else {
    peer
  };

  let user_agent = parts
    .headers
    .get(header::USER_AGENT)
    .and_then(|v| v.to_str().ok())
    .map(str::to_owned);

  RequestMeta { address, user_agent }
}

impl<S> FromRequestParts<ApiState<S>> for ClientMeta
where
  S: AttendanceStore + 'static,
{
  type Rejection = Infallible;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S>,
  ) -> Result<Self, Self::Rejection> {
    Ok(ClientMeta(request_meta(parts, state.options.trust_forwarded_for)))
  }
}

#[cfg(test)]
mod tests {
  use axum::http::Request;

  use super::*;

  fn parts(forwarded: Option<&str>, peer: Option<&str>) -> Parts {
    let mut builder = Request::builder().header(header::USER_AGENT, "Mozilla/5.0");
    if let Some(v) = forwarded {
      builder = builder.header("x-forwarded-for", v);
    }
    let mut req = builder.body(()).unwrap();
    if let Some(p) = peer {
      req.extensions_mut().insert(ConnectInfo(p.parse::<SocketAddr>().unwrap()));
    }
    req.into_parts().0
  }

  #[test]
  fn forwarded_for_takes_first_entry() {
    let p = parts(Some("198.51.100.4, 10.0.0.1"), Some("10.0.0.1:443"));
    let meta = request_meta(&p, true);
    assert_eq!(meta.address, Some("198.51.100.4".parse().unwrap()));
    assert_eq!(meta.user_agent.as_deref(), Some("Mozilla/5.0"));
  }

  #[test]
  fn untrusted_forwarded_for_is_ignored() {
    let p = parts(Some("198.51.100.4"), Some("10.0.0.1:443"));
    assert_eq!(request_meta(&p, false).address, Some("10.0.0.1".parse().unwrap()));
  }

  #[test]
  fn garbage_forwarded_for_falls_back_to_peer() {
    let p = parts(Some("unknown"), Some("[2001:db8::2]:8080"));
    assert_eq!(request_meta(&p, true).address, Some("2001:db8::2".parse().unwrap()));
  }

  #[test]
  fn no_address_at_all() {
    assert_eq!(request_meta(&parts(None, None), true).address, None);
  }
}
