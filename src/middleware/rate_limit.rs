//! Rate limiting middleware
//!
//! Login attempts are limited per client IP with a keyed `governor` limiter.
//! Account lockout after repeated wrong passwords lives in the auth service;
//! this layer only throttles request volume.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::utils::errors::SchoolEventsError;

/// Per-IP limiter shared by all requests to the guarded routes
#[derive(Clone)]
pub struct RateLimitMiddleware {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    per_minute: u32,
}

impl std::fmt::Debug for RateLimitMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitMiddleware")
            .field("per_minute", &self.per_minute)
            .finish()
    }
}

impl RateLimitMiddleware {
    /// Allow `per_minute` requests per client; zero is treated as one
    pub fn per_minute(per_minute: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            per_minute,
        }
    }

    pub fn check(&self, client: IpAddr) -> Result<(), SchoolEventsError> {
        match self.limiter.check_key(&client) {
            Ok(()) => {
                debug!(client = %client, "Rate limit check passed");
                Ok(())
            }
            Err(_) => {
                warn!(client = %client, "Rate limit exceeded");
                Err(SchoolEventsError::RateLimitExceeded)
            }
        }
    }

    /// Drop state of clients that are back under their quota
    pub fn cleanup_old_entries(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of clients with limiter state
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    /// Run [`cleanup_old_entries`](Self::cleanup_old_entries) every `every` until the handle is aborted
    pub fn spawn_cleanup(&self, every: Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                limiter.cleanup_old_entries();
                debug!(clients = limiter.tracked_clients(), "Rate limiter state pruned");
            }
        })
    }
}

/// Client address for rate limiting
///
/// nginx appends the peer it saw to `X-Forwarded-For`, so only the last hop
/// is trusted; earlier entries are whatever the client sent. Without the
/// header, nginx's `X-Real-IP` and then the socket address are used.
pub fn client_ip(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> IpAddr {
    let forwarded = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .last()
        .and_then(|v| v.trim().parse::<IpAddr>().ok());
    if let Some(ip) = forwarded {
        return ip;
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());
    if let Some(ip) = real_ip {
        return ip;
    }

    connect_info
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// `from_fn_with_state` adapter
pub async fn limit_requests(State(limiter): State<RateLimitMiddleware>, request: Request, next: Next) -> Response {
    let client = client_ip(request.headers(), request.extensions().get::<ConnectInfo<SocketAddr>>());
    if let Err(e) = limiter.check(client) {
        return e.into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_rate_limit_basic() {
        let limiter = RateLimitMiddleware::per_minute(2);
        let client: IpAddr = "10.0.0.1".parse().unwrap();

        assert!(limiter.check(client).is_ok());
        assert!(limiter.check(client).is_ok());
        assert_matches!(limiter.check(client), Err(SchoolEventsError::RateLimitExceeded));

        let other: IpAddr = "10.0.0.2".parse().unwrap();
        assert!(limiter.check(other).is_ok());
    }

    #[test]
    fn test_client_ip_uses_last_forwarded_hop() {
        let mut headers = HeaderMap::new();
        // the first entry is client controlled, nginx appended the last one
        headers.insert("x-forwarded-for", "1.2.3.4, 203.0.113.7".parse().unwrap());
        headers.insert("x-real-ip", "198.51.100.1".parse().unwrap());
        assert_eq!(client_ip(&headers, None), "203.0.113.7".parse::<IpAddr>().unwrap());

        headers.append("x-forwarded-for", "203.0.113.8".parse().unwrap());
        assert_eq!(client_ip(&headers, None), "203.0.113.8".parse::<IpAddr>().unwrap());

        headers.remove("x-forwarded-for");
        assert_eq!(client_ip(&headers, None), "198.51.100.1".parse::<IpAddr>().unwrap());

        let socket = ConnectInfo("192.0.2.9:4000".parse::<SocketAddr>().unwrap());
        assert_eq!(client_ip(&HeaderMap::new(), Some(&socket)), "192.0.2.9".parse::<IpAddr>().unwrap());
        assert_eq!(client_ip(&HeaderMap::new(), None), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_spoofed_forwarded_entries_share_one_bucket() {
        let limiter = RateLimitMiddleware::per_minute(1);
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.9.9.1, 203.0.113.7".parse().unwrap());
        assert!(limiter.check(client_ip(&headers, None)).is_ok());

        headers.insert("x-forwarded-for", "10.9.9.2, 203.0.113.7".parse().unwrap());
        assert_matches!(limiter.check(client_ip(&headers, None)), Err(SchoolEventsError::RateLimitExceeded));
    }

    #[tokio::test]
    async fn test_cleanup_task_forgets_idle_clients() {
        // one cell per millisecond, so a single request is forgotten almost at once
        let limiter = RateLimitMiddleware::per_minute(60_000);
        limiter.check("10.0.0.1".parse().unwrap()).unwrap();
        limiter.check("10.0.0.2".parse().unwrap()).unwrap();
        assert_eq!(limiter.tracked_clients(), 2);

        let cleanup = limiter.spawn_cleanup(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        cleanup.abort();
        assert_eq!(limiter.tracked_clients(), 0);
    }
}
