//! Per-route request admission.
//!
//! A table of `(method, route, ceiling, window)` entries drives one keyed
//! fixed-window counter per entry. The middleware runs after routing (it needs
//! the matched route template) and before any extractor or handler, so an
//! over-limit call is refused regardless of its credentials or payload.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use governor::clock::{Clock, DefaultClock, Reference};
use tracing::{debug, warn};

use crate::{errors::AppError, state::AppState};

const MINUTE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RouteLimit {
    pub method: Method,
    /// Route template as registered on the router, e.g. `/coverletters/:id`.
    pub path: &'static str,
    pub ceiling: u32,
    pub window: Duration,
}

impl RouteLimit {
    fn new(method: Method, path: &'static str, ceiling: u32, window: Duration) -> Self {
        Self {
            method,
            path,
            ceiling,
            window,
        }
    }
}

/// Per-route ceilings. Generation hits the paid model API.
pub fn default_route_limits() -> Vec<RouteLimit> {
    vec![
        RouteLimit::new(Method::GET, "/coverletters", 60, MINUTE),
        RouteLimit::new(Method::GET, "/coverletters/:id", 60, MINUTE),
        RouteLimit::new(Method::POST, "/coverletters/generate", 3, MINUTE),
        RouteLimit::new(Method::PUT, "/coverletters/:id/edited", 60, MINUTE),
        RouteLimit::new(Method::DELETE, "/coverletters/:id", 30, MINUTE),
        RouteLimit::new(Method::GET, "/coverletters/:id/pdf", 20, MINUTE),
    ]
}

#[derive(Debug, Clone, Copy)]
struct Window<I> {
    opened: I,
    used: u32,
}

/// Per-client counters for one route entry. A client's window opens on its
/// first call and admits `ceiling` calls until `window` has elapsed.
struct KeyedWindow<I> {
    ceiling: u32,
    window: Duration,
    clients: DashMap<IpAddr, Window<I>>,
}

impl<I: Reference> KeyedWindow<I> {
    fn new(ceiling: u32, window: Duration) -> Self {
        Self {
            ceiling,
            window,
            clients: DashMap::new(),
        }
    }

    fn expired(&self, w: &Window<I>, now: I) -> bool {
        Duration::from(now.duration_since(w.opened)) >= self.window
    }

    fn try_admit(&self, client: IpAddr, now: I) -> bool {
        let mut entry = self
            .clients
            .entry(client)
            .or_insert(Window { opened: now, used: 0 });
        if self.expired(&entry, now) {
            *entry = Window { opened: now, used: 0 };
        }
        if entry.used >= self.ceiling {
            return false;
        }
        entry.used += 1;
        true
    }

    fn retain_open(&self, now: I) {
        self.clients.retain(|_, w| !self.expired(w, now));
        self.clients.shrink_to_fit();
    }
}

pub struct Admission<C: Clock = DefaultClock> {
    clock: C,
    routes: HashMap<&'static str, Vec<(Method, KeyedWindow<C::Instant>)>>,
}

impl Admission {
    pub fn new(limits: &[RouteLimit]) -> anyhow::Result<Self> {
        Self::with_clock(limits, DefaultClock::default())
    }
}

impl<C: Clock> Admission<C> {
    pub fn with_clock(limits: &[RouteLimit], clock: C) -> anyhow::Result<Self> {
        let mut routes: HashMap<&'static str, Vec<(Method, KeyedWindow<C::Instant>)>> =
            HashMap::new();
        for limit in limits {
            if limit.ceiling == 0 {
                anyhow::bail!("zero ceiling for {} {}", limit.method, limit.path);
            }
            if limit.window.is_zero() {
                anyhow::bail!("zero window for {} {}", limit.method, limit.path);
            }
            routes
                .entry(limit.path)
                .or_default()
                .push((limit.method.clone(), KeyedWindow::new(limit.ceiling, limit.window)));
        }
        Ok(Self { clock, routes })
    }

    fn limiter(&self, method: &Method, path: &str) -> Option<&KeyedWindow<C::Instant>> {
        self.routes
            .get(path)?
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, l)| l)
    }

    /// Counts one call from `client` against the route's ceiling.
    /// Routes without an entry are always admitted.
    pub fn check(&self, method: &Method, path: &str, client: IpAddr) -> Result<(), AppError> {
        let Some(limiter) = self.limiter(method, path) else {
            return Ok(());
        };
        if !limiter.try_admit(client, self.clock.now()) {
            warn!(%client, %method, route = path, "rate limit exceeded");
            return Err(AppError::RateLimited);
        }
        Ok(())
    }

    /// Drops per-client state whose window has fully elapsed.
    pub fn purge_stale(&self) {
        let now = self.clock.now();
        for limiter in self.routes.values().flatten().map(|(_, l)| l) {
            limiter.retain_open(now);
        }
    }
}

/// Client key: the TCP peer address. Forwarding headers are not trusted.
fn client_addr(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn admit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(route) = req.extensions().get::<MatchedPath>() {
        let client = client_addr(&req);
        state.admission.check(req.method(), route.as_str(), client)?;
    } else {
        debug!(uri = %req.uri(), "no matched route; admission skipped");
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use governor::clock::FakeRelativeClock;

    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn admission() -> Admission {
        Admission::new(&default_route_limits()).unwrap()
    }

    fn manual_admission() -> (Admission<FakeRelativeClock>, FakeRelativeClock) {
        let clock = FakeRelativeClock::default();
        let a = Admission::with_clock(&default_route_limits(), clock.clone()).unwrap();
        (a, clock)
    }

    const GENERATE: &str = "/coverletters/generate";

    #[test]
    fn generation_stays_refused_for_the_rest_of_the_minute() {
        let (a, clock) = manual_admission();
        for _ in 0..3 {
            a.check(&Method::POST, GENERATE, ip(1)).unwrap();
        }

        clock.advance(Duration::from_secs(21));
        assert!(a.check(&Method::POST, GENERATE, ip(1)).is_err());

        clock.advance(Duration::from_secs(38));
        assert!(a.check(&Method::POST, GENERATE, ip(1)).is_err());

        clock.advance(Duration::from_secs(1));
        for _ in 0..3 {
            a.check(&Method::POST, GENERATE, ip(1)).unwrap();
        }
        assert!(a.check(&Method::POST, GENERATE, ip(1)).is_err());
    }

    #[test]
    fn spaced_calls_share_one_window() {
        let (a, clock) = manual_admission();
        for _ in 0..3 {
            a.check(&Method::POST, GENERATE, ip(4)).unwrap();
            clock.advance(Duration::from_secs(20));
        }
        // t=60s: the window opened at t=0 has closed.
        a.check(&Method::POST, GENERATE, ip(4)).unwrap();
    }

    #[test]
    fn returning_client_gets_the_ceiling_and_no_more() {
        let (a, clock) = manual_admission();
        a.check(&Method::POST, GENERATE, ip(5)).unwrap();
        clock.advance(Duration::from_secs(600));
        for _ in 0..3 {
            a.check(&Method::POST, GENERATE, ip(5)).unwrap();
        }
        assert!(a.check(&Method::POST, GENERATE, ip(5)).is_err());
    }

    #[test]
    fn purge_drops_elapsed_windows() {
        let (a, clock) = manual_admission();
        a.check(&Method::POST, GENERATE, ip(6)).unwrap();
        a.check(&Method::GET, "/coverletters", ip(7)).unwrap();
        clock.advance(Duration::from_secs(60));
        a.check(&Method::GET, "/coverletters", ip(8)).unwrap();

        a.purge_stale();
        let live: usize = a
            .routes
            .values()
            .flatten()
            .map(|(_, l)| l.clients.len())
            .sum();
        assert_eq!(live, 1);
    }

    #[test]
    fn fourth_generation_call_is_refused() {
        let a = admission();
        for _ in 0..3 {
            a.check(&Method::POST, "/coverletters/generate", ip(1)).unwrap();
        }
        let err = a
            .check(&Method::POST, "/coverletters/generate", ip(1))
            .unwrap_err();
        assert!(matches!(err, AppError::RateLimited));
    }

    #[test]
    fn clients_are_counted_separately() {
        let a = admission();
        for _ in 0..3 {
            a.check(&Method::POST, "/coverletters/generate", ip(1)).unwrap();
        }
        assert!(a.check(&Method::POST, "/coverletters/generate", ip(2)).is_ok());
    }

    #[test]
    fn methods_on_the_same_path_have_their_own_ceiling() {
        let a = admission();
        for _ in 0..30 {
            a.check(&Method::DELETE, "/coverletters/:id", ip(1)).unwrap();
        }
        assert!(a.check(&Method::DELETE, "/coverletters/:id", ip(1)).is_err());
        assert!(a.check(&Method::GET, "/coverletters/:id", ip(1)).is_ok());
    }

    #[test]
    fn pdf_ceiling_is_twenty() {
        let a = admission();
        for _ in 0..20 {
            a.check(&Method::GET, "/coverletters/:id/pdf", ip(3)).unwrap();
        }
        assert!(a.check(&Method::GET, "/coverletters/:id/pdf", ip(3)).is_err());
    }

    #[test]
    fn unlisted_routes_are_not_limited() {
        let a = admission();
        for _ in 0..500 {
            a.check(&Method::POST, "/auth/login", ip(1)).unwrap();
        }
    }

    #[test]
    fn zero_ceiling_is_a_config_error() {
        let limits = [RouteLimit::new(Method::GET, "/x", 0, MINUTE)];
        assert!(Admission::new(&limits).is_err());
    }

    #[test]
    fn purge_keeps_active_limits() {
        let a = admission();
        for _ in 0..3 {
            a.check(&Method::POST, "/coverletters/generate", ip(9)).unwrap();
        }
        a.purge_stale();
        assert!(a.check(&Method::POST, "/coverletters/generate", ip(9)).is_err());
    }
}
