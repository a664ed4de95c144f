//! Page rasterization requests
//!
//! The rasterizer is an external collaborator. Each request gets a ticket with
//! a generation number and a cancellation token; starting a new request
//! cancels the one in flight, and a completion for a superseded ticket is
//! reported as [`MarkupError::RenderCanceled`] so no live objects are built
//! for it.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use crate::error::{MarkupError, MarkupResult};

/// Cancellation token for cooperative render cancellation
///
/// Clones share the same state, so the rasterizer can poll a clone while the
/// engine cancels the original.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel this token and every clone of it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Output of the page rasterizer
#[derive(Debug, Clone, PartialEq)]
pub struct RasterizedPage {
    pub bitmap: Vec<u8>,
    /// Native page width in pixels at scale 1.0
    pub intrinsic_width: f64,
    pub intrinsic_height: f64,
    /// Page rotation in degrees
    pub rotation: u16,
}

/// Failure reported by a rasterizer
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RasterError {
    #[error("render canceled")]
    Canceled,

    #[error("render timed out")]
    TimedOut,

    #[error("{0}")]
    Failed(String),
}

/// External page rasterizer
pub trait PageRasterizer {
    /// Render `page_number` at `render_scale`, polling `token` for cancellation
    fn render_page(
        &mut self,
        page_number: u32,
        render_scale: f64,
        token: &CancellationToken,
    ) -> Result<RasterizedPage, RasterError>;
}

/// One issued render request
#[derive(Debug, Clone)]
pub struct RenderTicket {
    pub page_number: u32,
    pub render_scale: f64,
    pub generation: u64,
    token: CancellationToken,
    issued_at: Instant,
}

impl RenderTicket {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }
}

/// Tracks the single in-flight render request
#[derive(Debug)]
pub struct RenderRequests {
    generation: u64,
    active: Option<RenderTicket>,
    timeout: Duration,
}

impl RenderRequests {
    pub fn new(timeout: Duration) -> Self {
        Self {
            generation: 0,
            active: None,
            timeout,
        }
    }

    /// Issue a ticket for a new render, canceling any render in flight
    pub fn begin(&mut self, page_number: u32, render_scale: f64, now: Instant) -> RenderTicket {
        self.cancel_active();
        self.generation += 1;

        let ticket = RenderTicket {
            page_number,
            render_scale,
            generation: self.generation,
            token: CancellationToken::new(),
            issued_at: now,
        };
        tracing::debug!(page_number, render_scale, generation = self.generation, "render requested");
        self.active = Some(ticket.clone());
        ticket
    }

    /// Cancel the in-flight render, returning its page
    pub fn cancel_active(&mut self) -> Option<u32> {
        let ticket = self.active.take()?;
        ticket.token.cancel();
        tracing::debug!(page = ticket.page_number, generation = ticket.generation, "render canceled");
        Some(ticket.page_number)
    }

    /// Resolve a rasterizer result against its ticket
    pub fn complete(
        &mut self,
        ticket: &RenderTicket,
        result: Result<RasterizedPage, RasterError>,
        now: Instant,
    ) -> MarkupResult<RasterizedPage> {
        let page = ticket.page_number;
        if ticket.generation != self.generation || ticket.is_cancelled() {
            return Err(MarkupError::RenderCanceled { page });
        }
        self.active = None;

        let elapsed = now.saturating_duration_since(ticket.issued_at);
        let elapsed_ms = elapsed.as_millis() as u64;
        match result {
            Ok(_) if elapsed > self.timeout => {
                tracing::warn!(page, elapsed_ms, "render finished past its time bound");
                Err(MarkupError::RenderTimeout { page, elapsed_ms })
            }
            Ok(rasterized) => Ok(rasterized),
            Err(RasterError::Canceled) => Err(MarkupError::RenderCanceled { page }),
            Err(RasterError::TimedOut) => {
                tracing::warn!(page, elapsed_ms, "rasterizer timed out");
                Err(MarkupError::RenderTimeout { page, elapsed_ms })
            }
            Err(RasterError::Failed(message)) => Err(MarkupError::Rasterizer(message)),
        }
    }

    pub fn in_flight(&self) -> Option<&RenderTicket> {
        self.active.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> RasterizedPage {
        RasterizedPage {
            bitmap: Vec::new(),
            intrinsic_width: 612.0,
            intrinsic_height: 792.0,
            rotation: 0,
        }
    }

    #[test]
    fn token_clones_share_state() {
        let token = CancellationToken::new();
        let worker = token.clone();
        token.cancel();
        assert!(worker.is_cancelled());
    }

    #[test]
    fn new_request_cancels_previous() {
        let mut requests = RenderRequests::new(Duration::from_secs(10));
        let now = Instant::now();
        let first = requests.begin(1, 1.0, now);
        let second = requests.begin(2, 1.0, now);

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(
            requests.complete(&first, Ok(page()), now),
            Err(MarkupError::RenderCanceled { page: 1 })
        );
        assert_eq!(requests.complete(&second, Ok(page()), now), Ok(page()));
        assert!(requests.in_flight().is_none());
    }

    #[test]
    fn slow_render_times_out() {
        let mut requests = RenderRequests::new(Duration::from_secs(10));
        let now = Instant::now();
        let ticket = requests.begin(3, 1.0, now);

        let result = requests.complete(&ticket, Ok(page()), now + Duration::from_secs(11));
        assert_eq!(
            result,
            Err(MarkupError::RenderTimeout {
                page: 3,
                elapsed_ms: 11_000
            })
        );
    }

    #[test]
    fn rasterizer_errors_map_to_taxonomy() {
        let mut requests = RenderRequests::new(Duration::from_secs(10));
        let now = Instant::now();

        let ticket = requests.begin(1, 1.0, now);
        assert_eq!(
            requests.complete(&ticket, Err(RasterError::Failed("bad page".into())), now),
            Err(MarkupError::Rasterizer("bad page".into()))
        );

        let ticket = requests.begin(1, 1.0, now);
        assert!(requests
            .complete(&ticket, Err(RasterError::Canceled), now)
            .unwrap_err()
            .is_recoverable());
    }
}
