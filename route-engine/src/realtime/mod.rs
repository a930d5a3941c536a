//! Realtime overlays: delays and cancellations layered over a snapshot.

mod feed;
mod overlay;
mod store;

pub use feed::{
    FeedConfig, FeedError, HttpOverlayFeed, OverlayDto, OverlayFeed, StaticOverlayFeed,
    TripUpdateDto,
};
pub use overlay::{OverlayLookup, OverlayView, RealtimeOverlay, TripStatus};
pub use store::OverlayStore;
