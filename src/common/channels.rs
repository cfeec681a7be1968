//! Channel type definitions for preview events

use tokio::sync::mpsc;

use crate::preview::PreviewEvent;

/// Default channel buffer size
pub const DEFAULT_CHANNEL_SIZE: usize = 256;

/// Create a new preview event channel with the default buffer size
pub fn create_preview_channel() -> (mpsc::Sender<PreviewEvent>, mpsc::Receiver<PreviewEvent>) {
    mpsc::channel(DEFAULT_CHANNEL_SIZE)
}

/// Create a new preview event channel with a custom buffer size
pub fn create_preview_channel_with_size(
    size: usize,
) -> (mpsc::Sender<PreviewEvent>, mpsc::Receiver<PreviewEvent>) {
    mpsc::channel(size)
}
