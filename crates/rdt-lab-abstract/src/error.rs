use thiserror::Error;

/// Reasons a sender refuses application data. The message is not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("sender busy: packet seq={seq} still awaiting ACK")]
    Busy { seq: u32 },
    #[error("window full: base={base} next_seq={next_seq} window_size={window_size}")]
    WindowFull {
        base: u32,
        next_seq: u32,
        window_size: usize,
    },
}
