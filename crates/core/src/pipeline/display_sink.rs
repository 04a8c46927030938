use crossbeam_channel::{Sender, TrySendError};

use crate::shared::frame::Frame;

/// Receives the frame produced by each acquisition tick.
///
/// Called on the acquisition worker thread; implementations hand the frame
/// off rather than render in place.
pub trait DisplaySink: Send {
    fn present(&mut self, frame: Frame);
}

/// Forwards frames over a bounded channel, dropping a frame when the
/// consumer has not taken the previous ones yet.
pub struct ChannelDisplay {
    tx: Sender<Frame>,
    dropped: usize,
    disconnected: bool,
}

impl ChannelDisplay {
    pub fn new(tx: Sender<Frame>) -> Self {
        Self {
            tx,
            dropped: 0,
            disconnected: false,
        }
    }

    /// Frames discarded because the channel was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl DisplaySink for ChannelDisplay {
    fn present(&mut self, frame: Frame) {
        match self.tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                self.dropped += 1;
                log::debug!("Display busy, dropped frame {}", frame.index());
            }
            Err(TrySendError::Disconnected(_)) => {
                if !self.disconnected {
                    self.disconnected = true;
                    log::warn!("Display receiver closed; frames are discarded");
                }
            }
        }
    }
}

/// Adapts a closure into a sink.
pub struct FnDisplay<F>(pub F);

impl<F> DisplaySink for FnDisplay<F>
where
    F: FnMut(Frame) + Send,
{
    fn present(&mut self, frame: Frame) {
        (self.0)(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: usize) -> Frame {
        Frame::new(vec![0; 3], 1, 1, 3, index)
    }

    #[test]
    fn test_channel_display_forwards_frames() {
        let (tx, rx) = crossbeam_channel::bounded(2);
        let mut display = ChannelDisplay::new(tx);
        display.present(frame(0));
        display.present(frame(1));
        let indices: Vec<_> = rx.try_iter().map(|f| f.index()).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(display.dropped(), 0);
    }

    #[test]
    fn test_channel_display_drops_when_full() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut display = ChannelDisplay::new(tx);
        display.present(frame(0));
        display.present(frame(1));
        assert_eq!(display.dropped(), 1);
        assert_eq!(rx.try_recv().unwrap().index(), 0);
    }

    #[test]
    fn test_channel_display_survives_disconnect() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        drop(rx);
        let mut display = ChannelDisplay::new(tx);
        display.present(frame(0));
        display.present(frame(1));
        assert!(display.disconnected);
        assert_eq!(display.dropped(), 0);
    }

    #[test]
    fn test_fn_display_invokes_closure() {
        let mut seen = Vec::new();
        {
            let mut display = FnDisplay(|f: Frame| seen.push(f.index()));
            display.present(frame(7));
        }
        assert_eq!(seen, vec![7]);
    }
}
