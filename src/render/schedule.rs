/// A redraw deferred to the next animation frame.
///
/// Requests made between two frames coalesce: only the latest payload survives, and only the
/// first request of a frame actually schedules a callback.
#[derive(Clone, Debug)]
pub struct FrameRequest<T> {
    pending: Option<T>,
    scheduled: u64,
    coalesced: u64,
}

impl<T> Default for FrameRequest<T> {
    fn default() -> Self {
        Self {
            pending: None,
            scheduled: 0,
            coalesced: 0,
        }
    }
}

impl<T> FrameRequest<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `payload` for the next frame. Returns `true` if this scheduled a new callback.
    pub fn request(&mut self, payload: T) -> bool {
        let fresh = self.pending.replace(payload).is_none();
        if fresh {
            self.scheduled += 1;
        } else {
            self.coalesced += 1;
        }
        fresh
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Called from the animation-frame callback: the payload to draw, if any.
    pub fn take(&mut self) -> Option<T> {
        self.pending.take()
    }

    pub fn scheduled_count(&self) -> u64 {
        self.scheduled
    }

    pub fn coalesced_count(&self) -> u64 {
        self.coalesced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_within_a_frame_coalesce_to_latest() {
        let mut req = FrameRequest::new();
        assert!(req.request(3));
        assert!(!req.request(7));
        assert!(!req.request(9));
        assert_eq!(req.take(), Some(9));
        assert_eq!(req.take(), None);
        assert_eq!((req.scheduled_count(), req.coalesced_count()), (1, 2));
    }

    #[test]
    fn next_frame_schedules_again() {
        let mut req = FrameRequest::new();
        req.request(1);
        req.take();
        assert!(req.request(2));
        assert_eq!(req.scheduled_count(), 2);
    }
}
