use std::ffi::OsString;
use std::path::Path;
use std::time::{Duration, Instant};

/// Pure debouncer: only handles event filtering and timing.
///
/// Collapses any burst of OS events for the watched file (editors commonly
/// emit truncate + write + rename for one save) into a single "reload
/// needed" once the quiet window has passed.
pub(super) struct Debouncer {
    /// File name of the watched document inside the watched directory
    target: OsString,
    window: Duration,
    pub(super) pending: usize,
    pub(super) last_event: Option<Instant>,
}

impl Debouncer {
    pub(super) fn new(target: &Path, window: Duration) -> Self {
        Self {
            target: target.file_name().map(OsString::from).unwrap_or_default(),
            window,
            pending: 0,
            last_event: None,
        }
    }

    /// Record a notify event if it concerns the watched file.
    ///
    /// Creation and content/rename modifications count. Metadata-only
    /// changes (mtime/atime/chmod noise) and removals do not: a removed file
    /// has nothing to reload.
    pub(super) fn add_event(&mut self, event: &notify::Event) -> bool {
        use notify::EventKind;
        use notify::event::ModifyKind;

        let relevant_kind = match event.kind {
            EventKind::Create(_) => true,
            EventKind::Modify(ModifyKind::Metadata(_)) => false,
            EventKind::Modify(_) => true,
            _ => false,
        };
        if !relevant_kind {
            return false;
        }

        if !event.paths.iter().any(|p| self.is_target(p)) {
            return false;
        }

        crate::debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);
        self.pending += 1;
        self.last_event = Some(Instant::now());
        true
    }

    fn is_target(&self, path: &Path) -> bool {
        path.file_name().is_some_and(|name| name == self.target)
    }

    /// Consume the pending burst once the window has elapsed.
    pub(super) fn take_if_ready(&mut self) -> bool {
        if !self.is_ready() {
            return false;
        }
        crate::debug!("watch"; "{} event(s) coalesced", self.pending);
        self.pending = 0;
        self.last_event = None;
        true
    }

    pub(super) fn is_ready(&self) -> bool {
        match self.last_event {
            Some(last) => self.pending > 0 && last.elapsed() >= self.window,
            None => false,
        }
    }

    /// Precise sleep duration until next possible ready time.
    pub(super) fn sleep_duration(&self) -> Duration {
        let Some(last_event) = self.last_event else {
            return Duration::from_secs(86400);
        };

        self.window
            .saturating_sub(last_event.elapsed())
            .max(Duration::from_millis(1))
    }
}
