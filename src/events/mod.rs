//! # Events Module
//!
//! Event-driven progress reporting for whatever UI sits on top.
//!
//! ## Design
//! The core library emits events through channels, allowing any UI
//! (CLI, GUI, web) to subscribe and display progress. The batch converter
//! also accepts a plain callback through [`ProgressSink`].
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Conversion(ConversionEvent::Progress(p)) = event {
//!             println!("{}/{} {}", p.completed_files, p.total_files, p.current_file);
//!         }
//!     }
//! });
//!
//! let outcome = pipeline.convert_batch_with_events(&files, &options, &sender);
//! println!("{} succeeded", outcome.summary.succeeded);
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;

/// Receives batch progress updates
pub trait ProgressSink {
    fn on_progress(&self, progress: &BatchProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(&BatchProgress),
{
    fn on_progress(&self, progress: &BatchProgress) {
        self(progress)
    }
}

impl ProgressSink for EventSender {
    fn on_progress(&self, progress: &BatchProgress) {
        self.send(Event::Conversion(ConversionEvent::Progress(progress.clone())));
    }
}
