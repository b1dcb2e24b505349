//! Filter-and-publish half of the event subscription router.
//!
//! The worker thread only detects changes and fetches detail; this
//! router runs on the consumer side of the event channel and applies
//! the surfacing rules: exclusion lists suppress changed-stream
//! notifications, the processing sink never appears as a user-facing
//! new device, and a change to the processing sink refreshes the
//! cached sample rate/format before anything is published. Splitting
//! detect / fetch / publish this way keeps notification handlers free
//! to call back into the manager without re-entering the worker
//! loop's lock.

use crate::events::{Event, Notification};
use crate::session::SharedSession;
use std::sync::mpsc::Sender;
use tracing::{debug, trace};

pub struct Router {
    shared: SharedSession,
    tx: Sender<Notification>,
}

impl Router {
    pub(crate) fn new(shared: SharedSession, tx: Sender<Notification>) -> Self {
        Self { shared, tx }
    }

    /// Processes one server event, publishing zero or more
    /// notifications in order.
    pub fn handle(&self, event: Event) {
        match event {
            Event::StreamAdded(stream) => {
                trace!(index = stream.index, name = %stream.name, "stream added");
                self.publish(Notification::StreamAdded(stream));
            }
            Event::StreamChanged(stream) => {
                let excluded = {
                    let state = self.shared.lock().unwrap();
                    state.exclusions.is_excluded(stream.direction, &stream.name)
                };
                if excluded {
                    debug!(name = %stream.name, direction = %stream.direction,
                        "suppressing change notification for excluded stream");
                } else {
                    self.publish(Notification::StreamChanged(stream));
                }
            }
            Event::StreamRemoved { direction, index } => {
                self.publish(Notification::StreamRemoved { direction, index });
            }
            Event::SinkAdded(sink) => {
                let own = {
                    let state = self.shared.lock().unwrap();
                    sink.name == state.sink_name
                };
                // The processing sink is not a user-facing device.
                if !own {
                    self.publish(Notification::SinkAdded(sink));
                }
            }
            Event::SinkChanged(sink) => {
                {
                    let mut state = self.shared.lock().unwrap();
                    if sink.name == state.sink_name {
                        if let Some(owned) = state.processing_sink.as_mut() {
                            owned.rate = sink.rate;
                            owned.format = sink.format.clone();
                        }
                    }
                }
                self.publish(Notification::SinkChanged(sink));
            }
            Event::SinkRemoved { index } => {
                self.publish(Notification::SinkRemoved { index });
            }
            Event::ServerChanged(snapshot) => {
                let sink_name = {
                    let mut state = self.shared.lock().unwrap();
                    state.server = snapshot.clone();
                    state.sink_name.clone()
                };
                if snapshot.default_sink != sink_name {
                    self.publish(Notification::DefaultSinkChanged(snapshot.default_sink));
                }
                self.publish(Notification::DefaultSourceChanged(snapshot.default_source));
                self.publish(Notification::ServerChanged);
            }
        }
    }

    fn publish(&self, notification: Notification) {
        // A gone consumer just means nobody is listening anymore.
        let _ = self.tx.send(notification);
    }
}
