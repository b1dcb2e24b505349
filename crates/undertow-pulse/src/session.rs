//! Connection lifecycle and the blocking operation adapter.

use crate::{convert, subscribe};
use libpulse_binding as pulse;
use pulse::callbacks::ListResult;
use pulse::context::subscribe::InterestMaskSet;
use pulse::context::{Context, FlagSet as ContextFlagSet, State};
use pulse::mainloop::threaded::Mainloop;
use pulse::operation::{Operation, State as OperationState};
use pulse::proplist::{properties, Proplist};
use pulse::volume::{ChannelVolumes, Volume};
use std::cell::RefCell;
use std::ops::Deref;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver};
use thiserror::Error;
use tracing::{debug, error, info};
use undertow::{
    AppStream, ClientDescriptor, ConnectionState, Direction, Event, ModuleDescriptor,
    RoutingConfig, ServerControl, ServerSnapshot, SinkDevice,
};

/// Fatal startup errors. Once a session is connected, individual
/// command failures are reported as booleans instead.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("failed to create threaded mainloop")]
    Mainloop,

    #[error("failed to create server context")]
    Context,

    #[error("failed to start mainloop: {0}")]
    MainloopStart(String),

    #[error("failed to connect context: {0}")]
    ContextConnect(String),

    #[error("context reached {state:?} before becoming ready")]
    NeverReady { state: ConnectionState },
}

/// One session on the audio server, driving the threaded mainloop.
///
/// All context access happens with the mainloop lock held; completion
/// callbacks run on the worker thread, write their result into a
/// caller-owned cell, and signal the waiting caller.
pub struct PulseSession {
    mainloop: Rc<RefCell<Mainloop>>,
    context: Rc<RefCell<Context>>,
    protocol: u32,
    closed: bool,
}

// SAFETY: the threaded mainloop's lock is the protocol's own
// cross-thread serialization contract; every context access in this
// module happens under it, and callback closures touch shared handles
// only while the worker thread holds that same lock.
unsafe impl Send for PulseSession {}

impl PulseSession {
    /// Starts the worker loop, opens the session, and blocks until the
    /// state machine settles on ready. Failure here is unrecoverable;
    /// retry policy belongs to the caller.
    pub fn connect(config: &RoutingConfig) -> Result<Self, ConnectError> {
        let mainloop = Rc::new(RefCell::new(Mainloop::new().ok_or(ConnectError::Mainloop)?));

        let mut proplist = Proplist::new().ok_or(ConnectError::Context)?;
        proplist
            .set_str(properties::APPLICATION_NAME, &config.client_name)
            .map_err(|_| ConnectError::Context)?;

        let context = Rc::new(RefCell::new(
            Context::new_with_proplist(mainloop.borrow().deref(), &config.client_name, &proplist)
                .ok_or(ConnectError::Context)?,
        ));

        {
            let ml = Rc::clone(&mainloop);
            let ctx = Rc::clone(&context);
            context
                .borrow_mut()
                .set_state_callback(Some(Box::new(move || {
                    let state = unsafe { (*ctx.as_ptr()).get_state() };
                    debug!(state = ?map_state(state), "context state changed");
                    match state {
                        State::Ready | State::Failed | State::Terminated => unsafe {
                            (*ml.as_ptr()).signal(false);
                        },
                        _ => {}
                    }
                })));
        }

        mainloop.borrow_mut().lock();
        if let Err(e) = mainloop.borrow_mut().start() {
            mainloop.borrow_mut().unlock();
            return Err(ConnectError::MainloopStart(describe(e)));
        }
        if let Err(e) = context
            .borrow_mut()
            .connect(None, ContextFlagSet::NOFAIL, None)
        {
            mainloop.borrow_mut().unlock();
            mainloop.borrow_mut().stop();
            return Err(ConnectError::ContextConnect(describe(e)));
        }

        loop {
            let state = context.borrow().get_state();
            match state {
                State::Ready => break,
                State::Failed | State::Terminated => {
                    let observed = map_state(state);
                    mainloop.borrow_mut().unlock();
                    mainloop.borrow_mut().stop();
                    return Err(ConnectError::NeverReady { state: observed });
                }
                _ => mainloop.borrow_mut().wait(),
            }
        }
        let protocol = context.borrow().get_protocol_version();
        mainloop.borrow_mut().unlock();

        info!(protocol, "audio server context ready");
        Ok(Self {
            mainloop,
            context,
            protocol,
            closed: false,
        })
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.mainloop.borrow_mut().lock();
        let state = map_state(self.context.borrow().get_state());
        self.mainloop.borrow_mut().unlock();
        state
    }

    /// Registers for server change events. Events arrive on the
    /// returned channel in server-delivery order, already enriched
    /// with their follow-up query results.
    pub fn subscribe_events(&mut self) -> Receiver<Event> {
        let (tx, rx) = mpsc::channel();

        self.mainloop.borrow_mut().lock();
        {
            let ctx = Rc::clone(&self.context);
            let tx = tx.clone();
            self.context
                .borrow_mut()
                .set_subscribe_callback(Some(Box::new(move |facility, operation, index| {
                    subscribe::dispatch(&ctx, &tx, facility, operation, index);
                })));
        }
        let _op = self.context.borrow_mut().subscribe(
            InterestMaskSet::SINK
                | InterestMaskSet::SOURCE
                | InterestMaskSet::SINK_INPUT
                | InterestMaskSet::SOURCE_OUTPUT
                | InterestMaskSet::SERVER,
            |success| {
                if !success {
                    error!("event subscription failed");
                }
            },
        );
        self.mainloop.borrow_mut().unlock();

        rx
    }

    /// Spins on the mainloop until the operation completes. The lock
    /// must already be held; `wait` releases it to the worker thread
    /// until the completion callback signals.
    fn wait_op<T: ?Sized>(&self, op: Operation<T>) {
        while op.get_state() == OperationState::Running {
            self.mainloop.borrow_mut().wait();
        }
    }

    /// Completion callback for simple acknowledged commands: stores
    /// the success flag and wakes the blocked caller.
    fn ack_callback(&self, status: &Rc<RefCell<bool>>) -> Box<dyn FnMut(bool) + 'static> {
        let status = Rc::clone(status);
        let ml = Rc::clone(&self.mainloop);
        Box::new(move |success| {
            *status.borrow_mut() = success;
            unsafe { (*ml.as_ptr()).signal(false) };
        })
    }
}

impl ServerControl for PulseSession {
    fn server_info(&mut self) -> Option<ServerSnapshot> {
        let result: Rc<RefCell<Option<ServerSnapshot>>> = Rc::new(RefCell::new(None));

        self.mainloop.borrow_mut().lock();
        let op = {
            let ml = Rc::clone(&self.mainloop);
            let result = Rc::clone(&result);
            let protocol = self.protocol;
            self.context.borrow().introspect().get_server_info(move |info| {
                *result.borrow_mut() = Some(convert::server_snapshot(info, protocol));
                unsafe { (*ml.as_ptr()).signal(false) };
            })
        };
        self.wait_op(op);
        self.mainloop.borrow_mut().unlock();

        let snapshot = result.borrow_mut().take();
        if snapshot.is_none() {
            error!("failed to get server info");
        }
        snapshot
    }

    fn sink_by_name(&mut self, name: &str) -> Option<SinkDevice> {
        let result: Rc<RefCell<Option<SinkDevice>>> = Rc::new(RefCell::new(None));

        self.mainloop.borrow_mut().lock();
        let op = {
            let ml = Rc::clone(&self.mainloop);
            let result = Rc::clone(&result);
            self.context
                .borrow()
                .introspect()
                .get_sink_info_by_name(name, move |list| match list {
                    ListResult::Item(info) => {
                        *result.borrow_mut() = Some(convert::sink_device(info));
                    }
                    ListResult::End | ListResult::Error => unsafe {
                        (*ml.as_ptr()).signal(false);
                    },
                })
        };
        self.wait_op(op);
        self.mainloop.borrow_mut().unlock();

        let sink = result.borrow_mut().take();
        if sink.is_none() {
            debug!(name, "sink not found");
        }
        sink
    }

    fn list_sinks(&mut self) -> Vec<SinkDevice> {
        let result: Rc<RefCell<Vec<SinkDevice>>> = Rc::new(RefCell::new(Vec::new()));

        self.mainloop.borrow_mut().lock();
        let op = {
            let ml = Rc::clone(&self.mainloop);
            let result = Rc::clone(&result);
            self.context
                .borrow()
                .introspect()
                .get_sink_info_list(move |list| match list {
                    ListResult::Item(info) => result.borrow_mut().push(convert::sink_device(info)),
                    ListResult::End | ListResult::Error => unsafe {
                        (*ml.as_ptr()).signal(false);
                    },
                })
        };
        self.wait_op(op);
        self.mainloop.borrow_mut().unlock();

        result.take()
    }

    fn list_streams(&mut self, direction: Direction) -> Vec<AppStream> {
        let result: Rc<RefCell<Vec<AppStream>>> = Rc::new(RefCell::new(Vec::new()));

        self.mainloop.borrow_mut().lock();
        {
            let ml = Rc::clone(&self.mainloop);
            let result = Rc::clone(&result);
            let introspect = self.context.borrow().introspect();
            // The two info types are distinct; each arm owns its
            // operation and waits on it in place.
            match direction {
                Direction::Playback => {
                    let op = introspect.get_sink_input_info_list(move |list| match list {
                        ListResult::Item(info) => {
                            result.borrow_mut().push(convert::playback_stream(info));
                        }
                        ListResult::End | ListResult::Error => unsafe {
                            (*ml.as_ptr()).signal(false);
                        },
                    });
                    self.wait_op(op);
                }
                Direction::Capture => {
                    let op = introspect.get_source_output_info_list(move |list| match list {
                        ListResult::Item(info) => {
                            result.borrow_mut().push(convert::capture_stream(info));
                        }
                        ListResult::End | ListResult::Error => unsafe {
                            (*ml.as_ptr()).signal(false);
                        },
                    });
                    self.wait_op(op);
                }
            }
        }
        self.mainloop.borrow_mut().unlock();

        result.take()
    }

    fn list_modules(&mut self) -> Vec<ModuleDescriptor> {
        let result: Rc<RefCell<Vec<ModuleDescriptor>>> = Rc::new(RefCell::new(Vec::new()));

        self.mainloop.borrow_mut().lock();
        let op = {
            let ml = Rc::clone(&self.mainloop);
            let result = Rc::clone(&result);
            self.context
                .borrow()
                .introspect()
                .get_module_info_list(move |list| match list {
                    ListResult::Item(info) => {
                        result.borrow_mut().push(convert::module_descriptor(info));
                    }
                    ListResult::End | ListResult::Error => unsafe {
                        (*ml.as_ptr()).signal(false);
                    },
                })
        };
        self.wait_op(op);
        self.mainloop.borrow_mut().unlock();

        result.take()
    }

    fn list_clients(&mut self) -> Vec<ClientDescriptor> {
        let result: Rc<RefCell<Vec<ClientDescriptor>>> = Rc::new(RefCell::new(Vec::new()));

        self.mainloop.borrow_mut().lock();
        let op = {
            let ml = Rc::clone(&self.mainloop);
            let result = Rc::clone(&result);
            self.context
                .borrow()
                .introspect()
                .get_client_info_list(move |list| match list {
                    ListResult::Item(info) => {
                        result.borrow_mut().push(convert::client_descriptor(info));
                    }
                    ListResult::End | ListResult::Error => unsafe {
                        (*ml.as_ptr()).signal(false);
                    },
                })
        };
        self.wait_op(op);
        self.mainloop.borrow_mut().unlock();

        result.take()
    }

    fn load_module(&mut self, name: &str, argument: &str) -> bool {
        let status = Rc::new(RefCell::new(false));

        self.mainloop.borrow_mut().lock();
        let op = {
            let ml = Rc::clone(&self.mainloop);
            let status = Rc::clone(&status);
            let mut introspect = self.context.borrow().introspect();
            introspect.load_module(name, argument, move |index| {
                // The server reports failure as the invalid index.
                *status.borrow_mut() = index != u32::MAX;
                unsafe { (*ml.as_ptr()).signal(false) };
            })
        };
        self.wait_op(op);
        self.mainloop.borrow_mut().unlock();

        let ok = *status.borrow();
        ok
    }

    fn unload_module(&mut self, index: u32) -> bool {
        let status = Rc::new(RefCell::new(false));

        self.mainloop.borrow_mut().lock();
        let op = {
            let mut cb = self.ack_callback(&status);
            let mut introspect = self.context.borrow().introspect();
            introspect.unload_module(index, move |success| cb(success))
        };
        self.wait_op(op);
        self.mainloop.borrow_mut().unlock();

        let ok = *status.borrow();
        ok
    }

    fn move_stream_to_index(
        &mut self,
        direction: Direction,
        stream: u32,
        device_index: u32,
    ) -> bool {
        let status = Rc::new(RefCell::new(false));

        self.mainloop.borrow_mut().lock();
        let op = {
            let cb = self.ack_callback(&status);
            let mut introspect = self.context.borrow().introspect();
            match direction {
                Direction::Playback => {
                    introspect.move_sink_input_by_index(stream, device_index, Some(cb))
                }
                Direction::Capture => {
                    introspect.move_source_output_by_index(stream, device_index, Some(cb))
                }
            }
        };
        self.wait_op(op);
        self.mainloop.borrow_mut().unlock();

        let ok = *status.borrow();
        ok
    }

    fn move_stream_to_name(
        &mut self,
        direction: Direction,
        stream: u32,
        device_name: &str,
    ) -> bool {
        let status = Rc::new(RefCell::new(false));

        self.mainloop.borrow_mut().lock();
        let op = {
            let cb = self.ack_callback(&status);
            let mut introspect = self.context.borrow().introspect();
            match direction {
                Direction::Playback => {
                    introspect.move_sink_input_by_name(stream, device_name, Some(cb))
                }
                Direction::Capture => {
                    introspect.move_source_output_by_name(stream, device_name, Some(cb))
                }
            }
        };
        self.wait_op(op);
        self.mainloop.borrow_mut().unlock();

        let ok = *status.borrow();
        ok
    }

    fn set_stream_volume(
        &mut self,
        direction: Direction,
        stream: u32,
        channels: u8,
        volume: u32,
    ) -> bool {
        let mut cvol = ChannelVolumes::default();
        cvol.set(channels, Volume(volume));

        let status = Rc::new(RefCell::new(false));

        self.mainloop.borrow_mut().lock();
        let op = {
            let cb = self.ack_callback(&status);
            let mut introspect = self.context.borrow().introspect();
            match direction {
                Direction::Playback => introspect.set_sink_input_volume(stream, &cvol, Some(cb)),
                Direction::Capture => introspect.set_source_output_volume(stream, &cvol, Some(cb)),
            }
        };
        self.wait_op(op);
        self.mainloop.borrow_mut().unlock();

        let ok = *status.borrow();
        ok
    }

    fn set_stream_mute(&mut self, direction: Direction, stream: u32, mute: bool) -> bool {
        let status = Rc::new(RefCell::new(false));

        self.mainloop.borrow_mut().lock();
        let op = {
            let cb = self.ack_callback(&status);
            let mut introspect = self.context.borrow().introspect();
            match direction {
                Direction::Playback => introspect.set_sink_input_mute(stream, mute, Some(cb)),
                Direction::Capture => introspect.set_source_output_mute(stream, mute, Some(cb)),
            }
        };
        self.wait_op(op);
        self.mainloop.borrow_mut().unlock();

        let ok = *status.borrow();
        ok
    }

    fn drain(&mut self) -> bool {
        self.mainloop.borrow_mut().lock();
        // Fast path: a session that is no longer ready has nothing
        // pending worth waiting for.
        if self.context.borrow().get_state() != State::Ready {
            self.mainloop.borrow_mut().unlock();
            return false;
        }
        let op = {
            let ml = Rc::clone(&self.mainloop);
            let ctx = Rc::clone(&self.context);
            self.context.borrow_mut().drain(move || {
                if unsafe { (*ctx.as_ptr()).get_state() } == State::Ready {
                    unsafe { (*ml.as_ptr()).signal(false) };
                }
            })
        };
        // None means nothing was in flight.
        let drained = match op {
            Some(op) => {
                self.wait_op(op);
                true
            }
            None => {
                debug!("context had nothing to drain");
                false
            }
        };
        self.mainloop.borrow_mut().unlock();

        drained
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.mainloop.borrow_mut().lock();
        debug!("disconnecting audio server context...");
        self.context.borrow_mut().set_state_callback(None);
        self.context.borrow_mut().set_subscribe_callback(None);
        self.context.borrow_mut().disconnect();
        self.mainloop.borrow_mut().unlock();

        debug!("stopping threaded mainloop");
        self.mainloop.borrow_mut().stop();
    }
}

impl Drop for PulseSession {
    fn drop(&mut self) {
        ServerControl::close(self);
    }
}

fn describe(err: pulse::error::PAErr) -> String {
    err.to_string()
        .unwrap_or_else(|| format!("error code {}", err.0))
}

fn map_state(state: State) -> ConnectionState {
    match state {
        State::Unconnected => ConnectionState::Unconnected,
        State::Connecting => ConnectionState::Connecting,
        State::Authorizing => ConnectionState::Authorizing,
        State::SettingName => ConnectionState::SettingName,
        State::Ready => ConnectionState::Ready,
        State::Failed => ConnectionState::Failed,
        State::Terminated => ConnectionState::Terminated,
    }
}
