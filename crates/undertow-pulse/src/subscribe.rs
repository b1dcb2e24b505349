//! Server change-event dispatch.
//!
//! Subscription callbacks only carry a facility and an index, so each
//! add/change kicks off a follow-up introspection query and the real
//! event is emitted from that query's callback. All of this runs on
//! the worker thread; nothing here blocks.

use crate::convert;
use libpulse_binding as pulse;
use pulse::callbacks::ListResult;
use pulse::context::subscribe::{Facility, Operation};
use pulse::context::Context;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::Sender;
use tracing::trace;
use undertow::{Direction, Event};

pub fn dispatch(
    ctx: &Rc<RefCell<Context>>,
    tx: &Sender<Event>,
    facility: Option<Facility>,
    operation: Option<Operation>,
    index: u32,
) {
    let (Some(facility), Some(operation)) = (facility, operation) else {
        return;
    };
    trace!(?facility, ?operation, index, "server event");

    match facility {
        Facility::SinkInput => stream_event(ctx, tx, Direction::Playback, operation, index),
        Facility::SourceOutput => stream_event(ctx, tx, Direction::Capture, operation, index),
        Facility::Sink => sink_event(ctx, tx, operation, index),
        Facility::Server => server_event(ctx, tx),
        _ => {}
    }
}

fn stream_event(
    ctx: &Rc<RefCell<Context>>,
    tx: &Sender<Event>,
    direction: Direction,
    operation: Operation,
    index: u32,
) {
    let changed = match operation {
        Operation::New => false,
        Operation::Changed => true,
        Operation::Removed => {
            let _ = tx.send(Event::StreamRemoved { direction, index });
            return;
        }
    };

    let tx = tx.clone();
    let introspect = ctx.borrow().introspect();
    let on_item = move |stream| {
        let event = if changed {
            Event::StreamChanged(stream)
        } else {
            Event::StreamAdded(stream)
        };
        let _ = tx.send(event);
    };
    match direction {
        Direction::Playback => {
            introspect.get_sink_input_info(index, move |list| {
                if let ListResult::Item(info) = list {
                    on_item(convert::playback_stream(info));
                }
            });
        }
        Direction::Capture => {
            introspect.get_source_output_info(index, move |list| {
                if let ListResult::Item(info) = list {
                    on_item(convert::capture_stream(info));
                }
            });
        }
    }
}

fn sink_event(ctx: &Rc<RefCell<Context>>, tx: &Sender<Event>, operation: Operation, index: u32) {
    let changed = match operation {
        Operation::New => false,
        Operation::Changed => true,
        Operation::Removed => {
            let _ = tx.send(Event::SinkRemoved { index });
            return;
        }
    };

    let tx = tx.clone();
    ctx.borrow()
        .introspect()
        .get_sink_info_by_index(index, move |list| {
            if let ListResult::Item(info) = list {
                let sink = convert::sink_device(info);
                let event = if changed {
                    Event::SinkChanged(sink)
                } else {
                    Event::SinkAdded(sink)
                };
                let _ = tx.send(event);
            }
        });
}

/// Server-level changes cover the default device switching; refetch
/// the whole snapshot rather than guessing what moved.
fn server_event(ctx: &Rc<RefCell<Context>>, tx: &Sender<Event>) {
    let tx = tx.clone();
    let protocol = ctx.borrow().get_protocol_version();
    ctx.borrow().introspect().get_server_info(move |info| {
        let _ = tx.send(Event::ServerChanged(convert::server_snapshot(info, protocol)));
    });
}