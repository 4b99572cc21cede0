// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{io, sync::Arc, thread};

use tracing::{debug, info_span, trace};

use crate::{
    state_machine::bot_states::BotTransport,
    storage::BlockDevice,
    usb::{
        endpoint::UsbDevice,
        events::{EventFlags, Events},
    },
};

pub const WORKER_THREAD_NAME: &str = "MassStorageUsb";

/// Start the worker thread. It owns `transport` until it sees
/// [`Events::EXIT`], then hands the backing store back through the join
/// handle.
pub fn spawn_worker<D, B>(
    name: String,
    events: Arc<EventFlags>,
    mut transport: BotTransport<D, B>,
) -> io::Result<thread::JoinHandle<B>>
where
    D: UsbDevice,
    B: BlockDevice,
{
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || {
            let span = info_span!("mass_storage", name = %name);
            let _enter = span.enter();
            debug!("worker started");

            rt.block_on(worker_loop(&events, &mut transport));

            debug!(
                high_water = transport.buffer_capacity(),
                "worker stopped"
            );
            transport.into_session().into_storage()
        })
}

async fn worker_loop<D, B>(events: &EventFlags, transport: &mut BotTransport<D, B>)
where
    D: UsbDevice,
    B: BlockDevice,
{
    loop {
        let ev = events.wait().await;
        trace!(?ev, "wake");
        if ev.contains(Events::EXIT) {
            break;
        }
        if ev.contains(Events::RESET) {
            transport.reset();
        }
        if ev.contains(Events::RXTX) {
            transport.run();
        }
    }
}
