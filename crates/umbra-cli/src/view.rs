//! Line-oriented rendering of the client view.
//!
//! Prints each message once, prefixed with its buffer, as snapshots arrive.

use std::{
    collections::HashMap,
    io::{self, Write},
};

use tokio::sync::watch;
use umbra_client::ClientView;
use umbra_core::{Message, MessageKind};

/// Tracks what has already been printed.
#[derive(Default)]
pub struct ViewPrinter {
    printed: HashMap<String, usize>,
    current: String,
}

impl ViewPrinter {
    /// Write everything new in `view`.
    pub fn render(&mut self, view: &ClientView, out: &mut impl Write) -> io::Result<()> {
        // Buffers are cleared on reconnect; start over when any shrank.
        let shrunk = self.printed.iter().any(|(name, seen)| {
            view.buffers.iter().find(|b| b.name() == name).is_none_or(|b| b.messages().len() < *seen)
        });
        if shrunk {
            self.printed.clear();
        }

        if view.current != self.current {
            self.current.clone_from(&view.current);
            writeln!(out, "== {} ==", self.current)?;
        }

        for buffer in &view.buffers {
            let seen = self.printed.entry(buffer.name().to_string()).or_default();
            for message in buffer.messages().iter().skip(*seen) {
                writeln!(out, "[{}] {}", buffer.name(), format_message(message))?;
            }
            *seen = buffer.messages().len();
        }
        out.flush()
    }
}

/// Render one message.
pub fn format_message(message: &Message) -> String {
    match message.kind() {
        MessageKind::Chat if message.is_notice() => {
            format!("-{}- {}", message.sender(), message.body())
        },
        MessageKind::Chat => format!("<{}> {}", message.sender(), message.body()),
        MessageKind::Action => format!("* {} {}", message.sender(), message.body()),
        MessageKind::Event | MessageKind::Info => format!("-- {}", message.body()),
        MessageKind::Error => format!("!! {}", message.body()),
    }
}

/// Print view updates to stdout until the runtime stops.
pub async fn print_updates(mut view: watch::Receiver<ClientView>) -> io::Result<()> {
    let mut printer = ViewPrinter::default();
    loop {
        {
            let snapshot = view.borrow_and_update();
            printer.render(&snapshot, &mut io::stdout().lock())?;
        }
        if view.changed().await.is_err() {
            return Ok(());
        }
    }
}
