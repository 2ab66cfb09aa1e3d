use serde::Serialize;
use std::io::Write;

use super::{NotifyError, Ticket};
use crate::config::ReceiverConfig;

/// Writes the rendered ticket to stdout as one JSON line instead of filing it.
#[derive(Debug)]
pub struct StdoutNotifier {
    receiver: String,
}

#[derive(Serialize)]
struct Line<'a> {
    receiver: &'a str,
    #[serde(flatten)]
    ticket: &'a Ticket,
}

impl StdoutNotifier {
    pub fn new(receiver: &ReceiverConfig) -> Self {
        Self {
            receiver: receiver.name.clone(),
        }
    }

    pub fn deliver(&self, ticket: &Ticket) -> Result<(), NotifyError> {
        self.write_to(&mut std::io::stdout().lock(), ticket)
    }

    fn write_to(&self, out: &mut impl Write, ticket: &Ticket) -> Result<(), NotifyError> {
        let line = Line {
            receiver: &self.receiver,
            ticket,
        };
        serde_json::to_writer(&mut *out, &line).map_err(std::io::Error::from)?;
        writeln!(out)?;
        out.flush()?;
        Ok(())
    }
}
