//  _____       ______   ____
// |_   _|     |  ____|/ ____|  Institute of Embedded Systems
//   | |  _ __ | |__  | (___    Zurich University of Applied Sciences
//   | | | '_ \|  __|  \___ \   8401 Winterthur, Switzerland
//  _| |_| | | | |____ ____) |
// |_____|_| |_|______|_____/
//
// Copyright 2025 Institute of Embedded Systems at Zurich University of Applied Sciences.
// All rights reserved.
// SPDX-License-Identifier: MIT

//! Writes the event lines of the lwMAC event log to a semicolon separated file
//!
//! Event lines start with [`EVENT_INDICATOR_CHAR`] followed by `uptime;node;kind;content`,
//! where content is a JSON value.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

pub const EVENT_INDICATOR_CHAR: char = '$';

const FILE_HEADER: &str = "uptime;node;kind;content";

pub fn is_event(line: &str) -> bool {
    line.starts_with(EVENT_INDICATOR_CHAR)
}

pub struct ProtocolEventWriter<W: Write> {
    out: W,
    events: usize,
}

impl ProtocolEventWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> ProtocolEventWriter<W> {
    /// Wrap `out` and write the column header
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(out, "{}", FILE_HEADER)?;
        Ok(Self { out, events: 0 })
    }

    pub fn write_event(&mut self, event: &str) -> io::Result<()> {
        // strip indicator char
        let event = event.strip_prefix(EVENT_INDICATOR_CHAR).unwrap_or(event);
        writeln!(self.out, "{}", event)?;
        self.events += 1;
        Ok(())
    }

    /// Number of events written so far
    pub fn events(&self) -> usize {
        self.events
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_and_events() {
        let mut writer = ProtocolEventWriter::new(Vec::new()).unwrap();
        assert!(is_event("$0;0a:01;reset;{}"));
        writer.write_event("$0;0a:01;reset;{}").unwrap();
        writer.write_event("$10;0a:01;state;\"Listening\"").unwrap();
        assert_eq!(writer.events(), 2);

        let out = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(
            out,
            "uptime;node;kind;content\n0;0a:01;reset;{}\n10;0a:01;state;\"Listening\"\n"
        );
    }

    #[test]
    fn plain_lines_are_no_events() {
        assert!(!is_event("lwmac up, phase 0 of 3276 ticks"));
    }
}
