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

//! Prints log messages but also extracts protocol events and writes them to a file

use log::{Level, Metadata, Record, SetLoggerError};
use std::{fs::File, io::BufWriter, sync::Mutex};

use protocol_event_writer::{is_event, ProtocolEventWriter};

const LOG_COLOR_CODE_DEFAULT: &str = "\x1B[0m";
const LOG_COLOR_CODE_RED: &str = "\x1B[1;31m";
const LOG_COLOR_CODE_GREEN: &str = "\x1B[1;32m";
const LOG_COLOR_CODE_YELLOW: &str = "\x1B[1;33m";
const LOG_COLOR_CODE_BLUE: &str = "\x1B[1;34m";

type EventWriter = ProtocolEventWriter<BufWriter<File>>;

pub struct SimLogger {
    max_level: Level,
    event_writer: Option<Mutex<EventWriter>>,
}

impl SimLogger {
    fn write_event(&self, msg: &str) {
        let Some(writer) = self.event_writer.as_ref() else {
            return;
        };
        let Ok(mut writer) = writer.lock() else {
            return;
        };
        if let Err(e) = writer.write_event(msg) {
            eprintln!("could not write event: {e}");
        }
    }
}

impl log::Log for SimLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let color = match record.level() {
            Level::Error => LOG_COLOR_CODE_RED,
            Level::Warn => LOG_COLOR_CODE_YELLOW,
            Level::Info => LOG_COLOR_CODE_GREEN,
            Level::Debug => LOG_COLOR_CODE_BLUE,
            Level::Trace => "",
        };

        let msg = record.args().to_string();

        if is_event(&msg) {
            self.write_event(&msg);
        }

        println!(
            "[{}] {}{}{}",
            record.target(),
            color,
            msg,
            LOG_COLOR_CODE_DEFAULT
        );
    }

    fn flush(&self) {
        if let Some(Ok(mut writer)) = self.event_writer.as_ref().map(Mutex::lock) {
            if let Err(e) = writer.flush() {
                eprintln!("could not flush event file: {e}");
            }
        }
    }
}

#[derive(Debug)]
pub enum InitError {
    EventFile(std::io::Error),
    Logger(SetLoggerError),
}

impl std::fmt::Display for InitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitError::EventFile(e) => write!(f, "could not create event file: {e}"),
            InitError::Logger(e) => write!(f, "{e}"),
        }
    }
}

pub fn init(max_level: Level, output_file_path: Option<&str>) -> Result<(), InitError> {
    let event_writer = output_file_path
        .map(ProtocolEventWriter::create)
        .transpose()
        .map_err(InitError::EventFile)?;
    let logger = Box::new(SimLogger {
        max_level,
        event_writer: event_writer.map(Mutex::new),
    });
    log::set_logger(Box::leak(logger)).map_err(InitError::Logger)?;
    log::set_max_level(max_level.to_level_filter());
    Ok(())
}
