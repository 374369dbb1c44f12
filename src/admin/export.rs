//! Message exports.
//!
//! An export is a plain text file: one header line, a blank line, then
//! every message rendered as a listing block, in log order. Files land in
//! `<export_dir>/user_exports` or `<export_dir>/topic_exports` and carry the
//! local time of the export in their name.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tracing::info;

use crate::broker::message::{CONTINUATION, Message, SEPARATOR};
use crate::broker::topic::{ConnectionId, MessageId};
use crate::utils::error::AdminError;

const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// What an export selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportTarget {
    /// A client's sent-log.
    User(ConnectionId),
    /// A topic's full log.
    Topic(String),
}

impl ExportTarget {
    fn subdir(&self) -> &'static str {
        match self {
            ExportTarget::User(_) => "user_exports",
            ExportTarget::Topic(_) => "topic_exports",
        }
    }

    fn file_suffix(&self) -> String {
        match self {
            ExportTarget::User(id) => format!("user_{id}"),
            ExportTarget::Topic(topic) => format!("topic_{topic}"),
        }
    }

    fn header(&self) -> String {
        match self {
            ExportTarget::User(id) => format!("--- EXPORTED MESSAGES FOR USER ID {id} ---"),
            ExportTarget::Topic(topic) => format!("--- EXPORTED MESSAGES FOR TOPIC '{topic}' ---"),
        }
    }

    fn describe(&self) -> String {
        match self {
            ExportTarget::User(id) => format!("user ID {id}"),
            ExportTarget::Topic(topic) => format!("topic '{topic}'"),
        }
    }
}

/// Write `messages` to a new export file under `export_dir` and return its
/// path. An empty selection is an error and creates nothing.
pub fn export_messages(
    export_dir: &Path,
    target: &ExportTarget,
    messages: &[Arc<Message>],
) -> Result<PathBuf, AdminError> {
    if messages.is_empty() {
        return Err(AdminError::NoMessages(target.describe()));
    }

    let dir = export_dir.join(target.subdir());
    fs::create_dir_all(&dir)?;

    let stamp = Local::now().format(FILE_TIMESTAMP_FORMAT);
    let path = dir.join(format!("export_{stamp}_{}.txt", target.file_suffix()));

    let mut writer = BufWriter::new(File::create(&path)?);
    writeln!(writer, "{}", target.header())?;
    writeln!(writer)?;
    for message in messages {
        writeln!(writer, "{message}")?;
    }
    writer.flush()?;

    info!(path = %path.display(), count = messages.len(), "messages exported");
    Ok(path)
}

/// Read an export back and return the message ids it contains, in file order.
pub fn read_message_ids(path: &Path) -> Result<Vec<MessageId>, AdminError> {
    let contents = fs::read_to_string(path)?;
    Ok(parse_message_ids(&contents))
}

/// Ids of every rendered block in `contents`. A block is a separator line,
/// a timestamp, an `[ID n | ...]` header, a `BODY: ` line, any number of
/// continuation lines, and a closing separator. Text that does not follow
/// that shape is skipped.
pub fn parse_message_ids(contents: &str) -> Vec<MessageId> {
    let mut ids = Vec::new();
    let mut lines = contents.lines().peekable();
    while let Some(line) = lines.next() {
        if line != SEPARATOR {
            continue;
        }
        let Some(_timestamp) = lines.next() else {
            break;
        };
        let Some(id) = lines.next().and_then(header_id) else {
            continue;
        };
        if !lines.next().is_some_and(|body| body.starts_with("BODY: ")) {
            continue;
        }
        while lines.next_if(|l| l.starts_with(CONTINUATION)).is_some() {}
        if lines.next_if_eq(&SEPARATOR).is_some() {
            ids.push(id);
        }
    }
    ids
}

fn header_id(line: &str) -> Option<MessageId> {
    line.strip_prefix('[')?
        .split(" | ")
        .find_map(|segment| segment.strip_prefix("ID "))?
        .trim()
        .parse()
        .ok()
}
