use std::{
    fs::{self, File},
    io::{self, BufWriter, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use instant::Instant;
use lz4_flex::block::DecompressError;
use nanoem::utils::fourcc;

use crate::{
    command::{CommandDispatcher, CommandType, RecordingMode},
    error::EmappError,
    progress::ProgressReporter,
};

/// Message published to the command stream during an asynchronous replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandMessage {
    Command {
        sequence: u32,
        command_type: CommandType,
        message: Vec<u8>,
    },
    PingPong {
        timestamp: u64,
    },
}

/// Message received from the event stream during an asynchronous replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventMessage {
    PingPong { requested_timestamp: u64 },
    Event { payload: Vec<u8> },
}

/// Destination of the commands accepted by an asynchronous replay.
/// It receives the file magic first and then one record per replayed command.
pub trait RecoveryWriter: Write {
    fn commit(&mut self) -> Result<(), EmappError>;
    fn rollback(&mut self) -> Result<(), EmappError>;
}

/// Writes into `<path>.tmp` and moves it over `path` on commit.
pub struct FileRecoveryWriter {
    path: PathBuf,
    temporary_path: PathBuf,
    file: Option<BufWriter<File>>,
}

impl FileRecoveryWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, EmappError> {
        let path = path.as_ref().to_path_buf();
        let mut temporary_path = path.clone().into_os_string();
        temporary_path.push(".tmp");
        let temporary_path = PathBuf::from(temporary_path);
        let file = File::create(&temporary_path)?;
        Ok(Self {
            path,
            temporary_path,
            file: Some(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn temporary_path(&self) -> &Path {
        &self.temporary_path
    }

    fn file_mut(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "recovery file is already closed"))
    }
}

impl Write for FileRecoveryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file_mut()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file_mut()?.flush()
    }
}

impl RecoveryWriter for FileRecoveryWriter {
    fn commit(&mut self) -> Result<(), EmappError> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            file.get_ref().sync_all()?;
            drop(file);
            fs::rename(&self.temporary_path, &self.path)?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), EmappError> {
        if self.file.take().is_some() {
            fs::remove_file(&self.temporary_path)?;
        }
        Ok(())
    }
}

impl Drop for FileRecoveryWriter {
    fn drop(&mut self) {
        if self.file.take().is_some() {
            if let Err(err) = fs::remove_file(&self.temporary_path) {
                log::warn!(
                    "Failed to remove recovery file {}: {}",
                    self.temporary_path.display(),
                    err
                );
            }
        }
    }
}

pub struct RedoReplayOptions<'a> {
    pub cancelled: &'a AtomicBool,
    pub recovery_writer: Option<&'a mut dyn RecoveryWriter>,
    pub progress: Option<&'a mut dyn ProgressReporter>,
}

impl<'a> RedoReplayOptions<'a> {
    pub fn new(cancelled: &'a AtomicBool) -> Self {
        Self {
            cancelled,
            recovery_writer: None,
            progress: None,
        }
    }

    pub fn with_recovery_writer(mut self, writer: &'a mut dyn RecoveryWriter) -> Self {
        self.recovery_writer = Some(writer);
        self
    }

    pub fn with_progress(mut self, progress: &'a mut dyn ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RedoRecordHeader {
    pub sequence: u32,
    pub command_type: u16,
    pub size: u32,
}

impl RedoRecordHeader {
    pub const SIZE: usize = 10;
}

/// Count of records and ordinal of the last save point, found by the pre-scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RedoCountOffset {
    pub count: u32,
    pub offset: u32,
}

#[derive(Debug)]
pub struct Redo {
    inflated: Vec<u8>,
    max_inflated_size: usize,
}

impl Default for Redo {
    fn default() -> Self {
        Self::new()
    }
}

impl Redo {
    pub const FILE_MAGIC: u32 = fourcc(b'n', b'm', b'C', b'S');
    pub const INFLATE_RATIO: usize = 100;
    pub const DEFAULT_MAX_INFLATED_SIZE: usize = 256 << 20;

    pub fn new() -> Self {
        Self::with_max_inflated_size(Self::DEFAULT_MAX_INFLATED_SIZE)
    }

    pub fn with_max_inflated_size(max_inflated_size: usize) -> Self {
        Self {
            inflated: vec![],
            max_inflated_size,
        }
    }

    /// Scans the records after the magic and rewinds to the first record.
    pub fn count_offset<R: Read + Seek>(reader: &mut R) -> Result<RedoCountOffset, EmappError> {
        let mut result = RedoCountOffset::default();
        while let Some(header) = Self::read_record_header(reader)? {
            if header.command_type == CommandType::SavePoint.raw() {
                result.offset = result.count;
            }
            reader.seek(SeekFrom::Current(i64::from(header.size)))?;
            result.count += 1;
        }
        reader.seek(SeekFrom::Start(4))?;
        Ok(result)
    }

    pub fn load_all<R, D>(&mut self, reader: &mut R, dispatcher: &mut D) -> Result<(), EmappError>
    where
        R: Read + Seek,
        D: CommandDispatcher + ?Sized,
    {
        Self::read_magic(reader)?;
        let RedoCountOffset { count, offset } = Self::count_offset(reader)?;
        log::debug!("Replaying {} redo records from #{}", count, offset);
        let max_deflated_size = self.max_deflated_size();
        let mut deflated = vec![];
        let mut last_sequence = 0u32;
        while let Some(header) = Self::read_record_header(reader)? {
            if let Some(command_type) =
                Self::read_payload(reader, &header, max_deflated_size, &mut deflated)?
            {
                if Self::is_replayable(offset, last_sequence, header.sequence) {
                    let message = self.inflate(&deflated, header.sequence)?;
                    dispatcher.dispatch_command_message(
                        command_type,
                        message,
                        RecordingMode::Suppressed,
                    )?;
                }
            }
            last_sequence = header.sequence;
        }
        Ok(())
    }

    /// Publishes every replayable command to `commands` and waits for the consumer to answer
    /// a ping on `events` before reading the next one.
    ///
    /// Cancellation rolls the recovery writer back and returns a canceled error.
    pub fn load_all_async<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        commands: &Sender<CommandMessage>,
        events: &Receiver<EventMessage>,
        mut options: RedoReplayOptions<'_>,
    ) -> Result<(), EmappError> {
        Self::read_magic(reader)?;
        let count_offset = Self::count_offset(reader)?;
        if let Some(progress) = options.progress.as_deref_mut() {
            progress.set_progress(0.0);
        }
        if let Some(writer) = options.recovery_writer.as_deref_mut() {
            writer.write_all(&Self::FILE_MAGIC.to_le_bytes())?;
        }
        let result = self.replay_async(reader, commands, events, &mut options, count_offset);
        let cancelled = options.is_cancelled();
        if let Some(writer) = options.recovery_writer.as_deref_mut() {
            if result.is_ok() && !cancelled {
                writer.commit()?;
            } else {
                writer.rollback()?;
            }
        }
        if cancelled {
            log::info!("Redo replay was canceled");
            return Err(EmappError::canceled());
        }
        result
    }

    fn replay_async<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        commands: &Sender<CommandMessage>,
        events: &Receiver<EventMessage>,
        options: &mut RedoReplayOptions<'_>,
        count_offset: RedoCountOffset,
    ) -> Result<(), EmappError> {
        let RedoCountOffset { count, offset } = count_offset;
        log::debug!("Replaying {} redo records from #{} asynchronously", count, offset);
        let origin = Instant::now();
        let mut last_timestamp = 0u64;
        let max_deflated_size = self.max_deflated_size();
        let mut deflated = vec![];
        let mut last_sequence = 0u32;
        while !options.is_cancelled() {
            let header = match Self::read_record_header(reader)? {
                Some(header) => header,
                None => break,
            };
            if let Some(command_type) =
                Self::read_payload(reader, &header, max_deflated_size, &mut deflated)?
            {
                if Self::is_replayable(offset, last_sequence, header.sequence) {
                    let message = self.inflate(&deflated, header.sequence)?.to_vec();
                    if let Some(writer) = options.recovery_writer.as_deref_mut() {
                        Self::write_record(writer, header.sequence, command_type, &message)?;
                    }
                    commands
                        .send(CommandMessage::Command {
                            sequence: header.sequence,
                            command_type,
                            message,
                        })
                        .map_err(|_| EmappError::redo_channel_closed_error())?;
                    let elapsed = origin.elapsed().as_nanos() as u64;
                    last_timestamp = elapsed.max(last_timestamp + 1);
                    Self::wait_event_message(commands, events, options.cancelled, last_timestamp)?;
                    if let Some(progress) = options.progress.as_deref_mut() {
                        progress.set_progress(Self::progress(header.sequence, count_offset));
                    }
                }
            }
            last_sequence = header.sequence;
        }
        Ok(())
    }

    fn wait_event_message(
        commands: &Sender<CommandMessage>,
        events: &Receiver<EventMessage>,
        cancelled: &AtomicBool,
        timestamp: u64,
    ) -> Result<(), EmappError> {
        commands
            .send(CommandMessage::PingPong { timestamp })
            .map_err(|_| EmappError::redo_channel_closed_error())?;
        while !cancelled.load(Ordering::Acquire) {
            match events.try_recv() {
                Ok(EventMessage::PingPong {
                    requested_timestamp,
                }) if requested_timestamp == timestamp => break,
                Ok(_) => {}
                Err(TryRecvError::Empty) => std::thread::yield_now(),
                Err(TryRecvError::Disconnected) => {
                    return Err(EmappError::redo_channel_closed_error())
                }
            }
        }
        Ok(())
    }

    /// Consumer side of [`Redo::load_all_async`]: applies each published command and answers
    /// every ping until the command stream is closed.
    pub fn serve_command_stream<D: CommandDispatcher + ?Sized>(
        commands: &Receiver<CommandMessage>,
        events: &Sender<EventMessage>,
        dispatcher: &mut D,
    ) -> Result<(), EmappError> {
        for message in commands.iter() {
            match message {
                CommandMessage::Command {
                    command_type,
                    message,
                    ..
                } => {
                    dispatcher.dispatch_command_message(
                        command_type,
                        &message,
                        RecordingMode::Suppressed,
                    )?;
                }
                CommandMessage::PingPong { timestamp } => {
                    if events
                        .send(EventMessage::PingPong {
                            requested_timestamp: timestamp,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Appends `message` as record `sequence`, preceded by the file magic for the first record.
    pub fn save<W: Write + ?Sized>(
        writer: &mut W,
        sequence: u32,
        command_type: CommandType,
        message: &[u8],
    ) -> Result<(), EmappError> {
        if sequence == 0 {
            writer.write_all(&Self::FILE_MAGIC.to_le_bytes())?;
        }
        Self::write_record(writer, sequence, command_type, message)
    }

    pub fn write_record<W: Write + ?Sized>(
        writer: &mut W,
        sequence: u32,
        command_type: CommandType,
        message: &[u8],
    ) -> Result<(), EmappError> {
        let compressed = lz4_flex::block::compress(message);
        let mut bytes = Vec::with_capacity(RedoRecordHeader::SIZE + compressed.len());
        bytes.extend_from_slice(&sequence.to_le_bytes());
        match u32::try_from(compressed.len()) {
            Ok(size) if size > 0 => {
                bytes.extend_from_slice(&command_type.raw().to_le_bytes());
                bytes.extend_from_slice(&size.to_le_bytes());
                bytes.extend_from_slice(&compressed);
            }
            _ => {
                log::warn!(
                    "Failed to compress redo record #{} ({} bytes)",
                    sequence,
                    message.len()
                );
                bytes.extend_from_slice(&CommandType::NotSet.raw().to_le_bytes());
                bytes.extend_from_slice(&0u32.to_le_bytes());
            }
        }
        writer.write_all(&bytes)?;
        Ok(())
    }

    pub fn is_replayable(offset: u32, last_sequence: u32, sequence: u32) -> bool {
        offset <= sequence && (last_sequence == 0 || last_sequence < sequence)
    }

    fn progress(sequence: u32, count_offset: RedoCountOffset) -> f32 {
        let RedoCountOffset { count, offset } = count_offset;
        if count > offset {
            let value = f64::from(sequence - offset) / f64::from(count - offset);
            value.min(1.0) as f32
        } else {
            1.0
        }
    }

    fn read_magic<R: Read>(reader: &mut R) -> Result<(), EmappError> {
        let mut magic = [0u8; 4];
        match reader.read_exact(&mut magic) {
            Ok(()) if u32::from_le_bytes(magic) == Self::FILE_MAGIC => Ok(()),
            Ok(()) => Err(EmappError::invalid_redo_file_error()),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                Err(EmappError::invalid_redo_file_error())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// `None` at a record boundary at the end of the stream.
    fn read_record_header<R: Read>(reader: &mut R) -> Result<Option<RedoRecordHeader>, EmappError> {
        let mut sequence = [0u8; 4];
        match read_up_to(reader, &mut sequence)? {
            0 => return Ok(None),
            4 => {}
            _ => return Err(EmappError::corrupted_redo_record_error(0)),
        }
        let sequence = u32::from_le_bytes(sequence);
        let mut rest = [0u8; 6];
        reader
            .read_exact(&mut rest)
            .map_err(|err| Self::truncated(err, sequence))?;
        Ok(Some(RedoRecordHeader {
            sequence,
            command_type: u16::from_le_bytes([rest[0], rest[1]]),
            size: u32::from_le_bytes([rest[2], rest[3], rest[4], rest[5]]),
        }))
    }

    /// Largest compressed payload that can still inflate within `max_inflated_size`.
    fn max_deflated_size(&self) -> usize {
        lz4_flex::block::get_maximum_output_size(self.max_inflated_size)
    }

    /// Reads the payload of an accepted record into `deflated`, or seeks past any other.
    ///
    /// The size field is checked against the rest of the stream before anything is allocated.
    fn read_payload<R: Read + Seek>(
        reader: &mut R,
        header: &RedoRecordHeader,
        max_deflated_size: usize,
        deflated: &mut Vec<u8>,
    ) -> Result<Option<CommandType>, EmappError> {
        let size = u64::from(header.size);
        if size > remaining_len(reader)? {
            log::warn!(
                "Redo record #{} declares {} bytes past the end of the log",
                header.sequence,
                header.size
            );
            return Err(EmappError::corrupted_redo_record_error(header.sequence));
        }
        match CommandType::from_raw(header.command_type).filter(|value| value.is_accepted()) {
            Some(_) if size > max_deflated_size as u64 => {
                log::warn!(
                    "Redo record #{} is too large to inflate ({} bytes)",
                    header.sequence,
                    header.size
                );
                Err(EmappError::corrupted_redo_record_error(header.sequence))
            }
            Some(command_type) => {
                deflated.resize(header.size as usize, 0);
                reader
                    .read_exact(deflated)
                    .map_err(|err| Self::truncated(err, header.sequence))?;
                Ok(Some(command_type))
            }
            None => {
                log::debug!(
                    "Skipping redo record #{} of type {}",
                    header.sequence,
                    header.command_type
                );
                reader.seek(SeekFrom::Current(i64::from(header.size)))?;
                Ok(None)
            }
        }
    }

    fn inflate(&mut self, deflated: &[u8], sequence: u32) -> Result<&[u8], EmappError> {
        if deflated.is_empty() {
            self.inflated.clear();
            return Ok(&self.inflated);
        }
        let mut capacity = deflated
            .len()
            .saturating_mul(Self::INFLATE_RATIO)
            .min(self.max_inflated_size);
        loop {
            self.inflated.resize(capacity, 0);
            match lz4_flex::block::decompress_into(deflated, &mut self.inflated) {
                Ok(size) => {
                    self.inflated.truncate(size);
                    return Ok(&self.inflated);
                }
                Err(DecompressError::OutputTooSmall { .. }) if capacity < self.max_inflated_size => {
                    capacity = capacity.saturating_mul(2).min(self.max_inflated_size);
                }
                Err(err) => {
                    log::warn!("Failed to inflate redo record #{}: {}", sequence, err);
                    return Err(EmappError::corrupted_redo_record_error(sequence));
                }
            }
        }
    }

    fn truncated(err: io::Error, sequence: u32) -> EmappError {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            EmappError::corrupted_redo_record_error(sequence)
        } else {
            err.into()
        }
    }
}

fn remaining_len<R: Seek>(reader: &mut R) -> io::Result<u64> {
    let position = reader.stream_position()?;
    let end = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(position))?;
    Ok(end.saturating_sub(position))
}

fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut read = 0;
    while read < buf.len() {
        match reader.read(&mut buf[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(read)
}
