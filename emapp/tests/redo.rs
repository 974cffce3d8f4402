use std::{
    fs,
    io::{self, Cursor, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use crossbeam_channel::unbounded;
use emapp::{
    command::{CommandType, RecordingMode},
    error::EmappError,
    internal::project::redo::{
        CommandMessage, EventMessage, FileRecoveryWriter, RecoveryWriter, Redo, RedoReplayOptions,
    },
};

type Dispatched = Vec<(CommandType, Vec<u8>, RecordingMode)>;

#[derive(Default)]
struct MemoryRecoveryWriter {
    bytes: Vec<u8>,
    committed: bool,
    rolled_back: bool,
}

impl Write for MemoryRecoveryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl RecoveryWriter for MemoryRecoveryWriter {
    fn commit(&mut self) -> Result<(), EmappError> {
        self.committed = true;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), EmappError> {
        self.rolled_back = true;
        Ok(())
    }
}

fn redo_log(records: &[(u32, CommandType, &[u8])]) -> Vec<u8> {
    let mut bytes = vec![];
    for (sequence, command_type, message) in records {
        Redo::save(&mut bytes, *sequence, *command_type, message).unwrap();
    }
    bytes
}

fn sample_log() -> Vec<u8> {
    redo_log(&[
        (0, CommandType::RedoLoadModel, &b"load miku"[..]),
        (1, CommandType::SavePoint, &b"saved"[..]),
        (2, CommandType::RedoTransformBone, &b"move center"[..]),
        (3, CommandType::PingPong, &b"ping"[..]),
        (4, CommandType::RedoUpdateCamera, &b"zoom"[..]),
    ])
}

fn load_all(bytes: Vec<u8>) -> Dispatched {
    let mut dispatched = Dispatched::new();
    let mut dispatcher = |command_type: CommandType,
                          message: &[u8],
                          mode: RecordingMode|
     -> Result<(), EmappError> {
        dispatched.push((command_type, message.to_vec(), mode));
        Ok(())
    };
    Redo::new()
        .load_all(&mut Cursor::new(bytes), &mut dispatcher)
        .unwrap();
    dispatched
}

fn spawn_consumer(
    commands: crossbeam_channel::Receiver<CommandMessage>,
    events: crossbeam_channel::Sender<EventMessage>,
) -> thread::JoinHandle<Dispatched> {
    thread::spawn(move || {
        let mut dispatched = Dispatched::new();
        let mut dispatcher = |command_type: CommandType,
                              message: &[u8],
                              mode: RecordingMode|
         -> Result<(), EmappError> {
            dispatched.push((command_type, message.to_vec(), mode));
            Ok(())
        };
        Redo::serve_command_stream(&commands, &events, &mut dispatcher).unwrap();
        dispatched
    })
}

#[test]
fn test_load_all_replays_since_last_save_point() {
    let dispatched = load_all(sample_log());
    let types: Vec<_> = dispatched.iter().map(|(command_type, ..)| *command_type).collect();
    assert_eq!(
        vec![
            CommandType::SavePoint,
            CommandType::RedoTransformBone,
            CommandType::RedoUpdateCamera
        ],
        types
    );
    assert_eq!(b"move center".to_vec(), dispatched[1].1);
    assert!(dispatched
        .iter()
        .all(|(_, _, mode)| *mode == RecordingMode::Suppressed));
}

#[test]
fn test_load_all_without_save_point_replays_everything() {
    let dispatched = load_all(redo_log(&[
        (0, CommandType::RedoLoadModel, &b"load"[..]),
        (1, CommandType::Undo, &b"undo"[..]),
        (2, CommandType::SetModelVisible, &b"hide"[..]),
    ]));
    let types: Vec<_> = dispatched.iter().map(|(command_type, ..)| *command_type).collect();
    assert_eq!(
        vec![
            CommandType::RedoLoadModel,
            CommandType::Undo,
            CommandType::SetModelVisible
        ],
        types
    );
    assert_eq!(b"undo".to_vec(), dispatched[1].1);
}

#[test]
fn test_load_all_skips_stale_sequences() {
    let dispatched = load_all(redo_log(&[
        (0, CommandType::RedoLoadModel, &b"load"[..]),
        (1, CommandType::RedoAddBoneKeyframe, &b"first"[..]),
        (1, CommandType::RedoAddBoneKeyframe, &b"again"[..]),
        (3, CommandType::RedoRemoveBoneKeyframe, &b"remove"[..]),
        (2, CommandType::RedoAddMorphKeyframe, &b"late"[..]),
    ]));
    let messages: Vec<_> = dispatched.iter().map(|(_, message, _)| message.clone()).collect();
    assert_eq!(
        vec![b"load".to_vec(), b"first".to_vec(), b"remove".to_vec()],
        messages
    );
}

#[test]
fn test_unknown_record_types_are_skipped() {
    let mut bytes = redo_log(&[(0, CommandType::RedoLoadAudio, &b"song"[..])]);
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&999u16.to_le_bytes());
    bytes.extend_from_slice(&3u32.to_le_bytes());
    bytes.extend_from_slice(b"???");
    Redo::save(&mut bytes, 2, CommandType::RedoLoadVideo, b"movie").unwrap();
    let dispatched = load_all(bytes);
    assert_eq!(2, dispatched.len());
    assert_eq!(CommandType::RedoLoadVideo, dispatched[1].0);
}

#[test]
fn test_oversized_record_size_is_corrupted() {
    let mut bytes = redo_log(&[(0, CommandType::RedoLoadModel, &b"load"[..])]);
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&CommandType::RedoLoadModel.raw().to_le_bytes());
    bytes.extend_from_slice(&0xffff_fff0u32.to_le_bytes());
    bytes.extend_from_slice(b"abc");
    let mut dispatched = 0;
    let mut dispatcher =
        |_: CommandType, _: &[u8], _: RecordingMode| -> Result<(), EmappError> {
            dispatched += 1;
            Ok(())
        };
    let err = Redo::new()
        .load_all(&mut Cursor::new(bytes), &mut dispatcher)
        .unwrap_err();
    assert_eq!(2, err.code());
    assert_eq!("The redo record #1 is corrupted", err.reason());
    assert_eq!(1, dispatched);
}

#[test]
fn test_skipped_record_past_end_is_corrupted() {
    let mut bytes = redo_log(&[(0, CommandType::RedoLoadModel, &b"load"[..])]);
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&CommandType::PingPong.raw().to_le_bytes());
    bytes.extend_from_slice(&64u32.to_le_bytes());
    bytes.extend_from_slice(b"ping");
    let mut dispatcher =
        |_: CommandType, _: &[u8], _: RecordingMode| -> Result<(), EmappError> { Ok(()) };
    let err = Redo::new()
        .load_all(&mut Cursor::new(bytes), &mut dispatcher)
        .unwrap_err();
    assert_eq!(2, err.code());
}

#[test]
fn test_load_all_async_waits_for_each_command() {
    let (command_sender, command_receiver) = unbounded();
    let (event_sender, event_receiver) = unbounded();
    let consumer = spawn_consumer(command_receiver, event_sender);
    let cancelled = AtomicBool::new(false);
    let mut progress_values = vec![];
    let mut progress = |value: f32| progress_values.push(value);
    let mut writer = MemoryRecoveryWriter::default();
    let options = RedoReplayOptions::new(&cancelled)
        .with_progress(&mut progress)
        .with_recovery_writer(&mut writer);
    Redo::new()
        .load_all_async(
            &mut Cursor::new(sample_log()),
            &command_sender,
            &event_receiver,
            options,
        )
        .unwrap();
    drop(command_sender);
    let dispatched = consumer.join().unwrap();
    assert_eq!(3, dispatched.len());
    assert_eq!(b"zoom".to_vec(), dispatched[2].1);
    assert_eq!(vec![0.0, 0.0, 0.25, 0.75], progress_values);
    assert!(writer.committed);
    assert!(!writer.rolled_back);

    let recovered = load_all(writer.bytes);
    assert_eq!(dispatched, recovered);
}

#[test]
fn test_load_all_async_ignores_unrelated_events() {
    let (command_sender, command_receiver) = unbounded();
    let (event_sender, event_receiver) = unbounded::<EventMessage>();
    let consumer = thread::spawn(move || {
        let mut count = 0;
        for message in command_receiver.iter() {
            if let CommandMessage::PingPong { timestamp } = message {
                event_sender
                    .send(EventMessage::PingPong {
                        requested_timestamp: timestamp.wrapping_add(1),
                    })
                    .unwrap();
                event_sender
                    .send(EventMessage::Event {
                        payload: b"status".to_vec(),
                    })
                    .unwrap();
                event_sender
                    .send(EventMessage::PingPong {
                        requested_timestamp: timestamp,
                    })
                    .unwrap();
                count += 1;
            }
        }
        count
    });
    let cancelled = AtomicBool::new(false);
    Redo::new()
        .load_all_async(
            &mut Cursor::new(sample_log()),
            &command_sender,
            &event_receiver,
            RedoReplayOptions::new(&cancelled),
        )
        .unwrap();
    drop(command_sender);
    assert_eq!(3, consumer.join().unwrap());
}

#[test]
fn test_cancel_rolls_back_recovery_writer() {
    let (command_sender, command_receiver) = unbounded();
    let (event_sender, event_receiver) = unbounded::<EventMessage>();
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = cancelled.clone();
    let consumer = thread::spawn(move || {
        let mut commands = 0;
        for message in command_receiver.iter() {
            if let CommandMessage::Command { .. } = message {
                commands += 1;
                flag.store(true, Ordering::Release);
            }
        }
        drop(event_sender);
        commands
    });
    let mut writer = MemoryRecoveryWriter::default();
    let options = RedoReplayOptions::new(&cancelled).with_recovery_writer(&mut writer);
    let err = Redo::new()
        .load_all_async(
            &mut Cursor::new(sample_log()),
            &command_sender,
            &event_receiver,
            options,
        )
        .unwrap_err();
    drop(command_sender);
    assert!(err.is_canceled());
    assert_eq!(1, consumer.join().unwrap());
    assert!(writer.rolled_back);
    assert!(!writer.committed);
}

#[test]
fn test_closed_event_stream_fails_replay() {
    let (command_sender, _command_receiver) = unbounded();
    let (event_sender, event_receiver) = unbounded::<EventMessage>();
    drop(event_sender);
    let cancelled = AtomicBool::new(false);
    let mut writer = MemoryRecoveryWriter::default();
    let options = RedoReplayOptions::new(&cancelled).with_recovery_writer(&mut writer);
    let err = Redo::new()
        .load_all_async(
            &mut Cursor::new(sample_log()),
            &command_sender,
            &event_receiver,
            options,
        )
        .unwrap_err();
    assert_eq!(3, err.code());
    assert!(writer.rolled_back);
}

#[test]
fn test_file_recovery_writer_commit_and_rollback() {
    let directory = std::env::temp_dir().join(format!("emapp-redo-{}", std::process::id()));
    fs::create_dir_all(&directory).unwrap();

    let committed_path = directory.join("committed.redo");
    let mut writer = FileRecoveryWriter::create(&committed_path).unwrap();
    let temporary_path = writer.temporary_path().to_path_buf();
    Redo::save(&mut writer, 0, CommandType::RedoLoadModel, b"load").unwrap();
    assert!(temporary_path.exists());
    writer.commit().unwrap();
    assert!(!temporary_path.exists());
    let dispatched = load_all(fs::read(&committed_path).unwrap());
    assert_eq!(b"load".to_vec(), dispatched[0].1);
    assert!(writer.write_all(b"late").is_err());

    let rolled_back_path = directory.join("rolled_back.redo");
    let mut writer = FileRecoveryWriter::create(&rolled_back_path).unwrap();
    Redo::save(&mut writer, 0, CommandType::RedoLoadModel, b"load").unwrap();
    writer.rollback().unwrap();
    assert!(!writer.temporary_path().exists());
    assert!(!rolled_back_path.exists());

    fs::remove_dir_all(&directory).unwrap();
}
