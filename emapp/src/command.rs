use crate::error::EmappError;

macro_rules! command_types {
    ($($name:ident = $value:literal,)*) => {
        /// Tag of a recorded editing command, stored as `u16` in every redo record.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum CommandType {
            $($name = $value,)*
        }

        impl CommandType {
            pub fn from_raw(value: u16) -> Option<Self> {
                match value {
                    $($value => Some(Self::$name),)*
                    _ => None,
                }
            }
        }
    };
}

command_types! {
    NotSet = 0,
    PingPong = 1,
    Undo = 2,
    SavePoint = 3,
    RedoAddAccessoryKeyframe = 10,
    RedoAddBoneKeyframe = 11,
    RedoAddCameraKeyframe = 12,
    RedoAddLightKeyframe = 13,
    RedoAddModelKeyframe = 14,
    RedoAddMorphKeyframe = 15,
    RedoAddSelfShadowKeyframe = 16,
    RedoRemoveAccessoryKeyframe = 20,
    RedoRemoveBoneKeyframe = 21,
    RedoRemoveCameraKeyframe = 22,
    RedoRemoveLightKeyframe = 23,
    RedoRemoveModelKeyframe = 24,
    RedoRemoveMorphKeyframe = 25,
    RedoRemoveSelfShadowKeyframe = 26,
    RedoBatchUndoCommandList = 30,
    RedoDeleteAccessory = 31,
    RedoDeleteModel = 32,
    RedoLoadAccessory = 33,
    RedoLoadAudio = 34,
    RedoLoadModel = 35,
    RedoLoadMotion = 36,
    RedoLoadVideo = 37,
    RedoSaveMotionSnapshot = 38,
    RedoInsertEmptyTimelineFrame = 39,
    RedoRemoveTimelineFrame = 40,
    RedoTransformBone = 41,
    RedoTransformMorph = 42,
    RedoUpdateAccessory = 43,
    RedoUpdateCamera = 44,
    RedoUpdateLight = 45,
    SetAccessoryOutsideParent = 50,
    SetActiveAccessory = 51,
    SetActiveModel = 52,
    SetActiveModelBone = 53,
    SetActiveModelMorph = 54,
    SetEffectPluginEnabled = 55,
    SetModelConstraintState = 56,
    SetModelEdgeColor = 57,
    SetModelEdgeSize = 58,
    SetModelOutsideParent = 59,
    SetModelVisible = 60,
    LoadProject = 70,
    SaveProject = 71,
    SetPreferredFps = 72,
}

impl CommandType {
    pub fn raw(self) -> u16 {
        self as u16
    }

    /// Whether a record of this type is replayed from a redo log.
    pub fn is_accepted(self) -> bool {
        !matches!(
            self,
            Self::NotSet | Self::PingPong | Self::LoadProject | Self::SaveProject | Self::SetPreferredFps
        )
    }

    pub fn is_raw_accepted(value: u16) -> bool {
        Self::from_raw(value).map_or(false, Self::is_accepted)
    }
}

/// Whether dispatching a command writes it back into the redo log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordingMode {
    Record,
    Suppressed,
}

impl RecordingMode {
    pub fn is_recording(self) -> bool {
        self == Self::Record
    }
}

/// Applies a decompressed command message to the running project.
pub trait CommandDispatcher {
    fn dispatch_command_message(
        &mut self,
        command_type: CommandType,
        message: &[u8],
        mode: RecordingMode,
    ) -> Result<(), EmappError>;
}

impl<F> CommandDispatcher for F
where
    F: FnMut(CommandType, &[u8], RecordingMode) -> Result<(), EmappError>,
{
    fn dispatch_command_message(
        &mut self,
        command_type: CommandType,
        message: &[u8],
        mode: RecordingMode,
    ) -> Result<(), EmappError> {
        self(command_type, message, mode)
    }
}

#[test]
fn test_command_type_from_raw() {
    assert_eq!(Some(CommandType::SavePoint), CommandType::from_raw(3));
    assert_eq!(Some(CommandType::RedoUpdateLight), CommandType::from_raw(45));
    assert_eq!(None, CommandType::from_raw(4));
    assert_eq!(None, CommandType::from_raw(u16::MAX));
    assert_eq!(57, CommandType::SetModelEdgeColor.raw());
}

#[test]
fn test_accepted_command_types() {
    let accepted = (0..=u16::from(u8::MAX))
        .filter(|value| CommandType::is_raw_accepted(*value))
        .count();
    assert_eq!(43, accepted);
    assert!(CommandType::Undo.is_accepted());
    assert!(CommandType::SavePoint.is_accepted());
    assert!(!CommandType::PingPong.is_accepted());
    assert!(!CommandType::NotSet.is_accepted());
    assert!(!CommandType::SaveProject.is_accepted());
}
