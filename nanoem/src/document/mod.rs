pub mod accessory;
pub mod camera;
pub mod gravity;
pub mod keyframe;
pub mod light;
pub mod model;
pub mod object;
pub mod self_shadow;

use std::cmp::Ordering;

use crate::{
    common::{Buffer, NanoemError, F128},
    mutable::common::MutableBuffer,
    utils::compare,
};

pub use self::{
    accessory::{DocumentAccessory, DocumentAccessoryKeyframe},
    camera::{DocumentCamera, DocumentCameraKeyframe, DocumentCameraKeyframeInterpolation},
    gravity::{DocumentGravity, DocumentGravityKeyframe},
    keyframe::DocumentBaseKeyframe,
    light::{DocumentLight, DocumentLightKeyframe},
    model::{
        DocumentModel, DocumentModelBoneKeyframe, DocumentModelBoneKeyframeInterpolation,
        DocumentModelBoneState, DocumentModelConstraintState, DocumentModelKeyframe,
        DocumentModelMorphKeyframe, DocumentModelMorphState, DocumentModelOutsideParentState,
        DocumentOutsideParent, LanguageType,
    },
    object::{DocumentObject, DocumentParent, Handle, ObjectId},
    self_shadow::{DocumentSelfShadow, DocumentSelfShadowKeyframe},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentVersion {
    V1 = 1,
    V2 = 2,
}

impl DocumentVersion {
    pub fn is_v2(self) -> bool {
        self == DocumentVersion::V2
    }
}

/// Timeline editing tool. Values outside the known range are kept as read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentEditingMode {
    Select,
    SelectBox,
    None,
    Rotate,
    Move,
    Unknown(i32),
}

impl From<i32> for DocumentEditingMode {
    fn from(value: i32) -> Self {
        match value {
            0 => Self::Select,
            1 => Self::SelectBox,
            2 => Self::None,
            3 => Self::Rotate,
            4 => Self::Move,
            _ => Self::Unknown(value),
        }
    }
}

impl From<DocumentEditingMode> for i32 {
    fn from(value: DocumentEditingMode) -> Self {
        match value {
            DocumentEditingMode::Select => 0,
            DocumentEditingMode::SelectBox => 1,
            DocumentEditingMode::None => 2,
            DocumentEditingMode::Rotate => 3,
            DocumentEditingMode::Move => 4,
            DocumentEditingMode::Unknown(value) => value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentPhysicsSimulationMode {
    Disable,
    EnableAnytime,
    EnablePlaying,
    EnableTracing,
    Unknown(u8),
}

impl From<u8> for DocumentPhysicsSimulationMode {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Disable,
            1 => Self::EnableAnytime,
            2 => Self::EnablePlaying,
            3 => Self::EnableTracing,
            _ => Self::Unknown(value),
        }
    }
}

impl From<DocumentPhysicsSimulationMode> for u8 {
    fn from(value: DocumentPhysicsSimulationMode) -> Self {
        match value {
            DocumentPhysicsSimulationMode::Disable => 0,
            DocumentPhysicsSimulationMode::EnableAnytime => 1,
            DocumentPhysicsSimulationMode::EnablePlaying => 2,
            DocumentPhysicsSimulationMode::EnableTracing => 3,
            DocumentPhysicsSimulationMode::Unknown(value) => value,
        }
    }
}

/// Model data a v1 project cannot carry inline and has to be loaded from the referenced file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalModel {
    pub bone_names: Vec<String>,
    pub morph_names: Vec<String>,
    pub constraint_bone_indices: Vec<i32>,
}

pub trait ParseModelCallback {
    fn load_model_by_path(&mut self, path: &str) -> Result<ExternalModel, NanoemError>;
}

impl<F> ParseModelCallback for F
where
    F: FnMut(&str) -> Result<ExternalModel, NanoemError>,
{
    fn load_model_by_path(&mut self, path: &str) -> Result<ExternalModel, NanoemError> {
        self(path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub version: DocumentVersion,
    pub output_width: i32,
    pub output_height: i32,
    pub timeline_width: i32,
    pub camera_fov: f32,
    pub editing_cla: bool,
    pub is_camera_panel_expanded: bool,
    pub is_light_panel_expanded: bool,
    pub is_accessory_panel_expanded: bool,
    pub is_bone_panel_expanded: bool,
    pub is_morph_panel_expanded: bool,
    pub is_self_shadow_panel_expanded: bool,
    pub select_model_index: u8,
    pub models: Vec<DocumentModel>,
    pub camera: DocumentCamera,
    pub light: DocumentLight,
    pub select_accessory_index: u8,
    pub horizontal_scroll_for_accessory: i32,
    pub accessory_names: Vec<String>,
    pub accessories: Vec<DocumentAccessory>,
    pub current_frame_index: u32,
    pub horizontal_scroll: i32,
    pub horizontal_scroll_thumb: i32,
    pub editing_mode: DocumentEditingMode,
    pub camera_look_mode: u8,
    pub is_loop_enabled: bool,
    pub is_begin_frame_index_enabled: bool,
    pub is_end_frame_index_enabled: bool,
    pub begin_frame_index: u32,
    pub end_frame_index: u32,
    pub is_audio_enabled: bool,
    pub audio_path: String,
    pub background_video_offset_x: i32,
    pub background_video_offset_y: i32,
    pub background_video_scale_factor: f32,
    pub background_video_path: String,
    pub is_background_video_enabled: bool,
    pub background_image_offset_x: i32,
    pub background_image_offset_y: i32,
    pub background_image_scale_factor: f32,
    pub background_image_path: String,
    pub is_background_image_enabled: bool,
    pub is_information_shown: bool,
    pub is_grid_and_axis_shown: bool,
    pub is_ground_shadow_shown: bool,
    pub preferred_fps: f32,
    pub screen_capture_mode: i32,
    pub accessory_index_after_models: i32,
    pub ground_shadow_brightness: f32,
    pub is_translucent_ground_shadow_enabled: bool,
    pub physics_simulation_mode: DocumentPhysicsSimulationMode,
    pub gravity: DocumentGravity,
    pub self_shadow: DocumentSelfShadow,
    pub edge_color: F128,
    pub is_black_background_enabled: bool,
    pub camera_look_at_model_index: i32,
    pub camera_look_at_model_bone_index: i32,
    pub unknown_matrix: [f32; 16],
    pub is_following_look_at_enabled: bool,
    pub unknown_boolean: bool,
    pub is_physics_ground_enabled: bool,
    pub current_frame_index_in_text_field: u32,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: DocumentVersion::V2,
            output_width: 1920,
            output_height: 1080,
            timeline_width: 0,
            camera_fov: DocumentCamera::DEFAULT_FOV as f32,
            editing_cla: false,
            is_camera_panel_expanded: true,
            is_light_panel_expanded: true,
            is_accessory_panel_expanded: true,
            is_bone_panel_expanded: true,
            is_morph_panel_expanded: true,
            is_self_shadow_panel_expanded: true,
            select_model_index: 0,
            models: vec![],
            camera: DocumentCamera::default(),
            light: DocumentLight::default(),
            select_accessory_index: 0,
            horizontal_scroll_for_accessory: 0,
            accessory_names: vec![],
            accessories: vec![],
            current_frame_index: 0,
            horizontal_scroll: 0,
            horizontal_scroll_thumb: 0,
            editing_mode: DocumentEditingMode::Select,
            camera_look_mode: 0,
            is_loop_enabled: false,
            is_begin_frame_index_enabled: false,
            is_end_frame_index_enabled: false,
            begin_frame_index: 0,
            end_frame_index: 0,
            is_audio_enabled: false,
            audio_path: String::new(),
            background_video_offset_x: 0,
            background_video_offset_y: 0,
            background_video_scale_factor: 1.0f32,
            background_video_path: String::new(),
            is_background_video_enabled: false,
            background_image_offset_x: 0,
            background_image_offset_y: 0,
            background_image_scale_factor: 1.0f32,
            background_image_path: String::new(),
            is_background_image_enabled: false,
            is_information_shown: true,
            is_grid_and_axis_shown: true,
            is_ground_shadow_shown: true,
            preferred_fps: 30.0f32,
            screen_capture_mode: 0,
            accessory_index_after_models: 0,
            ground_shadow_brightness: 1.0f32,
            is_translucent_ground_shadow_enabled: false,
            physics_simulation_mode: DocumentPhysicsSimulationMode::EnableAnytime,
            gravity: DocumentGravity::default(),
            self_shadow: DocumentSelfShadow::default(),
            edge_color: F128::default(),
            is_black_background_enabled: false,
            camera_look_at_model_index: -1,
            camera_look_at_model_bone_index: -1,
            unknown_matrix: [0.0f32; 16],
            is_following_look_at_enabled: false,
            unknown_boolean: false,
            is_physics_ground_enabled: true,
            current_frame_index_in_text_field: 0,
        }
    }
}

impl Document {
    pub const SIGNATURE_SIZE: usize = 30;
    pub const SIGNATURE_V1: &'static [u8] = b"Polygon Movie maker 0001";
    pub const SIGNATURE_V2: &'static [u8] = b"Polygon Movie maker 0002";
    pub const PATH_MAX: usize = 256;
    pub const ACCESSORY_NAME_MAX: usize = 100;
    pub const PMMV1_MODEL_NAME_MAX: usize = 20;

    /// Parses a whole project. Version 1 files reference their models by path only,
    /// so `callback` must be provided for them to resolve bone and morph names.
    pub fn load_from_buffer(
        buffer: &mut Buffer,
        callback: Option<&mut (dyn ParseModelCallback + '_)>,
    ) -> Result<Self, NanoemError> {
        let signature = buffer.read_buffer(Self::SIGNATURE_SIZE)?;
        let version = if compare(&signature[0..Self::SIGNATURE_V2.len()], Self::SIGNATURE_V2)
            == Ordering::Equal
        {
            DocumentVersion::V2
        } else if compare(&signature[0..Self::SIGNATURE_V1.len()], Self::SIGNATURE_V1)
            == Ordering::Equal
        {
            DocumentVersion::V1
        } else {
            return Err(NanoemError::InvalidSignature);
        };
        log::debug!("loading project document version {:?}", version);
        let mut document = Self {
            version,
            ..Default::default()
        };
        document.parse_pmm(buffer, callback)?;
        if !buffer.is_end() {
            log::debug!(
                "{} trailing bytes left after the project document",
                buffer.len() - buffer.offset()
            );
        }
        Ok(document)
    }

    fn parse_pmm(
        &mut self,
        buffer: &mut Buffer,
        mut callback: Option<&mut (dyn ParseModelCallback + '_)>,
    ) -> Result<(), NanoemError> {
        let version = self.version;
        self.output_width = buffer.read_i32_little_endian()?;
        self.output_height = buffer.read_i32_little_endian()?;
        self.timeline_width = buffer.read_i32_little_endian()?;
        self.camera_fov = buffer.read_f32_little_endian()?;
        self.editing_cla = buffer.read_bool()?;
        self.is_camera_panel_expanded = buffer.read_bool()?;
        self.is_light_panel_expanded = buffer.read_bool()?;
        self.is_accessory_panel_expanded = buffer.read_bool()?;
        self.is_bone_panel_expanded = buffer.read_bool()?;
        self.is_morph_panel_expanded = buffer.read_bool()?;
        self.is_self_shadow_panel_expanded = buffer.read_bool()?;
        self.select_model_index = buffer.read_byte()?;
        let num_models = buffer.read_byte()? as usize;
        self.models = Vec::with_capacity(num_models);
        for _ in 0..num_models {
            let model = DocumentModel::parse_pmm(buffer, version, callback.as_deref_mut())?;
            self.models.push(model);
        }
        self.camera = DocumentCamera::parse_pmm(buffer, version)?;
        self.light = DocumentLight::parse_pmm(buffer)?;
        self.select_accessory_index = buffer.read_byte()?;
        self.horizontal_scroll_for_accessory = buffer.read_i32_little_endian()?;
        let num_accessories = buffer.read_byte()? as usize;
        self.accessory_names = (0..num_accessories)
            .map(|_| buffer.read_string_from_cp932(Self::ACCESSORY_NAME_MAX))
            .collect::<Result<_, _>>()?;
        self.accessories = Vec::with_capacity(num_accessories);
        for _ in 0..num_accessories {
            self.accessories
                .push(DocumentAccessory::parse_pmm(buffer, version)?);
        }
        self.current_frame_index = buffer.read_u32_little_endian()?;
        self.horizontal_scroll = buffer.read_i32_little_endian()?;
        self.horizontal_scroll_thumb = buffer.read_i32_little_endian()?;
        self.editing_mode = DocumentEditingMode::from(buffer.read_i32_little_endian()?);
        self.camera_look_mode = buffer.read_byte()?;
        self.is_loop_enabled = buffer.read_bool()?;
        self.is_begin_frame_index_enabled = buffer.read_bool()?;
        self.is_end_frame_index_enabled = buffer.read_bool()?;
        self.begin_frame_index = buffer.read_u32_little_endian()?;
        self.end_frame_index = buffer.read_u32_little_endian()?;
        self.is_audio_enabled = buffer.read_bool()?;
        self.audio_path = buffer.read_string_from_cp932(Self::PATH_MAX)?;
        self.background_video_offset_x = buffer.read_i32_little_endian()?;
        self.background_video_offset_y = buffer.read_i32_little_endian()?;
        self.background_video_scale_factor = buffer.read_f32_little_endian()?;
        self.background_video_path = buffer.read_string_from_cp932(Self::PATH_MAX)?;
        self.is_background_video_enabled = buffer.read_bool()?;
        self.background_image_offset_x = buffer.read_i32_little_endian()?;
        self.background_image_offset_y = buffer.read_i32_little_endian()?;
        self.background_image_scale_factor = buffer.read_f32_little_endian()?;
        self.background_image_path = buffer.read_string_from_cp932(Self::PATH_MAX)?;
        self.is_background_image_enabled = buffer.read_bool()?;
        self.is_information_shown = buffer.read_bool()?;
        self.is_grid_and_axis_shown = buffer.read_bool()?;
        self.is_ground_shadow_shown = buffer.read_bool()?;
        self.preferred_fps = buffer.read_f32_little_endian()?;
        self.screen_capture_mode = buffer.read_i32_little_endian()?;
        self.accessory_index_after_models = buffer.read_i32_little_endian()?;
        self.ground_shadow_brightness = buffer.read_f32_little_endian()?;
        self.is_translucent_ground_shadow_enabled = buffer.read_bool()?;
        if version.is_v2() {
            self.parse_pmm_v2_trailer(buffer)?;
        }
        log::debug!(
            "loaded {} models and {} accessories",
            self.models.len(),
            self.accessories.len()
        );
        Ok(())
    }

    fn parse_pmm_v2_trailer(&mut self, buffer: &mut Buffer) -> Result<(), NanoemError> {
        self.physics_simulation_mode = DocumentPhysicsSimulationMode::from(buffer.read_byte()?);
        self.gravity = DocumentGravity::parse_pmm(buffer)?;
        self.self_shadow = DocumentSelfShadow::parse_pmm(buffer)?;
        self.edge_color = buffer.read_f32_3_little_endian()?;
        self.is_black_background_enabled = buffer.read_bool()?;
        self.camera_look_at_model_index = buffer.read_i32_little_endian()?;
        self.camera_look_at_model_bone_index = buffer.read_i32_little_endian()?;
        for value in self.unknown_matrix.iter_mut() {
            *value = buffer.read_f32_little_endian()?;
        }
        self.is_following_look_at_enabled = buffer.read_bool()?;
        self.unknown_boolean = buffer.read_bool()?;
        self.is_physics_ground_enabled = buffer.read_bool()?;
        self.current_frame_index_in_text_field = buffer.read_u32_little_endian()?;
        if buffer.is_end() {
            log::trace!("no model selection trailer");
            return Ok(());
        }
        for _ in 0..self.models.len() {
            let model_index = buffer.read_byte()? as i32;
            let selection_index = buffer.read_i32_little_endian()?;
            if let Some(model) = self
                .models
                .iter_mut()
                .find(|model| model.object.index == model_index)
            {
                model.selection_index = selection_index;
            }
        }
        Ok(())
    }

    pub fn save_to_buffer(&self, buffer: &mut MutableBuffer) -> Result<(), NanoemError> {
        let version = self.version;
        let signature = match version {
            DocumentVersion::V1 => Self::SIGNATURE_V1,
            DocumentVersion::V2 => Self::SIGNATURE_V2,
        };
        let mut signature_field = [0u8; Self::SIGNATURE_SIZE];
        signature_field[..signature.len()].copy_from_slice(signature);
        buffer.write_byte_array(&signature_field)?;
        buffer.write_i32_little_endian(self.output_width)?;
        buffer.write_i32_little_endian(self.output_height)?;
        buffer.write_i32_little_endian(self.timeline_width)?;
        buffer.write_f32_little_endian(self.camera_fov)?;
        buffer.write_bool(self.editing_cla)?;
        buffer.write_bool(self.is_camera_panel_expanded)?;
        buffer.write_bool(self.is_light_panel_expanded)?;
        buffer.write_bool(self.is_accessory_panel_expanded)?;
        buffer.write_bool(self.is_bone_panel_expanded)?;
        buffer.write_bool(self.is_morph_panel_expanded)?;
        buffer.write_bool(self.is_self_shadow_panel_expanded)?;
        buffer.write_byte(self.select_model_index)?;
        buffer.write_u8_count(self.models.len(), NanoemError::DocumentModelCorrupted)?;
        for model in &self.models {
            model.save_pmm(buffer, version)?;
        }
        self.camera.save_pmm(buffer, version)?;
        self.light.save_pmm(buffer)?;
        buffer.write_byte(self.select_accessory_index)?;
        buffer.write_i32_little_endian(self.horizontal_scroll_for_accessory)?;
        buffer.write_u8_count(self.accessories.len(), NanoemError::DocumentAccessoryCorrupted)?;
        for (i, accessory) in self.accessories.iter().enumerate() {
            let name = self
                .accessory_names
                .get(i)
                .map_or(accessory.name.as_str(), |name| name.as_str());
            buffer.write_fixed_string_cp932(name, Self::ACCESSORY_NAME_MAX)?;
        }
        for accessory in &self.accessories {
            accessory.save_pmm(buffer, version)?;
        }
        buffer.write_u32_little_endian(self.current_frame_index)?;
        buffer.write_i32_little_endian(self.horizontal_scroll)?;
        buffer.write_i32_little_endian(self.horizontal_scroll_thumb)?;
        buffer.write_i32_little_endian(self.editing_mode.into())?;
        buffer.write_byte(self.camera_look_mode)?;
        buffer.write_bool(self.is_loop_enabled)?;
        buffer.write_bool(self.is_begin_frame_index_enabled)?;
        buffer.write_bool(self.is_end_frame_index_enabled)?;
        buffer.write_u32_little_endian(self.begin_frame_index)?;
        buffer.write_u32_little_endian(self.end_frame_index)?;
        buffer.write_bool(self.is_audio_enabled)?;
        buffer.write_fixed_string_cp932(&self.audio_path, Self::PATH_MAX)?;
        buffer.write_i32_little_endian(self.background_video_offset_x)?;
        buffer.write_i32_little_endian(self.background_video_offset_y)?;
        buffer.write_f32_little_endian(self.background_video_scale_factor)?;
        buffer.write_fixed_string_cp932(&self.background_video_path, Self::PATH_MAX)?;
        buffer.write_bool(self.is_background_video_enabled)?;
        buffer.write_i32_little_endian(self.background_image_offset_x)?;
        buffer.write_i32_little_endian(self.background_image_offset_y)?;
        buffer.write_f32_little_endian(self.background_image_scale_factor)?;
        buffer.write_fixed_string_cp932(&self.background_image_path, Self::PATH_MAX)?;
        buffer.write_bool(self.is_background_image_enabled)?;
        buffer.write_bool(self.is_information_shown)?;
        buffer.write_bool(self.is_grid_and_axis_shown)?;
        buffer.write_bool(self.is_ground_shadow_shown)?;
        buffer.write_f32_little_endian(self.preferred_fps)?;
        buffer.write_i32_little_endian(self.screen_capture_mode)?;
        buffer.write_i32_little_endian(self.accessory_index_after_models)?;
        buffer.write_f32_little_endian(self.ground_shadow_brightness)?;
        buffer.write_bool(self.is_translucent_ground_shadow_enabled)?;
        if version.is_v2() {
            buffer.write_byte(self.physics_simulation_mode.into())?;
            self.gravity.save_pmm(buffer)?;
            self.self_shadow.save_pmm(buffer)?;
            buffer.write_f32_3_little_endian(self.edge_color)?;
            buffer.write_bool(self.is_black_background_enabled)?;
            buffer.write_i32_little_endian(self.camera_look_at_model_index)?;
            buffer.write_i32_little_endian(self.camera_look_at_model_bone_index)?;
            for value in &self.unknown_matrix {
                buffer.write_f32_little_endian(*value)?;
            }
            buffer.write_bool(self.is_following_look_at_enabled)?;
            buffer.write_bool(self.unknown_boolean)?;
            buffer.write_bool(self.is_physics_ground_enabled)?;
            buffer.write_u32_little_endian(self.current_frame_index_in_text_field)?;
            for model in &self.models {
                buffer.write_u8_index(model.object.index, NanoemError::DocumentModelCorrupted)?;
                buffer.write_i32_little_endian(model.selection_index)?;
            }
        }
        log::debug!(
            "saved project document version {:?} ({} bytes)",
            version,
            buffer.len()
        );
        Ok(())
    }

    pub fn resolve_model(&self, index: i32) -> Option<&DocumentModel> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.models.get(index))
    }

    pub fn resolve_accessory(&self, index: i32) -> Option<&DocumentAccessory> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.accessories.get(index))
    }

    pub fn find_model_by_name(&self, name: &str) -> Option<&DocumentModel> {
        self.models.iter().find(|model| model.name_ja == name)
    }

    pub fn camera_look_at_model(&self) -> Option<&DocumentModel> {
        self.resolve_model(self.camera_look_at_model_index)
    }

    pub fn camera_look_at_model_bone_name(&self) -> Option<&str> {
        self.camera_look_at_model()
            .and_then(|model| model.bone_name(self.camera_look_at_model_bone_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_signature() {
        let mut bytes = vec![0u8; 64];
        bytes[..10].copy_from_slice(b"Vocaloid M");
        let mut buffer = Buffer::create(bytes);
        assert_eq!(
            Err(NanoemError::InvalidSignature),
            Document::load_from_buffer(&mut buffer, None)
        );
    }

    #[test]
    fn test_editing_mode_from_unknown_value() {
        assert_eq!(DocumentEditingMode::Move, DocumentEditingMode::from(4));
        assert_eq!(DocumentEditingMode::Unknown(42), DocumentEditingMode::from(42));
        assert_eq!(42, i32::from(DocumentEditingMode::from(42)));
        assert_eq!(-1, i32::from(DocumentEditingMode::from(-1)));
        assert_eq!(
            DocumentPhysicsSimulationMode::Unknown(9),
            DocumentPhysicsSimulationMode::from(9)
        );
        assert_eq!(2, u8::from(DocumentPhysicsSimulationMode::EnablePlaying));
    }

    #[test]
    fn test_unknown_modes_survive_round_trip() {
        let document = Document {
            editing_mode: DocumentEditingMode::Unknown(7),
            physics_simulation_mode: DocumentPhysicsSimulationMode::Unknown(5),
            ..Default::default()
        };
        let mut buffer = MutableBuffer::create().unwrap();
        document.save_to_buffer(&mut buffer).unwrap();
        let mut read = buffer.create_buffer_object().unwrap();
        let parsed = Document::load_from_buffer(&mut read, None).unwrap();
        assert_eq!(DocumentEditingMode::Unknown(7), parsed.editing_mode);
        assert_eq!(
            DocumentPhysicsSimulationMode::Unknown(5),
            parsed.physics_simulation_mode
        );
    }

    #[test]
    fn test_empty_v1_document_round_trip() {
        let document = Document {
            version: DocumentVersion::V1,
            ..Default::default()
        };
        let mut buffer = MutableBuffer::create().unwrap();
        document.save_to_buffer(&mut buffer).unwrap();
        let mut read = buffer.create_buffer_object().unwrap();
        let parsed = Document::load_from_buffer(&mut read, None).unwrap();
        assert!(read.is_end());
        assert_eq!(DocumentVersion::V1, parsed.version);
        assert_eq!(document.camera, parsed.camera);
        assert_eq!(DocumentGravity::default(), parsed.gravity);
    }
}
