use std::slice;

use crate::{
    common::{Buffer, NanoemError, F128},
    mutable::common::MutableBuffer,
};

use super::{
    keyframe::{parse_interpolation, search_closest, DocumentBaseKeyframe, DEFAULT_INTERPOLATION},
    object::{DocumentObject, DocumentParent},
    Document, DocumentModel, DocumentVersion,
};

pub const CAMERA_KEYFRAME_INTERPOLATION_TYPE_MAX_ENUM: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentCameraKeyframeInterpolation {
    pub look_at_x: [u8; 4],
    pub look_at_y: [u8; 4],
    pub look_at_z: [u8; 4],
    pub angle: [u8; 4],
    pub fov: [u8; 4],
    pub distance: [u8; 4],
}

impl Default for DocumentCameraKeyframeInterpolation {
    fn default() -> Self {
        Self {
            look_at_x: DEFAULT_INTERPOLATION,
            look_at_y: DEFAULT_INTERPOLATION,
            look_at_z: DEFAULT_INTERPOLATION,
            angle: DEFAULT_INTERPOLATION,
            fov: DEFAULT_INTERPOLATION,
            distance: DEFAULT_INTERPOLATION,
        }
    }
}

impl DocumentCameraKeyframeInterpolation {
    fn parse(buffer: &mut Buffer) -> Result<Self, NanoemError> {
        Ok(Self {
            look_at_x: parse_interpolation(buffer)?,
            look_at_y: parse_interpolation(buffer)?,
            look_at_z: parse_interpolation(buffer)?,
            angle: parse_interpolation(buffer)?,
            fov: parse_interpolation(buffer)?,
            distance: parse_interpolation(buffer)?,
        })
    }

    fn save(&self, buffer: &mut MutableBuffer) -> Result<(), NanoemError> {
        for parameters in [
            &self.look_at_x,
            &self.look_at_y,
            &self.look_at_z,
            &self.angle,
            &self.fov,
            &self.distance,
        ] {
            buffer.write_byte_array(parameters)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentCameraKeyframe {
    pub base: DocumentBaseKeyframe,
    pub distance: f32,
    pub look_at: F128,
    pub angle: F128,
    pub parent_model_index: i32,
    pub parent_model_bone_index: i32,
    pub interpolation: DocumentCameraKeyframeInterpolation,
    pub is_perspective_view: bool,
    pub fov: i32,
}

crate::impl_document_keyframe!(DocumentCameraKeyframe);

impl Default for DocumentCameraKeyframe {
    fn default() -> Self {
        Self {
            base: DocumentBaseKeyframe::default(),
            distance: DocumentCamera::DEFAULT_DISTANCE,
            look_at: DocumentCamera::DEFAULT_LOOK_AT,
            angle: F128::default(),
            parent_model_index: -1,
            parent_model_bone_index: -1,
            interpolation: DocumentCameraKeyframeInterpolation::default(),
            is_perspective_view: true,
            fov: DocumentCamera::DEFAULT_FOV,
        }
    }
}

impl DocumentCameraKeyframe {
    pub(crate) fn parse_pmm(
        buffer: &mut Buffer,
        include_index: bool,
        version: DocumentVersion,
    ) -> Result<Self, NanoemError> {
        Self::parse_fields(buffer, include_index, version)
            .map_err(|e| e.or_corrupted(NanoemError::DocumentCameraKeyframeCorrupted))
    }

    fn parse_fields(
        buffer: &mut Buffer,
        include_index: bool,
        version: DocumentVersion,
    ) -> Result<Self, NanoemError> {
        let base = DocumentBaseKeyframe::parse(buffer, include_index)?;
        let distance = buffer.read_f32_little_endian()?;
        let look_at = buffer.read_f32_3_little_endian()?;
        let angle = buffer.read_f32_3_little_endian()?;
        let (parent_model_index, parent_model_bone_index) = if version.is_v2() {
            (
                buffer.read_i32_little_endian()?,
                buffer.read_i32_little_endian()?,
            )
        } else {
            (-1, -1)
        };
        let mut keyframe = Self {
            base,
            distance,
            look_at,
            angle,
            parent_model_index,
            parent_model_bone_index,
            interpolation: DocumentCameraKeyframeInterpolation::parse(buffer)?,
            // stored inverted, zero means perspective
            is_perspective_view: buffer.read_byte()? == 0,
            fov: buffer.read_i32_little_endian()?,
        };
        keyframe.base.is_selected = buffer.read_bool()?;
        Ok(keyframe)
    }

    pub(crate) fn save_pmm(
        &self,
        buffer: &mut MutableBuffer,
        include_index: bool,
        version: DocumentVersion,
    ) -> Result<(), NanoemError> {
        self.base.save(buffer, include_index)?;
        buffer.write_f32_little_endian(self.distance)?;
        buffer.write_f32_3_little_endian(self.look_at)?;
        buffer.write_f32_3_little_endian(self.angle)?;
        if version.is_v2() {
            buffer.write_i32_little_endian(self.parent_model_index)?;
            buffer.write_i32_little_endian(self.parent_model_bone_index)?;
        }
        self.interpolation.save(buffer)?;
        buffer.write_bool(!self.is_perspective_view)?;
        buffer.write_i32_little_endian(self.fov)?;
        buffer.write_bool(self.base.is_selected)
    }

    pub fn parent_model<'a>(&self, document: &'a Document) -> Option<&'a DocumentModel> {
        document.resolve_model(self.parent_model_index)
    }

    pub fn parent_model_bone_name<'a>(&self, document: &'a Document) -> Option<&'a str> {
        self.parent_model(document)
            .and_then(|model| model.bone_name(self.parent_model_bone_index))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentCamera {
    pub object: DocumentObject,
    pub initial_camera_keyframe: DocumentCameraKeyframe,
    pub camera_keyframes: Vec<DocumentCameraKeyframe>,
    pub look_at: F128,
    pub position: F128,
    pub angle: F128,
    pub is_perspective: bool,
}

crate::impl_document_entity!(DocumentCamera);

impl Default for DocumentCamera {
    fn default() -> Self {
        Self {
            object: DocumentObject::with_index(DocumentParent::Document, 0),
            initial_camera_keyframe: DocumentCameraKeyframe::default(),
            camera_keyframes: vec![],
            look_at: Self::DEFAULT_LOOK_AT,
            position: F128::from_vec3(0.0, 10.0, Self::DEFAULT_DISTANCE),
            angle: F128::default(),
            is_perspective: true,
        }
    }
}

impl DocumentCamera {
    pub const DEFAULT_FOV: i32 = 30;
    pub const DEFAULT_DISTANCE: f32 = -45.0f32;
    pub const DEFAULT_LOOK_AT: F128 = F128::from_vec3(0.0, 10.0, 0.0);

    pub(crate) fn parse_pmm(
        buffer: &mut Buffer,
        version: DocumentVersion,
    ) -> Result<Self, NanoemError> {
        Self::parse_fields(buffer, version)
            .map_err(|e| e.or_corrupted(NanoemError::DocumentCameraCorrupted))
    }

    fn parse_fields(buffer: &mut Buffer, version: DocumentVersion) -> Result<Self, NanoemError> {
        let initial_camera_keyframe = DocumentCameraKeyframe::parse_pmm(buffer, false, version)?;
        let num_keyframes = buffer.read_count()?;
        let mut camera_keyframes = Vec::with_capacity(num_keyframes);
        for _ in 0..num_keyframes {
            camera_keyframes.push(DocumentCameraKeyframe::parse_pmm(buffer, true, version)?);
        }
        log::trace!("camera with {} keyframes", camera_keyframes.len());
        Ok(Self {
            object: DocumentObject::with_index(DocumentParent::Document, 0),
            initial_camera_keyframe,
            camera_keyframes,
            look_at: buffer.read_f32_3_little_endian()?,
            position: buffer.read_f32_3_little_endian()?,
            angle: buffer.read_f32_3_little_endian()?,
            is_perspective: buffer.read_bool()?,
        })
    }

    pub(crate) fn save_pmm(
        &self,
        buffer: &mut MutableBuffer,
        version: DocumentVersion,
    ) -> Result<(), NanoemError> {
        self.initial_camera_keyframe
            .save_pmm(buffer, false, version)?;
        buffer.write_i32_count(self.camera_keyframes.len(), NanoemError::DocumentCameraCorrupted)?;
        for keyframe in &self.camera_keyframes {
            keyframe.save_pmm(buffer, true, version)?;
        }
        buffer.write_f32_3_little_endian(self.look_at)?;
        buffer.write_f32_3_little_endian(self.position)?;
        buffer.write_f32_3_little_endian(self.angle)?;
        buffer.write_bool(self.is_perspective)
    }

    pub fn all_camera_keyframes(&self) -> impl Iterator<Item = &DocumentCameraKeyframe> {
        slice::from_ref(&self.initial_camera_keyframe)
            .iter()
            .chain(self.camera_keyframes.iter())
    }

    pub fn find_camera_keyframe(&self, frame_index: u32) -> Option<&DocumentCameraKeyframe> {
        self.all_camera_keyframes()
            .find(|keyframe| keyframe.base.frame_index == frame_index)
    }

    pub fn search_closest_camera_keyframes(
        &self,
        frame_index: u32,
    ) -> (Option<&DocumentCameraKeyframe>, Option<&DocumentCameraKeyframe>) {
        search_closest(
            slice::from_ref(&self.initial_camera_keyframe),
            &self.camera_keyframes,
            frame_index,
            None,
        )
    }
}

#[test]
fn test_camera_keyframe_perspective_is_inverted_on_disk() {
    let keyframe = DocumentCameraKeyframe::default();
    let mut buffer = MutableBuffer::create().unwrap();
    keyframe
        .save_pmm(&mut buffer, false, DocumentVersion::V1)
        .unwrap();
    let bytes = buffer.as_bytes();
    // base(12) distance(4) look_at(12) angle(12) interpolation(24)
    assert_eq!(0u8, bytes[64]);
    let mut read = buffer.create_buffer_object().unwrap();
    let parsed = DocumentCameraKeyframe::parse_pmm(&mut read, false, DocumentVersion::V1).unwrap();
    assert!(parsed.is_perspective_view);
    assert_eq!(DocumentCamera::DEFAULT_FOV, parsed.fov);
    assert!(read.is_end());
}

#[test]
fn test_camera_keyframe_truncated_is_corrupted() {
    let mut buffer = Buffer::create(vec![0u8; 20]);
    assert_eq!(
        Err(NanoemError::DocumentCameraKeyframeCorrupted),
        DocumentCameraKeyframe::parse_pmm(&mut buffer, true, DocumentVersion::V2)
    );
}
