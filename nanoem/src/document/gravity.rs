use std::slice;

use crate::{
    common::{Buffer, NanoemError, F128},
    mutable::common::MutableBuffer,
};

use super::{
    keyframe::{search_closest, DocumentBaseKeyframe},
    object::{DocumentObject, DocumentParent},
};

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentGravityKeyframe {
    pub base: DocumentBaseKeyframe,
    pub is_noise_enabled: bool,
    pub noise: i32,
    pub acceleration: f32,
    pub direction: F128,
}

crate::impl_document_keyframe!(DocumentGravityKeyframe);

impl Default for DocumentGravityKeyframe {
    fn default() -> Self {
        Self {
            base: DocumentBaseKeyframe::default(),
            is_noise_enabled: false,
            noise: DocumentGravity::DEFAULT_NOISE,
            acceleration: DocumentGravity::DEFAULT_ACCELERATION,
            direction: DocumentGravity::DEFAULT_DIRECTION,
        }
    }
}

impl DocumentGravityKeyframe {
    pub(crate) fn parse_pmm(buffer: &mut Buffer, include_index: bool) -> Result<Self, NanoemError> {
        Self::parse_fields(buffer, include_index)
            .map_err(|e| e.or_corrupted(NanoemError::DocumentGravityKeyframeCorrupted))
    }

    fn parse_fields(buffer: &mut Buffer, include_index: bool) -> Result<Self, NanoemError> {
        let mut keyframe = Self {
            base: DocumentBaseKeyframe::parse(buffer, include_index)?,
            is_noise_enabled: buffer.read_bool()?,
            noise: buffer.read_i32_little_endian()?,
            acceleration: buffer.read_f32_little_endian()?,
            direction: buffer.read_f32_3_little_endian()?,
        };
        keyframe.base.is_selected = buffer.read_bool()?;
        Ok(keyframe)
    }

    pub(crate) fn save_pmm(
        &self,
        buffer: &mut MutableBuffer,
        include_index: bool,
    ) -> Result<(), NanoemError> {
        self.base.save(buffer, include_index)?;
        buffer.write_bool(self.is_noise_enabled)?;
        buffer.write_i32_little_endian(self.noise)?;
        buffer.write_f32_little_endian(self.acceleration)?;
        buffer.write_f32_3_little_endian(self.direction)?;
        buffer.write_bool(self.base.is_selected)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentGravity {
    pub object: DocumentObject,
    pub acceleration: f32,
    pub noise: i32,
    pub direction: F128,
    pub is_noise_enabled: bool,
    pub initial_gravity_keyframe: DocumentGravityKeyframe,
    pub gravity_keyframes: Vec<DocumentGravityKeyframe>,
}

crate::impl_document_entity!(DocumentGravity);

impl Default for DocumentGravity {
    fn default() -> Self {
        Self {
            object: DocumentObject::with_index(DocumentParent::Document, 0),
            acceleration: Self::DEFAULT_ACCELERATION,
            noise: Self::DEFAULT_NOISE,
            direction: Self::DEFAULT_DIRECTION,
            is_noise_enabled: false,
            initial_gravity_keyframe: DocumentGravityKeyframe::default(),
            gravity_keyframes: vec![],
        }
    }
}

impl DocumentGravity {
    pub const DEFAULT_ACCELERATION: f32 = 9.8f32;
    pub const DEFAULT_NOISE: i32 = 10;
    pub const DEFAULT_DIRECTION: F128 = F128::from_vec3(0.0, -1.0, 0.0);

    pub(crate) fn parse_pmm(buffer: &mut Buffer) -> Result<Self, NanoemError> {
        Self::parse_fields(buffer)
            .map_err(|e| e.or_corrupted(NanoemError::DocumentGravityCorrupted))
    }

    fn parse_fields(buffer: &mut Buffer) -> Result<Self, NanoemError> {
        let acceleration = buffer.read_f32_little_endian()?;
        let noise = buffer.read_i32_little_endian()?;
        let direction = buffer.read_f32_3_little_endian()?;
        let is_noise_enabled = buffer.read_bool()?;
        let initial_gravity_keyframe = DocumentGravityKeyframe::parse_pmm(buffer, false)?;
        let num_keyframes = buffer.read_count()?;
        let mut gravity_keyframes = Vec::with_capacity(num_keyframes);
        for _ in 0..num_keyframes {
            gravity_keyframes.push(DocumentGravityKeyframe::parse_pmm(buffer, true)?);
        }
        log::trace!("gravity with {} keyframes", gravity_keyframes.len());
        Ok(Self {
            object: DocumentObject::with_index(DocumentParent::Document, 0),
            acceleration,
            noise,
            direction,
            is_noise_enabled,
            initial_gravity_keyframe,
            gravity_keyframes,
        })
    }

    pub(crate) fn save_pmm(&self, buffer: &mut MutableBuffer) -> Result<(), NanoemError> {
        buffer.write_f32_little_endian(self.acceleration)?;
        buffer.write_i32_little_endian(self.noise)?;
        buffer.write_f32_3_little_endian(self.direction)?;
        buffer.write_bool(self.is_noise_enabled)?;
        self.initial_gravity_keyframe.save_pmm(buffer, false)?;
        buffer.write_i32_count(
            self.gravity_keyframes.len(),
            NanoemError::DocumentGravityCorrupted,
        )?;
        for keyframe in &self.gravity_keyframes {
            keyframe.save_pmm(buffer, true)?;
        }
        Ok(())
    }

    pub fn all_gravity_keyframes(&self) -> impl Iterator<Item = &DocumentGravityKeyframe> {
        slice::from_ref(&self.initial_gravity_keyframe)
            .iter()
            .chain(self.gravity_keyframes.iter())
    }

    pub fn find_gravity_keyframe(&self, frame_index: u32) -> Option<&DocumentGravityKeyframe> {
        self.all_gravity_keyframes()
            .find(|keyframe| keyframe.base.frame_index == frame_index)
    }

    pub fn search_closest_gravity_keyframes(
        &self,
        frame_index: u32,
    ) -> (
        Option<&DocumentGravityKeyframe>,
        Option<&DocumentGravityKeyframe>,
    ) {
        search_closest(
            slice::from_ref(&self.initial_gravity_keyframe),
            &self.gravity_keyframes,
            frame_index,
            None,
        )
    }
}
