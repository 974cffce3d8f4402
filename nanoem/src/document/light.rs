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
pub struct DocumentLightKeyframe {
    pub base: DocumentBaseKeyframe,
    pub color: F128,
    pub direction: F128,
}

crate::impl_document_keyframe!(DocumentLightKeyframe);

impl Default for DocumentLightKeyframe {
    fn default() -> Self {
        Self {
            base: DocumentBaseKeyframe::default(),
            color: DocumentLight::DEFAULT_COLOR,
            direction: DocumentLight::DEFAULT_DIRECTION,
        }
    }
}

impl DocumentLightKeyframe {
    pub(crate) fn parse_pmm(buffer: &mut Buffer, include_index: bool) -> Result<Self, NanoemError> {
        Self::parse_fields(buffer, include_index)
            .map_err(|e| e.or_corrupted(NanoemError::DocumentLightKeyframeCorrupted))
    }

    fn parse_fields(buffer: &mut Buffer, include_index: bool) -> Result<Self, NanoemError> {
        let mut keyframe = Self {
            base: DocumentBaseKeyframe::parse(buffer, include_index)?,
            color: buffer.read_f32_3_little_endian()?,
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
        buffer.write_f32_3_little_endian(self.color)?;
        buffer.write_f32_3_little_endian(self.direction)?;
        buffer.write_bool(self.base.is_selected)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLight {
    pub object: DocumentObject,
    pub initial_light_keyframe: DocumentLightKeyframe,
    pub light_keyframes: Vec<DocumentLightKeyframe>,
    pub color: F128,
    pub direction: F128,
}

crate::impl_document_entity!(DocumentLight);

impl Default for DocumentLight {
    fn default() -> Self {
        Self {
            object: DocumentObject::with_index(DocumentParent::Document, 0),
            initial_light_keyframe: DocumentLightKeyframe::default(),
            light_keyframes: vec![],
            color: Self::DEFAULT_COLOR,
            direction: Self::DEFAULT_DIRECTION,
        }
    }
}

impl DocumentLight {
    pub const DEFAULT_COLOR: F128 = F128::from_vec3(0.6, 0.6, 0.6);
    pub const DEFAULT_DIRECTION: F128 = F128::from_vec3(-0.5, -1.0, 0.5);

    pub(crate) fn parse_pmm(buffer: &mut Buffer) -> Result<Self, NanoemError> {
        Self::parse_fields(buffer).map_err(|e| e.or_corrupted(NanoemError::DocumentLightCorrupted))
    }

    fn parse_fields(buffer: &mut Buffer) -> Result<Self, NanoemError> {
        let initial_light_keyframe = DocumentLightKeyframe::parse_pmm(buffer, false)?;
        let num_keyframes = buffer.read_count()?;
        let mut light_keyframes = Vec::with_capacity(num_keyframes);
        for _ in 0..num_keyframes {
            light_keyframes.push(DocumentLightKeyframe::parse_pmm(buffer, true)?);
        }
        log::trace!("light with {} keyframes", light_keyframes.len());
        Ok(Self {
            object: DocumentObject::with_index(DocumentParent::Document, 0),
            initial_light_keyframe,
            light_keyframes,
            color: buffer.read_f32_3_little_endian()?,
            direction: buffer.read_f32_3_little_endian()?,
        })
    }

    pub(crate) fn save_pmm(&self, buffer: &mut MutableBuffer) -> Result<(), NanoemError> {
        self.initial_light_keyframe.save_pmm(buffer, false)?;
        buffer.write_i32_count(self.light_keyframes.len(), NanoemError::DocumentLightCorrupted)?;
        for keyframe in &self.light_keyframes {
            keyframe.save_pmm(buffer, true)?;
        }
        buffer.write_f32_3_little_endian(self.color)?;
        buffer.write_f32_3_little_endian(self.direction)
    }

    pub fn all_light_keyframes(&self) -> impl Iterator<Item = &DocumentLightKeyframe> {
        slice::from_ref(&self.initial_light_keyframe)
            .iter()
            .chain(self.light_keyframes.iter())
    }

    pub fn find_light_keyframe(&self, frame_index: u32) -> Option<&DocumentLightKeyframe> {
        self.all_light_keyframes()
            .find(|keyframe| keyframe.base.frame_index == frame_index)
    }

    pub fn search_closest_light_keyframes(
        &self,
        frame_index: u32,
    ) -> (Option<&DocumentLightKeyframe>, Option<&DocumentLightKeyframe>) {
        search_closest(
            slice::from_ref(&self.initial_light_keyframe),
            &self.light_keyframes,
            frame_index,
            None,
        )
    }
}
