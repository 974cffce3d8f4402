use std::slice;

use crate::{
    common::{Buffer, NanoemError},
    mutable::common::MutableBuffer,
};

use super::{
    keyframe::{search_closest, DocumentBaseKeyframe},
    object::{DocumentObject, DocumentParent},
};

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSelfShadowKeyframe {
    pub base: DocumentBaseKeyframe,
    pub mode: u8,
    pub distance: f32,
}

crate::impl_document_keyframe!(DocumentSelfShadowKeyframe);

impl Default for DocumentSelfShadowKeyframe {
    fn default() -> Self {
        Self {
            base: DocumentBaseKeyframe::default(),
            mode: DocumentSelfShadow::DEFAULT_MODE,
            distance: DocumentSelfShadow::DEFAULT_DISTANCE,
        }
    }
}

impl DocumentSelfShadowKeyframe {
    pub(crate) fn parse_pmm(buffer: &mut Buffer, include_index: bool) -> Result<Self, NanoemError> {
        Self::parse_fields(buffer, include_index)
            .map_err(|e| e.or_corrupted(NanoemError::DocumentSelfShadowKeyframeCorrupted))
    }

    fn parse_fields(buffer: &mut Buffer, include_index: bool) -> Result<Self, NanoemError> {
        let mut keyframe = Self {
            base: DocumentBaseKeyframe::parse(buffer, include_index)?,
            mode: buffer.read_byte()?,
            distance: buffer.read_f32_little_endian()?,
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
        buffer.write_byte(self.mode)?;
        buffer.write_f32_little_endian(self.distance)?;
        buffer.write_bool(self.base.is_selected)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSelfShadow {
    pub object: DocumentObject,
    pub initial_self_shadow_keyframe: DocumentSelfShadowKeyframe,
    pub self_shadow_keyframes: Vec<DocumentSelfShadowKeyframe>,
    pub is_self_shadow_enabled: bool,
    pub distance: f32,
}

crate::impl_document_entity!(DocumentSelfShadow);

impl Default for DocumentSelfShadow {
    fn default() -> Self {
        Self {
            object: DocumentObject::with_index(DocumentParent::Document, 0),
            initial_self_shadow_keyframe: DocumentSelfShadowKeyframe::default(),
            self_shadow_keyframes: vec![],
            is_self_shadow_enabled: true,
            distance: Self::DEFAULT_DISTANCE,
        }
    }
}

impl DocumentSelfShadow {
    pub const DEFAULT_DISTANCE: f32 = 0.01125f32;
    pub const DEFAULT_MODE: u8 = 1;

    pub(crate) fn parse_pmm(buffer: &mut Buffer) -> Result<Self, NanoemError> {
        Self::parse_fields(buffer)
            .map_err(|e| e.or_corrupted(NanoemError::DocumentSelfShadowCorrupted))
    }

    fn parse_fields(buffer: &mut Buffer) -> Result<Self, NanoemError> {
        let is_self_shadow_enabled = buffer.read_bool()?;
        let distance = buffer.read_f32_little_endian()?;
        let initial_self_shadow_keyframe = DocumentSelfShadowKeyframe::parse_pmm(buffer, false)?;
        let num_keyframes = buffer.read_count()?;
        let mut self_shadow_keyframes = Vec::with_capacity(num_keyframes);
        for _ in 0..num_keyframes {
            self_shadow_keyframes.push(DocumentSelfShadowKeyframe::parse_pmm(buffer, true)?);
        }
        log::trace!("self shadow with {} keyframes", self_shadow_keyframes.len());
        Ok(Self {
            object: DocumentObject::with_index(DocumentParent::Document, 0),
            initial_self_shadow_keyframe,
            self_shadow_keyframes,
            is_self_shadow_enabled,
            distance,
        })
    }

    pub(crate) fn save_pmm(&self, buffer: &mut MutableBuffer) -> Result<(), NanoemError> {
        buffer.write_bool(self.is_self_shadow_enabled)?;
        buffer.write_f32_little_endian(self.distance)?;
        self.initial_self_shadow_keyframe.save_pmm(buffer, false)?;
        buffer.write_i32_count(
            self.self_shadow_keyframes.len(),
            NanoemError::DocumentSelfShadowCorrupted,
        )?;
        for keyframe in &self.self_shadow_keyframes {
            keyframe.save_pmm(buffer, true)?;
        }
        Ok(())
    }

    pub fn all_self_shadow_keyframes(&self) -> impl Iterator<Item = &DocumentSelfShadowKeyframe> {
        slice::from_ref(&self.initial_self_shadow_keyframe)
            .iter()
            .chain(self.self_shadow_keyframes.iter())
    }

    pub fn find_self_shadow_keyframe(
        &self,
        frame_index: u32,
    ) -> Option<&DocumentSelfShadowKeyframe> {
        self.all_self_shadow_keyframes()
            .find(|keyframe| keyframe.base.frame_index == frame_index)
    }

    pub fn search_closest_self_shadow_keyframes(
        &self,
        frame_index: u32,
    ) -> (
        Option<&DocumentSelfShadowKeyframe>,
        Option<&DocumentSelfShadowKeyframe>,
    ) {
        search_closest(
            slice::from_ref(&self.initial_self_shadow_keyframe),
            &self.self_shadow_keyframes,
            frame_index,
            None,
        )
    }
}
