use std::slice;

use crate::{
    common::{Buffer, NanoemError, F128},
    mutable::common::MutableBuffer,
};

use super::{
    keyframe::{search_closest, DocumentBaseKeyframe},
    object::{DocumentObject, DocumentParent},
    Document, DocumentModel, DocumentVersion,
};

pub fn pack_opacity_and_visible(opacity: f32, visible: bool) -> u8 {
    let transparency = ((1.0f32 - opacity) * 100.0f32).round().clamp(0.0, 127.0) as u8;
    (visible as u8) | (transparency << 1)
}

pub fn unpack_opacity_and_visible(value: u8) -> (f32, bool) {
    let opacity = (100 - ((value & 0xfe) >> 1) as i32) as f32 * 0.01f32;
    (opacity, (value & 0x1) != 0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentAccessoryKeyframe {
    pub base: DocumentBaseKeyframe,
    pub opacity: f32,
    pub visible: bool,
    pub parent_model_index: i32,
    pub parent_model_bone_index: i32,
    pub translation: F128,
    pub orientation: F128,
    pub scale_factor: f32,
    pub is_shadow_enabled: bool,
}

crate::impl_document_keyframe!(DocumentAccessoryKeyframe);

impl Default for DocumentAccessoryKeyframe {
    fn default() -> Self {
        Self {
            base: DocumentBaseKeyframe::default(),
            opacity: 1.0f32,
            visible: true,
            parent_model_index: -1,
            parent_model_bone_index: -1,
            translation: F128::default(),
            orientation: F128::default(),
            scale_factor: 1.0f32,
            is_shadow_enabled: true,
        }
    }
}

impl DocumentAccessoryKeyframe {
    pub(crate) fn parse_pmm(
        buffer: &mut Buffer,
        include_index: bool,
        version: DocumentVersion,
    ) -> Result<Self, NanoemError> {
        Self::parse_fields(buffer, include_index, version)
            .map_err(|e| e.or_corrupted(NanoemError::DocumentAccessoryKeyframeCorrupted))
    }

    fn parse_fields(
        buffer: &mut Buffer,
        include_index: bool,
        version: DocumentVersion,
    ) -> Result<Self, NanoemError> {
        let base = DocumentBaseKeyframe::parse(buffer, include_index)?;
        let (opacity, visible) = unpack_opacity_and_visible(buffer.read_byte()?);
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
            opacity,
            visible,
            parent_model_index,
            parent_model_bone_index,
            translation: buffer.read_f32_3_little_endian()?,
            orientation: buffer.read_f32_3_little_endian()?,
            scale_factor: buffer.read_f32_little_endian()?,
            is_shadow_enabled: buffer.read_bool()?,
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
        buffer.write_byte(pack_opacity_and_visible(self.opacity, self.visible))?;
        if version.is_v2() {
            buffer.write_i32_little_endian(self.parent_model_index)?;
            buffer.write_i32_little_endian(self.parent_model_bone_index)?;
        }
        buffer.write_f32_3_little_endian(self.translation)?;
        buffer.write_f32_3_little_endian(self.orientation)?;
        buffer.write_f32_little_endian(self.scale_factor)?;
        buffer.write_bool(self.is_shadow_enabled)?;
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
pub struct DocumentAccessory {
    pub object: DocumentObject,
    pub name: String,
    pub path: String,
    pub draw_order_index: u8,
    pub initial_accessory_keyframe: DocumentAccessoryKeyframe,
    pub accessory_keyframes: Vec<DocumentAccessoryKeyframe>,
    pub opacity: f32,
    pub visible: bool,
    pub parent_model_index: i32,
    pub parent_model_bone_index: i32,
    pub translation: F128,
    pub orientation: F128,
    pub scale_factor: f32,
    pub is_shadow_enabled: bool,
    pub is_add_blend_enabled: bool,
}

crate::impl_document_entity!(DocumentAccessory);

impl Default for DocumentAccessory {
    fn default() -> Self {
        Self {
            object: DocumentObject::new(DocumentParent::Document),
            name: String::new(),
            path: String::new(),
            draw_order_index: 0,
            initial_accessory_keyframe: DocumentAccessoryKeyframe::default(),
            accessory_keyframes: vec![],
            opacity: 1.0f32,
            visible: true,
            parent_model_index: -1,
            parent_model_bone_index: -1,
            translation: F128::default(),
            orientation: F128::default(),
            scale_factor: 1.0f32,
            is_shadow_enabled: true,
            is_add_blend_enabled: false,
        }
    }
}

impl DocumentAccessory {
    pub(crate) fn parse_pmm(
        buffer: &mut Buffer,
        version: DocumentVersion,
    ) -> Result<Self, NanoemError> {
        Self::parse_fields(buffer, version)
            .map_err(|e| e.or_corrupted(NanoemError::DocumentAccessoryCorrupted))
    }

    fn parse_fields(buffer: &mut Buffer, version: DocumentVersion) -> Result<Self, NanoemError> {
        let index = buffer.read_byte()? as i32;
        let name = buffer.read_string_from_cp932(Document::ACCESSORY_NAME_MAX)?;
        let path = buffer.read_string_from_cp932(Document::PATH_MAX)?;
        let draw_order_index = buffer.read_byte()?;
        let initial_accessory_keyframe =
            DocumentAccessoryKeyframe::parse_pmm(buffer, false, version)?;
        let num_keyframes = buffer.read_count()?;
        let mut accessory_keyframes = Vec::with_capacity(num_keyframes);
        for _ in 0..num_keyframes {
            accessory_keyframes.push(DocumentAccessoryKeyframe::parse_pmm(
                buffer, true, version,
            )?);
        }
        let (opacity, visible) = unpack_opacity_and_visible(buffer.read_byte()?);
        let accessory = Self {
            object: DocumentObject::with_index(DocumentParent::Document, index),
            name,
            path,
            draw_order_index,
            initial_accessory_keyframe,
            accessory_keyframes,
            opacity,
            visible,
            parent_model_index: buffer.read_i32_little_endian()?,
            parent_model_bone_index: buffer.read_i32_little_endian()?,
            translation: buffer.read_f32_3_little_endian()?,
            orientation: buffer.read_f32_3_little_endian()?,
            scale_factor: buffer.read_f32_little_endian()?,
            is_shadow_enabled: buffer.read_bool()?,
            is_add_blend_enabled: buffer.read_bool()?,
        };
        log::trace!(
            "accessory {} \"{}\" with {} keyframes",
            index,
            accessory.name,
            accessory.accessory_keyframes.len()
        );
        Ok(accessory)
    }

    pub(crate) fn save_pmm(
        &self,
        buffer: &mut MutableBuffer,
        version: DocumentVersion,
    ) -> Result<(), NanoemError> {
        buffer.write_u8_index(self.object.index, NanoemError::DocumentAccessoryCorrupted)?;
        buffer.write_fixed_string_cp932(&self.name, Document::ACCESSORY_NAME_MAX)?;
        buffer.write_fixed_string_cp932(&self.path, Document::PATH_MAX)?;
        buffer.write_byte(self.draw_order_index)?;
        self.initial_accessory_keyframe
            .save_pmm(buffer, false, version)?;
        buffer.write_i32_count(
            self.accessory_keyframes.len(),
            NanoemError::DocumentAccessoryCorrupted,
        )?;
        for keyframe in &self.accessory_keyframes {
            keyframe.save_pmm(buffer, true, version)?;
        }
        buffer.write_byte(pack_opacity_and_visible(self.opacity, self.visible))?;
        buffer.write_i32_little_endian(self.parent_model_index)?;
        buffer.write_i32_little_endian(self.parent_model_bone_index)?;
        buffer.write_f32_3_little_endian(self.translation)?;
        buffer.write_f32_3_little_endian(self.orientation)?;
        buffer.write_f32_little_endian(self.scale_factor)?;
        buffer.write_bool(self.is_shadow_enabled)?;
        buffer.write_bool(self.is_add_blend_enabled)
    }

    pub fn all_accessory_keyframes(&self) -> impl Iterator<Item = &DocumentAccessoryKeyframe> {
        slice::from_ref(&self.initial_accessory_keyframe)
            .iter()
            .chain(self.accessory_keyframes.iter())
    }

    pub fn find_accessory_keyframe(&self, frame_index: u32) -> Option<&DocumentAccessoryKeyframe> {
        self.all_accessory_keyframes()
            .find(|keyframe| keyframe.base.frame_index == frame_index)
    }

    pub fn search_closest_accessory_keyframes(
        &self,
        frame_index: u32,
    ) -> (
        Option<&DocumentAccessoryKeyframe>,
        Option<&DocumentAccessoryKeyframe>,
    ) {
        search_closest(
            slice::from_ref(&self.initial_accessory_keyframe),
            &self.accessory_keyframes,
            frame_index,
            None,
        )
    }

    pub fn parent_model<'a>(&self, document: &'a Document) -> Option<&'a DocumentModel> {
        document.resolve_model(self.parent_model_index)
    }

    pub fn parent_model_bone_name<'a>(&self, document: &'a Document) -> Option<&'a str> {
        self.parent_model(document)
            .and_then(|model| model.bone_name(self.parent_model_bone_index))
    }
}

#[test]
fn test_opacity_packing() {
    for opacity in [0.0f32, 0.5f32, 1.0f32] {
        for visible in [true, false] {
            let (unpacked_opacity, unpacked_visible) =
                unpack_opacity_and_visible(pack_opacity_and_visible(opacity, visible));
            assert_eq!(visible, unpacked_visible);
            assert!((unpacked_opacity - opacity).abs() <= 0.01f32);
        }
    }
}

#[test]
fn test_opacity_packing_layout() {
    assert_eq!(1u8, pack_opacity_and_visible(1.0, true));
    assert_eq!(100u8, pack_opacity_and_visible(0.5, false));
    assert_eq!(201u8, pack_opacity_and_visible(0.0, true));
    assert_eq!(0u8, pack_opacity_and_visible(1.5, false));
    assert_eq!(254u8, pack_opacity_and_visible(-1.0, false));
}

#[test]
fn test_opacity_packing_is_stable_for_every_stored_byte() {
    for transparency in 0u8..=100 {
        for visible in [0u8, 1u8] {
            let value = (transparency << 1) | visible;
            let (opacity, visible) = unpack_opacity_and_visible(value);
            assert_eq!(value, pack_opacity_and_visible(opacity, visible), "{}", value);
        }
    }
}
