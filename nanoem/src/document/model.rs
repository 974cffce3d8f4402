use std::slice;

use crate::{
    common::{Buffer, NanoemError, F128},
    mutable::common::MutableBuffer,
};

use super::{
    keyframe::{
        parse_interpolation, resolve_ordinal, search_closest, DocumentBaseKeyframe,
        DEFAULT_INTERPOLATION,
    },
    object::{DocumentObject, DocumentParent},
    Document, DocumentVersion, ExternalModel, ParseModelCallback,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageType {
    Japanese,
    English,
}

pub const BONE_KEYFRAME_INTERPOLATION_TYPE_MAX_ENUM: usize = 4;
pub const SELECTED_MORPH_CATEGORY_MAX_ENUM: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentModelBoneKeyframeInterpolation {
    pub translation_x: [u8; 4],
    pub translation_y: [u8; 4],
    pub translation_z: [u8; 4],
    pub orientation: [u8; 4],
}

impl Default for DocumentModelBoneKeyframeInterpolation {
    fn default() -> Self {
        Self {
            translation_x: DEFAULT_INTERPOLATION,
            translation_y: DEFAULT_INTERPOLATION,
            translation_z: DEFAULT_INTERPOLATION,
            orientation: DEFAULT_INTERPOLATION,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentModelBoneKeyframe {
    pub base: DocumentBaseKeyframe,
    pub interpolation: DocumentModelBoneKeyframeInterpolation,
    pub translation: F128,
    pub orientation: F128,
    pub is_physics_simulation_disabled: bool,
}

crate::impl_document_keyframe!(DocumentModelBoneKeyframe);

impl Default for DocumentModelBoneKeyframe {
    fn default() -> Self {
        Self {
            base: DocumentBaseKeyframe::default(),
            interpolation: DocumentModelBoneKeyframeInterpolation::default(),
            translation: F128::default(),
            orientation: F128::new(0.0, 0.0, 0.0, 1.0),
            is_physics_simulation_disabled: false,
        }
    }
}

impl DocumentModelBoneKeyframe {
    fn parse_pmm(buffer: &mut Buffer, include_index: bool) -> Result<Self, NanoemError> {
        Self::parse_fields(buffer, include_index)
            .map_err(|e| e.or_corrupted(NanoemError::DocumentModelBoneKeyframeCorrupted))
    }

    fn parse_fields(buffer: &mut Buffer, include_index: bool) -> Result<Self, NanoemError> {
        let base = DocumentBaseKeyframe::parse(buffer, include_index)?;
        let interpolation = DocumentModelBoneKeyframeInterpolation {
            translation_x: parse_interpolation(buffer)?,
            translation_y: parse_interpolation(buffer)?,
            translation_z: parse_interpolation(buffer)?,
            orientation: parse_interpolation(buffer)?,
        };
        let mut keyframe = Self {
            base,
            interpolation,
            translation: buffer.read_f32_3_little_endian()?,
            orientation: buffer.read_f32_4_little_endian()?,
            is_physics_simulation_disabled: buffer.read_bool()?,
        };
        keyframe.base.is_selected = buffer.read_bool()?;
        Ok(keyframe)
    }

    fn save_pmm(&self, buffer: &mut MutableBuffer, include_index: bool) -> Result<(), NanoemError> {
        self.base.save(buffer, include_index)?;
        buffer.write_byte_array(&self.interpolation.translation_x)?;
        buffer.write_byte_array(&self.interpolation.translation_y)?;
        buffer.write_byte_array(&self.interpolation.translation_z)?;
        buffer.write_byte_array(&self.interpolation.orientation)?;
        buffer.write_f32_3_little_endian(self.translation)?;
        buffer.write_f32_4_little_endian(self.orientation)?;
        buffer.write_bool(self.is_physics_simulation_disabled)?;
        buffer.write_bool(self.base.is_selected)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentModelMorphKeyframe {
    pub base: DocumentBaseKeyframe,
    pub weight: f32,
}

crate::impl_document_keyframe!(DocumentModelMorphKeyframe);

impl DocumentModelMorphKeyframe {
    fn parse_pmm(buffer: &mut Buffer, include_index: bool) -> Result<Self, NanoemError> {
        let parse = |buffer: &mut Buffer| -> Result<Self, NanoemError> {
            let mut keyframe = Self {
                base: DocumentBaseKeyframe::parse(buffer, include_index)?,
                weight: buffer.read_f32_little_endian()?,
            };
            keyframe.base.is_selected = buffer.read_bool()?;
            Ok(keyframe)
        };
        parse(buffer).map_err(|e| e.or_corrupted(NanoemError::DocumentModelMorphKeyframeCorrupted))
    }

    fn save_pmm(&self, buffer: &mut MutableBuffer, include_index: bool) -> Result<(), NanoemError> {
        self.base.save(buffer, include_index)?;
        buffer.write_f32_little_endian(self.weight)?;
        buffer.write_bool(self.base.is_selected)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOutsideParent {
    pub object: DocumentObject,
    pub model_index: i32,
    pub bone_index: i32,
}

crate::impl_document_entity!(DocumentOutsideParent);

impl Default for DocumentOutsideParent {
    fn default() -> Self {
        Self {
            object: DocumentObject::new(DocumentParent::Model),
            model_index: -1,
            bone_index: -1,
        }
    }
}

impl DocumentOutsideParent {
    fn parse_pmm(buffer: &mut Buffer, index: usize) -> Result<Self, NanoemError> {
        let parse = |buffer: &mut Buffer| -> Result<Self, NanoemError> {
            Ok(Self {
                object: DocumentObject::with_index(DocumentParent::Model, index as i32),
                model_index: buffer.read_i32_little_endian()?,
                bone_index: buffer.read_i32_little_endian()?,
            })
        };
        parse(buffer).map_err(|e| e.or_corrupted(NanoemError::DocumentModelOutsideParentCorrupted))
    }

    pub fn model_object<'a>(&self, document: &'a Document) -> Option<&'a DocumentModel> {
        document.resolve_model(self.model_index)
    }

    pub fn bone_name<'a>(&self, document: &'a Document) -> Option<&'a str> {
        self.model_object(document)
            .and_then(|model| model.bone_name(self.bone_index))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentModelConstraintState {
    pub object: DocumentObject,
    pub enabled: bool,
}

crate::impl_document_entity!(DocumentModelConstraintState);

impl Default for DocumentModelConstraintState {
    fn default() -> Self {
        Self {
            object: DocumentObject::new(DocumentParent::Model),
            enabled: true,
        }
    }
}

impl DocumentModelConstraintState {
    fn parse_pmm(buffer: &mut Buffer, index: usize) -> Result<Self, NanoemError> {
        Ok(Self {
            object: DocumentObject::with_index(DocumentParent::Model, index as i32),
            enabled: buffer
                .read_bool()
                .map_err(|e| e.or_corrupted(NanoemError::DocumentModelConstraintStateCorrupted))?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentModelKeyframe {
    pub base: DocumentBaseKeyframe,
    pub visible: bool,
    pub constraint_states: Vec<DocumentModelConstraintState>,
    pub outside_parents: Vec<DocumentOutsideParent>,
}

crate::impl_document_keyframe!(DocumentModelKeyframe);

impl Default for DocumentModelKeyframe {
    fn default() -> Self {
        Self {
            base: DocumentBaseKeyframe::default(),
            visible: true,
            constraint_states: vec![],
            outside_parents: vec![],
        }
    }
}

impl DocumentModelKeyframe {
    fn parse_pmm(
        buffer: &mut Buffer,
        include_index: bool,
        num_constraint_bones: usize,
        num_outside_parents: usize,
    ) -> Result<Self, NanoemError> {
        let parse = |buffer: &mut Buffer| -> Result<Self, NanoemError> {
            let base = DocumentBaseKeyframe::parse(buffer, include_index)?;
            let visible = buffer.read_bool()?;
            let mut constraint_states = Vec::with_capacity(num_constraint_bones);
            for i in 0..num_constraint_bones {
                constraint_states.push(DocumentModelConstraintState::parse_pmm(buffer, i)?);
            }
            let mut outside_parents = Vec::with_capacity(num_outside_parents);
            for i in 0..num_outside_parents {
                outside_parents.push(DocumentOutsideParent::parse_pmm(buffer, i)?);
            }
            let mut keyframe = Self {
                base,
                visible,
                constraint_states,
                outside_parents,
            };
            keyframe.base.is_selected = buffer.read_bool()?;
            Ok(keyframe)
        };
        parse(buffer).map_err(|e| e.or_corrupted(NanoemError::DocumentModelKeyframeCorrupted))
    }

    /// Constraint flags follow the model's current constraint bones, missing ones are written enabled.
    /// Outside parents follow the model's subject bones, missing ones are written as `(-1, -1)`.
    fn save_pmm(
        &self,
        buffer: &mut MutableBuffer,
        include_index: bool,
        num_constraint_bones: usize,
        num_outside_parents: usize,
    ) -> Result<(), NanoemError> {
        self.base.save(buffer, include_index)?;
        buffer.write_bool(self.visible)?;
        for i in 0..num_constraint_bones {
            let enabled = self
                .constraint_states
                .get(i)
                .map_or(true, |state| state.enabled);
            buffer.write_bool(enabled)?;
        }
        for i in 0..num_outside_parents {
            let (model_index, bone_index) = self
                .outside_parents
                .get(i)
                .map_or((-1, -1), |op| (op.model_index, op.bone_index));
            buffer.write_i32_little_endian(model_index)?;
            buffer.write_i32_little_endian(bone_index)?;
        }
        buffer.write_bool(self.base.is_selected)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentModelBoneState {
    pub object: DocumentObject,
    pub translation: F128,
    pub orientation: F128,
    pub dirty: bool,
    pub disable_physics_simulation: bool,
    pub num_tracks_selected: u8,
}

crate::impl_document_entity!(DocumentModelBoneState);

impl Default for DocumentModelBoneState {
    fn default() -> Self {
        Self {
            object: DocumentObject::new(DocumentParent::Model),
            translation: F128::default(),
            orientation: F128::new(0.0, 0.0, 0.0, 1.0),
            dirty: false,
            disable_physics_simulation: false,
            num_tracks_selected: 0,
        }
    }
}

impl DocumentModelBoneState {
    fn parse_pmm(buffer: &mut Buffer, index: usize) -> Result<Self, NanoemError> {
        let parse = |buffer: &mut Buffer| -> Result<Self, NanoemError> {
            Ok(Self {
                object: DocumentObject::with_index(DocumentParent::Model, index as i32),
                translation: buffer.read_f32_3_little_endian()?,
                orientation: buffer.read_f32_4_little_endian()?,
                dirty: buffer.read_bool()?,
                disable_physics_simulation: buffer.read_bool()?,
                num_tracks_selected: buffer.read_byte()?,
            })
        };
        parse(buffer).map_err(|e| e.or_corrupted(NanoemError::DocumentModelBoneStateCorrupted))
    }

    fn save_pmm(&self, buffer: &mut MutableBuffer) -> Result<(), NanoemError> {
        buffer.write_f32_3_little_endian(self.translation)?;
        buffer.write_f32_4_little_endian(self.orientation)?;
        buffer.write_bool(self.dirty)?;
        buffer.write_bool(self.disable_physics_simulation)?;
        buffer.write_byte(self.num_tracks_selected)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentModelMorphState {
    pub object: DocumentObject,
    pub weight: f32,
}

crate::impl_document_entity!(DocumentModelMorphState);

impl Default for DocumentModelMorphState {
    fn default() -> Self {
        Self {
            object: DocumentObject::new(DocumentParent::Model),
            weight: 0.0f32,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentModelOutsideParentState {
    pub object: DocumentObject,
    pub begin: u32,
    pub end: u32,
    pub outside_parent: DocumentOutsideParent,
}

crate::impl_document_entity!(DocumentModelOutsideParentState);

impl Default for DocumentModelOutsideParentState {
    fn default() -> Self {
        Self {
            object: DocumentObject::new(DocumentParent::Model),
            begin: 0,
            end: 0,
            outside_parent: DocumentOutsideParent::default(),
        }
    }
}

impl DocumentModelOutsideParentState {
    fn parse_pmm(buffer: &mut Buffer, index: usize) -> Result<Self, NanoemError> {
        let begin = buffer.read_u32_little_endian()?;
        let end = buffer.read_u32_little_endian()?;
        Ok(Self {
            object: DocumentObject::with_index(DocumentParent::Model, index as i32),
            begin,
            end,
            outside_parent: DocumentOutsideParent::parse_pmm(buffer, 0)?,
        })
    }

    fn save_pmm(&self, buffer: &mut MutableBuffer) -> Result<(), NanoemError> {
        buffer.write_u32_little_endian(self.begin)?;
        buffer.write_u32_little_endian(self.end)?;
        buffer.write_i32_little_endian(self.outside_parent.model_index)?;
        buffer.write_i32_little_endian(self.outside_parent.bone_index)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentModel {
    pub object: DocumentObject,
    pub name_ja: String,
    pub name_en: String,
    pub path: String,
    pub num_fixed_tracks: u8,
    pub bone_names: Vec<String>,
    pub morph_names: Vec<String>,
    pub constraint_bone_indices: Vec<i32>,
    pub outside_parent_subject_bone_indices: Vec<i32>,
    pub draw_order_index: u8,
    pub visible: bool,
    pub selected_bone_index: i32,
    pub selected_morph_indices: [i32; SELECTED_MORPH_CATEGORY_MAX_ENUM],
    pub expansion_states: Vec<u8>,
    pub vertical_scroll: i32,
    pub last_frame_index: u32,
    pub initial_bone_keyframes: Vec<DocumentModelBoneKeyframe>,
    pub bone_keyframes: Vec<DocumentModelBoneKeyframe>,
    pub initial_morph_keyframes: Vec<DocumentModelMorphKeyframe>,
    pub morph_keyframes: Vec<DocumentModelMorphKeyframe>,
    pub initial_model_keyframe: DocumentModelKeyframe,
    pub model_keyframes: Vec<DocumentModelKeyframe>,
    pub bone_states: Vec<DocumentModelBoneState>,
    pub morph_states: Vec<DocumentModelMorphState>,
    pub constraint_states: Vec<DocumentModelConstraintState>,
    pub outside_parent_states: Vec<DocumentModelOutsideParentState>,
    pub is_blend_enabled: bool,
    pub edge_width: f32,
    pub is_self_shadow_enabled: bool,
    pub transform_order_index: u8,
    pub selection_index: i32,
}

crate::impl_document_entity!(DocumentModel);

impl Default for DocumentModel {
    fn default() -> Self {
        Self {
            object: DocumentObject::new(DocumentParent::Document),
            name_ja: String::new(),
            name_en: String::new(),
            path: String::new(),
            num_fixed_tracks: 0,
            bone_names: vec![],
            morph_names: vec![],
            constraint_bone_indices: vec![],
            outside_parent_subject_bone_indices: vec![],
            draw_order_index: 0,
            visible: true,
            selected_bone_index: -1,
            selected_morph_indices: [-1; SELECTED_MORPH_CATEGORY_MAX_ENUM],
            expansion_states: vec![],
            vertical_scroll: 0,
            last_frame_index: 0,
            initial_bone_keyframes: vec![],
            bone_keyframes: vec![],
            initial_morph_keyframes: vec![],
            morph_keyframes: vec![],
            initial_model_keyframe: DocumentModelKeyframe::default(),
            model_keyframes: vec![],
            bone_states: vec![],
            morph_states: vec![],
            constraint_states: vec![],
            outside_parent_states: vec![],
            is_blend_enabled: false,
            edge_width: 1.0f32,
            is_self_shadow_enabled: true,
            transform_order_index: 0,
            selection_index: 0,
        }
    }
}

impl DocumentModel {
    pub(crate) fn parse_pmm(
        buffer: &mut Buffer,
        version: DocumentVersion,
        callback: Option<&mut (dyn ParseModelCallback + '_)>,
    ) -> Result<Self, NanoemError> {
        Self::parse_fields(buffer, version, callback)
            .map_err(|e| e.or_corrupted(NanoemError::DocumentModelCorrupted))
    }

    fn parse_fields(
        buffer: &mut Buffer,
        version: DocumentVersion,
        callback: Option<&mut (dyn ParseModelCallback + '_)>,
    ) -> Result<Self, NanoemError> {
        let mut model = Self {
            object: DocumentObject::with_index(
                DocumentParent::Document,
                buffer.read_byte()? as i32,
            ),
            ..Default::default()
        };
        match version {
            DocumentVersion::V2 => {
                model.name_ja = buffer.read_variable_string_from_cp932()?;
                model.name_en = buffer.read_variable_string_from_cp932()?;
                model.path = buffer.read_string_from_cp932(Document::PATH_MAX)?;
                model.num_fixed_tracks = buffer.read_byte()?;
                let num_bones = buffer.read_count()?;
                model.bone_names = (0..num_bones)
                    .map(|_| buffer.read_variable_string_from_cp932())
                    .collect::<Result<_, _>>()?;
                let num_morphs = buffer.read_count()?;
                model.morph_names = (0..num_morphs)
                    .map(|_| buffer.read_variable_string_from_cp932())
                    .collect::<Result<_, _>>()?;
                let num_constraint_bones = buffer.read_count()?;
                model.constraint_bone_indices = (0..num_constraint_bones)
                    .map(|_| buffer.read_i32_little_endian())
                    .collect::<Result<_, _>>()?;
                let num_subject_bones = buffer.read_count()?;
                model.outside_parent_subject_bone_indices = (0..num_subject_bones)
                    .map(|_| buffer.read_i32_little_endian())
                    .collect::<Result<_, _>>()?;
            }
            DocumentVersion::V1 => {
                model.name_ja = buffer.read_string_from_cp932(Document::PMMV1_MODEL_NAME_MAX)?;
                model.path = buffer.read_string_from_cp932(Document::PATH_MAX)?;
                model.num_fixed_tracks = buffer.read_byte()?;
                let callback = callback.ok_or(NanoemError::NullObject)?;
                let ExternalModel {
                    bone_names,
                    morph_names,
                    constraint_bone_indices,
                } = callback.load_model_by_path(&model.path)?;
                model.bone_names = bone_names;
                model.morph_names = morph_names;
                model.constraint_bone_indices = constraint_bone_indices;
            }
        }
        model.draw_order_index = buffer.read_byte()?;
        model.visible = buffer.read_bool()?;
        model.selected_bone_index = buffer.read_i32_little_endian()?;
        for index in model.selected_morph_indices.iter_mut() {
            *index = buffer.read_i32_little_endian()?;
        }
        let num_expansion_states = buffer.read_byte()? as usize;
        model.expansion_states = buffer.read_buffer(num_expansion_states)?.to_vec();
        model.vertical_scroll = buffer.read_i32_little_endian()?;
        model.last_frame_index = buffer.read_u32_little_endian()?;
        for i in 0..model.bone_names.len() {
            let mut keyframe = DocumentModelBoneKeyframe::parse_pmm(buffer, false)?;
            keyframe.base.object_index = i as i32;
            model.initial_bone_keyframes.push(keyframe);
        }
        let num_bone_keyframes = buffer.read_count()?;
        for _ in 0..num_bone_keyframes {
            model
                .bone_keyframes
                .push(DocumentModelBoneKeyframe::parse_pmm(buffer, true)?);
        }
        for i in 0..model.morph_names.len() {
            let mut keyframe = DocumentModelMorphKeyframe::parse_pmm(buffer, false)?;
            keyframe.base.object_index = i as i32;
            model.initial_morph_keyframes.push(keyframe);
        }
        let num_morph_keyframes = buffer.read_count()?;
        for _ in 0..num_morph_keyframes {
            model
                .morph_keyframes
                .push(DocumentModelMorphKeyframe::parse_pmm(buffer, true)?);
        }
        let num_constraint_bones = model.constraint_bone_indices.len();
        let num_outside_parents = if version.is_v2() {
            model.outside_parent_subject_bone_indices.len()
        } else {
            0
        };
        model.initial_model_keyframe = DocumentModelKeyframe::parse_pmm(
            buffer,
            false,
            num_constraint_bones,
            num_outside_parents,
        )?;
        let num_model_keyframes = buffer.read_count()?;
        for _ in 0..num_model_keyframes {
            model.model_keyframes.push(DocumentModelKeyframe::parse_pmm(
                buffer,
                true,
                num_constraint_bones,
                num_outside_parents,
            )?);
        }
        for i in 0..model.bone_names.len() {
            model
                .bone_states
                .push(DocumentModelBoneState::parse_pmm(buffer, i)?);
        }
        for i in 0..model.morph_names.len() {
            let weight = buffer
                .read_f32_little_endian()
                .map_err(|e| e.or_corrupted(NanoemError::DocumentModelMorphStateCorrupted))?;
            model.morph_states.push(DocumentModelMorphState {
                object: DocumentObject::with_index(DocumentParent::Model, i as i32),
                weight,
            });
        }
        for i in 0..num_constraint_bones {
            model
                .constraint_states
                .push(DocumentModelConstraintState::parse_pmm(buffer, i)?);
        }
        for i in 0..num_outside_parents {
            model.outside_parent_states.push(
                DocumentModelOutsideParentState::parse_pmm(buffer, i)
                    .map_err(|e| e.or_corrupted(NanoemError::DocumentModelOutsideParentCorrupted))?,
            );
        }
        model.is_blend_enabled = buffer.read_bool()?;
        model.edge_width = buffer.read_f32_little_endian()?;
        model.is_self_shadow_enabled = buffer.read_bool()?;
        model.transform_order_index = buffer.read_byte()?;
        log::trace!(
            "model {} \"{}\": {} bones, {} morphs, {} bone keyframes, {} morph keyframes",
            model.object.index,
            model.name_ja,
            model.bone_names.len(),
            model.morph_names.len(),
            model.bone_keyframes.len(),
            model.morph_keyframes.len()
        );
        Ok(model)
    }

    pub(crate) fn save_pmm(
        &self,
        buffer: &mut MutableBuffer,
        version: DocumentVersion,
    ) -> Result<(), NanoemError> {
        buffer.write_u8_index(self.object.index, NanoemError::DocumentModelCorrupted)?;
        match version {
            DocumentVersion::V2 => {
                buffer.write_variable_string_cp932(&self.name_ja)?;
                buffer.write_variable_string_cp932(&self.name_en)?;
                buffer.write_fixed_string_cp932(&self.path, Document::PATH_MAX)?;
                buffer.write_byte(self.num_fixed_tracks)?;
                buffer.write_i32_count(self.bone_names.len(), NanoemError::DocumentModelCorrupted)?;
                for name in &self.bone_names {
                    buffer.write_variable_string_cp932(name)?;
                }
                buffer.write_i32_count(
                    self.morph_names.len(),
                    NanoemError::DocumentModelCorrupted,
                )?;
                for name in &self.morph_names {
                    buffer.write_variable_string_cp932(name)?;
                }
                buffer.write_i32_count(
                    self.constraint_bone_indices.len(),
                    NanoemError::DocumentModelCorrupted,
                )?;
                for index in &self.constraint_bone_indices {
                    buffer.write_i32_little_endian(*index)?;
                }
                buffer.write_i32_count(
                    self.outside_parent_subject_bone_indices.len(),
                    NanoemError::DocumentModelCorrupted,
                )?;
                for index in &self.outside_parent_subject_bone_indices {
                    buffer.write_i32_little_endian(*index)?;
                }
            }
            DocumentVersion::V1 => {
                buffer.write_fixed_string_cp932(&self.name_ja, Document::PMMV1_MODEL_NAME_MAX)?;
                buffer.write_fixed_string_cp932(&self.path, Document::PATH_MAX)?;
                buffer.write_byte(self.num_fixed_tracks)?;
            }
        }
        buffer.write_byte(self.draw_order_index)?;
        buffer.write_bool(self.visible)?;
        buffer.write_i32_little_endian(self.selected_bone_index)?;
        for index in &self.selected_morph_indices {
            buffer.write_i32_little_endian(*index)?;
        }
        let num_expansion_states = self.expansion_states.len().min(u8::MAX as usize);
        buffer.write_byte(num_expansion_states as u8)?;
        buffer.write_byte_array(&self.expansion_states[..num_expansion_states])?;
        buffer.write_i32_little_endian(self.vertical_scroll)?;
        buffer.write_u32_little_endian(self.last_frame_index)?;
        for keyframe in &self.initial_bone_keyframes {
            keyframe.save_pmm(buffer, false)?;
        }
        buffer.write_i32_count(self.bone_keyframes.len(), NanoemError::DocumentModelCorrupted)?;
        for keyframe in &self.bone_keyframes {
            keyframe.save_pmm(buffer, true)?;
        }
        for keyframe in &self.initial_morph_keyframes {
            keyframe.save_pmm(buffer, false)?;
        }
        buffer.write_i32_count(self.morph_keyframes.len(), NanoemError::DocumentModelCorrupted)?;
        for keyframe in &self.morph_keyframes {
            keyframe.save_pmm(buffer, true)?;
        }
        let num_constraint_bones = self.constraint_bone_indices.len();
        let num_outside_parents = if version.is_v2() {
            self.outside_parent_subject_bone_indices.len()
        } else {
            0
        };
        self.initial_model_keyframe.save_pmm(
            buffer,
            false,
            num_constraint_bones,
            num_outside_parents,
        )?;
        buffer.write_i32_count(self.model_keyframes.len(), NanoemError::DocumentModelCorrupted)?;
        for keyframe in &self.model_keyframes {
            keyframe.save_pmm(buffer, true, num_constraint_bones, num_outside_parents)?;
        }
        for state in &self.bone_states {
            state.save_pmm(buffer)?;
        }
        for state in &self.morph_states {
            buffer.write_f32_little_endian(state.weight)?;
        }
        for i in 0..num_constraint_bones {
            let enabled = self
                .constraint_states
                .get(i)
                .map_or(true, |state| state.enabled);
            buffer.write_bool(enabled)?;
        }
        for i in 0..num_outside_parents {
            match self.outside_parent_states.get(i) {
                Some(state) => state.save_pmm(buffer)?,
                None => DocumentModelOutsideParentState::default().save_pmm(buffer)?,
            }
        }
        buffer.write_bool(self.is_blend_enabled)?;
        buffer.write_f32_little_endian(self.edge_width)?;
        buffer.write_bool(self.is_self_shadow_enabled)?;
        buffer.write_byte(self.transform_order_index)
    }

    pub fn name(&self, language: LanguageType) -> &str {
        match language {
            LanguageType::Japanese => &self.name_ja,
            LanguageType::English => &self.name_en,
        }
    }

    pub fn bone_name(&self, index: i32) -> Option<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.bone_names.get(index))
            .map(|name| name.as_str())
    }

    pub fn morph_name(&self, index: i32) -> Option<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.morph_names.get(index))
            .map(|name| name.as_str())
    }

    pub fn find_bone_index(&self, name: &str) -> Option<usize> {
        self.bone_names.iter().position(|bone_name| bone_name == name)
    }

    pub fn find_morph_index(&self, name: &str) -> Option<usize> {
        self.morph_names
            .iter()
            .position(|morph_name| morph_name == name)
    }

    pub fn constraint_bone_name(&self, index: usize) -> Option<&str> {
        self.constraint_bone_indices
            .get(index)
            .and_then(|bone_index| self.bone_name(*bone_index))
    }

    pub fn outside_parent_subject_bone_name(&self, index: usize) -> Option<&str> {
        self.outside_parent_subject_bone_indices
            .get(index)
            .and_then(|bone_index| self.bone_name(*bone_index))
    }

    pub fn selected_bone_name(&self) -> Option<&str> {
        self.bone_name(self.selected_bone_index)
    }

    pub fn selected_morph_name(&self, category: usize) -> Option<&str> {
        self.selected_morph_indices
            .get(category)
            .and_then(|index| self.morph_name(*index))
    }

    pub fn all_bone_keyframes(&self) -> impl Iterator<Item = &DocumentModelBoneKeyframe> {
        self.initial_bone_keyframes
            .iter()
            .chain(self.bone_keyframes.iter())
    }

    pub fn all_morph_keyframes(&self) -> impl Iterator<Item = &DocumentModelMorphKeyframe> {
        self.initial_morph_keyframes
            .iter()
            .chain(self.morph_keyframes.iter())
    }

    pub fn all_model_keyframes(&self) -> impl Iterator<Item = &DocumentModelKeyframe> {
        slice::from_ref(&self.initial_model_keyframe)
            .iter()
            .chain(self.model_keyframes.iter())
    }

    /// Name of the bone animated by `keyframe`, walking its previous chain for timeline keyframes.
    pub fn bone_keyframe_name(&self, keyframe: &DocumentModelBoneKeyframe) -> Option<&str> {
        resolve_ordinal(&self.initial_bone_keyframes, &self.bone_keyframes, keyframe)
            .and_then(|ordinal| self.bone_names.get(ordinal))
            .map(|name| name.as_str())
    }

    pub fn morph_keyframe_name(&self, keyframe: &DocumentModelMorphKeyframe) -> Option<&str> {
        resolve_ordinal(&self.initial_morph_keyframes, &self.morph_keyframes, keyframe)
            .and_then(|ordinal| self.morph_names.get(ordinal))
            .map(|name| name.as_str())
    }

    pub fn find_bone_keyframe(
        &self,
        name: &str,
        frame_index: u32,
    ) -> Option<&DocumentModelBoneKeyframe> {
        let ordinal = self.find_bone_index(name)?;
        if frame_index == 0 {
            return self.initial_bone_keyframes.get(ordinal);
        }
        self.bone_keyframes.iter().find(|keyframe| {
            keyframe.base.frame_index == frame_index
                && resolve_ordinal(&self.initial_bone_keyframes, &self.bone_keyframes, *keyframe)
                    == Some(ordinal)
        })
    }

    pub fn find_morph_keyframe(
        &self,
        name: &str,
        frame_index: u32,
    ) -> Option<&DocumentModelMorphKeyframe> {
        let ordinal = self.find_morph_index(name)?;
        if frame_index == 0 {
            return self.initial_morph_keyframes.get(ordinal);
        }
        self.morph_keyframes.iter().find(|keyframe| {
            keyframe.base.frame_index == frame_index
                && resolve_ordinal(&self.initial_morph_keyframes, &self.morph_keyframes, *keyframe)
                    == Some(ordinal)
        })
    }

    pub fn find_model_keyframe(&self, frame_index: u32) -> Option<&DocumentModelKeyframe> {
        self.all_model_keyframes()
            .find(|keyframe| keyframe.base.frame_index == frame_index)
    }

    pub fn search_closest_bone_keyframes(
        &self,
        name: &str,
        frame_index: u32,
    ) -> (
        Option<&DocumentModelBoneKeyframe>,
        Option<&DocumentModelBoneKeyframe>,
    ) {
        match self.find_bone_index(name) {
            Some(ordinal) => search_closest(
                &self.initial_bone_keyframes,
                &self.bone_keyframes,
                frame_index,
                Some(ordinal),
            ),
            None => (None, None),
        }
    }

    pub fn search_closest_morph_keyframes(
        &self,
        name: &str,
        frame_index: u32,
    ) -> (
        Option<&DocumentModelMorphKeyframe>,
        Option<&DocumentModelMorphKeyframe>,
    ) {
        match self.find_morph_index(name) {
            Some(ordinal) => search_closest(
                &self.initial_morph_keyframes,
                &self.morph_keyframes,
                frame_index,
                Some(ordinal),
            ),
            None => (None, None),
        }
    }

    pub fn search_closest_model_keyframes(
        &self,
        frame_index: u32,
    ) -> (Option<&DocumentModelKeyframe>, Option<&DocumentModelKeyframe>) {
        search_closest(
            slice::from_ref(&self.initial_model_keyframe),
            &self.model_keyframes,
            frame_index,
            None,
        )
    }
}
