use std::ops::{Deref, DerefMut};

use crate::{
    common::NanoemError,
    document::{
        keyframe::{DocumentKeyframe, KeyframeTrack},
        object::{find_by_handle, DocumentObject, Identified},
        Document, DocumentModel, DocumentModelBoneKeyframe, DocumentModelBoneState,
        DocumentModelConstraintState, DocumentModelKeyframe, DocumentModelMorphKeyframe,
        DocumentModelMorphState, DocumentModelOutsideParentState, DocumentOutsideParent,
        DocumentParent, Handle,
    },
};

use super::{
    insert_object, overwrite_initial_keyframe, remove_object, resize_object_array,
    MutableDocumentItem, MutableDocumentModelBoneKeyframe, MutableDocumentModelBoneState,
    MutableDocumentModelConstraintState, MutableDocumentModelKeyframe,
    MutableDocumentModelMorphKeyframe, MutableDocumentModelMorphState,
    MutableDocumentModelOutsideParentState, MutableDocumentOutsideParent, ObjectOrigin,
};

/// Makes room for one more initial keyframe at `inserted_at`.
///
/// Timeline keyframes live after the initial ones in the combined index space, so
/// their object indices and every link pointing past the initial range move by one.
fn shift_combined_indices<K: DocumentKeyframe>(
    initial: &mut [K],
    timeline: &mut [K],
    inserted_at: i32,
) {
    if timeline.is_empty() {
        return;
    }
    for keyframe in initial.iter_mut().chain(timeline.iter_mut()) {
        let base = keyframe.base_mut();
        if base.previous_keyframe_index >= inserted_at {
            base.previous_keyframe_index += 1;
        }
        if base.next_keyframe_index >= inserted_at {
            base.next_keyframe_index += 1;
        }
    }
    for keyframe in timeline.iter_mut() {
        keyframe.base_mut().object_index += 1;
    }
}

#[derive(Debug)]
pub struct MutableDocumentModel<'a> {
    origin: ObjectOrigin<'a, DocumentModel>,
}

impl<'a> MutableDocumentModel<'a> {
    pub fn create() -> Self {
        Self::from_value(DocumentModel::default())
    }

    pub fn from_value(model: DocumentModel) -> Self {
        Self {
            origin: ObjectOrigin::Owned(Box::new(model)),
        }
    }

    pub fn create_as_reference(
        document: &'a mut Document,
        handle: Handle<DocumentModel>,
    ) -> Result<Self, NanoemError> {
        let pos = find_by_handle(&document.models, handle)
            .ok_or(NanoemError::DocumentModelNotFound)?;
        Ok(Self {
            origin: ObjectOrigin::Reference(&mut document.models[pos]),
        })
    }

    pub fn is_reference(&self) -> bool {
        self.origin.is_reference()
    }

    pub(crate) fn into_owned(self, error: NanoemError) -> Result<DocumentModel, NanoemError> {
        self.origin.into_owned(error)
    }

    fn bone_ordinal(&self, bone_name: &str) -> Result<usize, NanoemError> {
        self.origin
            .find_bone_index(bone_name)
            .ok_or_else(|| NanoemError::DocumentModelBoneNotFound(bone_name.to_owned()))
    }

    fn morph_ordinal(&self, morph_name: &str) -> Result<usize, NanoemError> {
        self.origin
            .find_morph_index(morph_name)
            .ok_or_else(|| NanoemError::DocumentModelMorphNotFound(morph_name.to_owned()))
    }

    /// Appends a bone together with its initial keyframe and state.
    /// Registering a known name returns its ordinal without touching the model.
    pub fn register_bone(&mut self, name: &str) -> Result<usize, NanoemError> {
        if let Some(ordinal) = self.origin.find_bone_index(name) {
            return Ok(ordinal);
        }
        let model = &mut *self.origin;
        let ordinal = model.bone_names.len();
        resize_object_array(&mut model.bone_names)?;
        resize_object_array(&mut model.initial_bone_keyframes)?;
        resize_object_array(&mut model.bone_states)?;
        shift_combined_indices(
            &mut model.initial_bone_keyframes,
            &mut model.bone_keyframes,
            ordinal as i32,
        );
        model.bone_names.push(name.to_owned());
        let mut keyframe = DocumentModelBoneKeyframe::default();
        keyframe.base.object_index = ordinal as i32;
        model.initial_bone_keyframes.push(keyframe);
        model.bone_states.push(DocumentModelBoneState {
            object: DocumentObject::with_index(DocumentParent::Model, ordinal as i32),
            ..Default::default()
        });
        log::trace!("registered bone \"{}\" at {}", name, ordinal);
        Ok(ordinal)
    }

    pub fn register_morph(&mut self, name: &str) -> Result<usize, NanoemError> {
        if let Some(ordinal) = self.origin.find_morph_index(name) {
            return Ok(ordinal);
        }
        let model = &mut *self.origin;
        let ordinal = model.morph_names.len();
        resize_object_array(&mut model.morph_names)?;
        resize_object_array(&mut model.initial_morph_keyframes)?;
        resize_object_array(&mut model.morph_states)?;
        shift_combined_indices(
            &mut model.initial_morph_keyframes,
            &mut model.morph_keyframes,
            ordinal as i32,
        );
        model.morph_names.push(name.to_owned());
        let mut keyframe = DocumentModelMorphKeyframe::default();
        keyframe.base.object_index = ordinal as i32;
        model.initial_morph_keyframes.push(keyframe);
        model.morph_states.push(DocumentModelMorphState {
            object: DocumentObject::with_index(DocumentParent::Model, ordinal as i32),
            ..Default::default()
        });
        log::trace!("registered morph \"{}\" at {}", name, ordinal);
        Ok(ordinal)
    }

    /// Adds a keyframe to the track of `bone_name`.
    /// Frame zero overwrites the initial keyframe of that bone.
    pub fn add_bone_keyframe(
        &mut self,
        keyframe: MutableDocumentModelBoneKeyframe<'_>,
        bone_name: &str,
        frame_index: u32,
    ) -> Result<Handle<DocumentModelBoneKeyframe>, NanoemError> {
        let ordinal = self.bone_ordinal(bone_name)?;
        let keyframe =
            keyframe.into_owned(NanoemError::DocumentModelBoneKeyframeAlreadyExists)?;
        let model = &mut *self.origin;
        if frame_index == 0 {
            let initial = model
                .initial_bone_keyframes
                .get_mut(ordinal)
                .ok_or(NanoemError::DocumentModelBoneKeyframeNotFound)?;
            overwrite_initial_keyframe(initial, keyframe);
            return Ok(initial.handle());
        }
        resize_object_array(&mut model.bone_keyframes)?;
        KeyframeTrack::new(&mut model.initial_bone_keyframes, &mut model.bone_keyframes).insert(
            keyframe,
            frame_index,
            Some(ordinal),
            NanoemError::DocumentModelBoneKeyframeAlreadyExists,
        )
    }

    pub fn remove_bone_keyframe(
        &mut self,
        handle: Handle<DocumentModelBoneKeyframe>,
    ) -> Result<DocumentModelBoneKeyframe, NanoemError> {
        let model = &mut *self.origin;
        KeyframeTrack::new(&mut model.initial_bone_keyframes, &mut model.bone_keyframes)
            .remove(handle, NanoemError::DocumentModelBoneKeyframeNotFound)
    }

    pub fn add_morph_keyframe(
        &mut self,
        keyframe: MutableDocumentModelMorphKeyframe<'_>,
        morph_name: &str,
        frame_index: u32,
    ) -> Result<Handle<DocumentModelMorphKeyframe>, NanoemError> {
        let ordinal = self.morph_ordinal(morph_name)?;
        let keyframe =
            keyframe.into_owned(NanoemError::DocumentModelMorphKeyframeAlreadyExists)?;
        let model = &mut *self.origin;
        if frame_index == 0 {
            let initial = model
                .initial_morph_keyframes
                .get_mut(ordinal)
                .ok_or(NanoemError::DocumentModelMorphKeyframeNotFound)?;
            overwrite_initial_keyframe(initial, keyframe);
            return Ok(initial.handle());
        }
        resize_object_array(&mut model.morph_keyframes)?;
        KeyframeTrack::new(
            &mut model.initial_morph_keyframes,
            &mut model.morph_keyframes,
        )
        .insert(
            keyframe,
            frame_index,
            Some(ordinal),
            NanoemError::DocumentModelMorphKeyframeAlreadyExists,
        )
    }

    pub fn remove_morph_keyframe(
        &mut self,
        handle: Handle<DocumentModelMorphKeyframe>,
    ) -> Result<DocumentModelMorphKeyframe, NanoemError> {
        let model = &mut *self.origin;
        KeyframeTrack::new(
            &mut model.initial_morph_keyframes,
            &mut model.morph_keyframes,
        )
        .remove(handle, NanoemError::DocumentModelMorphKeyframeNotFound)
    }

    pub fn add_model_keyframe(
        &mut self,
        keyframe: MutableDocumentModelKeyframe<'_>,
        frame_index: u32,
    ) -> Result<Handle<DocumentModelKeyframe>, NanoemError> {
        let keyframe =
            keyframe.into_owned(NanoemError::DocumentModelModelKeyframeAlreadyExists)?;
        let model = &mut *self.origin;
        if frame_index == 0 {
            overwrite_initial_keyframe(&mut model.initial_model_keyframe, keyframe);
            return Ok(model.initial_model_keyframe.handle());
        }
        resize_object_array(&mut model.model_keyframes)?;
        KeyframeTrack::new(
            std::slice::from_mut(&mut model.initial_model_keyframe),
            &mut model.model_keyframes,
        )
        .insert(
            keyframe,
            frame_index,
            None,
            NanoemError::DocumentModelModelKeyframeAlreadyExists,
        )
    }

    pub fn remove_model_keyframe(
        &mut self,
        handle: Handle<DocumentModelKeyframe>,
    ) -> Result<DocumentModelKeyframe, NanoemError> {
        let model = &mut *self.origin;
        KeyframeTrack::new(
            std::slice::from_mut(&mut model.initial_model_keyframe),
            &mut model.model_keyframes,
        )
        .remove(handle, NanoemError::DocumentModelModelKeyframeNotFound)
    }

    pub fn bone_keyframe_as_reference(
        &mut self,
        handle: Handle<DocumentModelBoneKeyframe>,
    ) -> Result<MutableDocumentModelBoneKeyframe<'_>, NanoemError> {
        let model = &mut *self.origin;
        if let Some(pos) = find_by_handle(&model.initial_bone_keyframes, handle) {
            return Ok(MutableDocumentItem {
                origin: ObjectOrigin::Reference(&mut model.initial_bone_keyframes[pos]),
            });
        }
        MutableDocumentItem::create_as_reference(
            &mut model.bone_keyframes,
            handle,
            NanoemError::DocumentModelBoneKeyframeNotFound,
        )
    }

    pub fn model_keyframe_as_reference(
        &mut self,
        handle: Handle<DocumentModelKeyframe>,
    ) -> Result<MutableDocumentModelKeyframe<'_>, NanoemError> {
        let model = &mut *self.origin;
        if model.initial_model_keyframe.matches(handle) {
            return Ok(MutableDocumentItem {
                origin: ObjectOrigin::Reference(&mut model.initial_model_keyframe),
            });
        }
        MutableDocumentItem::create_as_reference(
            &mut model.model_keyframes,
            handle,
            NanoemError::DocumentModelModelKeyframeNotFound,
        )
    }

    /// Replaces the current pose of `bone_name`.
    pub fn set_bone_state(
        &mut self,
        state: MutableDocumentModelBoneState<'_>,
        bone_name: &str,
    ) -> Result<(), NanoemError> {
        let ordinal = self.bone_ordinal(bone_name)?;
        let mut state = state.into_owned(NanoemError::NullObject)?;
        state.object = DocumentObject::with_index(DocumentParent::Model, ordinal as i32);
        let slot = self
            .origin
            .bone_states
            .get_mut(ordinal)
            .ok_or_else(|| NanoemError::DocumentModelBoneNotFound(bone_name.to_owned()))?;
        *slot = state;
        Ok(())
    }

    pub fn set_morph_state(
        &mut self,
        state: MutableDocumentModelMorphState<'_>,
        morph_name: &str,
    ) -> Result<(), NanoemError> {
        let ordinal = self.morph_ordinal(morph_name)?;
        let mut state = state.into_owned(NanoemError::NullObject)?;
        state.object = DocumentObject::with_index(DocumentParent::Model, ordinal as i32);
        let slot = self
            .origin
            .morph_states
            .get_mut(ordinal)
            .ok_or_else(|| NanoemError::DocumentModelMorphNotFound(morph_name.to_owned()))?;
        *slot = state;
        Ok(())
    }

    /// Makes `bone_name` a constraint bone tracked by `state`.
    pub fn add_constraint_state(
        &mut self,
        state: MutableDocumentModelConstraintState<'_>,
        bone_name: &str,
    ) -> Result<Handle<DocumentModelConstraintState>, NanoemError> {
        let ordinal = self.bone_ordinal(bone_name)? as i32;
        let state = state.into_owned(NanoemError::DocumentModelConstraintStateAlreadyExists)?;
        let model = &mut *self.origin;
        if model.constraint_bone_indices.contains(&ordinal) {
            return Err(NanoemError::DocumentModelConstraintStateAlreadyExists);
        }
        resize_object_array(&mut model.constraint_bone_indices)?;
        let handle = insert_object(
            &mut model.constraint_states,
            state,
            -1,
            DocumentParent::Model,
            NanoemError::DocumentModelConstraintStateAlreadyExists,
        )?;
        model.constraint_bone_indices.push(ordinal);
        Ok(handle)
    }

    /// Drops a constraint bone with its state and its flag in every model keyframe.
    pub fn remove_constraint_state(
        &mut self,
        handle: Handle<DocumentModelConstraintState>,
    ) -> Result<DocumentModelConstraintState, NanoemError> {
        let model = &mut *self.origin;
        let pos = find_by_handle(&model.constraint_states, handle)
            .ok_or(NanoemError::DocumentModelConstraintStateNotFound)?;
        let state = remove_object(
            &mut model.constraint_states,
            handle,
            NanoemError::DocumentModelConstraintStateNotFound,
        )?;
        if pos < model.constraint_bone_indices.len() {
            model.constraint_bone_indices.remove(pos);
        }
        let keyframes = std::iter::once(&mut model.initial_model_keyframe)
            .chain(model.model_keyframes.iter_mut());
        for keyframe in keyframes {
            if pos < keyframe.constraint_states.len() {
                keyframe.constraint_states.remove(pos);
                for rest in keyframe.constraint_states[pos..].iter_mut() {
                    rest.object.index -= 1;
                }
            }
        }
        Ok(state)
    }

    pub fn add_outside_parent_subject_bone(&mut self, bone_name: &str) -> Result<(), NanoemError> {
        let ordinal = self.bone_ordinal(bone_name)? as i32;
        let model = &mut *self.origin;
        if !model.outside_parent_subject_bone_indices.contains(&ordinal) {
            resize_object_array(&mut model.outside_parent_subject_bone_indices)?;
            model.outside_parent_subject_bone_indices.push(ordinal);
        }
        Ok(())
    }

    pub fn insert_outside_parent_state(
        &mut self,
        state: MutableDocumentModelOutsideParentState<'_>,
        index: i32,
    ) -> Result<Handle<DocumentModelOutsideParentState>, NanoemError> {
        let state = state.into_owned(NanoemError::DocumentModelOutsideParentStateAlreadyExists)?;
        insert_object(
            &mut self.origin.outside_parent_states,
            state,
            index,
            DocumentParent::Model,
            NanoemError::DocumentModelOutsideParentStateAlreadyExists,
        )
    }

    pub fn remove_outside_parent_state(
        &mut self,
        handle: Handle<DocumentModelOutsideParentState>,
    ) -> Result<DocumentModelOutsideParentState, NanoemError> {
        remove_object(
            &mut self.origin.outside_parent_states,
            handle,
            NanoemError::DocumentModelOutsideParentStateNotFound,
        )
    }

    pub fn set_selected_bone_name(&mut self, bone_name: &str) -> Result<(), NanoemError> {
        self.origin.selected_bone_index = self.bone_ordinal(bone_name)? as i32;
        Ok(())
    }

    pub fn set_selected_morph_name(
        &mut self,
        category: usize,
        morph_name: &str,
    ) -> Result<(), NanoemError> {
        let ordinal = self.morph_ordinal(morph_name)? as i32;
        let slot = self
            .origin
            .selected_morph_indices
            .get_mut(category)
            .ok_or(NanoemError::NullObject)?;
        *slot = ordinal;
        Ok(())
    }
}

impl<'a> Deref for MutableDocumentModel<'a> {
    type Target = DocumentModel;

    fn deref(&self) -> &DocumentModel {
        &self.origin
    }
}

impl<'a> DerefMut for MutableDocumentModel<'a> {
    fn deref_mut(&mut self) -> &mut DocumentModel {
        &mut self.origin
    }
}

impl<'a> MutableDocumentItem<'a, DocumentModelKeyframe> {
    /// Sets the flag of the constraint bone `bone_name` of `model` in this keyframe,
    /// filling in enabled flags for constraint bones recorded before it.
    pub fn set_constraint_enabled(
        &mut self,
        model: &DocumentModel,
        bone_name: &str,
        enabled: bool,
    ) -> Result<(), NanoemError> {
        let ordinal = model
            .find_bone_index(bone_name)
            .ok_or_else(|| NanoemError::DocumentModelBoneNotFound(bone_name.to_owned()))?
            as i32;
        let pos = model
            .constraint_bone_indices
            .iter()
            .position(|index| *index == ordinal)
            .ok_or(NanoemError::DocumentModelConstraintStateNotFound)?;
        let states = &mut self.origin.constraint_states;
        while states.len() <= pos {
            resize_object_array(states)?;
            states.push(DocumentModelConstraintState {
                object: DocumentObject::with_index(DocumentParent::Model, states.len() as i32),
                enabled: true,
            });
        }
        states[pos].enabled = enabled;
        Ok(())
    }

    pub fn insert_outside_parent(
        &mut self,
        outside_parent: MutableDocumentOutsideParent<'_>,
        index: i32,
    ) -> Result<Handle<DocumentOutsideParent>, NanoemError> {
        let outside_parent =
            outside_parent.into_owned(NanoemError::DocumentModelOutsideParentAlreadyExists)?;
        insert_object(
            &mut self.origin.outside_parents,
            outside_parent,
            index,
            DocumentParent::Model,
            NanoemError::DocumentModelOutsideParentAlreadyExists,
        )
    }

    pub fn remove_outside_parent(
        &mut self,
        handle: Handle<DocumentOutsideParent>,
    ) -> Result<DocumentOutsideParent, NanoemError> {
        remove_object(
            &mut self.origin.outside_parents,
            handle,
            NanoemError::DocumentModelOutsideParentNotFound,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::keyframe::DocumentKeyframe;

    fn model_with_bones(names: &[&str]) -> MutableDocumentModel<'static> {
        let mut model = MutableDocumentModel::create();
        for name in names {
            model.register_bone(name).unwrap();
        }
        model
    }

    #[test]
    fn test_register_bone_appends_parallel_arrays() {
        let model = model_with_bones(&["センター", "Arm_L"]);
        assert_eq!(2, model.bone_names.len());
        assert_eq!(2, model.initial_bone_keyframes.len());
        assert_eq!(2, model.bone_states.len());
        assert_eq!(1, model.initial_bone_keyframes[1].base.object_index);
        assert_eq!(1, model.bone_states[1].object.index);
    }

    #[test]
    fn test_register_bone_shifts_existing_timeline() {
        let mut model = model_with_bones(&["a"]);
        model
            .add_bone_keyframe(MutableDocumentModelBoneKeyframe::create(), "a", 10)
            .unwrap();
        assert_eq!(1, model.bone_keyframes[0].base.object_index);
        model.register_bone("b").unwrap();
        assert_eq!(2, model.bone_keyframes[0].base.object_index);
        assert_eq!(2, model.initial_bone_keyframes[0].base.next_keyframe_index);
        assert_eq!(Some("a"), model.bone_keyframe_name(&model.bone_keyframes[0]));
    }

    #[test]
    fn test_add_bone_keyframe_unknown_bone() {
        let mut model = model_with_bones(&["a"]);
        assert_eq!(
            Err(NanoemError::DocumentModelBoneNotFound("missing".to_owned())),
            model.add_bone_keyframe(MutableDocumentModelBoneKeyframe::create(), "missing", 1)
        );
    }

    #[test]
    fn test_add_bone_keyframe_duplicate_frame_per_bone() {
        let mut model = model_with_bones(&["a", "b"]);
        model
            .add_bone_keyframe(MutableDocumentModelBoneKeyframe::create(), "a", 5)
            .unwrap();
        model
            .add_bone_keyframe(MutableDocumentModelBoneKeyframe::create(), "b", 5)
            .unwrap();
        assert_eq!(
            Err(NanoemError::DocumentModelBoneKeyframeAlreadyExists),
            model.add_bone_keyframe(MutableDocumentModelBoneKeyframe::create(), "a", 5)
        );
    }

    #[test]
    fn test_initial_bone_keyframe_cannot_be_removed() {
        let mut model = model_with_bones(&["a"]);
        let mut keyframe = MutableDocumentModelBoneKeyframe::create();
        keyframe.is_physics_simulation_disabled = true;
        keyframe.base.is_selected = true;
        let handle = model.add_bone_keyframe(keyframe, "a", 0).unwrap();
        let initial = &model.initial_bone_keyframes[0];
        assert!(initial.is_physics_simulation_disabled);
        assert!(initial.base.is_selected);
        assert_eq!(0, initial.frame_index());
        assert_eq!(
            Err(NanoemError::DocumentModelBoneKeyframeNotFound),
            model.remove_bone_keyframe(handle)
        );
    }

    #[test]
    fn test_constraint_state_lifecycle() {
        let mut model = model_with_bones(&["leg", "leg IK", "toe IK"]);
        let leg = model
            .add_constraint_state(MutableDocumentModelConstraintState::create(), "leg IK")
            .unwrap();
        model
            .add_constraint_state(MutableDocumentModelConstraintState::create(), "toe IK")
            .unwrap();
        assert_eq!(
            Err(NanoemError::DocumentModelConstraintStateAlreadyExists),
            model.add_constraint_state(MutableDocumentModelConstraintState::create(), "leg IK")
        );
        assert_eq!(vec![1, 2], model.constraint_bone_indices);
        let mut keyframe = MutableDocumentModelKeyframe::create();
        keyframe.set_constraint_enabled(&model, "toe IK", false).unwrap();
        assert_eq!(2, keyframe.constraint_states.len());
        assert!(keyframe.constraint_states[0].enabled);
        assert!(!keyframe.constraint_states[1].enabled);
        assert_eq!(
            Err(NanoemError::DocumentModelConstraintStateNotFound),
            keyframe.set_constraint_enabled(&model, "leg", false)
        );
        model.add_model_keyframe(keyframe, 3).unwrap();
        model.remove_constraint_state(leg).unwrap();
        assert_eq!(vec![2], model.constraint_bone_indices);
        assert_eq!(1, model.constraint_states.len());
        assert_eq!(0, model.constraint_states[0].object.index);
        assert_eq!(1, model.model_keyframes[0].constraint_states.len());
        assert!(!model.model_keyframes[0].constraint_states[0].enabled);
    }

    #[test]
    fn test_outside_parents_on_model_keyframe() {
        let mut keyframe = MutableDocumentModelKeyframe::create();
        let mut first = MutableDocumentOutsideParent::create();
        first.set_model(1);
        let first = keyframe.insert_outside_parent(first, -1).unwrap();
        keyframe
            .insert_outside_parent(MutableDocumentOutsideParent::create(), 0)
            .unwrap();
        assert_eq!(1, keyframe.outside_parents[1].model_index);
        assert_eq!(
            Err(NanoemError::DocumentModelOutsideParentNotFound),
            keyframe.remove_outside_parent(first)
        );
        let first = keyframe.outside_parents[1].handle();
        let removed = keyframe.remove_outside_parent(first).unwrap();
        assert_eq!(1, removed.model_index);
        assert_eq!(1, keyframe.outside_parents.len());
    }
}
