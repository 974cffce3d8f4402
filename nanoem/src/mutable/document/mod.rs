mod model;

use std::{
    mem,
    ops::{Deref, DerefMut},
    slice,
};

use crate::{
    common::NanoemError,
    document::{
        keyframe::{DocumentKeyframe, KeyframeTrack},
        object::{find_by_handle, DocumentEntity, Identified},
        Document, DocumentAccessory, DocumentAccessoryKeyframe, DocumentCamera,
        DocumentCameraKeyframe, DocumentGravity, DocumentGravityKeyframe, DocumentLight,
        DocumentLightKeyframe, DocumentModel, DocumentModelBoneKeyframe, DocumentModelBoneState,
        DocumentModelConstraintState, DocumentModelKeyframe, DocumentModelMorphKeyframe,
        DocumentModelMorphState, DocumentModelOutsideParentState, DocumentOutsideParent,
        DocumentParent, DocumentSelfShadow, DocumentSelfShadowKeyframe, Handle,
    },
};

use super::common::MutableBuffer;

pub use self::model::MutableDocumentModel;

pub const DEFAULT_OBJECT_CAPACITY: usize = 16;

/// Where a mutable wrapper gets its entity from.
///
/// Only `Owned` entities can be moved into a collection. A `Reference` points into
/// a tree that keeps owning the entity.
#[derive(Debug)]
pub enum ObjectOrigin<'a, T> {
    Owned(Box<T>),
    Reference(&'a mut T),
}

impl<'a, T> ObjectOrigin<'a, T> {
    pub fn is_reference(&self) -> bool {
        matches!(self, ObjectOrigin::Reference(_))
    }

    /// Takes the entity out of an owned origin, `error` when it belongs to a tree.
    pub fn into_owned(self, error: NanoemError) -> Result<T, NanoemError> {
        match self {
            ObjectOrigin::Owned(value) => Ok(*value),
            ObjectOrigin::Reference(_) => Err(error),
        }
    }
}

impl<'a, T> Deref for ObjectOrigin<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            ObjectOrigin::Owned(value) => value,
            ObjectOrigin::Reference(value) => value,
        }
    }
}

impl<'a, T> DerefMut for ObjectOrigin<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        match self {
            ObjectOrigin::Owned(value) => value,
            ObjectOrigin::Reference(value) => value,
        }
    }
}

/// Grows `items` geometrically once its capacity is exhausted.
pub(crate) fn resize_object_array<T>(items: &mut Vec<T>) -> Result<(), NanoemError> {
    if items.len() == items.capacity() {
        let additional = items.capacity().max(DEFAULT_OBJECT_CAPACITY);
        items
            .try_reserve_exact(additional)
            .map_err(|_| NanoemError::ReallocFailed)?;
    }
    Ok(())
}

/// Inserts `item` at `index`, shifting and re-indexing the rest.
/// A negative or out of range index appends.
///
/// An item still carrying a logical index belongs to some container, clones of one included,
/// and is rejected with `already_exists`. Removal detaches it again.
pub(crate) fn insert_object<T: DocumentEntity>(
    items: &mut Vec<T>,
    mut item: T,
    index: i32,
    parent: DocumentParent,
    already_exists: NanoemError,
) -> Result<Handle<T>, NanoemError> {
    if item.object().index >= 0 {
        return Err(already_exists);
    }
    resize_object_array(items)?;
    let pos = match usize::try_from(index) {
        Ok(pos) if pos < items.len() => pos,
        _ => items.len(),
    };
    for rest in items[pos..].iter_mut() {
        rest.object_mut().index += 1;
    }
    let object = item.object_mut();
    object.index = pos as i32;
    object.parent = parent;
    items.insert(pos, item);
    Ok(items[pos].handle())
}

pub(crate) fn remove_object<T: DocumentEntity>(
    items: &mut Vec<T>,
    handle: Handle<T>,
    not_found: NanoemError,
) -> Result<T, NanoemError> {
    let pos = find_by_handle(items, handle).ok_or(not_found)?;
    let mut item = items.remove(pos);
    for rest in items[pos..].iter_mut() {
        rest.object_mut().index -= 1;
    }
    item.object_mut().detach();
    Ok(item)
}

/// Replaces the payload of an initial keyframe while it keeps its identity, frame and links.
pub(crate) fn overwrite_initial_keyframe<K: DocumentKeyframe>(initial: &mut K, mut keyframe: K) {
    let is_selected = keyframe.base().is_selected;
    mem::swap(keyframe.base_mut(), initial.base_mut());
    *initial = keyframe;
    initial.base_mut().is_selected = is_selected;
}

/// Adds a keyframe to a family with a single initial keyframe.
fn add_keyframe<K: DocumentKeyframe>(
    initial: &mut K,
    timeline: &mut Vec<K>,
    keyframe: MutableDocumentItem<'_, K>,
    frame_index: u32,
    already_exists: NanoemError,
) -> Result<Handle<K>, NanoemError> {
    let keyframe = keyframe.origin.into_owned(already_exists.clone())?;
    if frame_index == 0 {
        overwrite_initial_keyframe(initial, keyframe);
        return Ok(initial.handle());
    }
    resize_object_array(timeline)?;
    KeyframeTrack::new(slice::from_mut(initial), timeline).insert(
        keyframe,
        frame_index,
        None,
        already_exists,
    )
}

fn remove_keyframe<K: DocumentKeyframe>(
    initial: &mut K,
    timeline: &mut Vec<K>,
    handle: Handle<K>,
    not_found: NanoemError,
) -> Result<K, NanoemError> {
    KeyframeTrack::new(slice::from_mut(initial), timeline).remove(handle, not_found)
}

/// Mutable wrapper around a leaf entity such as a keyframe, a state or an outside parent.
#[derive(Debug)]
pub struct MutableDocumentItem<'a, T> {
    origin: ObjectOrigin<'a, T>,
}

impl<'a, T: Default> MutableDocumentItem<'a, T> {
    pub fn create() -> Self {
        Self::from_value(T::default())
    }
}

impl<'a, T> MutableDocumentItem<'a, T> {
    pub fn from_value(value: T) -> Self {
        Self {
            origin: ObjectOrigin::Owned(Box::new(value)),
        }
    }

    pub fn is_reference(&self) -> bool {
        self.origin.is_reference()
    }

    pub fn into_owned(self, error: NanoemError) -> Result<T, NanoemError> {
        self.origin.into_owned(error)
    }
}

impl<'a, T: Identified> MutableDocumentItem<'a, T> {
    pub fn create_as_reference(
        items: &'a mut [T],
        handle: Handle<T>,
        not_found: NanoemError,
    ) -> Result<Self, NanoemError> {
        let pos = find_by_handle(items, handle).ok_or(not_found)?;
        Ok(Self {
            origin: ObjectOrigin::Reference(&mut items[pos]),
        })
    }
}

impl<'a, T> Deref for MutableDocumentItem<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.origin
    }
}

impl<'a, T> DerefMut for MutableDocumentItem<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.origin
    }
}

pub type MutableDocumentAccessoryKeyframe<'a> = MutableDocumentItem<'a, DocumentAccessoryKeyframe>;
pub type MutableDocumentCameraKeyframe<'a> = MutableDocumentItem<'a, DocumentCameraKeyframe>;
pub type MutableDocumentGravityKeyframe<'a> = MutableDocumentItem<'a, DocumentGravityKeyframe>;
pub type MutableDocumentLightKeyframe<'a> = MutableDocumentItem<'a, DocumentLightKeyframe>;
pub type MutableDocumentSelfShadowKeyframe<'a> =
    MutableDocumentItem<'a, DocumentSelfShadowKeyframe>;
pub type MutableDocumentModelBoneKeyframe<'a> = MutableDocumentItem<'a, DocumentModelBoneKeyframe>;
pub type MutableDocumentModelMorphKeyframe<'a> =
    MutableDocumentItem<'a, DocumentModelMorphKeyframe>;
pub type MutableDocumentModelKeyframe<'a> = MutableDocumentItem<'a, DocumentModelKeyframe>;
pub type MutableDocumentModelBoneState<'a> = MutableDocumentItem<'a, DocumentModelBoneState>;
pub type MutableDocumentModelMorphState<'a> = MutableDocumentItem<'a, DocumentModelMorphState>;
pub type MutableDocumentModelConstraintState<'a> =
    MutableDocumentItem<'a, DocumentModelConstraintState>;
pub type MutableDocumentModelOutsideParentState<'a> =
    MutableDocumentItem<'a, DocumentModelOutsideParentState>;
pub type MutableDocumentOutsideParent<'a> = MutableDocumentItem<'a, DocumentOutsideParent>;

pub type MutableDocumentCamera<'a> = MutableDocumentItem<'a, DocumentCamera>;
pub type MutableDocumentLight<'a> = MutableDocumentItem<'a, DocumentLight>;
pub type MutableDocumentGravity<'a> = MutableDocumentItem<'a, DocumentGravity>;
pub type MutableDocumentSelfShadow<'a> = MutableDocumentItem<'a, DocumentSelfShadow>;

impl<'a> MutableDocumentItem<'a, DocumentCamera> {
    pub fn camera_of(document: &'a mut Document) -> Self {
        Self {
            origin: ObjectOrigin::Reference(&mut document.camera),
        }
    }

    pub fn add_camera_keyframe(
        &mut self,
        keyframe: MutableDocumentCameraKeyframe<'_>,
        frame_index: u32,
    ) -> Result<Handle<DocumentCameraKeyframe>, NanoemError> {
        let camera = &mut *self.origin;
        add_keyframe(
            &mut camera.initial_camera_keyframe,
            &mut camera.camera_keyframes,
            keyframe,
            frame_index,
            NanoemError::DocumentCameraKeyframeAlreadyExists,
        )
    }

    pub fn remove_camera_keyframe(
        &mut self,
        handle: Handle<DocumentCameraKeyframe>,
    ) -> Result<DocumentCameraKeyframe, NanoemError> {
        let camera = &mut *self.origin;
        remove_keyframe(
            &mut camera.initial_camera_keyframe,
            &mut camera.camera_keyframes,
            handle,
            NanoemError::DocumentCameraKeyframeNotFound,
        )
    }
}

impl<'a> MutableDocumentItem<'a, DocumentLight> {
    pub fn light_of(document: &'a mut Document) -> Self {
        Self {
            origin: ObjectOrigin::Reference(&mut document.light),
        }
    }

    pub fn add_light_keyframe(
        &mut self,
        keyframe: MutableDocumentLightKeyframe<'_>,
        frame_index: u32,
    ) -> Result<Handle<DocumentLightKeyframe>, NanoemError> {
        let light = &mut *self.origin;
        add_keyframe(
            &mut light.initial_light_keyframe,
            &mut light.light_keyframes,
            keyframe,
            frame_index,
            NanoemError::DocumentLightKeyframeAlreadyExists,
        )
    }

    pub fn remove_light_keyframe(
        &mut self,
        handle: Handle<DocumentLightKeyframe>,
    ) -> Result<DocumentLightKeyframe, NanoemError> {
        let light = &mut *self.origin;
        remove_keyframe(
            &mut light.initial_light_keyframe,
            &mut light.light_keyframes,
            handle,
            NanoemError::DocumentLightKeyframeNotFound,
        )
    }
}

impl<'a> MutableDocumentItem<'a, DocumentGravity> {
    pub fn gravity_of(document: &'a mut Document) -> Self {
        Self {
            origin: ObjectOrigin::Reference(&mut document.gravity),
        }
    }

    pub fn add_gravity_keyframe(
        &mut self,
        keyframe: MutableDocumentGravityKeyframe<'_>,
        frame_index: u32,
    ) -> Result<Handle<DocumentGravityKeyframe>, NanoemError> {
        let gravity = &mut *self.origin;
        add_keyframe(
            &mut gravity.initial_gravity_keyframe,
            &mut gravity.gravity_keyframes,
            keyframe,
            frame_index,
            NanoemError::DocumentGravityKeyframeAlreadyExists,
        )
    }

    pub fn remove_gravity_keyframe(
        &mut self,
        handle: Handle<DocumentGravityKeyframe>,
    ) -> Result<DocumentGravityKeyframe, NanoemError> {
        let gravity = &mut *self.origin;
        remove_keyframe(
            &mut gravity.initial_gravity_keyframe,
            &mut gravity.gravity_keyframes,
            handle,
            NanoemError::DocumentGravityKeyframeNotFound,
        )
    }
}

impl<'a> MutableDocumentItem<'a, DocumentSelfShadow> {
    pub fn self_shadow_of(document: &'a mut Document) -> Self {
        Self {
            origin: ObjectOrigin::Reference(&mut document.self_shadow),
        }
    }

    pub fn add_self_shadow_keyframe(
        &mut self,
        keyframe: MutableDocumentSelfShadowKeyframe<'_>,
        frame_index: u32,
    ) -> Result<Handle<DocumentSelfShadowKeyframe>, NanoemError> {
        let self_shadow = &mut *self.origin;
        add_keyframe(
            &mut self_shadow.initial_self_shadow_keyframe,
            &mut self_shadow.self_shadow_keyframes,
            keyframe,
            frame_index,
            NanoemError::DocumentSelfShadowKeyframeAlreadyExists,
        )
    }

    pub fn remove_self_shadow_keyframe(
        &mut self,
        handle: Handle<DocumentSelfShadowKeyframe>,
    ) -> Result<DocumentSelfShadowKeyframe, NanoemError> {
        let self_shadow = &mut *self.origin;
        remove_keyframe(
            &mut self_shadow.initial_self_shadow_keyframe,
            &mut self_shadow.self_shadow_keyframes,
            handle,
            NanoemError::DocumentSelfShadowKeyframeNotFound,
        )
    }
}

impl<'a> MutableDocumentItem<'a, DocumentOutsideParent> {
    pub fn set_model(&mut self, model_index: i32) {
        self.origin.model_index = model_index;
    }

    /// Points at `bone_name` of the model this outside parent refers to.
    pub fn set_bone_name(&mut self, document: &Document, bone_name: &str) -> Result<(), NanoemError> {
        let model = document
            .resolve_model(self.origin.model_index)
            .ok_or(NanoemError::DocumentModelNotFound)?;
        let ordinal = model
            .find_bone_index(bone_name)
            .ok_or_else(|| NanoemError::DocumentModelBoneNotFound(bone_name.to_owned()))?;
        self.origin.bone_index = ordinal as i32;
        Ok(())
    }
}

#[derive(Debug)]
pub struct MutableDocumentAccessory<'a> {
    origin: ObjectOrigin<'a, DocumentAccessory>,
}

impl<'a> MutableDocumentAccessory<'a> {
    pub fn create() -> Self {
        Self::from_value(DocumentAccessory::default())
    }

    pub fn from_value(accessory: DocumentAccessory) -> Self {
        Self {
            origin: ObjectOrigin::Owned(Box::new(accessory)),
        }
    }

    pub fn create_as_reference(
        document: &'a mut Document,
        handle: Handle<DocumentAccessory>,
    ) -> Result<Self, NanoemError> {
        let pos = find_by_handle(&document.accessories, handle)
            .ok_or(NanoemError::DocumentAccessoryNotFound)?;
        Ok(Self {
            origin: ObjectOrigin::Reference(&mut document.accessories[pos]),
        })
    }

    pub fn is_reference(&self) -> bool {
        self.origin.is_reference()
    }

    pub fn add_accessory_keyframe(
        &mut self,
        keyframe: MutableDocumentAccessoryKeyframe<'_>,
        frame_index: u32,
    ) -> Result<Handle<DocumentAccessoryKeyframe>, NanoemError> {
        let accessory = &mut *self.origin;
        add_keyframe(
            &mut accessory.initial_accessory_keyframe,
            &mut accessory.accessory_keyframes,
            keyframe,
            frame_index,
            NanoemError::DocumentAccessoryKeyframeAlreadyExists,
        )
    }

    pub fn remove_accessory_keyframe(
        &mut self,
        handle: Handle<DocumentAccessoryKeyframe>,
    ) -> Result<DocumentAccessoryKeyframe, NanoemError> {
        let accessory = &mut *self.origin;
        remove_keyframe(
            &mut accessory.initial_accessory_keyframe,
            &mut accessory.accessory_keyframes,
            handle,
            NanoemError::DocumentAccessoryKeyframeNotFound,
        )
    }

    pub fn set_parent_model_bone_name(
        &mut self,
        document: &Document,
        bone_name: &str,
    ) -> Result<(), NanoemError> {
        let model = document
            .resolve_model(self.origin.parent_model_index)
            .ok_or(NanoemError::DocumentModelNotFound)?;
        let ordinal = model
            .find_bone_index(bone_name)
            .ok_or_else(|| NanoemError::DocumentModelBoneNotFound(bone_name.to_owned()))?;
        self.origin.parent_model_bone_index = ordinal as i32;
        Ok(())
    }
}

impl<'a> Deref for MutableDocumentAccessory<'a> {
    type Target = DocumentAccessory;

    fn deref(&self) -> &DocumentAccessory {
        &self.origin
    }
}

impl<'a> DerefMut for MutableDocumentAccessory<'a> {
    fn deref_mut(&mut self) -> &mut DocumentAccessory {
        &mut self.origin
    }
}

/// Mutable project document, either created from scratch or editing a loaded one in place.
#[derive(Debug)]
pub struct MutableDocument<'a> {
    origin: ObjectOrigin<'a, Document>,
}

impl<'a> MutableDocument<'a> {
    pub fn create() -> Self {
        Self {
            origin: ObjectOrigin::Owned(Box::new(Document::default())),
        }
    }

    pub fn create_as_reference(document: &'a mut Document) -> Self {
        Self {
            origin: ObjectOrigin::Reference(document),
        }
    }

    pub fn document(&self) -> &Document {
        &self.origin
    }

    /// The owned document, [`NanoemError::NullObject`] for a reference.
    pub fn into_document(self) -> Result<Document, NanoemError> {
        self.origin.into_owned(NanoemError::NullObject)
    }

    pub fn insert_model(
        &mut self,
        model: MutableDocumentModel<'_>,
        index: i32,
    ) -> Result<Handle<DocumentModel>, NanoemError> {
        let model = model.into_owned(NanoemError::DocumentModelAlreadyExists)?;
        let handle = insert_object(
            &mut self.origin.models,
            model,
            index,
            DocumentParent::Document,
            NanoemError::DocumentModelAlreadyExists,
        )?;
        log::trace!("inserted model at {}", handle.index());
        Ok(handle)
    }

    pub fn remove_model(
        &mut self,
        handle: Handle<DocumentModel>,
    ) -> Result<DocumentModel, NanoemError> {
        remove_object(
            &mut self.origin.models,
            handle,
            NanoemError::DocumentModelNotFound,
        )
    }

    /// Inserts an accessory and its entry in the separately stored name table.
    pub fn insert_accessory(
        &mut self,
        accessory: MutableDocumentAccessory<'_>,
        index: i32,
    ) -> Result<Handle<DocumentAccessory>, NanoemError> {
        let accessory = accessory
            .origin
            .into_owned(NanoemError::DocumentAccessoryAlreadyExists)?;
        let name = accessory.name.clone();
        let document = &mut *self.origin;
        let handle = insert_object(
            &mut document.accessories,
            accessory,
            index,
            DocumentParent::Document,
            NanoemError::DocumentAccessoryAlreadyExists,
        )?;
        let pos = (handle.index() as usize).min(document.accessory_names.len());
        document.accessory_names.insert(pos, name);
        Ok(handle)
    }

    pub fn remove_accessory(
        &mut self,
        handle: Handle<DocumentAccessory>,
    ) -> Result<DocumentAccessory, NanoemError> {
        let document = &mut *self.origin;
        let accessory = remove_object(
            &mut document.accessories,
            handle,
            NanoemError::DocumentAccessoryNotFound,
        )?;
        if let Ok(pos) = usize::try_from(handle.index()) {
            if pos < document.accessory_names.len() {
                document.accessory_names.remove(pos);
            }
        }
        Ok(accessory)
    }

    pub fn set_accessory_name(
        &mut self,
        handle: Handle<DocumentAccessory>,
        name: &str,
    ) -> Result<(), NanoemError> {
        let document = &mut *self.origin;
        let pos = find_by_handle(&document.accessories, handle)
            .ok_or(NanoemError::DocumentAccessoryNotFound)?;
        document.accessories[pos].name = name.to_owned();
        if let Some(entry) = document.accessory_names.get_mut(pos) {
            *entry = name.to_owned();
        }
        Ok(())
    }

    /// Replaces the camera. A referenced camera is already owned by a tree and yields
    /// [`NanoemError::NullObject`].
    pub fn set_camera(&mut self, camera: MutableDocumentCamera<'_>) -> Result<(), NanoemError> {
        let mut camera = camera.into_owned(NanoemError::NullObject)?;
        camera.object.index = 0;
        camera.object.parent = DocumentParent::Document;
        self.origin.camera = camera;
        Ok(())
    }

    pub fn set_light(&mut self, light: MutableDocumentLight<'_>) -> Result<(), NanoemError> {
        let mut light = light.into_owned(NanoemError::NullObject)?;
        light.object.index = 0;
        light.object.parent = DocumentParent::Document;
        self.origin.light = light;
        Ok(())
    }

    pub fn set_gravity(&mut self, gravity: MutableDocumentGravity<'_>) -> Result<(), NanoemError> {
        let mut gravity = gravity.into_owned(NanoemError::NullObject)?;
        gravity.object.index = 0;
        gravity.object.parent = DocumentParent::Document;
        self.origin.gravity = gravity;
        Ok(())
    }

    pub fn set_self_shadow(
        &mut self,
        self_shadow: MutableDocumentSelfShadow<'_>,
    ) -> Result<(), NanoemError> {
        let mut self_shadow = self_shadow.into_owned(NanoemError::NullObject)?;
        self_shadow.object.index = 0;
        self_shadow.object.parent = DocumentParent::Document;
        self.origin.self_shadow = self_shadow;
        Ok(())
    }

    pub fn model_as_reference(
        &mut self,
        handle: Handle<DocumentModel>,
    ) -> Result<MutableDocumentModel<'_>, NanoemError> {
        MutableDocumentModel::create_as_reference(&mut self.origin, handle)
    }

    pub fn accessory_as_reference(
        &mut self,
        handle: Handle<DocumentAccessory>,
    ) -> Result<MutableDocumentAccessory<'_>, NanoemError> {
        MutableDocumentAccessory::create_as_reference(&mut self.origin, handle)
    }

    pub fn camera(&mut self) -> MutableDocumentCamera<'_> {
        MutableDocumentCamera::camera_of(&mut self.origin)
    }

    pub fn light(&mut self) -> MutableDocumentLight<'_> {
        MutableDocumentLight::light_of(&mut self.origin)
    }

    pub fn gravity(&mut self) -> MutableDocumentGravity<'_> {
        MutableDocumentGravity::gravity_of(&mut self.origin)
    }

    pub fn self_shadow(&mut self) -> MutableDocumentSelfShadow<'_> {
        MutableDocumentSelfShadow::self_shadow_of(&mut self.origin)
    }

    pub fn save_to_buffer(&self, buffer: &mut MutableBuffer) -> Result<(), NanoemError> {
        self.origin.save_to_buffer(buffer)
    }
}

impl<'a> Deref for MutableDocument<'a> {
    type Target = Document;

    fn deref(&self) -> &Document {
        &self.origin
    }
}

impl<'a> DerefMut for MutableDocument<'a> {
    fn deref_mut(&mut self) -> &mut Document {
        &mut self.origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentObject;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        object: DocumentObject,
        name: &'static str,
    }

    crate::impl_document_entity!(Item);

    fn item(name: &'static str) -> Item {
        Item {
            object: DocumentObject::new(DocumentParent::None),
            name,
        }
    }

    fn insert(items: &mut Vec<Item>, item: Item, index: i32) -> Handle<Item> {
        insert_object(
            items,
            item,
            index,
            DocumentParent::Document,
            NanoemError::DocumentModelAlreadyExists,
        )
        .unwrap()
    }

    #[test]
    fn test_insert_object_shifts_or_appends() {
        let mut items = vec![];
        insert(&mut items, item("first"), -1);
        insert(&mut items, item("second"), 1);
        insert(&mut items, item("third"), 0);
        let names: Vec<_> = items.iter().map(|item| item.name).collect();
        assert_eq!(vec!["third", "first", "second"], names);
        let indices: Vec<_> = items.iter().map(|item| item.object.index).collect();
        assert_eq!(vec![0, 1, 2], indices);
    }

    #[test]
    fn test_remove_object_compacts_and_detaches() {
        let mut items = vec![];
        let handles: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|name| insert(&mut items, item(name), -1))
            .collect();
        let removed =
            remove_object(&mut items, handles[1], NanoemError::DocumentModelNotFound).unwrap();
        assert_eq!(-1, removed.object.index);
        assert_eq!(DocumentParent::None, removed.object.parent);
        assert_eq!(1, items[1].object.index);
        assert_eq!(
            Err(NanoemError::DocumentModelNotFound),
            remove_object(&mut items, handles[1], NanoemError::DocumentModelNotFound)
        );
    }

    #[test]
    fn test_insert_object_rejects_attached_items() {
        let mut items = vec![];
        let handle = insert(&mut items, item("a"), -1);
        let copy = items[0].clone();
        assert_eq!(
            Err(NanoemError::DocumentModelAlreadyExists),
            insert_object(
                &mut items,
                copy,
                -1,
                DocumentParent::Document,
                NanoemError::DocumentModelAlreadyExists,
            )
        );
        assert_eq!(1, items.len());
        let removed =
            remove_object(&mut items, handle, NanoemError::DocumentModelNotFound).unwrap();
        insert(&mut items, removed, -1);
        assert_eq!(1, items.len());
    }

    #[test]
    fn test_resize_object_array_grows_geometrically() {
        let mut items: Vec<u32> = vec![];
        resize_object_array(&mut items).unwrap();
        assert!(items.capacity() >= DEFAULT_OBJECT_CAPACITY);
        items.extend(0..items.capacity() as u32);
        let capacity = items.capacity();
        resize_object_array(&mut items).unwrap();
        assert!(items.capacity() >= capacity * 2);
    }

    #[test]
    fn test_frame_zero_overwrites_initial_light_keyframe() {
        let mut document = MutableDocument::create();
        let initial_handle = document.light.initial_light_keyframe.handle();
        let mut keyframe = MutableDocumentLightKeyframe::create();
        keyframe.color = crate::common::F128::from_vec3(1.0, 0.0, 0.0);
        let handle = document.light().add_light_keyframe(keyframe, 0).unwrap();
        assert_eq!(initial_handle, handle);
        assert_eq!(1.0, document.light.initial_light_keyframe.color.0[0]);
        assert!(document.light.light_keyframes.is_empty());
        assert_eq!(
            Err(NanoemError::DocumentLightKeyframeNotFound),
            document.light().remove_light_keyframe(handle)
        );
    }

    #[test]
    fn test_reference_camera_cannot_replace_camera() {
        let mut source = Document::default();
        let camera = MutableDocumentCamera::camera_of(&mut source);
        let mut document = MutableDocument::create();
        assert_eq!(Err(NanoemError::NullObject), document.set_camera(camera));
    }

    #[test]
    fn test_accessory_names_follow_accessories() {
        let mut document = MutableDocument::create();
        let mut first = MutableDocumentAccessory::create();
        first.name = "stage".to_owned();
        let mut second = MutableDocumentAccessory::create();
        second.name = "light".to_owned();
        document.insert_accessory(first, -1).unwrap();
        document.insert_accessory(second, 0).unwrap();
        assert_eq!(vec!["light", "stage"], document.accessory_names);
        let stage = document.accessories[1].handle();
        document.remove_accessory(stage).unwrap();
        assert_eq!(vec!["light"], document.accessory_names);
    }
}
