use std::slice;

use nanoem::{
    common::{Buffer, NanoemError, F128},
    document::{
        keyframe::next_keyframe, object::Identified, Document, DocumentModel, DocumentVersion, ExternalModel,
        ParseModelCallback,
    },
    mutable::{
        common::MutableBuffer,
        document::{
            MutableDocument, MutableDocumentAccessory, MutableDocumentAccessoryKeyframe,
            MutableDocumentCameraKeyframe, MutableDocumentGravityKeyframe,
            MutableDocumentLightKeyframe, MutableDocumentModel, MutableDocumentModelBoneKeyframe,
            MutableDocumentModelConstraintState, MutableDocumentModelKeyframe,
            MutableDocumentModelMorphKeyframe, MutableDocumentModelOutsideParentState,
            MutableDocumentOutsideParent, MutableDocumentSelfShadowKeyframe,
        },
    },
};

const BONES: [&str; 5] = ["センター", "上半身", "首", "Arm_L", "右足ＩＫ"];
const MORPHS: [&str; 2] = ["まばたき", "あ"];

fn external_model(_path: &str) -> Result<ExternalModel, NanoemError> {
    Ok(ExternalModel {
        bone_names: BONES.iter().map(|name| name.to_string()).collect(),
        morph_names: MORPHS.iter().map(|name| name.to_string()).collect(),
        constraint_bone_indices: vec![4],
    })
}

fn save(document: &Document) -> Vec<u8> {
    let mut buffer = MutableBuffer::create().unwrap();
    document.save_to_buffer(&mut buffer).unwrap();
    buffer.into_bytes()
}

fn load(bytes: &[u8], with_callback: bool) -> Result<Document, NanoemError> {
    let mut buffer = Buffer::from_slice(bytes);
    let mut loader = external_model;
    let callback: Option<&mut dyn ParseModelCallback> = if with_callback {
        Some(&mut loader)
    } else {
        None
    };
    let document = Document::load_from_buffer(&mut buffer, callback)?;
    assert!(buffer.is_end());
    Ok(document)
}

fn build_model(version: DocumentVersion) -> MutableDocumentModel<'static> {
    let mut model = MutableDocumentModel::create();
    model.name_ja = "初音ミク".to_owned();
    if version.is_v2() {
        model.name_en = "Hatsune Miku".to_owned();
    }
    model.path = "C:/MMD/UserFile/Model/miku.pmd".to_owned();
    model.selection_index = 7;
    for bone in BONES {
        model.register_bone(bone).unwrap();
    }
    for morph in MORPHS {
        model.register_morph(morph).unwrap();
    }
    model
        .add_constraint_state(MutableDocumentModelConstraintState::create(), "右足ＩＫ")
        .unwrap();
    for (frame_index, bone) in [(10, "Arm_L"), (10, "首"), (30, "Arm_L"), (20, "Arm_L")] {
        let mut keyframe = MutableDocumentModelBoneKeyframe::create();
        keyframe.translation = F128::from_vec3(frame_index as f32, 1.0, 2.0);
        model.add_bone_keyframe(keyframe, bone, frame_index).unwrap();
    }
    let mut morph = MutableDocumentModelMorphKeyframe::create();
    morph.weight = 0.5;
    model.add_morph_keyframe(morph, "まばたき", 15).unwrap();
    let mut keyframe = MutableDocumentModelKeyframe::create();
    keyframe.visible = false;
    keyframe
        .set_constraint_enabled(&model, "右足ＩＫ", false)
        .unwrap();
    if version.is_v2() {
        model.add_outside_parent_subject_bone("センター").unwrap();
        let mut outside_parent = MutableDocumentOutsideParent::create();
        outside_parent.model_index = 0;
        outside_parent.bone_index = 1;
        keyframe.insert_outside_parent(outside_parent, -1).unwrap();
        let mut state = MutableDocumentModelOutsideParentState::create();
        state.begin = 0;
        state.end = 120;
        state.outside_parent.model_index = 0;
        state.outside_parent.bone_index = 1;
        model.insert_outside_parent_state(state, -1).unwrap();
    }
    model.add_model_keyframe(keyframe, 40).unwrap();
    model
}

fn build_document(version: DocumentVersion) -> Document {
    let mut document = MutableDocument::create();
    document.version = version;
    document.audio_path = "C:/MMD/UserFile/Wave/song.wav".to_owned();
    document.unknown_matrix[5] = 1.5;
    document.unknown_boolean = true;
    document.insert_model(build_model(version), -1).unwrap();

    let mut accessory = MutableDocumentAccessory::create();
    accessory.name = "ステージ".to_owned();
    accessory.path = "C:/MMD/UserFile/Accessory/stage.x".to_owned();
    accessory.opacity = 0.37;
    accessory.visible = false;
    let mut keyframe = MutableDocumentAccessoryKeyframe::create();
    keyframe.scale_factor = 2.0;
    accessory.add_accessory_keyframe(keyframe, 15).unwrap();
    document.insert_accessory(accessory, -1).unwrap();

    for frame_index in [10, 30, 20] {
        let mut keyframe = MutableDocumentCameraKeyframe::create();
        keyframe.fov = 20 + frame_index as i32;
        keyframe.parent_model_index = 0;
        keyframe.parent_model_bone_index = 3;
        document
            .camera()
            .add_camera_keyframe(keyframe, frame_index)
            .unwrap();
    }
    let mut light = MutableDocumentLightKeyframe::create();
    light.color = F128::from_vec3(1.0, 0.5, 0.25);
    document.light().add_light_keyframe(light, 5).unwrap();
    let mut gravity = MutableDocumentGravityKeyframe::create();
    gravity.acceleration = 5.0;
    document.gravity().add_gravity_keyframe(gravity, 8).unwrap();
    document.gravity.acceleration = 5.0;
    let mut self_shadow = MutableDocumentSelfShadowKeyframe::create();
    self_shadow.mode = 2;
    document
        .self_shadow()
        .add_self_shadow_keyframe(self_shadow, 12)
        .unwrap();
    document.into_document().unwrap()
}

#[test]
fn test_v2_round_trip_is_byte_exact() {
    let bytes = save(&build_document(DocumentVersion::V2));
    let loaded = load(&bytes, false).unwrap();
    assert_eq!(DocumentVersion::V2, loaded.version);
    assert_eq!(bytes, save(&loaded));
    let model = &loaded.models[0];
    assert_eq!("初音ミク", model.name_ja);
    assert_eq!("Hatsune Miku", model.name_en);
    assert_eq!(7, model.selection_index);
    assert_eq!(1.5, loaded.unknown_matrix[5]);
    assert!(loaded.unknown_boolean);
    assert_eq!(Some("センター"), model.outside_parent_subject_bone_name(0));
    assert_eq!(
        Some("上半身"),
        model.model_keyframes[0].outside_parents[0].bone_name(&loaded)
    );
    assert_eq!(vec!["ステージ"], loaded.accessory_names);
}

#[test]
fn test_v1_round_trip_with_model_callback() {
    let bytes = save(&build_document(DocumentVersion::V1));
    let loaded = load(&bytes, true).unwrap();
    assert_eq!(DocumentVersion::V1, loaded.version);
    assert_eq!(bytes, save(&loaded));
    let model = &loaded.models[0];
    assert_eq!(BONES.len(), model.bone_names.len());
    assert_eq!(Some("右足ＩＫ"), model.constraint_bone_name(0));
    assert!(!model.model_keyframes[0].constraint_states[0].enabled);
    assert!(model.outside_parent_subject_bone_indices.is_empty());
}

#[test]
fn test_v1_model_without_callback_is_null_object() {
    let bytes = save(&build_document(DocumentVersion::V1));
    assert_eq!(Err(NanoemError::NullObject), load(&bytes, false));
}

#[test]
fn test_version_branching_of_v2_only_fields() {
    let v1 = load(&save(&build_document(DocumentVersion::V1)), true).unwrap();
    let v2 = load(&save(&build_document(DocumentVersion::V2)), false).unwrap();
    assert_eq!(9.8f32, v1.gravity.acceleration);
    assert!(v1.gravity.gravity_keyframes.is_empty());
    assert_eq!(5.0f32, v2.gravity.acceleration);
    assert_eq!(1, v2.gravity.gravity_keyframes.len());
    assert_eq!(2, v2.self_shadow.self_shadow_keyframes[0].mode);
    assert_eq!(-1, v1.camera.camera_keyframes[0].parent_model_index);
    assert_eq!(0, v2.camera.camera_keyframes[0].parent_model_index);
    assert_eq!(
        Some("Arm_L"),
        v2.camera.camera_keyframes[0].parent_model_bone_name(&v2)
    );
    assert!(v1.models[0].name_en.is_empty());
    assert!(v1.models[0].outside_parent_states.is_empty());
    assert!(!v1.unknown_boolean);
}

#[test]
fn test_camera_keyframes_link_in_frame_order() {
    let document = load(&save(&build_document(DocumentVersion::V2)), false).unwrap();
    let camera = &document.camera;
    let initial = slice::from_ref(&camera.initial_camera_keyframe);
    let mut frames = vec![camera.initial_camera_keyframe.base.frame_index];
    let mut current = &camera.initial_camera_keyframe;
    while let Some(next) = next_keyframe(initial, &camera.camera_keyframes, current) {
        frames.push(next.base.frame_index);
        current = next;
    }
    assert_eq!(vec![0, 10, 20, 30], frames);
    let (previous, next) = camera.search_closest_camera_keyframes(25);
    assert_eq!(Some(20), previous.map(|keyframe| keyframe.base.frame_index));
    assert_eq!(Some(30), next.map(|keyframe| keyframe.base.frame_index));
    let (previous, next) = camera.search_closest_camera_keyframes(40);
    assert_eq!(Some(30), previous.map(|keyframe| keyframe.base.frame_index));
    assert!(next.is_none());
}

#[test]
fn test_bone_keyframe_names_resolve_through_chain() {
    let document = load(&save(&build_document(DocumentVersion::V2)), false).unwrap();
    let model = &document.models[0];
    assert_eq!(Some(3), model.find_bone_index("Arm_L"));
    let arm: Vec<_> = model
        .bone_keyframes
        .iter()
        .filter(|keyframe| model.bone_keyframe_name(keyframe) == Some("Arm_L"))
        .map(|keyframe| keyframe.base.frame_index)
        .collect();
    assert_eq!(vec![10, 30, 20], arm);
    let neck = model.find_bone_keyframe("首", 10).unwrap();
    assert_eq!(Some("首"), model.bone_keyframe_name(neck));
    let (previous, next) = model.search_closest_bone_keyframes("Arm_L", 25);
    assert_eq!(20.0, previous.unwrap().translation.0[0]);
    assert_eq!(30.0, next.unwrap().translation.0[0]);
    let initial = &model.initial_bone_keyframes[3];
    assert_eq!(Some("Arm_L"), model.bone_keyframe_name(initial));
    assert_eq!(
        Some("まばたき"),
        model.morph_keyframe_name(&model.morph_keyframes[0])
    );
}

#[test]
fn test_removed_keyframe_is_reset_and_timeline_compacted() {
    let mut document = build_document(DocumentVersion::V2);
    let mut mutable = MutableDocument::create_as_reference(&mut document);
    assert_eq!(10, mutable.camera.camera_keyframes[0].base.frame_index);
    let handle = mutable.camera.camera_keyframes[0].handle();
    let removed = mutable.camera().remove_camera_keyframe(handle).unwrap();
    assert_eq!(0, removed.base.frame_index);
    assert_eq!(0, removed.base.object_index);
    let indices: Vec<_> = mutable
        .camera
        .camera_keyframes
        .iter()
        .map(|keyframe| keyframe.base.object_index)
        .collect();
    assert_eq!(vec![1, 2], indices);
    assert_eq!(
        Err(NanoemError::DocumentCameraKeyframeNotFound),
        mutable.camera().remove_camera_keyframe(handle)
    );
}

#[test]
fn test_accessory_opacity_survives_packing() {
    let document = load(&save(&build_document(DocumentVersion::V2)), false).unwrap();
    let accessory = &document.accessories[0];
    assert!((accessory.opacity - 0.37).abs() < 0.01);
    assert!(!accessory.visible);
    assert_eq!(2.0, accessory.accessory_keyframes[0].scale_factor);
}

#[test]
fn test_missing_selection_trailer_defaults_to_zero() {
    let mut bytes = save(&build_document(DocumentVersion::V2));
    bytes.truncate(bytes.len() - 5);
    let document = load(&bytes, false).unwrap();
    assert_eq!(0, document.models[0].selection_index);
}

#[test]
fn test_detached_model_index_is_not_truncated_on_save() {
    let mut document = build_document(DocumentVersion::V2);
    document.models[0].object.index = -1;
    let mut buffer = MutableBuffer::create().unwrap();
    assert_eq!(
        Err(NanoemError::DocumentModelCorrupted),
        document.save_to_buffer(&mut buffer)
    );
}

#[test]
fn test_truncated_document_reports_corruption() {
    let bytes = save(&build_document(DocumentVersion::V2));
    let error = load(&bytes[..200], false).unwrap_err();
    assert_eq!(NanoemError::DocumentModelCorrupted, error);
}

#[test]
fn test_minimal_document_defaults() {
    let document = MutableDocument::create();
    let mut buffer = MutableBuffer::create().unwrap();
    document.save_to_buffer(&mut buffer).unwrap();
    let loaded = load(buffer.as_bytes(), false).unwrap();
    assert_eq!(30, loaded.camera.initial_camera_keyframe.fov);
    assert_eq!(-45.0, loaded.camera.initial_camera_keyframe.distance);
    assert_eq!(9.8f32, loaded.gravity.acceleration);
    assert_eq!(10, loaded.gravity.noise);
    assert_eq!(0.01125f32, loaded.self_shadow.distance);
    assert_eq!(1, loaded.self_shadow.initial_self_shadow_keyframe.mode);
    assert_eq!(F128::from_vec3(0.6, 0.6, 0.6), loaded.light.color);
}

#[test]
fn test_insert_models_by_index() {
    let mut document = MutableDocument::create();
    for (name, index) in [("first", -1), ("second", 1), ("third", 0)] {
        let mut model = MutableDocumentModel::create();
        model.name_ja = name.to_owned();
        document.insert_model(model, index).unwrap();
    }
    let names: Vec<_> = document
        .models
        .iter()
        .map(|model| model.name_ja.as_str())
        .collect();
    assert_eq!(vec!["third", "first", "second"], names);
    assert!(document.find_model_by_name("second").is_some());
}

#[test]
fn test_model_already_in_a_document_cannot_be_inserted() {
    let mut source = MutableDocument::create();
    let handle = source
        .insert_model(MutableDocumentModel::create(), -1)
        .unwrap();
    let mut source = source.into_document().unwrap();
    let reference = MutableDocumentModel::create_as_reference(&mut source, handle).unwrap();
    assert!(reference.is_reference());
    let mut target = MutableDocument::create();
    assert_eq!(
        Err(NanoemError::DocumentModelAlreadyExists),
        target.insert_model(reference, -1)
    );
}

#[test]
fn test_same_model_cannot_be_inserted_twice() {
    let mut document = MutableDocument::create();
    let handle = document
        .insert_model(MutableDocumentModel::create(), -1)
        .unwrap();
    let copy = document.document().models[0].clone();
    assert_eq!(
        Err(NanoemError::DocumentModelAlreadyExists),
        document.insert_model(MutableDocumentModel::from_value(copy), -1)
    );
    let removed = document.remove_model(handle).unwrap();
    document
        .insert_model(MutableDocumentModel::from_value(removed), -1)
        .unwrap();
    assert_eq!(1, document.document().models.len());
}

#[test]
fn test_bone_chains_reach_their_initial_keyframe_after_edits() {
    let mut model = MutableDocumentModel::create();
    let bones = ["センター", "Arm_L"];
    for bone in bones {
        model.register_bone(bone).unwrap();
    }
    let mut expected: Vec<&str> = vec![];
    let mut seed = 0x2545_f491u32;
    for step in 0..200 {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let roll = seed >> 16;
        if roll % 3 == 0 && !model.bone_keyframes.is_empty() {
            let pos = roll as usize % model.bone_keyframes.len();
            let handle = model.bone_keyframes[pos].handle();
            model.remove_bone_keyframe(handle).unwrap();
            expected.remove(pos);
        } else {
            let bone = bones[roll as usize % bones.len()];
            let frame_index = 1 + roll % 40;
            match model.add_bone_keyframe(
                MutableDocumentModelBoneKeyframe::create(),
                bone,
                frame_index,
            ) {
                Ok(_) => expected.push(bone),
                Err(err) => assert_eq!(
                    NanoemError::DocumentModelBoneKeyframeAlreadyExists,
                    err,
                    "step {}",
                    step
                ),
            }
        }

        let num_initial = model.initial_bone_keyframes.len();
        let combined = num_initial + model.bone_keyframes.len();
        for (keyframe, bone) in model.bone_keyframes.iter().zip(&expected) {
            let mut current = keyframe;
            let mut hops = 0;
            let ordinal = loop {
                hops += 1;
                assert!(hops <= combined, "step {}: chain does not terminate", step);
                let previous = current.base.previous_keyframe_index;
                if (0..num_initial as i32).contains(&previous) {
                    break previous as usize;
                }
                let earlier = model
                    .bone_keyframes
                    .iter()
                    .find(|other| other.base.object_index == previous)
                    .unwrap();
                assert!(earlier.base.frame_index < current.base.frame_index);
                current = earlier;
            };
            assert_eq!(*bone, bones[ordinal], "step {}", step);
            assert_eq!(Some(*bone), model.bone_keyframe_name(keyframe));
        }
        for (ordinal, bone) in bones.iter().enumerate() {
            let mut frames = vec![];
            let mut current = next_keyframe(
                &model.initial_bone_keyframes,
                &model.bone_keyframes,
                &model.initial_bone_keyframes[ordinal],
            );
            while let Some(keyframe) = current {
                frames.push(keyframe.base.frame_index);
                current = next_keyframe(
                    &model.initial_bone_keyframes,
                    &model.bone_keyframes,
                    keyframe,
                );
            }
            let count = expected.iter().filter(|other| *other == bone).count();
            assert_eq!(count, frames.len(), "step {}", step);
            assert!(frames.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }
}

#[test]
fn test_create_as_reference_checks_identity() {
    let mut document = MutableDocument::create();
    let handle = document
        .insert_model(MutableDocumentModel::create(), -1)
        .unwrap();
    assert!(document.model_as_reference(handle).is_ok());

    let mut other = MutableDocument::create();
    other
        .insert_model(MutableDocumentModel::create(), -1)
        .unwrap();
    assert_eq!(
        Err(NanoemError::DocumentModelNotFound),
        other.model_as_reference(handle).map(|_| ())
    );

    let removed: DocumentModel = document.remove_model(handle).unwrap();
    assert_eq!(-1, removed.object.index);
    assert_eq!(
        Err(NanoemError::DocumentModelNotFound),
        document.model_as_reference(handle).map(|_| ())
    );
    assert_eq!(
        Err(NanoemError::DocumentModelNotFound),
        document.remove_model(handle).map(|_| ())
    );
}

#[test]
fn test_editing_a_loaded_document_in_place() {
    let mut document = load(&save(&build_document(DocumentVersion::V2)), false).unwrap();
    let handle = document.models[0].handle();
    {
        let mut model = MutableDocumentModel::create_as_reference(&mut document, handle).unwrap();
        let mut keyframe = MutableDocumentModelBoneKeyframe::create();
        keyframe.translation = F128::from_vec3(25.0, 0.0, 0.0);
        model.add_bone_keyframe(keyframe, "Arm_L", 25).unwrap();
        assert_eq!(
            Err(NanoemError::DocumentModelBoneKeyframeAlreadyExists),
            model.add_bone_keyframe(MutableDocumentModelBoneKeyframe::create(), "Arm_L", 25)
        );
    }
    let bytes = save(&document);
    let loaded = load(&bytes, false).unwrap();
    let model = &loaded.models[0];
    let (previous, next) = model.search_closest_bone_keyframes("Arm_L", 26);
    assert_eq!(25, previous.unwrap().base.frame_index);
    assert_eq!(30, next.unwrap().base.frame_index);
    assert_eq!(bytes, save(&loaded));
}
