use std::mem::size_of;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NanoemError {
    #[error("null object is referred")]
    NullObject,
    #[error("failed to allocate memory")]
    MallocFailed,
    #[error("failed to reallocate memory")]
    ReallocFailed,
    #[error("buffer is end")]
    BufferEnd,
    #[error("finished loading but buffer is not end")]
    BufferNotEnd,
    #[error("failed to decode jis string")]
    DecodeJisStringFailed,
    #[error("failed to encode jis string")]
    EncodeJisStringFailed,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("accessory already exists")]
    DocumentAccessoryAlreadyExists,
    #[error("accessory is not found")]
    DocumentAccessoryNotFound,
    #[error("the accessory keyframe already exists")]
    DocumentAccessoryKeyframeAlreadyExists,
    #[error("the accessory keyframe is not found")]
    DocumentAccessoryKeyframeNotFound,
    #[error("the camera keyframe already exists")]
    DocumentCameraKeyframeAlreadyExists,
    #[error("the camera keyframe is not found")]
    DocumentCameraKeyframeNotFound,
    #[error("the gravity keyframe already exists")]
    DocumentGravityKeyframeAlreadyExists,
    #[error("the gravity keyframe is not found")]
    DocumentGravityKeyframeNotFound,
    #[error("the light keyframe already exists")]
    DocumentLightKeyframeAlreadyExists,
    #[error("the light keyframe is not found")]
    DocumentLightKeyframeNotFound,
    #[error("model already exists")]
    DocumentModelAlreadyExists,
    #[error("model is not found")]
    DocumentModelNotFound,
    #[error("bone `{0}` is not found in the model")]
    DocumentModelBoneNotFound(String),
    #[error("morph `{0}` is not found in the model")]
    DocumentModelMorphNotFound(String),
    #[error("the bone keyframe already exists")]
    DocumentModelBoneKeyframeAlreadyExists,
    #[error("the bone keyframe is not found")]
    DocumentModelBoneKeyframeNotFound,
    #[error("IK constraint state already exists")]
    DocumentModelConstraintStateAlreadyExists,
    #[error("IK constraint state is not found")]
    DocumentModelConstraintStateNotFound,
    #[error("the model keyframe already exists")]
    DocumentModelModelKeyframeAlreadyExists,
    #[error("the model keyframe is not found")]
    DocumentModelModelKeyframeNotFound,
    #[error("the morph keyframe already exists")]
    DocumentModelMorphKeyframeAlreadyExists,
    #[error("the morph keyframe is not found")]
    DocumentModelMorphKeyframeNotFound,
    #[error("model outside parent already exists")]
    DocumentModelOutsideParentAlreadyExists,
    #[error("model outside parent is not found")]
    DocumentModelOutsideParentNotFound,
    #[error("model outside parent state already exists")]
    DocumentModelOutsideParentStateAlreadyExists,
    #[error("model outside parent state is not found")]
    DocumentModelOutsideParentStateNotFound,
    #[error("the self shadow keyframe already exists")]
    DocumentSelfShadowKeyframeAlreadyExists,
    #[error("the self shadow keyframe is not found")]
    DocumentSelfShadowKeyframeNotFound,
    #[error("accessory data is corrupted")]
    DocumentAccessoryCorrupted,
    #[error("the accessory keyframe is corrupted")]
    DocumentAccessoryKeyframeCorrupted,
    #[error("camera data is corrupted")]
    DocumentCameraCorrupted,
    #[error("the camera keyframe is corrupted")]
    DocumentCameraKeyframeCorrupted,
    #[error("gravity data is corrupted")]
    DocumentGravityCorrupted,
    #[error("the gravity keyframe is corrupted")]
    DocumentGravityKeyframeCorrupted,
    #[error("light data is corrupted")]
    DocumentLightCorrupted,
    #[error("the light keyframe is corrupted")]
    DocumentLightKeyframeCorrupted,
    #[error("model data is corrupted")]
    DocumentModelCorrupted,
    #[error("the model keyframe is corrupted")]
    DocumentModelKeyframeCorrupted,
    #[error("the bone keyframe is corrupted")]
    DocumentModelBoneKeyframeCorrupted,
    #[error("the bone state is corrupted")]
    DocumentModelBoneStateCorrupted,
    #[error("the IK constraint state is corrupted")]
    DocumentModelConstraintStateCorrupted,
    #[error("the morph keyframe is corrupted")]
    DocumentModelMorphKeyframeCorrupted,
    #[error("the morph state is corrupted")]
    DocumentModelMorphStateCorrupted,
    #[error("the model outside parent is corrupted")]
    DocumentModelOutsideParentCorrupted,
    #[error("self shadow data is corrupted")]
    DocumentSelfShadowCorrupted,
    #[error("the self shadow keyframe is corrupted")]
    DocumentSelfShadowKeyframeCorrupted,
}

impl NanoemError {
    /// Replaces a bare end-of-buffer with the entity specific corruption.
    /// Anything more specific raised deeper in the call chain is kept as is.
    pub fn or_corrupted(self, corrupted: NanoemError) -> NanoemError {
        match self {
            NanoemError::BufferEnd => corrupted,
            other => other,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[repr(align(16))]
pub struct F128(pub [f32; 4]);

impl F128 {
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self([x, y, z, w])
    }

    pub const fn from_vec3(x: f32, y: f32, z: f32) -> Self {
        Self([x, y, z, 0f32])
    }
}

#[macro_export]
macro_rules! read_primitive {
    ($typ: ty, $read_typ:ident) => {
        pub fn $read_typ(&mut self) -> Result<$typ, NanoemError> {
            let typ_len = size_of::<$typ>();
            let bytes = self
                .data
                .get(self.offset..self.offset + typ_len)
                .and_then(|slice| slice.try_into().ok())
                .ok_or(NanoemError::BufferEnd)?;
            self.offset += typ_len;
            Ok(<$typ>::from_le_bytes(bytes))
        }
    };
}

pub struct Buffer {
    data: Vec<u8>,
    offset: usize,
}

impl Buffer {
    pub fn create(data: Vec<u8>) -> Buffer {
        Buffer { data, offset: 0 }
    }

    pub fn from_slice(data: &[u8]) -> Buffer {
        Self::create(data.to_vec())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn can_read_len(&self, len: usize) -> bool {
        self.len() >= self.offset && self.len() - self.offset >= len
    }

    pub fn is_end(&self) -> bool {
        self.len() <= self.offset
    }

    pub fn skip(&mut self, skip: usize) -> Result<(), NanoemError> {
        if self.can_read_len(skip) {
            self.offset += skip;
            Ok(())
        } else {
            Err(NanoemError::BufferEnd)
        }
    }

    pub fn seek(&mut self, position: usize) -> Result<(), NanoemError> {
        if position <= self.len() {
            self.offset = position;
            Ok(())
        } else {
            Err(NanoemError::BufferEnd)
        }
    }

    pub fn read_byte(&mut self) -> Result<u8, NanoemError> {
        let result = *self.data.get(self.offset).ok_or(NanoemError::BufferEnd)?;
        self.offset += 1;
        Ok(result)
    }

    pub fn read_bool(&mut self) -> Result<bool, NanoemError> {
        Ok(self.read_byte()? != 0)
    }

    read_primitive!(u16, read_u16_little_endian);
    read_primitive!(i16, read_i16_little_endian);
    read_primitive!(u32, read_u32_little_endian);
    read_primitive!(i32, read_i32_little_endian);
    read_primitive!(f32, read_f32_little_endian);

    pub fn read_f32_3_little_endian(&mut self) -> Result<F128, NanoemError> {
        Ok(F128([
            self.read_f32_little_endian()?,
            self.read_f32_little_endian()?,
            self.read_f32_little_endian()?,
            0.0f32,
        ]))
    }

    pub fn read_f32_4_little_endian(&mut self) -> Result<F128, NanoemError> {
        Ok(F128([
            self.read_f32_little_endian()?,
            self.read_f32_little_endian()?,
            self.read_f32_little_endian()?,
            self.read_f32_little_endian()?,
        ]))
    }

    /// Reads a signed element count and checks that at least `count` bytes remain.
    /// Every element occupies one byte at minimum, so a larger count cannot be valid.
    pub fn read_count(&mut self) -> Result<usize, NanoemError> {
        let count = self.read_i32_little_endian()?;
        if count < 0 || !self.can_read_len(count as usize) {
            Err(NanoemError::BufferEnd)
        } else {
            Ok(count as usize)
        }
    }

    pub fn read_buffer(&mut self, len: usize) -> Result<&[u8], NanoemError> {
        if self.can_read_len(len) {
            let result = &self.data[self.offset..self.offset + len];
            self.offset += len;
            Ok(result)
        } else {
            Err(NanoemError::BufferEnd)
        }
    }

    /// Fixed width field, NUL terminated inside the field.
    ///
    /// Bytes after the terminator are dropped, so padding garbage left by other writers
    /// comes back as zeros when the field is written again.
    pub fn read_string_from_cp932(&mut self, max_capacity: usize) -> Result<String, NanoemError> {
        let mut src = self.read_buffer(max_capacity)?;
        if let Some(pos) = src.iter().position(|c| *c == 0u8) {
            src = src.split_at(pos).0;
        }
        let (cow, _, had_errors) = encoding_rs::SHIFT_JIS.decode(src);
        if had_errors {
            Err(NanoemError::DecodeJisStringFailed)
        } else {
            Ok(cow.into())
        }
    }

    /// One byte length followed by that many bytes.
    pub fn read_variable_string_from_cp932(&mut self) -> Result<String, NanoemError> {
        let len = self.read_byte()? as usize;
        let src = self.read_buffer(len)?;
        let (cow, _, had_errors) = encoding_rs::SHIFT_JIS.decode(src);
        if had_errors {
            Err(NanoemError::DecodeJisStringFailed)
        } else {
            Ok(cow.into())
        }
    }
}

#[test]
fn test_from_le_to_u16() {
    let data: [u8; 2] = [20, 16];
    assert_eq!(2, size_of::<u16>());
    assert_eq!(
        ((data[1] as u16) << 8) | data[0] as u16,
        u16::from_le_bytes(data)
    );
}

#[test]
fn test_buffer_read_primitive() {
    let mut buffer = Buffer::create(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13]);
    assert_eq!(Ok(1), buffer.read_byte());
    assert_eq!(Ok((3 << 8) | 2), buffer.read_u16_little_endian());
    assert_eq!(
        Ok(i32::from_le_bytes([4, 5, 6, 7])),
        buffer.read_i32_little_endian()
    );
    assert_eq!(7, buffer.offset());
}

#[test]
fn test_buffer_read_past_end() {
    let mut buffer = Buffer::create(vec![1, 2, 3]);
    assert_eq!(Err(NanoemError::BufferEnd), buffer.read_u32_little_endian());
    assert_eq!(0, buffer.offset());
    assert_eq!(Err(NanoemError::BufferEnd), buffer.skip(4));
    assert!(buffer.skip(3).is_ok());
    assert!(buffer.is_end());
    assert_eq!(Err(NanoemError::BufferEnd), buffer.read_byte());
}

#[test]
fn test_read_count_rejects_oversized() {
    let mut buffer = Buffer::create(vec![10, 0, 0, 0, 1, 2]);
    assert_eq!(Err(NanoemError::BufferEnd), buffer.read_count());
    let mut buffer = Buffer::create(vec![0xff, 0xff, 0xff, 0xff]);
    assert_eq!(Err(NanoemError::BufferEnd), buffer.read_count());
    let mut buffer = Buffer::create(vec![2, 0, 0, 0, 1, 2]);
    assert_eq!(Ok(2), buffer.read_count());
}

#[test]
fn test_read_fixed_string_stops_at_nul() {
    let mut buffer = Buffer::create(vec![b'a', b'b', 0, b'z', b'q']);
    assert_eq!(Ok("ab".to_owned()), buffer.read_string_from_cp932(4));
    assert_eq!(4, buffer.offset());
}

#[test]
fn test_read_variable_string_sjis() {
    // "ボーン" in Shift-JIS
    let mut buffer = Buffer::create(vec![6, 0x83, 0x7b, 0x81, 0x5b, 0x83, 0x93]);
    assert_eq!(
        Ok("ボーン".to_owned()),
        buffer.read_variable_string_from_cp932()
    );
    assert!(buffer.is_end());
}

#[test]
fn test_or_corrupted_keeps_specific_error() {
    assert_eq!(
        NanoemError::DocumentCameraCorrupted,
        NanoemError::BufferEnd.or_corrupted(NanoemError::DocumentCameraCorrupted)
    );
    assert_eq!(
        NanoemError::DecodeJisStringFailed,
        NanoemError::DecodeJisStringFailed.or_corrupted(NanoemError::DocumentCameraCorrupted)
    );
}
