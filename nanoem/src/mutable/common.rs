use crate::{
    common::{Buffer, NanoemError, F128},
    utils::{encode_cp932, truncate_cp932},
};

#[macro_export]
macro_rules! write_primitive {
    ($typ: ty, $write_typ:ident) => {
        pub fn $write_typ(&mut self, value: $typ) -> Result<(), NanoemError> {
            self.write_byte_array(&value.to_le_bytes())
        }
    };
}

#[derive(Debug, Default)]
pub struct MutableBuffer {
    data: Vec<u8>,
}

impl MutableBuffer {
    pub fn create() -> Result<MutableBuffer, NanoemError> {
        Self::create_with_reserved_size(2 << 12)
    }

    pub fn create_with_reserved_size(capacity: usize) -> Result<MutableBuffer, NanoemError> {
        let mut buffer = MutableBuffer { data: Vec::new() };
        buffer.ensure_size(capacity)?;
        Ok(buffer)
    }

    fn ensure_size(&mut self, required: usize) -> Result<(), NanoemError> {
        self.data
            .try_reserve(required)
            .map_err(|_| NanoemError::ReallocFailed)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn write_byte_array(&mut self, data: &[u8]) -> Result<(), NanoemError> {
        self.ensure_size(data.len())?;
        self.data.extend_from_slice(data);
        Ok(())
    }

    pub fn write_byte(&mut self, value: u8) -> Result<(), NanoemError> {
        self.write_byte_array(&[value])
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), NanoemError> {
        self.write_byte(value as u8)
    }

    /// One byte element count, `overflow` when `len` does not fit.
    pub fn write_u8_count(&mut self, len: usize, overflow: NanoemError) -> Result<(), NanoemError> {
        self.write_byte(u8::try_from(len).map_err(|_| overflow)?)
    }

    pub fn write_i32_count(
        &mut self,
        len: usize,
        overflow: NanoemError,
    ) -> Result<(), NanoemError> {
        self.write_i32_little_endian(i32::try_from(len).map_err(|_| overflow)?)
    }

    /// One byte object index. Detached (negative) and out of range indices yield `overflow`.
    pub fn write_u8_index(&mut self, index: i32, overflow: NanoemError) -> Result<(), NanoemError> {
        self.write_byte(u8::try_from(index).map_err(|_| overflow)?)
    }

    write_primitive!(u16, write_u16_little_endian);
    write_primitive!(i16, write_i16_little_endian);
    write_primitive!(u32, write_u32_little_endian);
    write_primitive!(i32, write_i32_little_endian);
    write_primitive!(f32, write_f32_little_endian);

    pub fn write_f32_2_little_endian(&mut self, value: F128) -> Result<(), NanoemError> {
        self.write_f32_little_endian(value.0[0])?;
        self.write_f32_little_endian(value.0[1])
    }

    pub fn write_f32_3_little_endian(&mut self, value: F128) -> Result<(), NanoemError> {
        self.write_f32_2_little_endian(value)?;
        self.write_f32_little_endian(value.0[2])
    }

    pub fn write_f32_4_little_endian(&mut self, value: F128) -> Result<(), NanoemError> {
        self.write_f32_3_little_endian(value)?;
        self.write_f32_little_endian(value.0[3])
    }

    /// Writes `value` into a zero filled field of exactly `capacity` bytes.
    /// One byte is always left for the terminator.
    pub fn write_fixed_string_cp932(
        &mut self,
        value: &str,
        capacity: usize,
    ) -> Result<(), NanoemError> {
        let bytes = encode_cp932(value)?;
        let bytes = truncate_cp932(&bytes, capacity.saturating_sub(1));
        self.write_byte_array(bytes)?;
        self.write_byte_array(&vec![0u8; capacity - bytes.len()])
    }

    pub fn write_variable_string_cp932(&mut self, value: &str) -> Result<(), NanoemError> {
        let bytes = encode_cp932(value)?;
        let bytes = truncate_cp932(&bytes, u8::MAX as usize);
        self.write_byte(bytes.len() as u8)?;
        self.write_byte_array(bytes)
    }

    // TODO: now clone the total data vec, change to some pointer copy
    pub fn create_buffer_object(&self) -> Result<Buffer, NanoemError> {
        Ok(Buffer::create(self.data.clone()))
    }
}

#[test]
fn test_write_primitive_little_endian() {
    let mut buffer = MutableBuffer::create().unwrap();
    buffer.write_u16_little_endian(0x0201).unwrap();
    buffer.write_i32_little_endian(-1).unwrap();
    buffer.write_f32_little_endian(1.0).unwrap();
    assert_eq!(
        &[0x01, 0x02, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x80, 0x3f],
        buffer.as_bytes()
    );
}

#[test]
fn test_write_fixed_string_pads_and_terminates() {
    let mut buffer = MutableBuffer::create().unwrap();
    buffer.write_fixed_string_cp932("abcdef", 4).unwrap();
    assert_eq!(&[b'a', b'b', b'c', 0], buffer.as_bytes());
    let mut read = buffer.create_buffer_object().unwrap();
    assert_eq!(Ok("abc".to_owned()), read.read_string_from_cp932(4));
}

#[test]
fn test_write_variable_string_round_trip() {
    let mut buffer = MutableBuffer::create().unwrap();
    buffer.write_variable_string_cp932("センター").unwrap();
    assert_eq!(9, buffer.len());
    let mut read = buffer.create_buffer_object().unwrap();
    assert_eq!(
        Ok("センター".to_owned()),
        read.read_variable_string_from_cp932()
    );
}

#[test]
fn test_write_counts_and_indices_are_checked() {
    let mut buffer = MutableBuffer::create().unwrap();
    buffer
        .write_u8_count(255, NanoemError::DocumentModelCorrupted)
        .unwrap();
    buffer
        .write_u8_index(3, NanoemError::DocumentModelCorrupted)
        .unwrap();
    assert_eq!(&[0xff, 0x03], buffer.as_bytes());
    assert_eq!(
        Err(NanoemError::DocumentModelCorrupted),
        buffer.write_u8_count(256, NanoemError::DocumentModelCorrupted)
    );
    assert_eq!(
        Err(NanoemError::DocumentAccessoryCorrupted),
        buffer.write_u8_index(-1, NanoemError::DocumentAccessoryCorrupted)
    );
    assert_eq!(
        Err(NanoemError::DocumentAccessoryCorrupted),
        buffer.write_u8_index(300, NanoemError::DocumentAccessoryCorrupted)
    );
    assert_eq!(
        Err(NanoemError::DocumentCameraCorrupted),
        buffer.write_i32_count(i32::MAX as usize + 1, NanoemError::DocumentCameraCorrupted)
    );
    assert_eq!(2, buffer.len());
}
