// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Named leaf values and their format-dependent encodings.
//!
//! A [`Variable`] carries no type tag. The schema lives in the code that reads
//! it: whatever type was written must be the type that is read back.

use crate::error::DataError;
use bytemuck::Pod;
use garrison_core::math::{Components, Quaternion, Vec2, Vec3, Vec4};
use garrison_core::{EntityId, Format};

/// A named payload stored inside a scope.
///
/// In [`Format::Readable`] trees the payload is single-line UTF-8 text. In
/// [`Format::Binary`] trees it is the raw in-memory bytes of the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    name: String,
    value: Vec<u8>,
    format: Format,
}

impl Variable {
    /// Creates an empty variable.
    pub fn new(name: impl Into<String>, format: Format) -> Self {
        Self {
            name: name.into(),
            value: Vec::new(),
            format,
        }
    }

    /// Creates a variable holding an already-encoded payload.
    pub fn with_payload(name: impl Into<String>, payload: Vec<u8>, format: Format) -> Self {
        Self {
            name: name.into(),
            value: payload,
            format,
        }
    }

    /// The variable's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The encoding of the payload.
    pub fn format(&self) -> Format {
        self.format
    }

    /// The encoded payload.
    pub fn payload(&self) -> &[u8] {
        &self.value
    }

    /// Replaces the encoded payload.
    pub fn set_payload(&mut self, payload: Vec<u8>) {
        self.value = payload;
    }

    /// Encodes `value` into this variable, replacing the previous payload.
    pub fn write<T: VariableValue>(&mut self, value: &T) -> &mut Self {
        self.value = value.encode(self.format);
        self
    }

    /// Stores `text` verbatim, in either format.
    pub fn write_str(&mut self, text: &str) -> &mut Self {
        self.value = text.as_bytes().to_vec();
        self
    }

    /// Decodes the payload as a `T`.
    pub fn read<T: VariableValue>(&self) -> Result<T, DataError> {
        T::decode(self)
    }

    /// Returns the payload as text, failing if it is not UTF-8.
    pub fn text(&self, expected: &'static str) -> Result<&str, DataError> {
        std::str::from_utf8(&self.value).map_err(|_| self.invalid(expected))
    }

    /// Returns the first `len` bytes of the payload.
    pub fn leading_bytes(&self, len: usize) -> Result<&[u8], DataError> {
        self.value
            .get(..len)
            .ok_or_else(|| DataError::TruncatedPayload {
                variable: self.name.clone(),
                expected: len,
                found: self.value.len(),
            })
    }

    /// Builds the error reported when the payload is not a valid `expected`.
    pub fn invalid(&self, expected: &'static str) -> DataError {
        DataError::InvalidValue {
            variable: self.name.clone(),
            expected,
            found: String::from_utf8_lossy(&self.value).into_owned(),
        }
    }

    fn read_pod<T: Pod>(&self) -> Result<T, DataError> {
        Ok(bytemuck::pod_read_unaligned(
            self.leading_bytes(std::mem::size_of::<T>())?,
        ))
    }
}

/// A type that can be stored in a [`Variable`].
pub trait VariableValue: Sized {
    /// Encodes the value for `format`.
    fn encode(&self, format: Format) -> Vec<u8>;

    /// Decodes the payload of `variable`.
    fn decode(variable: &Variable) -> Result<Self, DataError>;
}

macro_rules! impl_scalar_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl VariableValue for $ty {
                fn encode(&self, format: Format) -> Vec<u8> {
                    match format {
                        Format::Readable => self.to_string().into_bytes(),
                        Format::Binary => self.to_le_bytes().to_vec(),
                    }
                }

                fn decode(variable: &Variable) -> Result<Self, DataError> {
                    match variable.format() {
                        Format::Readable => variable
                            .text(stringify!($ty))?
                            .trim()
                            .parse::<$ty>()
                            .map_err(|_| variable.invalid(stringify!($ty))),
                        Format::Binary => variable.read_pod::<$ty>(),
                    }
                }
            }
        )+
    };
}

impl_scalar_value!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64);

impl VariableValue for bool {
    fn encode(&self, format: Format) -> Vec<u8> {
        match format {
            Format::Readable => (if *self { "true" } else { "false" }).into(),
            Format::Binary => vec![*self as u8],
        }
    }

    fn decode(variable: &Variable) -> Result<Self, DataError> {
        match variable.format() {
            Format::Readable => match variable.text("bool")?.trim() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(variable.invalid("bool")),
            },
            Format::Binary => Ok(variable.leading_bytes(1)?[0] != 0),
        }
    }
}

impl VariableValue for String {
    fn encode(&self, _format: Format) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn decode(variable: &Variable) -> Result<Self, DataError> {
        variable.text("string").map(str::to_owned)
    }
}

impl VariableValue for EntityId {
    fn encode(&self, format: Format) -> Vec<u8> {
        self.raw().encode(format)
    }

    fn decode(variable: &Variable) -> Result<Self, DataError> {
        u16::decode(variable).map(EntityId::new)
    }
}

fn encode_components<V: Components + Pod>(value: &V, format: Format) -> Vec<u8> {
    match format {
        Format::Readable => (0..V::LEN)
            .map(|i| value.component(i).to_string())
            .collect::<Vec<_>>()
            .join(", ")
            .into_bytes(),
        Format::Binary => bytemuck::bytes_of(value).to_vec(),
    }
}

fn decode_components<V: Components + Pod>(
    variable: &Variable,
    expected: &'static str,
) -> Result<V, DataError> {
    match variable.format() {
        Format::Readable => {
            let components = variable
                .text(expected)?
                .split(',')
                .map(|part| part.trim().parse::<f32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| variable.invalid(expected))?;
            if components.len() != V::LEN {
                return Err(variable.invalid(expected));
            }
            Ok(V::from_components(&components))
        }
        Format::Binary => variable.read_pod::<V>(),
    }
}

macro_rules! impl_vector_value {
    ($($ty:ident),+) => {
        $(
            impl VariableValue for $ty {
                fn encode(&self, format: Format) -> Vec<u8> {
                    encode_components(self, format)
                }

                fn decode(variable: &Variable) -> Result<Self, DataError> {
                    decode_components(variable, stringify!($ty))
                }
            }
        )+
    };
}

impl_vector_value!(Vec2, Vec3, Vec4);

impl VariableValue for Quaternion {
    fn encode(&self, format: Format) -> Vec<u8> {
        self.to_wxyz().encode(format)
    }

    fn decode(variable: &Variable) -> Result<Self, DataError> {
        decode_components::<Vec4>(variable, "Quaternion").map(Quaternion::from_wxyz)
    }
}

/// Contiguous arrays are stored as their raw bytes, uppercase hex in readable trees.
impl<T: Pod> VariableValue for Vec<T> {
    fn encode(&self, format: Format) -> Vec<u8> {
        let bytes: &[u8] = bytemuck::cast_slice(self);
        match format {
            Format::Readable => hex::encode_upper(bytes).into_bytes(),
            Format::Binary => bytes.to_vec(),
        }
    }

    fn decode(variable: &Variable) -> Result<Self, DataError> {
        let decoded;
        let bytes = match variable.format() {
            Format::Readable => {
                decoded = hex::decode(variable.text("hex array")?.trim())
                    .map_err(|_| variable.invalid("hex array"))?;
                decoded.as_slice()
            }
            Format::Binary => variable.payload(),
        };

        let size = std::mem::size_of::<T>();
        if size == 0 {
            return Ok(Vec::new());
        }
        let whole = bytes.len() - bytes.len() % size;
        Ok(bytemuck::pod_collect_to_vec(&bytes[..whole]))
    }
}
