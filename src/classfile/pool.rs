//! The constant pool, stored as an index-addressed arena.

use std::collections::HashMap;

use super::NameRole;
use crate::Result;
use crate::binary::{ByteReader, ByteWriter};

/// Largest `constant_pool_count` a class file can declare.
const MAX_POOL_COUNT: usize = u16::MAX as usize;

/// One constant-pool slot.
///
/// Index 0 and the slot after every `Long` and `Double` are
/// [`Unusable`](Constant::Unusable). Strings are kept as raw modified UTF-8
/// so that undecodable constants survive a round trip untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    /// Placeholder slot that cannot be referenced.
    Unusable,
    /// Raw modified UTF-8 bytes.
    Utf8(Vec<u8>),
    /// 32-bit integer.
    Integer(u32),
    /// 32-bit float bits.
    Float(u32),
    /// 64-bit integer, occupies two slots.
    Long(u64),
    /// 64-bit float bits, occupies two slots.
    Double(u64),
    /// Class or array type; `name` points at a `Utf8`.
    Class {
        /// Internal name or array descriptor.
        name: u16,
    },
    /// String literal; `value` points at a `Utf8`.
    String {
        /// The literal text.
        value: u16,
    },
    /// Field reference.
    FieldRef {
        /// Owning `Class`.
        class: u16,
        /// `NameAndType` of the field.
        name_and_type: u16,
    },
    /// Method reference.
    MethodRef {
        /// Owning `Class`.
        class: u16,
        /// `NameAndType` of the method.
        name_and_type: u16,
    },
    /// Interface method reference.
    InterfaceMethodRef {
        /// Owning `Class`.
        class: u16,
        /// `NameAndType` of the method.
        name_and_type: u16,
    },
    /// Member name and descriptor.
    NameAndType {
        /// Simple name.
        name: u16,
        /// Field or method descriptor.
        descriptor: u16,
    },
    /// Method handle.
    MethodHandle {
        /// Reference kind, 1 to 9.
        kind: u8,
        /// Referenced member.
        reference: u16,
    },
    /// Method type; `descriptor` points at a `Utf8`.
    MethodType {
        /// Method descriptor.
        descriptor: u16,
    },
    /// Dynamically computed constant.
    Dynamic {
        /// Index into the bootstrap method table.
        bootstrap: u16,
        /// `NameAndType` of the constant.
        name_and_type: u16,
    },
    /// Dynamic call site.
    InvokeDynamic {
        /// Index into the bootstrap method table.
        bootstrap: u16,
        /// `NameAndType` of the call site.
        name_and_type: u16,
    },
    /// Module name.
    Module {
        /// Module name `Utf8`.
        name: u16,
    },
    /// Package name in internal form.
    Package {
        /// Package name `Utf8`.
        name: u16,
    },
}

impl Constant {
    fn tag(&self) -> u8 {
        match self {
            Constant::Unusable => 0,
            Constant::Utf8(_) => 1,
            Constant::Integer(_) => 3,
            Constant::Float(_) => 4,
            Constant::Long(_) => 5,
            Constant::Double(_) => 6,
            Constant::Class { .. } => 7,
            Constant::String { .. } => 8,
            Constant::FieldRef { .. } => 9,
            Constant::MethodRef { .. } => 10,
            Constant::InterfaceMethodRef { .. } => 11,
            Constant::NameAndType { .. } => 12,
            Constant::MethodHandle { .. } => 15,
            Constant::MethodType { .. } => 16,
            Constant::Dynamic { .. } => 17,
            Constant::InvokeDynamic { .. } => 18,
            Constant::Module { .. } => 19,
            Constant::Package { .. } => 20,
        }
    }

    fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

/// The constant pool of one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    /// Creates a pool holding only the reserved slot 0.
    pub fn new() -> Self {
        Self {
            entries: vec![Constant::Unusable],
        }
    }

    pub(crate) fn decode(r: &mut ByteReader<'_>) -> Result<Self> {
        let count = r.u16()? as usize;
        if count == 0 {
            return Err(r.corrupt("constant pool count is zero"));
        }

        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable);
        while entries.len() < count {
            let start = r.position();
            let constant = match r.u8()? {
                1 => {
                    let len = r.u16()? as usize;
                    Constant::Utf8(r.bytes(len)?.to_vec())
                }
                3 => Constant::Integer(r.u32()?),
                4 => Constant::Float(r.u32()?),
                5 => Constant::Long(u64::from(r.u32()?) << 32 | u64::from(r.u32()?)),
                6 => Constant::Double(u64::from(r.u32()?) << 32 | u64::from(r.u32()?)),
                7 => Constant::Class { name: r.u16()? },
                8 => Constant::String { value: r.u16()? },
                9 => Constant::FieldRef {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                10 => Constant::MethodRef {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                11 => Constant::InterfaceMethodRef {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                12 => Constant::NameAndType {
                    name: r.u16()?,
                    descriptor: r.u16()?,
                },
                15 => Constant::MethodHandle {
                    kind: r.u8()?,
                    reference: r.u16()?,
                },
                16 => Constant::MethodType {
                    descriptor: r.u16()?,
                },
                17 => Constant::Dynamic {
                    bootstrap: r.u16()?,
                    name_and_type: r.u16()?,
                },
                18 => Constant::InvokeDynamic {
                    bootstrap: r.u16()?,
                    name_and_type: r.u16()?,
                },
                19 => Constant::Module { name: r.u16()? },
                20 => Constant::Package { name: r.u16()? },
                tag => {
                    return Err(r.corrupt_at(
                        start,
                        format!("unknown constant tag {} at index {}", tag, entries.len()),
                    ));
                }
            };
            let wide = constant.is_wide();
            entries.push(constant);
            if wide {
                if entries.len() >= count {
                    return Err(r.corrupt_at(start, "wide constant in the last pool slot"));
                }
                entries.push(Constant::Unusable);
            }
        }

        Ok(Self { entries })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_u16(self.entries.len() as u16);
        for constant in &self.entries {
            match constant {
                Constant::Unusable => continue,
                c => out.put_u8(c.tag()),
            }
            match constant {
                Constant::Unusable => {}
                Constant::Utf8(bytes) => {
                    out.put_len16(bytes.len(), "encode string longer than 65535 bytes")?;
                    out.extend_from_slice(bytes);
                }
                Constant::Integer(v) | Constant::Float(v) => out.put_u32(*v),
                Constant::Long(v) | Constant::Double(v) => {
                    out.put_u32((*v >> 32) as u32);
                    out.put_u32(*v as u32);
                }
                Constant::Class { name: i }
                | Constant::String { value: i }
                | Constant::MethodType { descriptor: i }
                | Constant::Module { name: i }
                | Constant::Package { name: i } => out.put_u16(*i),
                Constant::FieldRef {
                    class: a,
                    name_and_type: b,
                }
                | Constant::MethodRef {
                    class: a,
                    name_and_type: b,
                }
                | Constant::InterfaceMethodRef {
                    class: a,
                    name_and_type: b,
                }
                | Constant::NameAndType {
                    name: a,
                    descriptor: b,
                }
                | Constant::Dynamic {
                    bootstrap: a,
                    name_and_type: b,
                }
                | Constant::InvokeDynamic {
                    bootstrap: a,
                    name_and_type: b,
                } => {
                    out.put_u16(*a);
                    out.put_u16(*b);
                }
                Constant::MethodHandle { kind, reference } => {
                    out.put_u8(*kind);
                    out.put_u16(*reference);
                }
            }
        }
        Ok(())
    }

    /// Returns the `constant_pool_count` of this pool.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the pool holds only the reserved slot.
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Returns the constant at `index`.
    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.entries.get(index as usize)
    }

    /// Returns the raw bytes of the `Utf8` constant at `index`.
    pub fn utf8_bytes(&self, index: u16) -> Option<&[u8]> {
        match self.get(index)? {
            Constant::Utf8(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Returns the decoded `Utf8` constant at `index`.
    pub fn utf8(&self, index: u16) -> Option<String> {
        crate::mutf8::decode(self.utf8_bytes(index)?).ok()
    }

    /// Returns the name stored in the `Class` constant at `index`.
    pub fn class_name(&self, index: u16) -> Option<String> {
        match self.get(index)? {
            Constant::Class { name } => self.utf8(*name),
            _ => None,
        }
    }

    /// Returns the text of the `String` constant at `index`.
    pub fn string(&self, index: u16) -> Option<String> {
        match self.get(index)? {
            Constant::String { value } => self.utf8(*value),
            _ => None,
        }
    }

    /// Iterates over `(index, constant)` pairs, skipping unusable slots.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, c)| !matches!(c, Constant::Unusable))
            .map(|(i, c)| (i as u16, c))
    }

    /// Appends a constant and returns its index.
    ///
    /// Returns `None` if the pool is full.
    pub(crate) fn push(&mut self, constant: Constant) -> Option<u16> {
        let width = if constant.is_wide() { 2 } else { 1 };
        if self.entries.len() + width > MAX_POOL_COUNT {
            return None;
        }
        let index = self.entries.len() as u16;
        let wide = constant.is_wide();
        self.entries.push(constant);
        if wide {
            self.entries.push(Constant::Unusable);
        }
        Some(index)
    }

    /// Finds an existing constant equal to `constant` or appends it.
    pub(crate) fn intern(&mut self, constant: Constant) -> Option<u16> {
        if let Some(index) = self.entries.iter().position(|c| *c == constant) {
            return Some(index as u16);
        }
        self.push(constant)
    }

    pub(crate) fn intern_utf8(&mut self, value: &str) -> Option<u16> {
        self.intern(Constant::Utf8(crate::mutf8::encode(value)))
    }

    /// Replaces the bytes of the `Utf8` constant at `index`.
    pub(crate) fn set_utf8(&mut self, index: u16, value: &str) {
        if let Some(slot @ Constant::Utf8(_)) = self.entries.get_mut(index as usize) {
            *slot = Constant::Utf8(crate::mutf8::encode(value));
        }
    }

    /// Visits every pool slot that refers to a `Utf8` constant.
    pub(crate) fn visit_utf8_refs(&mut self, f: &mut dyn FnMut(&mut u16, NameRole)) {
        for constant in &mut self.entries {
            match constant {
                Constant::Class { name } => f(name, NameRole::ClassName),
                Constant::String { value } => f(value, NameRole::StringLiteral),
                Constant::NameAndType { name, descriptor } => {
                    f(name, NameRole::Opaque);
                    f(descriptor, NameRole::Descriptor);
                }
                Constant::MethodType { descriptor } => f(descriptor, NameRole::Descriptor),
                Constant::Module { name } => f(name, NameRole::Opaque),
                Constant::Package { name } => f(name, NameRole::PackageName),
                _ => {}
            }
        }
    }
}

/// Appends `Utf8` constants, reusing the ones it appended before.
///
/// Existing pool entries are never reused: they may still be rewritten in
/// place later in the same pass.
#[derive(Debug, Default)]
pub(crate) struct Appender {
    appended: HashMap<String, u16>,
}

impl Appender {
    pub(crate) fn utf8(&mut self, pool: &mut ConstantPool, value: &str) -> Option<u16> {
        if let Some(&index) = self.appended.get(value) {
            return Some(index);
        }
        let index = pool.push(Constant::Utf8(crate::mutf8::encode(value)))?;
        self.appended.insert(value.to_string(), index);
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::Format;

    fn round_trip(pool: &ConstantPool) -> ConstantPool {
        let mut out = Vec::new();
        pool.encode(&mut out).unwrap();
        ConstantPool::decode(&mut ByteReader::new(&out, Format::Class)).unwrap()
    }

    #[test]
    fn test_wide_constants_take_two_slots() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.push(Constant::Long(1)), Some(1));
        assert_eq!(pool.push(Constant::Integer(2)), Some(3));
        assert_eq!(pool.get(2), Some(&Constant::Unusable));
        assert_eq!(round_trip(&pool), pool);
    }

    #[test]
    fn test_lookup_helpers() {
        let mut pool = ConstantPool::new();
        let name = pool.intern_utf8("com/Foo").unwrap();
        let class = pool.push(Constant::Class { name }).unwrap();
        let string = pool.push(Constant::String { value: name }).unwrap();
        assert_eq!(pool.class_name(class).as_deref(), Some("com/Foo"));
        assert_eq!(pool.string(string).as_deref(), Some("com/Foo"));
        assert_eq!(pool.class_name(string), None);
        assert_eq!(pool.intern_utf8("com/Foo"), Some(name));
    }

    #[test]
    fn test_unknown_tag_is_corrupt() {
        let data = [0x00, 0x02, 0x02];
        let err = ConstantPool::decode(&mut ByteReader::new(&data, Format::Class)).unwrap_err();
        assert!(err.to_string().contains("unknown constant tag 2"));
    }

    #[test]
    fn test_truncated_utf8_is_corrupt() {
        let data = [0x00, 0x02, 0x01, 0x00, 0x05, b'a'];
        assert!(ConstantPool::decode(&mut ByteReader::new(&data, Format::Class)).is_err());
    }

    #[test]
    fn test_appender_does_not_reuse_existing() {
        let mut pool = ConstantPool::new();
        let existing = pool.intern_utf8("x").unwrap();
        let mut appender = Appender::default();
        let first = appender.utf8(&mut pool, "x").unwrap();
        assert_ne!(first, existing);
        assert_eq!(appender.utf8(&mut pool, "x"), Some(first));
    }
}
