//! Structural class-file model.
//!
//! A [`ClassRecord`] is decoded from raw bytes, mutated by transformers and
//! encoded back. The constant pool is an index-addressed arena
//! ([`ConstantPool`]); every other structure refers into it by index, so a
//! mutation never invalidates a reference held elsewhere in the record.
//!
//! Instruction streams are never re-encoded. [`ClassRecord::remap_names`]
//! rewrites names by changing or appending `Utf8` constants only, which keeps
//! every index the bytecode uses valid.
//!
//! # Example
//!
//! ```
//! use jarwright::classfile::{ClassRecord, NameRole, access};
//!
//! let mut class = ClassRecord::new("com/old/Main", Some("java/lang/Object"), access::PUBLIC)?;
//! class.add_field(access::PRIVATE, "helper", "Lcom/old/Helper;")?;
//!
//! let changed = class.remap_names(|role, name| match role {
//!     NameRole::ClassName => name.strip_prefix("com/old/").map(|r| format!("com/new/{}", r)),
//!     NameRole::Descriptor => Some(name.replace("Lcom/old/", "Lcom/new/")),
//!     _ => None,
//! })?;
//! assert!(changed);
//!
//! let class = ClassRecord::decode(&class.encode()?)?;
//! assert_eq!(class.name(), "com/new/Main");
//! assert!(class.find_field("helper", "Lcom/new/Helper;").is_some());
//! # Ok::<(), jarwright::Error>(())
//! ```

mod attribute;
mod descriptor;
mod pool;

use std::collections::{BTreeMap, HashMap};

pub use attribute::{
    Annotation, Attribute, AttributeBody, Code, ElementValue, InnerClass, LocalVariable,
    MethodParameter, RecordComponent, TypeAnnotation,
};
pub use descriptor::{NameMap, remap_signature};
pub use pool::{Constant, ConstantPool};

use crate::binary::{ByteReader, ByteWriter, Format};
use crate::{Error, Result};

const MAGIC: u32 = 0xCAFE_BABE;

/// Access flag bits for classes, fields and methods.
pub mod access {
    /// Visible everywhere.
    pub const PUBLIC: u16 = 0x0001;
    /// Visible in the declaring class only.
    pub const PRIVATE: u16 = 0x0002;
    /// Visible in subclasses and the package.
    pub const PROTECTED: u16 = 0x0004;
    /// Static member.
    pub const STATIC: u16 = 0x0008;
    /// Not overridable, not reassignable, not subclassable.
    pub const FINAL: u16 = 0x0010;
    /// `ACC_SUPER` on classes, `synchronized` on methods.
    pub const SUPER: u16 = 0x0020;
    /// Volatile field.
    pub const VOLATILE: u16 = 0x0040;
    /// Transient field.
    pub const TRANSIENT: u16 = 0x0080;
    /// Interface.
    pub const INTERFACE: u16 = 0x0200;
    /// Abstract class or method.
    pub const ABSTRACT: u16 = 0x0400;
    /// Compiler generated.
    pub const SYNTHETIC: u16 = 0x1000;
    /// Annotation interface.
    pub const ANNOTATION: u16 = 0x2000;
    /// Enum class or constant.
    pub const ENUM: u16 = 0x4000;

    const VISIBILITY: u16 = PUBLIC | PRIVATE | PROTECTED;

    /// Replaces the visibility bits with `PUBLIC`, leaving every other bit.
    pub fn make_public(flags: u16) -> u16 {
        (flags & !VISIBILITY) | PUBLIC
    }

    /// Clears `FINAL`, leaving every other bit.
    pub fn clear_final(flags: u16) -> u16 {
        flags & !FINAL
    }
}

/// How a `Utf8` reference is interpreted by its referrer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameRole {
    /// Internal class name (`com/example/Foo`), from a `Class` constant.
    ClassName,
    /// Field or method descriptor.
    Descriptor,
    /// Generic signature.
    Signature,
    /// String literal, from a `String` constant or annotation value.
    StringLiteral,
    /// Internal package name, from a `Package` constant.
    PackageName,
    /// Member, attribute or parameter names and the like; never remapped.
    Opaque,
}

/// A field or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Access flags.
    pub access: u16,
    /// `Utf8` simple name.
    pub name: u16,
    /// `Utf8` descriptor.
    pub descriptor: u16,
    /// Member attributes.
    pub attributes: Vec<Attribute>,
}

impl Member {
    fn decode(r: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<Self> {
        Ok(Self {
            access: r.u16()?,
            name: r.u16()?,
            descriptor: r.u16()?,
            attributes: Attribute::decode_all(r, pool)?,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_u16(self.access);
        out.put_u16(self.name);
        out.put_u16(self.descriptor);
        Attribute::encode_all(&self.attributes, out)
    }

    fn is(&self, pool: &ConstantPool, name: &str, descriptor: &str) -> bool {
        pool.utf8(self.name).as_deref() == Some(name)
            && pool.utf8(self.descriptor).as_deref() == Some(descriptor)
    }

    fn visit_utf8_refs(&mut self, f: &mut dyn FnMut(&mut u16, NameRole)) {
        f(&mut self.name, NameRole::Opaque);
        f(&mut self.descriptor, NameRole::Descriptor);
        for attribute in &mut self.attributes {
            attribute.visit_utf8_refs(f);
        }
    }
}

/// One decoded class unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRecord {
    /// Minor class-file version.
    pub minor_version: u16,
    /// Major class-file version.
    pub major_version: u16,
    /// The constant pool.
    pub pool: ConstantPool,
    /// Class access flags.
    pub access: u16,
    /// `Class` index of this class.
    pub this_class: u16,
    /// `Class` index of the superclass, 0 for `java/lang/Object` and modules.
    pub super_class: u16,
    /// `Class` indices of direct superinterfaces.
    pub interfaces: Vec<u16>,
    /// Field table.
    pub fields: Vec<Member>,
    /// Method table.
    pub methods: Vec<Member>,
    /// Class attributes.
    pub attributes: Vec<Attribute>,
}

impl ClassRecord {
    /// Creates an empty class targeting Java 8 (version 52.0).
    pub fn new(name: &str, super_name: Option<&str>, access: u16) -> Result<Self> {
        let mut class = Self {
            minor_version: 0,
            major_version: 52,
            pool: ConstantPool::new(),
            access,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        };
        class.this_class = class.class_constant(name)?;
        if let Some(super_name) = super_name {
            class.super_class = class.class_constant(super_name)?;
        }
        Ok(class)
    }

    /// Decodes a class file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptClass`] for truncated input, a wrong magic
    /// number, unknown constant tags, or a `this_class` that does not name a
    /// class. Malformed attribute bodies are not errors; they are kept raw.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(bytes, Format::Class);
        let magic = r.u32()?;
        if magic != MAGIC {
            return Err(r.corrupt_at(0, format!("bad magic {:#010x}", magic)));
        }
        let minor_version = r.u16()?;
        let major_version = r.u16()?;
        let pool = ConstantPool::decode(&mut r)?;

        let access = r.u16()?;
        let this_at = r.position();
        let this_class = r.u16()?;
        if pool.class_name(this_class).is_none() {
            return Err(r.corrupt_at(this_at, format!("this_class #{} is not a class", this_class)));
        }
        let super_class = r.u16()?;
        let interfaces = r.u16_table()?;

        let field_count = r.u16()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            fields.push(Member::decode(&mut r, &pool)?);
        }
        let method_count = r.u16()?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            methods.push(Member::decode(&mut r, &pool)?);
        }
        let attributes = Attribute::decode_all(&mut r, &pool)?;

        if !r.is_empty() {
            return Err(r.corrupt(format!("{} trailing bytes", r.remaining())));
        }

        Ok(Self {
            minor_version,
            major_version,
            pool,
            access,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// Encodes the class file.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(1024);
        out.put_u32(MAGIC);
        out.put_u16(self.minor_version);
        out.put_u16(self.major_version);
        self.pool.encode(&mut out)?;
        out.put_u16(self.access);
        out.put_u16(self.this_class);
        out.put_u16(self.super_class);
        out.put_len16(self.interfaces.len(), "encode more than 65535 interfaces")?;
        for interface in &self.interfaces {
            out.put_u16(*interface);
        }
        for members in [&self.fields, &self.methods] {
            out.put_len16(members.len(), "encode more than 65535 members")?;
            for member in members {
                member.encode(&mut out)?;
            }
        }
        Attribute::encode_all(&self.attributes, &mut out)?;
        Ok(out)
    }

    /// Returns the internal name of this class.
    pub fn name(&self) -> String {
        self.pool.class_name(self.this_class).unwrap_or_default()
    }

    /// Returns the internal name of the superclass.
    pub fn super_name(&self) -> Option<String> {
        self.pool.class_name(self.super_class)
    }

    /// Returns the internal names of the direct superinterfaces.
    pub fn interface_names(&self) -> Vec<String> {
        self.interfaces
            .iter()
            .filter_map(|&i| self.pool.class_name(i))
            .collect()
    }

    /// Returns the decoded name of a field or method.
    pub fn member_name(&self, member: &Member) -> Option<String> {
        self.pool.utf8(member.name)
    }

    /// Returns the decoded descriptor of a field or method.
    pub fn member_descriptor(&self, member: &Member) -> Option<String> {
        self.pool.utf8(member.descriptor)
    }

    /// Finds a field by exact name and descriptor.
    pub fn find_field(&self, name: &str, descriptor: &str) -> Option<&Member> {
        self.fields.iter().find(|m| m.is(&self.pool, name, descriptor))
    }

    /// Finds a field by exact name and descriptor, mutably.
    pub fn find_field_mut(&mut self, name: &str, descriptor: &str) -> Option<&mut Member> {
        let pool = &self.pool;
        self.fields.iter_mut().find(|m| m.is(pool, name, descriptor))
    }

    /// Finds a method by exact name and descriptor.
    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&Member> {
        self.methods.iter().find(|m| m.is(&self.pool, name, descriptor))
    }

    /// Finds a method by exact name and descriptor, mutably.
    pub fn find_method_mut(&mut self, name: &str, descriptor: &str) -> Option<&mut Member> {
        let pool = &self.pool;
        self.methods.iter_mut().find(|m| m.is(pool, name, descriptor))
    }

    /// Applies `mutate` to the class access flags.
    ///
    /// The `InnerClasses` row describing this class, if any, carries the
    /// flags reflection reports for nested classes and is mutated the same
    /// way.
    pub fn update_access(&mut self, mutate: impl Fn(u16) -> u16) {
        self.access = mutate(self.access);
        let name = self.name();
        let pool = &self.pool;
        for attribute in &mut self.attributes {
            if let AttributeBody::InnerClasses(classes) = &mut attribute.body {
                for class in classes.iter_mut() {
                    if pool.class_name(class.inner_class).as_deref() == Some(name.as_str()) {
                        class.access = mutate(class.access);
                    }
                }
            }
        }
    }

    /// Returns every string literal: `String` constants and annotation
    /// string values, in pool and traversal order.
    pub fn string_literals(&self) -> Vec<String> {
        let mut indices = Vec::new();
        let mut copy = self.clone();
        copy.visit_utf8_refs(&mut |index, role| {
            if role == NameRole::StringLiteral {
                indices.push(*index);
            }
        });
        indices
            .into_iter()
            .filter_map(|i| self.pool.utf8(i))
            .collect()
    }

    /// Interns a `Utf8` constant.
    pub fn utf8(&mut self, value: &str) -> Result<u16> {
        match self.pool.intern_utf8(value) {
            Some(index) => Ok(index),
            None => Err(self.overflow()),
        }
    }

    /// Interns a `Class` constant.
    pub fn class_constant(&mut self, name: &str) -> Result<u16> {
        let name = self.utf8(name)?;
        self.intern(Constant::Class { name })
    }

    /// Interns a `String` constant.
    pub fn string_constant(&mut self, value: &str) -> Result<u16> {
        let value = self.utf8(value)?;
        self.intern(Constant::String { value })
    }

    /// Builds an attribute, interning its name.
    pub fn attribute(&mut self, name: &str, body: AttributeBody) -> Result<Attribute> {
        Ok(Attribute {
            name: self.utf8(name)?,
            body,
        })
    }

    /// Adds a direct superinterface.
    pub fn add_interface(&mut self, name: &str) -> Result<()> {
        let index = self.class_constant(name)?;
        self.interfaces.push(index);
        Ok(())
    }

    /// Adds a field and returns it for further setup.
    pub fn add_field(&mut self, access: u16, name: &str, descriptor: &str) -> Result<&mut Member> {
        let member = self.member(access, name, descriptor)?;
        self.fields.push(member);
        let last = self.fields.len() - 1;
        Ok(&mut self.fields[last])
    }

    /// Adds a method and returns it for further setup.
    pub fn add_method(&mut self, access: u16, name: &str, descriptor: &str) -> Result<&mut Member> {
        let member = self.member(access, name, descriptor)?;
        self.methods.push(member);
        let last = self.methods.len() - 1;
        Ok(&mut self.methods[last])
    }

    fn member(&mut self, access: u16, name: &str, descriptor: &str) -> Result<Member> {
        Ok(Member {
            access,
            name: self.utf8(name)?,
            descriptor: self.utf8(descriptor)?,
            attributes: Vec::new(),
        })
    }

    fn intern(&mut self, constant: Constant) -> Result<u16> {
        match self.pool.intern(constant) {
            Some(index) => Ok(index),
            None => Err(self.overflow()),
        }
    }

    fn overflow(&self) -> Error {
        Error::ConstantPoolOverflow { class: self.name() }
    }

    /// Visits every reference to a `Utf8` constant, in a fixed order.
    pub(crate) fn visit_utf8_refs(&mut self, f: &mut dyn FnMut(&mut u16, NameRole)) {
        self.pool.visit_utf8_refs(f);
        for member in self.fields.iter_mut().chain(self.methods.iter_mut()) {
            member.visit_utf8_refs(f);
        }
        for attribute in &mut self.attributes {
            attribute.visit_utf8_refs(f);
        }
    }

    fn has_untracked_refs(&self) -> bool {
        self.fields
            .iter()
            .chain(&self.methods)
            .flat_map(|m| &m.attributes)
            .chain(&self.attributes)
            .any(|a| a.has_untracked_refs(&self.pool))
    }

    /// Rewrites the strings behind `Utf8` references.
    ///
    /// `map` is called once per distinct (constant, role) pair with the
    /// decoded string and returns the replacement, or `None` to keep it.
    /// Class constants holding array descriptors are offered as
    /// [`NameRole::Descriptor`]. [`NameRole::Opaque`] references are never
    /// offered.
    ///
    /// A constant whose referrers all agree on one replacement is rewritten
    /// in place. When referrers disagree (a class name that is also a string
    /// literal that must stay, say), each replacement gets a new constant and
    /// only the affected referrers are pointed at it. Returns true if
    /// anything changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConstantPoolOverflow`] if the new constants do not
    /// fit.
    pub fn remap_names(
        &mut self,
        mut map: impl FnMut(NameRole, &str) -> Option<String>,
    ) -> Result<bool> {
        let mut refs: Vec<(u16, NameRole)> = Vec::new();
        self.visit_utf8_refs(&mut |index, role| refs.push((*index, role)));

        let mut cache: HashMap<(u16, NameRole), Option<String>> = HashMap::new();
        let mut results: Vec<Option<String>> = Vec::with_capacity(refs.len());
        for &(index, role) in &refs {
            if role == NameRole::Opaque {
                results.push(None);
                continue;
            }
            let result = cache
                .entry((index, role))
                .or_insert_with(|| {
                    let old = self.pool.utf8(index)?;
                    let role = if role == NameRole::ClassName && old.starts_with('[') {
                        NameRole::Descriptor
                    } else {
                        role
                    };
                    map(role, &old).filter(|new| *new != old)
                })
                .clone();
            results.push(result);
        }

        if results.iter().all(Option::is_none) {
            return Ok(false);
        }

        let mut by_index: BTreeMap<u16, Vec<usize>> = BTreeMap::new();
        for (position, &(index, _)) in refs.iter().enumerate() {
            by_index.entry(index).or_default().push(position);
        }

        let shared_in_place = !self.has_untracked_refs();
        let mut in_place: Vec<(u16, String)> = Vec::new();
        let mut assignment: Vec<Option<u16>> = vec![None; refs.len()];
        let mut appender = pool::Appender::default();

        for (index, positions) in by_index {
            let first = &results[positions[0]];
            if positions.iter().all(|&p| results[p].is_none()) {
                continue;
            }
            if let Some(value) = first {
                if shared_in_place && positions.iter().all(|&p| results[p] == *first) {
                    in_place.push((index, value.clone()));
                    continue;
                }
            }
            for &position in &positions {
                if let Some(value) = &results[position] {
                    let Some(new_index) = appender.utf8(&mut self.pool, value) else {
                        return Err(self.overflow());
                    };
                    assignment[position] = Some(new_index);
                }
            }
        }

        for (index, value) in &in_place {
            self.pool.set_utf8(*index, value);
        }

        let mut position = 0;
        self.visit_utf8_refs(&mut |index, _| {
            if let Some(Some(new_index)) = assignment.get(position) {
                *index = *new_index;
            }
            position += 1;
        });

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relocate(role: NameRole, name: &str) -> Option<String> {
        let mut map = |n: &str| n.strip_prefix("old/").map(|r| format!("new/{}", r));
        match role {
            NameRole::ClassName => map(name),
            NameRole::Descriptor | NameRole::Signature => remap_signature(name, &mut map),
            _ => None,
        }
    }

    #[test]
    fn test_builder_round_trip() {
        let mut class = ClassRecord::new("a/B", Some("java/lang/Object"), access::PUBLIC).unwrap();
        class.add_interface("java/io/Serializable").unwrap();
        class.add_field(access::PRIVATE, "x", "I").unwrap();
        class.add_method(access::PUBLIC, "run", "()V").unwrap();

        let decoded = ClassRecord::decode(&class.encode().unwrap()).unwrap();
        assert_eq!(decoded, class);
        assert_eq!(decoded.name(), "a/B");
        assert_eq!(decoded.super_name().as_deref(), Some("java/lang/Object"));
        assert_eq!(decoded.interface_names(), vec!["java/io/Serializable"]);
        assert!(decoded.find_method("run", "()V").is_some());
        assert!(decoded.find_method("run", "()I").is_none());
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let err = ClassRecord::decode(&[0xCA, 0xFE, 0xBA, 0xBF, 0, 0, 0, 52]).unwrap_err();
        assert!(matches!(err, Error::CorruptClass { offset: 0, .. }));
    }

    #[test]
    fn test_decode_rejects_truncation_everywhere() {
        let class = ClassRecord::new("a/B", Some("java/lang/Object"), 0).unwrap();
        let bytes = class.encode().unwrap();
        for len in 0..bytes.len() {
            assert!(ClassRecord::decode(&bytes[..len]).is_err(), "length {}", len);
        }
    }

    #[test]
    fn test_remap_in_place_when_referrers_agree() {
        let mut class = ClassRecord::new("old/A", Some("java/lang/Object"), 0).unwrap();
        let before = class.pool.len();
        assert!(class.remap_names(relocate).unwrap());
        assert_eq!(class.name(), "new/A");
        assert_eq!(class.pool.len(), before);
    }

    #[test]
    fn test_remap_splits_shared_constant() {
        let mut class = ClassRecord::new("old/A", None, 0).unwrap();
        let literal = class.string_constant("old/A").unwrap();

        assert!(class.remap_names(relocate).unwrap());
        assert_eq!(class.name(), "new/A");
        assert_eq!(class.pool.string(literal).as_deref(), Some("old/A"));
        assert_eq!(class.string_literals(), vec!["old/A"]);
    }

    #[test]
    fn test_remap_array_class_as_descriptor() {
        let mut class = ClassRecord::new("x/Y", None, 0).unwrap();
        let array = class.class_constant("[Lold/A;").unwrap();
        class.remap_names(relocate).unwrap();
        assert_eq!(class.pool.class_name(array).as_deref(), Some("[Lnew/A;"));
    }

    #[test]
    fn test_remap_leaves_member_names_alone() {
        let mut class = ClassRecord::new("x/Y", None, 0).unwrap();
        // a field whose name equals a class name being relocated
        class.add_field(0, "old/A", "Lold/A;").unwrap();
        class.class_constant("old/A").unwrap();
        class.remap_names(relocate).unwrap();
        assert!(class.find_field("old/A", "Lnew/A;").is_some());
    }

    #[test]
    fn test_remap_nothing_to_do() {
        let mut class = ClassRecord::new("x/Y", None, 0).unwrap();
        let before = class.clone();
        assert!(!class.remap_names(relocate).unwrap());
        assert_eq!(class, before);
    }

    #[test]
    fn test_access_helpers() {
        let flags = access::PRIVATE | access::FINAL | access::STATIC;
        assert_eq!(access::make_public(flags), access::PUBLIC | access::FINAL | access::STATIC);
        assert_eq!(access::clear_final(flags), access::PRIVATE | access::STATIC);
    }

    #[test]
    fn test_update_access_updates_inner_class_row() {
        let mut class = ClassRecord::new("a/Outer$Inner", None, 0).unwrap();
        let inner = class.this_class;
        let outer = class.class_constant("a/Outer").unwrap();
        let simple = class.utf8("Inner").unwrap();
        let attribute = class
            .attribute(
                "InnerClasses",
                AttributeBody::InnerClasses(vec![InnerClass {
                    inner_class: inner,
                    outer_class: outer,
                    inner_name: simple,
                    access: access::PRIVATE | access::STATIC | access::FINAL,
                }]),
            )
            .unwrap();
        class.attributes.push(attribute);

        class.update_access(access::make_public);
        assert_eq!(class.access, access::PUBLIC);
        let AttributeBody::InnerClasses(rows) = &class.attributes[0].body else {
            panic!("InnerClasses expected");
        };
        assert_eq!(rows[0].access, access::PUBLIC | access::STATIC | access::FINAL);
    }
}
