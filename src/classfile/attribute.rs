//! Class, field, method and code attributes.
//!
//! Attributes that carry names (signatures, annotations, local variable
//! tables, record components and the like) are parsed so that their
//! constant-pool references can be visited. Everything else, including any
//! attribute whose body does not parse cleanly, is carried as raw bytes.

use super::NameRole;
use super::pool::ConstantPool;
use crate::Result;
use crate::binary::{ByteReader, ByteWriter, Format};

/// Deepest annotation nesting accepted before an attribute is kept raw.
const MAX_NESTING: usize = 64;

/// Raw attributes known not to point at `Utf8` constants.
///
/// A class carrying any other raw attribute may hold `Utf8` references that
/// are invisible to remapping, so shared strings are never rewritten in
/// place for it.
const OPAQUE_SAFE: &[&str] = &[
    "StackMapTable",
    "BootstrapMethods",
    "Exceptions",
    "EnclosingMethod",
    "NestHost",
    "NestMembers",
    "PermittedSubclasses",
    "LineNumberTable",
    "SourceDebugExtension",
    "Deprecated",
    "Synthetic",
    "ModuleMainClass",
    "ModulePackages",
];

/// One attribute: its name index and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// `Utf8` index of the attribute name.
    pub name: u16,
    /// The decoded body.
    pub body: AttributeBody,
}

/// Decoded attribute bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeBody {
    /// `ConstantValue`: index of the field's initial value.
    ConstantValue(u16),
    /// `Signature`: generic signature `Utf8`.
    Signature(u16),
    /// `SourceFile`: source file name `Utf8`.
    SourceFile(u16),
    /// `Code` of a method.
    Code(Code),
    /// `LocalVariableTable` (`generic == false`) or `LocalVariableTypeTable`.
    LocalVariables {
        /// True for the type table, whose descriptors are signatures.
        generic: bool,
        /// Table rows.
        entries: Vec<LocalVariable>,
    },
    /// `Runtime(In)VisibleAnnotations`.
    Annotations(Vec<Annotation>),
    /// `Runtime(In)VisibleParameterAnnotations`, one list per parameter.
    ParameterAnnotations(Vec<Vec<Annotation>>),
    /// `Runtime(In)VisibleTypeAnnotations`.
    TypeAnnotations(Vec<TypeAnnotation>),
    /// `AnnotationDefault` of an annotation interface method.
    AnnotationDefault(ElementValue),
    /// `Record` components.
    Record(Vec<RecordComponent>),
    /// `InnerClasses` table.
    InnerClasses(Vec<InnerClass>),
    /// `MethodParameters` table.
    MethodParameters(Vec<MethodParameter>),
    /// Any other attribute, byte for byte.
    Raw(Vec<u8>),
}

/// Body of a `Code` attribute. The instruction stream is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    /// Operand stack depth.
    pub max_stack: u16,
    /// Local variable slots.
    pub max_locals: u16,
    /// Bytecode.
    pub code: Vec<u8>,
    /// Exception table rows, eight bytes each.
    pub exception_table: Vec<u8>,
    /// Nested attributes.
    pub attributes: Vec<Attribute>,
}

/// A local variable table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct LocalVariable {
    pub start_pc: u16,
    pub length: u16,
    pub name: u16,
    pub descriptor: u16,
    pub index: u16,
}

/// An annotation: its type and element-value pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// `Utf8` field descriptor of the annotation type.
    pub type_index: u16,
    /// Element-value pairs.
    pub elements: Vec<(u16, ElementValue)>,
}

/// An annotation element value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementValue {
    /// Primitive or string constant. For tag `s` the index is a `Utf8`,
    /// otherwise a numeric constant.
    Const {
        /// One of `BCDFIJSZs`.
        tag: u8,
        /// Constant-pool index.
        index: u16,
    },
    /// Enum constant.
    Enum {
        /// `Utf8` field descriptor of the enum type.
        type_name: u16,
        /// `Utf8` simple name of the constant.
        const_name: u16,
    },
    /// Class literal; `Utf8` return descriptor.
    Class(u16),
    /// Nested annotation.
    Annotation(Annotation),
    /// Array of values.
    Array(Vec<ElementValue>),
}

/// A type annotation. Target and type path are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAnnotation {
    /// `target_type`, `target_info` and `type_path` bytes.
    pub target: Vec<u8>,
    /// The annotation proper.
    pub annotation: Annotation,
}

/// A record component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordComponent {
    /// `Utf8` component name.
    pub name: u16,
    /// `Utf8` field descriptor.
    pub descriptor: u16,
    /// Component attributes.
    pub attributes: Vec<Attribute>,
}

/// An `InnerClasses` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerClass {
    /// `Class` of the nested class.
    pub inner_class: u16,
    /// `Class` of the enclosing class, 0 if not a member.
    pub outer_class: u16,
    /// `Utf8` simple name, 0 if anonymous.
    pub inner_name: u16,
    /// Access flags as declared in source.
    pub access: u16,
}

/// A `MethodParameters` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodParameter {
    /// `Utf8` parameter name, 0 if absent.
    pub name: u16,
    /// Parameter flags.
    pub access: u16,
}

impl Attribute {
    /// Reads a `u16` count followed by that many attributes.
    pub(crate) fn decode_all(r: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<Vec<Self>> {
        let count = r.u16()?;
        let mut attributes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            attributes.push(Self::decode(r, pool)?);
        }
        Ok(attributes)
    }

    fn decode(r: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<Self> {
        let name = r.u16()?;
        let length = r.u32()? as usize;
        let data = r.bytes(length)?;

        let kind = pool.utf8(name).unwrap_or_default();
        let body = match parse_body(&kind, data, pool) {
            Ok(Some(body)) => body,
            Ok(None) => AttributeBody::Raw(data.to_vec()),
            Err(e) => {
                log::debug!("Keeping malformed {} attribute raw: {}", kind, e);
                AttributeBody::Raw(data.to_vec())
            }
        };
        Ok(Self { name, body })
    }

    pub(crate) fn encode_all(attributes: &[Self], out: &mut Vec<u8>) -> Result<()> {
        out.put_len16(attributes.len(), "encode more than 65535 attributes")?;
        for attribute in attributes {
            attribute.encode(out)?;
        }
        Ok(())
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut body = Vec::new();
        encode_body(&self.body, &mut body)?;
        let length = u32::try_from(body.len()).map_err(|_| crate::Error::Unsupported {
            operation: "encode attribute larger than 4 GiB",
        })?;
        out.put_u16(self.name);
        out.put_u32(length);
        out.extend_from_slice(&body);
        Ok(())
    }

    /// Returns true if this attribute may hide `Utf8` references.
    pub(crate) fn has_untracked_refs(&self, pool: &ConstantPool) -> bool {
        match &self.body {
            AttributeBody::Raw(_) => {
                let kind = pool.utf8(self.name).unwrap_or_default();
                !OPAQUE_SAFE.contains(&kind.as_str())
            }
            AttributeBody::Code(code) => code.attributes.iter().any(|a| a.has_untracked_refs(pool)),
            AttributeBody::Record(components) => components
                .iter()
                .flat_map(|c| &c.attributes)
                .any(|a| a.has_untracked_refs(pool)),
            _ => false,
        }
    }

    pub(crate) fn visit_utf8_refs(&mut self, f: &mut dyn FnMut(&mut u16, NameRole)) {
        f(&mut self.name, NameRole::Opaque);
        match &mut self.body {
            AttributeBody::ConstantValue(_) | AttributeBody::Raw(_) => {}
            AttributeBody::Signature(index) => f(index, NameRole::Signature),
            AttributeBody::SourceFile(index) => f(index, NameRole::Opaque),
            AttributeBody::Code(code) => {
                for attribute in &mut code.attributes {
                    attribute.visit_utf8_refs(f);
                }
            }
            AttributeBody::LocalVariables { generic, entries } => {
                let role = if *generic {
                    NameRole::Signature
                } else {
                    NameRole::Descriptor
                };
                for entry in entries {
                    f(&mut entry.name, NameRole::Opaque);
                    f(&mut entry.descriptor, role);
                }
            }
            AttributeBody::Annotations(annotations) => {
                for annotation in annotations {
                    annotation.visit_utf8_refs(f);
                }
            }
            AttributeBody::ParameterAnnotations(parameters) => {
                for annotation in parameters.iter_mut().flatten() {
                    annotation.visit_utf8_refs(f);
                }
            }
            AttributeBody::TypeAnnotations(annotations) => {
                for annotation in annotations {
                    annotation.annotation.visit_utf8_refs(f);
                }
            }
            AttributeBody::AnnotationDefault(value) => value.visit_utf8_refs(f),
            AttributeBody::Record(components) => {
                for component in components {
                    f(&mut component.name, NameRole::Opaque);
                    f(&mut component.descriptor, NameRole::Descriptor);
                    for attribute in &mut component.attributes {
                        attribute.visit_utf8_refs(f);
                    }
                }
            }
            AttributeBody::InnerClasses(classes) => {
                for class in classes {
                    f(&mut class.inner_name, NameRole::Opaque);
                }
            }
            AttributeBody::MethodParameters(parameters) => {
                for parameter in parameters {
                    f(&mut parameter.name, NameRole::Opaque);
                }
            }
        }
    }
}

impl Annotation {
    fn decode(r: &mut ByteReader<'_>, depth: usize) -> Result<Self> {
        let type_index = r.u16()?;
        let count = r.u16()?;
        let mut elements = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = r.u16()?;
            elements.push((name, ElementValue::decode(r, depth)?));
        }
        Ok(Self {
            type_index,
            elements,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_u16(self.type_index);
        out.put_len16(self.elements.len(), "encode more than 65535 annotation elements")?;
        for (name, value) in &self.elements {
            out.put_u16(*name);
            value.encode(out)?;
        }
        Ok(())
    }

    fn visit_utf8_refs(&mut self, f: &mut dyn FnMut(&mut u16, NameRole)) {
        f(&mut self.type_index, NameRole::Descriptor);
        for (name, value) in &mut self.elements {
            f(name, NameRole::Opaque);
            value.visit_utf8_refs(f);
        }
    }

    fn decode_list(r: &mut ByteReader<'_>) -> Result<Vec<Self>> {
        let count = r.u16()?;
        (0..count).map(|_| Self::decode(r, 0)).collect()
    }

    fn encode_list(annotations: &[Self], out: &mut Vec<u8>) -> Result<()> {
        out.put_len16(annotations.len(), "encode more than 65535 annotations")?;
        annotations.iter().try_for_each(|a| a.encode(out))
    }
}

impl ElementValue {
    fn decode(r: &mut ByteReader<'_>, depth: usize) -> Result<Self> {
        if depth > MAX_NESTING {
            return Err(r.corrupt("annotation nesting too deep"));
        }
        let tag = r.u8()?;
        Ok(match tag {
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => ElementValue::Const {
                tag,
                index: r.u16()?,
            },
            b'e' => ElementValue::Enum {
                type_name: r.u16()?,
                const_name: r.u16()?,
            },
            b'c' => ElementValue::Class(r.u16()?),
            b'@' => ElementValue::Annotation(Annotation::decode(r, depth + 1)?),
            b'[' => {
                let count = r.u16()?;
                let mut values = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    values.push(ElementValue::decode(r, depth + 1)?);
                }
                ElementValue::Array(values)
            }
            other => return Err(r.corrupt(format!("unknown element value tag {:#04x}", other))),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            ElementValue::Const { tag, index } => {
                out.put_u8(*tag);
                out.put_u16(*index);
            }
            ElementValue::Enum {
                type_name,
                const_name,
            } => {
                out.put_u8(b'e');
                out.put_u16(*type_name);
                out.put_u16(*const_name);
            }
            ElementValue::Class(index) => {
                out.put_u8(b'c');
                out.put_u16(*index);
            }
            ElementValue::Annotation(annotation) => {
                out.put_u8(b'@');
                annotation.encode(out)?;
            }
            ElementValue::Array(values) => {
                out.put_u8(b'[');
                out.put_len16(values.len(), "encode more than 65535 array values")?;
                for value in values {
                    value.encode(out)?;
                }
            }
        }
        Ok(())
    }

    fn visit_utf8_refs(&mut self, f: &mut dyn FnMut(&mut u16, NameRole)) {
        match self {
            ElementValue::Const { tag: b's', index } => f(index, NameRole::StringLiteral),
            ElementValue::Const { .. } => {}
            ElementValue::Enum {
                type_name,
                const_name,
            } => {
                f(type_name, NameRole::Descriptor);
                f(const_name, NameRole::Opaque);
            }
            ElementValue::Class(index) => f(index, NameRole::Descriptor),
            ElementValue::Annotation(annotation) => annotation.visit_utf8_refs(f),
            ElementValue::Array(values) => {
                for value in values {
                    value.visit_utf8_refs(f);
                }
            }
        }
    }
}

fn decode_type_annotation(r: &mut ByteReader<'_>) -> Result<TypeAnnotation> {
    let target_type = r.u8()?;
    let mut target = vec![target_type];
    let info_len = match target_type {
        0x13..=0x15 => 0,
        0x00 | 0x01 | 0x16 => 1,
        0x10..=0x12 | 0x17 | 0x42..=0x46 => 2,
        0x47..=0x4B => 3,
        0x40 | 0x41 => {
            let rows = r.u16()?;
            target.put_u16(rows);
            rows as usize * 6
        }
        other => return Err(r.corrupt(format!("unknown type annotation target {:#04x}", other))),
    };
    target.extend_from_slice(r.bytes(info_len)?);

    let path_length = r.u8()?;
    target.put_u8(path_length);
    target.extend_from_slice(r.bytes(path_length as usize * 2)?);

    Ok(TypeAnnotation {
        target,
        annotation: Annotation::decode(r, 0)?,
    })
}

/// Parses the body of a known attribute; `None` means keep it raw.
fn parse_body(kind: &str, data: &[u8], pool: &ConstantPool) -> Result<Option<AttributeBody>> {
    let mut r = ByteReader::new(data, Format::Class);
    let body = match kind {
        "ConstantValue" => AttributeBody::ConstantValue(r.u16()?),
        "Signature" => AttributeBody::Signature(r.u16()?),
        "SourceFile" => AttributeBody::SourceFile(r.u16()?),
        "Code" => {
            let max_stack = r.u16()?;
            let max_locals = r.u16()?;
            let code_length = r.u32()? as usize;
            let code = r.bytes(code_length)?.to_vec();
            let rows = r.u16()? as usize;
            let exception_table = r.bytes(rows * 8)?.to_vec();
            let attributes = Attribute::decode_all(&mut r, pool)?;
            AttributeBody::Code(Code {
                max_stack,
                max_locals,
                code,
                exception_table,
                attributes,
            })
        }
        "LocalVariableTable" | "LocalVariableTypeTable" => {
            let count = r.u16()?;
            let mut entries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                entries.push(LocalVariable {
                    start_pc: r.u16()?,
                    length: r.u16()?,
                    name: r.u16()?,
                    descriptor: r.u16()?,
                    index: r.u16()?,
                });
            }
            AttributeBody::LocalVariables {
                generic: kind == "LocalVariableTypeTable",
                entries,
            }
        }
        "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
            AttributeBody::Annotations(Annotation::decode_list(&mut r)?)
        }
        "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
            let count = r.u8()?;
            let mut parameters = Vec::with_capacity(count as usize);
            for _ in 0..count {
                parameters.push(Annotation::decode_list(&mut r)?);
            }
            AttributeBody::ParameterAnnotations(parameters)
        }
        "RuntimeVisibleTypeAnnotations" | "RuntimeInvisibleTypeAnnotations" => {
            let count = r.u16()?;
            let mut annotations = Vec::with_capacity(count as usize);
            for _ in 0..count {
                annotations.push(decode_type_annotation(&mut r)?);
            }
            AttributeBody::TypeAnnotations(annotations)
        }
        "AnnotationDefault" => AttributeBody::AnnotationDefault(ElementValue::decode(&mut r, 0)?),
        "Record" => {
            let count = r.u16()?;
            let mut components = Vec::with_capacity(count as usize);
            for _ in 0..count {
                components.push(RecordComponent {
                    name: r.u16()?,
                    descriptor: r.u16()?,
                    attributes: Attribute::decode_all(&mut r, pool)?,
                });
            }
            AttributeBody::Record(components)
        }
        "InnerClasses" => {
            let count = r.u16()?;
            let mut classes = Vec::with_capacity(count as usize);
            for _ in 0..count {
                classes.push(InnerClass {
                    inner_class: r.u16()?,
                    outer_class: r.u16()?,
                    inner_name: r.u16()?,
                    access: r.u16()?,
                });
            }
            AttributeBody::InnerClasses(classes)
        }
        "MethodParameters" => {
            let count = r.u8()?;
            let mut parameters = Vec::with_capacity(count as usize);
            for _ in 0..count {
                parameters.push(MethodParameter {
                    name: r.u16()?,
                    access: r.u16()?,
                });
            }
            AttributeBody::MethodParameters(parameters)
        }
        _ => return Ok(None),
    };

    if !r.is_empty() {
        return Err(r.corrupt(format!("{} trailing bytes in {}", r.remaining(), kind)));
    }
    Ok(Some(body))
}

fn encode_body(body: &AttributeBody, out: &mut Vec<u8>) -> Result<()> {
    match body {
        AttributeBody::ConstantValue(index)
        | AttributeBody::Signature(index)
        | AttributeBody::SourceFile(index) => out.put_u16(*index),
        AttributeBody::Code(code) => {
            out.put_u16(code.max_stack);
            out.put_u16(code.max_locals);
            out.put_u32(code.code.len() as u32);
            out.extend_from_slice(&code.code);
            out.put_len16(code.exception_table.len() / 8, "encode more than 65535 handlers")?;
            out.extend_from_slice(&code.exception_table);
            Attribute::encode_all(&code.attributes, out)?;
        }
        AttributeBody::LocalVariables { entries, .. } => {
            out.put_len16(entries.len(), "encode more than 65535 local variables")?;
            for entry in entries {
                out.put_u16(entry.start_pc);
                out.put_u16(entry.length);
                out.put_u16(entry.name);
                out.put_u16(entry.descriptor);
                out.put_u16(entry.index);
            }
        }
        AttributeBody::Annotations(annotations) => Annotation::encode_list(annotations, out)?,
        AttributeBody::ParameterAnnotations(parameters) => {
            let count = u8::try_from(parameters.len()).map_err(|_| crate::Error::Unsupported {
                operation: "encode more than 255 annotated parameters",
            })?;
            out.put_u8(count);
            for annotations in parameters {
                Annotation::encode_list(annotations, out)?;
            }
        }
        AttributeBody::TypeAnnotations(annotations) => {
            out.put_len16(annotations.len(), "encode more than 65535 type annotations")?;
            for annotation in annotations {
                out.extend_from_slice(&annotation.target);
                annotation.annotation.encode(out)?;
            }
        }
        AttributeBody::AnnotationDefault(value) => value.encode(out)?,
        AttributeBody::Record(components) => {
            out.put_len16(components.len(), "encode more than 65535 record components")?;
            for component in components {
                out.put_u16(component.name);
                out.put_u16(component.descriptor);
                Attribute::encode_all(&component.attributes, out)?;
            }
        }
        AttributeBody::InnerClasses(classes) => {
            out.put_len16(classes.len(), "encode more than 65535 inner classes")?;
            for class in classes {
                out.put_u16(class.inner_class);
                out.put_u16(class.outer_class);
                out.put_u16(class.inner_name);
                out.put_u16(class.access);
            }
        }
        AttributeBody::MethodParameters(parameters) => {
            let count = u8::try_from(parameters.len()).map_err(|_| crate::Error::Unsupported {
                operation: "encode more than 255 method parameters",
            })?;
            out.put_u8(count);
            for parameter in parameters {
                out.put_u16(parameter.name);
                out.put_u16(parameter.access);
            }
        }
        AttributeBody::Raw(bytes) => out.extend_from_slice(bytes),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with(names: &[&str]) -> (ConstantPool, Vec<u16>) {
        let mut pool = ConstantPool::new();
        let indices = names.iter().map(|n| pool.intern_utf8(n).unwrap()).collect();
        (pool, indices)
    }

    fn round_trip(attribute: &Attribute, pool: &ConstantPool) -> Attribute {
        let mut out = Vec::new();
        Attribute::encode_all(std::slice::from_ref(attribute), &mut out).unwrap();
        let mut r = ByteReader::new(&out, Format::Class);
        let mut decoded = Attribute::decode_all(&mut r, pool).unwrap();
        assert!(r.is_empty());
        decoded.remove(0)
    }

    #[test]
    fn test_nested_annotations_round_trip() {
        let (pool, idx) = pool_with(&["RuntimeVisibleAnnotations", "La/Ann;", "value", "text"]);
        let inner = Annotation {
            type_index: idx[1],
            elements: vec![(idx[2], ElementValue::Const { tag: b's', index: idx[3] })],
        };
        let attribute = Attribute {
            name: idx[0],
            body: AttributeBody::Annotations(vec![Annotation {
                type_index: idx[1],
                elements: vec![(
                    idx[2],
                    ElementValue::Array(vec![
                        ElementValue::Annotation(inner),
                        ElementValue::Class(idx[1]),
                    ]),
                )],
            }]),
        };
        assert_eq!(round_trip(&attribute, &pool), attribute);
    }

    #[test]
    fn test_type_annotation_local_variable_target() {
        let (pool, idx) = pool_with(&["RuntimeInvisibleTypeAnnotations", "La/T;"]);
        // localvar_target with one row, then an empty type path
        let mut target = vec![0x40];
        target.put_u16(1);
        target.extend_from_slice(&[0, 0, 0, 4, 0, 1]);
        target.put_u8(0);
        let attribute = Attribute {
            name: idx[0],
            body: AttributeBody::TypeAnnotations(vec![TypeAnnotation {
                target,
                annotation: Annotation {
                    type_index: idx[1],
                    elements: Vec::new(),
                },
            }]),
        };
        assert_eq!(round_trip(&attribute, &pool), attribute);
    }

    #[test]
    fn test_unknown_attribute_kept_raw() {
        let (pool, idx) = pool_with(&["Custom"]);
        let attribute = Attribute {
            name: idx[0],
            body: AttributeBody::Raw(vec![1, 2, 3]),
        };
        assert_eq!(round_trip(&attribute, &pool), attribute);
        assert!(attribute.has_untracked_refs(&pool));
    }

    #[test]
    fn test_malformed_known_attribute_kept_raw() {
        let (pool, idx) = pool_with(&["Signature"]);
        let mut out = Vec::new();
        out.put_u16(1);
        out.put_u16(idx[0]);
        out.put_u32(3);
        out.extend_from_slice(&[0, 1, 2]);
        let decoded = Attribute::decode_all(&mut ByteReader::new(&out, Format::Class), &pool).unwrap();
        assert_eq!(decoded[0].body, AttributeBody::Raw(vec![0, 1, 2]));
    }

    #[test]
    fn test_deep_nesting_is_bounded() {
        let (pool, idx) = pool_with(&["AnnotationDefault"]);
        let body = vec![b'['; 1000];
        let mut out = Vec::new();
        out.put_u16(1);
        out.put_u16(idx[0]);
        out.put_u32(body.len() as u32);
        out.extend_from_slice(&body);
        let decoded = Attribute::decode_all(&mut ByteReader::new(&out, Format::Class), &pool).unwrap();
        assert!(matches!(decoded[0].body, AttributeBody::Raw(_)));
    }

    #[test]
    fn test_visit_roles() {
        let (_, idx) = pool_with(&["RuntimeVisibleAnnotations", "La/Ann;", "v", "s", "La/E;", "X"]);
        let mut attribute = Attribute {
            name: idx[0],
            body: AttributeBody::Annotations(vec![Annotation {
                type_index: idx[1],
                elements: vec![
                    (idx[2], ElementValue::Const { tag: b's', index: idx[3] }),
                    (idx[2], ElementValue::Enum { type_name: idx[4], const_name: idx[5] }),
                ],
            }]),
        };
        let mut seen = Vec::new();
        attribute.visit_utf8_refs(&mut |i, role| seen.push((*i, role)));
        assert!(seen.contains(&(idx[1], NameRole::Descriptor)));
        assert!(seen.contains(&(idx[3], NameRole::StringLiteral)));
        assert!(seen.contains(&(idx[4], NameRole::Descriptor)));
        assert!(seen.contains(&(idx[5], NameRole::Opaque)));
    }
}
