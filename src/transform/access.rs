//! Access-flag patching of classes, fields and methods.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use super::Transformer;
use crate::archive::VirtualArchive;
use crate::classfile::{ClassRecord, access};
use crate::{Error, Result};

static CLASS_TARGET: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\w[\w/$]+\w)$|^L(\w[\w/$]+\w);$").ok());
static FIELD_TARGET: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?:L([^;]+);|([^.]+)\.)([^(]+):(.+)$").ok());
static METHOD_TARGET: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?:L([^;]+);|([^.]+)\.)([^(]+)(\([^)]*\).+)$").ok());

/// How a target's access flags change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMutation {
    /// Force public visibility.
    Accessible,
    /// Clear `final`.
    Mutable,
    /// Both.
    Full,
}

impl AccessMutation {
    /// Applies the mutation to a flag set; unrelated bits are preserved.
    pub fn apply(self, flags: u16) -> u16 {
        match self {
            AccessMutation::Accessible => access::make_public(flags),
            AccessMutation::Mutable => access::clear_final(flags),
            AccessMutation::Full => access::clear_final(access::make_public(flags)),
        }
    }
}

/// A class, field or method named by a target descriptor.
///
/// | Form | Example |
/// |------|---------|
/// | Class | `com/example/Foo`, `Lcom/example/Foo;` |
/// | Field | `com/example/Foo.count:I`, `Lcom/example/Foo;count:I` |
/// | Method | `com/example/Foo.run(I)V`, `Lcom/example/Foo;run(I)V` |
///
/// ```
/// use jarwright::transform::AccessTarget;
///
/// let target: AccessTarget = "com/example/Foo.run(I)V".parse()?;
/// assert_eq!(target.owner(), "com/example/Foo");
/// assert!("com.example.Foo".parse::<AccessTarget>().is_err());
/// # Ok::<(), jarwright::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccessTarget {
    /// A whole class.
    Class {
        /// Internal name of the class.
        owner: String,
    },
    /// One field.
    Field {
        /// Internal name of the declaring class.
        owner: String,
        /// Field name.
        name: String,
        /// Field descriptor.
        descriptor: String,
    },
    /// One method.
    Method {
        /// Internal name of the declaring class.
        owner: String,
        /// Method name.
        name: String,
        /// Method descriptor.
        descriptor: String,
    },
}

impl AccessTarget {
    /// Parses a target descriptor, trying the class, field and method forms
    /// in that order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTarget`] if no form matches.
    pub fn parse(target: &str) -> Result<Self> {
        let invalid = || Error::InvalidTarget {
            target: target.to_string(),
        };
        let (Some(class), Some(field), Some(method)) =
            (&*CLASS_TARGET, &*FIELD_TARGET, &*METHOD_TARGET)
        else {
            return Err(invalid());
        };

        if let Some(caps) = class.captures(target) {
            let owner = caps.get(1).or_else(|| caps.get(2)).ok_or_else(invalid)?;
            return Ok(AccessTarget::Class {
                owner: owner.as_str().to_string(),
            });
        }
        for (regex, is_field) in [(field, true), (method, false)] {
            let Some(caps) = regex.captures(target) else {
                continue;
            };
            let owner = caps.get(1).or_else(|| caps.get(2)).ok_or_else(invalid)?;
            let (Some(name), Some(descriptor)) = (caps.get(3), caps.get(4)) else {
                return Err(invalid());
            };
            let (owner, name, descriptor) = (
                owner.as_str().to_string(),
                name.as_str().to_string(),
                descriptor.as_str().to_string(),
            );
            return Ok(if is_field {
                AccessTarget::Field { owner, name, descriptor }
            } else {
                AccessTarget::Method { owner, name, descriptor }
            });
        }
        Err(invalid())
    }

    /// Returns the internal name of the class the target lives in.
    pub fn owner(&self) -> &str {
        match self {
            AccessTarget::Class { owner }
            | AccessTarget::Field { owner, .. }
            | AccessTarget::Method { owner, .. } => owner,
        }
    }

    fn apply(&self, class: &mut ClassRecord, mutation: AccessMutation) -> Result<()> {
        match self {
            AccessTarget::Class { .. } => {
                class.update_access(|flags| mutation.apply(flags));
            }
            AccessTarget::Field { owner, name, descriptor } => {
                let field = class.find_field_mut(name, descriptor).ok_or_else(|| Error::MemberNotFound {
                    member: format!("{}:{}", name, descriptor),
                    owner: owner.clone(),
                })?;
                field.access = mutation.apply(field.access);
            }
            AccessTarget::Method { owner, name, descriptor } => {
                let method = class.find_method_mut(name, descriptor).ok_or_else(|| Error::MemberNotFound {
                    member: format!("{}{}", name, descriptor),
                    owner: owner.clone(),
                })?;
                method.access = mutation.apply(method.access);
            }
        }
        Ok(())
    }
}

impl FromStr for AccessTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for AccessTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessTarget::Class { owner } => write!(f, "{}", owner),
            AccessTarget::Field { owner, name, descriptor } => write!(f, "{}.{}:{}", owner, name, descriptor),
            AccessTarget::Method { owner, name, descriptor } => write!(f, "{}.{}{}", owner, name, descriptor),
        }
    }
}

/// Widens access of listed classes and members.
///
/// Every target must resolve: a listed field or method missing from its
/// class fails the transformer with [`Error::MemberNotFound`]. Targets whose
/// class is not in the archive at all are reported with a warning.
#[derive(Debug, Clone)]
pub struct AccessPatcher {
    name: String,
    targets: Vec<(AccessTarget, AccessMutation)>,
}

impl AccessPatcher {
    /// Creates a patcher with no targets.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            targets: Vec::new(),
        }
    }

    /// Makes the targets public.
    pub fn accessible<S: AsRef<str>>(self, targets: impl IntoIterator<Item = S>) -> Result<Self> {
        self.with(targets, AccessMutation::Accessible)
    }

    /// Clears `final` on the targets.
    pub fn mutable<S: AsRef<str>>(self, targets: impl IntoIterator<Item = S>) -> Result<Self> {
        self.with(targets, AccessMutation::Mutable)
    }

    /// Makes the targets public and clears `final`.
    pub fn full<S: AsRef<str>>(self, targets: impl IntoIterator<Item = S>) -> Result<Self> {
        self.with(targets, AccessMutation::Full)
    }

    /// Adds one parsed target.
    pub fn target(mut self, target: AccessTarget, mutation: AccessMutation) -> Self {
        self.targets.push((target, mutation));
        self
    }

    fn with<S: AsRef<str>>(mut self, targets: impl IntoIterator<Item = S>, mutation: AccessMutation) -> Result<Self> {
        for target in targets {
            self.targets.push((AccessTarget::parse(target.as_ref())?, mutation));
        }
        Ok(self)
    }

    /// Returns the configured targets.
    pub fn targets(&self) -> &[(AccessTarget, AccessMutation)] {
        &self.targets
    }
}

impl Transformer for AccessPatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&mut self, archive: &mut VirtualArchive) -> Result<()> {
        if self.targets.is_empty() {
            return Ok(());
        }
        let mut seen = vec![false; self.targets.len()];

        for path in archive.walk("") {
            if !path.is_class_file() {
                continue;
            }
            let Some(bytes) = archive.read(path.as_str()) else {
                continue;
            };
            let mut class = ClassRecord::decode(bytes).map_err(|e| e.in_entry(path.as_str()))?;
            let class_name = class.name();

            let mut modified = false;
            for (i, (target, mutation)) in self.targets.iter().enumerate() {
                if target.owner() != class_name {
                    continue;
                }
                target
                    .apply(&mut class, *mutation)
                    .map_err(|e| e.in_entry(path.as_str()))?;
                seen[i] = true;
                modified = true;
            }

            if modified {
                let bytes = class.encode().map_err(|e| e.in_entry(path.as_str()))?;
                archive.write(path.as_str(), bytes)?;
                log::debug!("Patched access in {}", path);
            }
        }

        for ((target, _), seen) in self.targets.iter().zip(seen) {
            if !seen {
                log::warn!("Access target {} matched no class in {}", target, archive.display_name());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::access::*;

    fn archive_with_class() -> VirtualArchive {
        let mut class = ClassRecord::new("com/Foo", Some("java/lang/Object"), FINAL).unwrap();
        class.add_field(PRIVATE | FINAL | STATIC, "bar", "I").unwrap();
        class.add_method(PROTECTED | SYNTHETIC, "run", "(I)V").unwrap();
        let mut archive = VirtualArchive::in_memory();
        archive.write("com/Foo.class", class.encode().unwrap()).unwrap();
        archive
    }

    fn read_class(archive: &VirtualArchive) -> ClassRecord {
        ClassRecord::decode(archive.read("com/Foo.class").unwrap()).unwrap()
    }

    #[test]
    fn test_target_grammars_compile() {
        assert!(CLASS_TARGET.is_some());
        assert!(FIELD_TARGET.is_some());
        assert!(METHOD_TARGET.is_some());
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(
            AccessTarget::parse("com/Foo").unwrap(),
            AccessTarget::Class { owner: "com/Foo".into() }
        );
        assert_eq!(
            AccessTarget::parse("Lcom/Foo$Inner;").unwrap(),
            AccessTarget::Class { owner: "com/Foo$Inner".into() }
        );
        assert_eq!(
            AccessTarget::parse("com/Foo.bar:I").unwrap(),
            AccessTarget::Field {
                owner: "com/Foo".into(),
                name: "bar".into(),
                descriptor: "I".into()
            }
        );
        assert_eq!(
            AccessTarget::parse("Lcom/Foo;bar:Ljava/lang/String;").unwrap(),
            AccessTarget::Field {
                owner: "com/Foo".into(),
                name: "bar".into(),
                descriptor: "Ljava/lang/String;".into()
            }
        );
        assert_eq!(
            AccessTarget::parse("com/Foo.<init>(I)V").unwrap(),
            AccessTarget::Method {
                owner: "com/Foo".into(),
                name: "<init>".into(),
                descriptor: "(I)V".into()
            }
        );
    }

    #[test]
    fn test_parse_invalid() {
        for input in ["", "a", "com.Foo", "com/Foo.bar", "com/Foo.run(", "com/Foo;"] {
            let err = AccessTarget::parse(input).unwrap_err();
            assert!(matches!(err, Error::InvalidTarget { ref target } if target == input), "{}", input);
        }
    }

    #[test]
    fn test_display_round_trips() {
        for input in ["com/Foo", "com/Foo.bar:I", "com/Foo.run(I)V"] {
            assert_eq!(AccessTarget::parse(input).unwrap().to_string(), input);
        }
    }

    #[test]
    fn test_mutations_touch_only_their_bits() {
        let flags = PRIVATE | FINAL | STATIC | SYNTHETIC;
        assert_eq!(AccessMutation::Accessible.apply(flags), PUBLIC | FINAL | STATIC | SYNTHETIC);
        assert_eq!(AccessMutation::Mutable.apply(flags), PRIVATE | STATIC | SYNTHETIC);
        assert_eq!(AccessMutation::Full.apply(flags), PUBLIC | STATIC | SYNTHETIC);
    }

    #[test]
    fn test_patch_field_method_and_class() {
        let mut archive = archive_with_class();
        let mut patcher = AccessPatcher::new("access")
            .full(["com/Foo.bar:I"])
            .unwrap()
            .accessible(["com/Foo.run(I)V"])
            .unwrap()
            .mutable(["com/Foo"])
            .unwrap();
        patcher.transform(&mut archive).unwrap();

        let class = read_class(&archive);
        assert_eq!(class.access, 0);
        assert_eq!(class.find_field("bar", "I").unwrap().access, PUBLIC | STATIC);
        assert_eq!(class.find_method("run", "(I)V").unwrap().access, PUBLIC | SYNTHETIC);
    }

    #[test]
    fn test_missing_member_fails() {
        let mut archive = archive_with_class();
        let mut patcher = AccessPatcher::new("access").accessible(["com/Foo.bar:J"]).unwrap();
        let err = patcher.transform(&mut archive).unwrap_err();

        match err.root_cause() {
            Error::MemberNotFound { member, owner } => {
                assert_eq!(member, "bar:J");
                assert_eq!(owner, "com/Foo");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.entry_path(), Some("com/Foo.class"));
    }

    #[test]
    fn test_unmatched_classes_untouched() {
        let mut archive = archive_with_class();
        let before = archive.read("com/Foo.class").unwrap().to_vec();
        let mut patcher = AccessPatcher::new("access").accessible(["com/Other"]).unwrap();
        patcher.transform(&mut archive).unwrap();
        assert_eq!(archive.read("com/Foo.class").unwrap(), before.as_slice());
    }
}
