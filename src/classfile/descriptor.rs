//! Rewriting class names inside descriptors and generic signatures.
//!
//! One recursive scanner covers field descriptors, method descriptors and
//! the class, method and field signature grammars: descriptors are the
//! subset of signatures without type parameters, type variables and type
//! arguments.

/// Maps a class name, returning `None` to keep it.
pub type NameMap<'a> = dyn FnMut(&str) -> Option<String> + 'a;

/// Rewrites every class name in a descriptor or signature.
///
/// Returns `None` if `input` is not well formed, in which case the caller
/// should leave it untouched. Inner-class suffixes (`.Inner` in signatures)
/// keep their simple names; only the outermost class name is mapped.
///
/// ```
/// use jarwright::classfile::remap_signature;
///
/// let mut map = |name: &str| name.strip_prefix("com/old/").map(|r| format!("com/new/{}", r));
/// assert_eq!(
///     remap_signature("(Lcom/old/A;[I)Ljava/util/List<Lcom/old/B;>;", &mut map).as_deref(),
///     Some("(Lcom/new/A;[I)Ljava/util/List<Lcom/new/B;>;")
/// );
/// assert_eq!(remap_signature("(Lcom/old/A", &mut map), None);
/// ```
pub fn remap_signature(input: &str, map: &mut NameMap<'_>) -> Option<String> {
    let mut scanner = Scanner {
        src: input,
        pos: 0,
        out: String::with_capacity(input.len() + 16),
        map,
    };
    scanner.signature()?;
    Some(scanner.out)
}

struct Scanner<'s, 'm, 'f> {
    src: &'s str,
    pos: usize,
    out: String,
    map: &'m mut NameMap<'f>,
}

impl Scanner<'_, '_, '_> {
    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn eat(&mut self, expected: u8) -> Option<()> {
        if self.peek() == Some(expected) {
            self.out.push(expected as char);
            self.pos += 1;
            Some(())
        } else {
            None
        }
    }

    /// Consumes up to (not including) the first of `stops`.
    fn identifier(&mut self, stops: &[u8]) -> Option<&str> {
        let start = self.pos;
        let bytes = self.src.as_bytes();
        while self.pos < bytes.len() && !stops.contains(&bytes[self.pos]) {
            self.pos += 1;
        }
        if self.pos == start || self.pos == bytes.len() {
            return None;
        }
        Some(&self.src[start..self.pos])
    }

    fn signature(&mut self) -> Option<()> {
        // annotation class values may name `void`
        if self.src == "V" {
            return self.eat(b'V');
        }
        if self.peek() == Some(b'<') {
            self.type_parameters()?;
        }
        if self.peek() == Some(b'(') {
            self.eat(b'(')?;
            while self.peek() != Some(b')') {
                self.java_type()?;
            }
            self.eat(b')')?;
            if self.eat(b'V').is_none() {
                self.java_type()?;
            }
            while self.peek() == Some(b'^') {
                self.eat(b'^')?;
                self.reference_type()?;
            }
        } else {
            // field descriptor, field signature, or superclass + interfaces
            self.java_type()?;
            while self.peek().is_some() {
                self.reference_type()?;
            }
        }
        if self.pos == self.src.len() {
            Some(())
        } else {
            None
        }
    }

    fn type_parameters(&mut self) -> Option<()> {
        self.eat(b'<')?;
        while self.peek() != Some(b'>') {
            let name = self.identifier(b":>")?.to_string();
            self.out.push_str(&name);
            self.eat(b':')?;
            // class bound may be empty
            if !matches!(self.peek(), Some(b':') | Some(b'>')) {
                self.reference_type()?;
            }
            while self.peek() == Some(b':') {
                self.eat(b':')?;
                self.reference_type()?;
            }
        }
        self.eat(b'>')
    }

    fn java_type(&mut self) -> Option<()> {
        match self.peek()? {
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => {
                let c = self.peek()?;
                self.eat(c)
            }
            _ => self.reference_type(),
        }
    }

    fn reference_type(&mut self) -> Option<()> {
        match self.peek()? {
            b'L' => self.class_type(),
            b'T' => {
                self.eat(b'T')?;
                let name = self.identifier(b";")?.to_string();
                self.out.push_str(&name);
                self.eat(b';')
            }
            b'[' => {
                self.eat(b'[')?;
                self.java_type()
            }
            _ => None,
        }
    }

    fn class_type(&mut self) -> Option<()> {
        self.eat(b'L')?;
        let name = self.identifier(b";<.")?.to_string();
        match (self.map)(&name) {
            Some(mapped) => self.out.push_str(&mapped),
            None => self.out.push_str(&name),
        }
        if self.peek() == Some(b'<') {
            self.type_arguments()?;
        }
        while self.peek() == Some(b'.') {
            self.eat(b'.')?;
            let inner = self.identifier(b";<.")?.to_string();
            self.out.push_str(&inner);
            if self.peek() == Some(b'<') {
                self.type_arguments()?;
            }
        }
        self.eat(b';')
    }

    fn type_arguments(&mut self) -> Option<()> {
        self.eat(b'<')?;
        if self.peek() == Some(b'>') {
            return None;
        }
        while self.peek() != Some(b'>') {
            match self.peek()? {
                b'*' => self.eat(b'*')?,
                b'+' | b'-' => {
                    let c = self.peek()?;
                    self.eat(c)?;
                    self.reference_type()?;
                }
                _ => self.reference_type()?,
            }
        }
        self.eat(b'>')
    }
}
