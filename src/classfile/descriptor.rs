//! Descriptor and generic-signature scanning and rewriting.
//!
//! Field and method descriptors embed class names as `L<binary name>;` tokens
//! (`(Ljava/lang/String;I)V`); the generic `Signature` attribute grammar adds
//! formal type parameters (`<X:...>`), type arguments, type variables
//! (`TX;`), wildcards, and inner-class suffixes (`.Inner`). Renaming a class
//! therefore means rewriting every descriptor and signature that mentions it.
//!
//! Descriptors are flat and handled by a token scan; signatures get a small
//! recursive-descent rewriter that follows the grammar far enough to know
//! which identifiers are class names (remapped), which are type-variable
//! names (never remapped), and how inner-class suffixes compose with their
//! outer name. The module also derives the *argument shape* of a method
//! descriptor - the parameter segment between the parentheses - which keys
//! the per-namespace name generators.
//!
//! # Usage Examples
//!
//! ```rust
//! use classcloak::classfile::descriptor;
//!
//! let mapped = descriptor::map_descriptor("(La/B;I)La/B;", &|name| {
//!     (name == "a/B").then(|| "x/y".to_string())
//! });
//! assert_eq!(mapped, "(Lx/y;I)Lx/y;");
//!
//! assert_eq!(descriptor::argument_shape("(La/B;I)V"), "La/B;I");
//! ```

/// Extract every embedded binary class name from a field or method descriptor.
///
/// Array dimensions are skipped; primitives contribute nothing. Names appear
/// in token order, with duplicates preserved.
#[must_use]
pub fn class_names(descriptor: &str) -> Vec<&str> {
    let bytes = descriptor.as_bytes();
    let mut names = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'L' {
            if let Some(end) = descriptor[i + 1..].find(';') {
                names.push(&descriptor[i + 1..i + 1 + end]);
                i += end + 2;
                continue;
            }
            break;
        }
        i += 1;
    }
    names
}

/// Rewrite every embedded class name of a descriptor through `map`.
///
/// `map` returns `Some(new)` to rename a class and `None` to keep it; the
/// surrounding descriptor structure is preserved byte-for-byte.
#[must_use]
pub fn map_descriptor(descriptor: &str, map: &dyn Fn(&str) -> Option<String>) -> String {
    let bytes = descriptor.as_bytes();
    let mut out = String::with_capacity(descriptor.len());
    let mut copied = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'L' {
            if let Some(end) = descriptor[i + 1..].find(';') {
                let name = &descriptor[i + 1..i + 1 + end];
                out.push_str(&descriptor[copied..=i]);
                match map(name) {
                    Some(new) => out.push_str(&new),
                    None => out.push_str(name),
                }
                out.push(';');
                i += end + 2;
                copied = i;
                continue;
            }
        }
        i += 1;
    }
    out.push_str(&descriptor[copied..]);
    out
}

/// The parameter segment of a method descriptor, without the parentheses.
///
/// Two methods whose descriptors share this segment compete for the same
/// generated names; the return type never disambiguates a call site, so it is
/// excluded from the shape.
#[must_use]
pub fn argument_shape(descriptor: &str) -> &str {
    let open = descriptor.find('(').map_or(0, |i| i + 1);
    let close = descriptor.rfind(')').unwrap_or(descriptor.len());
    if open <= close {
        &descriptor[open..close]
    } else {
        descriptor
    }
}

/// Rewrite every class reference of a generic signature through `map`.
///
/// Accepts any of the three `Signature` attribute forms (class, method,
/// field). Type variables are never remapped; inner-class suffixes are looked
/// up as `outer$Inner` and only the mapped simple name is spliced back in.
/// Malformed trailing input is copied through verbatim rather than failing -
/// signatures are advisory metadata and a rewrite must never corrupt the
/// surrounding file over one.
#[must_use]
pub fn map_signature(signature: &str, map: &dyn Fn(&str) -> Option<String>) -> String {
    let mut rewriter = SignatureRewriter {
        input: signature,
        pos: 0,
        out: String::with_capacity(signature.len()),
        map,
    };
    rewriter.signature();
    rewriter.out
}

struct SignatureRewriter<'a> {
    input: &'a str,
    pos: usize,
    out: String,
    map: &'a dyn Fn(&str) -> Option<String>,
}

impl SignatureRewriter<'_> {
    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    /// Copy `n` input bytes through verbatim. Only called with `n` landing on
    /// ASCII punctuation boundaries, so slicing stays on char boundaries.
    fn copy(&mut self, n: usize) {
        self.out.push_str(&self.input[self.pos..self.pos + n]);
        self.pos += n;
    }

    fn copy_rest(&mut self) {
        self.out.push_str(&self.input[self.pos..]);
        self.pos = self.input.len();
    }

    /// ClassSignature / MethodSignature / FieldSignature.
    fn signature(&mut self) {
        if self.peek() == Some(b'<') {
            self.formal_parameters();
        }
        while self.pos < self.input.len() {
            match self.peek() {
                Some(b'(' | b')' | b'^') => self.copy(1),
                _ => {
                    if !self.type_signature() {
                        // Unrecognized leftovers: pass through untouched.
                        self.copy_rest();
                    }
                }
            }
        }
    }

    /// `<` Identifier `:` ClassBound (`:` InterfaceBound)* ... `>`
    fn formal_parameters(&mut self) {
        self.copy(1); // '<'
        loop {
            match self.peek() {
                None => return,
                Some(b'>') => {
                    self.copy(1);
                    return;
                }
                _ => {
                    // Identifier up to ':' (copied verbatim; may be any
                    // chars, including a leading 'L').
                    match self.input[self.pos..].find(':') {
                        Some(rel) => self.copy(rel),
                        None => {
                            self.copy_rest();
                            return;
                        }
                    }
                    while self.peek() == Some(b':') {
                        self.copy(1);
                        // The class bound may be empty (`X::Linterface;`).
                        if !matches!(self.peek(), Some(b':') | Some(b'>') | None) {
                            self.type_signature();
                        }
                    }
                }
            }
        }
    }

    /// One TypeSignature. Returns `false` if the input does not start one.
    fn type_signature(&mut self) -> bool {
        match self.peek() {
            Some(b'[') => {
                self.copy(1);
                self.type_signature()
            }
            Some(b'L') => {
                self.class_type();
                true
            }
            Some(b'T') => {
                // Type variable: verbatim through the ';'.
                match self.input[self.pos..].find(';') {
                    Some(rel) => self.copy(rel + 1),
                    None => self.copy_rest(),
                }
                true
            }
            Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b'V') => {
                self.copy(1);
                true
            }
            _ => false,
        }
    }

    /// `L` PackageAndClass TypeArguments? (`.` Inner TypeArguments?)* `;`
    fn class_type(&mut self) {
        self.copy(1); // 'L'
        let mut qualified = String::new();
        let mut outermost = true;

        loop {
            let start = self.pos;
            // A name part runs to the next '<', '.', or ';'.
            let rel = self.input[self.pos..]
                .find(['<', '.', ';'])
                .unwrap_or(self.input.len() - self.pos);
            let part = &self.input[start..start + rel];
            self.pos += rel;

            qualified.push_str(part);
            match (self.map)(&qualified) {
                Some(mapped) if outermost => self.out.push_str(&mapped),
                Some(mapped) => {
                    let simple = mapped.rsplit(['$', '/']).next().unwrap_or(&mapped);
                    self.out.push_str(simple);
                }
                None => self.out.push_str(part),
            }

            if self.peek() == Some(b'<') {
                self.type_arguments();
            }
            match self.peek() {
                Some(b'.') => {
                    self.copy(1);
                    qualified.push('$');
                    outermost = false;
                }
                Some(b';') => {
                    self.copy(1);
                    return;
                }
                _ => return, // truncated; already copied what we saw
            }
        }
    }

    /// `<` (Wildcard? TypeSignature | `*`)+ `>`
    fn type_arguments(&mut self) {
        self.copy(1); // '<'
        loop {
            match self.peek() {
                None => return,
                Some(b'>') => {
                    self.copy(1);
                    return;
                }
                Some(b'*') => self.copy(1),
                Some(b'+' | b'-') => self.copy(1),
                _ => {
                    if !self.type_signature() {
                        self.copy_rest();
                        return;
                    }
                }
            }
        }
    }
}

/// `true` if `candidate` is plausibly a binary class name: nonempty
/// `/`-separated segments of identifier-legal characters.
///
/// The reflective-string stage uses this to filter `ldc` constants before
/// consulting the rename map; dotted source-form names are normalized by the
/// caller first.
#[must_use]
pub fn is_plausible_class_name(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.split('/').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swap_ab(name: &str) -> Option<String> {
        (name == "a/B").then(|| "x".to_string())
    }

    #[test]
    fn extracts_class_names() {
        assert_eq!(class_names("(La/B;[[Lc/D;I)Lc/D;"), vec!["a/B", "c/D", "c/D"]);
        assert_eq!(class_names("(IJ)V"), Vec::<&str>::new());
    }

    #[test]
    fn maps_descriptor_tokens() {
        assert_eq!(map_descriptor("(La/B;[La/B;J)La/B;", &swap_ab), "(Lx;[Lx;J)Lx;");
        assert_eq!(map_descriptor("(I)V", &swap_ab), "(I)V");
    }

    #[test]
    fn argument_shapes() {
        assert_eq!(argument_shape("(La/B;I)V"), "La/B;I");
        assert_eq!(argument_shape("()V"), "");
        assert_eq!(argument_shape("I"), "I", "field descriptors fall through whole");
    }

    #[test]
    fn signature_with_type_arguments() {
        let sig = "Ljava/util/List<La/B;>;";
        assert_eq!(map_signature(sig, &swap_ab), "Ljava/util/List<Lx;>;");

        let nested = "Ljava/util/Map<La/B;Ljava/util/List<+La/B;>;>;";
        assert_eq!(
            map_signature(nested, &swap_ab),
            "Ljava/util/Map<Lx;Ljava/util/List<+Lx;>;>;"
        );
    }

    #[test]
    fn signature_type_variables_untouched() {
        let sig = "<X:Ljava/lang/Object;>(TX;La/B;)TX;";
        assert_eq!(
            map_signature(sig, &swap_ab),
            "<X:Ljava/lang/Object;>(TX;Lx;)TX;"
        );
    }

    #[test]
    fn formal_parameter_name_starting_with_l() {
        // "List" here is a type-variable name, not a class type.
        let sig = "<List:La/B;>(TList;)V";
        assert_eq!(map_signature(sig, &swap_ab), "<List:Lx;>(TList;)V");
    }

    #[test]
    fn interface_bounds_and_wildcards() {
        let sig = "<K::La/B;>(La/B<*>;)V";
        assert_eq!(map_signature(sig, &swap_ab), "<K::Lx;>(Lx<*>;)V");
    }

    #[test]
    fn signature_inner_class_suffix() {
        let map = |name: &str| match name {
            "a/Outer" => Some("q/R".to_string()),
            "a/Outer$In" => Some("q/R$s".to_string()),
            _ => None,
        };
        assert_eq!(map_signature("La/Outer.In;", &map), "Lq/R.s;");
        // unmapped inner suffix keeps its own segment
        assert_eq!(map_signature("La/Outer.Other;", &map), "Lq/R.Other;");
    }

    #[test]
    fn throws_clause() {
        let sig = "()V^La/B;";
        assert_eq!(map_signature(sig, &swap_ab), "()V^Lx;");
    }

    #[test]
    fn plausible_class_names() {
        assert!(is_plausible_class_name("com/example/Foo$Bar"));
        assert!(is_plausible_class_name("Foo"));
        assert!(!is_plausible_class_name(""));
        assert!(!is_plausible_class_name("com//Foo"));
        assert!(!is_plausible_class_name("has space"));
    }
}
