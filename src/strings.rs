use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use bumpalo::Bump;

/// An immutable string with a stable address inside a [`StringPool`].
///
/// The pool deduplicates on insertion, so two `InternedStr`s are byte-equal
/// iff they are the same allocation. Equality is a pointer comparison, which
/// lets names act as identity keys throughout the tree: the parser and the
/// passes compare declaration names without ever touching the bytes.
#[derive(Clone, Copy)]
pub struct InternedStr<'a>(&'a str);

impl<'a> InternedStr<'a> {
    pub fn as_str(self) -> &'a str {
        self.0
    }
}

impl<'a> PartialEq for InternedStr<'a> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl<'a> Eq for InternedStr<'a> {}

impl<'a> PartialEq<str> for InternedStr<'a> {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl<'a> PartialEq<&str> for InternedStr<'a> {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl<'a> Hash for InternedStr<'a> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.0.as_ptr() as usize).hash(state);
    }
}

impl<'a> std::ops::Deref for InternedStr<'a> {
    type Target = str;

    fn deref(&self) -> &str {
        self.0
    }
}

impl<'a> fmt::Display for InternedStr<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl<'a> fmt::Debug for InternedStr<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Deduplicating string storage backed by a caller-owned bump arena.
///
/// All interned strings share the arena's lifetime; nothing is freed until
/// the arena is dropped, together with the tree that references it.
pub struct StringPool<'a> {
    bump: &'a Bump,
    map: RefCell<HashMap<&'a str, &'a str>>,
}

impl<'a> StringPool<'a> {
    pub fn new(bump: &'a Bump) -> Self {
        StringPool {
            bump,
            map: RefCell::new(HashMap::new()),
        }
    }

    /// Interns `s`, returning the existing entry when an equal string was
    /// added before.
    pub fn add(&self, s: &str) -> InternedStr<'a> {
        if let Some(&existing) = self.map.borrow().get(s) {
            return InternedStr(existing);
        }
        let stored: &'a str = self.bump.alloc_str(s);
        self.map.borrow_mut().insert(stored, stored);
        InternedStr(stored)
    }

    /// Formats and interns in one step; used for generated names like
    /// flattening temporaries.
    pub fn add_format(&self, args: fmt::Arguments<'_>) -> InternedStr<'a> {
        self.add(&args.to_string())
    }

    pub fn contains(&self, s: &str) -> bool {
        self.map.borrow().contains_key(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_strings_intern_to_same_address() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let a = pool.add("normalize");
        let b = pool.add("normalize");
        assert_eq!(a, b);
        assert!(std::ptr::eq(a.as_str(), b.as_str()));
    }

    #[test]
    fn different_strings_intern_to_different_addresses() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let a = pool.add("lhs");
        let b = pool.add("rhs");
        assert_ne!(a, b);
    }

    #[test]
    fn contains_reports_only_interned_strings() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        pool.add("tex2D");
        assert!(pool.contains("tex2D"));
        assert!(!pool.contains("tex3D"));
    }

    #[test]
    fn add_format_deduplicates_against_plain_add() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let a = pool.add("tmp0");
        let b = pool.add_format(format_args!("tmp{}", 0));
        assert_eq!(a, b);
    }

    #[test]
    fn compares_with_plain_str_by_bytes() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let name = pool.add("main");
        assert!(name == *"main");
        assert!(name == "main");
    }
}
