//! Binding environments.
//!
//! A `Context` pairs an ordered list of fragments (its *contents*) with a
//! symbol table of bindings. Contexts are values: deriving a child copies the
//! contents it is given and shares the parent's table through an `Arc`, and a
//! new binding clones the table only when it is actually shared
//! (`Arc::make_mut`). A published context is never edited in place.
//!
//! ```text
//! parent { contents: [*rest], bindings ─┐ }
//!                                        ├─▶ { rest: [b, c] }
//! child  { contents: [hi, *rest], ──────┘ }
//!
//! child.with_binding("x", ..) ──▶ copy of the table + x
//! ```
//!
//! The only in-place editing path is [`ContextBuilder`], which exists before a
//! context is handed to anything.

use crate::{Error, Fragment};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Fixed cost of any context, used for search-cost accounting.
pub const CONTEXT_OVERHEAD: usize = 8;
/// Per-fragment cost on top of the fragment's name length.
pub const FRAGMENT_OVERHEAD: usize = 4;

/// Variable name -> bound run of fragments.
pub type Bindings = BTreeMap<String, Vec<Fragment>>;

bitflags::bitflags! {
    /// Markers carried by a context.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ContextFlags: u8 {
        /// Built from a rule template: the result of a production.
        const PRODUCTION = 1 << 0;
        /// Holds arguments gathered for a template-only invocation.
        const ARGUMENTS  = 1 << 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    contents: Vec<Fragment>,
    bindings: Arc<Bindings>,
    flags: ContextFlags,
}

impl Context {
    pub fn new(contents: Vec<Fragment>) -> Self {
        Context { contents, bindings: Arc::default(), flags: ContextFlags::empty() }
    }

    pub fn empty() -> Self {
        Context::default()
    }

    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// A child with new contents, inheriting this context's bindings.
    ///
    /// Flags are not inherited.
    pub fn child(&self, contents: Vec<Fragment>) -> Context {
        Context { contents, bindings: Arc::clone(&self.bindings), flags: ContextFlags::empty() }
    }

    /// A copy of this context with `name` bound to `value`.
    pub fn with_binding(&self, name: impl Into<String>, value: Vec<Fragment>) -> Context {
        let mut bindings = Arc::clone(&self.bindings);
        Arc::make_mut(&mut bindings).insert(name.into(), value);
        Context { contents: self.contents.clone(), bindings, flags: self.flags }
    }

    /// A copy of this context carrying exactly `flags`.
    pub fn with_flags(&self, flags: ContextFlags) -> Context {
        Context { contents: self.contents.clone(), bindings: Arc::clone(&self.bindings), flags }
    }

    pub fn contents(&self) -> &[Fragment] {
        &self.contents
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn flags(&self) -> ContextFlags {
        self.flags
    }

    pub fn is_production(&self) -> bool {
        self.flags.contains(ContextFlags::PRODUCTION)
    }

    pub fn get(&self, name: &str) -> Option<&[Fragment]> {
        self.bindings.get(name).map(Vec::as_slice)
    }

    /// Strict accessor: a missing binding is an error.
    pub fn lookup(&self, name: &str) -> Result<&[Fragment], Error> {
        self.get(name).ok_or_else(|| Error::UnboundVariable(name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Nothing is left to match, or only a single wildcard that absorbs the
    /// rest of the input.
    pub fn is_full_match(&self) -> bool {
        match self.contents.as_slice() {
            [] => true,
            [only] => only.is_wildcard(),
            _ => false,
        }
    }

    /// Search-cost metric of the contents.
    pub fn size(&self) -> usize {
        CONTEXT_OVERHEAD + self.contents.iter().map(|f| f.name().len() + FRAGMENT_OVERHEAD).sum::<usize>()
    }

    /// Whether two contexts share one symbol table allocation.
    pub fn shares_bindings_with(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.bindings, &other.bindings)
    }

    /// Contents rendered as words, markers included.
    pub fn words(&self) -> Vec<String> {
        self.contents.iter().map(Fragment::name).collect()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.words().join(" "))
    }
}

/// Pre-publication construction of a [`Context`].
#[derive(Debug, Default)]
pub struct ContextBuilder {
    contents: Vec<Fragment>,
    bindings: Bindings,
    flags: ContextFlags,
}

impl ContextBuilder {
    /// Start from a copy of `parent`'s bindings.
    pub fn inherit(parent: &Context) -> Self {
        ContextBuilder { contents: Vec::new(), bindings: parent.bindings().clone(), flags: ContextFlags::empty() }
    }

    pub fn fragment(mut self, fragment: impl Into<Fragment>) -> Self {
        self.contents.push(fragment.into());
        self
    }

    pub fn contents(mut self, contents: impl IntoIterator<Item = Fragment>) -> Self {
        self.contents.extend(contents);
        self
    }

    pub fn bind(mut self, name: impl Into<String>, value: Vec<Fragment>) -> Self {
        self.set(name, value);
        self
    }

    /// Overwrite a binding in place.
    pub fn set(&mut self, name: impl Into<String>, value: Vec<Fragment>) {
        self.bindings.insert(name.into(), value);
    }

    pub fn flag(mut self, flags: ContextFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn build(self) -> Context {
        Context { contents: self.contents, bindings: Arc::new(self.bindings), flags: self.flags }
    }
}
