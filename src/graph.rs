//! In-memory edit graph of one module's declared elements.
//!
//! The graph is a mutation-friendly projection of the module's `TypeDef`,
//! `Field`, `Property` and `MethodDef` rows: raw attribute flags, names,
//! the nested-type tree, property accessor associations, and the qualified
//! constructor type names of attached annotations. The rewriter mutates this
//! graph in place; the assembly glue builds it from a loaded module and
//! flushes the accumulated changes back through the format library.
//!
//! Nodes are addressed by plain indices into the per-kind vectors. Nested
//! types form a strict tree, enforced by the host binary format; the graph
//! does not re-verify it.

use crate::attributes::{FieldAttributes, MethodAttributes, TypeAttributes};
use crate::markers::MarkerKind;

/// Index of a [`TypeNode`] within its [`ModuleGraph`].
pub type TypeIndex = usize;
/// Index of a [`FieldNode`] within its [`ModuleGraph`].
pub type FieldIndex = usize;
/// Index of a [`PropertyNode`] within its [`ModuleGraph`].
pub type PropertyIndex = usize;
/// Index of a [`MethodNode`] within its [`ModuleGraph`].
pub type MethodIndex = usize;

/// A type declaration and its declared members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeNode {
    /// `TypeDef` row id in the host module (0 for synthetic fixtures)
    pub rid: u32,
    /// Raw `TypeDef` attribute flags
    pub flags: u32,
    /// Namespace, empty for nested types and the global namespace
    pub namespace: String,
    /// Type name
    pub name: String,
    /// Whether this type is nested inside another type
    pub nested: bool,
    /// Declared fields
    pub fields: Vec<FieldIndex>,
    /// Declared properties
    pub properties: Vec<PropertyIndex>,
    /// Declared methods, including property accessors
    pub methods: Vec<MethodIndex>,
    /// Types nested directly inside this one
    pub nested_types: Vec<TypeIndex>,
    /// Qualified type names of attached annotation constructors
    pub attributes: Vec<String>,
    /// Set once the visibility field has been widened in this session
    pub widened: bool,
}

impl TypeNode {
    /// Creates a non-public top-level type with no members.
    pub fn new(name: &str) -> Self {
        TypeNode {
            rid: 0,
            flags: TypeAttributes::NOT_PUBLIC,
            namespace: String::new(),
            name: name.to_string(),
            nested: false,
            fields: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            nested_types: Vec::new(),
            attributes: Vec::new(),
            widened: false,
        }
    }

    /// True when the visibility field already grants external access:
    /// nested-public for nested types, public for top-level types.
    pub fn is_visible(&self) -> bool {
        let visibility = self.flags & TypeAttributes::VISIBILITY_MASK;
        if self.nested {
            visibility == TypeAttributes::NESTED_PUBLIC
        } else {
            visibility == TypeAttributes::PUBLIC
        }
    }

    /// Rewrites the visibility field to public (nested-public when nested)
    /// and records the transition.
    pub fn widen(&mut self) {
        let target = if self.nested {
            TypeAttributes::NESTED_PUBLIC
        } else {
            TypeAttributes::PUBLIC
        };
        self.flags = (self.flags & !TypeAttributes::VISIBILITY_MASK) | target;
        self.widened = true;
    }
}

/// A field declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNode {
    /// `Field` row id in the host module (0 for synthetic fixtures)
    pub rid: u32,
    /// Raw `Field` attribute flags
    pub flags: u32,
    /// Field name
    pub name: String,
    /// Qualified type names of attached annotation constructors
    pub attributes: Vec<String>,
    /// Markers scheduled for attachment at flush time
    pub pending_markers: Vec<MarkerKind>,
    /// Set once the access field has been widened in this session
    pub widened: bool,
}

impl FieldNode {
    /// Creates a field with the given raw attribute flags.
    pub fn new(name: &str, flags: u32) -> Self {
        FieldNode {
            rid: 0,
            flags,
            name: name.to_string(),
            attributes: Vec::new(),
            pending_markers: Vec::new(),
            widened: false,
        }
    }

    /// True when the access field is public.
    pub fn is_public(&self) -> bool {
        self.flags & FieldAttributes::FIELD_ACCESS_MASK == FieldAttributes::PUBLIC
    }

    /// Rewrites the access field to public and records the transition.
    pub fn make_public(&mut self) {
        self.flags = (self.flags & !FieldAttributes::FIELD_ACCESS_MASK) | FieldAttributes::PUBLIC;
        self.widened = true;
    }
}

/// A property declaration with its optional accessors.
///
/// Accessors are independently accessible methods; a property with neither
/// accessor is tolerated and simply never widened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyNode {
    /// `Property` row id in the host module (0 for synthetic fixtures)
    pub rid: u32,
    /// Property name
    pub name: String,
    /// Getter method, if declared
    pub getter: Option<MethodIndex>,
    /// Setter method, if declared
    pub setter: Option<MethodIndex>,
    /// Qualified type names of annotations attached to the property itself
    pub attributes: Vec<String>,
    /// Markers scheduled for attachment to the property at flush time
    pub pending_markers: Vec<MarkerKind>,
}

impl PropertyNode {
    /// Creates a property with no accessors.
    pub fn new(name: &str) -> Self {
        PropertyNode {
            rid: 0,
            name: name.to_string(),
            getter: None,
            setter: None,
            attributes: Vec::new(),
            pending_markers: Vec::new(),
        }
    }
}

/// A method declaration (plain method, constructor, or property accessor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodNode {
    /// `MethodDef` row id in the host module (0 for synthetic fixtures)
    pub rid: u32,
    /// Raw `MethodDef` attribute flags
    pub flags: u32,
    /// Method name
    pub name: String,
    /// Qualified type names of attached annotation constructors
    pub attributes: Vec<String>,
    /// Set once the access field has been widened in this session
    pub widened: bool,
}

impl MethodNode {
    /// Creates a method with the given raw attribute flags.
    pub fn new(name: &str, flags: u32) -> Self {
        MethodNode {
            rid: 0,
            flags,
            name: name.to_string(),
            attributes: Vec::new(),
            widened: false,
        }
    }

    /// True when the access field is public.
    pub fn is_public(&self) -> bool {
        self.flags & MethodAttributes::METHOD_ACCESS_MASK == MethodAttributes::PUBLIC
    }

    /// Rewrites the access field to public and records the transition.
    pub fn make_public(&mut self) {
        self.flags =
            (self.flags & !MethodAttributes::METHOD_ACCESS_MASK) | MethodAttributes::PUBLIC;
        self.widened = true;
    }

    /// True for instance and static constructors (runtime special name plus
    /// one of the two reserved constructor names).
    pub fn is_constructor(&self) -> bool {
        self.flags & MethodAttributes::RTSPECIAL_NAME != 0
            && (self.name == ".ctor" || self.name == ".cctor")
    }

    /// True when the method is static.
    pub fn is_static(&self) -> bool {
        self.flags & MethodAttributes::STATIC != 0
    }
}

/// The edit graph of one module.
///
/// Owned by one rewrite session for its duration; the rewriter mutates it in
/// place and allocates nothing beyond marker attachments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleGraph {
    /// All types, in `TypeDef` row order
    pub types: Vec<TypeNode>,
    /// Indices of top-level (non-nested) types
    pub top_level: Vec<TypeIndex>,
    /// All fields
    pub fields: Vec<FieldNode>,
    /// All properties
    pub properties: Vec<PropertyNode>,
    /// All methods
    pub methods: Vec<MethodNode>,
}

impl ModuleGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        ModuleGraph::default()
    }

    /// Adds a type as top-level. Use [`ModuleGraph::nest`] afterwards to
    /// move it under an enclosing type.
    pub fn add_type(&mut self, node: TypeNode) -> TypeIndex {
        let index = self.types.len();
        self.types.push(node);
        self.top_level.push(index);
        index
    }

    /// Moves `child` out of the top-level set and under `parent`.
    pub fn nest(&mut self, child: TypeIndex, parent: TypeIndex) {
        self.types[child].nested = true;
        self.top_level.retain(|&t| t != child);
        self.types[parent].nested_types.push(child);
    }

    /// Adds a field to the given type.
    pub fn add_field(&mut self, owner: TypeIndex, node: FieldNode) -> FieldIndex {
        let index = self.fields.len();
        self.fields.push(node);
        self.types[owner].fields.push(index);
        index
    }

    /// Adds a property to the given type.
    pub fn add_property(&mut self, owner: TypeIndex, node: PropertyNode) -> PropertyIndex {
        let index = self.properties.len();
        self.properties.push(node);
        self.types[owner].properties.push(index);
        index
    }

    /// Adds a method to the given type.
    pub fn add_method(&mut self, owner: TypeIndex, node: MethodNode) -> MethodIndex {
        let index = self.methods.len();
        self.methods.push(node);
        self.types[owner].methods.push(index);
        index
    }

    /// True when any element has markers scheduled for attachment.
    pub fn has_pending_markers(&self) -> bool {
        self.fields.iter().any(|f| !f.pending_markers.is_empty())
            || self.properties.iter().any(|p| !p.pending_markers.is_empty())
    }
}
