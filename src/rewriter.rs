//! The accessibility widening pass.
//!
//! [`Rewriter::publicize_module`] walks every top-level type in the graph and
//! widens the type, its fields, its property accessors and its methods to
//! public, scheduling compensating serialization markers where widening
//! changes discovery behavior. Nested types are processed through an explicit
//! worklist, so arbitrarily deep nesting cannot exhaust the stack.
//!
//! The pass is idempotent: every rewrite is conditional on the element not
//! already being public, and markers are only scheduled for elements widened
//! in the current pass.

use crate::generated;
use crate::graph::{ModuleGraph, TypeIndex};
use crate::markers::{MarkerKind, MarkerSet};

/// Counters describing what one widening pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    /// Types whose visibility was rewritten
    pub types_widened: usize,
    /// Fields whose access was rewritten
    pub fields_widened: usize,
    /// Property accessors whose access was rewritten
    pub accessors_widened: usize,
    /// Methods whose access was rewritten, accessors excluded
    pub methods_widened: usize,
    /// Markers scheduled for attachment
    pub markers_scheduled: usize,
    /// Types skipped as compiler-generated, their members uncounted
    pub generated_skipped: usize,
}

impl RewriteSummary {
    /// True when the pass changed nothing.
    pub fn is_noop(&self) -> bool {
        self.types_widened == 0
            && self.fields_widened == 0
            && self.accessors_widened == 0
            && self.methods_widened == 0
            && self.markers_scheduled == 0
    }
}

/// Applies the widening pass to a [`ModuleGraph`].
#[derive(Debug)]
pub struct Rewriter {
    markers: MarkerSet,
}

impl Rewriter {
    /// Creates a rewriter honoring the given marker conventions.
    pub fn new(markers: MarkerSet) -> Self {
        Rewriter { markers }
    }

    /// Widens every type in the module, nested types included.
    pub fn publicize_module(&self, graph: &mut ModuleGraph) -> RewriteSummary {
        let mut summary = RewriteSummary::default();
        let roots: Vec<TypeIndex> = graph.top_level.clone();
        for root in roots {
            self.publicize_type(graph, root, &mut summary);
        }
        summary
    }

    /// Widens one type and everything nested inside it.
    pub fn publicize_type(
        &self,
        graph: &mut ModuleGraph,
        root: TypeIndex,
        summary: &mut RewriteSummary,
    ) {
        let mut worklist = vec![root];
        while let Some(index) = worklist.pop() {
            self.widen_type(graph, index, summary);
            // generated types keep their subtree untouched
            if !Self::is_generated(graph, index) {
                worklist.extend(graph.types[index].nested_types.iter().copied());
            }
        }
    }

    fn is_generated(graph: &ModuleGraph, index: TypeIndex) -> bool {
        let ty = &graph.types[index];
        generated::is_generated_type(&ty.name, &ty.attributes)
    }

    fn widen_type(&self, graph: &mut ModuleGraph, index: TypeIndex, summary: &mut RewriteSummary) {
        if Self::is_generated(graph, index) {
            summary.generated_skipped += 1;
            return;
        }

        if !graph.types[index].is_visible() {
            graph.types[index].widen();
            summary.types_widened += 1;
        }

        self.widen_fields(graph, index, summary);
        self.widen_properties(graph, index, summary);
        self.widen_methods(graph, index, summary);
    }

    fn widen_fields(&self, graph: &mut ModuleGraph, index: TypeIndex, summary: &mut RewriteSummary) {
        let field_indices = graph.types[index].fields.clone();
        for fi in field_indices {
            let field = &mut graph.fields[fi];
            if generated::is_generated_field(&field.name, &field.attributes) {
                continue;
            }
            if field.is_public() {
                continue;
            }
            field.make_public();
            summary.fields_widened += 1;

            // A newly visible field joins serialization discovery unless the
            // author opted it in explicitly. Compensate with both markers.
            if !self.markers.has_explicit_include(&field.attributes) {
                field.pending_markers.push(MarkerKind::Exclude);
                field.pending_markers.push(MarkerKind::Historical);
                summary.markers_scheduled += 2;
            }
        }
    }

    fn widen_properties(
        &self,
        graph: &mut ModuleGraph,
        index: TypeIndex,
        summary: &mut RewriteSummary,
    ) {
        let property_indices = graph.types[index].properties.clone();
        for pi in property_indices {
            // Missing accessors are tolerated; an accessor-less property is
            // simply left alone. Properties and their accessors are not
            // filtered as generated: auto-property accessors carry the
            // compiler-generated annotation yet are primary widening targets.
            let getter = graph.properties[pi].getter;
            let setter = graph.properties[pi].setter;
            let explicitly_included =
                self.markers.has_explicit_include(&graph.properties[pi].attributes);

            if let Some(mi) = getter {
                if Self::widen_accessor(graph, mi) {
                    summary.accessors_widened += 1;
                    if !explicitly_included {
                        graph.properties[pi].pending_markers.push(MarkerKind::Historical);
                        summary.markers_scheduled += 1;
                    }
                }
            }
            if let Some(mi) = setter {
                if Self::widen_accessor(graph, mi) {
                    summary.accessors_widened += 1;
                    if !explicitly_included {
                        graph.properties[pi].pending_markers.push(MarkerKind::Exclude);
                        summary.markers_scheduled += 1;
                    }
                }
            }
        }
    }

    fn widen_accessor(graph: &mut ModuleGraph, mi: usize) -> bool {
        let method = &mut graph.methods[mi];
        if method.is_public() {
            return false;
        }
        method.make_public();
        true
    }

    fn widen_methods(
        &self,
        graph: &mut ModuleGraph,
        index: TypeIndex,
        summary: &mut RewriteSummary,
    ) {
        let accessor_methods: Vec<usize> = graph.types[index]
            .properties
            .iter()
            .flat_map(|&pi| {
                let p = &graph.properties[pi];
                p.getter.into_iter().chain(p.setter)
            })
            .collect();

        let method_indices = graph.types[index].methods.clone();
        for mi in method_indices {
            if accessor_methods.contains(&mi) {
                continue;
            }
            let method = &mut graph.methods[mi];
            if generated::is_generated_method(&method.name, &method.attributes) {
                continue;
            }
            // Static initializers run once under runtime control; making one
            // callable would allow re-running it. The name check backs up the
            // flag check against modules with absent RTSpecialName bits.
            if (method.is_constructor() && method.is_static()) || method.name == ".cctor" {
                continue;
            }
            if method.is_public() {
                continue;
            }
            method.make_public();
            summary.methods_widened += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{FieldAttributes, MethodAttributes, TypeAttributes};
    use crate::graph::{FieldNode, MethodNode, ModuleGraph, PropertyNode, TypeNode};

    fn rewriter() -> Rewriter {
        Rewriter::new(MarkerSet::default())
    }

    fn internal_type(name: &str) -> TypeNode {
        let mut ty = TypeNode::new(name);
        ty.flags = TypeAttributes::NOT_PUBLIC;
        ty
    }

    #[test]
    fn private_field_gets_both_markers() {
        let mut graph = ModuleGraph::new();
        let ty = graph.add_type(internal_type("Holder"));
        let field = graph.add_field(ty, FieldNode::new("secret", FieldAttributes::PRIVATE));

        let summary = rewriter().publicize_module(&mut graph);

        assert!(graph.fields[field].is_public());
        assert_eq!(
            graph.fields[field].pending_markers,
            vec![MarkerKind::Exclude, MarkerKind::Historical]
        );
        assert_eq!(summary.fields_widened, 1);
        assert_eq!(summary.markers_scheduled, 2);
    }

    #[test]
    fn explicitly_included_field_gets_no_markers() {
        let mut graph = ModuleGraph::new();
        let ty = graph.add_type(internal_type("Holder"));
        let mut node = FieldNode::new("payload", FieldAttributes::PRIVATE);
        node.attributes
            .push("Newtonsoft.Json.JsonPropertyAttribute".to_string());
        let field = graph.add_field(ty, node);

        rewriter().publicize_module(&mut graph);

        assert!(graph.fields[field].is_public());
        assert!(graph.fields[field].pending_markers.is_empty());
    }

    #[test]
    fn already_public_field_is_untouched() {
        let mut graph = ModuleGraph::new();
        let ty = graph.add_type(internal_type("Holder"));
        let field = graph.add_field(ty, FieldNode::new("open", FieldAttributes::PUBLIC));

        let summary = rewriter().publicize_module(&mut graph);

        assert!(!graph.fields[field].widened);
        assert!(graph.fields[field].pending_markers.is_empty());
        assert_eq!(summary.fields_widened, 0);
    }

    #[test]
    fn getter_widening_marks_property_historical() {
        let mut graph = ModuleGraph::new();
        let ty = graph.add_type(internal_type("Holder"));
        let getter = graph.add_method(
            ty,
            MethodNode::new(
                "get_Count",
                MethodAttributes::PRIVATE | MethodAttributes::SPECIAL_NAME,
            ),
        );
        let mut prop = PropertyNode::new("Count");
        prop.getter = Some(getter);
        let pi = graph.add_property(ty, prop);

        rewriter().publicize_module(&mut graph);

        assert!(graph.methods[getter].is_public());
        assert_eq!(
            graph.properties[pi].pending_markers,
            vec![MarkerKind::Historical]
        );
    }

    #[test]
    fn setter_widening_marks_property_excluded() {
        let mut graph = ModuleGraph::new();
        let ty = graph.add_type(internal_type("Holder"));
        let setter = graph.add_method(
            ty,
            MethodNode::new(
                "set_Count",
                MethodAttributes::PRIVATE | MethodAttributes::SPECIAL_NAME,
            ),
        );
        let mut prop = PropertyNode::new("Count");
        prop.setter = Some(setter);
        let pi = graph.add_property(ty, prop);

        rewriter().publicize_module(&mut graph);

        assert!(graph.methods[setter].is_public());
        assert_eq!(
            graph.properties[pi].pending_markers,
            vec![MarkerKind::Exclude]
        );
    }

    #[test]
    fn explicitly_included_property_gets_no_markers() {
        let mut graph = ModuleGraph::new();
        let ty = graph.add_type(internal_type("Holder"));
        let getter = graph.add_method(
            ty,
            MethodNode::new(
                "get_Count",
                MethodAttributes::PRIVATE | MethodAttributes::SPECIAL_NAME,
            ),
        );
        let setter = graph.add_method(
            ty,
            MethodNode::new(
                "set_Count",
                MethodAttributes::PRIVATE | MethodAttributes::SPECIAL_NAME,
            ),
        );
        let mut prop = PropertyNode::new("Count");
        prop.getter = Some(getter);
        prop.setter = Some(setter);
        prop.attributes
            .push("Newtonsoft.Json.JsonPropertyAttribute".to_string());
        let pi = graph.add_property(ty, prop);

        rewriter().publicize_module(&mut graph);

        assert!(graph.methods[getter].is_public());
        assert!(graph.methods[setter].is_public());
        assert!(graph.properties[pi].pending_markers.is_empty());
    }

    #[test]
    fn auto_property_accessor_is_widened_despite_generated_annotation() {
        let mut graph = ModuleGraph::new();
        let ty = graph.add_type(internal_type("Holder"));
        let mut accessor = MethodNode::new(
            "set_Count",
            MethodAttributes::PRIVATE | MethodAttributes::SPECIAL_NAME,
        );
        accessor
            .attributes
            .push("System.Runtime.CompilerServices.CompilerGeneratedAttribute".to_string());
        let setter = graph.add_method(ty, accessor);
        let mut prop = PropertyNode::new("Count");
        prop.setter = Some(setter);
        let pi = graph.add_property(ty, prop);

        let summary = rewriter().publicize_module(&mut graph);

        assert!(graph.methods[setter].is_public());
        assert_eq!(summary.accessors_widened, 1);
        assert_eq!(
            graph.properties[pi].pending_markers,
            vec![MarkerKind::Exclude]
        );
    }

    #[test]
    fn public_accessors_leave_property_unmarked() {
        let mut graph = ModuleGraph::new();
        let ty = graph.add_type(internal_type("Holder"));
        let getter = graph.add_method(
            ty,
            MethodNode::new(
                "get_Count",
                MethodAttributes::PUBLIC | MethodAttributes::SPECIAL_NAME,
            ),
        );
        let mut prop = PropertyNode::new("Count");
        prop.getter = Some(getter);
        let pi = graph.add_property(ty, prop);

        rewriter().publicize_module(&mut graph);

        assert!(graph.properties[pi].pending_markers.is_empty());
    }

    #[test]
    fn accessorless_property_is_tolerated() {
        let mut graph = ModuleGraph::new();
        let ty = graph.add_type(internal_type("Holder"));
        let pi = graph.add_property(ty, PropertyNode::new("Phantom"));

        let summary = rewriter().publicize_module(&mut graph);

        assert!(graph.properties[pi].pending_markers.is_empty());
        assert_eq!(summary.accessors_widened, 0);
    }

    #[test]
    fn static_constructor_is_never_widened() {
        let mut graph = ModuleGraph::new();
        let ty = graph.add_type(internal_type("Holder"));
        let cctor = graph.add_method(
            ty,
            MethodNode::new(
                ".cctor",
                MethodAttributes::PRIVATE
                    | MethodAttributes::STATIC
                    | MethodAttributes::SPECIAL_NAME
                    | MethodAttributes::RTSPECIAL_NAME,
            ),
        );
        // flags stripped of RTSpecialName, name check must still catch it
        let bare_cctor = graph.add_method(
            ty,
            MethodNode::new(
                ".cctor",
                MethodAttributes::PRIVATE | MethodAttributes::STATIC,
            ),
        );

        rewriter().publicize_module(&mut graph);

        assert!(!graph.methods[cctor].is_public());
        assert!(!graph.methods[bare_cctor].is_public());
    }

    #[test]
    fn instance_constructor_is_widened() {
        let mut graph = ModuleGraph::new();
        let ty = graph.add_type(internal_type("Holder"));
        let ctor = graph.add_method(
            ty,
            MethodNode::new(
                ".ctor",
                MethodAttributes::PRIVATE
                    | MethodAttributes::SPECIAL_NAME
                    | MethodAttributes::RTSPECIAL_NAME,
            ),
        );

        let summary = rewriter().publicize_module(&mut graph);

        assert!(graph.methods[ctor].is_public());
        assert_eq!(summary.methods_widened, 1);
    }

    #[test]
    fn generated_type_and_its_subtree_are_skipped() {
        let mut graph = ModuleGraph::new();
        let outer = graph.add_type(internal_type("Outer"));
        let display = graph.add_type(internal_type("<>c__DisplayClass0_0"));
        graph.nest(display, outer);
        let inner = graph.add_type(internal_type("Captured"));
        graph.nest(inner, display);
        let field = graph.add_field(display, FieldNode::new("state", FieldAttributes::PRIVATE));

        let summary = rewriter().publicize_module(&mut graph);

        assert!(graph.types[outer].is_visible());
        assert!(!graph.types[display].is_visible());
        assert!(!graph.types[inner].is_visible());
        assert!(!graph.fields[field].is_public());
        assert_eq!(summary.generated_skipped, 1);
    }

    #[test]
    fn attribute_marked_generated_type_is_skipped() {
        let mut graph = ModuleGraph::new();
        let mut node = internal_type("SneakyStateMachine");
        node.attributes
            .push("System.Runtime.CompilerServices.CompilerGeneratedAttribute".to_string());
        let ty = graph.add_type(node);

        rewriter().publicize_module(&mut graph);

        assert!(!graph.types[ty].is_visible());
    }

    #[test]
    fn module_type_is_skipped() {
        let mut graph = ModuleGraph::new();
        let ty = graph.add_type(internal_type("<Module>"));

        let summary = rewriter().publicize_module(&mut graph);

        assert!(!graph.types[ty].is_visible());
        assert_eq!(summary.generated_skipped, 1);
    }

    #[test]
    fn generated_backing_field_is_skipped() {
        let mut graph = ModuleGraph::new();
        let ty = graph.add_type(internal_type("Holder"));
        let field = graph.add_field(
            ty,
            FieldNode::new("<Count>k__BackingField", FieldAttributes::PRIVATE),
        );

        rewriter().publicize_module(&mut graph);

        assert!(!graph.fields[field].is_public());
        assert!(graph.fields[field].pending_markers.is_empty());
    }

    #[test]
    fn nested_types_are_widened_without_recursion() {
        let mut graph = ModuleGraph::new();
        let mut parent = graph.add_type(internal_type("Depth0"));
        let mut all = vec![parent];
        for depth in 1..200 {
            let mut node = internal_type(&format!("Depth{depth}"));
            node.flags = TypeAttributes::NESTED_PRIVATE;
            let child = graph.add_type(node);
            graph.nest(child, parent);
            all.push(child);
            parent = child;
        }

        let summary = rewriter().publicize_module(&mut graph);

        assert_eq!(summary.types_widened, 200);
        assert!(all.iter().all(|&t| graph.types[t].is_visible()));
    }

    #[test]
    fn second_pass_is_a_noop() {
        let mut graph = ModuleGraph::new();
        let ty = graph.add_type(internal_type("Holder"));
        graph.add_field(ty, FieldNode::new("secret", FieldAttributes::PRIVATE));
        let getter = graph.add_method(
            ty,
            MethodNode::new(
                "get_Count",
                MethodAttributes::ASSEM | MethodAttributes::SPECIAL_NAME,
            ),
        );
        let mut prop = PropertyNode::new("Count");
        prop.getter = Some(getter);
        graph.add_property(ty, prop);
        graph.add_method(ty, MethodNode::new("Run", MethodAttributes::PRIVATE));

        let first = rewriter().publicize_module(&mut graph);
        assert!(!first.is_noop());

        let snapshot = graph.clone();
        let second = rewriter().publicize_module(&mut graph);

        assert!(second.is_noop());
        assert_eq!(graph, snapshot);
    }

    #[test]
    fn plain_methods_are_widened_but_never_marked() {
        let mut graph = ModuleGraph::new();
        let ty = graph.add_type(internal_type("Holder"));
        let method = graph.add_method(ty, MethodNode::new("Run", MethodAttributes::ASSEM));

        let summary = rewriter().publicize_module(&mut graph);

        assert!(graph.methods[method].is_public());
        assert_eq!(summary.methods_widened, 1);
        assert!(!graph.has_pending_markers());
    }
}
