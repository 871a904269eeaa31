//! Projection of a loaded module's metadata tables into a [`ModuleGraph`].
//!
//! The loader reads `TypeDef`, `Field`, `MethodDef`, `Property`,
//! `PropertyMap`, `MethodSemantics`, `NestedClass` and `CustomAttribute` and
//! produces the edit graph the rewriter operates on. Member ranges follow the
//! ECMA-335 run-to-next-row convention, and the optional `FieldPtr`,
//! `MethodPtr` and `PropertyPtr` indirection tables are honored when present,
//! so unoptimized modules load the same as optimized ones.

use std::collections::HashMap;

use dotscope::metadata::streams::Strings;
use dotscope::metadata::streams::TablesHeader;
use dotscope::metadata::tables::{
    CustomAttributeRaw, FieldPtrRaw, FieldRaw, MemberRefRaw, MethodDefRaw, MethodPtrRaw,
    MethodSemanticsRaw, NestedClassRaw, PropertyMapRaw, PropertyPtrRaw, PropertyRaw, TableId,
    TypeDefRaw, TypeRefRaw,
};
use dotscope::CilAssemblyView;

use crate::attributes::MethodSemanticsAttributes;
use crate::graph::{
    FieldIndex, FieldNode, MethodIndex, MethodNode, ModuleGraph, PropertyIndex, PropertyNode,
    TypeIndex, TypeNode,
};
use crate::{Error, Result};

/// Row-id lookup tables built while loading, used to wire associations and
/// attribute targets back to graph nodes.
struct RidMaps {
    fields: HashMap<u32, FieldIndex>,
    methods: HashMap<u32, MethodIndex>,
    method_owners: HashMap<u32, TypeIndex>,
    properties: HashMap<u32, PropertyIndex>,
}

/// Builds the edit graph for the module behind `view`.
pub fn build_graph(view: &CilAssemblyView) -> Result<ModuleGraph> {
    let tables = view
        .tables()
        .ok_or_else(|| Error::NotSupported("module has no metadata tables".to_string()))?;
    let strings = view
        .strings()
        .ok_or_else(|| Error::NotSupported("module has no string heap".to_string()))?;

    let mut graph = ModuleGraph::new();
    let Some(type_defs) = tables.table::<TypeDefRaw>(TableId::TypeDef) else {
        return Ok(graph);
    };

    let mut maps = RidMaps {
        fields: HashMap::new(),
        methods: HashMap::new(),
        method_owners: HashMap::new(),
        properties: HashMap::new(),
    };

    load_types(tables, strings, type_defs.row_count(), &mut graph, &mut maps)?;
    load_properties(tables, strings, &mut graph, &mut maps)?;
    load_accessors(tables, &mut graph, &maps);
    load_nesting(tables, &mut graph);
    load_attributes(tables, strings, &mut graph, &maps)?;

    Ok(graph)
}

fn load_types(
    tables: &TablesHeader,
    strings: &Strings,
    type_count: u32,
    graph: &mut ModuleGraph,
    maps: &mut RidMaps,
) -> Result<()> {
    let type_defs = match tables.table::<TypeDefRaw>(TableId::TypeDef) {
        Some(t) => t,
        None => return Ok(()),
    };
    let field_count = tables.table_row_count(TableId::Field);
    let method_count = tables.table_row_count(TableId::MethodDef);

    for rid in 1..=type_count {
        let row = type_defs
            .get(rid)
            .ok_or_else(|| Error::NotSupported(format!("unreadable TypeDef row {rid}")))?;

        let mut node = TypeNode::new(read_string(strings, row.type_name)?);
        node.rid = rid;
        node.flags = row.flags;
        node.namespace = read_string(strings, row.type_namespace)?.to_string();
        let ti = graph.add_type(node);

        let field_end = match type_defs.get(rid + 1) {
            Some(next) => next.field_list,
            None => field_count + 1,
        };
        for slot in row.field_list..field_end {
            let frid = actual_field_rid(tables, slot);
            if let Some(field) = tables
                .table::<FieldRaw>(TableId::Field)
                .and_then(|t| t.get(frid))
            {
                let mut fnode = FieldNode::new(read_string(strings, field.name)?, field.flags);
                fnode.rid = frid;
                let fi = graph.add_field(ti, fnode);
                maps.fields.insert(frid, fi);
            }
        }

        let method_end = match type_defs.get(rid + 1) {
            Some(next) => next.method_list,
            None => method_count + 1,
        };
        for slot in row.method_list..method_end {
            let mrid = actual_method_rid(tables, slot);
            if let Some(method) = tables
                .table::<MethodDefRaw>(TableId::MethodDef)
                .and_then(|t| t.get(mrid))
            {
                let mut mnode = MethodNode::new(read_string(strings, method.name)?, method.flags);
                mnode.rid = mrid;
                let mi = graph.add_method(ti, mnode);
                maps.methods.insert(mrid, mi);
                maps.method_owners.insert(mrid, ti);
            }
        }
    }
    Ok(())
}

fn load_properties(
    tables: &TablesHeader,
    strings: &Strings,
    graph: &mut ModuleGraph,
    maps: &mut RidMaps,
) -> Result<()> {
    let property_maps = match tables.table::<PropertyMapRaw>(TableId::PropertyMap) {
        Some(t) => t,
        None => return Ok(()),
    };
    let property_count = tables.table_row_count(TableId::Property);

    for rid in 1..=property_maps.row_count() {
        let row = match property_maps.get(rid) {
            Some(r) => r,
            None => continue,
        };
        let owner = match type_index_for_rid(graph, row.parent) {
            Some(ti) => ti,
            None => continue,
        };
        let end = match property_maps.get(rid + 1) {
            Some(next) => next.property_list,
            None => property_count + 1,
        };
        for slot in row.property_list..end {
            let prid = actual_property_rid(tables, slot);
            if let Some(property) = tables
                .table::<PropertyRaw>(TableId::Property)
                .and_then(|t| t.get(prid))
            {
                let mut pnode = PropertyNode::new(read_string(strings, property.name)?);
                pnode.rid = prid;
                let pi = graph.add_property(owner, pnode);
                maps.properties.insert(prid, pi);
            }
        }
    }
    Ok(())
}

fn load_accessors(tables: &TablesHeader, graph: &mut ModuleGraph, maps: &RidMaps) {
    let semantics = match tables.table::<MethodSemanticsRaw>(TableId::MethodSemantics) {
        Some(t) => t,
        None => return,
    };
    for row in semantics.iter() {
        if row.association.tag != TableId::Property {
            // event accessors are out of scope for widening
            continue;
        }
        let Some(&pi) = maps.properties.get(&row.association.row) else {
            continue;
        };
        let Some(&mi) = maps.methods.get(&row.method) else {
            continue;
        };
        if row.semantics & MethodSemanticsAttributes::GETTER != 0 {
            graph.properties[pi].getter = Some(mi);
        }
        if row.semantics & MethodSemanticsAttributes::SETTER != 0 {
            graph.properties[pi].setter = Some(mi);
        }
    }
}

fn load_nesting(tables: &TablesHeader, graph: &mut ModuleGraph) {
    let nested = match tables.table::<NestedClassRaw>(TableId::NestedClass) {
        Some(t) => t,
        None => return,
    };
    for row in nested.iter() {
        let child = type_index_for_rid(graph, row.nested_class);
        let parent = type_index_for_rid(graph, row.enclosing_class);
        if let (Some(child), Some(parent)) = (child, parent) {
            graph.nest(child, parent);
        }
    }
}

fn load_attributes(
    tables: &TablesHeader,
    strings: &Strings,
    graph: &mut ModuleGraph,
    maps: &RidMaps,
) -> Result<()> {
    let attributes = match tables.table::<CustomAttributeRaw>(TableId::CustomAttribute) {
        Some(t) => t,
        None => return Ok(()),
    };
    for row in attributes.iter() {
        let Some(name) = constructor_type_name(tables, strings, graph, maps, &row)? else {
            continue;
        };
        match row.parent.tag {
            TableId::TypeDef => {
                if let Some(ti) = type_index_for_rid(graph, row.parent.row) {
                    graph.types[ti].attributes.push(name);
                }
            }
            TableId::Field => {
                if let Some(&fi) = maps.fields.get(&row.parent.row) {
                    graph.fields[fi].attributes.push(name);
                }
            }
            TableId::MethodDef => {
                if let Some(&mi) = maps.methods.get(&row.parent.row) {
                    graph.methods[mi].attributes.push(name);
                }
            }
            TableId::Property => {
                if let Some(&pi) = maps.properties.get(&row.parent.row) {
                    graph.properties[pi].attributes.push(name);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Resolves the namespace-qualified type name declaring an attribute's
/// constructor. Constructors referencing anything other than a `TypeRef` or
/// `TypeDef` scope (generic instantiations via `TypeSpec`) yield `None`.
fn constructor_type_name(
    tables: &TablesHeader,
    strings: &Strings,
    graph: &ModuleGraph,
    maps: &RidMaps,
    attribute: &CustomAttributeRaw,
) -> Result<Option<String>> {
    match attribute.constructor.tag {
        TableId::MemberRef => {
            let Some(member) = tables
                .table::<MemberRefRaw>(TableId::MemberRef)
                .and_then(|t| t.get(attribute.constructor.row))
            else {
                return Ok(None);
            };
            match member.class.tag {
                TableId::TypeRef => {
                    let Some(type_ref) = tables
                        .table::<TypeRefRaw>(TableId::TypeRef)
                        .and_then(|t| t.get(member.class.row))
                    else {
                        return Ok(None);
                    };
                    Ok(Some(qualified_name(
                        read_string(strings, type_ref.type_namespace)?,
                        read_string(strings, type_ref.type_name)?,
                    )))
                }
                TableId::TypeDef => Ok(type_index_for_rid(graph, member.class.row)
                    .map(|ti| type_full_name(graph, ti))),
                _ => Ok(None),
            }
        }
        TableId::MethodDef => Ok(maps
            .method_owners
            .get(&attribute.constructor.row)
            .map(|&ti| type_full_name(graph, ti))),
        _ => Ok(None),
    }
}

fn type_full_name(graph: &ModuleGraph, ti: TypeIndex) -> String {
    let ty = &graph.types[ti];
    qualified_name(&ty.namespace, &ty.name)
}

fn qualified_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

/// Types are loaded in `TypeDef` row order, so the graph index is rid - 1.
fn type_index_for_rid(graph: &ModuleGraph, rid: u32) -> Option<TypeIndex> {
    let index = rid.checked_sub(1)? as usize;
    (index < graph.types.len()).then_some(index)
}

fn actual_field_rid(tables: &TablesHeader, slot: u32) -> u32 {
    tables
        .table::<FieldPtrRaw>(TableId::FieldPtr)
        .and_then(|t| t.get(slot))
        .map_or(slot, |ptr| ptr.field)
}

fn actual_method_rid(tables: &TablesHeader, slot: u32) -> u32 {
    tables
        .table::<MethodPtrRaw>(TableId::MethodPtr)
        .and_then(|t| t.get(slot))
        .map_or(slot, |ptr| ptr.method)
}

fn actual_property_rid(tables: &TablesHeader, slot: u32) -> u32 {
    tables
        .table::<PropertyPtrRaw>(TableId::PropertyPtr)
        .and_then(|t| t.get(slot))
        .map_or(slot, |ptr| ptr.property)
}

/// String heap index 0 is the empty string by convention.
fn read_string<'a>(strings: &Strings<'a>, index: u32) -> Result<&'a str> {
    if index == 0 {
        Ok("")
    } else {
        Ok(strings.get(index as usize)?)
    }
}
