//! One module's load, rewrite and flush lifecycle.
//!
//! A [`RewriteSession`] owns the loaded assembly, its edit graph and the
//! marker conventions for the run. The flow is open, rewrite, commit: commit
//! flushes flag rewrites as row updates, resolves marker constructors (once
//! per session, and only when anything actually needs a marker), appends the
//! `CustomAttribute` rows, then validates and writes the output file.

use std::path::Path;

use dotscope::metadata::tables::{
    AssemblyRefRaw, CodedIndex, CustomAttributeRaw, FieldRaw, MemberRefRaw, MethodDefRaw,
    TableDataOwned, TableId, TypeDefRaw, TypeRefRaw,
};
use dotscope::metadata::token::Token;
use dotscope::{CilAssembly, CilAssemblyView};

use crate::assembly::loader;
use crate::assembly::resolver::AssemblyResolver;
use crate::graph::ModuleGraph;
use crate::markers::{MarkerKind, MarkerSet, MarkerType};
use crate::rewriter::{RewriteSummary, Rewriter};
use crate::{Error, Result};

/// Custom attribute value blob encoding zero constructor arguments and zero
/// named arguments: prolog 0x0001, NumNamed 0.
const EMPTY_ATTRIBUTE_VALUE: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// Signature blob of a `void .ctor()` instance method: HASTHIS, no
/// parameters, `ELEMENT_TYPE_VOID` return.
const PARAMETERLESS_CTOR_SIG: [u8; 3] = [0x20, 0x00, 0x01];

/// Marker constructors imported into the target module, resolved at most
/// once per session.
struct ResolvedMarkers {
    exclude_ctor: CodedIndex,
    historical_ctor: CodedIndex,
    empty_args: u32,
}

/// An in-progress rewrite of one assembly file.
pub struct RewriteSession {
    assembly: CilAssembly,
    graph: ModuleGraph,
    markers: MarkerSet,
    resolver: AssemblyResolver,
}

impl RewriteSession {
    /// Loads the assembly at `path` and projects its edit graph.
    pub fn open(path: &Path, markers: MarkerSet, resolver: AssemblyResolver) -> Result<Self> {
        let view = CilAssemblyView::from_file(path)?;
        let graph = loader::build_graph(&view)?;
        Ok(RewriteSession {
            assembly: CilAssembly::new(view),
            graph,
            markers,
            resolver,
        })
    }

    /// The current edit graph.
    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    /// Runs the widening pass over every type in the module.
    pub fn rewrite_all(&mut self) -> RewriteSummary {
        Rewriter::new(self.markers.clone()).publicize_module(&mut self.graph)
    }

    /// Flushes all accumulated changes and writes the result to `output`.
    ///
    /// Marker constructors are resolved here rather than at open time, so a
    /// pass that widened nothing (a second run over already-public input)
    /// commits cleanly even when the marker assemblies are absent.
    pub fn commit(mut self, output: &Path) -> Result<()> {
        let updates = self.collect_row_updates()?;
        for (table_id, rid, row) in updates {
            self.assembly.update_table_row(table_id, rid, row)?;
        }

        if self.graph.has_pending_markers() {
            let resolved = self.resolve_markers()?;
            self.attach_markers(&resolved)?;
        }

        self.assembly.validate_and_apply_changes()?;
        self.assembly.write_to_file(output)?;
        Ok(())
    }

    /// Turns every widened node into a row update carrying its new flags.
    fn collect_row_updates(&self) -> Result<Vec<(TableId, u32, TableDataOwned)>> {
        let tables = self
            .assembly
            .view()
            .tables()
            .ok_or_else(|| Error::NotSupported("module has no metadata tables".to_string()))?;
        let mut updates = Vec::new();

        if let Some(type_defs) = tables.table::<TypeDefRaw>(TableId::TypeDef) {
            for node in self.graph.types.iter().filter(|t| t.widened && t.rid != 0) {
                let mut row = type_defs.get(node.rid).ok_or_else(|| {
                    Error::NotSupported(format!("unreadable TypeDef row {}", node.rid))
                })?;
                row.flags = node.flags;
                updates.push((TableId::TypeDef, node.rid, TableDataOwned::TypeDef(row)));
            }
        }

        if let Some(fields) = tables.table::<FieldRaw>(TableId::Field) {
            for node in self.graph.fields.iter().filter(|f| f.widened && f.rid != 0) {
                let mut row = fields.get(node.rid).ok_or_else(|| {
                    Error::NotSupported(format!("unreadable Field row {}", node.rid))
                })?;
                row.flags = node.flags;
                updates.push((TableId::Field, node.rid, TableDataOwned::Field(row)));
            }
        }

        if let Some(methods) = tables.table::<MethodDefRaw>(TableId::MethodDef) {
            for node in self.graph.methods.iter().filter(|m| m.widened && m.rid != 0) {
                let mut row = methods.get(node.rid).ok_or_else(|| {
                    Error::NotSupported(format!("unreadable MethodDef row {}", node.rid))
                })?;
                row.flags = node.flags;
                updates.push((TableId::MethodDef, node.rid, TableDataOwned::MethodDef(row)));
            }
        }

        Ok(updates)
    }

    fn resolve_markers(&mut self) -> Result<ResolvedMarkers> {
        let exclude = self.markers.exclude.clone();
        let historical = self.markers.historical.clone();
        let exclude_ctor = self.resolve_marker_ctor(&exclude)?;
        let historical_ctor = self.resolve_marker_ctor(&historical)?;
        let empty_args = self.assembly.add_blob(&EMPTY_ATTRIBUTE_VALUE)?;
        Ok(ResolvedMarkers {
            exclude_ctor,
            historical_ctor,
            empty_args,
        })
    }

    /// Finds or imports the parameterless constructor of a marker type,
    /// returning its `MemberRef` coded index.
    fn resolve_marker_ctor(&mut self, marker: &MarkerType) -> Result<CodedIndex> {
        let existing_type_ref = self.find_type_ref(marker);
        if let Some(type_ref_rid) = existing_type_ref {
            if let Some(member_rid) = self.find_ctor_member_ref(type_ref_rid) {
                return Ok(CodedIndex::new(TableId::MemberRef, member_rid));
            }
        }

        let type_ref_rid = match existing_type_ref {
            Some(rid) => rid,
            None => {
                let scope = self.resolve_marker_scope(marker)?;
                let type_name = self.assembly.add_string(&marker.name)?;
                let type_namespace = self.assembly.add_string(&marker.namespace)?;
                self.assembly.add_table_row(
                    TableId::TypeRef,
                    TableDataOwned::TypeRef(TypeRefRaw {
                        rid: 0,
                        token: Token::new(0x0100_0000),
                        offset: 0,
                        resolution_scope: scope,
                        type_name,
                        type_namespace,
                    }),
                )?
            }
        };

        let name = self.assembly.add_string(".ctor")?;
        let signature = self.assembly.add_blob(&PARAMETERLESS_CTOR_SIG)?;
        let member_rid = self.assembly.add_table_row(
            TableId::MemberRef,
            TableDataOwned::MemberRef(MemberRefRaw {
                rid: 0,
                token: Token::new(0x0A00_0000),
                offset: 0,
                class: CodedIndex::new(TableId::TypeRef, type_ref_rid),
                name,
                signature,
            }),
        )?;
        Ok(CodedIndex::new(TableId::MemberRef, member_rid))
    }

    /// Finds the `AssemblyRef` scope a marker's `TypeRef` should resolve
    /// through, minting the row from the dependency file when the module
    /// does not reference the marker assembly yet.
    fn resolve_marker_scope(&mut self, marker: &MarkerType) -> Result<CodedIndex> {
        match &marker.assembly {
            None => self
                .find_assembly_ref("mscorlib")
                .or_else(|| self.find_assembly_ref("System.Runtime"))
                .or_else(|| self.find_assembly_ref("System.Private.CoreLib"))
                .map(|rid| CodedIndex::new(TableId::AssemblyRef, rid))
                .ok_or_else(|| Error::MarkerResolution {
                    name: marker.full_name(),
                    reason: "module references no known core library".to_string(),
                }),
            Some(assembly_name) => {
                if let Some(rid) = self.find_assembly_ref(assembly_name) {
                    return Ok(CodedIndex::new(TableId::AssemblyRef, rid));
                }
                let dependency =
                    self.resolver
                        .probe(assembly_name)
                        .map_err(|e| Error::MarkerResolution {
                            name: marker.full_name(),
                            reason: e.to_string(),
                        })?;
                let identity = self.resolver.identity_of(&dependency)?;

                let name = self.assembly.add_string(&identity.name)?;
                let public_key_or_token = match identity.public_key_token {
                    Some(token) => self.assembly.add_blob(&token)?,
                    None => 0,
                };
                let rid = self.assembly.add_table_row(
                    TableId::AssemblyRef,
                    TableDataOwned::AssemblyRef(AssemblyRefRaw {
                        rid: 0,
                        token: Token::new(0x2300_0000),
                        offset: 0,
                        major_version: identity.major_version,
                        minor_version: identity.minor_version,
                        build_number: identity.build_number,
                        revision_number: identity.revision_number,
                        flags: 0,
                        public_key_or_token,
                        name,
                        culture: 0,
                        hash_value: 0,
                    }),
                )?;
                Ok(CodedIndex::new(TableId::AssemblyRef, rid))
            }
        }
    }

    /// Appends one `CustomAttribute` row per scheduled marker.
    fn attach_markers(&mut self, resolved: &ResolvedMarkers) -> Result<()> {
        let mut rows = Vec::new();

        for field in self.graph.fields.iter().filter(|f| f.rid != 0) {
            for kind in &field.pending_markers {
                rows.push(attribute_row(
                    CodedIndex::new(TableId::Field, field.rid),
                    *kind,
                    resolved,
                ));
            }
        }
        for property in self.graph.properties.iter().filter(|p| p.rid != 0) {
            for kind in &property.pending_markers {
                rows.push(attribute_row(
                    CodedIndex::new(TableId::Property, property.rid),
                    *kind,
                    resolved,
                ));
            }
        }

        for row in rows {
            self.assembly
                .add_table_row(TableId::CustomAttribute, TableDataOwned::CustomAttribute(row))?;
        }
        Ok(())
    }

    /// Scans the module's `TypeRef` table for a row matching the marker's
    /// namespace and name. The resolution scope is deliberately not compared;
    /// a module carrying the type name is assumed to reference the real
    /// marker assembly.
    fn find_type_ref(&self, marker: &MarkerType) -> Option<u32> {
        let view = self.assembly.view();
        let tables = view.tables()?;
        let strings = view.strings()?;
        let type_refs = tables.table::<TypeRefRaw>(TableId::TypeRef)?;
        for rid in 1..=type_refs.row_count() {
            let row = type_refs.get(rid)?;
            let name = strings.get(row.type_name as usize).ok()?;
            if name != marker.name {
                continue;
            }
            let namespace = strings.get(row.type_namespace as usize).unwrap_or("");
            if namespace == marker.namespace {
                return Some(rid);
            }
        }
        None
    }

    /// Scans the module's `MemberRef` table for a `.ctor` owned by the given
    /// `TypeRef` row.
    fn find_ctor_member_ref(&self, type_ref_rid: u32) -> Option<u32> {
        let view = self.assembly.view();
        let tables = view.tables()?;
        let strings = view.strings()?;
        let member_refs = tables.table::<MemberRefRaw>(TableId::MemberRef)?;
        for rid in 1..=member_refs.row_count() {
            let row = member_refs.get(rid)?;
            if row.class.tag != TableId::TypeRef || row.class.row != type_ref_rid {
                continue;
            }
            if strings.get(row.name as usize).ok()? == ".ctor" {
                return Some(rid);
            }
        }
        None
    }

    /// Scans the module's `AssemblyRef` table for a row with the given
    /// simple name.
    fn find_assembly_ref(&self, name: &str) -> Option<u32> {
        let view = self.assembly.view();
        let tables = view.tables()?;
        let strings = view.strings()?;
        let assembly_refs = tables.table::<AssemblyRefRaw>(TableId::AssemblyRef)?;
        for rid in 1..=assembly_refs.row_count() {
            let row = assembly_refs.get(rid)?;
            if strings.get(row.name as usize).ok()? == name {
                return Some(rid);
            }
        }
        None
    }
}

fn attribute_row(
    parent: CodedIndex,
    kind: MarkerKind,
    resolved: &ResolvedMarkers,
) -> CustomAttributeRaw {
    let constructor = match kind {
        MarkerKind::Exclude => resolved.exclude_ctor.clone(),
        MarkerKind::Historical => resolved.historical_ctor.clone(),
    };
    CustomAttributeRaw {
        rid: 0,
        token: Token::new(0x0C00_0000),
        offset: 0,
        parent,
        constructor,
        value: resolved.empty_args,
    }
}
