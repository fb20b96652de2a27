use crate::traversal::{Named, Pass};
use ripple_ir::{Circuit, Expr, GetName, Memory, Module, RefKind, Stmt};
use ripple_utils::{Id, NameGenerator, RippleResult};
use std::collections::HashMap;

/// Names that are reserved in Verilog-2001.
pub const VERILOG_KEYWORDS: &[&str] = &[
    "always",
    "and",
    "assign",
    "automatic",
    "begin",
    "buf",
    "bufif0",
    "bufif1",
    "case",
    "casex",
    "casez",
    "cell",
    "cmos",
    "config",
    "deassign",
    "default",
    "defparam",
    "design",
    "disable",
    "edge",
    "else",
    "end",
    "endcase",
    "endconfig",
    "endfunction",
    "endgenerate",
    "endmodule",
    "endprimitive",
    "endspecify",
    "endtable",
    "endtask",
    "event",
    "for",
    "force",
    "forever",
    "fork",
    "function",
    "generate",
    "genvar",
    "highz0",
    "highz1",
    "if",
    "ifnone",
    "incdir",
    "include",
    "initial",
    "inout",
    "input",
    "instance",
    "integer",
    "join",
    "large",
    "liblist",
    "library",
    "localparam",
    "macromodule",
    "medium",
    "module",
    "nand",
    "negedge",
    "nmos",
    "nor",
    "noshowcancelled",
    "not",
    "notif0",
    "notif1",
    "or",
    "output",
    "parameter",
    "pmos",
    "posedge",
    "primitive",
    "pull0",
    "pull1",
    "pulldown",
    "pullup",
    "pulsestyle_ondetect",
    "pulsestyle_onevent",
    "rcmos",
    "real",
    "realtime",
    "reg",
    "release",
    "repeat",
    "rnmos",
    "rpmos",
    "rtran",
    "rtranif0",
    "rtranif1",
    "scalared",
    "showcancelled",
    "signed",
    "small",
    "specify",
    "specparam",
    "strong0",
    "strong1",
    "supply0",
    "supply1",
    "table",
    "task",
    "time",
    "tran",
    "tranif0",
    "tranif1",
    "tri",
    "tri0",
    "tri1",
    "triand",
    "trior",
    "trireg",
    "unsigned",
    "use",
    "vectored",
    "wait",
    "wand",
    "weak0",
    "weak1",
    "while",
    "wire",
    "wor",
    "xnor",
    "xor",
];

#[derive(Default)]
/// Circuit-wide rename of every identifier that collides with a Verilog
/// reserved word. Renames append `_` and stay collision-free; instance
/// port accesses are rewritten against the instantiated module's rename
/// table, so interfaces stay consistent across module boundaries.
pub struct RenameKeywords;

impl Named for RenameKeywords {
    fn name() -> &'static str {
        "rename-keywords"
    }

    fn description() -> &'static str {
        "renames identifiers that collide with Verilog reserved words"
    }
}

fn is_keyword(name: Id) -> bool {
    VERILOG_KEYWORDS.contains(&name.as_ref())
}

fn fresh(ns: &mut NameGenerator, name: Id) -> Id {
    let candidate = name.appended("_");
    if ns.reserve(candidate) {
        candidate
    } else {
        ns.gen_name(candidate)
    }
}

/// Per-module rename table: ports, local definitions, and memory port
/// labels, all keyed by their original names.
type Table = HashMap<Id, Id>;

impl Pass for RenameKeywords {
    fn run(&mut self, circuit: Circuit) -> RippleResult<Circuit> {
        // Module names are renamed against the set of all module names.
        let mut module_ns = NameGenerator::with_prev_defined_names(
            circuit.modules.iter().map(|m| m.name()).collect(),
        );
        let module_renames: Table = circuit
            .modules
            .iter()
            .filter(|m| is_keyword(m.name()))
            .map(|m| (m.name(), fresh(&mut module_ns, m.name())))
            .collect();

        // One table per module, built before any rewriting so that
        // cross-module instance-port lookups see every rename.
        let mut tables: HashMap<Id, Table> = HashMap::new();
        for module in &circuit.modules {
            let mut ns =
                NameGenerator::with_prev_defined_names(module.bound_names());
            let mut table = Table::new();
            let rename = |name: Id, ns: &mut NameGenerator| {
                if is_keyword(name) {
                    Some((name, fresh(ns, name)))
                } else {
                    None
                }
            };
            for port in module.ports() {
                table.extend(rename(port.name, &mut ns));
            }
            if let Module::Internal { body, .. } = module {
                body.for_each(&mut |s| match s {
                    Stmt::DefWire { name, .. }
                    | Stmt::DefNode { name, .. }
                    | Stmt::DefRegister { name, .. }
                    | Stmt::DefInstance { name, .. }
                    | Stmt::DefInstanceConnected { name, .. }
                    | Stmt::DefInstanceConnector { name, .. } => {
                        table.extend(rename(*name, &mut ns));
                    }
                    Stmt::DefMemory(mem) => {
                        table.extend(rename(mem.name, &mut ns));
                        for label in mem
                            .readers
                            .iter()
                            .chain(&mem.writers)
                            .chain(&mem.readwriters)
                        {
                            table.extend(rename(*label, &mut ns));
                        }
                    }
                    _ => {}
                });
            }
            tables.insert(module.name(), table);
        }

        let main = lookup(&module_renames, circuit.main);
        let modules = circuit
            .modules
            .into_iter()
            .map(|m| rewrite_module(m, &module_renames, &tables))
            .collect();
        Ok(Circuit { main, modules })
    }
}

fn lookup(table: &Table, name: Id) -> Id {
    table.get(&name).copied().unwrap_or(name)
}

fn rewrite_module(
    module: Module,
    module_renames: &Table,
    tables: &HashMap<Id, Table>,
) -> Module {
    let table = &tables[&module.name()];
    match module {
        Module::External {
            name,
            mut ports,
            defname,
            params,
        } => {
            for p in &mut ports {
                p.name = lookup(table, p.name);
            }
            // defname is the foreign linkage name and is left alone.
            Module::External {
                name: lookup(module_renames, name),
                ports,
                defname,
                params,
            }
        }
        Module::Internal {
            name,
            mut ports,
            body,
        } => {
            for p in &mut ports {
                p.name = lookup(table, p.name);
            }
            // Instance name -> instantiated module, for port lookups.
            let mut inst_of: Table = Table::new();
            body.for_each(&mut |s| {
                if let Stmt::DefInstance { name, module }
                | Stmt::DefInstanceConnected { name, module, .. }
                | Stmt::DefInstanceConnector { name, module, .. } = s
                {
                    inst_of.insert(*name, *module);
                }
            });
            let ctx = RewriteCtx {
                table,
                inst_of: &inst_of,
                module_renames,
                tables,
            };
            Module::Internal {
                name: lookup(module_renames, name),
                ports,
                body: rewrite_stmt(body, &ctx),
            }
        }
    }
}

struct RewriteCtx<'a> {
    table: &'a Table,
    inst_of: &'a Table,
    module_renames: &'a Table,
    tables: &'a HashMap<Id, Table>,
}

fn rewrite_stmt(stmt: Stmt, ctx: &RewriteCtx) -> Stmt {
    let stmt = stmt
        .map_children(&mut |s| rewrite_stmt(s, ctx))
        .map_exprs(&mut |e| rewrite_expr(e, ctx));
    match stmt {
        Stmt::DefWire { name, ty } => Stmt::DefWire {
            name: lookup(ctx.table, name),
            ty,
        },
        Stmt::DefNode { name, value } => Stmt::DefNode {
            name: lookup(ctx.table, name),
            value,
        },
        Stmt::DefRegister {
            name,
            ty,
            clock,
            reset,
            init,
        } => Stmt::DefRegister {
            name: lookup(ctx.table, name),
            ty,
            clock,
            reset,
            init,
        },
        Stmt::DefMemory(mem) => Stmt::DefMemory(Memory {
            name: lookup(ctx.table, mem.name),
            readers: mem
                .readers
                .into_iter()
                .map(|r| lookup(ctx.table, r))
                .collect(),
            writers: mem
                .writers
                .into_iter()
                .map(|w| lookup(ctx.table, w))
                .collect(),
            readwriters: mem
                .readwriters
                .into_iter()
                .map(|rw| lookup(ctx.table, rw))
                .collect(),
            ..mem
        }),
        Stmt::DefInstance { name, module } => Stmt::DefInstance {
            name: lookup(ctx.table, name),
            module: lookup(ctx.module_renames, module),
        },
        Stmt::DefInstanceConnected {
            name,
            module,
            port_cons,
        } => Stmt::DefInstanceConnected {
            name: lookup(ctx.table, name),
            module: lookup(ctx.module_renames, module),
            port_cons,
        },
        Stmt::DefInstanceConnector {
            name,
            module,
            exprs,
        } => Stmt::DefInstanceConnector {
            name: lookup(ctx.table, name),
            module: lookup(ctx.module_renames, module),
            exprs,
        },
        s => s,
    }
}

fn rewrite_expr(expr: Expr, ctx: &RewriteCtx) -> Expr {
    match expr {
        Expr::Ref { name, ty, kind } => Expr::Ref {
            name: lookup(ctx.table, name),
            ty,
            kind,
        },
        Expr::SubField { expr, name, ty } => {
            // A first-level field is an interface name: an instance port
            // (renamed against the instantiated module's table) or a memory
            // port label (module-local). Deeper fields are the fixed memory
            // signal tokens and never collide.
            let name = match &*expr {
                Expr::Ref {
                    kind: RefKind::Instance,
                    name: inst,
                    ..
                } => ctx
                    .inst_of
                    .get(inst)
                    .and_then(|m| ctx.tables.get(m))
                    .map(|t| lookup(t, name))
                    .unwrap_or(name),
                Expr::Ref {
                    kind: RefKind::Memory,
                    ..
                } => lookup(ctx.table, name),
                _ => name,
            };
            Expr::SubField {
                expr: Box::new(rewrite_expr(*expr, ctx)),
                name,
                ty,
            }
        }
        e => e.map_children(&mut |c| rewrite_expr(c, ctx)),
    }
}
